use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access flags of a class
    pub struct ClassAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared final
        const FINAL = 0x0010;
        /// Treat superclass methods specially in `invokespecial`
        const SUPER = 0x0020;
        /// An interface
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// An annotation interface
        const ANNOTATION = 0x2000;
        /// An enum class
        const ENUM = 0x4000;
        /// A module descriptor
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access flags of a field or method
    ///
    /// Some bits carry different meanings for fields and methods (`VOLATILE`/`BRIDGE`,
    /// `TRANSIENT`/`VARARGS`).
    pub struct MemberAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Method: invocation wrapped by a monitor
        const SYNCHRONIZED = 0x0020;
        /// Field: declared volatile
        const VOLATILE = 0x0040;
        /// Method: compiler generated bridge
        const BRIDGE = 0x0040;
        /// Field: declared transient
        const TRANSIENT = 0x0080;
        /// Method: variable arity
        const VARARGS = 0x0080;
        /// Method: implemented natively
        const NATIVE = 0x0100;
        /// Method: declared abstract
        const ABSTRACT = 0x0400;
        /// Method: strict floating point
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Field: element of an enum
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Side-channel marks that transformation passes attach to classes and members.
    ///
    /// The editing engine never interprets these bits, with one exception: members it
    /// creates by copying are marked `INJECTED`.
    pub struct ProcessingFlags: u32 {
        /// Must survive shrinking
        const KEEP = 0x0001;
        /// Must keep its name
        const KEEP_NAME = 0x0002;
        /// Created by a transformation rather than read from input
        const INJECTED = 0x0004;
        /// Modified by a transformation
        const MODIFIED = 0x0008;
    }
}
