//! Byte-level input handling.
//!
//! Class files are read by external decoders; this crate only needs a bounds-checked cursor
//! for the instruction streams of Code attributes, provided by
//! [`crate::file::parser::Parser`].

pub mod parser;
