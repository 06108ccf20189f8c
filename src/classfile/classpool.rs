//! A set of loaded classes.
//!
//! [`ClassPool`] owns the classes a pipeline transforms. Per-class passes run in parallel
//! through [`ClassPool::par_for_each_class`]; cross-class copies borrow one class immutably
//! and another mutably through [`ClassPool::pair_mut`], which statically rules out a class
//! being copy source and destination at the same time.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::{
    classfile::{Class, Linker},
    Error, Result,
};

/// The classes of a program, addressable by internal name.
#[derive(Debug, Default)]
pub struct ClassPool {
    classes: Vec<Class>,
    by_name: HashMap<String, usize>,
}

impl ClassPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool from classes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if a class has an invalid `this_class`.
    pub fn from_classes(classes: Vec<Class>) -> Result<Self> {
        let mut pool = ClassPool::new();
        for class in classes {
            pool.add(class)?;
        }
        Ok(pool)
    }

    /// Add a class, replacing a class of the same name. Returns the class's position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the class has an invalid `this_class`.
    pub fn add(&mut self, class: Class) -> Result<usize> {
        let name = class.name()?.to_string();
        match self.by_name.get(&name) {
            Some(&position) => {
                self.classes[position] = class;
                Ok(position)
            }
            None => {
                self.classes.push(class);
                self.by_name.insert(name, self.classes.len() - 1);
                Ok(self.classes.len() - 1)
            }
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if the pool holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Position of the class named `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// The class named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Class> {
        self.position(name).map(|position| &self.classes[position])
    }

    /// Mutable access to the class named `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Class> {
        self.position(name)
            .map(move |position| &mut self.classes[position])
    }

    /// All classes in insertion order.
    #[must_use]
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Iterate over all classes.
    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    /// Borrow `source` immutably and `destination` mutably.
    ///
    /// Returns `None` if either class is missing or both names denote the same class.
    pub fn pair_mut(&mut self, source: &str, destination: &str) -> Option<(&Class, &mut Class)> {
        let source = self.position(source)?;
        let destination = self.position(destination)?;

        if source < destination {
            let (head, tail) = self.classes.split_at_mut(destination);
            Some((&head[source], &mut tail[0]))
        } else if destination < source {
            let (head, tail) = self.classes.split_at_mut(source);
            Some((&tail[0], &mut head[destination]))
        } else {
            None
        }
    }

    /// Run `pass` on every class in parallel and collect the errors it returned, paired with
    /// the name of the failing class.
    ///
    /// A failing class may be partially transformed; other classes are unaffected.
    pub fn par_for_each_class<F>(&mut self, pass: F) -> Vec<(String, Error)>
    where
        F: Fn(&mut Class) -> Result<()> + Sync + Send,
    {
        self.classes
            .par_iter_mut()
            .filter_map(|class| {
                pass(class).err().map(|error| {
                    let name = class.name().unwrap_or("<invalid>").to_string();
                    (name, error)
                })
            })
            .collect()
    }

    /// Populate the resolved references of every class. Returns the number of entries that
    /// were newly resolved.
    pub fn link_all(&mut self) -> usize {
        let linker = Linker::new(self);
        self.classes
            .par_iter_mut()
            .map(|class| linker.link_class(class))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ClassBuilder;

    #[test]
    fn test_pair_mut() {
        let mut pool = ClassPool::from_classes(vec![
            ClassBuilder::new("demo/A").build(),
            ClassBuilder::new("demo/B").build(),
        ])
        .unwrap();

        let (source, destination) = pool.pair_mut("demo/B", "demo/A").unwrap();
        assert_eq!(source.name().unwrap(), "demo/B");
        assert_eq!(destination.name().unwrap(), "demo/A");

        assert!(pool.pair_mut("demo/A", "demo/A").is_none());
        assert!(pool.pair_mut("demo/A", "demo/Missing").is_none());
    }

    #[test]
    fn test_add_replaces_by_name() {
        let mut pool = ClassPool::new();
        assert_eq!(pool.add(ClassBuilder::new("demo/A").build()).unwrap(), 0);
        assert_eq!(pool.add(ClassBuilder::new("demo/B").build()).unwrap(), 1);
        assert_eq!(
            pool.add(ClassBuilder::new("demo/A").field("x", "I").build())
                .unwrap(),
            0
        );

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("demo/A").unwrap().members.len(), 1);
    }

    #[test]
    fn test_par_for_each_class_collects_errors() {
        let mut pool = ClassPool::from_classes(vec![
            ClassBuilder::new("demo/A").build(),
            ClassBuilder::new("demo/B").build(),
        ])
        .unwrap();

        let errors = pool.par_for_each_class(|class| {
            if class.name()? == "demo/B" {
                Err(Error::ComposerState("failed".into()))
            } else {
                Ok(())
            }
        });

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "demo/B");
    }
}
