//! Class hierarchy information for field resolution and access checks.

use crate::ir::{package_of, Program};
use rustc_hash::{FxHashMap, FxHashSet};

/// Superclass links and concreteness of every class in the snapshot.
#[derive(Debug, Default, Clone)]
pub struct ClassHierarchy {
    /// class -> parent (None if the class has no superclass)
    parent_of: FxHashMap<String, Option<String>>,
    /// class -> full member list known
    concrete: FxHashMap<String, bool>,
}

impl ClassHierarchy {
    /// Build the hierarchy by scanning every class of the program
    pub fn build(program: &Program) -> Self {
        let mut hierarchy = ClassHierarchy::default();

        for class in program.classes.values() {
            hierarchy
                .parent_of
                .insert(class.name.clone(), class.super_class.clone());
            hierarchy.concrete.insert(class.name.clone(), class.concrete);
        }

        hierarchy
    }

    pub fn is_concrete(&self, class: &str) -> bool {
        self.concrete.get(class).copied().unwrap_or(false)
    }

    /// Superclass of `class`, if the class is known and has one.
    pub fn parent(&self, class: &str) -> Option<&str> {
        self.parent_of.get(class)?.as_deref()
    }

    /// Returns true if `class` is `ancestor` or inherits from it. Stops on
    /// unknown classes and on cycles.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut seen = FxHashSet::default();
        let mut current = Some(class);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            current = self.parent(name);
        }
        false
    }

    pub fn same_package(&self, a: &str, b: &str) -> bool {
        package_of(a) == package_of(b)
    }
}
