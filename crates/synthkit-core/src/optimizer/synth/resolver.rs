//! Field resolution across the concrete/external boundary.
//!
//! Resolution walks the superclass chain from the referenced owner. The first
//! non-concrete class ends the walk: its member list is unknown, so it may
//! declare or shadow the field, and nothing above it can be trusted.

use crate::ir::{Field, FieldRef, Program};
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::warn;

/// Outcome of resolving a field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResolution<'p> {
    /// Declared by a concrete class on the walk.
    Concrete(&'p Field),
    External(ExternalCause),
}

impl<'p> FieldResolution<'p> {
    pub fn is_concrete(&self) -> bool {
        matches!(self, FieldResolution::Concrete(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCause {
    /// The walk reached a class whose member list is unknown.
    NonConcreteAncestor(String),
    /// The chain ended without a declaration.
    Unresolved,
    /// The walk reached a class the snapshot does not contain at all.
    MissingClass(String),
    /// The superclass chain loops back on itself at this class.
    Cycle(String),
}

impl fmt::Display for ExternalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalCause::NonConcreteAncestor(class) => {
                write!(f, "walk reached non-concrete class {class}")
            }
            ExternalCause::Unresolved => f.write_str("no concrete class declares the field"),
            ExternalCause::MissingClass(class) => {
                write!(f, "class {class} is absent from the snapshot")
            }
            ExternalCause::Cycle(class) => write!(f, "superclass cycle through {class}"),
        }
    }
}

pub struct FieldResolver<'p> {
    program: &'p Program,
}

impl<'p> FieldResolver<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    pub fn resolve_ref(&self, field: &FieldRef) -> FieldResolution<'p> {
        self.resolve(&field.owner, &field.name)
    }

    /// Resolve `field_name` starting at `field_owner`.
    pub fn resolve(&self, field_owner: &str, field_name: &str) -> FieldResolution<'p> {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut current: &str = field_owner;

        loop {
            if !visited.insert(current) {
                warn!(
                    "superclass cycle through {} while resolving {}.{}",
                    current, field_owner, field_name
                );
                return FieldResolution::External(ExternalCause::Cycle(current.to_string()));
            }

            let Some(class) = self.program.class(current) else {
                return FieldResolution::External(ExternalCause::MissingClass(
                    current.to_string(),
                ));
            };

            if !class.concrete {
                return FieldResolution::External(ExternalCause::NonConcreteAncestor(
                    current.to_string(),
                ));
            }

            if let Some(field) = class.field(field_name) {
                return FieldResolution::Concrete(field);
            }

            match &class.super_class {
                Some(parent) => current = parent,
                None => return FieldResolution::External(ExternalCause::Unresolved),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AccessFlags, ClassUnit};

    fn class(name: &str, parent: Option<&str>, concrete: bool, fields: &[&str]) -> ClassUnit {
        let mut unit = ClassUnit::new(name, parent.map(String::from), concrete);
        for field in fields {
            unit.fields.insert(
                field.to_string(),
                Field {
                    owner: name.to_string(),
                    name: field.to_string(),
                    ty: "I".to_string(),
                    access: AccessFlags::PROTECTED,
                },
            );
        }
        unit
    }

    #[test]
    fn test_concrete_field_in_owner() {
        let mut program = Program::new();
        program.add_class(class("LAlpha;", None, true, &["x"]));
        let resolver = FieldResolver::new(&program);
        match resolver.resolve("LAlpha;", "x") {
            FieldResolution::Concrete(field) => assert_eq!(field.owner, "LAlpha;"),
            other => panic!("expected concrete, got {other:?}"),
        }
    }

    #[test]
    fn test_concrete_field_inherited_through_concrete_parent() {
        let mut program = Program::new();
        program.add_class(class("LBase;", None, true, &["x"]));
        program.add_class(class("LDerived;", Some("LBase;"), true, &[]));
        let resolver = FieldResolver::new(&program);
        match resolver.resolve("LDerived;", "x") {
            FieldResolution::Concrete(field) => assert_eq!(field.owner, "LBase;"),
            other => panic!("expected concrete, got {other:?}"),
        }
    }

    #[test]
    fn test_non_concrete_ancestor_is_external() {
        let mut program = Program::new();
        program.add_class(class("Ljava/io/FilterWriter;", None, false, &["out"]));
        program.add_class(class("LGamma;", Some("Ljava/io/FilterWriter;"), true, &[]));
        let resolver = FieldResolver::new(&program);
        assert_eq!(
            resolver.resolve("LGamma;", "out"),
            FieldResolution::External(ExternalCause::NonConcreteAncestor(
                "Ljava/io/FilterWriter;".to_string()
            ))
        );
    }

    #[test]
    fn test_unknown_ancestor_hides_visible_declaration_above_it() {
        let mut program = Program::new();
        program.add_class(class("LTop;", None, true, &["x"]));
        program.add_class(class("Llib/Middle;", Some("LTop;"), false, &[]));
        program.add_class(class("LBottom;", Some("Llib/Middle;"), true, &[]));
        let resolver = FieldResolver::new(&program);
        assert!(!resolver.resolve("LBottom;", "x").is_concrete());
    }

    #[test]
    fn test_exhausted_chain_is_external() {
        let mut program = Program::new();
        program.add_class(class("LAlpha;", None, true, &[]));
        let resolver = FieldResolver::new(&program);
        assert_eq!(
            resolver.resolve("LAlpha;", "x"),
            FieldResolution::External(ExternalCause::Unresolved)
        );
    }

    #[test]
    fn test_missing_class_is_external() {
        let mut program = Program::new();
        program.add_class(class("LAlpha;", Some("LGone;"), true, &[]));
        let resolver = FieldResolver::new(&program);
        assert_eq!(
            resolver.resolve("LAlpha;", "x"),
            FieldResolution::External(ExternalCause::MissingClass("LGone;".to_string()))
        );
    }

    #[test]
    fn test_cycle_terminates_as_external() {
        let mut program = Program::new();
        program.add_class(class("LA;", Some("LB;"), true, &[]));
        program.add_class(class("LB;", Some("LA;"), true, &[]));
        let resolver = FieldResolver::new(&program);
        assert_eq!(
            resolver.resolve("LA;", "x"),
            FieldResolution::External(ExternalCause::Cycle("LA;".to_string()))
        );
    }
}
