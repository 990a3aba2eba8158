//! Approve/reject policy for accessor candidates.
//!
//! A candidate is approved only with full knowledge of the field's declaring
//! class: it resolves to a concrete, in-scope declaration whose static-ness and
//! type match the access, every call site reaches the accessor by direct
//! dispatch from a concrete, non-excluded class, and every caller can reach
//! the field once it is inlined (possibly after widening its visibility).

use super::detector::AccessorCandidate;
use super::report::ReasonCode;
use super::resolver::{ExternalCause, FieldResolution, FieldResolver};
use crate::config::ExclusionFilter;
use crate::ir::{Field, FieldRef, InvokeKind, Program, Visibility};
use crate::optimizer::analysis::{CallSiteIndex, ClassHierarchy};
use tracing::debug;

/// An approved candidate plus what committing it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub candidate: AccessorCandidate,
    /// The declaration the access resolves to
    pub declared: FieldRef,
    /// New visibility for the declaration, if callers cannot reach it today
    pub relax_to: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Approved(Approval),
    Rejected {
        candidate: AccessorCandidate,
        reason: ReasonCode,
        detail: String,
    },
}

impl Classification {
    pub fn candidate(&self) -> &AccessorCandidate {
        match self {
            Classification::Approved(approval) => &approval.candidate,
            Classification::Rejected { candidate, .. } => candidate,
        }
    }
}

pub struct SafetyClassifier<'a> {
    resolver: FieldResolver<'a>,
    hierarchy: &'a ClassHierarchy,
    call_sites: &'a CallSiteIndex,
    filter: &'a ExclusionFilter,
    relax_field_visibility: bool,
}

impl<'a> SafetyClassifier<'a> {
    pub fn new(
        program: &'a Program,
        hierarchy: &'a ClassHierarchy,
        call_sites: &'a CallSiteIndex,
        filter: &'a ExclusionFilter,
        relax_field_visibility: bool,
    ) -> Self {
        Self {
            resolver: FieldResolver::new(program),
            hierarchy,
            call_sites,
            filter,
            relax_field_visibility,
        }
    }

    pub fn classify(&self, candidate: AccessorCandidate) -> Classification {
        match self.check(&candidate) {
            Ok((declared, relax_to)) => {
                debug!("approved accessor {} for {}", candidate.method, declared);
                Classification::Approved(Approval {
                    candidate,
                    declared,
                    relax_to,
                })
            }
            Err((reason, detail)) => {
                debug!(
                    "rejected accessor {} ({}): {}",
                    candidate.method, reason, detail
                );
                Classification::Rejected {
                    candidate,
                    reason,
                    detail,
                }
            }
        }
    }

    fn check(
        &self,
        candidate: &AccessorCandidate,
    ) -> Result<(FieldRef, Option<Visibility>), (ReasonCode, String)> {
        let field = match self.resolver.resolve_ref(&candidate.field) {
            FieldResolution::Concrete(field) => field,
            FieldResolution::External(cause) => {
                let reason = match &cause {
                    ExternalCause::NonConcreteAncestor(_) | ExternalCause::Unresolved => {
                        ReasonCode::UnsafeExternalField
                    }
                    ExternalCause::MissingClass(_) => ReasonCode::AmbiguousResolution,
                    ExternalCause::Cycle(_) => ReasonCode::HierarchyCycle,
                };
                return Err((reason, format!("{}: {}", candidate.field, cause)));
            }
        };

        if self.filter.is_excluded(&field.owner) || self.filter.is_excluded(&candidate.field.owner)
        {
            return Err((
                ReasonCode::ExcludedClass,
                format!("{} is declared in an excluded class", candidate.field),
            ));
        }

        if field.is_static() != candidate.static_field || field.ty != candidate.field.ty {
            return Err((
                ReasonCode::AmbiguousResolution,
                format!(
                    "{} resolves to {} with mismatched kind or type",
                    candidate.field,
                    field.to_ref()
                ),
            ));
        }

        let expected = if candidate.instance_method {
            InvokeKind::Direct
        } else {
            InvokeKind::Static
        };
        let sites = self.call_sites.sites(&candidate.method);
        if let Some(site) = sites.iter().find(|site| site.kind != expected) {
            return Err((
                ReasonCode::NonDirectDispatch,
                format!(
                    "{}@{} invokes it with {:?} dispatch",
                    site.caller, site.position, site.kind
                ),
            ));
        }

        // A caller that cannot be rewritten would keep the accessor alive.
        for site in sites {
            let owner = site.caller.owner.as_str();
            if self.filter.is_excluded(owner) {
                return Err((
                    ReasonCode::ExcludedClass,
                    format!("called from {} in an excluded class", site.caller),
                ));
            }
            if !self.hierarchy.is_concrete(owner) {
                return Err((
                    ReasonCode::ExcludedClass,
                    format!("called from {} in non-concrete class {}", site.caller, owner),
                ));
            }
        }

        let callers: Vec<&str> = sites
            .iter()
            .map(|site| site.caller.owner.as_str())
            .collect();
        let relax_to = self.required_visibility(field, &callers);
        if relax_to.is_some() && !self.relax_field_visibility {
            return Err((
                ReasonCode::InaccessibleField,
                format!("{} is not accessible from every caller", field.to_ref()),
            ));
        }

        Ok((field.to_ref(), relax_to))
    }

    /// Visibility the declaration needs so every caller can access it
    /// directly, or `None` if it is already reachable.
    fn required_visibility(&self, field: &Field, callers: &[&str]) -> Option<Visibility> {
        let current = field.visibility();
        if callers
            .iter()
            .all(|caller| self.is_accessible(field, current, caller))
        {
            return None;
        }

        let needed = if callers
            .iter()
            .all(|caller| self.hierarchy.same_package(caller, &field.owner))
        {
            Visibility::Package
        } else {
            Visibility::Public
        };
        (needed > current).then_some(needed)
    }

    fn is_accessible(&self, field: &Field, visibility: Visibility, from: &str) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Private => from == field.owner,
            Visibility::Package => self.hierarchy.same_package(from, &field.owner),
            Visibility::Protected => {
                self.hierarchy.same_package(from, &field.owner)
                    || self.hierarchy.is_subclass_of(from, &field.owner)
            }
        }
    }
}
