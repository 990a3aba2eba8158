//! Whole-program index of invocation sites.

use crate::ir::{Instruction, InvokeKind, MethodRef, Program};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// One invoke instruction: the method containing it and its position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSite {
    pub caller: MethodRef,
    pub position: usize,
    pub kind: InvokeKind,
}

/// Callee -> call sites, each list sorted by (caller, position).
#[derive(Debug, Default, Clone)]
pub struct CallSiteIndex {
    sites: FxHashMap<MethodRef, Vec<CallSite>>,
}

impl CallSiteIndex {
    /// Scan every method body. Classes are scanned in parallel; the merged
    /// lists are sorted so the index does not depend on class order.
    pub fn build(program: &Program) -> Self {
        let per_class: Vec<Vec<(MethodRef, CallSite)>> = program
            .classes
            .par_values()
            .map(|class| {
                let mut found = Vec::new();
                for method in class.methods.values() {
                    for (position, insn) in method.instructions().iter().enumerate() {
                        if let Instruction::Invoke { kind, method: callee, .. } = insn {
                            found.push((
                                callee.clone(),
                                CallSite {
                                    caller: method.method_ref(),
                                    position,
                                    kind: *kind,
                                },
                            ));
                        }
                    }
                }
                found
            })
            .collect();

        let mut sites: FxHashMap<MethodRef, Vec<CallSite>> = FxHashMap::default();
        for (callee, site) in per_class.into_iter().flatten() {
            sites.entry(callee).or_default().push(site);
        }
        for list in sites.values_mut() {
            list.sort();
        }

        Self { sites }
    }

    pub fn sites(&self, callee: &MethodRef) -> &[CallSite] {
        self.sites.get(callee).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, callee: &MethodRef) -> usize {
        self.sites(callee).len()
    }
}
