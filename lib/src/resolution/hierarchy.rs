use super::ClassResolver;
use crate::jvm::model::{ClassModel, MethodModel};
use crate::jvm::{BinaryName, MethodAccessFlags};
use crate::scope::ScopeFilter;
use std::collections::HashSet;
use std::sync::Arc;

/// Method inherited from an unchecked ancestor and not re-declared by the class being woven
#[derive(Clone, Debug, PartialEq)]
pub struct ParentMethod {
    /// Ancestor declaring the method
    pub owner: BinaryName,

    pub method: MethodModel,
}

/// Finds inherited methods which could need a bridge
pub trait HierarchyResolver: Send + Sync {
    /// Methods inherited by `class` from ancestors outside of the `checked` scope
    ///
    /// The ancestor chain is walked upwards from the direct superclass and stops at the first
    /// checked ancestor. The result is ordered from closest ancestor to furthest.
    fn resolve_bridge_candidates(
        &self,
        class: &ClassModel,
        checked: &dyn ScopeFilter,
    ) -> Vec<ParentMethod>;
}

/// Hierarchy resolver which loads ancestors through a [`ClassResolver`]
pub struct BytecodeHierarchyResolver {
    resolver: Arc<dyn ClassResolver>,
}

impl BytecodeHierarchyResolver {
    pub fn new(resolver: Arc<dyn ClassResolver>) -> BytecodeHierarchyResolver {
        BytecodeHierarchyResolver { resolver }
    }
}

impl HierarchyResolver for BytecodeHierarchyResolver {
    fn resolve_bridge_candidates(
        &self,
        class: &ClassModel,
        checked: &dyn ScopeFilter,
    ) -> Vec<ParentMethod> {
        let mut seen_signatures: HashSet<String> =
            class.methods.iter().map(MethodModel::signature).collect();
        let mut candidates = vec![];

        let mut current = class.superclass.clone();
        while let Some(ancestor_name) = current {
            if ancestor_name == BinaryName::OBJECT {
                break;
            }
            if checked.test(&ancestor_name) {
                log::debug!(
                    "Stopping hierarchy walk of {} at checked ancestor {}",
                    class.name,
                    ancestor_name
                );
                break;
            }
            let ancestor = match self.resolver.load(&ancestor_name) {
                Ok(ancestor) => ancestor,
                Err(err) => {
                    log::warn!("Truncating hierarchy walk of {}: {}", class.name, err);
                    break;
                }
            };

            for method in &ancestor.methods {
                if method.is_initializer()
                    || method.access_flags.intersects(
                        MethodAccessFlags::PRIVATE
                            | MethodAccessFlags::STATIC
                            | MethodAccessFlags::SYNTHETIC
                            | MethodAccessFlags::BRIDGE,
                    )
                {
                    continue;
                }

                // Final and abstract declarations still hide the same signature further up
                let first_declaration = seen_signatures.insert(method.signature());
                if !first_declaration
                    || method.access_flags.intersects(MethodAccessFlags::NOT_OVERRIDABLE)
                    || method.access_flags.contains(MethodAccessFlags::ABSTRACT)
                {
                    continue;
                }

                candidates.push(ParentMethod {
                    owner: ancestor.name.clone(),
                    method: method.clone(),
                });
            }

            current = ancestor.superclass;
        }

        candidates
    }
}
