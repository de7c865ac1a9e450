//! Transition scheduling
//!
//! Each Declared/Imported root carries a single tracked state shared by its
//! whole alias chain. An access requiring a different state produces one
//! [`ResourceTransition`] and moves the tracked state along; a matching
//! state produces nothing.

use crate::backend::types::ResourceState;
use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::resource::{ResourceId, ResourceVariant};

/// A state change of one resource, resolved to a device barrier on execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTransition {
    pub id: ResourceId,
    pub before: ResourceState,
    pub after: ResourceState,
}

impl ResourceRegistry {
    /// Move `id` into `required`, returning the transition if one is needed.
    pub fn request_state(
        &mut self,
        id: &ResourceId,
        required: ResourceState,
    ) -> Option<ResourceTransition> {
        let before = self.current_state(id);
        if before == required {
            return None;
        }

        self.set_current_state(id, required);
        log::trace!("Transition '{}': {:?} -> {:?}", id, before, required);
        Some(ResourceTransition {
            id: id.clone(),
            before,
            after: required,
        })
    }

    /// Assume every Imported resource is back in its entry state.
    ///
    /// The external owner guarantees the entry state between frames, so no
    /// barrier is produced. Returns the number of records that were reset.
    pub fn reset_imported_to_entry(&mut self) -> usize {
        let mut reset = 0;
        for key in self.keys() {
            if let ResourceVariant::Imported(imported) = &mut self.record_mut(key).variant {
                if imported.current_state != imported.entry_state {
                    imported.current_state = imported.entry_state;
                    reset += 1;
                }
            }
        }
        reset
    }

    /// Hand every Imported resource back in its exit state.
    ///
    /// Returns the transitions needed to reach the exit states, then resets
    /// the tracked state to the entry state for the next build.
    pub fn imported_exit_transitions(&mut self) -> Vec<ResourceTransition> {
        let mut transitions = Vec::new();
        for key in self.keys() {
            let record = self.record_mut(key);
            let id = record.id.clone();
            if let ResourceVariant::Imported(imported) = &mut record.variant {
                if imported.current_state != imported.exit_state {
                    transitions.push(ResourceTransition {
                        id,
                        before: imported.current_state,
                        after: imported.exit_state,
                    });
                }
                imported.current_state = imported.entry_state;
            }
        }
        transitions
    }

    /// Bring every Declared resource back to its declared initial state.
    ///
    /// Nothing is produced for resources created in this build; only records
    /// whose state drifted during an earlier build need a transition.
    pub fn declared_transitions_to_init(&mut self) -> Vec<ResourceTransition> {
        let mut transitions = Vec::new();
        for key in self.keys() {
            let record = self.record_mut(key);
            let id = record.id.clone();
            if let ResourceVariant::Declared(declared) = &mut record.variant {
                let init = declared.desc.initial_state();
                if declared.current_state != init {
                    transitions.push(ResourceTransition {
                        id,
                        before: declared.current_state,
                        after: init,
                    });
                    declared.current_state = init;
                }
            }
        }
        transitions
    }
}
