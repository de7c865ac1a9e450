//! Render graph executor
//!
//! A [`CompiledGraph`] holds the barriers computed by a build: a prologue
//! that returns drifted Declared resources to their initial state, then one
//! batch per pass. Transitions are stored by resource id and resolved to
//! concrete backings only when recorded, so imported backings swapped after
//! the build are still honoured.

use std::any::Any;

use smallvec::SmallVec;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::transition::ResourceTransition;

/// Barriers of one pass; most passes need only a handful.
pub type PassBarriers = SmallVec<[ResourceTransition; 4]>;

/// Transition schedule produced by [`RenderGraph::build`](crate::RenderGraph::build).
#[derive(Debug, Default)]
pub struct CompiledGraph {
    prologue: Vec<ResourceTransition>,
    pass_barriers: Vec<PassBarriers>,
}

impl CompiledGraph {
    pub(crate) fn new(prologue: Vec<ResourceTransition>, pass_barriers: Vec<PassBarriers>) -> Self {
        Self {
            prologue,
            pass_barriers,
        }
    }

    /// Transitions recorded before the first pass.
    pub fn prologue(&self) -> &[ResourceTransition] {
        &self.prologue
    }

    /// Transitions recorded immediately before `pass`.
    pub fn pass_barriers(&self, pass: PassId) -> &[ResourceTransition] {
        self.pass_barriers
            .get(pass.index())
            .map(|barriers| barriers.as_slice())
            .unwrap_or(&[])
    }

    pub fn pass_count(&self) -> usize {
        self.pass_barriers.len()
    }

    /// Total number of scheduled transitions, prologue included.
    pub fn barrier_count(&self) -> usize {
        self.prologue.len() + self.pass_barriers.iter().map(|b| b.len()).sum::<usize>()
    }

    /// Record the schedule and run every pass, then hand imports back.
    pub(crate) fn execute<D: RenderDevice + 'static>(
        self,
        registry: &mut ResourceRegistry,
        passes: &[Box<dyn RenderPass>],
        nodes: &[PassNode],
        device: &mut D,
        command_list: CommandListHandle,
    ) {
        record_transitions(registry, device, command_list, &self.prologue);

        for ((pass, node), barriers) in passes.iter().zip(nodes).zip(&self.pass_barriers) {
            record_transitions(registry, device, command_list, barriers);

            log::trace!("Executing pass '{}' at depth {}", node.name, node.depth());
            let mut ctx = PassExecuteContext {
                device: &mut *device as &mut dyn Any,
                command_list,
                depth: node.depth(),
                registry: &mut *registry,
            };
            pass.execute(&mut ctx);
        }

        let exits = registry.imported_exit_transitions();
        record_transitions(registry, device, command_list, &exits);

        log::debug!(
            "Executed {} passes ({} scheduled barriers, {} exit transitions)",
            passes.len(),
            self.barrier_count(),
            exits.len()
        );
    }
}

/// Resolve transitions to device barriers and record them as one batch.
fn record_transitions<D: RenderDevice + ?Sized>(
    registry: &mut ResourceRegistry,
    device: &mut D,
    command_list: CommandListHandle,
    transitions: &[ResourceTransition],
) {
    if transitions.is_empty() {
        return;
    }

    let mut barriers: SmallVec<[GpuBarrier; 8]> = SmallVec::with_capacity(transitions.len());
    for transition in transitions {
        match registry.get(&transition.id) {
            Some(resource) => barriers.push(GpuBarrier::transition(
                resource,
                transition.before,
                transition.after,
            )),
            None => log::warn!(
                "Skipping transition of '{}': resource has no backing",
                transition.id
            ),
        }
    }

    if !barriers.is_empty() {
        device.emit_barriers(command_list, &barriers);
    }
}
