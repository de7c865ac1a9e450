//! Render graph error types.

use thiserror::Error;

use crate::backend::traits::BackendError;
use crate::render_graph::resource::ResourceId;

/// Runtime failures of a graph build or execution.
///
/// Malformed declarations (duplicate or unknown ids, double aliasing) are
/// not represented here; they panic at the call site.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// An alias starts before its parent's last access.
    #[error(
        "resource '{alias}' aliases '{parent}' at depth {alias_start}, \
         but '{parent}' is still used until depth {parent_end}"
    )]
    AliasingLifetimeOverlap {
        alias: ResourceId,
        parent: ResourceId,
        parent_end: u32,
        alias_start: u32,
    },
    /// Execution requested without a successful build.
    #[error("render graph has not been built")]
    NotBuilt,
    /// The device failed to provide backing memory.
    #[error("backing allocation failed: {0}")]
    Backend(#[from] BackendError),
}

pub type GraphResult<T> = Result<T, GraphError>;
