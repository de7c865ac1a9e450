//! Backend abstraction layer
//!
//! Provides the device trait the render graph allocates through, the shared
//! descriptor/state types, and an in-memory device used for testing.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::DummyDevice;
pub use traits::*;
pub use types::*;
