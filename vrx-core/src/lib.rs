//! vrx core
//!
//! Shared primitives for the vrx runtime:
//!
//! - [`scene`]: the scene graph adapter the control and transition engines mutate
//! - [`resume`]: one-shot continuations and cancellation tokens

pub mod resume;
pub mod scene;

pub use resume::{CancellationToken, Resume};
pub use scene::{MemoryScene, NodeId, SceneError, SceneGraph};
