//! Error types for camera control and gimbal chaining.

use thiserror::Error;
use vrx_core::{NodeId, SceneError};

use crate::control::{ControlId, ControlKind};

/// Errors raised by controls and the coordinator.
///
/// Chaining errors are programmer errors: the scene graph is left exactly as
/// it was found at the failing step and the error is reported, never patched
/// over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("{kind} control is already chained")]
    AlreadyChained { kind: ControlKind },

    #[error("{kind} control is not chained")]
    NotChained { kind: ControlKind },

    #[error("{kind} control unchained from wrong tip: expected {expected:?}, found {found:?}")]
    WrongTip {
        kind: ControlKind,
        expected: NodeId,
        found: NodeId,
    },

    #[error("unknown control {0:?}")]
    UnknownControl(ControlId),

    #[error("control {0:?} is a base control and cannot be layered or removed")]
    BaseControl(ControlId),

    #[error("control {0:?} is still chained")]
    ControlInUse(ControlId),

    #[error("path follower has no active path")]
    NotFollowing,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}
