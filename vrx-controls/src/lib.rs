//! Camera control composition.
//!
//! Control strategies each own a gimbal node and chain onto the camera rig
//! one after another. [`ControlsCoordinator`] decides which are chained and
//! drives them once per frame.
//!
//! ## Modules
//!
//! - [`control`]: the [`CameraControl`] capability shared by all strategies
//! - [`mouse`], [`hmd`], [`path`], [`infinite`]: the strategies
//! - [`chain`]: chain layout and the pure re-chain planner
//! - [`coordinator`]: the owner of the chain

pub mod chain;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod hmd;
pub mod infinite;
pub mod input;
pub mod mouse;
pub mod path;

pub use chain::{ChainStep, GimbalChain, plan_rechain};
pub use control::{CameraControl, ControlId, ControlKind, ControlState};
pub use coordinator::ControlsCoordinator;
pub use error::ControlError;
pub use hmd::{DeviceError, DevicePose, HmdControl, HmdDevice, HmdEvent, NullDevice};
pub use infinite::InfiniteControl;
pub use input::{InputState, PointerSample};
pub use mouse::{MouseLookConfig, MouseLookControl};
pub use path::{CatmullRomCurve, Curve, LineCurve, PathFollowerControl, PathOptions};
