//! vrx runtime application
//!
//! Wires the scene graph, camera controls, experiment transitions and the
//! sequencer into one [`Runtime`] driven frame by frame. Built-in demo
//! experiments and simulated devices let it run without a window.

pub mod app;
pub mod config;
pub mod demo;

pub use app::{AppError, Command, CommandQueue, RunOptions, Runtime, init_tracing, run};
pub use config::{ConfigError, PathConfig, RuntimeConfig};
