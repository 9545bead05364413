//! Error types for the demo

use crate::device::DeviceError;
use crate::scheduler::SchedulerError;
use thiserror::Error;

/// Result type for setup and frame operations
pub type AppResult<T> = Result<T, AppError>;

/// Fatal errors; each one ends the program with a non-zero status
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to initialize haptic device: {0}")]
    DeviceInit(#[from] DeviceError),

    #[error("Failed to start scheduler: {0}")]
    SchedulerStart(SchedulerError),

    #[error("Failed to schedule force feedback: {0}")]
    Schedule(SchedulerError),

    #[error("The main scheduler callback has exited")]
    CallbackExited,

    #[error("Terminal error: {0:#}")]
    Terminal(#[from] anyhow::Error),
}
