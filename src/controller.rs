#![warn(clippy::pedantic)]

//! Contracts of the acquisition/lock engine. The engine itself lives outside
//! this crate; calls into it may block and carry their own timeout and
//! cancellation behavior.

use crate::acquisition::AcquisitionStatus;
use crate::error::Result;

/// Everything the engine needs to close the loop on one input.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRequest {
    pub input: String,
    pub variable: String,
    pub setpoint: f64,
    /// expected signal at the setpoint, i.e. the error-signal offset
    pub setpoint_signal: f64,
    /// d(signal)/d(variable) at the setpoint, from which the engine derives its gain
    pub slope: f64,
}

pub trait LockController {
    /// Start an open-loop scan of the control variable.
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn sweep(&mut self) -> Result<()>;

    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn lock(&mut self, request: &LockRequest) -> Result<()>;

    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn unlock(&mut self) -> Result<()>;

    /// Acquire a trace of `input` during the current sweep.
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn acquire(&mut self, input: &str) -> Result<Vec<f64>>;
}

pub trait SpectrumAnalyzer {
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn continuous(&mut self) -> Result<()>;
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn pause(&mut self) -> Result<()>;
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn stop(&mut self) -> Result<()>;
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn single_async(&mut self) -> Result<()>;
    /// # Errors
    /// Any engine failure, reported as `LockboxError::Controller`.
    fn save_curve(&mut self) -> Result<()>;

    fn status(&self) -> AcquisitionStatus;
    /// resolution bandwidth of the current run, in Hz
    fn rbw(&self) -> f64;
}
