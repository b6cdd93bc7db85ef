#![warn(clippy::all)]

pub mod acquisition;
pub mod attribute;
pub mod configs;
pub mod controller;
pub mod error;
pub mod lockbox;
pub mod mock;
pub mod models;
pub mod signal;
pub mod spectrum;
pub mod util;

pub use crate::acquisition::{AcquisitionEvent, AcquisitionStatus, RunningState};
pub use crate::attribute::{AttributeSet, FloatAttribute};
pub use crate::controller::{LockController, LockRequest, SpectrumAnalyzer};
pub use crate::error::{LockboxError, Result};
pub use crate::lockbox::{LockState, Lockbox};
pub use crate::models::{InputModel, LockboxKind};
pub use crate::signal::{InputSignal, SignalModel, Statistics};
pub use crate::spectrum::SpectrumPanel;
