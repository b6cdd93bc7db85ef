#![warn(clippy::pedantic)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LockboxError>;

/// Steps of a composite lock recipe, used to tag the step that aborted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CalibrateAll,
    Unlock,
    Lock,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::CalibrateAll => write!(f, "calibrate_all"),
            Step::Unlock => write!(f, "unlock"),
            Step::Lock => write!(f, "lock"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LockboxError {
    #[error("value {value} for '{name}' is outside [{min}, {max}]")]
    Range {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("channel '{0}' is declared twice")]
    DuplicateChannel(String),

    #[error("channel sets are frozen once the lockbox is active")]
    ChannelsFrozen,

    #[error("input '{input}' expects variable '{expected}', lockbox controls '{variable}'")]
    VariableMismatch {
        input: String,
        expected: String,
        variable: String,
    },

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("calibration trace for '{0}' is empty")]
    EmptyTrace(String),

    #[error("calibration trace for '{0}' contains non-finite samples")]
    NonFiniteTrace(String),

    #[error("calibration of '{signal}' is degenerate: constant signal at {value}")]
    CalibrationDegenerate { signal: String, value: f64 },

    #[error("slope of '{input}' at setpoint {setpoint} is ill-conditioned ({slope})")]
    IllConditionedSlope {
        input: String,
        setpoint: f64,
        slope: f64,
    },

    #[error("no lock target configured")]
    NoLockTarget,

    #[error("controller error: {0}")]
    Controller(String),

    #[error("sequence aborted at step {step}: {source}")]
    SequenceAborted {
        step: Step,
        #[source]
        source: Box<LockboxError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse setup: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize setup: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl From<String> for LockboxError {
    fn from(msg: String) -> Self {
        LockboxError::Config(msg)
    }
}

impl LockboxError {
    /// The error that started an aborted sequence, or `self` otherwise.
    #[must_use]
    pub fn root(&self) -> &LockboxError {
        match self {
            LockboxError::SequenceAborted { source, .. } => source.root(),
            other => other,
        }
    }
}
