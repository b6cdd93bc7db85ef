#![warn(clippy::pedantic)]

//! Experiment variants: the signal models and the lockbox kinds built from them.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::attribute::{AttributeSet, FloatAttribute};
use crate::error::{LockboxError, Result};
use crate::signal::{SignalContext, SignalModel};

const CUSTOM_INPUT_SCHEMA: &[FloatAttribute] = &[FloatAttribute::new(
    "custom_gain_attribute",
    1.0,
    -1e10,
    1e10,
)
.increment(0.01)
.doc("custom factor for each input signal")];

const CUSTOM_LOCKBOX_SCHEMA: &[FloatAttribute] =
    &[FloatAttribute::new("custom_attribute", 1.0, 1e-5, 1e5).increment(0.01)];

const INTERFEROMETER_SCHEMA: &[FloatAttribute] = &[FloatAttribute::new(
    "wavelength",
    1.064,
    0.0,
    10000.0,
)
.increment(0.001)
.doc("laser wavelength in um")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputModel {
    /// Signal quadratic in the displacement, scaled by a per-input and a
    /// lockbox-wide coefficient.
    Custom,
    InterferometerPort1,
    InterferometerPort2,
}

impl SignalModel for InputModel {
    fn variable(&self) -> &'static str {
        match self {
            InputModel::Custom => "displacement",
            InputModel::InterferometerPort1 | InputModel::InterferometerPort2 => "phase",
        }
    }

    fn schema(&self) -> &'static [FloatAttribute] {
        match self {
            InputModel::Custom => CUSTOM_INPUT_SCHEMA,
            InputModel::InterferometerPort1 | InputModel::InterferometerPort2 => &[],
        }
    }

    fn expected_signal(&self, ctx: &SignalContext<'_>, x: f64) -> f64 {
        let s = ctx.stats;
        match self {
            InputModel::Custom => s.min + custom_gain(ctx) * x * x,
            InputModel::InterferometerPort1 => s.mean + 0.5 * s.range() * x.sin(),
            InputModel::InterferometerPort2 => s.mean - 0.5 * s.range() * x.sin(),
        }
    }

    fn expected_slope(&self, ctx: &SignalContext<'_>, x: f64) -> f64 {
        match self {
            InputModel::Custom => 2.0 * custom_gain(ctx) * x,
            // no closed form is declared for port 1; it goes through the finite difference
            InputModel::InterferometerPort1 => {
                crate::signal::numerical_slope(|v| self.expected_signal(ctx, v), x)
            }
            InputModel::InterferometerPort2 => -0.5 * ctx.stats.range() * x.cos(),
        }
    }
}

fn custom_gain(ctx: &SignalContext<'_>) -> f64 {
    ctx.own.value_or("custom_gain_attribute", 1.0) * ctx.lockbox.value_or("custom_attribute", 1.0)
}

/// Registered lockbox kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockboxKind {
    Custom,
    Interferometer,
}

impl fmt::Display for LockboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockboxKind::Custom => write!(f, "custom"),
            LockboxKind::Interferometer => write!(f, "interferometer"),
        }
    }
}

impl FromStr for LockboxKind {
    type Err = LockboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "custom" | "customlockbox" => Ok(LockboxKind::Custom),
            "interferometer" => Ok(LockboxKind::Interferometer),
            other => Err(LockboxError::Config(format!("unknown lockbox kind '{other}'"))),
        }
    }
}

impl LockboxKind {
    #[must_use]
    pub fn variable(self) -> &'static str {
        match self {
            LockboxKind::Custom => "displacement",
            LockboxKind::Interferometer => "phase",
        }
    }

    #[must_use]
    pub fn schema(self) -> &'static [FloatAttribute] {
        match self {
            LockboxKind::Custom => CUSTOM_LOCKBOX_SCHEMA,
            LockboxKind::Interferometer => INTERFEROMETER_SCHEMA,
        }
    }

    /// Input channels in declaration order.
    #[must_use]
    pub fn inputs(self) -> &'static [(&'static str, InputModel)] {
        match self {
            LockboxKind::Custom => &[
                ("custom_input_name1", InputModel::Custom),
                ("custom_input_name2", InputModel::Custom),
            ],
            LockboxKind::Interferometer => &[
                ("port1", InputModel::InterferometerPort1),
                ("port2", InputModel::InterferometerPort2),
            ],
        }
    }

    /// Output channels in declaration order.
    #[must_use]
    pub fn outputs(self) -> &'static [&'static str] {
        match self {
            LockboxKind::Custom => &["slow_output", "fast_output", "pwm_output"],
            LockboxKind::Interferometer => &["piezo"],
        }
    }

    #[must_use]
    pub fn units(self) -> &'static [&'static str] {
        match self {
            LockboxKind::Custom => &["V", "mV"],
            LockboxKind::Interferometer => &["m", "deg", "rad"],
        }
    }

    /// How many `unit` make one base unit of gain (V for the custom box,
    /// rad of phase for the interferometer).
    /// # Errors
    /// `UnknownUnit` if the kind does not declare `unit`.
    pub fn unit_per_base(self, unit: &str, attributes: &AttributeSet) -> Result<f64> {
        match (self, unit) {
            (LockboxKind::Custom, "V") | (LockboxKind::Interferometer, "rad") => Ok(1.0),
            (LockboxKind::Custom, "mV") => Ok(1000.0),
            (LockboxKind::Interferometer, "deg") => Ok(180.0 / PI),
            // optical path length per radian, wavelength stored in um
            (LockboxKind::Interferometer, "m") => {
                Ok(attributes.value_or("wavelength", 1.064) * 1e-6 / (2.0 * PI))
            }
            _ => Err(LockboxError::UnknownUnit(unit.to_string())),
        }
    }
}
