#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attribute::{AttributeSet, FloatAttribute};
use crate::controller::LockController;
use crate::error::{LockboxError, Result};
use crate::models::InputModel;


/// Relative peak-to-peak range below which a calibration trace counts as constant.
pub const DEGENERATE_RANGE: f64 = 1e-9;

/// Signal statistics captured during a calibration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// root of the mean square, not the standard deviation
    pub rms: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics {
            min: -1.0,
            max: 1.0,
            mean: 0.0,
            rms: 1.0,
        }
    }
}

impl Statistics {
    /// # Errors
    /// `EmptyTrace` for an empty curve, `NonFiniteTrace` if any sample is NaN
    /// or infinite, `CalibrationDegenerate` if the curve is constant.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_curve(signal: &str, curve: &[f64]) -> Result<Self> {
        if curve.is_empty() {
            return Err(LockboxError::EmptyTrace(signal.to_string()));
        }
        if curve.iter().any(|x| !x.is_finite()) {
            return Err(LockboxError::NonFiniteTrace(signal.to_string()));
        }
        let (min, max, sum, sum_sq) = curve.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.0),
            |(lo, hi, s, sq), &x| (lo.min(x), hi.max(x), s + x, sq + x * x),
        );
        let n = curve.len() as f64;
        let (mean, rms) = if sum.is_finite() && sum_sq.is_finite() {
            (sum / n, (sum_sq / n).sqrt())
        } else {
            // accumulate relative to the largest magnitude to stay finite
            let scale = min.abs().max(max.abs());
            let (s, sq) = curve.iter().fold((0.0, 0.0), |(s, sq), &x| {
                let r = x / scale;
                (s + r / n, sq + r * r / n)
            });
            (s * scale, sq.sqrt() * scale)
        };
        let stats = Statistics {
            min,
            max,
            mean,
            rms,
        };
        if stats.is_degenerate() {
            return Err(LockboxError::CalibrationDegenerate {
                signal: signal.to_string(),
                value: stats.mean,
            });
        }
        Ok(stats)
    }

    #[inline]
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let scale = self.min.abs().max(self.max.abs()).max(1.0);
        let range = self.range();
        !range.is_finite() || range <= DEGENERATE_RANGE * scale
    }
}

/// What a model may read while it evaluates.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub stats: &'a Statistics,
    /// the signal's own coefficients
    pub own: &'a AttributeSet,
    /// the lockbox's global coefficients
    pub lockbox: &'a AttributeSet,
}

/// Central finite difference. Costs two evaluations of `f` per call and is
/// sensitive to noise in `f`; prefer a closed form where one exists.
pub fn numerical_slope<F: Fn(f64) -> f64>(f: F, x: f64) -> f64 {
    let h = 1e-6 * x.abs().max(1.0);
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Relationship between the control variable and the reading of one detector.
pub trait SignalModel {
    /// Name of the control variable this model expects as its argument.
    fn variable(&self) -> &'static str;

    /// Per-signal coefficients.
    fn schema(&self) -> &'static [FloatAttribute] {
        &[]
    }

    fn expected_signal(&self, ctx: &SignalContext<'_>, variable: f64) -> f64;

    /// Derivative of [`SignalModel::expected_signal`]. Falls back to
    /// [`numerical_slope`] unless overridden.
    fn expected_slope(&self, ctx: &SignalContext<'_>, variable: f64) -> f64 {
        numerical_slope(|x| self.expected_signal(ctx, x), variable)
    }

    /// Sweep, acquire a trace of `name` and reduce it to statistics.
    /// # Errors
    /// Propagates controller failures and degenerate-trace errors.
    fn calibrate(&self, name: &str, controller: &mut dyn LockController) -> Result<Statistics> {
        controller.sweep()?;
        let curve = controller.acquire(name)?;
        Statistics::from_curve(name, &curve)
    }
}

/// A named detector input of a lockbox.
#[derive(Debug, Clone)]
pub struct InputSignal {
    name: String,
    model: InputModel,
    attributes: AttributeSet,
    stats: Statistics,
    calibrated_at: Option<DateTime<Local>>,
}

impl InputSignal {
    #[must_use]
    pub fn new(name: impl Into<String>, model: InputModel) -> Self {
        InputSignal {
            name: name.into(),
            attributes: AttributeSet::from_schema(&[model.schema()]),
            model,
            stats: Statistics::default(),
            calibrated_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> &InputModel {
        &self.model
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[inline]
    #[must_use]
    pub fn calibrated_at(&self) -> Option<DateTime<Local>> {
        self.calibrated_at
    }

    /// # Errors
    /// See [`AttributeSet::set`].
    pub fn set_attribute(&mut self, name: &str, value: f64) -> Result<()> {
        self.attributes.set(name, value)
    }

    /// Install statistics obtained elsewhere, e.g. from a saved setup.
    /// # Errors
    /// `CalibrationDegenerate` if they describe a constant signal.
    pub fn set_stats(&mut self, stats: Statistics) -> Result<()> {
        if stats.is_degenerate() {
            return Err(LockboxError::CalibrationDegenerate {
                signal: self.name.clone(),
                value: stats.mean,
            });
        }
        self.stats = stats;
        Ok(())
    }

    fn context<'a>(&'a self, lockbox: &'a AttributeSet) -> SignalContext<'a> {
        SignalContext {
            stats: &self.stats,
            own: &self.attributes,
            lockbox,
        }
    }

    #[must_use]
    pub fn expected_signal(&self, lockbox: &AttributeSet, variable: f64) -> f64 {
        self.model
            .expected_signal(&self.context(lockbox), variable)
    }

    #[must_use]
    pub fn expected_slope(&self, lockbox: &AttributeSet, variable: f64) -> f64 {
        self.model.expected_slope(&self.context(lockbox), variable)
    }

    /// Run the model's calibration and keep its statistics. The previous
    /// statistics survive a failed calibration.
    /// # Errors
    /// Controller failures, `EmptyTrace`, `NonFiniteTrace`, `CalibrationDegenerate`.
    pub fn calibrate(&mut self, controller: &mut dyn LockController) -> Result<Statistics> {
        match self.model.calibrate(&self.name, controller) {
            Ok(stats) => {
                info!(
                    input = %self.name,
                    min = stats.min,
                    max = stats.max,
                    mean = stats.mean,
                    rms = stats.rms,
                    "calibrated"
                );
                self.stats = stats;
                self.calibrated_at = Some(Local::now());
                Ok(stats)
            }
            Err(e) => {
                warn!(input = %self.name, error = %e, "calibration failed");
                Err(e)
            }
        }
    }
}
