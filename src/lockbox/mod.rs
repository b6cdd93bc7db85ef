#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attribute::AttributeSet;
use crate::controller::{LockController, LockRequest};
use crate::error::{LockboxError, Result, Step};
use crate::models::{InputModel, LockboxKind};
use crate::signal::{InputSignal, SignalModel};


/// Smallest usable |slope| at the setpoint, relative to the calibrated
/// peak-to-peak range of the input.
pub const MIN_RELATIVE_SLOPE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSignal {
    name: String,
}

impl OutputSignal {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        OutputSignal { name: name.into() }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockTarget {
    pub input: String,
    pub setpoint: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Sweeping,
    Locked {
        input: String,
        setpoint: f64,
    },
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => write!(f, "unlocked"),
            LockState::Sweeping => write!(f, "sweeping"),
            LockState::Locked { input, setpoint } => write!(f, "locked on {input} at {setpoint}"),
        }
    }
}

/// A feedback controller configuration: detector inputs, actuator outputs,
/// the control variable and the global coefficients.
#[derive(Debug, Clone)]
pub struct Lockbox {
    name: String,
    kind: LockboxKind,
    inputs: Vec<InputSignal>,
    outputs: Vec<OutputSignal>,
    attributes: AttributeSet,
    target: Option<LockTarget>,
    state: LockState,
    active: bool,
}

impl Lockbox {
    /// Instantiate the channels declared by `kind`.
    /// # Errors
    /// `VariableMismatch` or `DuplicateChannel` if the declaration is inconsistent.
    pub fn new(kind: LockboxKind) -> Result<Self> {
        let mut out = Lockbox {
            name: kind.to_string(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: AttributeSet::from_schema(&[kind.schema()]),
            target: None,
            state: LockState::Unlocked,
            active: false,
        };
        for (name, model) in kind.inputs() {
            out.add_input(name, *model)?;
        }
        for name in kind.outputs() {
            out.add_output(name)?;
        }
        Ok(out)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> LockboxKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn variable(&self) -> &'static str {
        self.kind.variable()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &LockState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&LockTarget> {
        self.target.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[InputSignal] {
        &self.inputs
    }

    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[OutputSignal] {
        &self.outputs
    }

    fn check_mutable(&self, name: &str) -> Result<()> {
        if self.active {
            return Err(LockboxError::ChannelsFrozen);
        }
        if self.inputs.iter().any(|i| i.name() == name)
            || self.outputs.iter().any(|o| o.name() == name)
        {
            return Err(LockboxError::DuplicateChannel(name.to_string()));
        }
        Ok(())
    }

    /// # Errors
    /// `ChannelsFrozen` once active, `DuplicateChannel`, or `VariableMismatch`
    /// if `model` expects another control variable.
    pub fn add_input(&mut self, name: &str, model: InputModel) -> Result<&mut InputSignal> {
        self.check_mutable(name)?;
        if model.variable() != self.variable() {
            return Err(LockboxError::VariableMismatch {
                input: name.to_string(),
                expected: model.variable().to_string(),
                variable: self.variable().to_string(),
            });
        }
        self.inputs.push(InputSignal::new(name, model));
        let last = self.inputs.len() - 1;
        Ok(&mut self.inputs[last])
    }

    /// # Errors
    /// `ChannelsFrozen` once active, `DuplicateChannel`.
    pub fn add_output(&mut self, name: &str) -> Result<()> {
        self.check_mutable(name)?;
        self.outputs.push(OutputSignal::new(name));
        Ok(())
    }

    /// # Errors
    /// `ChannelsFrozen` once active, `UnknownChannel`.
    pub fn remove_input(&mut self, name: &str) -> Result<InputSignal> {
        if self.active {
            return Err(LockboxError::ChannelsFrozen);
        }
        let idx = self
            .inputs
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| LockboxError::UnknownChannel(name.to_string()))?;
        if self.target.as_ref().is_some_and(|t| t.input == name) {
            self.target = None;
        }
        Ok(self.inputs.remove(idx))
    }

    /// # Errors
    /// `ChannelsFrozen` once active, `UnknownChannel`.
    pub fn remove_output(&mut self, name: &str) -> Result<OutputSignal> {
        if self.active {
            return Err(LockboxError::ChannelsFrozen);
        }
        let idx = self
            .outputs
            .iter()
            .position(|o| o.name() == name)
            .ok_or_else(|| LockboxError::UnknownChannel(name.to_string()))?;
        Ok(self.outputs.remove(idx))
    }

    /// Freeze the channel sets.
    pub fn activate(&mut self) {
        if !self.active {
            info!(lockbox = %self.name, inputs = self.inputs.len(), outputs = self.outputs.len(), "activated");
        }
        self.active = true;
    }

    /// # Errors
    /// `UnknownChannel`.
    pub fn input(&self, name: &str) -> Result<&InputSignal> {
        self.inputs
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| LockboxError::UnknownChannel(name.to_string()))
    }

    /// # Errors
    /// `UnknownChannel`.
    pub fn input_mut(&mut self, name: &str) -> Result<&mut InputSignal> {
        self.inputs
            .iter_mut()
            .find(|i| i.name() == name)
            .ok_or_else(|| LockboxError::UnknownChannel(name.to_string()))
    }

    /// # Errors
    /// `UnknownChannel`.
    pub fn output(&self, name: &str) -> Result<&OutputSignal> {
        self.outputs
            .iter()
            .find(|o| o.name() == name)
            .ok_or_else(|| LockboxError::UnknownChannel(name.to_string()))
    }

    /// # Errors
    /// See [`AttributeSet::set`].
    pub fn set_attribute(&mut self, name: &str, value: f64) -> Result<()> {
        self.attributes.set(name, value)
    }

    /// # Errors
    /// `UnknownChannel` if the input does not exist, `Range` for a non-finite setpoint.
    pub fn set_target(&mut self, input: &str, setpoint: f64) -> Result<()> {
        self.input(input)?;
        if !setpoint.is_finite() {
            return Err(LockboxError::Range {
                name: "setpoint".into(),
                value: setpoint,
                min: f64::MIN,
                max: f64::MAX,
            });
        }
        self.target = Some(LockTarget {
            input: input.to_string(),
            setpoint,
        });
        Ok(())
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    #[must_use]
    pub fn units(&self) -> &'static [&'static str] {
        self.kind.units()
    }

    /// # Errors
    /// `UnknownUnit`.
    pub fn unit_per_volt(&self, unit: &str) -> Result<f64> {
        self.kind.unit_per_base(unit, &self.attributes)
    }

    /// Express a gain given in the base unit in `unit`.
    /// # Errors
    /// `UnknownUnit`.
    pub fn gain_in_unit(&self, gain: f64, unit: &str) -> Result<f64> {
        Ok(gain * self.unit_per_volt(unit)?)
    }

    /// # Errors
    /// Propagates the controller's failure.
    pub fn sweep(&mut self, controller: &mut dyn LockController) -> Result<()> {
        controller.sweep()?;
        self.state = LockState::Sweeping;
        info!(lockbox = %self.name, "sweeping");
        Ok(())
    }

    /// Calibrate every input in declaration order, stopping at the first failure.
    /// # Errors
    /// The first calibration error.
    pub fn calibrate_all(&mut self, controller: &mut dyn LockController) -> Result<()> {
        for input in &mut self.inputs {
            input.calibrate(controller)?;
        }
        // every calibration sweeps
        if !self.inputs.is_empty() {
            self.state = LockState::Sweeping;
        }
        Ok(())
    }

    /// # Errors
    /// Propagates the controller's failure; the state is then left unchanged.
    pub fn unlock(&mut self, controller: &mut dyn LockController) -> Result<()> {
        controller.unlock()?;
        self.state = LockState::Unlocked;
        info!(lockbox = %self.name, "unlocked");
        Ok(())
    }

    /// What the engine is asked to do when locking on the current target.
    /// # Errors
    /// `NoLockTarget`, `UnknownChannel`, `IllConditionedSlope`.
    pub fn lock_request(&self) -> Result<LockRequest> {
        let target = self.target.as_ref().ok_or(LockboxError::NoLockTarget)?;
        let input = self.input(&target.input)?;
        let setpoint_signal = input.expected_signal(&self.attributes, target.setpoint);
        let slope = input.expected_slope(&self.attributes, target.setpoint);
        let scale = input.stats().range().abs().max(f64::MIN_POSITIVE);
        if !slope.is_finite() || !setpoint_signal.is_finite() || slope.abs() < MIN_RELATIVE_SLOPE * scale {
            return Err(LockboxError::IllConditionedSlope {
                input: target.input.clone(),
                setpoint: target.setpoint,
                slope,
            });
        }
        Ok(LockRequest {
            input: target.input.clone(),
            variable: self.variable().to_string(),
            setpoint: target.setpoint,
            setpoint_signal,
            slope,
        })
    }

    /// # Errors
    /// See [`Lockbox::lock_request`]; controller failures leave the state unlocked.
    pub fn lock(&mut self, controller: &mut dyn LockController) -> Result<()> {
        let request = self.lock_request()?;
        if let Err(e) = controller.lock(&request) {
            self.state = LockState::Unlocked;
            return Err(e);
        }
        info!(
            lockbox = %self.name,
            input = %request.input,
            setpoint = request.setpoint,
            slope = request.slope,
            "locked"
        );
        self.state = LockState::Locked {
            input: request.input,
            setpoint: request.setpoint,
        };
        Ok(())
    }

    /// Calibrate every input, unlock, then lock on the target, in that order.
    /// Any failing step aborts the rest; the controller is then unlocked and
    /// the originating error returned.
    /// # Errors
    /// `SequenceAborted` naming the failed step.
    pub fn relock(&mut self, controller: &mut dyn LockController) -> Result<()> {
        let result = self.relock_steps(controller);
        if let Err(e) = &result {
            warn!(lockbox = %self.name, error = %e, "relock aborted, unlocking");
            if let Err(unlock_err) = controller.unlock() {
                warn!(lockbox = %self.name, error = %unlock_err, "unlock after abort failed");
            }
            self.state = LockState::Unlocked;
        }
        result
    }

    fn relock_steps(&mut self, controller: &mut dyn LockController) -> Result<()> {
        self.calibrate_all(controller)
            .map_err(aborted(Step::CalibrateAll))?;
        self.unlock(controller).map_err(aborted(Step::Unlock))?;
        self.lock(controller).map_err(aborted(Step::Lock))
    }
}

fn aborted(step: Step) -> impl FnOnce(LockboxError) -> LockboxError {
    move |e| LockboxError::SequenceAborted {
        step,
        source: Box::new(e),
    }
}
