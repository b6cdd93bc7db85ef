#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]

//! Stand-ins for the acquisition/lock engine, used by the demo binary and the
//! tests when no hardware is attached.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use num_complex::Complex64;
use rand::Rng;
use tracing::debug;

use crate::acquisition::{
    event_channel, AcquisitionCommand, AcquisitionEvent, AcquisitionStatus, EventReceiver,
    EventSender, RunningState,
};
use crate::controller::{LockController, LockRequest, SpectrumAnalyzer};
use crate::error::{LockboxError, Result};
use crate::spectrum::{Frame, Payload};

/// Which call of a [`MockController`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Sweep,
    Lock,
    Unlock,
    Acquire,
}

/// Records calls and serves synthetic sweep traces.
#[derive(Debug, Default)]
pub struct MockController {
    traces: BTreeMap<String, Vec<f64>>,
    pub calls: Vec<String>,
    pub locked: Option<LockRequest>,
    fault: Option<Fault>,
    noise: f64,
}

impl MockController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `trace` whenever `input` is acquired.
    pub fn with_trace(&mut self, input: &str, trace: Vec<f64>) -> &mut Self {
        self.traces.insert(input.to_string(), trace);
        self
    }

    /// Serve a fringe `offset + amplitude * sin(phase)` sampled over one sweep.
    pub fn with_fringe(&mut self, input: &str, offset: f64, amplitude: f64, n: usize) -> &mut Self {
        let trace = (0..n)
            .map(|i| offset + amplitude * (2.0 * PI * i as f64 / n as f64).sin())
            .collect();
        self.with_trace(input, trace)
    }

    /// Gaussian-ish noise added to every acquired sample.
    pub fn noise(&mut self, amplitude: f64) -> &mut Self {
        self.noise = amplitude;
        self
    }

    pub fn fail_on(&mut self, fault: Fault) -> &mut Self {
        self.fault = Some(fault);
        self
    }

    pub fn clear_fault(&mut self) -> &mut Self {
        self.fault = None;
        self
    }

    fn check(&mut self, call: Fault, name: &str) -> Result<()> {
        self.calls.push(name.to_string());
        if self.fault == Some(call) {
            return Err(LockboxError::Controller(format!("{name} failed")));
        }
        Ok(())
    }
}

impl LockController for MockController {
    fn sweep(&mut self) -> Result<()> {
        self.check(Fault::Sweep, "sweep")
    }

    fn lock(&mut self, request: &LockRequest) -> Result<()> {
        self.check(Fault::Lock, "lock")?;
        self.locked = Some(request.clone());
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        self.check(Fault::Unlock, "unlock")?;
        self.locked = None;
        Ok(())
    }

    fn acquire(&mut self, input: &str) -> Result<Vec<f64>> {
        self.check(Fault::Acquire, &format!("acquire:{input}"))?;
        let trace = self
            .traces
            .get(input)
            .ok_or_else(|| LockboxError::Controller(format!("no trace for '{input}'")))?;
        if self.noise == 0.0 {
            return Ok(trace.clone());
        }
        let mut rng = rand::thread_rng();
        Ok(trace
            .iter()
            .map(|x| x + self.noise * (rng.gen::<f64>() + rng.gen::<f64>() - 1.0))
            .collect())
    }
}

/// Spectrum analyzer that follows the run-state machine and publishes its
/// changes as [`AcquisitionEvent`]s.
#[derive(Debug)]
pub struct MockAnalyzer {
    status: AcquisitionStatus,
    baseband: bool,
    rbw: f64,
    n_points: usize,
    events: EventSender,
    pub saved_curves: usize,
}

impl MockAnalyzer {
    /// Returns the analyzer and the receiving end a panel subscribes with.
    #[must_use]
    pub fn new(avg: u32, baseband: bool) -> (Self, EventReceiver) {
        let (events, rx) = event_channel();
        (
            MockAnalyzer {
                status: AcquisitionStatus::new(avg),
                baseband,
                rbw: 1000.0,
                n_points: 64,
                events,
                saved_curves: 0,
            },
            rx,
        )
    }

    fn apply(&mut self, command: AcquisitionCommand) {
        let next = self.status.apply(command);
        if next != self.status {
            debug!(?command, from = ?self.status.running_state, to = ?next.running_state, "acquisition transition");
            self.status = next;
            self.publish(AcquisitionEvent::StatusChanged(next));
        }
    }

    fn publish(&self, event: AcquisitionEvent) {
        // a closed panel simply stops listening
        let _ = self.events.unbounded_send(event);
    }

    #[must_use]
    pub fn frame(&self) -> Frame {
        let mut rng = rand::thread_rng();
        let n = self.n_points;
        let frequencies: Vec<f64> = (0..n).map(|i| i as f64 * self.rbw).collect();
        let mut spectrum = || -> Vec<f64> { (0..n).map(|_| 1e-6 * (1.0 + rng.gen::<f64>())).collect() };
        let payload = if self.baseband {
            Payload::Baseband {
                spec1: spectrum(),
                spec2: spectrum(),
                cross_re: spectrum(),
                cross_im: spectrum(),
            }
        } else {
            Payload::Iq(
                spectrum()
                    .into_iter()
                    .map(|x| Complex64::new(x, 0.0))
                    .collect(),
            )
        };
        Frame {
            frequencies,
            payload,
            rbw: self.rbw,
        }
    }

    /// Finish one acquisition: publish a frame and advance the averaging.
    pub fn acquire_trace(&mut self) {
        match self.status.running_state {
            RunningState::Idle => return,
            RunningState::RunningSingle => {
                self.apply(AcquisitionCommand::AverageAcquired);
                self.publish(AcquisitionEvent::DataReady(self.frame()));
                if self.status.current_avg >= self.status.avg {
                    self.apply(AcquisitionCommand::SingleCompleted);
                }
            }
            RunningState::RunningContinuous => {
                self.apply(AcquisitionCommand::AverageAcquired);
                self.publish(AcquisitionEvent::DataReady(self.frame()));
            }
        }
    }

    pub fn set_baseband(&mut self, baseband: bool) {
        self.baseband = baseband;
        self.publish(AcquisitionEvent::BasebandChanged(baseband));
    }
}

impl SpectrumAnalyzer for MockAnalyzer {
    fn continuous(&mut self) -> Result<()> {
        self.apply(AcquisitionCommand::Continuous);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.apply(AcquisitionCommand::Pause);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.apply(AcquisitionCommand::Stop);
        Ok(())
    }

    fn single_async(&mut self) -> Result<()> {
        self.apply(AcquisitionCommand::Single);
        Ok(())
    }

    fn save_curve(&mut self) -> Result<()> {
        self.saved_curves += 1;
        Ok(())
    }

    fn status(&self) -> AcquisitionStatus {
        self.status
    }

    fn rbw(&self) -> f64 {
        self.rbw
    }
}
