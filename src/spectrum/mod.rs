#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! State and rendering of the spectrum-analyzer display panel.
//!
//! The panel never polls the analyzer. It mirrors the status it is told about
//! through [`AcquisitionEvent`]s and derives every control label from that
//! status with [`project_buttons`], so the same status always yields the same
//! controls.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use num_complex::Complex64;
use tracing::{debug, trace};

use crate::acquisition::{AcquisitionEvent, AcquisitionStatus, EventReceiver, RunningState};
use crate::controller::SpectrumAnalyzer;
use crate::error::{LockboxError, Result};

#[cfg(test)]
mod tests;

/// Redraws per second the panel allows itself.
pub const MAX_DISPLAY_RATE_HZ: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// single in-phase/quadrature spectrum
    Iq(Vec<Complex64>),
    /// two channel spectra and the cross spectrum split into real and imaginary parts
    Baseband {
        spec1: Vec<f64>,
        spec2: Vec<f64>,
        cross_re: Vec<f64>,
        cross_im: Vec<f64>,
    },
}

/// One acquired spectrum, stored in `Vpk^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frequencies: Vec<f64>,
    pub payload: Payload,
    /// resolution bandwidth in Hz
    pub rbw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayUnit {
    #[default]
    Vpk2,
    DbVpk2,
    Vpk,
    Vrms2,
    DbVrms2,
    Vrms,
    Vrms2PerHz,
    DbVrms2PerHz,
    VrmsPerSqrtHz,
}

impl DisplayUnit {
    pub const ALL: [DisplayUnit; 9] = [
        DisplayUnit::Vpk2,
        DisplayUnit::DbVpk2,
        DisplayUnit::Vpk,
        DisplayUnit::Vrms2,
        DisplayUnit::DbVrms2,
        DisplayUnit::Vrms,
        DisplayUnit::Vrms2PerHz,
        DisplayUnit::DbVrms2PerHz,
        DisplayUnit::VrmsPerSqrtHz,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            DisplayUnit::Vpk2 => "Vpk^2",
            DisplayUnit::DbVpk2 => "dB(Vpk^2)",
            DisplayUnit::Vpk => "Vpk",
            DisplayUnit::Vrms2 => "Vrms^2",
            DisplayUnit::DbVrms2 => "dB(Vrms^2)",
            DisplayUnit::Vrms => "Vrms",
            DisplayUnit::Vrms2PerHz => "Vrms^2/Hz",
            DisplayUnit::DbVrms2PerHz => "dB(Vrms^2/Hz)",
            DisplayUnit::VrmsPerSqrtHz => "Vrms/sqrt(Hz)",
        }
    }

    /// Convert a power value in `Vpk^2` to this unit. Pure in both arguments.
    #[must_use]
    pub fn convert(self, vpk2: f64, rbw: f64) -> f64 {
        let vrms2 = vpk2 / 2.0;
        match self {
            DisplayUnit::Vpk2 => vpk2,
            DisplayUnit::DbVpk2 => 10.0 * vpk2.log10(),
            DisplayUnit::Vpk => vpk2.sqrt(),
            DisplayUnit::Vrms2 => vrms2,
            DisplayUnit::DbVrms2 => 10.0 * vrms2.log10(),
            DisplayUnit::Vrms => vrms2.sqrt(),
            DisplayUnit::Vrms2PerHz => vrms2 / rbw,
            DisplayUnit::DbVrms2PerHz => 10.0 * (vrms2 / rbw).log10(),
            DisplayUnit::VrmsPerSqrtHz => (vrms2 / rbw).sqrt(),
        }
    }
}

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayUnit {
    type Err = LockboxError;

    fn from_str(s: &str) -> Result<Self> {
        DisplayUnit::ALL
            .into_iter()
            .find(|u| u.label() == s)
            .ok_or_else(|| LockboxError::UnknownUnit(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelVisibility {
    pub input1: bool,
    pub input2: bool,
    pub cross: bool,
}

impl Default for ChannelVisibility {
    fn default() -> Self {
        ChannelVisibility {
            input1: true,
            input2: true,
            cross: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonProjection {
    pub continuous_label: String,
    pub single_label: String,
    pub single_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlProjection {
    pub buttons: ButtonProjection,
    pub baseband_controls_enabled: bool,
    pub iq_controls_enabled: bool,
}

/// Labels and enabled state of the run buttons for `status`.
#[must_use]
pub fn project_buttons(status: &AcquisitionStatus) -> ButtonProjection {
    let count = if status.current_avg > 0 {
        format!(" ({})", status.current_avg)
    } else {
        String::new()
    };
    match status.running_state {
        RunningState::RunningContinuous => {
            // '+' once the requested number of averages is available
            let count = if status.current_avg > 0 && status.current_avg >= status.avg {
                format!(" ({}+)", status.current_avg)
            } else {
                count
            };
            ButtonProjection {
                continuous_label: format!("Pause{count}"),
                single_label: "Run single".into(),
                single_enabled: false,
            }
        }
        RunningState::RunningSingle => ButtonProjection {
            continuous_label: "Run continuous".into(),
            single_label: format!("Stop{count}"),
            single_enabled: true,
        },
        RunningState::Idle => ButtonProjection {
            continuous_label: format!("Run continuous{count}"),
            single_label: "Run single".into(),
            single_enabled: true,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: &'static str,
    /// `None` when the channel's data was unusable and nothing is drawn
    pub values: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub frequencies: Vec<f64>,
    pub unit: &'static str,
    pub traces: Vec<Trace>,
}

impl Rendered {
    #[must_use]
    pub fn trace(&self, name: &str) -> Option<&Trace> {
        self.traces.iter().find(|t| t.name == name)
    }
}

/// Limits redraws to a maximum rate.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl FrameThrottle {
    /// A non-positive or non-finite rate disables throttling.
    #[must_use]
    pub fn new(max_rate_hz: f64) -> Self {
        let min_interval = if max_rate_hz.is_finite() && max_rate_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / max_rate_hz).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        FrameThrottle {
            min_interval,
            last: None,
        }
    }

    /// True if a redraw at `now` is allowed; records it if so.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(MAX_DISPLAY_RATE_HZ)
    }
}

fn channel(
    name: &'static str,
    n: usize,
    visible: bool,
    data: Option<Vec<f64>>,
    to_unit: &dyn Fn(f64) -> f64,
) -> Trace {
    let values = if !visible {
        Some(vec![f64::NAN; n])
    } else {
        data.filter(|d| d.len() == n)
            .map(|d| d.into_iter().map(to_unit).collect())
    };
    Trace { name, values }
}

/// Render `frame` for display. Magnitudes go through `to_unit(value, rbw)`;
/// hidden channels come out as NaN; channels whose length does not match the
/// frequency axis are not drawn. `frame` itself is left untouched.
#[must_use]
pub fn render(
    frame: &Frame,
    visibility: ChannelVisibility,
    unit: &'static str,
    to_unit: &dyn Fn(f64, f64) -> f64,
) -> Rendered {
    let n = frame.frequencies.len();
    let convert = |x: f64| to_unit(x, frame.rbw);
    let traces = match &frame.payload {
        Payload::Iq(spectrum) => vec![channel(
            "iq",
            n,
            true,
            Some(spectrum.iter().map(|z| z.norm()).collect()),
            &convert,
        )],
        Payload::Baseband {
            spec1,
            spec2,
            cross_re,
            cross_im,
        } => {
            let cross = (cross_re.len() == cross_im.len()).then(|| {
                cross_re
                    .iter()
                    .zip(cross_im)
                    .map(|(&re, &im)| Complex64::new(re, im).norm())
                    .collect()
            });
            vec![
                channel(
                    "input1",
                    n,
                    visibility.input1,
                    Some(spec1.iter().map(|x| x.abs()).collect()),
                    &convert,
                ),
                channel(
                    "input2",
                    n,
                    visibility.input2,
                    Some(spec2.iter().map(|x| x.abs()).collect()),
                    &convert,
                ),
                channel("cross", n, visibility.cross, cross, &convert),
            ]
        }
    };
    Rendered {
        frequencies: frame.frequencies.clone(),
        unit,
        traces,
    }
}

#[derive(Debug, Default)]
pub struct SpectrumPanel {
    status: AcquisitionStatus,
    baseband: bool,
    visibility: ChannelVisibility,
    display_unit: DisplayUnit,
    last_frame: Option<Frame>,
    rendered: Option<Rendered>,
    pending: bool,
    throttle: FrameThrottle,
}

impl SpectrumPanel {
    /// A panel mirroring an analyzer that currently reports `status`.
    #[must_use]
    pub fn new(status: AcquisitionStatus, baseband: bool) -> Self {
        SpectrumPanel {
            status,
            baseband,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_rate(mut self, max_rate_hz: f64) -> Self {
        self.throttle = FrameThrottle::new(max_rate_hz);
        self
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> &AcquisitionStatus {
        &self.status
    }

    #[inline]
    #[must_use]
    pub fn baseband(&self) -> bool {
        self.baseband
    }

    #[inline]
    #[must_use]
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn display_unit(&self) -> DisplayUnit {
        self.display_unit
    }

    #[inline]
    #[must_use]
    pub fn visibility(&self) -> ChannelVisibility {
        self.visibility
    }

    #[must_use]
    pub fn project(&self) -> ControlProjection {
        ControlProjection {
            buttons: project_buttons(&self.status),
            baseband_controls_enabled: self.baseband,
            iq_controls_enabled: !self.baseband,
        }
    }

    pub fn handle(&mut self, event: AcquisitionEvent) {
        self.handle_at(event, Instant::now());
    }

    pub fn handle_at(&mut self, event: AcquisitionEvent, now: Instant) {
        match event {
            AcquisitionEvent::StatusChanged(status) => {
                debug!(state = %status.running_state, current_avg = status.current_avg, "panel status");
                let finished = self.status.is_running() && !status.is_running();
                self.status = status;
                // the last frame of a run must not wait for a frame that never comes
                if finished && self.pending {
                    self.pending = false;
                    self.redisplay();
                }
            }
            AcquisitionEvent::BasebandChanged(baseband) => {
                self.baseband = baseband;
            }
            AcquisitionEvent::DataReady(frame) => {
                self.last_frame = Some(frame);
                self.pending = true;
                self.flush(now);
            }
        }
    }

    /// Handle every event already queued, without waiting for new ones, then
    /// redraw a deferred frame if the frame rate now allows it.
    /// Returns the number handled.
    pub fn pump(&mut self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        self.flush(Instant::now());
        handled
    }

    /// Redraw the last frame if one is waiting and the frame rate allows it.
    pub fn flush(&mut self, now: Instant) -> bool {
        if !self.pending || !self.throttle.admit(now) {
            trace!("redraw deferred");
            return false;
        }
        self.pending = false;
        self.redisplay();
        true
    }

    /// Re-render the last frame with the current unit and visibility.
    pub fn redisplay(&mut self) {
        let unit = self.display_unit;
        self.rendered = self
            .last_frame
            .as_ref()
            .map(|f| render(f, self.visibility, unit.label(), &|x: f64, rbw: f64| unit.convert(x, rbw)));
    }

    pub fn set_display_unit(&mut self, unit: DisplayUnit) {
        self.display_unit = unit;
        self.redisplay();
    }

    pub fn set_visibility(&mut self, visibility: ChannelVisibility) {
        self.visibility = visibility;
        self.redisplay();
    }

    /// # Errors
    /// Propagates the analyzer's failure.
    pub fn run_continuous_clicked(&self, analyzer: &mut dyn SpectrumAnalyzer) -> Result<()> {
        if project_buttons(&self.status)
            .continuous_label
            .starts_with("Run continuous")
        {
            analyzer.continuous()
        } else {
            analyzer.pause()
        }
    }

    /// # Errors
    /// Propagates the analyzer's failure.
    pub fn run_single_clicked(&self, analyzer: &mut dyn SpectrumAnalyzer) -> Result<()> {
        if project_buttons(&self.status).single_label.starts_with("Stop") {
            analyzer.stop()
        } else {
            analyzer.single_async()
        }
    }

    /// # Errors
    /// Propagates the analyzer's failure.
    pub fn restart_averaging(&self, analyzer: &mut dyn SpectrumAnalyzer) -> Result<()> {
        analyzer.stop()
    }

    /// # Errors
    /// Propagates the analyzer's failure.
    pub fn save_clicked(&self, analyzer: &mut dyn SpectrumAnalyzer) -> Result<()> {
        analyzer.save_curve()
    }
}
