#![warn(clippy::pedantic)]

use std::fmt;

use futures::channel::mpsc;

use crate::spectrum::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningState {
    #[default]
    Idle,
    RunningSingle,
    RunningContinuous,
}

impl fmt::Display for RunningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningState::Idle => write!(f, "idle"),
            RunningState::RunningSingle => write!(f, "running_single"),
            RunningState::RunningContinuous => write!(f, "running_continuous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionCommand {
    Single,
    Continuous,
    Pause,
    Stop,
    /// the engine finished the last trace of a single run
    SingleCompleted,
    /// the engine added one trace to the running average
    AverageAcquired,
}

/// Run mode and averaging progress of a spectrum acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionStatus {
    pub running_state: RunningState,
    pub current_avg: u32,
    /// number of traces to average
    pub avg: u32,
}

impl AcquisitionStatus {
    #[must_use]
    pub fn new(avg: u32) -> Self {
        AcquisitionStatus {
            running_state: RunningState::Idle,
            current_avg: 0,
            avg: avg.max(1),
        }
    }

    /// Next status after `command`. Commands that make no sense in the current
    /// state leave it unchanged.
    #[must_use]
    pub fn apply(self, command: AcquisitionCommand) -> Self {
        use AcquisitionCommand as C;
        use RunningState as S;
        match (self.running_state, command) {
            (_, C::Stop) => AcquisitionStatus {
                running_state: S::Idle,
                current_avg: 0,
                ..self
            },
            (S::Idle, C::Single) => AcquisitionStatus {
                running_state: S::RunningSingle,
                current_avg: 0,
                ..self
            },
            (S::Idle, C::Continuous) => AcquisitionStatus {
                running_state: S::RunningContinuous,
                ..self
            },
            (S::RunningContinuous, C::Pause) | (S::RunningSingle, C::SingleCompleted) => {
                AcquisitionStatus {
                    running_state: S::Idle,
                    ..self
                }
            }
            (S::RunningSingle | S::RunningContinuous, C::AverageAcquired) => AcquisitionStatus {
                current_avg: self.current_avg.saturating_add(1),
                ..self
            },
            _ => self,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_state != RunningState::Idle
    }
}

/// Notifications from the acquisition side to whoever displays it.
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    StatusChanged(AcquisitionStatus),
    BasebandChanged(bool),
    DataReady(Frame),
}

pub type EventSender = mpsc::UnboundedSender<AcquisitionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AcquisitionEvent>;

#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use AcquisitionCommand as C;

    #[test]
    fn single_run_reverts_to_idle() {
        let s = AcquisitionStatus::new(3).apply(C::Single);
        assert_eq!(s.running_state, RunningState::RunningSingle);
        let s = s.apply(C::AverageAcquired).apply(C::SingleCompleted);
        assert_eq!(s.running_state, RunningState::Idle);
        assert_eq!(s.current_avg, 1);
    }

    #[test]
    fn continuous_counts_until_paused() {
        let mut s = AcquisitionStatus::new(2).apply(C::Continuous);
        for _ in 0..5 {
            s = s.apply(C::AverageAcquired);
        }
        assert_eq!(s.current_avg, 5);
        assert_eq!(s.running_state, RunningState::RunningContinuous);
        // completion of a single run does not end a continuous one
        assert_eq!(s.apply(C::SingleCompleted), s);
        let paused = s.apply(C::Pause);
        assert_eq!(paused.running_state, RunningState::Idle);
        assert_eq!(paused.current_avg, 5);
        assert_eq!(paused.apply(C::Continuous).current_avg, 5);
    }

    #[test]
    fn stop_resets_from_any_state() {
        for start in [C::Single, C::Continuous, C::Pause] {
            let s = AcquisitionStatus::new(4)
                .apply(start)
                .apply(C::AverageAcquired)
                .apply(C::Stop);
            assert_eq!(s.running_state, RunningState::Idle);
            assert_eq!(s.current_avg, 0);
        }
    }

    #[test]
    fn idle_ignores_progress() {
        let s = AcquisitionStatus::new(1);
        assert_eq!(s.apply(C::AverageAcquired), s);
        assert_eq!(s.apply(C::Pause), s);
        assert_eq!(s.apply(C::SingleCompleted), s);
        let running = s.apply(C::Continuous);
        assert_eq!(running.apply(C::Single), running);
    }
}
