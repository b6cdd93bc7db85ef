use std::time::{Duration, Instant};

use super::*;
use crate::mock::MockAnalyzer;

fn status(running_state: RunningState, current_avg: u32, avg: u32) -> AcquisitionStatus {
    AcquisitionStatus {
        running_state,
        current_avg,
        avg,
    }
}

fn baseband_frame() -> Frame {
    Frame {
        frequencies: vec![0.0, 10.0, 20.0],
        payload: Payload::Baseband {
            spec1: vec![1.0, 4.0, 9.0],
            spec2: vec![2.0, 2.0, 2.0],
            cross_re: vec![3.0, 0.0, 1.0],
            cross_im: vec![4.0, 1.0, 0.0],
        },
        rbw: 10.0,
    }
}

#[test]
fn button_labels() {
    let idle = project_buttons(&status(RunningState::Idle, 0, 10));
    assert_eq!(idle.continuous_label, "Run continuous");
    assert_eq!(idle.single_label, "Run single");
    assert!(idle.single_enabled);

    let paused = project_buttons(&status(RunningState::Idle, 3, 10));
    assert_eq!(paused.continuous_label, "Run continuous (3)");

    let cont = project_buttons(&status(RunningState::RunningContinuous, 3, 10));
    assert_eq!(cont.continuous_label, "Pause (3)");
    assert_eq!(cont.single_label, "Run single");
    assert!(!cont.single_enabled);

    let done = project_buttons(&status(RunningState::RunningContinuous, 10, 10));
    assert_eq!(done.continuous_label, "Pause (10+)");

    let fresh = project_buttons(&status(RunningState::RunningContinuous, 0, 10));
    assert_eq!(fresh.continuous_label, "Pause");

    let single = project_buttons(&status(RunningState::RunningSingle, 2, 10));
    assert_eq!(single.continuous_label, "Run continuous");
    assert_eq!(single.single_label, "Stop (2)");
    assert!(single.single_enabled);
}

#[test]
fn projection_is_a_function_of_status() {
    let states = [
        RunningState::Idle,
        RunningState::RunningSingle,
        RunningState::RunningContinuous,
    ];
    let mut panel = SpectrumPanel::default();
    for state in states {
        for current_avg in 0..6 {
            for avg in 1..4 {
                let s = status(state, current_avg, avg);
                let expected = project_buttons(&s);
                // arrive at the same status through different histories
                panel.handle(AcquisitionEvent::StatusChanged(status(
                    RunningState::RunningContinuous,
                    99,
                    1,
                )));
                panel.handle(AcquisitionEvent::StatusChanged(s));
                assert_eq!(panel.project().buttons, expected);
                assert_eq!(project_buttons(&s), expected);
            }
        }
    }
}

#[test]
fn baseband_visibility_flags() {
    let mut panel = SpectrumPanel::new(AcquisitionStatus::new(1), false);
    let p = panel.project();
    assert!(p.iq_controls_enabled && !p.baseband_controls_enabled);
    panel.handle(AcquisitionEvent::BasebandChanged(true));
    let p = panel.project();
    assert!(!p.iq_controls_enabled && p.baseband_controls_enabled);
}

#[test]
fn hidden_channel_renders_nan_without_touching_data() {
    let frame = baseband_frame();
    let original = frame.clone();
    let visibility = ChannelVisibility {
        input2: false,
        ..ChannelVisibility::default()
    };
    let out = render(&frame, visibility, "Vpk^2", &|x: f64, _: f64| x);

    assert_eq!(frame, original);
    let input2 = out.trace("input2").unwrap().values.as_ref().unwrap();
    assert_eq!(input2.len(), 3);
    assert!(input2.iter().all(|x| x.is_nan()));
    assert_eq!(
        out.trace("input1").unwrap().values.as_deref(),
        Some(&[1.0, 4.0, 9.0][..])
    );
    assert_eq!(
        out.trace("cross").unwrap().values.as_deref(),
        Some(&[5.0, 1.0, 1.0][..])
    );
}

#[test]
fn conversion_function_is_injected() {
    let frame = baseband_frame();
    let out = render(&frame, ChannelVisibility::default(), "x", &|x: f64, rbw: f64| x / rbw);
    assert_eq!(
        out.trace("input1").unwrap().values.as_deref(),
        Some(&[0.1, 0.4, 0.9][..])
    );

    let iq = Frame {
        frequencies: vec![1.0, 2.0],
        payload: Payload::Iq(vec![Complex64::new(3.0, 4.0), Complex64::new(0.0, -2.0)]),
        rbw: 1.0,
    };
    let out = render(&iq, ChannelVisibility::default(), "Vpk", &|x: f64, rbw: f64| {
        DisplayUnit::Vpk.convert(x, rbw)
    });
    assert_eq!(out.traces.len(), 1);
    assert_eq!(
        out.trace("iq").unwrap().values.as_deref(),
        Some(&[5.0f64.sqrt(), 2.0f64.sqrt()][..])
    );
}

#[test]
fn malformed_channel_renders_nothing() {
    let mut frame = baseband_frame();
    if let Payload::Baseband {
        spec1, cross_im, ..
    } = &mut frame.payload
    {
        spec1.pop();
        cross_im.clear();
    }
    let out = render(&frame, ChannelVisibility::default(), "", &|x: f64, _: f64| x);
    assert!(out.trace("input1").unwrap().values.is_none());
    assert!(out.trace("cross").unwrap().values.is_none());
    assert!(out.trace("input2").unwrap().values.is_some());
}

#[test]
fn display_units() {
    let rbw = 100.0;
    assert_eq!(DisplayUnit::Vpk2.convert(2.0, rbw), 2.0);
    assert_eq!(DisplayUnit::Vrms2.convert(2.0, rbw), 1.0);
    assert_eq!(DisplayUnit::Vrms.convert(8.0, rbw), 2.0);
    assert_eq!(DisplayUnit::Vrms2PerHz.convert(2.0, rbw), 0.01);
    assert!((DisplayUnit::DbVpk2.convert(100.0, rbw) - 20.0).abs() < 1e-12);
    assert!((DisplayUnit::DbVrms2PerHz.convert(2.0, rbw) + 20.0).abs() < 1e-12);
    assert!((DisplayUnit::VrmsPerSqrtHz.convert(2.0, rbw) - 0.1).abs() < 1e-12);
    for unit in DisplayUnit::ALL {
        assert_eq!(unit.label().parse::<DisplayUnit>().unwrap(), unit);
        assert_eq!(unit.convert(3.0, rbw), unit.convert(3.0, rbw));
    }
    assert!("dBm".parse::<DisplayUnit>().is_err());
}

#[test]
fn unit_change_rerenders_last_frame() {
    let mut panel = SpectrumPanel::new(AcquisitionStatus::new(1), true);
    panel.handle(AcquisitionEvent::DataReady(baseband_frame()));
    assert_eq!(
        panel.rendered().unwrap().trace("input1").unwrap().values.as_deref(),
        Some(&[1.0, 4.0, 9.0][..])
    );
    panel.set_display_unit(DisplayUnit::Vpk);
    let rendered = panel.rendered().unwrap();
    assert_eq!(rendered.unit, "Vpk");
    assert_eq!(
        rendered.trace("input1").unwrap().values.as_deref(),
        Some(&[1.0, 2.0, 3.0][..])
    );
    assert_eq!(panel.last_frame(), Some(&baseband_frame()));

    panel.set_visibility(ChannelVisibility {
        cross: false,
        ..ChannelVisibility::default()
    });
    let cross = panel.rendered().unwrap().trace("cross").unwrap();
    assert!(cross.values.as_ref().unwrap().iter().all(|x| x.is_nan()));
    assert_eq!(panel.last_frame(), Some(&baseband_frame()));
}

#[test]
fn redraws_are_throttled() {
    let mut panel = SpectrumPanel::new(AcquisitionStatus::new(1), true);
    let t0 = Instant::now();
    panel.handle_at(AcquisitionEvent::DataReady(baseband_frame()), t0);
    assert!(panel.rendered().is_some());

    let mut second = baseband_frame();
    second.frequencies = vec![1.0, 2.0, 3.0];
    panel.handle_at(AcquisitionEvent::DataReady(second), t0 + Duration::from_millis(5));
    assert_eq!(panel.last_frame().unwrap().frequencies, [1.0, 2.0, 3.0]);
    assert_eq!(panel.rendered().unwrap().frequencies, [0.0, 10.0, 20.0]);

    assert!(!panel.flush(t0 + Duration::from_millis(20)));
    assert!(panel.flush(t0 + Duration::from_millis(50)));
    assert_eq!(panel.rendered().unwrap().frequencies, [1.0, 2.0, 3.0]);
    assert!(!panel.flush(t0 + Duration::from_millis(500)));
}

#[test]
fn buttons_drive_the_analyzer() {
    let (mut analyzer, mut events) = MockAnalyzer::new(3, false);
    let mut panel = SpectrumPanel::new(analyzer.status(), false);

    panel.run_continuous_clicked(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(panel.status().running_state, RunningState::RunningContinuous);
    assert!(!panel.project().buttons.single_enabled);

    for _ in 0..3 {
        analyzer.acquire_trace();
    }
    assert!(panel.pump(&mut events) >= 6);
    assert_eq!(panel.project().buttons.continuous_label, "Pause (3+)");
    assert!(panel.last_frame().is_some());

    // pause keeps the average
    panel.run_continuous_clicked(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(panel.project().buttons.continuous_label, "Run continuous (3)");

    panel.restart_averaging(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(panel.status().current_avg, 0);
    assert_eq!(panel.project().buttons.continuous_label, "Run continuous");

    panel.save_clicked(&mut analyzer).unwrap();
    assert_eq!(analyzer.saved_curves, 1);
}

#[test]
fn single_run_completes_and_can_be_stopped() {
    let (mut analyzer, mut events) = MockAnalyzer::new(2, true);
    let mut panel = SpectrumPanel::new(analyzer.status(), true);

    panel.run_single_clicked(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(panel.status().running_state, RunningState::RunningSingle);
    analyzer.acquire_trace();
    analyzer.acquire_trace();
    panel.pump(&mut events);
    assert_eq!(panel.status().running_state, RunningState::Idle);
    assert_eq!(panel.status().current_avg, 2);

    panel.run_single_clicked(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(panel.project().buttons.single_label, "Stop");
    panel.run_single_clicked(&mut analyzer).unwrap();
    panel.pump(&mut events);
    assert_eq!(analyzer.status().running_state, RunningState::Idle);
    assert_eq!(panel.status(), &analyzer.status());
}

#[test]
fn pump_drains_without_blocking() {
    let (mut analyzer, mut events) = MockAnalyzer::new(1, false);
    let mut panel = SpectrumPanel::new(analyzer.status(), false);
    assert_eq!(panel.pump(&mut events), 0);
    analyzer.set_baseband(true);
    assert_eq!(panel.pump(&mut events), 1);
    assert!(panel.baseband());
    drop(analyzer);
    assert_eq!(panel.pump(&mut events), 0);
}

#[test]
fn zero_rate_disables_throttling() {
    let mut panel = SpectrumPanel::new(AcquisitionStatus::new(1), true).with_max_rate(0.0);
    let t0 = Instant::now();
    panel.handle_at(AcquisitionEvent::DataReady(baseband_frame()), t0);
    let mut second = baseband_frame();
    second.frequencies = vec![1.0, 2.0, 3.0];
    panel.handle_at(AcquisitionEvent::DataReady(second), t0);
    assert_eq!(panel.rendered().unwrap().frequencies, [1.0, 2.0, 3.0]);
}

#[test]
fn completed_single_run_shows_its_last_frame() {
    let (mut analyzer, mut events) = MockAnalyzer::new(2, true);
    let mut panel = SpectrumPanel::new(analyzer.status(), true);
    panel.run_single_clicked(&mut analyzer).unwrap();
    analyzer.acquire_trace();
    analyzer.acquire_trace();
    panel.pump(&mut events);

    assert_eq!(panel.status().running_state, RunningState::Idle);
    let unit = panel.display_unit();
    let expected = render(
        panel.last_frame().unwrap(),
        panel.visibility(),
        unit.label(),
        &|x: f64, rbw: f64| unit.convert(x, rbw),
    );
    assert_eq!(panel.rendered(), Some(&expected));
}

#[test]
fn pump_redraws_a_deferred_frame_after_the_window() {
    let (_analyzer, mut events) = MockAnalyzer::new(1, true);
    let mut panel = SpectrumPanel::new(AcquisitionStatus::new(1), true);
    let Some(t0) = Instant::now().checked_sub(Duration::from_millis(500)) else {
        return;
    };
    panel.handle_at(AcquisitionEvent::DataReady(baseband_frame()), t0);
    let mut second = baseband_frame();
    second.frequencies = vec![1.0, 2.0, 3.0];
    panel.handle_at(AcquisitionEvent::DataReady(second), t0 + Duration::from_millis(5));
    assert_eq!(panel.rendered().unwrap().frequencies, [0.0, 10.0, 20.0]);

    assert_eq!(panel.pump(&mut events), 0);
    assert_eq!(panel.rendered().unwrap().frequencies, [1.0, 2.0, 3.0]);
}
