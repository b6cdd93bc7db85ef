use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use rplock::mock::{MockAnalyzer, MockController};
use rplock::spectrum::{render, ChannelVisibility, DisplayUnit};
use rplock::{Lockbox, LockboxKind};

pub fn model_evaluation(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let setpoints: Vec<f64> = (0..1024).map(|_| rng.gen_range(-3.0..3.0)).collect();

    let mut lockbox = Lockbox::new(LockboxKind::Interferometer).unwrap();
    let mut ctrl = MockController::new();
    ctrl.with_fringe("port1", 0.5, 0.4, 4096)
        .with_fringe("port2", 0.5, -0.4, 4096);
    lockbox.calibrate_all(&mut ctrl).unwrap();

    c.bench_function("interferometer expected_signal x1024", |b| {
        b.iter(|| {
            for input in lockbox.inputs() {
                for &x in &setpoints {
                    black_box(input.expected_signal(lockbox.attributes(), x));
                }
            }
        });
    });
    // port1 goes through the finite-difference fallback
    c.bench_function("interferometer expected_slope x1024", |b| {
        b.iter(|| {
            for input in lockbox.inputs() {
                for &x in &setpoints {
                    black_box(input.expected_slope(lockbox.attributes(), x));
                }
            }
        });
    });
    c.bench_function("calibrate_all 4096 pts", |b| {
        b.iter(|| lockbox.calibrate_all(&mut ctrl).unwrap());
    });
}

pub fn panel_rendering(c: &mut Criterion) {
    let (analyzer, _events) = MockAnalyzer::new(1, true);
    let frame = analyzer.frame();
    for unit in [DisplayUnit::Vpk2, DisplayUnit::DbVrms2PerHz] {
        c.bench_function(&format!("render baseband {unit}"), |b| {
            b.iter(|| {
                black_box(render(
                    &frame,
                    ChannelVisibility::default(),
                    unit.label(),
                    &|x: f64, rbw: f64| unit.convert(x, rbw),
                ))
            });
        });
    }
}

criterion_group!(benches, model_evaluation, panel_rendering);
criterion_main!(benches);
