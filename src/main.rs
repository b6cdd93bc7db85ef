#![warn(clippy::pedantic)]
#![warn(clippy::all)]

use std::fs::{read_to_string, write};
use std::path::Path;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rplock::configs;
use rplock::mock::{MockAnalyzer, MockController};
use rplock::util::find_file;
use rplock::{LockboxError, Result, SpectrumAnalyzer, SpectrumPanel};

fn read_config() -> Result<toml::Value> {
    let Some(path) = find_file(Path::new("config.toml")) else {
        warn!("no config.toml found; proceeding with defaults");
        return Ok(toml::Value::Table(toml::value::Table::new()));
    };
    info!(path = %path.display(), "reading config file");
    let text = read_to_string(&path)
        .map_err(|e| LockboxError::Config(format!("failed to read {}: {e}", path.display())))?;
    Ok(toml::from_str(&text)?)
}

fn run_lockbox(cfg: &toml::Value) -> Result<()> {
    let mut lockbox = configs::lockbox_from_config(cfg)?;
    let mut controller = MockController::new();
    for (i, input) in lockbox.inputs().iter().enumerate() {
        let amplitude = if i % 2 == 0 { 0.4 } else { -0.4 };
        controller.with_fringe(input.name(), 0.5, amplitude, 1024);
    }
    controller.noise(1e-3);

    if lockbox.target().is_none() {
        if let Some(first) = lockbox.inputs().first().map(|i| i.name().to_string()) {
            warn!(input = %first, "no lock target configured; locking on the first input");
            lockbox.set_target(&first, 0.5)?;
        }
    }

    lockbox.relock(&mut controller)?;
    info!(lockbox = %lockbox.name(), state = %lockbox.state(), "relock finished");
    for &unit in lockbox.units() {
        let per_volt = lockbox.unit_per_volt(unit)?;
        info!(unit, per_volt, "unit conversion");
    }

    match configs::setup_file_from_config(cfg) {
        Ok(path) => {
            write(&path, configs::save_setup(&lockbox)?)
                .map_err(|e| LockboxError::Config(format!("failed to write {path}: {e}")))?;
            info!(path = %path, "setup saved");
        }
        Err(e) => warn!(error = %e, "setup not saved"),
    }
    Ok(())
}

fn run_spectrum(cfg: &toml::Value) -> Result<()> {
    let settings = configs::spectrum_from_config(cfg)?;
    let (mut analyzer, mut events) = MockAnalyzer::new(settings.avg, settings.baseband);
    let mut panel =
        SpectrumPanel::new(analyzer.status(), settings.baseband).with_max_rate(settings.max_rate_hz);
    panel.set_display_unit(settings.unit);

    panel.run_single_clicked(&mut analyzer)?;
    for _ in 0..settings.avg {
        analyzer.acquire_trace();
        panel.pump(&mut events);
        info!(
            single = %panel.project().buttons.single_label,
            continuous = %panel.project().buttons.continuous_label,
            "panel"
        );
    }
    if let Some(rendered) = panel.rendered() {
        for trace in &rendered.traces {
            let peak = trace
                .values
                .iter()
                .flatten()
                .copied()
                .filter(|x| x.is_finite())
                .fold(f64::NEG_INFINITY, f64::max);
            info!(trace = trace.name, unit = rendered.unit, peak, "rendered");
        }
    }
    panel.save_clicked(&mut analyzer)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let result = read_config().and_then(|cfg| {
        run_lockbox(&cfg)?;
        run_spectrum(&cfg)
    });
    if let Err(e) = result {
        error!(error = %e, root = %e.root(), "rplock demo failed");
        std::process::exit(1);
    }
}
