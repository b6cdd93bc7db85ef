#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;

use gethostname::gethostname;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LockboxError, Result};
use crate::lockbox::{LockTarget, Lockbox};
use crate::models::LockboxKind;
use crate::signal::Statistics;
use crate::spectrum::{DisplayUnit, MAX_DISPLAY_RATE_HZ};
use crate::util::{toml_number, tomlget, tomlget_opt, tomlget_or};

fn number(section: &str, key: &str, val: &toml::Value) -> Result<f64> {
    toml_number(val).ok_or_else(|| {
        LockboxError::Config(format!("failed to convert {section}:{key} to a number"))
    })
}

fn table<'a>(val: &'a toml::Value, path: &[&str]) -> Option<&'a toml::value::Table> {
    path.iter()
        .try_fold(val, |v, key| v.get(*key))
        .and_then(toml::Value::as_table)
}

/// The `[lock]` table of this host's section if present, the global one otherwise.
fn lock_section(cfg: &toml::Value) -> Option<(String, &toml::Value)> {
    let hostname = gethostname().into_string().ok();
    if let Some(host) = hostname {
        if let Some(sec) = cfg.get(&host).and_then(|h| h.get("lock")) {
            debug!(host = %host, "using per-host lock target");
            return Some((format!("{host}.lock"), sec));
        }
    }
    cfg.get("lock").map(|sec| ("lock".to_string(), sec))
}

/// Build a lockbox from a parsed config file.
///
/// ```toml
/// [lockbox]
/// kind = "interferometer"
/// name = "arm A"
///
/// [lockbox.attributes]
/// wavelength = 0.780
///
/// [inputs.port1]
///
/// [lock]
/// input = "port1"
/// setpoint = 0.0
/// ```
///
/// Every value goes through the same validation as an interactive write, so
/// an out-of-range entry fails the whole load.
pub fn lockbox_from_config(cfg: &toml::Value) -> Result<Lockbox> {
    let kind: LockboxKind = tomlget_or!(cfg, "lockbox", "kind", as_str, "custom").parse()?;
    let mut out = Lockbox::new(kind)?;
    if let Some(name) = tomlget_opt!(cfg, "lockbox", "name", as_str) {
        out.set_name(name);
    }

    if let Some(attributes) = table(cfg, &["lockbox", "attributes"]) {
        for (key, val) in attributes {
            out.set_attribute(key, number("lockbox.attributes", key, val)?)?;
        }
    }

    if let Some(inputs) = table(cfg, &["inputs"]) {
        for (name, section) in inputs {
            let input = out.input_mut(name)?;
            let Some(attributes) = section.as_table() else {
                return Err(LockboxError::Config(format!("inputs.{name} is not a table")));
            };
            for (key, val) in attributes {
                input.set_attribute(key, number(name, key, val)?)?;
            }
        }
    }

    if let Some((section, lock)) = lock_section(cfg) {
        let input = lock
            .get("input")
            .and_then(toml::Value::as_str)
            .ok_or_else(|| format!("failed to get key {section}:input"))?;
        let setpoint = match lock.get("setpoint") {
            Some(val) => number(&section, "setpoint", val)?,
            None => 0.0,
        };
        out.set_target(input, setpoint)?;
    }

    if tomlget_or!(cfg, "lockbox", "activate", as_bool, true) {
        out.activate();
    }
    info!(lockbox = %out.name(), kind = %kind, "lockbox configured");
    Ok(out)
}

/// Path of the setup file named in `[general] setup_file`.
pub fn setup_file_from_config(cfg: &toml::Value) -> Result<String> {
    Ok(tomlget!(cfg, "general", "setup_file", as_str).to_string())
}

/// Panel settings from the `[spectrum]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumSettings {
    pub avg: u32,
    pub baseband: bool,
    pub unit: DisplayUnit,
    pub max_rate_hz: f64,
}

#[allow(clippy::cast_precision_loss)]
pub fn spectrum_from_config(cfg: &toml::Value) -> Result<SpectrumSettings> {
    let avg = match tomlget_opt!(cfg, "spectrum", "avg", as_integer, i64) {
        Some(n) => u32::try_from(n)
            .ok()
            .filter(|&avg| avg >= 1)
            .ok_or_else(|| LockboxError::Range {
                name: "spectrum.avg".into(),
                value: n as f64,
                min: 1.0,
                max: f64::from(u32::MAX),
            })?,
        None => 10,
    };
    Ok(SpectrumSettings {
        avg,
        baseband: tomlget_or!(cfg, "spectrum", "baseband", as_bool, true),
        unit: tomlget_or!(cfg, "spectrum", "unit", as_str, "Vpk^2").parse()?,
        max_rate_hz: tomlget_or!(
            cfg,
            "spectrum",
            "max_rate_hz",
            as_float,
            f64,
            MAX_DISPLAY_RATE_HZ
        ),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSetup {
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
    pub stats: Option<Statistics>,
}

/// Persisted state of a lockbox: the setup attributes of the lockbox and its
/// inputs, their last calibration and the lock target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupSnapshot {
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSetup>,
    pub lock: Option<LockTarget>,
}

impl SetupSnapshot {
    #[must_use]
    pub fn of(lockbox: &Lockbox) -> Self {
        SetupSnapshot {
            kind: lockbox.kind().to_string(),
            attributes: lockbox
                .attributes()
                .setup_values()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            inputs: lockbox
                .inputs()
                .iter()
                .map(|input| {
                    let setup = InputSetup {
                        attributes: input
                            .attributes()
                            .setup_values()
                            .map(|(k, v)| (k.to_string(), v))
                            .collect(),
                        stats: Some(*input.stats()),
                    };
                    (input.name().to_string(), setup)
                })
                .collect(),
            lock: lockbox.target().cloned(),
        }
    }

    /// Apply onto `lockbox`. Nothing is changed unless every value is accepted.
    pub fn apply(&self, lockbox: &mut Lockbox) -> Result<()> {
        let kind: LockboxKind = self.kind.parse()?;
        if kind != lockbox.kind() {
            return Err(LockboxError::Config(format!(
                "setup is for a {kind} lockbox, not {}",
                lockbox.kind()
            )));
        }
        let mut staged = lockbox.clone();
        for (key, value) in &self.attributes {
            staged.set_attribute(key, *value)?;
        }
        for (name, setup) in &self.inputs {
            let input = staged.input_mut(name)?;
            for (key, value) in &setup.attributes {
                input.set_attribute(key, *value)?;
            }
            if let Some(stats) = setup.stats {
                input.set_stats(stats)?;
            }
        }
        match &self.lock {
            Some(target) => staged.set_target(&target.input, target.setpoint)?,
            None => staged.clear_target(),
        }
        *lockbox = staged;
        Ok(())
    }
}

pub fn save_setup(lockbox: &Lockbox) -> Result<String> {
    Ok(toml::to_string(&SetupSnapshot::of(lockbox))?)
}

pub fn load_setup(lockbox: &mut Lockbox, text: &str) -> Result<()> {
    let snapshot: SetupSnapshot = toml::from_str(text)?;
    snapshot.apply(lockbox)?;
    info!(lockbox = %lockbox.name(), "setup loaded");
    Ok(())
}
