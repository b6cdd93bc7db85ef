#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use tracing::{debug, warn};

use crate::error::{LockboxError, Result};

/// Static description of a bounded numeric coefficient.
///
/// Tables of these are declared as `const` next to each lockbox kind and each
/// signal model; an [`AttributeSet`] holds the live values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatAttribute {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub increment: f64,
    pub doc: &'static str,
    /// persisted with the setup
    pub setup: bool,
    /// shown in the control panel
    pub gui: bool,
}

impl FloatAttribute {
    #[must_use]
    pub const fn new(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        FloatAttribute {
            name,
            default,
            min,
            max,
            increment: 0.01,
            doc: "",
            setup: true,
            gui: true,
        }
    }

    #[must_use]
    pub const fn increment(mut self, increment: f64) -> Self {
        self.increment = increment;
        self
    }

    #[must_use]
    pub const fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.gui = false;
        self
    }

    #[must_use]
    pub const fn volatile(mut self) -> Self {
        self.setup = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn range_error(&self, value: f64) -> LockboxError {
        LockboxError::Range {
            name: self.name.to_string(),
            value,
            min: self.min,
            max: self.max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    schema: Vec<FloatAttribute>,
    values: Vec<f64>,
}

impl AttributeSet {
    /// Merge schema tables in order. A name already declared by an earlier
    /// table keeps its first declaration.
    #[must_use]
    pub fn from_schema(tables: &[&[FloatAttribute]]) -> Self {
        let mut schema: Vec<FloatAttribute> = Vec::new();
        for attr in tables.iter().flat_map(|t| t.iter()) {
            if schema.iter().any(|a| a.name == attr.name) {
                continue;
            }
            schema.push(*attr);
        }
        let values = schema.iter().map(|a| a.default).collect();
        AttributeSet { schema, values }
    }

    #[must_use]
    pub fn empty() -> Self {
        AttributeSet {
            schema: Vec::new(),
            values: Vec::new(),
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.schema
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| LockboxError::UnknownAttribute(name.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.schema.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schema.iter().any(|a| a.name == name)
    }

    /// # Errors
    /// `UnknownAttribute` if `name` is not declared.
    pub fn descriptor(&self, name: &str) -> Result<&FloatAttribute> {
        Ok(&self.schema[self.index_of(name)?])
    }

    /// # Errors
    /// `UnknownAttribute` if `name` is not declared.
    pub fn get(&self, name: &str) -> Result<f64> {
        Ok(self.values[self.index_of(name)?])
    }

    /// Value of `name`, or its schema default when missing. Used by models
    /// that read coefficients they declared themselves.
    #[must_use]
    pub fn value_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// Write a coefficient. Out-of-range values are rejected and the previous
    /// value is kept.
    /// # Errors
    /// `Range` for values outside `[min, max]` (including NaN),
    /// `UnknownAttribute` for undeclared names.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let idx = self.index_of(name)?;
        let attr = &self.schema[idx];
        if !attr.contains(value) {
            warn!(attribute = name, value, min = attr.min, max = attr.max, "rejected out-of-range write");
            return Err(attr.range_error(value));
        }
        debug!(attribute = name, value, "attribute set");
        self.values[idx] = value;
        Ok(())
    }

    /// Write a coefficient, clamping it into range instead of rejecting it.
    /// Returns the value actually stored.
    /// # Errors
    /// `UnknownAttribute` for undeclared names, `Range` for NaN.
    pub fn set_clamped(&mut self, name: &str, value: f64) -> Result<f64> {
        let idx = self.index_of(name)?;
        let attr = &self.schema[idx];
        if value.is_nan() {
            return Err(attr.range_error(value));
        }
        let stored = value.clamp(attr.min, attr.max);
        self.values[idx] = stored;
        Ok(stored)
    }

    /// Nudge a coefficient by `n` increments, clamped into range.
    /// # Errors
    /// `UnknownAttribute` for undeclared names.
    pub fn step(&mut self, name: &str, n: i32) -> Result<f64> {
        let idx = self.index_of(name)?;
        let next = self.values[idx] + f64::from(n) * self.schema[idx].increment;
        self.set_clamped(name, next)
    }

    pub fn reset(&mut self) {
        for (value, attr) in self.values.iter_mut().zip(&self.schema) {
            *value = attr.default;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FloatAttribute, f64)> + '_ {
        self.schema.iter().zip(self.values.iter().copied())
    }

    /// Name/value pairs of the attributes that belong to the persisted setup.
    pub fn setup_values(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.iter()
            .filter(|(a, _)| a.setup)
            .map(|(a, v)| (a.name, v))
    }

    pub fn gui_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schema.iter().filter(|a| a.gui).map(|a| a.name)
    }
}

impl Default for AttributeSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const BASE: &[FloatAttribute] = &[
        FloatAttribute::new("gain", 1.0, -10.0, 10.0).increment(0.5),
        FloatAttribute::new("offset", 0.0, -1.0, 1.0).hidden(),
    ];
    const DERIVED: &[FloatAttribute] = &[
        FloatAttribute::new("gain", 5.0, 0.0, 100.0),
        FloatAttribute::new("scratch", 0.0, 0.0, 1.0).volatile(),
    ];

    #[test]
    fn merge_keeps_first_declaration() {
        let set = AttributeSet::from_schema(&[BASE, DERIVED]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("gain").unwrap(), 1.0);
        assert_eq!(set.descriptor("gain").unwrap().max, 10.0);
        let names: Vec<_> = set.iter().map(|(a, _)| a.name).collect();
        assert_eq!(names, ["gain", "offset", "scratch"]);
    }

    #[test]
    fn rejects_out_of_range() {
        let mut rng = rand::thread_rng();
        let mut set = AttributeSet::from_schema(&[BASE]);
        for _ in 0..200 {
            let v: f64 = rng.gen_range(-100.0..100.0);
            let res = set.set("gain", v);
            if (-10.0..=10.0).contains(&v) {
                assert!(res.is_ok());
                assert_eq!(set.get("gain").unwrap(), v);
            } else {
                assert!(matches!(res, Err(LockboxError::Range { .. })));
                assert!(set.get("gain").unwrap().abs() <= 10.0);
            }
        }
    }

    #[test]
    fn rejected_write_keeps_previous_value() {
        let mut set = AttributeSet::from_schema(&[BASE]);
        set.set("gain", 3.0).unwrap();
        assert!(set.set("gain", 11.0).is_err());
        assert!(set.set("gain", f64::NAN).is_err());
        assert_eq!(set.get("gain").unwrap(), 3.0);
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut set = AttributeSet::from_schema(&[BASE]);
        set.set("gain", -10.0).unwrap();
        set.set("gain", 10.0).unwrap();
    }

    #[test]
    fn unknown_name() {
        let mut set = AttributeSet::from_schema(&[BASE]);
        assert!(matches!(
            set.set("nope", 0.0),
            Err(LockboxError::UnknownAttribute(_))
        ));
        assert!(set.get("nope").is_err());
    }

    #[test]
    fn clamped_and_step() {
        let mut set = AttributeSet::from_schema(&[BASE]);
        assert_eq!(set.set_clamped("gain", 50.0).unwrap(), 10.0);
        assert_eq!(set.step("gain", -2).unwrap(), 9.0);
        assert_eq!(set.step("gain", 10).unwrap(), 10.0);
        set.reset();
        assert_eq!(set.get("gain").unwrap(), 1.0);
    }

    #[test]
    fn setup_and_gui_lists() {
        let set = AttributeSet::from_schema(&[BASE, DERIVED]);
        let setup: Vec<_> = set.setup_values().map(|(n, _)| n).collect();
        assert_eq!(setup, ["gain", "offset"]);
        let gui: Vec<_> = set.gui_names().collect();
        assert_eq!(gui, ["gain", "scratch"]);
    }
}
