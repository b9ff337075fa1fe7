//! Integrator settings and the debug context handed to the step driver.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Debug and tracing switches, owned by the integrator rather than kept in globals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugContext {
    /// Verify schedule/agent agreement and tracked energies after every step.
    pub check_consistency: bool,
    /// Particle indices whose scans and events are logged at trace level.
    pub watch: Vec<usize>,
}

impl DebugContext {
    #[inline]
    pub fn watches(&self, i: usize) -> bool {
        self.watch.contains(&i)
    }

    #[inline]
    pub fn watches_pair(&self, i: usize, j: usize) -> bool {
        !self.watch.is_empty() && (self.watches(i) || self.watches(j))
    }
}

/// Settings for [`HardIntegrator`](crate::core::HardIntegrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Default step budget used by `run`.
    pub time_step: f64,
    /// Reduced temperature; scales the default time-travel tolerance.
    pub temperature: f64,
    /// How far (in time) an event may precede the previous one before it is
    /// treated as a causality violation. `None` uses `5e-8 / sqrt(temperature)`.
    pub time_travel_tolerance: Option<f64>,
    pub debug: DebugContext,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            time_step: 0.05,
            temperature: 1.0,
            time_travel_tolerance: None,
            debug: DebugContext::default(),
        }
    }
}

impl IntegratorConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(Error::InvalidParam("time_step must be finite and > 0".into()));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(Error::InvalidParam(
                "temperature must be finite and > 0".into(),
            ));
        }
        if let Some(tol) = self.time_travel_tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(Error::InvalidParam(
                    "time_travel_tolerance must be finite and >= 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Effective time-travel tolerance.
    pub fn tolerance(&self) -> f64 {
        self.time_travel_tolerance
            .unwrap_or_else(|| 5.0e-8 / self.temperature.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerance_scales_with_temperature() {
        let mut c = IntegratorConfig::default();
        assert!((c.tolerance() - 5.0e-8).abs() < 1e-20);
        c.temperature = 4.0;
        assert!((c.tolerance() - 2.5e-8).abs() < 1e-20);
        c.time_travel_tolerance = Some(1e-6);
        assert_eq!(c.tolerance(), 1e-6);
    }

    #[test]
    fn parses_partial_toml() -> Result<()> {
        let c = IntegratorConfig::from_toml_str(
            r#"
            time_step = 0.5
            [debug]
            check_consistency = true
            watch = [3, 4]
            "#,
        )?;
        assert_eq!(c.time_step, 0.5);
        assert_eq!(c.temperature, 1.0);
        assert!(c.debug.check_consistency);
        assert!(c.debug.watches_pair(0, 4));
        assert!(!c.debug.watches_pair(0, 1));
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        let err = IntegratorConfig::from_toml_str("time_step = -1.0").unwrap_err();
        assert!(err.to_string().contains("time_step"));
        let err = IntegratorConfig::from_toml_str("time_step = \"fast\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
