// src/config.rs

use crate::error::GaitError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_yaml_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), GaitError> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(GaitError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {v}"
                )))
            }
        };
        fraction("velocity.strike_fraction", self.velocity.strike_fraction)?;
        fraction("velocity.toeoff_fraction", self.velocity.toeoff_fraction)?;
        fraction("forceplate.contact_threshold", self.forceplate.contact_threshold)?;

        if self.forceplate.min_weight <= 0.0 {
            return Err(GaitError::InvalidConfig(
                "forceplate.min_weight must be positive".into(),
            ));
        }
        if self.forceplate.foot_relative_len <= 0.0 || self.forceplate.foot_breadth < 0.0 {
            return Err(GaitError::InvalidConfig(
                "foot geometry parameters must be positive".into(),
            ));
        }
        if self.velocity.median_width == 0 || self.forceplate.force_median_width == 0 {
            return Err(GaitError::InvalidConfig(
                "median widths must be at least 1".into(),
            ));
        }
        if self.normalize.grid_len < 2 {
            return Err(GaitError::InvalidConfig(format!(
                "normalize.grid_len must be >= 2, got {}",
                self.normalize.grid_len
            )));
        }
        if let Some([lo, hi]) = self.cycles.principal_range {
            if lo > hi {
                return Err(GaitError::InvalidConfig(format!(
                    "cycles.principal_range is inverted: [{lo}, {hi}]"
                )));
            }
        }
        for foot in [&self.markers.right, &self.markers.left] {
            if foot.names().iter().any(|n| n.is_empty()) {
                return Err(GaitError::InvalidConfig(
                    "foot marker names must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}
