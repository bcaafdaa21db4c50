//! Configuration for the clumping engine.

use serde::{Deserialize, Serialize};

use crate::error::{ClumpingError, Result};

/// Configuration for a [`ClumpingManager`](crate::ClumpingManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClumpingConfig {
    /// How many earlier planes a row is linked to in 3D grids.
    ///
    /// 1 links adjacent planes only; 0 clumps every plane independently.
    pub plane_link_depth: usize,

    /// Dual-threshold growing; `None` returns one prop per clump.
    pub dual_threshold: Option<DualThresholdConfig>,
}

impl Default for ClumpingConfig {
    fn default() -> Self {
        Self {
            plane_link_depth: 1,
            dual_threshold: None,
        }
    }
}

impl ClumpingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CLUMP_PLANE_LINK_DEPTH") {
            if let Ok(depth) = val.parse() {
                config.plane_link_depth = depth;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_ENABLED") {
            if parse_bool(&val) {
                config.dual_threshold = Some(DualThresholdConfig::from_env());
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(dual) = &self.dual_threshold {
            dual.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Dual-threshold configuration
// ============================================================================

/// Acceptance criteria for dual-threshold growing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualThresholdConfig {
    /// Strict threshold that defines the seed clumps.
    pub secondary_threshold: f64,

    /// Minimum share of a candidate's volume (km3) that lies in seeds.
    pub min_fraction_all_parts: f64,

    /// Minimum share of a candidate's volume (km3) each grown part must hold.
    pub min_fraction_each_part: f64,

    /// Minimum number of intervals in each grown part.
    pub min_size_each_part: usize,

    /// Smallest accepted candidate volume in km3.
    pub min_clump_volume_km3: f64,

    /// Largest accepted candidate volume in km3.
    pub max_clump_volume_km3: f64,

    /// Log every candidate decision at info level.
    pub debug: bool,
}

impl Default for DualThresholdConfig {
    fn default() -> Self {
        Self {
            secondary_threshold: 45.0,
            min_fraction_all_parts: 0.5,
            min_fraction_each_part: 0.02,
            min_size_each_part: 2,
            min_clump_volume_km3: 0.0,
            max_clump_volume_km3: f64::MAX,
            debug: false,
        }
    }
}

impl DualThresholdConfig {
    /// Load dual-threshold settings from `CLUMP_DUAL_*` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CLUMP_DUAL_SECONDARY_THRESHOLD") {
            if let Ok(t) = val.parse() {
                config.secondary_threshold = t;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_MIN_FRACTION_ALL") {
            if let Ok(f) = val.parse() {
                config.min_fraction_all_parts = f;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_MIN_FRACTION_EACH") {
            if let Ok(f) = val.parse() {
                config.min_fraction_each_part = f;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_MIN_SIZE_EACH") {
            if let Ok(n) = val.parse() {
                config.min_size_each_part = n;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_MIN_VOLUME_KM3") {
            if let Ok(v) = val.parse() {
                config.min_clump_volume_km3 = v;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_MAX_VOLUME_KM3") {
            if let Ok(v) = val.parse() {
                config.max_clump_volume_km3 = v;
            }
        }

        if let Ok(val) = std::env::var("CLUMP_DUAL_DEBUG") {
            config.debug = parse_bool(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.secondary_threshold.is_nan() {
            return Err(ClumpingError::invalid_config("secondary_threshold is NaN"));
        }

        check_fraction("min_fraction_all_parts", self.min_fraction_all_parts)?;
        check_fraction("min_fraction_each_part", self.min_fraction_each_part)?;

        if self.min_clump_volume_km3.is_nan() || self.min_clump_volume_km3 < 0.0 {
            return Err(ClumpingError::invalid_config(
                "min_clump_volume_km3 must be >= 0",
            ));
        }

        if self.max_clump_volume_km3.is_nan() || self.max_clump_volume_km3 < 0.0 {
            return Err(ClumpingError::invalid_config(
                "max_clump_volume_km3 must be >= 0",
            ));
        }

        if self.min_clump_volume_km3 > self.max_clump_volume_km3 {
            return Err(ClumpingError::invalid_config(format!(
                "min_clump_volume_km3 ({}) exceeds max_clump_volume_km3 ({})",
                self.min_clump_volume_km3, self.max_clump_volume_km3
            )));
        }

        Ok(())
    }

    /// Check the secondary threshold is stricter than `primary`.
    pub fn check_primary(&self, primary: f64) -> Result<()> {
        if self.secondary_threshold <= primary {
            return Err(ClumpingError::invalid_config(format!(
                "secondary_threshold ({}) must exceed the primary threshold ({})",
                self.secondary_threshold, primary
            )));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ClumpingError::invalid_config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}
