use crate::foundation::core::Color;
use crate::foundation::error::{StrataError, StrataResult};
use crate::graph::walker::Direction;

/// Diagnostics switches.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    /// Outline every re-rendered region after the pass.
    pub show_dirty_regions: bool,
    /// Outline color.
    pub dirty_region_color: Color,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_dirty_regions: false,
            dirty_region_color: Color::rgba(255, 0, 255, 160),
        }
    }
}

/// Knobs of a composition pass.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositorConfig {
    /// Merge overhead (square device pixels) below which dirty regions are merged.
    pub merge_threshold: f64,
    /// Largest intermediate surface edge; the target may lower it further.
    pub max_intermediate_dimension: u32,
    /// Sibling order of every traversal.
    pub traversal_direction: Direction,
    /// Use target layers for opacity and rectangular clips when possible.
    pub use_native_layers: bool,
    /// Honor guideline frames.
    pub pixel_snapping: bool,
    /// Diagnostics.
    pub debug: DebugConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 50_000.0,
            max_intermediate_dimension: 4096,
            traversal_direction: Direction::LeftToRight,
            use_native_layers: true,
            pixel_snapping: true,
            debug: DebugConfig::default(),
        }
    }
}

impl CompositorConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> StrataResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STRATA_MERGE_THRESHOLD`, `STRATA_MAX_INTERMEDIATE_DIM` and
    /// `STRATA_SHOW_DIRTY_REGIONS` from the process environment.
    pub fn with_env_overrides(self) -> StrataResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply the same overrides as [`CompositorConfig::with_env_overrides`] from `lookup`.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> StrataResult<Self> {
        if let Some(v) = lookup("STRATA_MERGE_THRESHOLD") {
            self.merge_threshold = parse_var("STRATA_MERGE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("STRATA_MAX_INTERMEDIATE_DIM") {
            self.max_intermediate_dimension = parse_var("STRATA_MAX_INTERMEDIATE_DIM", &v)?;
        }
        if let Some(v) = lookup("STRATA_SHOW_DIRTY_REGIONS") {
            self.debug.show_dirty_regions = match v.trim() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(StrataError::config(format!(
                        "STRATA_SHOW_DIRTY_REGIONS: expected a boolean, got {other:?}"
                    )));
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values no pass can work with.
    pub fn validate(&self) -> StrataResult<()> {
        if !self.merge_threshold.is_finite() || self.merge_threshold < 0.0 {
            return Err(StrataError::config(format!(
                "merge_threshold must be finite and >= 0, got {}",
                self.merge_threshold
            )));
        }
        if self.max_intermediate_dimension == 0
            || self.max_intermediate_dimension > u32::from(u16::MAX)
        {
            return Err(StrataError::config(format!(
                "max_intermediate_dimension must be in 1..={}, got {}",
                u16::MAX,
                self.max_intermediate_dimension
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> StrataResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StrataError::config(format!("{key}: {e}")))
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
