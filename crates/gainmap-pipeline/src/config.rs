//! Pipeline configuration.
//!
//! One explicit value carries every option into the pipeline entry points.
//! It deserializes from YAML; missing keys take their defaults:
//!
//! ```yaml
//! headroom_policy: percentile
//! percentile: 99.5
//! bin_count: 1024
//! compression_quality: 0.9
//! encoder_strategy: auto
//! strategy_table:
//!   default: [legacy, 10bit]
//!   by_arch:
//!     aarch64: [10bit, legacy]
//! ```

use crate::{PipelineError, PipelineResult};
use gainmap_core::MAX_HISTOGRAM_BINS;
use gainmap_io::EncoderStrategy;
use gainmap_ops::HeadroomPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Which headroom policy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadroomMode {
    /// Luma percentile.
    Percentile,
    /// Softened peak luma.
    #[default]
    Max,
}

impl std::str::FromStr for HeadroomMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "percentile" | "p" => Ok(Self::Percentile),
            "max" | "peak" => Ok(Self::Max),
            other => Err(format!("unknown headroom policy: {other}")),
        }
    }
}

/// Container writer entry point, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyName {
    /// 8-bit gain map writer.
    #[serde(rename = "legacy")]
    Legacy,
    /// 10-bit gain map writer.
    #[serde(rename = "10bit")]
    TenBit,
}

impl From<StrategyName> for EncoderStrategy {
    fn from(name: StrategyName) -> Self {
        match name {
            StrategyName::Legacy => EncoderStrategy::Legacy,
            StrategyName::TenBit => EncoderStrategy::TenBit,
        }
    }
}

/// Encoder strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncoderChoice {
    /// Order from [`StrategyTable`].
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Legacy writer only.
    #[serde(rename = "legacy")]
    Legacy,
    /// 10-bit writer only.
    #[serde(rename = "10bit")]
    TenBit,
}

impl std::str::FromStr for EncoderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            other => match other.parse::<EncoderStrategy>()? {
                EncoderStrategy::Legacy => Ok(Self::Legacy),
                EncoderStrategy::TenBit => Ok(Self::TenBit),
            },
        }
    }
}

/// Strategy order used in `auto` mode, keyed by target architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyTable {
    /// Order for architectures without an entry.
    pub default: Vec<StrategyName>,
    /// Per-architecture orders (`std::env::consts::ARCH` names).
    pub by_arch: BTreeMap<String, Vec<StrategyName>>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        let mut by_arch = BTreeMap::new();
        by_arch.insert(
            "aarch64".to_string(),
            vec![StrategyName::TenBit, StrategyName::Legacy],
        );
        Self {
            default: vec![StrategyName::Legacy, StrategyName::TenBit],
            by_arch,
        }
    }
}

impl StrategyTable {
    /// Order for `arch`, falling back to the default row.
    pub fn order_for(&self, arch: &str) -> Vec<EncoderStrategy> {
        self.by_arch
            .get(arch)
            .unwrap_or(&self.default)
            .iter()
            .map(|&s| s.into())
            .collect()
    }
}

/// Options for a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Headroom policy.
    pub headroom_policy: HeadroomMode,
    /// Percentile for [`HeadroomMode::Percentile`], in `(0, 100]`.
    pub percentile: f64,
    /// Blend exponent for [`HeadroomMode::Max`], in `[0, 1]`.
    pub tonemap_ratio: f64,
    /// Histogram bins, `1..=2048`.
    pub bin_count: usize,
    /// Base image quality in `[0, 1]`.
    pub compression_quality: f32,
    /// Container writer selection.
    pub encoder_strategy: EncoderChoice,
    /// Re-open outputs and check the gain map.
    pub verify_after_write: bool,
    /// Worker count; 0 means one per CPU.
    pub max_concurrency: usize,
    /// Headroom threshold for clip diagnostics; the headroom ratio when unset.
    pub clip_threshold: Option<f64>,
    /// Write `<stem>.clip.png` overlays.
    pub clip_overlay: bool,
    /// Skip items whose destination already exists.
    pub skip_existing: bool,
    /// Gain map downscale factor.
    pub gain_map_scale: u32,
    /// `auto` strategy ordering.
    pub strategy_table: StrategyTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            headroom_policy: HeadroomMode::Max,
            percentile: 99.9,
            tonemap_ratio: gainmap_ops::headroom::DEFAULT_TONEMAP_RATIO,
            bin_count: 1024,
            compression_quality: 0.9,
            encoder_strategy: EncoderChoice::Auto,
            verify_after_write: true,
            max_concurrency: 0,
            clip_threshold: None,
            clip_overlay: false,
            skip_existing: false,
            gain_map_scale: 1,
            strategy_table: StrategyTable::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a YAML config file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(text: &str) -> PipelineResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> PipelineResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Rejects out-of-range options.
    pub fn validate(&self) -> PipelineResult<()> {
        self.headroom().validate().map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        if !(1..=MAX_HISTOGRAM_BINS).contains(&self.bin_count) {
            return Err(PipelineError::InvalidConfig(format!(
                "bin count {} outside 1..={}",
                self.bin_count, MAX_HISTOGRAM_BINS
            )));
        }
        if !(0.0..=1.0).contains(&self.compression_quality) {
            return Err(PipelineError::InvalidConfig(format!(
                "compression quality {} outside [0, 1]",
                self.compression_quality
            )));
        }
        if self.gain_map_scale == 0 {
            return Err(PipelineError::InvalidConfig("gain map scale must be at least 1".into()));
        }
        if let Some(t) = self.clip_threshold {
            if !(t.is_finite() && t > 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "clip threshold {t} must be positive"
                )));
            }
        }
        if self.encoder_strategy == EncoderChoice::Auto && self.strategy_order().is_empty() {
            return Err(PipelineError::InvalidConfig("strategy table is empty".into()));
        }
        Ok(())
    }

    /// Headroom policy with its parameter.
    pub fn headroom(&self) -> HeadroomPolicy {
        match self.headroom_policy {
            HeadroomMode::Percentile => HeadroomPolicy::Percentile {
                percentile: self.percentile,
            },
            HeadroomMode::Max => HeadroomPolicy::Max {
                tonemap_ratio: self.tonemap_ratio,
            },
        }
    }

    /// Strategies to try, in order, on this host.
    pub fn strategy_order(&self) -> Vec<EncoderStrategy> {
        self.strategy_order_for(std::env::consts::ARCH)
    }

    /// Strategies to try, in order, on `arch`.
    pub fn strategy_order_for(&self, arch: &str) -> Vec<EncoderStrategy> {
        match self.encoder_strategy {
            EncoderChoice::Auto => self.strategy_table.order_for(arch),
            EncoderChoice::Legacy => vec![EncoderStrategy::Legacy],
            EncoderChoice::TenBit => vec![EncoderStrategy::TenBit],
        }
    }

    /// Worker count with 0 resolved to the CPU count.
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrency > 0 {
            self.max_concurrency
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.headroom(), HeadroomPolicy::default());
        assert!(config.effective_concurrency() >= 1);
    }

    #[test]
    fn test_yaml_partial() {
        let config = PipelineConfig::from_yaml_str(
            "headroom_policy: percentile\npercentile: 99.5\nencoder_strategy: 10bit\n",
        )
        .unwrap();
        assert_eq!(config.headroom(), HeadroomPolicy::Percentile { percentile: 99.5 });
        assert_eq!(config.strategy_order(), vec![EncoderStrategy::TenBit]);
        assert_eq!(config.bin_count, 1024);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PipelineConfig {
            clip_threshold: Some(2.0),
            max_concurrency: 3,
            ..Default::default()
        };
        let back = PipelineConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_auto_order_by_arch() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.strategy_order_for("aarch64"),
            vec![EncoderStrategy::TenBit, EncoderStrategy::Legacy]
        );
        assert_eq!(
            config.strategy_order_for("x86_64"),
            vec![EncoderStrategy::Legacy, EncoderStrategy::TenBit]
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        let bad = [
            PipelineConfig { bin_count: 0, ..Default::default() },
            PipelineConfig { bin_count: 4096, ..Default::default() },
            PipelineConfig { compression_quality: 1.5, ..Default::default() },
            PipelineConfig { tonemap_ratio: -0.1, ..Default::default() },
            PipelineConfig {
                headroom_policy: HeadroomMode::Percentile,
                percentile: 0.0,
                ..Default::default()
            },
            PipelineConfig { clip_threshold: Some(-1.0), ..Default::default() },
            PipelineConfig { gain_map_scale: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_choice_parse() {
        assert_eq!("AUTO".parse(), Ok(EncoderChoice::Auto));
        assert_eq!("legacy".parse(), Ok(EncoderChoice::Legacy));
        assert_eq!("10bit".parse(), Ok(EncoderChoice::TenBit));
        assert!("jpeg".parse::<EncoderChoice>().is_err());
        assert_eq!("Percentile".parse(), Ok(HeadroomMode::Percentile));
        assert_eq!("max".parse(), Ok(HeadroomMode::Max));
        assert!("mean".parse::<HeadroomMode>().is_err());
    }
}
