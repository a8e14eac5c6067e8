use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, SheetPackError};

/// Canvas-size search strategies.
/// Key notes:
///   - `sweep` evaluates a fixed set of evenly spaced canvas widths (deterministic, parallelizable)
///   - `genetic` evolves canvas widths with a seeded RNG (deterministic for a fixed seed)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Sweep,
    Genetic,
}

impl FromStr for SearchStrategy {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sweep" => Ok(Self::Sweep),
            "genetic" | "ga" => Ok(Self::Genetic),
            _ => Err(()),
        }
    }
}

/// Orders frames are fed to the engine in. Sorting is stable; ties fall back to name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AreaDesc,
    MaxSideDesc,
    HeightDesc,
    WidthDesc,
    NameAsc,
    None,
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "height_desc" => Ok(Self::HeightDesc),
            "width_desc" => Ok(Self::WidthDesc),
            "name_asc" => Ok(Self::NameAsc),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Engine and search configuration. Everything here influences placements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackerConfig {
    /// Largest canvas width the search may propose.
    pub max_width: u32,
    /// Largest canvas height the search may propose.
    pub max_height: u32,
    /// Allow 90° rotations for placements where beneficial.
    pub allow_rotation: bool,

    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
    #[serde(default = "default_strategy")]
    pub strategy: SearchStrategy,

    /// Above this estimated sheet length the search keeps the canvas near-square.
    #[serde(default = "default_aspect_threshold")]
    pub aspect_threshold: u64,
    /// Long side / short side ceiling applied when `aspect_threshold` is exceeded.
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f64,

    /// Number of candidate widths the sweep evaluates.
    #[serde(default = "default_sweep_samples")]
    pub sweep_samples: u32,
    /// Genetic search: individuals per generation.
    #[serde(default = "default_population")]
    pub population: usize,
    /// Genetic search: number of generations.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Genetic search: fraction of each generation that survives.
    #[serde(default = "default_live_rate")]
    pub live_rate: f64,
    /// Genetic search: RNG seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Evaluate sweep candidates in parallel when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_width: 8192,
            max_height: 8192,
            allow_rotation: false,
            sort_order: default_sort_order(),
            strategy: default_strategy(),
            aspect_threshold: default_aspect_threshold(),
            max_aspect_ratio: default_max_aspect_ratio(),
            sweep_samples: default_sweep_samples(),
            population: default_population(),
            generations: default_generations(),
            live_rate: default_live_rate(),
            seed: default_seed(),
            parallel: false,
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - Canvas limits are zero
    /// - The aspect ceiling is below 1:1
    /// - A search budget is empty
    pub fn validate(&self) -> Result<()> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(SheetPackError::Configuration(format!(
                "max canvas must be non-zero, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        if !(self.max_aspect_ratio >= 1.0) {
            return Err(SheetPackError::Configuration(format!(
                "max_aspect_ratio must be >= 1.0, got {}",
                self.max_aspect_ratio
            )));
        }
        if self.sweep_samples == 0 {
            return Err(SheetPackError::Configuration(
                "sweep_samples must be at least 1".into(),
            ));
        }
        if self.population < 2 || self.generations == 0 {
            return Err(SheetPackError::Configuration(format!(
                "genetic search needs population >= 2 and generations >= 1, got {} / {}",
                self.population, self.generations
            )));
        }
        if !(self.live_rate > 0.0 && self.live_rate <= 1.0) {
            return Err(SheetPackError::Configuration(format!(
                "live_rate must be in (0, 1], got {}",
                self.live_rate
            )));
        }
        Ok(())
    }

    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}

fn default_sort_order() -> SortOrder {
    SortOrder::AreaDesc
}
fn default_strategy() -> SearchStrategy {
    SearchStrategy::Sweep
}
fn default_aspect_threshold() -> u64 {
    1500
}
fn default_max_aspect_ratio() -> f64 {
    2.0
}
fn default_sweep_samples() -> u32 {
    32
}
fn default_population() -> usize {
    16
}
fn default_generations() -> usize {
    12
}
fn default_live_rate() -> f64 {
    0.5
}
fn default_seed() -> u64 {
    0x5eed_cafe
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.max_width = w;
        self.cfg.max_height = h;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.allow_rotation = v;
        self
    }
    pub fn sort_order(mut self, v: SortOrder) -> Self {
        self.cfg.sort_order = v;
        self
    }
    pub fn strategy(mut self, v: SearchStrategy) -> Self {
        self.cfg.strategy = v;
        self
    }
    pub fn aspect_threshold(mut self, v: u64) -> Self {
        self.cfg.aspect_threshold = v;
        self
    }
    pub fn max_aspect_ratio(mut self, v: f64) -> Self {
        self.cfg.max_aspect_ratio = v;
        self
    }
    pub fn sweep_samples(mut self, v: u32) -> Self {
        self.cfg.sweep_samples = v;
        self
    }
    pub fn population(mut self, v: usize) -> Self {
        self.cfg.population = v;
        self
    }
    pub fn generations(mut self, v: usize) -> Self {
        self.cfg.generations = v;
        self
    }
    pub fn live_rate(mut self, v: f64) -> Self {
        self.cfg.live_rate = v;
        self
    }
    pub fn seed(mut self, v: u64) -> Self {
        self.cfg.seed = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

/// How raw probed sizes are turned into packable frame sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeasureConfig {
    /// Pixels added on every side of each frame.
    pub padding: u32,
    /// Record trim rects and the `trimmed` flag.
    pub trim: bool,
    /// Bump odd frame dimensions to the next even value.
    pub divisible_by_two: bool,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            trim: false,
            divisible_by_two: false,
        }
    }
}

/// Per-atlas configuration, usually loaded from a `tileset.yaml` next to the frames.
///
/// `scale` and `colors` are carried for the compositing/optimizing collaborators;
/// they take part in the persisted-cache digest but not in packing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtlasConfig {
    /// Output name template; `$name$` expands to `tileset-<dir>`.
    pub interpolate: String,
    pub trim: bool,
    pub rotatable: bool,
    pub scale: f64,
    pub padding: u32,
    pub colors: u32,
    /// Keep one frame, drop the next `skip`.
    pub skip: u32,
    /// Explicit frame list: path -> alias, kept in document order.
    #[serde(with = "ordered_pairs")]
    pub files: Option<Vec<(PathBuf, String)>>,
    pub excludes: Vec<PathBuf>,
    /// File extension (without dot) frames must carry.
    pub extension: String,
    pub divisible_by_two: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            interpolate: String::new(),
            trim: false,
            rotatable: false,
            scale: 1.0,
            padding: 10,
            colors: 0,
            skip: 0,
            files: None,
            excludes: Vec::new(),
            extension: "png".into(),
            divisible_by_two: false,
        }
    }
}

impl AtlasConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(SheetPackError::Configuration(format!(
                "scale must be in (0, 1], got {}",
                self.scale
            )));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(SheetPackError::Configuration(
                "extension must not be empty".into(),
            ));
        }
        if let Some(files) = &self.files {
            if let Some((path, _)) = files.iter().find(|(_, alias)| alias.is_empty()) {
                return Err(SheetPackError::Configuration(format!(
                    "empty alias for {}",
                    path.display()
                )));
            }
            let mut seen = HashSet::new();
            if let Some((path, _)) = files.iter().find(|(path, _)| !seen.insert(path)) {
                return Err(SheetPackError::Configuration(format!(
                    "{} is listed twice in files",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Atlas output name for frames living in a directory named `dir_name`.
    pub fn output_name(&self, dir_name: &str) -> String {
        let default = format!("tileset-{dir_name}");
        if self.interpolate.is_empty() {
            default
        } else {
            self.interpolate.replace("$name$", &default)
        }
    }

    pub fn measure_config(&self) -> MeasureConfig {
        MeasureConfig {
            padding: self.padding,
            trim: self.trim,
            divisible_by_two: self.divisible_by_two,
        }
    }

    /// Applies the atlas-level rotation policy on top of `base`.
    pub fn packer_config(&self, base: PackerConfig) -> PackerConfig {
        PackerConfig {
            allow_rotation: self.rotatable,
            ..base
        }
    }
}

/// `files` as a YAML/JSON map whose entry order is preserved.
mod ordered_pairs {
    use std::fmt;
    use std::path::PathBuf;

    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    type Pairs = Vec<(PathBuf, String)>;

    pub fn serialize<S: Serializer>(value: &Option<Pairs>, s: S) -> Result<S::Ok, S::Error> {
        let Some(pairs) = value else {
            return s.serialize_none();
        };
        let mut map = s.serialize_map(Some(pairs.len()))?;
        for (path, alias) in pairs {
            map.serialize_entry(path, alias)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Pairs>, D::Error> {
        d.deserialize_option(PairsVisitor)
    }

    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Option<Pairs>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of frame paths to aliases")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_map(self)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry::<PathBuf, String>()? {
                pairs.push(entry);
            }
            Ok(Some(pairs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_interpolates() {
        let mut cfg = AtlasConfig::default();
        assert_eq!(cfg.output_name("hero"), "tileset-hero");
        cfg.interpolate = "ui-$name$-v2".into();
        assert_eq!(cfg.output_name("hero"), "ui-tileset-hero-v2");
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!("Sweep".parse::<SearchStrategy>(), Ok(SearchStrategy::Sweep));
        assert_eq!("ga".parse::<SearchStrategy>(), Ok(SearchStrategy::Genetic));
        assert!("annealing".parse::<SearchStrategy>().is_err());
    }

    #[test]
    fn validate_rejects_empty_budget() {
        let cfg = PackerConfig::builder().sweep_samples(0).build();
        assert!(matches!(
            cfg.validate(),
            Err(SheetPackError::Configuration(_))
        ));
        let cfg = PackerConfig::builder().max_aspect_ratio(0.5).build();
        assert!(cfg.validate().is_err());
        assert!(PackerConfig::default().validate().is_ok());
    }

    #[test]
    fn atlas_config_from_partial_yaml_like_json() {
        let cfg: AtlasConfig =
            serde_json::from_str(r#"{"skip": 2, "rotatable": true}"#).expect("parse");
        assert_eq!(cfg.skip, 2);
        assert!(cfg.rotatable);
        assert_eq!(cfg.padding, 10);
        assert_eq!(cfg.extension, "png");
        assert!(cfg.packer_config(PackerConfig::default()).allow_rotation);
    }

    #[test]
    fn files_keep_document_order() {
        let cfg: AtlasConfig =
            serde_json::from_str(r#"{"files": {"z.png": "last", "a.png": "first"}}"#)
                .expect("parse");
        let files = cfg.files.as_deref().expect("files");
        assert_eq!(
            files,
            [
                (PathBuf::from("z.png"), "last".to_string()),
                (PathBuf::from("a.png"), "first".to_string()),
            ]
        );
        let json = serde_json::to_string(&cfg).expect("serialize");
        assert!(json.contains(r#""files":{"z.png":"last","a.png":"first"}"#));

        let cfg: AtlasConfig = serde_json::from_str(r#"{"files": null}"#).expect("parse");
        assert!(cfg.files.is_none());
    }

    #[test]
    fn files_listed_twice_are_rejected() {
        let cfg = AtlasConfig {
            files: Some(vec![
                (PathBuf::from("a.png"), "idle".into()),
                (PathBuf::from("a.png"), "run".into()),
            ]),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SheetPackError::Configuration(msg)) if msg.contains("listed twice")
        ));
    }
}
