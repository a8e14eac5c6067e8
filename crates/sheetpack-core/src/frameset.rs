//! Turning discovered files into named, measured frames.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::config::{AtlasConfig, MeasureConfig};
use crate::error::{Result, SheetPackError};
use crate::model::{Frame, Measurement, Rect};

/// One discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Extension without the leading dot.
    pub extension: String,
}

impl SourceEntry {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        Self { path, extension }
    }
}

/// Resolves `p` against `root` and removes `.`/`..` components without touching the filesystem.
pub fn normalize_path(root: &Path, p: &Path) -> PathBuf {
    let joined = if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    };
    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Builds the ordered frame list of one atlas.
#[derive(Debug, Clone)]
pub struct FrameSetBuilder<'a> {
    root: PathBuf,
    output: String,
    config: &'a AtlasConfig,
}

impl<'a> FrameSetBuilder<'a> {
    /// `root` is the directory relative config paths are resolved against; `output` is the
    /// atlas output name used as the frame name prefix.
    pub fn new(root: impl Into<PathBuf>, output: impl Into<String>, config: &'a AtlasConfig) -> Self {
        Self {
            root: root.into(),
            output: output.into(),
            config,
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Filters, decimates and names `entries`.
    ///
    /// Output order follows `entries` (or the `files` map when one is configured).
    pub fn build(&self, entries: &[SourceEntry]) -> Result<Vec<Frame>> {
        self.config.validate()?;

        let resolved: Vec<PathBuf> = entries
            .iter()
            .map(|e| normalize_path(&self.root, &e.path))
            .collect();

        let candidates: Vec<(usize, Option<&str>)> = match &self.config.files {
            Some(files) => files
                .iter()
                .map(|(path, alias)| {
                    let wanted = normalize_path(&self.root, path);
                    resolved
                        .iter()
                        .position(|p| *p == wanted)
                        .map(|idx| (idx, Some(alias.as_str())))
                        .ok_or_else(|| {
                            SheetPackError::Configuration(format!(
                                "explicit frame {} was not found among discovered files",
                                wanted.display()
                            ))
                        })
                })
                .collect::<Result<_>>()?,
            None => (0..entries.len()).map(|idx| (idx, None)).collect(),
        };

        let excludes: HashSet<PathBuf> = self
            .config
            .excludes
            .iter()
            .map(|p| normalize_path(&self.root, p))
            .collect();
        let wanted_ext = self.config.extension.trim_start_matches('.');

        let factor = self.config.skip as usize + 1;
        let mut names: HashSet<String> = HashSet::new();
        let mut frames = Vec::new();
        let filtered = candidates.into_iter().filter(|&(idx, _)| {
            entries[idx]
                .extension
                .trim_start_matches('.')
                .eq_ignore_ascii_case(wanted_ext)
                && !excludes.contains(&resolved[idx])
        });
        for (pos, (idx, alias)) in filtered.enumerate() {
            if pos % factor != 0 {
                continue;
            }
            let name = match alias {
                Some(alias) => format!("{}-{}", self.output, alias),
                None => format!("{}-{:03}", self.output, pos / factor + 1),
            };
            if !names.insert(name.clone()) {
                return Err(SheetPackError::Configuration(format!(
                    "two frames resolve to the name '{name}'"
                )));
            }
            frames.push(Frame::new(name, resolved[idx].clone()));
        }
        Ok(frames)
    }
}

/// Turns a raw probe into the frame's packable size: padding on every side, optional
/// rounding to even dimensions, trim bookkeeping.
pub fn apply_measurement(frame: &mut Frame, m: &Measurement, cfg: &MeasureConfig) {
    let pad = cfg.padding.saturating_mul(2);
    let mut width = m.width.saturating_add(pad);
    let mut height = m.height.saturating_add(pad);
    let mut forced = false;
    if cfg.divisible_by_two {
        if width & 1 == 1 {
            width += 1;
            forced = true;
        }
        if height & 1 == 1 {
            height += 1;
            forced = true;
        }
    }
    frame.width = width;
    frame.height = height;
    frame.trimmed = false;
    frame.trim = None;
    if cfg.trim {
        let trim = m.trim.unwrap_or(Rect::new(0, 0, m.width, m.height));
        let width_trimmed = trim.w != width - pad;
        let height_trimmed = trim.h != height - pad;
        frame.trimmed = forced || width_trimmed || height_trimmed;
        frame.trim = Some(trim);
    }
}

/// Applies one measurement per frame, in order.
pub fn apply_measurements(
    frames: &mut [Frame],
    measurements: &[Measurement],
    cfg: &MeasureConfig,
) -> Result<()> {
    if frames.len() != measurements.len() {
        return Err(SheetPackError::Configuration(format!(
            "{} frames but {} measurements",
            frames.len(),
            measurements.len()
        )));
    }
    for (frame, m) in frames.iter_mut().zip(measurements) {
        apply_measurement(frame, m, cfg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        let root = Path::new("/assets/hero");
        assert_eq!(
            normalize_path(root, Path::new("./run/../idle.png")),
            PathBuf::from("/assets/hero/idle.png")
        );
        assert_eq!(
            normalize_path(root, Path::new("/other/x.png")),
            PathBuf::from("/other/x.png")
        );
        assert_eq!(
            normalize_path(root, Path::new("../shared/a.png")),
            PathBuf::from("/assets/shared/a.png")
        );
    }

    #[test]
    fn measurement_pads_and_rounds() {
        let cfg = MeasureConfig {
            padding: 2,
            trim: true,
            divisible_by_two: true,
        };
        let mut f = Frame::new("a", "a.png");
        let m = Measurement {
            width: 9,
            height: 10,
            trim: Some(Rect::new(3, 4, 9, 10)),
        };
        apply_measurement(&mut f, &m, &cfg);
        assert_eq!((f.width, f.height), (14, 14));
        assert!(f.trimmed, "rounded frames count as trimmed");
        assert_eq!(f.trim, Some(Rect::new(3, 4, 9, 10)));
    }

    #[test]
    fn measurement_without_trim_keeps_flags_clear() {
        let mut f = Frame::new("a", "a.png");
        let m = Measurement {
            width: 5,
            height: 7,
            trim: Some(Rect::new(1, 1, 3, 3)),
        };
        apply_measurement(&mut f, &m, &MeasureConfig::default());
        assert_eq!((f.width, f.height), (25, 27));
        assert!(!f.trimmed);
        assert!(f.trim.is_none());
    }

    #[test]
    fn measurement_count_mismatch() {
        let mut frames = vec![Frame::new("a", "a.png")];
        assert!(apply_measurements(&mut frames, &[], &MeasureConfig::default()).is_err());
    }
}
