//! Content-addressed reuse of pack results.
//!
//! [`PackCache`] is an explicit, process-lifetime object: build one per run and pass it by
//! reference to every pack. Results are stored under a [`CacheKey`] derived from frame
//! names, sizes and the packer config, and reattached to the current frames by name on a hit.
//! [`persist::PersistentCache`] covers reuse across runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PackerConfig;
use crate::error::Result;
use crate::model::{Frame, PackResult, Placement};

pub mod persist;

pub use persist::PersistentCache;

/// SHA-256 hex digest over the output name, the ordered `(name, width, height)` triples and
/// every [`PackerConfig`] field that can change a layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(output_name: &str, frames: &[Frame], cfg: &PackerConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output_name.as_bytes());
        hasher.update([0u8]);
        for f in frames {
            hasher.update(f.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(f.width.to_le_bytes());
            hasher.update(f.height.to_le_bytes());
        }
        hash_layout_config(&mut hasher, cfg);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `parallel` is left out: it changes scheduling, never placements.
fn hash_layout_config(hasher: &mut Sha256, cfg: &PackerConfig) {
    hasher.update(cfg.max_width.to_le_bytes());
    hasher.update(cfg.max_height.to_le_bytes());
    hasher.update([u8::from(cfg.allow_rotation)]);
    hasher.update(format!("{:?}/{:?}", cfg.sort_order, cfg.strategy).as_bytes());
    hasher.update(cfg.aspect_threshold.to_le_bytes());
    hasher.update(cfg.max_aspect_ratio.to_bits().to_le_bytes());
    hasher.update(cfg.sweep_samples.to_le_bytes());
    hasher.update((cfg.population as u64).to_le_bytes());
    hasher.update((cfg.generations as u64).to_le_bytes());
    hasher.update(cfg.live_rate.to_bits().to_le_bytes());
    hasher.update(cfg.seed.to_le_bytes());
}

/// Reasons a cached result cannot be reattached. Always recovered as a miss.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum CacheError {
    #[error("cached result has {cached} placements, current frame set has {current}")]
    Cardinality { cached: usize, current: usize },
    #[error("cached result was packed with rotation={cached}, requested rotation={requested}")]
    Rotation { cached: bool, requested: bool },
    #[error("frame '{0}' is missing from the cached result")]
    MissingFrame(String),
    #[error("frame '{name}' is {width}x{height} but the cached slot is {slot_w}x{slot_h}")]
    Dimensions {
        name: String,
        width: u32,
        height: u32,
        slot_w: u32,
        slot_h: u32,
    },
}

/// Maps a cached result onto `frames`, in the order of `frames`.
pub(crate) fn reattach(
    cached: &PackResult,
    frames: &[Frame],
    rotatable: bool,
) -> std::result::Result<PackResult, CacheError> {
    if cached.placements.len() != frames.len() {
        return Err(CacheError::Cardinality {
            cached: cached.placements.len(),
            current: frames.len(),
        });
    }
    if cached.rotatable != rotatable {
        return Err(CacheError::Rotation {
            cached: cached.rotatable,
            requested: rotatable,
        });
    }
    let by_name: HashMap<&str, &Placement> = cached
        .placements
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();
    let mut placements = Vec::with_capacity(frames.len());
    for f in frames {
        let p = by_name
            .get(f.name.as_str())
            .ok_or_else(|| CacheError::MissingFrame(f.name.clone()))?;
        let (w, h) = if p.rotated {
            (f.height, f.width)
        } else {
            (f.width, f.height)
        };
        if (p.w, p.h) != (w, h) {
            return Err(CacheError::Dimensions {
                name: f.name.clone(),
                width: f.width,
                height: f.height,
                slot_w: p.w,
                slot_h: p.h,
            });
        }
        placements.push(Placement {
            name: f.name.clone(),
            ..(*p).clone()
        });
    }
    Ok(PackResult {
        canvas: cached.canvas,
        placements,
        rotatable,
    })
}

type Slot = Arc<Mutex<Option<PackResult>>>;

/// In-memory pack cache. Never evicts.
///
/// The key table sits behind one mutex; every key has its own mutex around
/// lookup-compute-store, so identical builds serialize while different keys do not
/// block each other. Poisoned locks are recovered: stored values are immutable results.
#[derive(Debug, Default)]
pub struct PackCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl PackCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &CacheKey) -> Option<Slot> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).map(Arc::clone)
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<PackResult> {
        let slot = self.existing_slot(key)?;
        let value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        value.clone()
    }

    /// Stores `result` under `key`, replacing any previous value.
    pub fn store(&self, key: CacheKey, result: PackResult) {
        let slot = self.slot(&key);
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *value = Some(result);
    }

    /// Number of keys holding a result.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = {
            let map = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            map.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|s| s.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached result reattached to `frames`, or runs `pack_fn` and stores its output.
    ///
    /// The second tuple field is true on a hit. An unusable cached value is logged and
    /// recomputed; errors from `pack_fn` are returned and nothing is stored.
    pub fn get_or_pack<F>(
        &self,
        key: &CacheKey,
        frames: &[Frame],
        rotatable: bool,
        pack_fn: F,
    ) -> Result<(PackResult, bool)>
    where
        F: FnOnce(&[Frame]) -> Result<PackResult>,
    {
        let slot = self.slot(key);
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = value.as_ref() {
            match reattach(cached, frames, rotatable) {
                Ok(result) => {
                    debug!(key = %key, "pack cache hit");
                    return Ok((result, true));
                }
                Err(err) => warn!(key = %key, error = %err, "discarding cached pack result"),
            }
        }
        let result = pack_fn(frames)?;
        *value = Some(result.clone());
        Ok((result, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanvasSize;

    fn cached() -> PackResult {
        PackResult {
            canvas: CanvasSize::new(20, 10),
            placements: vec![
                Placement {
                    name: "a".into(),
                    x: 0,
                    y: 0,
                    w: 10,
                    h: 10,
                    rotated: false,
                },
                Placement {
                    name: "b".into(),
                    x: 10,
                    y: 0,
                    w: 10,
                    h: 4,
                    rotated: true,
                },
            ],
            rotatable: true,
        }
    }

    #[test]
    fn reattach_follows_current_order() {
        let frames = vec![Frame::sized("b", 4, 10), Frame::sized("a", 10, 10)];
        let r = reattach(&cached(), &frames, true).expect("reattach");
        assert_eq!(r.placements[0].name, "b");
        assert_eq!((r.placements[0].x, r.placements[0].rotated), (10, true));
        assert_eq!(r.placements[1].name, "a");
    }

    #[test]
    fn reattach_detects_inconsistencies() {
        let frames = vec![Frame::sized("a", 10, 10), Frame::sized("b", 4, 10)];
        assert_eq!(
            reattach(&cached(), &frames, false),
            Err(CacheError::Rotation {
                cached: true,
                requested: false
            })
        );
        assert!(matches!(
            reattach(&cached(), &frames[..1], true),
            Err(CacheError::Cardinality { .. })
        ));
        let renamed = vec![Frame::sized("a", 10, 10), Frame::sized("c", 4, 10)];
        assert_eq!(
            reattach(&cached(), &renamed, true),
            Err(CacheError::MissingFrame("c".into()))
        );
        let resized = vec![Frame::sized("a", 10, 10), Frame::sized("b", 10, 4)];
        assert!(matches!(
            reattach(&cached(), &resized, true),
            Err(CacheError::Dimensions { .. })
        ));
    }

    #[test]
    fn key_is_hex_sha256() {
        let frames = [Frame::sized("a", 1, 2)];
        let k = CacheKey::new("atlas", &frames, &PackerConfig::default());
        assert_eq!(k.as_str().len(), 64);
        assert!(k.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
