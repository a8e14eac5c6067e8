use tracing::{info, instrument};

use crate::cache::{CacheKey, PackCache};
use crate::config::PackerConfig;
use crate::error::Result;
use crate::model::{Frame, PackResult};
use crate::packer::{self, validate_frames};

/// Result of one atlas build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOutcome {
    pub key: CacheKey,
    pub result: PackResult,
    /// True if the placement came from `cache` instead of a fresh search.
    pub from_cache: bool,
}

#[instrument(skip_all, fields(output = output_name, frames = frames.len()))]
/// Packs measured `frames` for `output_name`, reusing `cache` when the same frame set was
/// packed earlier in this process.
///
/// Notes:
/// - Frames are validated before the cache is consulted, so a bad frame fails the same way
///   on a hit and on a miss.
/// - A cached result that cannot be reattached is discarded and recomputed.
pub fn pack_frames(
    frames: &[Frame],
    cfg: &PackerConfig,
    cache: &PackCache,
    output_name: &str,
) -> Result<PackOutcome> {
    cfg.validate()?;
    validate_frames(frames)?;

    let key = CacheKey::new(output_name, frames, cfg);
    let (result, from_cache) =
        cache.get_or_pack(&key, frames, cfg.allow_rotation, |f| packer::pack(f, cfg))?;
    info!(
        width = result.canvas.width,
        height = result.canvas.height,
        from_cache,
        "atlas laid out"
    );
    Ok(PackOutcome {
        key,
        result,
        from_cache,
    })
}

