//! Core library for laying out sprite sheets.
//!
//! - FrameSet: `frameset::FrameSetBuilder` turns discovered files into named frames
//! - Engine: MaxRects best-area-fit on a fixed canvas (`packer`)
//! - Search: canvas-size strategies driving the engine (`search`)
//! - Cache: in-memory reuse by content key plus a persisted journal (`cache`)
//! - Export: JSON hash descriptor (`export`)
//!
//! Quick example:
//! ```
//! use sheetpack_core::prelude::*;
//! # fn main() -> sheetpack_core::Result<()> {
//! let frames = vec![Frame::sized("a", 50, 30), Frame::sized("b", 40, 40)];
//! let cache = PackCache::new();
//! let out = pack_frames(&frames, &PackerConfig::default(), &cache, "tileset-demo")?;
//! assert_eq!(out.result.len(), 2);
//! assert_eq!(out.result.canvas.width % 2, 0);
//! # Ok(()) }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod frameset;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod search;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `sheetpack_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::cache::{CacheKey, PackCache, PersistentCache};
    pub use crate::config::{
        AtlasConfig, MeasureConfig, PackerConfig, PackerConfigBuilder, SearchStrategy, SortOrder,
    };
    pub use crate::frameset::{FrameSetBuilder, SourceEntry, apply_measurements};
    pub use crate::model::{CanvasSize, Frame, Measurement, PackResult, PackStats, Placement, Rect};
    pub use crate::search::CanvasSearch;
    pub use crate::{PackOutcome, SheetPackError, pack_frames, to_json_hash};
}
