use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the interiors of `self` and `r` overlap.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right() || r.x >= self.right() || self.y >= r.bottom() || r.y >= self.bottom())
    }
}

/// One rectangle to place on the sheet.
///
/// `width`/`height` are the packable size: already inflated by padding and,
/// when configured, rounded up to even values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    /// Unique within a frame set; survives cache hits.
    pub name: String,
    /// Source file the frame was discovered at.
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// True if the source has transparent borders cut away.
    pub trimmed: bool,
    /// Trimmed content rectangle within the original image.
    pub trim: Option<Rect>,
}

impl Frame {
    /// Creates an unmeasured frame (0x0).
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            width: 0,
            height: 0,
            trimmed: false,
            trim: None,
        }
    }

    /// Convenience constructor for an already measured frame.
    pub fn sized(name: impl Into<String>, width: u32, height: u32) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            width,
            height,
            trimmed: false,
            trim: None,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_measured(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Raw size probe result for one frame, before padding and rounding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Measurement {
    pub width: u32,
    pub height: u32,
    /// Content bounds after trimming, in source pixels.
    pub trim: Option<Rect>,
}

/// Final canvas dimensions (always even).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Where one frame landed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub x: u32,
    pub y: u32,
    /// Occupied size on the canvas (post-rotation).
    pub w: u32,
    pub h: u32,
    /// True if the frame was rotated 90° when placed.
    pub rotated: bool,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// Canvas plus one placement per frame, in the input frame order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackResult {
    pub canvas: CanvasSize,
    pub placements: Vec<Placement>,
    /// Rotation policy the result was computed with.
    pub rotatable: bool,
}

impl PackResult {
    pub fn empty(rotatable: bool) -> Self {
        Self {
            canvas: CanvasSize::default(),
            placements: Vec::new(),
            rotatable,
        }
    }

    pub fn placement(&self, name: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Computes packing statistics for this result.
    pub fn stats(&self) -> PackStats {
        let canvas_area = self.canvas.area();
        let used_area: u64 = self.placements.iter().map(|p| p.rect().area()).sum();
        let occupancy = if canvas_area > 0 {
            used_area as f64 / canvas_area as f64
        } else {
            0.0
        };
        PackStats {
            num_frames: self.placements.len(),
            canvas_area,
            used_area,
            occupancy,
            num_rotated: self.placements.iter().filter(|p| p.rotated).count(),
        }
    }
}

/// Statistics about packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    pub num_frames: usize,
    /// Canvas width * height.
    pub canvas_area: u64,
    /// Sum of placed frame areas.
    pub used_area: u64,
    /// used_area / canvas_area (0.0 to 1.0).
    pub occupancy: f64,
    pub num_rotated: usize,
}

impl PackStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Frames: {}, Occupancy: {:.2}%, Canvas Area: {} px², Used Area: {} px², Rotated: {}",
            self.num_frames,
            self.occupancy * 100.0,
            self.canvas_area,
            self.used_area,
            self.num_rotated,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.canvas_area.saturating_sub(self.used_area)
    }
}
