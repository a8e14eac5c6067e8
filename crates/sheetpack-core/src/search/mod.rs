//! Canvas-size search.
//!
//! MaxRects quality depends on the canvas it is given. Strategies here propose canvas
//! widths; each width is turned into a concrete layout by [`SearchContext::evaluate_width`],
//! which binary-searches the smallest height that still packs.
//!
//! Every strategy works within a fixed evaluation budget, independent of the frame count.

use std::cmp::Ordering;

use tracing::trace;

use crate::config::{PackerConfig, SearchStrategy};
use crate::model::CanvasSize;
use crate::packer::{Item, Layout, pack_on_canvas};

pub mod genetic;
pub mod sweep;

pub use genetic::GeneticSearch;
pub use sweep::SweepSearch;

/// A strategy choosing canvas dimensions for a fixed item sequence.
///
/// Implementations must be deterministic for identical inputs and must terminate within
/// a budget that does not grow with the number of items.
pub trait CanvasSearch: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns the best layout found, or `None` if no evaluated canvas fits every item.
    fn search(&self, ctx: &SearchContext<'_>) -> Option<Layout>;
}

pub fn strategy_for(cfg: &PackerConfig) -> Box<dyn CanvasSearch> {
    match cfg.strategy {
        SearchStrategy::Sweep => Box::new(SweepSearch::new(cfg.sweep_samples, cfg.parallel)),
        SearchStrategy::Genetic => Box::new(GeneticSearch::new(
            cfg.population,
            cfg.generations,
            cfg.live_rate,
            cfg.seed,
        )),
    }
}

/// Geometry limits derived once from the item set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBounds {
    pub total_area: u64,
    /// No canvas can be narrower than this.
    pub min_width: u32,
    /// No canvas can be shorter than this.
    pub min_height: u32,
    /// Widest useful canvas: every item in one row, capped by the (even) maximum.
    pub max_width: u32,
    /// Configured maximum height lowered to even.
    pub max_height: u32,
    /// Estimated sheet length, `min(total_area / min_width, total_area / min_height)`.
    pub max_dimension: u64,
}

impl SearchBounds {
    /// Returns `None` when some item cannot fit the configured maximum canvas at all.
    ///
    /// Odd maxima are lowered to the next even value, since the final canvas is rounded up.
    pub fn new(items: &[Item], cfg: &PackerConfig) -> Option<Self> {
        let rotate = cfg.allow_rotation;
        let (limit_w, limit_h) = (cfg.max_width & !1, cfg.max_height & !1);
        let mut total_area = 0u64;
        let mut min_width = 0u32;
        let mut min_height = 0u32;
        let mut row_width = 0u64;
        for it in items {
            let fits = it.w <= limit_w && it.h <= limit_h;
            let fits_rotated = rotate && it.h <= limit_w && it.w <= limit_h;
            if !fits && !fits_rotated {
                return None;
            }
            total_area += u64::from(it.w) * u64::from(it.h);
            if rotate {
                let short = it.w.min(it.h);
                min_width = min_width.max(short);
                min_height = min_height.max(short);
                row_width += u64::from(it.w.max(it.h));
            } else {
                min_width = min_width.max(it.w);
                min_height = min_height.max(it.h);
                row_width += u64::from(it.w);
            }
        }
        if items.is_empty() {
            return None;
        }
        let max_width = u32::try_from(row_width)
            .unwrap_or(u32::MAX)
            .min(limit_w)
            .max(min_width);
        let max_dimension =
            (total_area / u64::from(min_width)).min(total_area / u64::from(min_height));
        Some(Self {
            total_area,
            min_width,
            min_height,
            max_width,
            max_height: limit_h,
            max_dimension,
        })
    }

    /// Width of a square holding the total area exactly; the first width worth trying.
    pub fn square_width(&self) -> u32 {
        let side = (self.total_area as f64).sqrt().ceil() as u32;
        side.clamp(self.min_width, self.max_width)
    }

    /// First canvas guess: the square width and the height its area implies.
    pub fn initial_canvas(&self) -> CanvasSize {
        let w = self.square_width();
        let h = self.total_area.div_ceil(u64::from(w.max(1)));
        let h = u32::try_from(h)
            .unwrap_or(u32::MAX)
            .clamp(self.min_height, self.max_height);
        CanvasSize::new(w, h)
    }
}

/// Read-only state shared by every candidate evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    items: &'a [Item],
    bounds: SearchBounds,
    allow_rotation: bool,
    /// Long side / short side ceiling, when the sheet is long enough to need one.
    aspect: Option<f64>,
}

/// One evaluated canvas width.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub width: u32,
    pub layout: Layout,
}

impl Candidate {
    pub fn canvas(&self) -> CanvasSize {
        self.layout.canvas()
    }

    /// Lower is better: canvas area, then perimeter, then width.
    pub fn score(&self) -> (u64, u64, u32) {
        let c = self.canvas();
        (
            c.area(),
            u64::from(c.width) + u64::from(c.height),
            c.width,
        )
    }

    /// Total order used to pick winners independently of evaluation order.
    pub fn cmp_quality(&self, other: &Candidate) -> Ordering {
        self.score()
            .cmp(&other.score())
            .then_with(|| self.width.cmp(&other.width))
    }
}

/// Keeps the better of `best` and `cand`.
pub fn keep_best(best: &mut Option<Candidate>, cand: Candidate) {
    match best {
        Some(b) if b.cmp_quality(&cand) != Ordering::Greater => {}
        _ => *best = Some(cand),
    }
}

impl<'a> SearchContext<'a> {
    pub fn new(items: &'a [Item], bounds: SearchBounds, cfg: &PackerConfig) -> Self {
        let aspect = (bounds.max_dimension > cfg.aspect_threshold).then_some(cfg.max_aspect_ratio);
        Self {
            items,
            bounds,
            allow_rotation: cfg.allow_rotation,
            aspect,
        }
    }

    pub fn bounds(&self) -> &SearchBounds {
        &self.bounds
    }

    pub fn is_constrained(&self) -> bool {
        self.aspect.is_some()
    }

    /// Same context with the aspect ceiling lifted.
    pub fn unconstrained(&self) -> Self {
        Self {
            aspect: None,
            ..*self
        }
    }

    /// Heights worth trying for `width`, or `None` if the aspect ceiling leaves nothing.
    fn height_range(&self, width: u32) -> Option<(u32, u32)> {
        let b = &self.bounds;
        let area_floor = b.total_area.div_ceil(u64::from(width.max(1)));
        let mut lo = u32::try_from(area_floor)
            .unwrap_or(u32::MAX)
            .max(b.min_height);
        let mut hi = b.max_height;
        if let Some(ratio) = self.aspect {
            lo = lo.max((f64::from(width) / ratio).ceil() as u32);
            hi = hi.min((f64::from(width) * ratio).floor() as u32);
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// True if the even-rounded canvas of `layout` respects the aspect ceiling.
    fn within_aspect(&self, layout: &Layout) -> bool {
        let Some(ratio) = self.aspect else {
            return true;
        };
        let c = layout.canvas();
        let (long, short) = (c.width.max(c.height), c.width.min(c.height));
        short > 0 && f64::from(long) <= f64::from(short) * ratio
    }

    /// Packs at `width`, shrinking the height by binary search.
    ///
    /// Under an aspect ceiling only layouts whose final canvas respects it are kept; lower
    /// heights only flatten the layout further, so a violation is treated like a failed fit.
    /// Costs at most `2 + log2(max_height)` engine runs.
    pub fn evaluate_width(&self, width: u32) -> Option<Candidate> {
        let (lo, hi) = self.height_range(width)?;
        let mut best = pack_on_canvas(self.items, width, hi, self.allow_rotation)
            .filter(|layout| self.within_aspect(layout))?;
        // the full-height pass already tells us how much height was actually needed
        let mut hi = best.used_height;
        let mut lo = lo.min(hi);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match pack_on_canvas(self.items, width, mid, self.allow_rotation) {
                Some(layout) if self.within_aspect(&layout) => {
                    hi = layout.used_height.min(mid);
                    best = layout;
                }
                _ => lo = mid + 1,
            }
        }
        let cand = Candidate {
            width,
            layout: best,
        };
        trace!(
            width,
            canvas_w = cand.canvas().width,
            canvas_h = cand.canvas().height,
            "evaluated width"
        );
        Some(cand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(sizes: &[(u32, u32)]) -> Vec<Item> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, &(w, h))| Item { index, w, h })
            .collect()
    }

    #[test]
    fn bounds_follow_largest_frame() {
        let its = items(&[(50, 30), (40, 40), (20, 20)]);
        let b = SearchBounds::new(&its, &PackerConfig::default()).expect("bounds");
        assert_eq!(b.total_area, 1500 + 1600 + 400);
        assert_eq!(b.min_width, 50);
        assert_eq!(b.min_height, 40);
        assert_eq!(b.max_width, 110);
        assert_eq!(b.max_dimension, (3500 / 50).min(3500 / 40));
    }

    #[test]
    fn bounds_reject_frame_larger_than_max_canvas() {
        let its = items(&[(300, 10)]);
        let cfg = PackerConfig::builder().with_max_dimensions(256, 256).build();
        assert!(SearchBounds::new(&its, &cfg).is_none());
        let cfg = PackerConfig::builder()
            .with_max_dimensions(16, 512)
            .allow_rotation(true)
            .build();
        assert!(SearchBounds::new(&its, &cfg).is_some());
    }

    #[test]
    fn odd_limits_round_down() {
        let its = items(&[(101, 101)]);
        let cfg = PackerConfig::builder().with_max_dimensions(101, 101).build();
        assert!(SearchBounds::new(&its, &cfg).is_none());
        let its = items(&[(101, 101), (101, 101)]);
        let cfg = PackerConfig::builder().with_max_dimensions(103, 205).build();
        let b = SearchBounds::new(&its, &cfg).expect("bounds");
        assert_eq!((b.max_width, b.max_height), (102, 204));
    }

    #[test]
    fn long_sheets_get_aspect_ceiling() {
        let its = items(&vec![(4, 4); 200_000]);
        let cfg = PackerConfig::default();
        let b = SearchBounds::new(&its[..10], &cfg).expect("bounds");
        assert!(!SearchContext::new(&its[..10], b, &cfg).is_constrained());
        let b = SearchBounds::new(&its, &cfg).expect("bounds");
        let ctx = SearchContext::new(&its, b, &cfg);
        assert!(ctx.is_constrained());
        assert!(!ctx.unconstrained().is_constrained());
    }

    #[test]
    fn aspect_ceiling_rejects_flat_layouts() {
        let its = items(&[(4, 4); 100]);
        let cfg = PackerConfig::builder().aspect_threshold(10).build();
        let b = SearchBounds::new(&its, &cfg).expect("bounds");
        let ctx = SearchContext::new(&its, b, &cfg);
        assert!(ctx.is_constrained());
        // one 4-high row is far past 2:1
        assert!(ctx.evaluate_width(b.max_width).is_none());
        assert!(ctx.unconstrained().evaluate_width(b.max_width).is_some());
        let c = ctx.evaluate_width(b.square_width()).expect("square fits");
        assert_eq!(c.canvas(), CanvasSize::new(40, 40));
    }

    #[test]
    fn evaluate_width_finds_tight_height() {
        let its = items(&[(10, 10); 4]);
        let cfg = PackerConfig::default();
        let b = SearchBounds::new(&its, &cfg).expect("bounds");
        let ctx = SearchContext::new(&its, b, &cfg);
        let c = ctx.evaluate_width(20).expect("fits");
        assert_eq!(c.canvas(), CanvasSize::new(20, 20));
        let c = ctx.evaluate_width(40).expect("fits");
        assert_eq!(c.canvas(), CanvasSize::new(40, 10));
    }

    #[test]
    fn keep_best_prefers_smaller_area_then_width() {
        let its = items(&[(10, 10); 4]);
        let cfg = PackerConfig::default();
        let b = SearchBounds::new(&its, &cfg).expect("bounds");
        let ctx = SearchContext::new(&its, b, &cfg);
        let mut best = None;
        keep_best(&mut best, ctx.evaluate_width(40).expect("fits"));
        keep_best(&mut best, ctx.evaluate_width(20).expect("fits"));
        // equal area 400; square wins on perimeter
        assert_eq!(best.expect("best").width, 20);
    }
}
