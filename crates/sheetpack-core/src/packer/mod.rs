use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::config::{PackerConfig, SortOrder};
use crate::error::{Result, SheetPackError};
use crate::model::{CanvasSize, Frame, PackResult, Placement, Rect};
use crate::search::{SearchBounds, SearchContext, strategy_for};

pub mod maxrects;

use maxrects::MaxRectsPacker;

/// A frame reduced to what the engine needs: its index in the input and its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub index: usize,
    pub w: u32,
    pub h: u32,
}

/// Successful placement of every item on one candidate canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// `(item index, occupied rect, rotated)` in packing order.
    pub slots: Vec<(usize, Rect, bool)>,
    /// Tight bounding box of all slots.
    pub used_width: u32,
    pub used_height: u32,
}

impl Layout {
    /// Bounding box rounded up to even dimensions.
    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(round_up_even(self.used_width), round_up_even(self.used_height))
    }
}

pub fn round_up_even(v: u32) -> u32 {
    v.saturating_add(v & 1)
}

/// Packs `items` in order onto a `width x height` canvas.
///
/// Returns `None` as soon as one item fits nowhere; that only rules out this canvas size.
pub fn pack_on_canvas(
    items: &[Item],
    width: u32,
    height: u32,
    allow_rotation: bool,
) -> Option<Layout> {
    let mut packer = MaxRectsPacker::new(width, height, allow_rotation);
    let mut slots = Vec::with_capacity(items.len());
    let mut used_width = 0u32;
    let mut used_height = 0u32;
    for item in items {
        let (rect, rotated) = packer.insert(item.w, item.h)?;
        used_width = used_width.max(rect.right());
        used_height = used_height.max(rect.bottom());
        slots.push((item.index, rect, rotated));
    }
    Some(Layout {
        slots,
        used_width,
        used_height,
    })
}

#[instrument(skip_all, fields(frames = frames.len()))]
/// Packs `frames` onto one canvas chosen by the configured search strategy.
///
/// Notes:
/// - Frames must already be measured; zero-sized frames are rejected.
/// - An empty frame set packs to a 0x0 canvas.
/// - Placements come back in input order, whatever `sort_order` the engine used.
pub fn pack(frames: &[Frame], cfg: &PackerConfig) -> Result<PackResult> {
    cfg.validate()?;
    validate_frames(frames)?;

    if frames.is_empty() {
        return Ok(PackResult::empty(cfg.allow_rotation));
    }

    let items = sorted_items(frames, cfg.sort_order);
    let infeasible = || SheetPackError::PackingInfeasible {
        frames: frames.len(),
        max_width: cfg.max_width,
        max_height: cfg.max_height,
    };
    let bounds = SearchBounds::new(&items, cfg).ok_or_else(infeasible)?;
    let strategy = strategy_for(cfg);
    let ctx = SearchContext::new(&items, bounds, cfg);

    let layout = match strategy.search(&ctx) {
        Some(layout) => layout,
        None if ctx.is_constrained() => {
            debug!(
                strategy = strategy.name(),
                "no canvas within aspect ceiling, retrying unconstrained"
            );
            strategy.search(&ctx.unconstrained()).ok_or_else(infeasible)?
        }
        None => return Err(infeasible()),
    };

    let canvas = layout.canvas();
    let mut placements: Vec<Option<Placement>> = vec![None; frames.len()];
    for (index, rect, rotated) in layout.slots {
        placements[index] = Some(Placement {
            name: frames[index].name.clone(),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            rotated,
        });
    }
    let placements: Vec<Placement> = placements.into_iter().flatten().collect();
    debug_assert_eq!(placements.len(), frames.len());

    debug!(
        strategy = strategy.name(),
        width = canvas.width,
        height = canvas.height,
        "packed"
    );
    Ok(PackResult {
        canvas,
        placements,
        rotatable: cfg.allow_rotation,
    })
}

pub(crate) fn validate_frames(frames: &[Frame]) -> Result<()> {
    let mut names: HashSet<&str> = HashSet::with_capacity(frames.len());
    for f in frames {
        if f.width == 0 || f.height == 0 {
            return Err(SheetPackError::InvalidGeometry {
                name: f.name.clone(),
                width: f.width,
                height: f.height,
            });
        }
        if !names.insert(f.name.as_str()) {
            return Err(SheetPackError::Configuration(format!(
                "duplicate frame name '{}'",
                f.name
            )));
        }
    }
    Ok(())
}

fn sorted_items(frames: &[Frame], order: SortOrder) -> Vec<Item> {
    let mut items: Vec<Item> = frames
        .iter()
        .enumerate()
        .map(|(index, f)| Item {
            index,
            w: f.width,
            h: f.height,
        })
        .collect();
    match order {
        SortOrder::None => {}
        SortOrder::NameAsc => items.sort_by(|a, b| name_of(frames, a).cmp(name_of(frames, b))),
        SortOrder::AreaDesc => items.sort_by(|a, b| {
            (u64::from(b.w) * u64::from(b.h))
                .cmp(&(u64::from(a.w) * u64::from(a.h)))
                .then_with(|| name_of(frames, a).cmp(name_of(frames, b)))
        }),
        SortOrder::MaxSideDesc => items.sort_by(|a, b| {
            b.w.max(b.h)
                .cmp(&a.w.max(a.h))
                .then_with(|| name_of(frames, a).cmp(name_of(frames, b)))
        }),
        SortOrder::HeightDesc => {
            items.sort_by(|a, b| b.h.cmp(&a.h).then_with(|| name_of(frames, a).cmp(name_of(frames, b))))
        }
        SortOrder::WidthDesc => {
            items.sort_by(|a, b| b.w.cmp(&a.w).then_with(|| name_of(frames, a).cmp(name_of(frames, b))))
        }
    }
    items
}

fn name_of<'f>(frames: &'f [Frame], item: &Item) -> &'f str {
    frames[item.index].name.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_even_values() {
        assert_eq!(round_up_even(0), 0);
        assert_eq!(round_up_even(101), 102);
        assert_eq!(round_up_even(64), 64);
    }

    #[test]
    fn pack_on_canvas_fails_whole_attempt() {
        let items = [
            Item { index: 0, w: 10, h: 10 },
            Item { index: 1, w: 10, h: 10 },
        ];
        assert!(pack_on_canvas(&items, 10, 10, false).is_none());
        let layout = pack_on_canvas(&items, 20, 10, false).expect("fits");
        assert_eq!((layout.used_width, layout.used_height), (20, 10));
    }

    #[test]
    fn sort_area_desc_ties_by_name() {
        let frames = vec![
            Frame::sized("b", 10, 10),
            Frame::sized("a", 10, 10),
            Frame::sized("big", 20, 20),
        ];
        let order: Vec<usize> = sorted_items(&frames, SortOrder::AreaDesc)
            .iter()
            .map(|i| i.index)
            .collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let frames = vec![Frame::sized("a", 4, 4), Frame::sized("a", 2, 2)];
        assert!(matches!(
            pack(&frames, &PackerConfig::default()),
            Err(SheetPackError::Configuration(_))
        ));
    }
}
