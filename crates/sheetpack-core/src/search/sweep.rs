use tracing::debug;

use super::{CanvasSearch, Candidate, SearchContext, keep_best};
use crate::packer::Layout;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Deterministic sweep over evenly spaced canvas widths.
///
/// Always includes the narrowest legal width, the widest useful width and the width of a
/// square holding the total area. Candidates are independent, so they can be evaluated in
/// parallel; the winner is picked with a total order and never depends on scheduling.
#[derive(Debug, Clone)]
pub struct SweepSearch {
    samples: u32,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
}

impl SweepSearch {
    pub fn new(samples: u32, parallel: bool) -> Self {
        Self {
            samples: samples.max(1),
            parallel,
        }
    }

    /// Candidate widths, ascending and unique.
    pub fn widths(&self, ctx: &SearchContext<'_>) -> Vec<u32> {
        let b = ctx.bounds();
        let (lo, hi) = (b.min_width, b.max_width);
        let span = u64::from(hi - lo);
        let steps = u64::from(self.samples.saturating_sub(1)).max(1);
        let mut widths: Vec<u32> = if span < u64::from(self.samples) {
            (lo..=hi).collect()
        } else {
            (0..=steps)
                .map(|i| lo + u32::try_from(span * i / steps).unwrap_or(0))
                .collect()
        };
        widths.push(b.square_width());
        widths.sort_unstable();
        widths.dedup();
        widths
    }

    fn evaluate(&self, ctx: &SearchContext<'_>, widths: &[u32]) -> Vec<Candidate> {
        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                return widths
                    .par_iter()
                    .filter_map(|&w| ctx.evaluate_width(w))
                    .collect();
            }
        }
        widths
            .iter()
            .filter_map(|&w| ctx.evaluate_width(w))
            .collect()
    }
}

impl CanvasSearch for SweepSearch {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn search(&self, ctx: &SearchContext<'_>) -> Option<Layout> {
        let widths = self.widths(ctx);
        let mut best: Option<Candidate> = None;
        for cand in self.evaluate(ctx, &widths) {
            keep_best(&mut best, cand);
        }
        let best = best?;
        debug!(
            candidates = widths.len(),
            width = best.canvas().width,
            height = best.canvas().height,
            "sweep finished"
        );
        Some(best.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackerConfig;
    use crate::packer::Item;
    use crate::search::SearchBounds;

    #[test]
    fn widths_cover_range_and_square() {
        let items: Vec<Item> = (0..8).map(|index| Item { index, w: 30, h: 10 }).collect();
        let cfg = PackerConfig::default();
        let b = SearchBounds::new(&items, &cfg).expect("bounds");
        let ctx = SearchContext::new(&items, b, &cfg);
        let widths = SweepSearch::new(5, false).widths(&ctx);
        assert_eq!(widths.first(), Some(&30));
        assert_eq!(widths.last(), Some(&240));
        assert!(widths.contains(&b.square_width()));
        assert!(widths.windows(2).all(|w| w[0] < w[1]));
        assert!(widths.len() <= 6);
    }

    #[test]
    fn narrow_range_tries_every_width() {
        let items = vec![Item { index: 0, w: 7, h: 3 }, Item { index: 1, w: 2, h: 3 }];
        let cfg = PackerConfig::default();
        let b = SearchBounds::new(&items, &cfg).expect("bounds");
        let ctx = SearchContext::new(&items, b, &cfg);
        assert_eq!(SweepSearch::new(32, false).widths(&ctx), vec![7, 8, 9]);
    }
}
