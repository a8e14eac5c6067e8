use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{CanvasSearch, Candidate, SearchContext, keep_best};
use crate::packer::Layout;

/// Evolves canvas widths with a seeded RNG.
///
/// Each individual is a width; fitness is the canvas [`SearchContext::evaluate_width`]
/// produces for it. Widths are memoized, so the engine runs at most
/// `population * generations` evaluations whatever the frame count.
#[derive(Debug, Clone)]
pub struct GeneticSearch {
    population: usize,
    generations: usize,
    live_rate: f64,
    seed: u64,
}

impl GeneticSearch {
    pub fn new(population: usize, generations: usize, live_rate: f64, seed: u64) -> Self {
        Self {
            population: population.max(2),
            generations: generations.max(1),
            live_rate,
            seed,
        }
    }

    fn survivors(&self) -> usize {
        let n = (self.population as f64 * self.live_rate).ceil() as usize;
        n.clamp(1, self.population)
    }
}

/// Ranks two widths by their evaluated candidates; widths that did not pack sort last.
fn rank(a: (u32, Option<&Candidate>), b: (u32, Option<&Candidate>)) -> Ordering {
    match (a.1, b.1) {
        (Some(ca), Some(cb)) => ca.cmp_quality(cb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    }
}

impl CanvasSearch for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn search(&self, ctx: &SearchContext<'_>) -> Option<Layout> {
        let b = ctx.bounds();
        let (lo, hi) = (b.min_width, b.max_width);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut memo: BTreeMap<u32, Option<Candidate>> = BTreeMap::new();

        let mut pop: Vec<u32> = vec![b.square_width(), lo, hi];
        pop.truncate(self.population);
        while pop.len() < self.population {
            pop.push(rng.gen_range(lo..=hi));
        }

        let survivors = self.survivors();
        let mutation = i64::from(((hi - lo) / 8).max(1));

        for generation in 0..self.generations {
            for &w in &pop {
                memo.entry(w).or_insert_with(|| ctx.evaluate_width(w));
            }
            pop.sort_by(|&a, &b| {
                rank(
                    (a, memo.get(&a).and_then(Option::as_ref)),
                    (b, memo.get(&b).and_then(Option::as_ref)),
                )
            });
            pop.dedup();
            pop.truncate(survivors);

            if generation + 1 == self.generations {
                break;
            }
            let parents = pop.len();
            while pop.len() < self.population {
                let a = i64::from(pop[rng.gen_range(0..parents)]);
                let b = i64::from(pop[rng.gen_range(0..parents)]);
                let delta = rng.gen_range(-mutation..=mutation);
                let child = ((a + b) / 2 + delta).clamp(i64::from(lo), i64::from(hi));
                pop.push(u32::try_from(child).unwrap_or(lo));
            }
        }

        let evaluated = memo.len();
        let mut best: Option<Candidate> = None;
        for cand in memo.into_values().flatten() {
            keep_best(&mut best, cand);
        }
        let best = best?;
        debug!(
            evaluated,
            width = best.canvas().width,
            height = best.canvas().height,
            "genetic search finished"
        );
        Some(best.layout)
    }
}
