use rand::{Rng, SeedableRng};
use sheetpack_core::config::{PackerConfig, SearchStrategy, SortOrder};
use sheetpack_core::model::{Frame, PackResult};
use sheetpack_core::packer::pack;

fn random_frames(seed: u64, n: usize) -> Vec<Frame> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| Frame::sized(format!("f{i:03}"), rng.gen_range(4..=64), rng.gen_range(4..=64)))
        .collect()
}

fn check(frames: &[Frame], r: &PackResult) {
    assert_eq!(r.len(), frames.len());
    assert_eq!(r.canvas.width % 2, 0);
    assert_eq!(r.canvas.height % 2, 0);
    for (f, p) in frames.iter().zip(&r.placements) {
        assert_eq!(f.name, p.name);
        let expected = if p.rotated {
            (f.height, f.width)
        } else {
            (f.width, f.height)
        };
        assert_eq!((p.w, p.h), expected);
        assert!(p.x + p.w <= r.canvas.width, "{} out of bounds", p.name);
        assert!(p.y + p.h <= r.canvas.height, "{} out of bounds", p.name);
    }
    for i in 0..r.placements.len() {
        for j in (i + 1)..r.placements.len() {
            let (a, b) = (&r.placements[i], &r.placements[j]);
            assert!(
                !a.rect().intersects(&b.rect()),
                "{} overlaps {}",
                a.name,
                b.name
            );
        }
    }
}

#[test]
fn random_sets_are_disjoint_and_in_bounds() {
    for seed in [1u64, 2, 3, 42] {
        let frames = random_frames(seed, 60);
        for rotate in [false, true] {
            let cfg = PackerConfig::builder().allow_rotation(rotate).build();
            let r = pack(&frames, &cfg).expect("pack");
            check(&frames, &r);
            assert!(!r.placements.iter().any(|p| p.rotated) || rotate);
        }
    }
}

#[test]
fn every_sort_order_is_valid() {
    let frames = random_frames(7, 40);
    for order in [
        SortOrder::None,
        SortOrder::NameAsc,
        SortOrder::AreaDesc,
        SortOrder::MaxSideDesc,
        SortOrder::HeightDesc,
        SortOrder::WidthDesc,
    ] {
        let cfg = PackerConfig::builder().sort_order(order).build();
        check(&frames, &pack(&frames, &cfg).expect("pack"));
    }
}

#[test]
fn packing_is_repeatable() {
    let frames = random_frames(99, 80);
    for strategy in [SearchStrategy::Sweep, SearchStrategy::Genetic] {
        let cfg = PackerConfig::builder()
            .strategy(strategy)
            .allow_rotation(true)
            .build();
        let a = pack(&frames, &cfg).expect("pack");
        let b = pack(&frames, &cfg).expect("pack");
        assert_eq!(a, b);
    }
}

#[test]
fn occupancy_is_reasonable() {
    let frames = random_frames(5, 100);
    let r = pack(&frames, &PackerConfig::default()).expect("pack");
    let stats = r.stats();
    assert_eq!(stats.num_frames, 100);
    assert!(stats.occupancy > 0.5, "{}", stats.summary());
    assert!(stats.occupancy <= 1.0);
    assert_eq!(stats.wasted_area(), stats.canvas_area - stats.used_area);
}
