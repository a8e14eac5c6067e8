use sheetpack_core::config::{PackerConfig, SearchStrategy};
use sheetpack_core::error::SheetPackError;
use sheetpack_core::model::{CanvasSize, Frame, PackResult};
use sheetpack_core::packer::pack;

fn disjoint(result: &PackResult) -> bool {
    let ps = &result.placements;
    for i in 0..ps.len() {
        for j in (i + 1)..ps.len() {
            if ps[i].rect().intersects(&ps[j].rect()) {
                return false;
            }
        }
    }
    true
}

#[test]
fn three_frames_fit_small_even_canvas() {
    let frames = vec![
        Frame::sized("A", 50, 30),
        Frame::sized("B", 40, 40),
        Frame::sized("C", 20, 20),
    ];
    let r = pack(&frames, &PackerConfig::default()).expect("pack");
    assert_eq!(r.len(), 3);
    assert!(disjoint(&r));
    assert!(r.canvas.width <= 90, "canvas {:?}", r.canvas);
    assert!(r.canvas.height <= 70, "canvas {:?}", r.canvas);
    assert_eq!(r.canvas.width % 2, 0);
    assert_eq!(r.canvas.height % 2, 0);
    // input order is kept whatever the sort order
    let names: Vec<&str> = r.placements.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
}

#[test]
fn odd_single_frame_rounds_canvas_up() {
    let r = pack(&[Frame::sized("X", 101, 101)], &PackerConfig::default()).expect("pack");
    assert_eq!(r.canvas, CanvasSize::new(102, 102));
    let p = r.placement("X").expect("placed");
    assert_eq!((p.x, p.y, p.w, p.h), (0, 0, 101, 101));
}

#[test]
fn odd_maximum_never_exceeded_by_rounding() {
    let frames = [Frame::sized("X", 101, 101)];
    let cfg = PackerConfig::builder().with_max_dimensions(101, 101).build();
    assert!(matches!(
        pack(&frames, &cfg),
        Err(SheetPackError::PackingInfeasible { .. })
    ));
    let cfg = PackerConfig::builder().with_max_dimensions(102, 102).build();
    let r = pack(&frames, &cfg).expect("pack");
    assert_eq!(r.canvas, CanvasSize::new(102, 102));
}

#[test]
fn long_sheets_respect_aspect_ceiling() {
    // 1000 tiles estimate a 10000 px sheet, well past the threshold
    let frames: Vec<Frame> = (0..1000)
        .map(|i| Frame::sized(format!("tile{i:04}"), 10, 10))
        .collect();
    for strategy in [SearchStrategy::Sweep, SearchStrategy::Genetic] {
        let cfg = PackerConfig::builder().strategy(strategy).build();
        let r = pack(&frames, &cfg).expect("pack");
        let (w, h) = (r.canvas.width, r.canvas.height);
        let aspect = f64::from(w.max(h)) / f64::from(w.min(h));
        assert!(
            aspect <= cfg.max_aspect_ratio,
            "{strategy:?}: canvas {w}x{h} aspect {aspect}"
        );
        assert!(disjoint(&r));
    }
}

#[test]
fn zero_width_is_invalid_geometry() {
    let frames = vec![Frame::sized("ok", 4, 4), Frame::sized("flat", 0, 12)];
    match pack(&frames, &PackerConfig::default()) {
        Err(SheetPackError::InvalidGeometry { name, width, height }) => {
            assert_eq!(name, "flat");
            assert_eq!((width, height), (0, 12));
        }
        other => panic!("expected InvalidGeometry, got {other:?}"),
    }
}

#[test]
fn empty_set_packs_to_zero_canvas() {
    let r = pack(&[], &PackerConfig::default()).expect("pack");
    assert_eq!(r.canvas, CanvasSize::new(0, 0));
    assert!(r.is_empty());
}

#[test]
fn oversized_frame_is_infeasible() {
    let cfg = PackerConfig::builder().with_max_dimensions(256, 256).build();
    let err = pack(&[Frame::sized("wide", 300, 10)], &cfg).expect_err("cannot fit");
    assert!(matches!(
        err,
        SheetPackError::PackingInfeasible {
            frames: 1,
            max_width: 256,
            max_height: 256
        }
    ));
}

#[test]
fn rotation_used_when_needed() {
    let cfg = PackerConfig::builder()
        .with_max_dimensions(120, 50)
        .allow_rotation(true)
        .build();
    let r = pack(&[Frame::sized("pole", 10, 100)], &cfg).expect("pack");
    let p = r.placement("pole").expect("placed");
    assert!(p.rotated);
    assert_eq!((p.w, p.h), (100, 10));
    assert_eq!(r.canvas, CanvasSize::new(100, 10));
    assert!(r.rotatable);
}

#[test]
fn genetic_strategy_packs_scenario() {
    let frames = vec![
        Frame::sized("A", 50, 30),
        Frame::sized("B", 40, 40),
        Frame::sized("C", 20, 20),
    ];
    let cfg = PackerConfig::builder()
        .strategy(SearchStrategy::Genetic)
        .seed(11)
        .build();
    let r = pack(&frames, &cfg).expect("pack");
    assert!(disjoint(&r));
    assert_eq!(r.canvas.width % 2, 0);
    assert_eq!(r.canvas.height % 2, 0);
    assert_eq!(r, pack(&frames, &cfg).expect("pack again"));
}
