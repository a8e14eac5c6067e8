use serde_json::{Map, Value, json};

use crate::model::{Frame, PackResult};

/// Frame-atlas descriptor in the JSON hash layout.
///
/// Shape: `{ frames: { "<name>.png": { frame, rotated, trimmed, spriteSourceSize, sourceSize } }, meta }`.
/// Frames without a placement in `result` are left out.
pub fn to_json_hash(result: &PackResult, frames: &[Frame], image_name: &str) -> Value {
    let mut out = Map::new();
    for f in frames {
        let Some(p) = result.placement(&f.name) else {
            continue;
        };
        let (sprite_source_size, source_size) = match (f.trimmed, f.trim) {
            (true, Some(t)) => (
                json!({"x": t.x, "y": t.y, "w": p.w, "h": p.h}),
                json!({"w": t.w, "h": t.h}),
            ),
            _ => (
                json!({"x": 0, "y": 0, "w": p.w, "h": p.h}),
                json!({"w": p.w, "h": p.h}),
            ),
        };
        out.insert(
            format!("{}.png", f.name),
            json!({
                "frame": {"x": p.x, "y": p.y, "w": p.w, "h": p.h},
                "rotated": p.rotated,
                "trimmed": f.trimmed,
                "spriteSourceSize": sprite_source_size,
                "sourceSize": source_size,
            }),
        );
    }
    json!({
        "frames": out,
        "meta": {
            "image": image_name,
            "size": {"w": result.canvas.width, "h": result.canvas.height},
            "scale": "1",
        },
    })
}
