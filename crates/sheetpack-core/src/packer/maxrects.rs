use crate::model::Rect;

/// MaxRects free-list over one fixed-size canvas, best-area-fit placement.
///
/// Free rectangles are maximal and may overlap each other; placed rectangles never do.
pub struct MaxRectsPacker {
    border: Rect,
    free: Vec<Rect>,
    allow_rotation: bool,
}

/// Candidate score, compared lexicographically: leftover area, then top, then left.
type Score = (u64, u32, u32);

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32, allow_rotation: bool) -> Self {
        let border = Rect::new(0, 0, width, height);
        Self {
            border,
            free: vec![border],
            allow_rotation,
        }
    }

    pub fn width(&self) -> u32 {
        self.border.w
    }

    pub fn height(&self) -> u32 {
        self.border.h
    }

    /// Places a `w x h` rectangle. Returns the occupied rect (post-rotation) and whether it
    /// was rotated, or `None` if no free rectangle can hold it.
    pub fn insert(&mut self, w: u32, h: u32) -> Option<(Rect, bool)> {
        let (place, rotated) = self.find_position(w, h)?;
        self.place_rect(&place);
        Some((place, rotated))
    }

    fn find_position(&self, w: u32, h: u32) -> Option<(Rect, bool)> {
        let mut best: Option<(Score, Rect, bool)> = None;
        let mut consider = |score: Score, rect: Rect, rotated: bool| {
            // strict less: the earlier (unrotated) candidate keeps full ties
            if best.as_ref().is_none_or(|(s, _, _)| score < *s) {
                best = Some((score, rect, rotated));
            }
        };

        for fr in &self.free {
            if fr.w >= w && fr.h >= h {
                consider(Self::score(fr, w, h), Rect::new(fr.x, fr.y, w, h), false);
            }
            if self.allow_rotation && w != h && fr.w >= h && fr.h >= w {
                consider(Self::score(fr, h, w), Rect::new(fr.x, fr.y, h, w), true);
            }
        }

        best.map(|(_, rect, rotated)| (rect, rotated))
    }

    fn score(fr: &Rect, w: u32, h: u32) -> Score {
        let area_fit = fr.area() - u64::from(w) * u64::from(h);
        (area_fit, fr.y, fr.x)
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if fr.intersects(node) {
                // remove this free rect; split into parts added to new_free
                self.free.swap_remove(i);
                Self::split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        self.prune_new_vs_old(&mut new_free);
        Self::prune_within(&mut new_free);
        self.free.extend(new_free);
        // swap_remove scrambles order; keep the list in scan order so results never
        // depend on removal history
        self.free.sort_by_key(|r| (r.y, r.x, r.w, r.h));
    }

    fn split_free_node(fr: Rect, node: &Rect, out: &mut Vec<Rect>) {
        let fr_x2 = fr.right();
        let fr_y2 = fr.bottom();
        let n_x2 = node.right();
        let n_y2 = node.bottom();

        // Left
        if node.x > fr.x && node.x < fr_x2 {
            out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
        }
        // Right
        if n_x2 > fr.x && n_x2 < fr_x2 {
            out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
        }
        // Top
        if node.y > fr.y && node.y < fr_y2 {
            out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
        }
        // Bottom
        if n_y2 > fr.y && n_y2 < fr_y2 {
            out.push(Rect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
        }
    }

    fn prune_new_vs_old(&mut self, new_free: &mut Vec<Rect>) {
        // Remove any new rect fully contained in any existing free rect
        new_free.retain(|nr| nr.w > 0 && nr.h > 0 && !self.free.iter().any(|of| of.contains(nr)));
        // Remove any existing free rect fully contained in any remaining new rect
        self.free
            .retain(|of| !new_free.iter().any(|nr| nr.contains(of)));
    }

    fn prune_within(v: &mut Vec<Rect>) {
        let mut i = 0;
        while i < v.len() {
            let a = v[i];
            let dominated = v
                .iter()
                .enumerate()
                .any(|(j, b)| j != i && b.contains(&a));
            if dominated {
                // duplicates contain each other; removing one keeps the other
                v.remove(i);
            } else {
                i += 1;
            }
        }
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }
}
