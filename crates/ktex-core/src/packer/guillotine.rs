use crate::model::Rect;

/// Free-list packer that places the tightest-fitting (box, free rect) pair first.
///
/// After each placement the consumed free rect is split into a strip to the
/// right and a strip below the box, every other free rect the box overlaps
/// is cut into the slivers around it, and rects contained in other rects are
/// dropped. New rects go to the front of the list, which only matters for
/// breaking ties between equally tight fits.
pub struct GuillotinePacker {
    free: Vec<Rect>,
}

impl GuillotinePacker {
    pub fn new(width: u32, height: u32) -> Self {
        let canvas = Rect::new(0, 0, width, height);
        Self {
            free: if canvas.is_empty() { Vec::new() } else { vec![canvas] },
        }
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }

    /// Smallest leftover along either axis; `None` if the box does not fit.
    fn margin(fr: &Rect, w: u32, h: u32) -> Option<u32> {
        if fr.w >= w && fr.h >= h {
            Some((fr.h - h).min(fr.w - w))
        } else {
            None
        }
    }

    /// Tightest (box index, free index) pair over all unplaced boxes; the first one found wins ties.
    fn choose(&self, boxes: &[(u32, u32)], placed: &[Option<Rect>]) -> Option<(usize, usize)> {
        let mut best: Option<(u32, usize, usize)> = None;
        for (bi, &(w, h)) in boxes.iter().enumerate() {
            if placed[bi].is_some() {
                continue;
            }
            for (fi, fr) in self.free.iter().enumerate() {
                if let Some(m) = Self::margin(fr, w, h) {
                    if best.is_none_or(|(bm, _, _)| m < bm) {
                        best = Some((m, bi, fi));
                    }
                }
            }
        }
        best.map(|(_, bi, fi)| (bi, fi))
    }

    fn push_front(list: &mut Vec<Rect>, mut front: Vec<Rect>) {
        front.retain(|r| !r.is_empty());
        front.reverse();
        front.append(list);
        *list = front;
    }

    /// Places a `w x h` box at the top-left of free rect `idx` and updates the free list.
    fn place(&mut self, idx: usize, w: u32, h: u32) -> Rect {
        let fr = self.free.remove(idx);
        let placed = Rect::new(fr.x, fr.y, w, h);
        let right = Rect::new(fr.x + w, fr.y, fr.w - w, fr.h);
        let below = Rect::new(fr.x, fr.y + h, fr.w, fr.h - h);
        Self::push_front(&mut self.free, vec![right, below]);
        self.split_intersecting(&placed);
        self.prune_free_list();
        placed
    }

    fn split_intersecting(&mut self, placed: &Rect) {
        let mut slivers = Vec::new();
        let mut kept = Vec::with_capacity(self.free.len());
        for fr in self.free.drain(..) {
            if !placed.intersects(&fr) {
                kept.push(fr);
                continue;
            }
            if placed.x > fr.x {
                slivers.push(Rect::new(fr.x, fr.y, placed.x - fr.x, fr.h));
            }
            if placed.right() < fr.right() {
                slivers.push(Rect::new(placed.right() + 1, fr.y, fr.right() - placed.right(), fr.h));
            }
            if placed.y > fr.y {
                slivers.push(Rect::new(fr.x, fr.y, fr.w, placed.y - fr.y));
            }
            if placed.bottom() < fr.bottom() {
                slivers.push(Rect::new(fr.x, placed.bottom() + 1, fr.w, fr.bottom() - placed.bottom()));
            }
        }
        self.free = kept;
        Self::push_front(&mut self.free, slivers);
    }

    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Places every `(w, h)` box, returning their rects in input order, or `None`
    /// as soon as some remaining box fits no free rect.
    pub fn pack_map(mut self, boxes: &[(u32, u32)]) -> Option<Vec<Rect>> {
        let mut placed: Vec<Option<Rect>> = vec![None; boxes.len()];
        for _ in 0..boxes.len() {
            let (bi, fi) = self.choose(boxes, &placed)?;
            let (w, h) = boxes[bi];
            placed[bi] = Some(self.place(fi, w, h));
        }
        placed.into_iter().collect()
    }
}
