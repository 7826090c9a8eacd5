//! 4-connected region growing over a preallocated index queue

use crate::cancel::{checkpoint, CancellationToken, ROW_BLOCK};
use crate::error::Result;

/// FIFO of `(x, y)` pairs in a flat buffer sized `width * height * 2`
///
/// Every pixel is enqueued at most once (guarded by a visited map), so the
/// buffer never needs to grow and `head`/`tail` never wrap.
pub(crate) struct FloodQueue {
    buf: Vec<u32>,
    head: usize,
    tail: usize,
}

impl FloodQueue {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            buf: vec![0; width as usize * height as usize * 2],
            head: 0,
            tail: 0,
        }
    }

    #[inline]
    fn push(&mut self, x: u32, y: u32) {
        self.buf[self.tail] = x;
        self.buf[self.tail + 1] = y;
        self.tail += 2;
    }

    #[inline]
    fn pop(&mut self) -> Option<(u32, u32)> {
        if self.head >= self.tail {
            return None;
        }
        let p = (self.buf[self.head], self.buf[self.head + 1]);
        self.head += 2;
        Some(p)
    }
}

/// Grid dimensions plus a visited map for one fill
struct Grid {
    width: u32,
    height: u32,
    visited: Vec<u8>,
    queue: FloodQueue,
}

impl Grid {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            visited: vec![0; width as usize * height as usize],
            queue: FloodQueue::new(width, height),
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Enqueue `(x, y)` once, if `admit` accepts its index
    #[inline]
    fn visit(&mut self, x: u32, y: u32, admit: impl Fn(usize) -> bool) {
        let idx = self.index(x, y);
        if self.visited[idx] == 0 && admit(idx) {
            self.visited[idx] = 1;
            self.queue.push(x, y);
        }
    }

    fn visit_neighbours(&mut self, x: u32, y: u32, admit: impl Fn(usize) -> bool + Copy) {
        if x > 0 {
            self.visit(x - 1, y, admit);
        }
        if x + 1 < self.width {
            self.visit(x + 1, y, admit);
        }
        if y > 0 {
            self.visit(x, y - 1, admit);
        }
        if y + 1 < self.height {
            self.visit(x, y + 1, admit);
        }
    }
}

/// Pops between two cancellation checks
fn check_interval(width: u32) -> usize {
    ROW_BLOCK * width.max(1) as usize
}

/// Mark every pixel of `matched` connected to the raster border
///
/// Border pixels that match seed the fill; neighbours are only enqueued when
/// they match, so every dequeued pixel is part of the region.
pub(crate) fn grow_from_border(
    width: u32,
    height: u32,
    matched: &[u8],
    cancel: Option<&CancellationToken>,
) -> Result<Vec<u8>> {
    let mut grid = Grid::new(width, height);
    let admit = |idx: usize| matched[idx] != 0;

    for x in 0..width {
        grid.visit(x, 0, admit);
        grid.visit(x, height - 1, admit);
    }
    for y in 1..height.saturating_sub(1) {
        grid.visit(0, y, admit);
        grid.visit(width - 1, y, admit);
    }

    let mut region = vec![0u8; matched.len()];
    let interval = check_interval(width);
    let mut popped = 0usize;
    while let Some((x, y)) = grid.queue.pop() {
        popped += 1;
        if popped % interval == 0 {
            checkpoint(cancel)?;
        }
        region[grid.index(x, y)] = 1;
        grid.visit_neighbours(x, y, admit);
    }
    Ok(region)
}

/// Mark the pixels reachable from `origins` through pixels accepted by `matches`
///
/// Origins and neighbours are enqueued unconditionally and tested on pop; a
/// pixel that fails the test stops the fill there. Origins must be in bounds.
pub(crate) fn grow_from_points<F>(
    width: u32,
    height: u32,
    origins: &[(u32, u32)],
    matches: F,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<u8>>
where
    F: Fn(usize) -> bool,
{
    let mut grid = Grid::new(width, height);
    let always = |_: usize| true;
    for &(x, y) in origins {
        grid.visit(x, y, always);
    }

    let mut region = vec![0u8; width as usize * height as usize];
    let interval = check_interval(width);
    let mut popped = 0usize;
    while let Some((x, y)) = grid.queue.pop() {
        popped += 1;
        if popped % interval == 0 {
            checkpoint(cancel)?;
        }
        let idx = grid.index(x, y);
        if matches(idx) {
            region[idx] = 1;
            grid.visit_neighbours(x, y, always);
        }
    }
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from(rows: &[&str]) -> (u32, u32, Vec<u8>) {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        (w, h, data)
    }

    #[test]
    fn test_border_fill_skips_enclosed_island() {
        let (w, h, matched) = grid_from(&[
            "######", //
            "#....#", //
            "#.##.#", //
            "#.##.#", //
            "#....#", //
            "######",
        ]);
        let region = grow_from_border(w, h, &matched, None).unwrap();
        // Ring is connected to the border, the inner 2x2 island is not
        assert_eq!(region.iter().filter(|&&v| v == 1).count(), 20);
        assert_eq!(region[2 * 6 + 2], 0);
    }

    #[test]
    fn test_point_fill_stays_in_component() {
        let (w, h, matched) = grid_from(&[
            "##..##", //
            "##..##", //
            "##..##",
        ]);
        let region = grow_from_points(w, h, &[(0, 0)], |i| matched[i] != 0, None).unwrap();
        assert_eq!(region.iter().filter(|&&v| v == 1).count(), 6);
        assert_eq!(region[4], 0);
    }

    #[test]
    fn test_point_fill_rejects_unmatched_origin() {
        let region = grow_from_points(3, 3, &[(1, 1)], |_| false, None).unwrap();
        assert!(region.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_duplicate_origins_fit_in_queue() {
        let origins = vec![(0, 0); 16];
        let region = grow_from_points(2, 2, &origins, |_| true, None).unwrap();
        assert_eq!(region, vec![1; 4]);
    }

    #[test]
    fn test_single_row_border_fill() {
        let region = grow_from_border(4, 1, &[1, 1, 0, 1], None).unwrap();
        assert_eq!(region, vec![1, 1, 0, 1]);
    }
}
