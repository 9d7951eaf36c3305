//! Pixel-aligned region geometry stored as horizontal runs.
//!
//! A region is the union of its pixels; each run covers pixels `x_start..x_end` of row
//! `y` in image coordinates. Runs are kept sorted by `(y, x_start)`, never overlap, and
//! runs that touch on the same row are merged, so equal pixel sets have equal runs.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::grid::PixelRect;

/// Pixels `x_start..x_end` of row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Run {
    pub y: usize,
    pub x_start: usize,
    pub x_end: usize,
}

impl Run {
    pub fn new(y: usize, x_start: usize, x_end: usize) -> Self {
        debug_assert!(x_start < x_end, "empty run");
        Self { y, x_start, x_end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x_end - self.x_start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x_end <= self.x_start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunGeometry {
    runs: Vec<Run>,
}

impl RunGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        let mut geometry = Self { runs };
        geometry.normalize();
        geometry
    }

    #[inline]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.runs.iter().map(Run::len).sum()
    }

    pub fn bounds(&self) -> Option<PixelRect> {
        let first = self.runs.first()?;
        let last = self.runs.last()?;
        let x_min = self.runs.iter().map(|r| r.x_start).min()?;
        let x_max = self.runs.iter().map(|r| r.x_end).max()?;
        Some(PixelRect::new(
            x_min,
            first.y,
            x_max - x_min,
            last.y - first.y + 1,
        ))
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.row(y).iter().any(|r| r.x_start <= x && x < r.x_end)
    }

    /// Add the pixels of `other` to this geometry.
    pub fn union_with(&mut self, other: &RunGeometry) {
        self.runs.extend_from_slice(&other.runs);
        self.normalize();
    }

    /// Covered intervals of row `y`, clipped to `span`.
    pub fn row_contact(&self, y: usize, span: Range<usize>) -> Vec<Range<usize>> {
        self.row(y)
            .iter()
            .filter_map(|r| {
                let start = r.x_start.max(span.start);
                let end = r.x_end.min(span.end);
                (start < end).then_some(start..end)
            })
            .collect()
    }

    /// Covered intervals of column `x`, clipped to `span`.
    pub fn column_contact(&self, x: usize, span: Range<usize>) -> Vec<Range<usize>> {
        let mut intervals: Vec<Range<usize>> = Vec::new();
        for y in span {
            if !self.contains(x, y) {
                continue;
            }
            match intervals.last_mut() {
                Some(last) if last.end == y => last.end = y + 1,
                _ => intervals.push(y..y + 1),
            }
        }
        intervals
    }

    /// Runs of row `y`.
    fn row(&self, y: usize) -> &[Run] {
        let start = self.runs.partition_point(|r| r.y < y);
        let end = self.runs.partition_point(|r| r.y <= y);
        &self.runs[start..end]
    }

    fn normalize(&mut self) {
        self.runs.retain(|r| !r.is_empty());
        self.runs.sort_unstable();
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            match merged.last_mut() {
                Some(last) if last.y == run.y && run.x_start <= last.x_end => {
                    last.x_end = last.x_end.max(run.x_end);
                }
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// Total length shared by two sorted, disjoint interval lists.
pub fn overlap_length(a: &[Range<usize>], b: &[Range<usize>]) -> usize {
    let (mut i, mut j) = (0, 0);
    let mut total = 0;
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            total += end - start;
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    total
}

/// True when an interval of `a` ends exactly where one of `b` starts, or the reverse:
/// the two sides meet only at a corner point.
pub fn touch_at_corner(a: &[Range<usize>], b: &[Range<usize>]) -> bool {
    a.iter()
        .any(|ra| b.iter().any(|rb| ra.end == rb.start || rb.end == ra.start))
}
