//! nearest-sample lookup over the 2d cloud

use crate::{Coordinate, Error};
use alloc::vec::Vec;
use core::fmt::Debug;

/// Static 2-d tree, laid out implicitly: every subslice's median is its root,
/// split on x at even depths and y at odd ones.
#[derive(Clone, Debug, Default)]
pub struct SampleSearch {
    points: Vec<(Coordinate, usize)>,
}

fn axis(c: &Coordinate, depth: usize) -> f32 {
    if depth % 2 == 0 {
        c.x
    } else {
        c.y
    }
}

impl SampleSearch {
    /// index every `(coordinate, sample index)` pair
    pub fn new(points: impl IntoIterator<Item = (Coordinate, usize)>) -> Self {
        let mut points: Vec<_> = points.into_iter().collect();
        Self::build(&mut points, 0);
        Self { points }
    }

    /// index `coordinates` by position
    pub fn from_coordinates(coordinates: &[Coordinate]) -> Self {
        Self::new(coordinates.iter().copied().zip(0..))
    }

    fn build(points: &mut [(Coordinate, usize)], depth: usize) {
        if points.len() <= 1 {
            return;
        }
        let mid = points.len() / 2;
        points.select_nth_unstable_by(mid, |a, b| {
            axis(&a.0, depth).total_cmp(&axis(&b.0, depth))
        });
        let (left, right) = points.split_at_mut(mid);
        Self::build(left, depth + 1);
        Self::build(&mut right[1..], depth + 1);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// closest sample index and its squared distance
    pub fn nearest(&self, x: f32, y: f32) -> Option<(usize, f32)> {
        let query = Coordinate::new(x, y);
        let mut best = None;
        Self::descend(&self.points, 0, &query, &mut best);
        best
    }

    fn descend(
        points: &[(Coordinate, usize)],
        depth: usize,
        query: &Coordinate,
        best: &mut Option<(usize, f32)>,
    ) {
        if points.is_empty() {
            return;
        }
        let mid = points.len() / 2;
        let (point, index) = points[mid];
        let d2 = point.distance2(query);
        if best.is_none_or(|(_, b)| d2 < b) {
            *best = Some((index, d2));
        }

        let diff = axis(query, depth) - axis(&point, depth);
        let (near, far) = if diff < 0. {
            (&points[..mid], &points[mid + 1..])
        } else {
            (&points[mid + 1..], &points[..mid])
        };
        Self::descend(near, depth + 1, query, best);
        if best.is_none_or(|(_, b)| diff * diff < b) {
            Self::descend(far, depth + 1, query, best);
        }
    }

    /// closest sample index to `(x, y)`
    pub fn lookup<E: Debug>(&self, x: f32, y: f32) -> Result<usize, Error<E>> {
        self.nearest(x, y)
            .map(|(index, _)| index)
            .ok_or(Error::IndexUnavailable)
    }
}
