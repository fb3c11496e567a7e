//! Tour and ant representation for the ACO engine.
//!
//! A tour is a closed cyclic permutation stored as `n + 1` city indices with
//! the last entry duplicating the first. A position index (`pos[city]` =
//! index in the tour) is kept synchronized through every mutation; local
//! search relies on that invariant for all of its cyclic arithmetic.

use crate::instance::TspInstance;

/// A closed tour with a synchronized position index.
#[derive(Debug, Clone)]
pub struct Tour {
    /// `n + 1` city indices, `cities[n] == cities[0]`
    cities: Vec<usize>,
    /// `pos[city]` = index of `city` in `cities[0..n]`
    pos: Vec<usize>,
}

impl Tour {
    /// An empty tour shell for `n` cities, filled by construction.
    pub fn empty(n: usize) -> Self {
        Tour {
            cities: vec![0; n + 1],
            pos: vec![0; n],
        }
    }

    /// Build a tour from the first `n` cities of a permutation.
    pub fn from_cities(cities: &[usize]) -> Self {
        let n = cities.len();
        let mut tour = Tour::empty(n);
        for (i, &c) in cities.iter().enumerate() {
            tour.cities[i] = c;
            tour.pos[c] = i;
        }
        tour.cities[n] = tour.cities[0];
        tour
    }

    /// Number of cities on the tour.
    #[inline]
    pub fn n(&self) -> usize {
        self.pos.len()
    }

    /// City at tour index `i` (`0..=n` valid).
    #[inline]
    pub fn city(&self, i: usize) -> usize {
        self.cities[i]
    }

    /// Tour index of `city`.
    #[inline]
    pub fn position(&self, city: usize) -> usize {
        self.pos[city]
    }

    /// Successor of `city` on the cycle.
    #[inline]
    pub fn successor(&self, city: usize) -> usize {
        self.cities[self.pos[city] + 1]
    }

    /// Predecessor of `city` on the cycle.
    #[inline]
    pub fn predecessor(&self, city: usize) -> usize {
        let p = self.pos[city];
        if p == 0 {
            self.cities[self.n() - 1]
        } else {
            self.cities[p - 1]
        }
    }

    /// The full cyclic sequence including the closing duplicate.
    #[inline]
    pub fn cities(&self) -> &[usize] {
        &self.cities
    }

    /// The first `n` cities (one full lap, no duplicate).
    #[inline]
    pub fn lap(&self) -> &[usize] {
        &self.cities[..self.n()]
    }

    /// Overwrite tour entry `i` during construction and index the city.
    ///
    /// The closing duplicate is not maintained here; call [`Tour::close`]
    /// after the last step.
    #[inline]
    pub fn place(&mut self, i: usize, city: usize) {
        self.cities[i] = city;
        self.pos[city] = i;
    }

    /// Close the cycle by duplicating the first city into slot `n`.
    #[inline]
    pub fn close(&mut self) {
        let first = self.cities[0];
        let n = self.n();
        self.cities[n] = first;
    }

    /// Total length of the cycle.
    pub fn length(&self, instance: &TspInstance) -> i64 {
        instance.tour_length(self.lap())
    }

    /// Reverse the tour segment between positions `start` and `end`
    /// (inclusive, cyclic), keeping `pos` synchronized.
    pub fn reverse_segment(&mut self, start: usize, end: usize) {
        let n = self.n();
        let seg_len = (end + n - start) % n + 1;
        let swaps = seg_len / 2;

        let mut left = start;
        let mut right = end;
        for _ in 0..swaps {
            let a = self.cities[left];
            let b = self.cities[right];
            self.cities[left] = b;
            self.cities[right] = a;
            self.pos[b] = left;
            self.pos[a] = right;
            left = (left + 1) % n;
            right = (right + n - 1) % n;
        }
        self.cities[n] = self.cities[0];
    }

    /// Move the city at position `from` so that it directly follows the city
    /// at position `after`, shifting the cities in between by one slot.
    ///
    /// Both positions are tour indices in `[0, n)`; the shift direction
    /// depends on whether the target lies ahead of or behind the source.
    pub fn relocate(&mut self, from: usize, after: usize) {
        let n = self.n();
        debug_assert!(from < n && after < n && from != after);
        if after == (from + n - 1) % n {
            return;
        }

        let city = self.cities[from];
        if after > from {
            // shift the sub-range left by one
            for i in from..after {
                let c = self.cities[i + 1];
                self.cities[i] = c;
                self.pos[c] = i;
            }
            self.cities[after] = city;
            self.pos[city] = after;
        } else {
            // shift the sub-range right by one
            for i in (after + 2..=from).rev() {
                let c = self.cities[i - 1];
                self.cities[i] = c;
                self.pos[c] = i;
            }
            self.cities[after + 1] = city;
            self.pos[city] = after + 1;
        }
        self.cities[n] = self.cities[0];
    }

    /// Validate the permutation checksum; an inconsistent tour is a defect.
    ///
    /// Panics when the first `n` entries are not a permutation of `[0, n)`
    /// or the closing duplicate is out of sync.
    pub fn assert_valid(&self) {
        let n = self.n();
        let expected = n * (n - 1) / 2;
        let sum: usize = self.cities[..n].iter().sum();
        if sum != expected || self.cities[n] != self.cities[0] {
            panic!("internally inconsistent tour: checksum {sum} != {expected}");
        }
        for (i, &c) in self.cities[..n].iter().enumerate() {
            if self.pos[c] != i {
                panic!("position index out of sync at tour index {i}");
            }
        }
    }
}

/// One solution-construction agent: a tour, a visited set and the length of
/// the most recently completed tour.
#[derive(Debug, Clone)]
pub struct Ant {
    pub tour: Tour,
    pub visited: Vec<bool>,
    pub tour_length: i64,
}

impl Ant {
    pub fn new(n: usize) -> Self {
        Ant {
            tour: Tour::empty(n),
            visited: vec![false; n],
            tour_length: i64::MAX,
        }
    }

    /// Clear the visited set before a new construction phase.
    pub fn reset(&mut self) {
        self.visited.fill(false);
    }

    /// Deep snapshot of another ant's solution.
    pub fn clone_from_ant(&mut self, other: &Ant) {
        self.tour = other.tour.clone();
        self.tour_length = other.tour_length;
    }
}

/// Number of edges of `a` that do not appear (undirected) in `b`.
///
/// Identical tours have distance 0; disjoint tours have distance `n`.
pub fn distance_between(a: &Tour, b: &Tour) -> usize {
    let n = a.n();
    let mut shared = 0;
    for i in 0..n {
        let from = a.city(i);
        let to = a.city(i + 1);
        if b.successor(from) == to || b.predecessor(from) == to {
            shared += 1;
        }
    }
    n - shared
}
