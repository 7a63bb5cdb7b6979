// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tk_go::{Color, Point};

use crate::nn_output::NNOutput;

/// An `f64` that can be shared between threads, stored as its bit pattern.
#[derive(Debug)]
pub struct AtomicF64 {
    inner: AtomicU64
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self { inner: AtomicU64::new(value.to_bits()) }
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.inner.load(ordering))
    }

    #[inline]
    pub fn store(&self, value: f64, ordering: Ordering) {
        self.inner.store(value.to_bits(), ordering)
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A plain copy of the statistics of a node, taken at some instant.
///
/// All values are from the perspective of white.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub visits: i64,
    pub weight_sum: f64,
    pub weight_sq_sum: f64,
    pub win_loss_value_avg: f64,
    pub no_result_value_avg: f64,
    pub score_mean_avg: f64,
    pub score_mean_sq_avg: f64,
    pub lead_avg: f64,
    pub utility_avg: f64,
    pub utility_sq_avg: f64,
}

/// The statistics accumulated by a node during search. Every field is
/// individually atomic, so readers may observe a mix of older and newer
/// values while the search is running.
#[derive(Debug, Default)]
pub struct NodeStats {
    visits: AtomicI64,
    weight_sum: AtomicF64,
    weight_sq_sum: AtomicF64,
    win_loss_value_avg: AtomicF64,
    no_result_value_avg: AtomicF64,
    score_mean_avg: AtomicF64,
    score_mean_sq_avg: AtomicF64,
    lead_avg: AtomicF64,
    utility_avg: AtomicF64,
    utility_sq_avg: AtomicF64,
}

impl NodeStats {
    #[inline] pub fn visits(&self) -> i64 { self.visits.load(Ordering::Acquire) }
    #[inline] pub fn weight_sum(&self) -> f64 { self.weight_sum.load(Ordering::Acquire) }
    #[inline] pub fn weight_sq_sum(&self) -> f64 { self.weight_sq_sum.load(Ordering::Acquire) }
    #[inline] pub fn win_loss_value_avg(&self) -> f64 { self.win_loss_value_avg.load(Ordering::Acquire) }
    #[inline] pub fn no_result_value_avg(&self) -> f64 { self.no_result_value_avg.load(Ordering::Acquire) }
    #[inline] pub fn score_mean_avg(&self) -> f64 { self.score_mean_avg.load(Ordering::Acquire) }
    #[inline] pub fn score_mean_sq_avg(&self) -> f64 { self.score_mean_sq_avg.load(Ordering::Acquire) }
    #[inline] pub fn lead_avg(&self) -> f64 { self.lead_avg.load(Ordering::Acquire) }
    #[inline] pub fn utility_avg(&self) -> f64 { self.utility_avg.load(Ordering::Acquire) }
    #[inline] pub fn utility_sq_avg(&self) -> f64 { self.utility_sq_avg.load(Ordering::Acquire) }

    /// Returns a copy of every statistic.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            visits: self.visits(),
            weight_sum: self.weight_sum(),
            weight_sq_sum: self.weight_sq_sum(),
            win_loss_value_avg: self.win_loss_value_avg(),
            no_result_value_avg: self.no_result_value_avg(),
            score_mean_avg: self.score_mean_avg(),
            score_mean_sq_avg: self.score_mean_sq_avg(),
            lead_avg: self.lead_avg(),
            utility_avg: self.utility_avg(),
            utility_sq_avg: self.utility_sq_avg(),
        }
    }

    /// Publish a full set of statistics. The visit count is written last, so
    /// a reader that observes the new visit count also observes the averages
    /// that belong to it.
    ///
    /// # Arguments
    ///
    /// * `values` -
    ///
    pub fn store(&self, values: &StatsSnapshot) {
        debug_assert!(values.visits >= self.visits(), "visits must never decrease");

        self.weight_sum.store(values.weight_sum, Ordering::Release);
        self.weight_sq_sum.store(values.weight_sq_sum, Ordering::Release);
        self.win_loss_value_avg.store(values.win_loss_value_avg, Ordering::Release);
        self.no_result_value_avg.store(values.no_result_value_avg, Ordering::Release);
        self.score_mean_avg.store(values.score_mean_avg, Ordering::Release);
        self.score_mean_sq_avg.store(values.score_mean_sq_avg, Ordering::Release);
        self.lead_avg.store(values.lead_avg, Ordering::Release);
        self.utility_avg.store(values.utility_avg, Ordering::Release);
        self.utility_sq_avg.store(values.utility_sq_avg, Ordering::Release);
        self.visits.store(values.visits, Ordering::Release);
    }
}

/// A node in the search tree. The children are kept in a fixed number of
/// slots that are filled from the front, each slot is written at most once
/// and the node owns every child placed in it.
#[derive(Debug)]
pub struct SearchNode {
    next_pla: Color,
    prev_move: Point,
    nn_output: OnceLock<Arc<NNOutput>>,
    children: Box<[OnceLock<Box<SearchNode>>]>,
    pub stats: NodeStats,
}

impl SearchNode {
    /// Returns a node without any statistics, evaluation or children.
    ///
    /// # Arguments
    ///
    /// * `next_pla` - the player to move in this node
    /// * `prev_move` - the move leading to this node, `NULL` for the root
    /// * `capacity` - the maximum number of children
    ///
    pub fn new(next_pla: Color, prev_move: Point, capacity: usize) -> Self {
        Self {
            next_pla,
            prev_move,
            nn_output: OnceLock::new(),
            children: (0..capacity).map(|_| OnceLock::new()).collect(),
            stats: NodeStats::default(),
        }
    }

    #[inline]
    pub fn next_pla(&self) -> Color {
        self.next_pla
    }

    #[inline]
    pub fn prev_move(&self) -> Point {
        self.prev_move
    }

    /// Returns the cached network evaluation of this node, if any.
    pub fn nn_output(&self) -> Option<&NNOutput> {
        self.nn_output.get().map(|out| &**out)
    }

    /// Install the network evaluation of this node. Returns false if the node
    /// already had one, which is then kept.
    pub fn set_nn_output(&self, nn_output: Arc<NNOutput>) -> bool {
        self.nn_output.set(nn_output).is_ok()
    }

    /// Returns the maximum number of children of this node.
    pub fn capacity(&self) -> usize {
        self.children.len()
    }

    /// Returns an iterator over the installed children, in slot order.
    pub fn children(&self) -> ChildrenIter<'_> {
        ChildrenIter { slots: &self.children, index: 0 }
    }

    pub fn num_children(&self) -> usize {
        self.children().count()
    }

    pub fn child_at(&self, index: usize) -> Option<&SearchNode> {
        self.children.get(index)?.get().map(|child| &**child)
    }

    /// Returns the child reached by the given move.
    pub fn child_for_move(&self, point: Point) -> Option<&SearchNode> {
        self.children().find(|child| child.prev_move == point)
    }

    /// Install the given child in the first empty slot and return a reference
    /// to it, or `None` if every slot is taken.
    ///
    /// # Arguments
    ///
    /// * `child` -
    ///
    pub fn push_child(&self, child: SearchNode) -> Option<&SearchNode> {
        let mut child = Box::new(child);

        for slot in self.children.iter() {
            match slot.set(child) {
                Ok(()) => return slot.get().map(|c| &**c),
                Err(rejected) => { child = rejected; }
            }
        }

        None
    }
}

/// Iterator over the installed children of a node, which stops at the first
/// empty slot.
pub struct ChildrenIter<'a> {
    slots: &'a [OnceLock<Box<SearchNode>>],
    index: usize
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = &'a SearchNode;

    fn next(&mut self) -> Option<Self::Item> {
        let child = self.slots.get(self.index)?.get()?;
        self.index += 1;

        Some(&**child)
    }
}
