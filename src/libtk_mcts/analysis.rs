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

use std::cmp::Ordering;
use std::collections::HashSet;

use ordered_float::OrderedFloat;

use tk_go::symmetry::Symmetry;
use tk_go::{nn_pos, Color, Point};

use crate::node::SearchNode;
use crate::score_value::get_score_stdev;
use crate::search::Search;
use crate::selection::LcbMode;
use crate::utility::FpuValues;
use crate::weights::ChildStats;

/// The selection value that any real move beats, when following the
/// principal variation.
const POLICY_ILLEGAL_SELECTION_VALUE: f64 = -1e50;

/// Everything that is reported about a single move of a node. Values are
/// from the perspective of white, except where noted.
#[derive(Clone, Debug)]
pub struct AnalysisData<'a> {
    pub point: Point,
    pub num_visits: i64,
    pub play_selection_value: f64,
    pub lcb: f64,
    pub radius: f64,
    pub utility: f64,
    pub result_utility: f64,
    pub score_utility: f64,
    pub win_loss_value: f64,
    pub policy_prior: f64,
    pub score_mean: f64,
    pub score_stdev: f64,
    pub lead: f64,
    /// The effective sample size of the weights.
    pub ess: f64,
    /// The weight of the move after the value based adjustments, or `NaN`
    /// if it was not requested.
    pub weight_factor: f64,
    pub weight_sum: f64,
    pub weight_sq_sum: f64,
    pub utility_sq_avg: f64,
    pub score_mean_sq_avg: f64,
    pub order: usize,
    /// The move this is a symmetric copy of, if any.
    pub is_symmetry_of: Option<Point>,
    /// The symmetry that maps `is_symmetry_of` to `point`.
    pub symmetry: Symmetry,
    pub pv: Vec<Point>,
    pub pv_visits: Vec<i64>,
    pub node: Option<&'a SearchNode>,
}

impl<'a> AnalysisData<'a> {
    fn empty(point: Point) -> Self {
        Self {
            point,
            num_visits: 0,
            play_selection_value: -1.0,
            lcb: f64::NAN,
            radius: f64::NAN,
            utility: 0.0,
            result_utility: 0.0,
            score_utility: 0.0,
            win_loss_value: 0.0,
            policy_prior: 0.0,
            score_mean: 0.0,
            score_stdev: 0.0,
            lead: 0.0,
            ess: 0.0,
            weight_factor: f64::NAN,
            weight_sum: 0.0,
            weight_sq_sum: 0.0,
            utility_sq_avg: 0.0,
            score_mean_sq_avg: 0.0,
            order: 0,
            is_symmetry_of: None,
            symmetry: Symmetry::IDENTITY,
            pv: vec! [],
            pv_visits: vec! [],
            node: None,
        }
    }

    /// The order in which moves are reported: visited moves first, then by
    /// descending play selection value, policy, and lower confidence bound.
    pub fn report_order(&self, other: &Self) -> Ordering {
        (other.num_visits > 0).cmp(&(self.num_visits > 0))
            .then_with(|| OrderedFloat(other.play_selection_value).cmp(&OrderedFloat(self.play_selection_value)))
            .then_with(|| OrderedFloat(other.policy_prior).cmp(&OrderedFloat(self.policy_prior)))
            .then_with(|| OrderedFloat(other.lcb).cmp(&OrderedFloat(self.lcb)))
    }
}

/// The statistics of a parent that its unvisited children inherit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct ParentValues {
    pub utility: f64,
    pub win_loss_value: f64,
    pub score_mean: f64,
    pub score_stdev: f64,
    pub lead: f64,
}

impl Search {
    /// Returns the analysis of one move, which is `child` if it has been
    /// expanded. Unvisited moves inherit the values of the parent, with the
    /// utility replaced by the first play urgency.
    pub(crate) fn get_analysis_data_of_single_child<'a>(
        &self,
        child: Option<&'a SearchNode>,
        point: Point,
        policy_prob: f64,
        fpu_value: f64,
        parent: &ParentValues,
        max_pv_depth: usize
    ) -> AnalysisData<'a>
    {
        let stats = child.map(|c| c.stats.snapshot()).unwrap_or_default();
        let mut data = AnalysisData::empty(point);

        data.num_visits = stats.visits;

        if stats.visits <= 0 || stats.weight_sum <= 1e-30 || stats.weight_sq_sum <= 1e-60 {
            let parent_score_mean_sq = parent.score_mean * parent.score_mean + parent.score_stdev * parent.score_stdev;

            data.utility = fpu_value;
            data.score_utility = self.get_score_utility(parent.score_mean, parent_score_mean_sq);
            data.result_utility = fpu_value - data.score_utility;
            data.win_loss_value = if self.options().win_loss_utility_factor == 1.0 {
                parent.win_loss_value + (fpu_value - parent.utility)
            } else {
                0.0
            };
            data.score_mean = parent.score_mean;
            data.score_stdev = parent.score_stdev;
            data.lead = parent.lead;
            data.utility_sq_avg = fpu_value * fpu_value;
            data.score_mean_sq_avg = parent_score_mean_sq;
        } else {
            data.utility = stats.utility_avg;
            data.result_utility = self.get_result_utility(stats.win_loss_value_avg, stats.no_result_value_avg);
            data.score_utility = self.get_score_utility(stats.score_mean_avg, stats.score_mean_sq_avg);
            data.win_loss_value = stats.win_loss_value_avg;
            data.score_mean = stats.score_mean_avg;
            data.score_stdev = get_score_stdev(stats.score_mean_avg, stats.score_mean_sq_avg);
            data.lead = stats.lead_avg;
            data.ess = stats.weight_sum * stats.weight_sum / stats.weight_sq_sum;
            data.weight_sum = stats.weight_sum;
            data.weight_sq_sum = stats.weight_sq_sum;
            data.utility_sq_avg = stats.utility_sq_avg;
            data.score_mean_sq_avg = stats.score_mean_sq_avg;
        }

        data.win_loss_value = data.win_loss_value.max(-1.0).min(1.0);
        data.policy_prior = policy_prob;
        data.pv.push(point);
        data.pv_visits.push(stats.visits);

        if let Some(child) = child {
            self.append_pv(&mut data.pv, &mut data.pv_visits, child, max_pv_depth);
        }

        data.node = child;
        data
    }

    /// Returns the analysis of every child of `node`, sorted in report
    /// order. If there are fewer than `min_moves` children then the best
    /// unexpanded moves according to the policy are added.
    ///
    /// # Arguments
    ///
    /// * `node` -
    /// * `min_moves` -
    /// * `include_weight_factors` - compute `weight_factor` of every child
    /// * `max_pv_depth` -
    /// * `duplicate_for_symmetries` - add a copy of each move for every
    ///   symmetry of the root position
    ///
    pub fn get_analysis_data<'a>(
        &self,
        node: &'a SearchNode,
        min_moves: usize,
        include_weight_factors: bool,
        max_pv_depth: usize,
        duplicate_for_symmetries: bool
    ) -> Vec<AnalysisData<'a>>
    {
        let children = node.children().collect::<Vec<_>>();

        if children.is_empty() {
            return vec! [];
        }

        let selection = match self.get_play_selection_values(node, 1.0, false, LcbMode::Always) {
            Some(selection) => selection,
            None => return vec! []
        };
        let nn_output = match node.nn_output() {
            Some(nn_output) => nn_output,
            None => return vec! []
        };
        let policy_probs = nn_output.policy_probs_maybe_noised();

        let policy_prob_mass_visited = children.iter()
            .map(|child| self.policy_of(policy_probs, child.prev_move()).max(0.0))
            .sum::<f64>();
        assert!(policy_prob_mass_visited <= 1.0001, "visited policy {} exceeds one", policy_prob_mass_visited);

        let stats = node.stats.snapshot();
        assert!(stats.weight_sum > 0.0, "analysis of a node without weight");

        let fpu: FpuValues = self.get_fpu_value_for_children_assume_visited(node, node.next_pla(), true, policy_prob_mass_visited);
        let parent = ParentValues {
            utility: fpu.parent_utility,
            win_loss_value: stats.win_loss_value_avg,
            score_mean: stats.score_mean_avg,
            score_stdev: get_score_stdev(stats.score_mean_avg, stats.score_mean_sq_avg),
            lead: stats.lead_avg,
        };

        let mut out = Vec::with_capacity(children.len());
        let mut child_stats = Vec::with_capacity(children.len());

        for (i, &child) in children.iter().enumerate() {
            let point = child.prev_move();
            let policy_prob = self.policy_of(policy_probs, point);
            let mut data = self.get_analysis_data_of_single_child(Some(child), point, policy_prob, fpu.fpu, &parent, max_pv_depth);

            data.play_selection_value = selection.values[i];
            data.lcb = match node.next_pla() {
                Color::Black => -selection.lcbs[i],
                Color::White => selection.lcbs[i],
            };
            data.radius = selection.radii[i];

            if include_weight_factors {
                let snapshot = child.stats.snapshot();

                child_stats.push(ChildStats {
                    stats: snapshot,
                    self_utility: match node.next_pla() {
                        Color::White => data.utility,
                        Color::Black => -data.utility,
                    },
                    weight_adjusted: snapshot.weight_sum,
                    prev_move: point,
                });
            }

            out.push(data);
        }

        if include_weight_factors {
            let mut total_child_weight = child_stats.iter().map(|c| c.weight_adjusted).sum::<f64>();

            if self.options().use_noise_pruning {
                let policies = child_stats.iter()
                    .map(|c| self.policy_of(policy_probs, c.prev_move).max(1e-30))
                    .collect::<Vec<_>>();

                total_child_weight = self.prune_noise_weight(&mut child_stats, total_child_weight, &policies);
            }

            self.downweight_bad_children_and_normalize_weight(&mut child_stats, total_child_weight, total_child_weight, 0.0, 0.0);

            for (data, c) in out.iter_mut().zip(child_stats.iter()) {
                data.weight_factor = c.weight_adjusted;
            }
        }

        // fill the remaining moves directly from the policy
        let policy_size = nn_pos::policy_size(self.nn_x_len(), self.nn_y_len()).min(policy_probs.len());

        while out.len() < min_moves {
            let mut best: Option<(usize, f64)> = None;

            for (pos, &p) in policy_probs[..policy_size].iter().enumerate() {
                let p = p as f64;

                if best.map(|(_, best_p)| p < best_p).unwrap_or(p < -1.0) {
                    continue;
                }
                if out.iter().any(|d| self.get_pos(d.point) == pos) {
                    continue;
                }

                best = Some((pos, p));
            }

            match best {
                Some((pos, p)) if p >= 0.0 => {
                    let point = self.pos_to_point(pos);

                    out.push(self.get_analysis_data_of_single_child(None, point, p, fpu.fpu, &parent, max_pv_depth));
                },
                _ => break
            }
        }

        out.sort_by(|a, b| a.report_order(b));

        let valid_symmetries = self.root_symmetries().valid_symmetries();

        if duplicate_for_symmetries && self.options().root_symmetry_pruning && valid_symmetries.len() > 1 {
            let board = self.root_board();
            let mut is_done = HashSet::new();
            let mut expanded = Vec::with_capacity(out.len() * valid_symmetries.len());

            for data in out {
                for &symmetry in valid_symmetries {
                    let sym_point = symmetry.get_sym_point(data.point, board.x_size(), board.y_size());

                    if is_done.contains(&sym_point) || self.is_avoided(self.root_pla(), sym_point) {
                        continue;
                    }

                    let mut copy = data.clone();
                    copy.point = sym_point;
                    copy.symmetry = symmetry;
                    if symmetry != Symmetry::IDENTITY {
                        copy.is_symmetry_of = Some(data.point);
                    }
                    for p in copy.pv.iter_mut() {
                        *p = symmetry.get_sym_point(*p, board.x_size(), board.y_size());
                    }

                    is_done.insert(sym_point);
                    expanded.push(copy);
                }
            }

            out = expanded;
        }

        for (i, data) in out.iter_mut().enumerate() {
            data.order = i;
        }

        out
    }

    /// Returns the analysis of every child of the root, see
    /// `get_analysis_data`.
    pub fn get_root_analysis_data(
        &self,
        min_moves: usize,
        include_weight_factors: bool,
        max_pv_depth: usize,
        duplicate_for_symmetries: bool
    ) -> Vec<AnalysisData<'_>>
    {
        match self.root() {
            Some(root) => self.get_analysis_data(root, min_moves, include_weight_factors, max_pv_depth, duplicate_for_symmetries),
            None => vec! []
        }
    }

    /// Extend the principal variation starting at `node` by following the
    /// children with the highest play selection value.
    pub fn append_pv(&self, pv: &mut Vec<Point>, pv_visits: &mut Vec<i64>, node: &SearchNode, max_depth: usize) {
        self.append_pv_for_move(pv, pv_visits, node, Point::NULL, max_depth)
    }

    /// Extend the principal variation starting at `node`, where the first
    /// move must be `first_move` unless it is `NULL`.
    pub fn append_pv_for_move(
        &self,
        pv: &mut Vec<Point>,
        pv_visits: &mut Vec<i64>,
        node: &SearchNode,
        first_move: Point,
        max_depth: usize
    )
    {
        let mut node = node;

        for depth in 0..max_depth {
            let selection = match self.get_play_selection_values(node, 1.0, false, LcbMode::Default) {
                Some(selection) => selection,
                None => return
            };

            let mut max_selection_value = POLICY_ILLEGAL_SELECTION_VALUE;
            let mut best_index = None;

            for (i, (&point, &value)) in selection.moves.iter().zip(selection.values.iter()).enumerate() {
                if depth == 0 && point == first_move {
                    best_index = Some(i);
                    break;
                }

                if value > max_selection_value {
                    max_selection_value = value;
                    best_index = Some(i);
                }
            }

            let child = match best_index.and_then(|i| node.child_at(i)) {
                Some(child) => child,
                None => return
            };

            if depth == 0 && !first_move.is_null() && child.prev_move() != first_move {
                return;
            }

            pv.push(child.prev_move());
            pv_visits.push(child.stats.visits());
            node = child;
        }
    }

    /// Returns the principal variation starting at `node`.
    pub fn get_pv(&self, node: &SearchNode, max_depth: usize) -> Vec<Point> {
        let mut pv = vec! [];
        let mut pv_visits = vec! [];

        self.append_pv(&mut pv, &mut pv_visits, node, max_depth);
        pv
    }
}
