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

use tk_go::Color;

use crate::nn_output::NNOutput;
use crate::node::SearchNode;
use crate::score_value::{self, get_score_stdev};
use crate::search::Search;

/// The explore value of a move that the policy marks as illegal.
pub const ILLEGAL_EXPLORE_SELECTION_VALUE: f64 = -1e20;

/// Added to the total child weight before taking its square root, so that
/// the policy matters even before any child has been visited.
const TOTAL_CHILD_WEIGHT_PUCT_OFFSET: f64 = 0.01;

/// The center and scale of the static part of the score utility.
const STATIC_SCORE_CENTER: f64 = 0.0;
const STATIC_SCORE_SCALE: f64 = 2.0;

/// The quantities of a parent node that the first play urgency of its
/// children are derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpuValues {
    /// The utility assumed for unvisited children, from white's perspective.
    pub fpu: f64,
    pub parent_utility: f64,
    pub parent_weight_per_visit: f64,
    pub parent_utility_stdev_factor: f64,
}

impl Search {
    pub fn get_result_utility(&self, win_loss_value: f64, no_result_value: f64) -> f64 {
        win_loss_value * self.options().win_loss_utility_factor
            + no_result_value * self.options().no_result_utility_for_white
    }

    pub fn get_result_utility_from_nn(&self, nn_output: &NNOutput) -> f64 {
        let win_loss = (nn_output.white_win_prob - nn_output.white_loss_prob) as f64;

        self.get_result_utility(win_loss, nn_output.white_no_result_prob as f64)
    }

    /// Returns the expected utility of the score distribution with the given
    /// mean and mean square.
    pub fn get_score_utility(&self, score_mean_avg: f64, score_mean_sq_avg: f64) -> f64 {
        let options = self.options();
        let sqrt_area = self.root_board().sqrt_area();
        let stdev = get_score_stdev(score_mean_avg, score_mean_sq_avg);
        let static_value = score_value::expected_white_score_value(
            score_mean_avg, stdev,
            STATIC_SCORE_CENTER, STATIC_SCORE_SCALE,
            sqrt_area
        );
        let dynamic_value = score_value::expected_white_score_value(
            score_mean_avg, stdev,
            self.recent_score_center(), options.dynamic_score_center_scale,
            sqrt_area
        );

        static_value * options.static_score_utility_factor
            + dynamic_value * options.dynamic_score_utility_factor
    }

    pub fn get_utility_from_nn(&self, nn_output: &NNOutput) -> f64 {
        self.get_result_utility_from_nn(nn_output)
            + self.get_score_utility(nn_output.white_score_mean as f64, nn_output.white_score_mean_sq as f64)
    }

    /// Returns the derivative of the score utility at the given score,
    /// ignoring the uncertainty of the score.
    pub fn get_approx_score_utility_derivative(&self, score_mean: f64) -> f64 {
        let options = self.options();
        let sqrt_area = self.root_board().sqrt_area();
        let static_derivative = score_value::white_d_score_value_d_score_smooth(
            score_mean,
            STATIC_SCORE_CENTER, STATIC_SCORE_SCALE,
            sqrt_area
        );
        let dynamic_derivative = score_value::white_d_score_value_d_score_smooth(
            score_mean,
            self.recent_score_center(), options.dynamic_score_center_scale,
            sqrt_area
        );

        static_derivative * options.static_score_utility_factor
            + dynamic_derivative * options.dynamic_score_utility_factor
    }

    /// Returns how much weight a single evaluation should carry. This is one,
    /// unless the uncertainty of the network is used, in which case more
    /// certain evaluations weigh more.
    pub fn compute_weight_from_nn_output(&self, nn_output: &NNOutput) -> f64 {
        let options = self.options();

        if !options.use_uncertainty {
            return 1.0;
        }

        let uncertainty_wl = options.win_loss_utility_factor * nn_output.shortterm_winloss_error as f64;
        let uncertainty_score = self.get_approx_score_utility_derivative(nn_output.white_score_mean as f64)
            * nn_output.shortterm_score_error as f64;
        let uncertainty = uncertainty_wl + uncertainty_score;
        let powered = if options.uncertainty_exponent == 1.0 {
            uncertainty
        } else if options.uncertainty_exponent == 0.5 {
            uncertainty.sqrt()
        } else {
            uncertainty.powf(options.uncertainty_exponent)
        };
        let baseline = options.uncertainty_coeff / options.uncertainty_max_weight;

        options.uncertainty_coeff / (powered + baseline)
    }

    /// Returns the value that unvisited children of `node` are assumed to
    /// have, together with the parent statistics it was derived from.
    ///
    /// # Arguments
    ///
    /// * `node` - the parent, which must have been visited
    /// * `pla` - the player to move at `node`
    /// * `is_root` - whether to use the root reductions
    /// * `policy_prob_mass_visited` - the total policy of the visited children
    ///
    pub fn get_fpu_value_for_children_assume_visited(
        &self,
        node: &SearchNode,
        pla: Color,
        is_root: bool,
        policy_prob_mass_visited: f64
    ) -> FpuValues
    {
        let options = self.options();
        let visits = node.stats.visits();
        let weight_sum = node.stats.weight_sum();
        let utility_avg = node.stats.utility_avg();
        let mut utility_sq_avg = node.stats.utility_sq_avg();

        assert!(visits > 0, "first play urgency of an unvisited node");
        assert!(weight_sum > 0.0, "first play urgency of a node without weight");

        let parent_weight_per_visit = weight_sum / visits as f64;
        let prior = options.cpuct_utility_stdev_prior;
        let prior_weight = options.cpuct_utility_stdev_prior_weight;
        let parent_utility_stdev = if weight_sum <= 1.0 {
            prior
        } else {
            let utility_sq = utility_avg * utility_avg;

            // concurrent updates may briefly make the variance negative
            if utility_sq_avg < utility_sq {
                utility_sq_avg = utility_sq;
            }

            let blended = ((utility_sq + prior * prior) * prior_weight + utility_sq_avg * weight_sum)
                / (prior_weight + weight_sum - 1.0);

            (blended - utility_sq).max(0.0).sqrt()
        };
        let parent_utility_stdev_factor = 1.0 + options.cpuct_utility_stdev_scale * (parent_utility_stdev / prior - 1.0);

        let mut parent_utility = utility_avg;

        if let Some(nn_output) = node.nn_output() {
            if options.fpu_parent_weight_by_visited_policy {
                let avg_weight = policy_prob_mass_visited.powf(options.fpu_parent_weight_by_visited_policy_pow).min(1.0);

                parent_utility = avg_weight * parent_utility + (1.0 - avg_weight) * self.get_utility_from_nn(nn_output);
            } else if options.fpu_parent_weight > 0.0 {
                parent_utility = options.fpu_parent_weight * self.get_utility_from_nn(nn_output)
                    + (1.0 - options.fpu_parent_weight) * parent_utility;
            }
        }

        let (reduction_max, loss_prop) = if is_root {
            (options.root_fpu_reduction_max, options.root_fpu_loss_prop)
        } else {
            (options.fpu_reduction_max, options.fpu_loss_prop)
        };
        let reduction = reduction_max * policy_prob_mass_visited.max(0.0).sqrt();
        let radius = options.utility_radius();
        let (fpu, loss_value) = match pla {
            Color::White => (parent_utility - reduction, -radius),
            Color::Black => (parent_utility + reduction, radius),
        };

        FpuValues {
            fpu: fpu + (loss_value - fpu) * loss_prop,
            parent_utility,
            parent_weight_per_visit,
            parent_utility_stdev_factor,
        }
    }

    fn cpuct_exploration(&self, total_child_weight: f64) -> f64 {
        let options = self.options();

        options.cpuct_exploration
            + options.cpuct_exploration_log * ((total_child_weight + options.cpuct_exploration_base) / options.cpuct_exploration_base).ln()
    }

    pub fn get_explore_scaling(&self, total_child_weight: f64, parent_utility_stdev_factor: f64) -> f64 {
        self.cpuct_exploration(total_child_weight)
            * (total_child_weight + TOTAL_CHILD_WEIGHT_PUCT_OFFSET).sqrt()
            * parent_utility_stdev_factor
    }

    /// Returns the PUCT value of a child, from the perspective of `pla`.
    pub fn get_explore_selection_value(
        &self,
        explore_scaling: f64,
        nn_policy_prob: f64,
        child_weight: f64,
        child_utility: f64,
        pla: Color
    ) -> f64
    {
        if nn_policy_prob < 0.0 {
            return ILLEGAL_EXPLORE_SELECTION_VALUE;
        }

        let explore_component = explore_scaling * nn_policy_prob / (1.0 + child_weight);
        let value_component = match pla {
            Color::White => child_utility,
            Color::Black => -child_utility,
        };

        explore_component + value_component
    }

    /// Returns the child weight for which `get_explore_selection_value` would
    /// be `explore_selection_value`, or zero if that weight is negative.
    pub fn get_explore_selection_value_inverse(
        &self,
        explore_scaling: f64,
        explore_selection_value: f64,
        nn_policy_prob: f64,
        child_utility: f64,
        pla: Color
    ) -> f64
    {
        if nn_policy_prob < 0.0 {
            return 0.0;
        }

        let value_component = match pla {
            Color::White => child_utility,
            Color::Black => -child_utility,
        };
        let explore_component = explore_selection_value - value_component;

        if explore_component <= 0.0 {
            return 1e100;
        }

        (explore_scaling * nn_policy_prob / explore_component - 1.0).max(0.0)
    }

    /// Returns the PUCT value of the given child of `node`, outside of any
    /// running playout.
    pub fn get_explore_selection_value_of_child(
        &self,
        node: &SearchNode,
        policy_probs: &[f32],
        child: &SearchNode,
        total_child_weight: f64,
        fpu: &FpuValues
    ) -> f64
    {
        let nn_policy_prob = self.policy_of(policy_probs, child.prev_move());
        let child_visits = child.stats.visits();
        let child_weight = child.stats.weight_sum();

        // a child can be installed before its first visit is published
        let child_utility = if child_visits <= 0 || child_weight <= 0.0 {
            fpu.fpu
        } else {
            child.stats.utility_avg()
        };
        let explore_scaling = self.get_explore_scaling(total_child_weight, fpu.parent_utility_stdev_factor);

        self.get_explore_selection_value(explore_scaling, nn_policy_prob, child_weight, child_utility, node.next_pla())
    }

    /// Returns the weight of `child`, reduced to the weight that in hindsight
    /// would have been enough to make its explore value equal to the explore
    /// value of the best child.
    pub fn get_reduced_play_selection_weight(
        &self,
        node: &SearchNode,
        policy_probs: &[f32],
        child: &SearchNode,
        total_child_weight: f64,
        parent_utility_stdev_factor: f64,
        best_child_explore_selection_value: f64
    ) -> f64
    {
        let nn_policy_prob = self.policy_of(policy_probs, child.prev_move());
        let child_visits = child.stats.visits();
        let child_weight = child.stats.weight_sum();

        if child_visits <= 0 || child_weight <= 0.0 {
            return 0.0;
        }

        let explore_scaling = self.get_explore_scaling(total_child_weight, parent_utility_stdev_factor);
        let wanted = self.get_explore_selection_value_inverse(
            explore_scaling,
            best_child_explore_selection_value,
            nn_policy_prob,
            child.stats.utility_avg(),
            node.next_pla()
        );

        child_weight.min(wanted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tk_go::{Board, Point};

    use super::*;
    use crate::node::StatsSnapshot;
    use crate::options::SearchOptions;

    fn search_with(options: SearchOptions) -> Search {
        Search::new(Board::new(15, 15), Color::White, options)
    }

    fn search() -> Search {
        search_with(SearchOptions::default())
    }

    fn visited_node(visits: i64, weight: f64, utility: f64, utility_sq: f64) -> SearchNode {
        let node = SearchNode::new(Color::White, Point::NULL, 4);

        node.stats.store(&StatsSnapshot {
            visits,
            weight_sum: weight,
            weight_sq_sum: weight,
            utility_avg: utility,
            utility_sq_avg: utility_sq,
            ..StatsSnapshot::default()
        });
        node
    }

    #[test]
    fn result_utility() {
        let mut options = SearchOptions::default();
        options.no_result_utility_for_white = 0.5;
        let search = search_with(options);

        assert_relative_eq!(search.get_result_utility(0.25, 0.5), 0.5);
    }

    #[test]
    fn score_utility_is_odd_around_zero() {
        let search = search();

        assert_relative_eq!(search.get_score_utility(0.0, 0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            search.get_score_utility(5.0, 25.0 + 9.0),
            -search.get_score_utility(-5.0, 25.0 + 9.0),
            epsilon = 1e-9
        );
        assert!(search.get_score_utility(5.0, 25.0) > 0.0);
    }

    #[test]
    fn utility_from_nn() {
        let search = search();
        let mut nn_output = NNOutput::new(0, 15, 15);
        nn_output.white_win_prob = 0.7;
        nn_output.white_loss_prob = 0.3;

        assert_relative_eq!(search.get_utility_from_nn(&nn_output), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn weight_without_uncertainty() {
        let search = search();
        let mut nn_output = NNOutput::new(0, 15, 15);
        nn_output.shortterm_winloss_error = 0.5;

        assert_eq!(search.compute_weight_from_nn_output(&nn_output), 1.0);
    }

    #[test]
    fn weight_with_uncertainty() {
        let mut options = SearchOptions::default();
        options.use_uncertainty = true;
        let search = search_with(options);
        let mut certain = NNOutput::new(0, 15, 15);
        let mut uncertain = NNOutput::new(0, 15, 15);
        certain.shortterm_winloss_error = 0.0;
        uncertain.shortterm_winloss_error = 0.5;

        assert_relative_eq!(search.compute_weight_from_nn_output(&certain), 8.0, epsilon = 1e-9);
        assert!(search.compute_weight_from_nn_output(&uncertain) < 1.0);
    }

    #[test]
    fn fpu_without_prior_observations() {
        let search = search();
        let node = visited_node(1, 1.0, 0.3, 0.09);
        let fpu = search.get_fpu_value_for_children_assume_visited(&node, Color::White, false, 0.25);

        assert_relative_eq!(fpu.parent_utility_stdev_factor, 1.0);
        assert_relative_eq!(fpu.parent_weight_per_visit, 1.0);
        assert_relative_eq!(fpu.fpu, 0.3 - 0.2 * 0.5);
    }

    #[test]
    fn fpu_blends_with_network_utility() {
        let search = search();
        let node = visited_node(10, 10.0, 0.3, 0.09);
        let mut nn_output = NNOutput::new(0, 15, 15);
        nn_output.white_win_prob = 1.0;
        node.set_nn_output(Arc::new(nn_output));

        let fpu = search.get_fpu_value_for_children_assume_visited(&node, Color::Black, true, 0.5);
        let parent_utility = 0.25 * 0.3 + 0.75 * 1.0;

        assert_relative_eq!(fpu.parent_utility, parent_utility, epsilon = 1e-9);
        assert_relative_eq!(fpu.fpu, parent_utility + 0.1 * 0.5f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn fpu_loss_prop() {
        let mut options = SearchOptions::default();
        options.fpu_loss_prop = 1.0;
        let search = search_with(options);
        let node = visited_node(1, 1.0, 0.3, 0.09);

        assert_relative_eq!(search.get_fpu_value_for_children_assume_visited(&node, Color::White, false, 0.0).fpu, -1.4, epsilon = 1e-12);
        assert_relative_eq!(search.get_fpu_value_for_children_assume_visited(&node, Color::Black, false, 0.0).fpu, 1.4, epsilon = 1e-12);
    }

    #[test]
    #[should_panic]
    fn fpu_of_unvisited() {
        let search = search();
        let node = SearchNode::new(Color::White, Point::NULL, 4);

        search.get_fpu_value_for_children_assume_visited(&node, Color::White, false, 0.0);
    }

    #[test]
    fn explore_value_of_illegal() {
        assert_eq!(search().get_explore_selection_value(1.0, -1.0, 0.0, 0.0, Color::White), ILLEGAL_EXPLORE_SELECTION_VALUE);
        assert_eq!(search().get_explore_selection_value_inverse(1.0, 0.5, -1.0, 0.0, Color::White), 0.0);
    }

    #[test]
    fn explore_value_perspective() {
        let search = search();
        let white = search.get_explore_selection_value(2.0, 0.5, 1.0, 0.25, Color::White);
        let black = search.get_explore_selection_value(2.0, 0.5, 1.0, 0.25, Color::Black);

        assert_relative_eq!(white, 0.5 + 0.25);
        assert_relative_eq!(black, 0.5 - 0.25);
    }

    #[test]
    fn explore_value_inverse() {
        let search = search();

        for &weight in &[0.0, 1.0, 7.0, 100.0] {
            let value = search.get_explore_selection_value(3.0, 0.2, weight, -0.1, Color::Black);
            let inverse = search.get_explore_selection_value_inverse(3.0, value, 0.2, -0.1, Color::Black);

            assert_relative_eq!(inverse, weight, epsilon = 1e-6);
        }

        assert_eq!(search.get_explore_selection_value_inverse(3.0, 0.1, 0.2, 0.5, Color::White), 1e100);
    }

    #[test]
    fn explore_scaling_grows_with_weight() {
        let search = search();

        assert!(search.get_explore_scaling(100.0, 1.0) > search.get_explore_scaling(10.0, 1.0));
        assert_relative_eq!(search.get_explore_scaling(0.0, 1.0), 0.01f64.sqrt());
    }
}
