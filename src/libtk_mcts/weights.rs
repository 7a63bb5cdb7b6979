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

use tk_go::Point;
use tk_utils::math::t3_cdf;

use crate::node::StatsSnapshot;
use crate::search::Search;

/// Smallest variance of the value estimate of a child.
const MIN_VARIANCE: f64 = 1e-8;

/// Added to the cumulative probability of each child, so that no child
/// loses all of its weight.
const MIN_VALUE_WEIGHT_PROB: f64 = 1e-4;

/// The statistics of a child, and the weight it ends up with after the
/// adjustments of this module.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChildStats {
    pub stats: StatsSnapshot,
    /// The utility of the child, from the perspective of the player that
    /// chooses between the children.
    pub self_utility: f64,
    pub weight_adjusted: f64,
    pub prev_move: Point,
}

impl Search {
    /// Remove weight from children that received more weight than their
    /// policy warrants compared to the children with a higher policy, if
    /// they are also worse than those children. Such weight is most likely
    /// the result of noise in the value estimates rather than of a good move.
    ///
    /// Returns the new total weight of the children.
    ///
    /// # Arguments
    ///
    /// * `children` -
    /// * `total_child_weight` - the sum of `weight_adjusted` of `children`
    /// * `policy_probs` - the policy of each child
    ///
    pub fn prune_noise_weight(
        &self,
        children: &mut [ChildStats],
        mut total_child_weight: f64,
        policy_probs: &[f64]
    ) -> f64
    {
        debug_assert_eq!(children.len(), policy_probs.len());

        if children.len() <= 1 || total_child_weight <= 1e-5 {
            return total_child_weight;
        }

        // visit the children in descending policy order, which is usually
        // but not always the order they are stored in
        let mut order = (0..children.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| policy_probs[b].partial_cmp(&policy_probs[a]).unwrap_or(Ordering::Equal));

        let options = self.options();
        let mut utility_sum_so_far = 0.0;
        let mut weight_sum_so_far = 0.0;
        let mut policy_sum_so_far = 0.0;

        for i in order {
            let utility = children[i].self_utility;
            let old_weight = children[i].weight_adjusted;
            let policy = policy_probs[i];
            let mut new_weight = old_weight;

            if weight_sum_so_far > 0.0 && policy_sum_so_far > 0.0 {
                let avg_utility_so_far = utility_sum_so_far / weight_sum_so_far;
                let utility_gap = avg_utility_so_far - utility;

                if utility_gap > 0.0 {
                    let weight_should_be = 2.0 * weight_sum_so_far * policy / policy_sum_so_far;

                    if old_weight > weight_should_be {
                        let excess = old_weight - weight_should_be;
                        let factor = 1.0 - (-utility_gap / options.noise_prune_utility_scale).exp();

                        new_weight = old_weight - (excess * factor).min(options.noise_pruning_cap);
                    }
                }
            }

            children[i].weight_adjusted = new_weight;
            total_child_weight += new_weight - old_weight;
            utility_sum_so_far += utility * new_weight;
            weight_sum_so_far += new_weight;
            policy_sum_so_far += policy;
        }

        total_child_weight
    }

    /// Prune and subtract from the weights of the children, then shift
    /// weight towards the children whose utility is better than average
    /// relative to how certain we are about it, and finally normalize the
    /// weights to sum to `desired_total_weight`.
    ///
    /// # Arguments
    ///
    /// * `children` -
    /// * `current_total_weight` - the sum of `weight_adjusted` of `children`
    /// * `desired_total_weight` -
    /// * `amount_to_subtract` - subtracted from the weight of every child
    /// * `amount_to_prune` - children with less weight than this get none
    ///
    pub fn downweight_bad_children_and_normalize_weight(
        &self,
        children: &mut [ChildStats],
        mut current_total_weight: f64,
        desired_total_weight: f64,
        amount_to_subtract: f64,
        amount_to_prune: f64
    )
    {
        if children.is_empty() || current_total_weight <= 0.0 {
            return;
        }

        let value_weight_exponent = self.options().value_weight_exponent;

        if value_weight_exponent == 0.0 {
            for child in children.iter_mut() {
                if child.weight_adjusted < amount_to_prune {
                    current_total_weight -= child.weight_adjusted;
                    child.weight_adjusted = 0.0;
                } else if child.weight_adjusted - amount_to_subtract <= 0.0 {
                    current_total_weight -= child.weight_adjusted;
                    child.weight_adjusted = 0.0;
                } else {
                    current_total_weight -= amount_to_subtract;
                    child.weight_adjusted -= amount_to_subtract;
                }
            }

            if current_total_weight > 0.0 && current_total_weight != desired_total_weight {
                let factor = desired_total_weight / current_total_weight;

                for child in children.iter_mut() {
                    child.weight_adjusted *= factor;
                }
            }

            return;
        }

        let mut stdevs = vec! [0.0; children.len()];
        let mut simple_value_sum = 0.0;

        for (i, child) in children.iter().enumerate() {
            if child.stats.visits == 0 {
                continue;
            }

            let weight = child.weight_adjusted;
            let precision = 1.5 * weight.sqrt();

            stdevs[i] = (MIN_VARIANCE + 1.0 / precision).sqrt();
            simple_value_sum += child.self_utility * weight;
        }

        let simple_value = simple_value_sum / current_total_weight;
        let mut total_new_unnorm_weight = 0.0;

        for (i, child) in children.iter_mut().enumerate() {
            if child.stats.visits == 0 {
                continue;
            }

            if child.weight_adjusted < amount_to_prune {
                child.weight_adjusted = 0.0;
                continue;
            }

            let new_weight = child.weight_adjusted - amount_to_subtract;

            child.weight_adjusted = if new_weight <= 0.0 {
                0.0
            } else {
                let z = (child.self_utility - simple_value) / stdevs[i];
                let p = t3_cdf(z) + MIN_VALUE_WEIGHT_PROB;

                new_weight * p.powf(value_weight_exponent)
            };

            total_new_unnorm_weight += child.weight_adjusted;
        }

        if total_new_unnorm_weight > 0.0 {
            let factor = desired_total_weight / total_new_unnorm_weight;

            for child in children.iter_mut() {
                child.weight_adjusted *= factor;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tk_go::{Board, Color};

    use super::*;
    use crate::options::SearchOptions;

    fn child(weight: f64, self_utility: f64) -> ChildStats {
        ChildStats {
            stats: StatsSnapshot {
                visits: weight.ceil() as i64,
                weight_sum: weight,
                weight_sq_sum: weight,
                ..StatsSnapshot::default()
            },
            self_utility,
            weight_adjusted: weight,
            prev_move: Point::NULL,
        }
    }

    fn search_with(options: SearchOptions) -> Search {
        Search::new(Board::new(9, 9), Color::Black, options)
    }

    fn total(children: &[ChildStats]) -> f64 {
        children.iter().map(|c| c.weight_adjusted).sum()
    }

    #[test]
    fn prune_noise_keeps_a_single_child() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(10.0, 0.0)];

        assert_eq!(search.prune_noise_weight(&mut children, 10.0, &[1.0]), 10.0);
        assert_eq!(children[0].weight_adjusted, 10.0);
    }

    #[test]
    fn prune_noise_of_overweighted_bad_child() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(100.0, 0.5), child(100.0, 0.0)];
        let new_total = search.prune_noise_weight(&mut children, 200.0, &[0.9, 0.1]);

        // the second child should have weight 2 * 100 * 0.1 / 0.9, and loses
        // most of the excess since it is much worse than the first
        let should_be = 2.0 * 100.0 * 0.1 / 0.9;
        let factor = 1.0 - (-0.5f64 / 0.15).exp();
        let expected = 100.0 - (100.0 - should_be) * factor;

        assert_eq!(children[0].weight_adjusted, 100.0);
        assert_relative_eq!(children[1].weight_adjusted, expected, epsilon = 1e-9);
        assert_relative_eq!(new_total, 100.0 + expected, epsilon = 1e-9);
    }

    #[test]
    fn prune_noise_ignores_better_children() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(10.0, 0.0), child(100.0, 0.5)];

        assert_eq!(search.prune_noise_weight(&mut children, 110.0, &[0.9, 0.1]), 110.0);
    }

    #[test]
    fn prune_noise_sorts_by_policy() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(100.0, 0.0), child(100.0, 0.5)];
        search.prune_noise_weight(&mut children, 200.0, &[0.1, 0.9]);

        assert!(children[0].weight_adjusted < 100.0);
        assert_eq!(children[1].weight_adjusted, 100.0);
    }

    #[test]
    fn downweight_normalizes_to_desired() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(30.0, 0.1), child(20.0, -0.1), child(5.0, 0.0)];
        search.downweight_bad_children_and_normalize_weight(&mut children, 55.0, 55.0, 0.0, 0.0);

        assert_relative_eq!(total(&children), 55.0, epsilon = 1e-9);
        assert!(children[0].weight_adjusted > 30.0);
        assert!(children[1].weight_adjusted < 20.0);
    }

    #[test]
    fn downweight_prunes_small_children() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(30.0, 0.0), child(0.5, 0.0)];
        search.downweight_bad_children_and_normalize_weight(&mut children, 30.5, 1.0, 0.0, 1.0);

        assert_eq!(children[1].weight_adjusted, 0.0);
        assert_relative_eq!(children[0].weight_adjusted, 1.0);
    }

    #[test]
    fn downweight_without_value_weight() {
        let search = search_with(SearchOptions { value_weight_exponent: 0.0, ..SearchOptions::default() });
        let mut children = vec! [child(30.0, 0.5), child(10.0, -0.5), child(0.5, 0.0)];
        search.downweight_bad_children_and_normalize_weight(&mut children, 40.5, 20.0, 5.0, 1.0);

        // (30 - 5, 10 - 5, 0) normalized to 20
        assert_relative_eq!(children[0].weight_adjusted, 25.0 * 20.0 / 30.0, epsilon = 1e-9);
        assert_relative_eq!(children[1].weight_adjusted, 5.0 * 20.0 / 30.0, epsilon = 1e-9);
        assert_eq!(children[2].weight_adjusted, 0.0);
    }

    #[test]
    fn downweight_skips_unvisited_children() {
        let search = search_with(SearchOptions::default());
        let mut children = vec! [child(10.0, 0.0), child(0.0, 1.0)];
        search.downweight_bad_children_and_normalize_weight(&mut children, 10.0, 10.0, 0.0, 0.0);

        assert_relative_eq!(children[0].weight_adjusted, 10.0, epsilon = 1e-9);
        assert_eq!(children[1].weight_adjusted, 0.0);
    }
}
