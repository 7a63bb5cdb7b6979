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

use crate::error::SearchError;
use crate::node::SearchNode;
use crate::search::Search;
use crate::selection::LcbMode;
use crate::weights::ChildStats;

/// The accumulated ownership of a tree, and optionally its second moment.
struct OwnershipSums<'a> {
    sum: &'a mut [f64],
    sum_sq: Option<&'a mut [f64]>,
}

impl<'a> OwnershipSums<'a> {
    fn add(&mut self, weight: f64, owner_map: &[f32]) {
        for (acc, &own) in self.sum.iter_mut().zip(owner_map.iter()) {
            *acc += weight * own as f64;
        }

        if let Some(sum_sq) = self.sum_sq.as_mut() {
            for (acc, &own) in sum_sq.iter_mut().zip(owner_map.iter()) {
                *acc += weight * (own as f64) * (own as f64);
            }
        }
    }
}

impl Search {
    /// Distribute `desired_weight` between the evaluation of `node` and its
    /// children, and add the ownership of every evaluated node in the tree
    /// to `sums` with the weight it was given. Returns the weight that was
    /// actually distributed, which is zero for nodes without an evaluation.
    fn traverse_tree_ownership(
        &self,
        min_weight: f64,
        desired_weight: f64,
        node: &SearchNode,
        sums: &mut OwnershipSums
    ) -> f64
    {
        let nn_output = match node.nn_output() {
            Some(nn_output) => nn_output,
            None => return 0.0
        };
        let owner_map = match nn_output.white_owner_map.as_deref() {
            Some(owner_map) => owner_map,
            None => {
                trace!("skipping evaluation without an owner map");
                return 0.0;
            }
        };

        let this_node_weight = self.compute_weight_from_nn_output(nn_output);
        let children = node.children()
            .map(|child| (child, child.stats.weight_sum()))
            .filter(|&(_, weight)| weight >= min_weight)
            .collect::<Vec<_>>();
        let used_children_weight = children.iter().map(|&(_, w)| w).sum::<f64>();
        let relative_children_weight = children.iter().map(|&(_, w)| w * w).sum::<f64>();
        let mut actual_weight_from_children = 0.0;

        if relative_children_weight > 0.0 {
            let desired_weight_from_children = desired_weight * used_children_weight / (used_children_weight + this_node_weight);

            for &(child, weight) in &children {
                let desired_weight_from_child = weight * weight / relative_children_weight * desired_weight_from_children;

                actual_weight_from_children += self.traverse_tree_ownership(min_weight, desired_weight_from_child, child, sums);
            }
        }

        sums.add(desired_weight - actual_weight_from_children, owner_map);
        desired_weight
    }

    /// Returns the ownership of every point from the perspective of white,
    /// averaged over the entire tree below `node`, or the root if `node` is
    /// `None`.
    ///
    /// # Arguments
    ///
    /// * `min_weight` - children with less weight than this are ignored
    /// * `node` -
    ///
    pub fn get_average_tree_ownership(&self, min_weight: f64, node: Option<&SearchNode>) -> Result<Vec<f64>, SearchError> {
        if !self.always_include_owner_map() {
            return Err(SearchError::OwnerMapDisabled);
        }

        let node = self.node_or_root(node)?;
        let mut sum = vec! [0.0; self.nn_x_len() * self.nn_y_len()];

        self.traverse_tree_ownership(min_weight, 1.0, node, &mut OwnershipSums { sum: &mut sum, sum_sq: None });
        Ok(sum)
    }

    /// Returns the average ownership of every point, like
    /// `get_average_tree_ownership`, together with its standard deviation
    /// over the tree.
    pub fn get_average_and_standard_deviation_tree_ownership(
        &self,
        min_weight: f64,
        node: Option<&SearchNode>
    ) -> Result<(Vec<f64>, Vec<f64>), SearchError>
    {
        if !self.always_include_owner_map() {
            return Err(SearchError::OwnerMapDisabled);
        }

        let node = self.node_or_root(node)?;
        let area = self.nn_x_len() * self.nn_y_len();
        let mut sum = vec! [0.0; area];
        let mut sum_sq = vec! [0.0; area];

        self.traverse_tree_ownership(min_weight, 1.0, node, &mut OwnershipSums { sum: &mut sum, sum_sq: Some(&mut sum_sq) });

        let stdev = sum.iter().zip(sum_sq.iter())
            .map(|(&mean, &mean_sq)| (mean_sq - mean * mean).max(0.0).sqrt())
            .collect();

        Ok((sum, stdev))
    }

    /// Returns the expected score of white at `node`, where the children are
    /// weighted by the cube of their weight to prefer the lines the search
    /// believes in the most. At the root the play selection values are used
    /// as weights.
    pub fn get_sharp_score(&self, node: Option<&SearchNode>) -> Result<f64, SearchError> {
        let node = self.node_or_root(node)?;

        if !self.is_root(node) {
            return Ok(self.get_sharp_score_helper(node));
        }

        let selection = match self.get_play_selection_values(node, 1.0, false, LcbMode::Never) {
            Some(selection) => selection,
            None => {
                return self.get_node_values(node)
                    .map(|values| values.expected_score)
                    .ok_or(SearchError::NoRootValues);
            }
        };

        let mut score_mean_sum = 0.0;
        let mut score_weight_sum = 0.0;
        let mut child_weight_sum = 0.0;

        for (child, &weight) in node.children().zip(selection.values.iter()) {
            if child.stats.visits() <= 0 || child.stats.weight_sum() <= 0.0 {
                continue;
            }

            let sharp_weight = weight * weight * weight;

            score_mean_sum += sharp_weight * self.get_sharp_score_helper(child);
            score_weight_sum += sharp_weight;
            child_weight_sum += weight;
        }

        let nn_output = node.nn_output().ok_or(SearchError::MissingEvaluation)?;
        let this_node_weight = self.compute_weight_from_nn_output(nn_output);
        let desired_score_weight = if score_weight_sum < 1e-50 || child_weight_sum < 1e-50 {
            this_node_weight
        } else {
            this_node_weight * (score_weight_sum / child_weight_sum)
        };

        score_mean_sum += nn_output.white_score_mean as f64 * desired_score_weight;
        score_weight_sum += desired_score_weight;

        Ok(score_mean_sum / score_weight_sum)
    }

    fn get_sharp_score_helper(&self, node: &SearchNode) -> f64 {
        let nn_output = match node.nn_output() {
            Some(nn_output) => nn_output,
            None => return node.stats.score_mean_avg()
        };
        let policy_probs = nn_output.policy_probs_maybe_noised();

        let mut children = node.children()
            .map(|child| {
                let stats = child.stats.snapshot();

                (child, ChildStats {
                    stats,
                    self_utility: match node.next_pla() {
                        Color::White => stats.utility_avg,
                        Color::Black => -stats.utility_avg,
                    },
                    weight_adjusted: stats.weight_sum,
                    prev_move: child.prev_move(),
                })
            })
            .collect::<Vec<_>>();
        let mut child_stats = children.iter().map(|&(_, stats)| stats).collect::<Vec<_>>();
        let mut total_child_weight = child_stats.iter().map(|c| c.weight_adjusted).sum::<f64>();

        if self.options().use_noise_pruning {
            let policies = child_stats.iter()
                .map(|c| self.policy_of(policy_probs, c.prev_move).max(1e-30))
                .collect::<Vec<_>>();

            total_child_weight = self.prune_noise_weight(&mut child_stats, total_child_weight, &policies);
        }

        self.downweight_bad_children_and_normalize_weight(&mut child_stats, total_child_weight, total_child_weight, 0.0, 0.0);

        for ((_, stats), adjusted) in children.iter_mut().zip(child_stats.into_iter()) {
            *stats = adjusted;
        }

        let mut score_mean_sum = 0.0;
        let mut score_weight_sum = 0.0;
        let mut child_weight_sum = 0.0;

        for (child, stats) in &children {
            if stats.stats.visits <= 0 || stats.stats.weight_sum <= 0.0 {
                continue;
            }

            let weight = stats.weight_adjusted;
            let sharp_weight = weight * weight * weight;

            score_mean_sum += sharp_weight * self.get_sharp_score_helper(child);
            score_weight_sum += sharp_weight;
            child_weight_sum += weight;
        }

        let this_node_weight = self.compute_weight_from_nn_output(nn_output);
        let desired_score_weight = if score_weight_sum < 1e-50 || child_weight_sum < 1e-50 {
            this_node_weight
        } else {
            this_node_weight * (score_weight_sum / child_weight_sum)
        };

        score_mean_sum += nn_output.white_score_mean as f64 * desired_score_weight;
        score_weight_sum += desired_score_weight;

        score_mean_sum / score_weight_sum
    }

    /// Returns the short-term win-loss and score errors predicted by the
    /// network, averaged over the tree below `node` (or the root).
    pub fn get_average_shortterm_wl_and_score_error(&self, node: Option<&SearchNode>) -> Result<(f64, f64), SearchError> {
        let node = self.node_or_root(node)?;

        Ok(self.get_average_shortterm_wl_and_score_error_helper(node))
    }

    pub(crate) fn get_average_shortterm_wl_and_score_error_helper(&self, node: &SearchNode) -> (f64, f64) {
        let nn_output = match node.nn_output() {
            Some(nn_output) => nn_output,
            None => return (0.0, 0.0)
        };

        let this_node_weight = self.compute_weight_from_nn_output(nn_output);
        let mut wl_error_sum = this_node_weight * nn_output.shortterm_winloss_error as f64;
        let mut score_error_sum = this_node_weight * nn_output.shortterm_score_error as f64;
        let mut weight_sum = this_node_weight;

        for child in node.children().collect::<Vec<_>>().into_iter().rev() {
            let child_weight = child.stats.weight_sum();
            let (wl_error, score_error) = self.get_average_shortterm_wl_and_score_error_helper(child);

            wl_error_sum += child_weight * wl_error;
            score_error_sum += child_weight * score_error;
            weight_sum += child_weight;
        }

        (wl_error_sum / weight_sum, score_error_sum / weight_sum)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tk_go::{nn_pos, Board, Point};

    use super::*;
    use crate::nn_output::NNOutput;
    use crate::node::StatsSnapshot;
    use crate::options::SearchOptions;

    fn evaluated(pla: Color, point: Point, capacity: usize, weight: f64, ownership: Option<f32>) -> SearchNode {
        let node = SearchNode::new(pla, point, capacity);
        let mut nn_output = NNOutput::new(0, 3, 3);

        nn_output.white_owner_map = ownership.map(|own| vec! [own; 9]);
        node.set_nn_output(Arc::new(nn_output));
        node.stats.store(&StatsSnapshot {
            visits: weight.ceil() as i64,
            weight_sum: weight,
            weight_sq_sum: weight,
            ..StatsSnapshot::default()
        });
        node
    }

    fn search(root: SearchNode) -> Search {
        let mut search = Search::new(Board::new(3, 3), Color::Black, SearchOptions::default());

        search.set_always_include_owner_map(true);
        search.set_root(root);
        search
    }

    #[test]
    fn disabled_owner_map() {
        let mut search = search(evaluated(Color::Black, Point::NULL, 0, 1.0, Some(0.5)));
        search.set_always_include_owner_map(false);

        assert_eq!(search.get_average_tree_ownership(0.0, None), Err(SearchError::OwnerMapDisabled));
        assert_eq!(
            search.get_average_and_standard_deviation_tree_ownership(0.0, None),
            Err(SearchError::OwnerMapDisabled)
        );
    }

    #[test]
    fn no_root() {
        let mut search = Search::new(Board::new(3, 3), Color::Black, SearchOptions::default());
        search.set_always_include_owner_map(true);

        assert_eq!(search.get_average_tree_ownership(0.0, None), Err(SearchError::NoRoot));
    }

    #[test]
    fn root_only() {
        let search = search(evaluated(Color::Black, Point::NULL, 0, 1.0, Some(0.5)));
        let ownership = search.get_average_tree_ownership(0.0, None).unwrap();

        assert_eq!(ownership.len(), 9);
        for own in ownership {
            assert_relative_eq!(own, 0.5);
        }
    }

    #[test]
    fn blend_of_two_children() {
        let root = evaluated(Color::Black, Point::NULL, 2, 5.0, Some(0.2));
        root.push_child(evaluated(Color::White, Point::new(0, 0), 0, 3.0, Some(1.0)));
        root.push_child(evaluated(Color::White, Point::new(1, 0), 0, 1.0, Some(-1.0)));

        let search = search(root);
        let (ownership, stdev) = search.get_average_and_standard_deviation_tree_ownership(0.0, None).unwrap();

        for (own, stdev) in ownership.into_iter().zip(stdev.into_iter()) {
            assert_relative_eq!(own, 0.68, epsilon = 1e-6);
            assert_relative_eq!(stdev, (0.808f64 - 0.68 * 0.68).sqrt(), epsilon = 1e-6);
        }
    }

    #[test]
    fn unevaluated_child_weight_goes_to_parent() {
        let root = evaluated(Color::Black, Point::NULL, 2, 5.0, Some(0.2));
        root.push_child(evaluated(Color::White, Point::new(0, 0), 0, 3.0, Some(1.0)));

        let unevaluated = SearchNode::new(Color::White, Point::new(1, 0), 0);
        unevaluated.stats.store(&StatsSnapshot { visits: 1, weight_sum: 1.0, weight_sq_sum: 1.0, ..StatsSnapshot::default() });
        root.push_child(unevaluated);

        let search = search(root);

        for own in search.get_average_tree_ownership(0.0, None).unwrap() {
            assert_relative_eq!(own, 0.72 + 0.28 * 0.2, epsilon = 1e-6);
        }
    }

    #[test]
    fn min_weight_ignores_light_children() {
        let root = evaluated(Color::Black, Point::NULL, 2, 5.0, Some(0.2));
        root.push_child(evaluated(Color::White, Point::new(0, 0), 0, 3.0, Some(1.0)));
        root.push_child(evaluated(Color::White, Point::new(1, 0), 0, 1.0, Some(-1.0)));

        let search = search(root);

        // only the heavy child remains, and it gets 3 / 4 of the weight
        for own in search.get_average_tree_ownership(2.0, None).unwrap() {
            assert_relative_eq!(own, 0.75 + 0.25 * 0.2, epsilon = 1e-6);
        }
    }

    #[test]
    fn sharp_score_below_root() {
        let root = evaluated(Color::Black, Point::NULL, 1, 11.0, None);
        let node = SearchNode::new(Color::White, Point::new(0, 0), 1);
        let mut nn_output = NNOutput::new(0, 3, 3);
        nn_output.white_score_mean = 2.0;
        node.set_nn_output(Arc::new(nn_output));

        let child = SearchNode::new(Color::Black, Point::new(1, 1), 0);
        child.stats.store(&StatsSnapshot {
            visits: 10,
            weight_sum: 10.0,
            weight_sq_sum: 10.0,
            score_mean_avg: 4.0,
            ..StatsSnapshot::default()
        });
        node.push_child(child);
        root.push_child(node);

        let search = search(root);
        let node = search.root().and_then(|root| root.child_at(0)).unwrap();

        // (10^3 * 4 + 1 * (10^3 / 10) * 2) / (10^3 + 10^2)
        assert_relative_eq!(search.get_sharp_score(Some(node)).unwrap(), 42.0 / 11.0, epsilon = 1e-9);
    }

    #[test]
    fn sharp_score_prefers_heavy_child() {
        let root = SearchNode::new(Color::Black, Point::NULL, 2);
        root.set_nn_output(Arc::new(NNOutput::new(0, 3, 3)));
        root.stats.store(&StatsSnapshot {
            visits: 151,
            weight_sum: 151.0,
            weight_sq_sum: 151.0,
            score_mean_avg: 2.3,
            ..StatsSnapshot::default()
        });

        for &(point, visits, score) in &[(Point::new(0, 0), 100, 3.0), (Point::new(1, 0), 50, 1.0)] {
            let child = SearchNode::new(Color::White, point, 0);
            child.stats.store(&StatsSnapshot {
                visits,
                weight_sum: visits as f64,
                weight_sq_sum: visits as f64,
                score_mean_avg: score,
                score_mean_sq_avg: score * score,
                ..StatsSnapshot::default()
            });
            root.push_child(child);
        }

        let search = search(root);
        let sharp_score = search.get_sharp_score(None).unwrap();

        assert!(sharp_score > 2.5 && sharp_score < 3.0, "{}", sharp_score);
    }

    /// The sharp score of a white node below the root with a good child of
    /// high policy and a worse child of low policy, and optionally an
    /// unvisited child of medium policy between them.
    fn sharp_score_of_pruned_children(with_unvisited: bool) -> f64 {
        let root = evaluated(Color::Black, Point::NULL, 1, 201.0, None);
        let node = SearchNode::new(Color::White, Point::new(0, 0), 3);
        let mut nn_output = NNOutput::new(0, 3, 3);

        for &(point, policy) in &[(Point::new(1, 0), 0.5), (Point::new(2, 0), 0.3), (Point::new(0, 1), 0.2)] {
            nn_output.policy_probs[nn_pos::point_to_pos(point, 3, 3)] = policy;
        }
        node.set_nn_output(Arc::new(nn_output));

        let moves = [(Point::new(1, 0), 100, 0.5, 10.0), (Point::new(2, 0), 0, 0.0, 0.0), (Point::new(0, 1), 100, 0.0, 0.0)];

        for &(point, visits, utility, score) in &moves {
            if visits == 0 && !with_unvisited {
                continue;
            }

            let child = SearchNode::new(Color::Black, point, 0);
            child.stats.store(&StatsSnapshot {
                visits,
                weight_sum: visits as f64,
                weight_sq_sum: visits as f64,
                utility_avg: utility,
                utility_sq_avg: utility * utility,
                score_mean_avg: score,
                ..StatsSnapshot::default()
            });
            node.push_child(child);
        }
        root.push_child(node);

        let search = search(root);
        let node = search.root().and_then(|root| root.child_at(0)).unwrap();

        search.get_sharp_score(Some(node)).unwrap()
    }

    #[test]
    fn sharp_score_unvisited_child_counts_towards_policy() {
        let with_unvisited = sharp_score_of_pruned_children(true);
        let without_unvisited = sharp_score_of_pruned_children(false);

        // the policy of the unvisited child lowers the weight the worse
        // child should have, so more of its weight is pruned
        assert!(with_unvisited > without_unvisited + 0.5, "{} <= {}", with_unvisited, without_unvisited);
        assert!(with_unvisited < 10.0);
    }

    #[test]
    fn sharp_score_requires_evaluation() {
        let root = SearchNode::new(Color::Black, Point::NULL, 1);
        root.push_child(evaluated(Color::White, Point::new(0, 0), 0, 3.0, None));
        root.stats.store(&StatsSnapshot { visits: 4, weight_sum: 4.0, weight_sq_sum: 4.0, ..StatsSnapshot::default() });

        let search = search(root);

        assert_eq!(search.get_sharp_score(None), Err(SearchError::MissingEvaluation));
    }

    #[test]
    fn sharp_score_of_root_without_children() {
        let root = SearchNode::new(Color::Black, Point::NULL, 0);
        root.set_nn_output(Arc::new(NNOutput::new(0, 3, 3)));
        root.stats.store(&StatsSnapshot {
            visits: 1,
            weight_sum: 1.0,
            weight_sq_sum: 1.0,
            score_mean_avg: 1.5,
            score_mean_sq_avg: 2.25,
            ..StatsSnapshot::default()
        });

        assert_relative_eq!(search(root).get_sharp_score(None).unwrap(), 1.5);
    }

    #[test]
    fn sharp_score_without_root_values() {
        let search = search(SearchNode::new(Color::Black, Point::NULL, 0));

        assert_eq!(search.get_sharp_score(None), Err(SearchError::NoRootValues));
    }

    #[test]
    fn shortterm_errors() {
        let root = SearchNode::new(Color::Black, Point::NULL, 2);
        let mut nn_output = NNOutput::new(0, 3, 3);
        nn_output.shortterm_winloss_error = 0.1;
        nn_output.shortterm_score_error = 2.0;
        root.set_nn_output(Arc::new(nn_output));

        let child = SearchNode::new(Color::White, Point::new(0, 0), 0);
        child.stats.store(&StatsSnapshot { visits: 3, weight_sum: 3.0, weight_sq_sum: 3.0, ..StatsSnapshot::default() });
        let mut nn_output = NNOutput::new(0, 3, 3);
        nn_output.shortterm_winloss_error = 0.3;
        nn_output.shortterm_score_error = 4.0;
        child.set_nn_output(Arc::new(nn_output));
        root.push_child(child);

        let unevaluated = SearchNode::new(Color::White, Point::new(1, 0), 0);
        unevaluated.stats.store(&StatsSnapshot { visits: 1, weight_sum: 1.0, weight_sq_sum: 1.0, ..StatsSnapshot::default() });
        root.push_child(unevaluated);

        let search = search(root);
        let (wl_error, score_error) = search.get_average_shortterm_wl_and_score_error(None).unwrap();

        assert_relative_eq!(wl_error, 0.2, epsilon = 1e-6);
        assert_relative_eq!(score_error, 2.8, epsilon = 1e-6);
    }
}
