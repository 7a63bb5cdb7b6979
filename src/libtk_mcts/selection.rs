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

use rand::Rng;

use tk_go::{nn_pos, Color, Point};
use tk_utils::lcb::MIN_VISITS_FOR_LCB;

use crate::choose::{choose_index_with_temperature, interpolate_early};
use crate::node::SearchNode;
use crate::search::Search;

/// An ownership beyond which a point is considered settled, for the purpose
/// of suppressing pass.
const EXTREME_OWNERSHIP: f64 = 0.95;

/// A move is only considered an alternative to passing if it has more than
/// this many visits, or enough weight compared to pass.
const SUPPRESS_PASS_MIN_VISITS: i64 = 500;

/// How much worse than pass, in utility, score, and lead, a move may be and
/// still suppress pass.
const SUPPRESS_PASS_UTILITY_MARGIN: f64 = 0.1;
const SUPPRESS_PASS_SCORE_MARGIN: f64 = 0.5;

/// The smallest weight that counts as a visited move.
const MIN_USABLE_WEIGHT: f64 = 1e-10;

/// How much smaller than the excess the radius grows in the denominator of
/// the confidence bound adjustment.
const LCB_EXCESS_DAMPING: f64 = 0.2;

/// Whether the lower confidence bound of each child is computed and used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LcbMode {
    /// Never compute it.
    Never,
    /// Compute and use it if the options say so.
    Default,
    /// Always compute it, but only use it if the options say so.
    Always,
}

/// The moves of a node together with how much each should be preferred
/// when playing, rather than exploring.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaySelection {
    pub moves: Vec<Point>,
    pub values: Vec<f64>,
    pub visits: Vec<i64>,

    /// The lower confidence bound of the utility of each child from the
    /// perspective of the player to move, or empty if it was not computed.
    pub lcbs: Vec<f64>,
    pub radii: Vec<f64>,
}

impl PlaySelection {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// The difference between the policy and the preferences of the search at
/// some node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolicySurprise {
    /// The KL divergence of the policy from the play selection values.
    pub surprise: f64,
    /// The entropy of the play selection values.
    pub search_entropy: f64,
    /// The entropy of the policy.
    pub policy_entropy: f64,
}

impl Search {
    /// Returns how much each move of the given node should be preferred
    /// when picking a move to play, or `None` if no move can be picked.
    ///
    /// At the root the weight of every child except the most weighted one is
    /// reduced to the weight it would have needed to keep up with it, which
    /// discards visits spent on exploration that turned out to be wasted.
    /// The child with the best lower confidence bound then receives a bonus
    /// that makes it preferred over every child it beats with some margin.
    ///
    /// # Arguments
    ///
    /// * `node` -
    /// * `scale_max_to_at_least` - the smallest allowed maximum value
    /// * `allow_direct_policy_moves` - if the root has no children, use its
    ///   policy instead
    /// * `lcb_mode` -
    ///
    pub fn get_play_selection_values(
        &self,
        node: &SearchNode,
        scale_max_to_at_least: f64,
        allow_direct_policy_moves: bool,
        lcb_mode: LcbMode
    ) -> Option<PlaySelection>
    {
        let options = self.options();
        let children = node.children().collect::<Vec<_>>();
        let suppress_pass = self.should_suppress_pass(node);
        let mut out = PlaySelection::default();
        let mut total_child_weight = 0.0;

        for child in &children {
            let visits = child.stats.visits();
            let weight = child.stats.weight_sum();

            out.moves.push(child.prev_move());
            total_child_weight += weight;

            if suppress_pass && child.prev_move().is_pass() {
                out.values.push(0.0);
                out.visits.push(0);
            } else {
                out.values.push(weight);
                out.visits.push(visits);
            }
        }

        let (most_weighted_index, most_weighted_value) = out.values.iter()
            .enumerate()
            .fold((0, -1e30), |(best_i, best_x), (i, &x)| {
                if x > best_x { (i, x) } else { (best_i, best_x) }
            });

        // reduce the weight of children we spent too many visits on in
        // hindsight
        if self.is_root(node) && !children.is_empty() {
            match node.nn_output() {
                None => warn!("root has children but no network evaluation, keeping the raw child weights"),
                Some(nn_output) => {
                    let policy_probs = nn_output.policy_probs_maybe_noised();
                    let policy_prob_mass_visited = children.iter()
                        .map(|child| self.policy_of(policy_probs, child.prev_move()).max(0.0))
                        .sum::<f64>();
                    let fpu = self.get_fpu_value_for_children_assume_visited(
                        node,
                        self.root_pla(),
                        true,
                        policy_prob_mass_visited
                    );
                    let best_child_explore_selection_value = self.get_explore_selection_value_of_child(
                        node,
                        policy_probs,
                        children[most_weighted_index],
                        total_child_weight,
                        &fpu
                    );

                    for (i, child) in children.iter().enumerate() {
                        if suppress_pass && child.prev_move().is_pass() {
                            out.values[i] = 0.0;
                        } else if i != most_weighted_index {
                            let reduced = self.get_reduced_play_selection_weight(
                                node,
                                policy_probs,
                                child,
                                total_child_weight,
                                fpu.parent_utility_stdev_factor,
                                best_child_explore_selection_value
                            );

                            out.values[i] = reduced.ceil();
                        }
                    }
                }
            }
        }

        // give a bonus to the child with the best lower confidence bound
        let compute_lcb = match lcb_mode {
            LcbMode::Never => false,
            LcbMode::Default => options.use_lcb_for_selection && !children.is_empty(),
            LcbMode::Always => true,
        };

        if compute_lcb {
            let mut best_lcb = -1e10;
            let mut best_lcb_index = None;

            for (i, child) in children.iter().enumerate() {
                let (lcb, radius) = self.get_self_utility_lcb_and_radius(node, child);
                let value = out.values[i];

                out.lcbs.push(lcb);
                out.radii.push(radius);

                if value >= options.min_visits_for_lcb
                    && value >= options.min_visit_prop_for_lcb * most_weighted_value
                    && lcb > best_lcb
                {
                    best_lcb = lcb;
                    best_lcb_index = Some(i);
                }
            }

            let best_lcb_index = best_lcb_index
                .filter(|&i| options.use_non_buggy_lcb || i > 0)
                .filter(|_| options.use_lcb_for_selection && !children.is_empty());

            if let Some(best) = best_lcb_index {
                let mut adjusted_value = out.values[best];

                for i in 0..children.len() {
                    if i == best {
                        continue;
                    }

                    // this child has a better bound, it just failed the
                    // minimum weight requirements
                    let excess = best_lcb - out.lcbs[i];
                    if excess < 0.0 {
                        continue;
                    }

                    let radius = out.radii[i];
                    let radius_factor = (radius + excess) / (radius + LCB_EXCESS_DAMPING * excess);
                    let bound = radius_factor * radius_factor * out.values[i];

                    if bound > adjusted_value {
                        adjusted_value = bound;
                    }
                }

                out.values[best] = adjusted_value;
            }
        }

        // without any children, play directly from the policy
        if children.is_empty() {
            let nn_output = node.nn_output()?;

            if !self.is_root(node) || !allow_direct_policy_moves {
                return None;
            }

            let policy_probs = nn_output.policy_probs_maybe_noised();
            let policy_size = nn_pos::policy_size(self.nn_x_len(), self.nn_y_len()).min(policy_probs.len());

            for &obey_allowed_root_move in &[true, false] {
                for pos in 0..policy_size {
                    let point = self.pos_to_point(pos);
                    let policy_prob = policy_probs[pos] as f64;

                    if !self.root_board().is_legal(point, self.root_pla())
                        || policy_prob < 0.0
                        || (obey_allowed_root_move && !self.is_allowed_root_move(point))
                        || self.is_avoided(self.root_pla(), point)
                    {
                        continue;
                    }

                    out.moves.push(point);
                    out.values.push(policy_prob);
                    out.visits.push(0);
                }

                // still nothing, then ignore the symmetry pruning
                if !out.moves.is_empty() {
                    break;
                }
            }
        }

        if out.moves.is_empty() {
            trace!("no moves to select from");
            return None;
        }

        let max_value = out.values.iter().cloned().fold(0.0, f64::max);

        if max_value <= 1e-50 {
            trace!(max_value, "play selection values are all zero");
            return None;
        }

        assert!(max_value < 1e40, "play selection value {} overflowed", max_value);

        let amount_to_subtract = options.chosen_move_subtract.min(max_value / 64.0);
        let amount_to_prune = options.chosen_move_prune.min(max_value / 64.0);
        let new_max_value = max_value - amount_to_subtract;

        for value in out.values.iter_mut() {
            *value = if *value < amount_to_prune {
                0.0
            } else {
                (*value - amount_to_subtract).max(0.0)
            };
        }

        assert!(new_max_value > 0.0);

        if new_max_value < scale_max_to_at_least {
            let scale = scale_max_to_at_least / new_max_value;

            for value in out.values.iter_mut() {
                *value *= scale;
            }
        }

        Some(out)
    }

    /// Returns the lower confidence bound of the utility of `child`, from
    /// the perspective of the player to move at `parent`, and the radius of
    /// the confidence interval.
    pub fn get_self_utility_lcb_and_radius(&self, parent: &SearchNode, child: &SearchNode) -> (f64, f64) {
        let default_radius = 2.0 * self.options().utility_radius();
        let stats = child.stats.snapshot();

        if stats.visits <= 0 || stats.weight_sum <= 0.0 || stats.weight_sq_sum <= 0.0 {
            return (-default_radius, default_radius);
        }

        let ess = stats.weight_sum * stats.weight_sum / stats.weight_sq_sum;
        let ess_int = ess.round() as i64;

        if ess_int < MIN_VISITS_FOR_LCB {
            return (-default_radius, default_radius);
        }

        let self_utility = match parent.next_pla() {
            Color::White => stats.utility_avg,
            Color::Black => -stats.utility_avg,
        };
        let utility_variance = (stats.utility_sq_avg - stats.utility_avg * stats.utility_avg).max(1e-8);
        let estimate_stdev = (utility_variance / ess).sqrt();
        let radius = estimate_stdev * self.norm_to_t().get(ess_int);

        (self_utility - radius, radius)
    }

    /// Returns true if pass should not be played at `node`, because there is
    /// a move that is about as good and still fills a point that is not
    /// settled. This only applies to the root under territory scoring.
    pub fn should_suppress_pass(&self, node: &SearchNode) -> bool {
        let history = self.root_history();

        if !self.options().fill_dame_before_pass || !self.is_root(node) {
            return false;
        }
        if !history.territory_scoring || history.encore_phase > 0 {
            return false;
        }

        let owner_map = match node.nn_output().and_then(|nn| nn.white_owner_map.as_deref()) {
            Some(owner_map) => owner_map,
            None => return false
        };
        let pass_node = match node.children().find(|child| child.prev_move().is_pass()) {
            Some(pass_node) => pass_node,
            None => return false
        };

        let pass_stats = pass_node.stats.snapshot();
        if pass_stats.visits <= 0 || pass_stats.weight_sum <= MIN_USABLE_WEIGHT {
            return false;
        }

        let root_pla = self.root_pla();
        let pla_ownership = |point: Point| {
            let own = owner_map.get(self.get_pos(point)).map(|&x| x as f64).unwrap_or(0.0);

            match root_pla {
                Color::White => own,
                Color::Black => -own,
            }
        };

        for child in node.children() {
            let point = child.prev_move();
            if point.is_pass() {
                continue;
            }

            let opp_owned = pla_ownership(point) < -EXTREME_OWNERSHIP;
            let adj_to_pla_owned = self.root_board().adjacent(point).any(|adj| pla_ownership(adj) > EXTREME_OWNERSHIP);

            if opp_owned && !adj_to_pla_owned {
                continue;
            }

            let stats = child.stats.snapshot();

            // too few visits to be trusted
            if (stats.visits <= SUPPRESS_PASS_MIN_VISITS && stats.weight_sum <= 2.0 * pass_stats.weight_sum.sqrt())
                || stats.weight_sum <= MIN_USABLE_WEIGHT
            {
                continue;
            }

            let not_worse = match root_pla {
                Color::White => {
                    stats.utility_avg > pass_stats.utility_avg - SUPPRESS_PASS_UTILITY_MARGIN
                        && stats.score_mean_avg > pass_stats.score_mean_avg - SUPPRESS_PASS_SCORE_MARGIN
                        && stats.lead_avg > pass_stats.lead_avg - SUPPRESS_PASS_SCORE_MARGIN
                },
                Color::Black => {
                    stats.utility_avg < pass_stats.utility_avg + SUPPRESS_PASS_UTILITY_MARGIN
                        && stats.score_mean_avg < pass_stats.score_mean_avg + SUPPRESS_PASS_SCORE_MARGIN
                        && stats.lead_avg < pass_stats.lead_avg + SUPPRESS_PASS_SCORE_MARGIN
                }
            };

            if not_worse {
                return true;
            }
        }

        false
    }

    /// Returns the temperature to choose the move to play with, at the
    /// current move number.
    pub fn chosen_move_temperature(&self) -> f64 {
        let options = self.options();
        let move_number = self.root_history().move_number;

        if let Some(ref schedule) = options.chosen_move_temperature_schedule {
            tk_utils::config::get_intp_value(schedule, move_number as i32) as f64
        } else {
            interpolate_early(
                options.chosen_move_temperature_halflife,
                options.chosen_move_temperature_early,
                options.chosen_move_temperature,
                move_number,
                self.root_board().sqrt_area()
            )
        }
    }

    /// Returns the move to play at the root, or `None` if there is nothing
    /// to choose from.
    ///
    /// # Arguments
    ///
    /// * `rng` - the source of randomness for a non-zero temperature
    ///
    pub fn get_chosen_move<R: Rng>(&self, rng: &mut R) -> Option<Point> {
        let root = self.root()?;
        let selection = self.get_play_selection_values(root, 0.0, true, LcbMode::Default)?;
        let index = choose_index_with_temperature(&selection.values, self.chosen_move_temperature(), rng.gen::<f64>());

        Some(selection.moves[index])
    }

    /// Returns a copy of the policy of the given node.
    pub fn get_policy(&self, node: &SearchNode) -> Option<Vec<f32>> {
        node.nn_output().map(|nn_output| nn_output.policy_probs_maybe_noised().to_vec())
    }

    /// Returns how surprised the policy of the given node is by the play
    /// selection values of the search.
    pub fn get_policy_surprise_and_entropy(&self, node: &SearchNode) -> Option<PolicySurprise> {
        let nn_output = node.nn_output()?;
        let selection = self.get_play_selection_values(node, 1.0, true, LcbMode::Default)?;
        let policy_probs = nn_output.policy_probs_maybe_noised();
        let sum_values = selection.values.iter().sum::<f64>();
        let mut surprise = 0.0;
        let mut search_entropy = 0.0;

        for (&point, &value) in selection.moves.iter().zip(selection.values.iter()) {
            let policy = self.policy_of(policy_probs, point).max(1e-100);
            let target = value / sum_values;

            if target > 1e-100 {
                let log_target = target.ln();

                surprise += target * (log_target - policy.ln());
                search_entropy -= target * log_target;
            }
        }

        let policy_entropy = policy_probs.iter()
            .map(|&p| p as f64)
            .filter(|&p| p > 1e-100)
            .map(|p| -p * p.ln())
            .sum::<f64>();

        Some(PolicySurprise {
            surprise: surprise.max(0.0),
            search_entropy: search_entropy.max(0.0),
            policy_entropy: policy_entropy.max(0.0),
        })
    }

    pub fn get_root_policy_surprise_and_entropy(&self) -> Option<PolicySurprise> {
        self.root().and_then(|root| self.get_policy_surprise_and_entropy(root))
    }
}
