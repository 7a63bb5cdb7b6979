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

use crate::error::SearchError;
use crate::node::SearchNode;
use crate::score_value::{self, get_score_stdev};
use crate::search::Search;
use crate::selection::LcbMode;

/// A summary of the values of a node, all from the perspective of white.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReportedSearchValues {
    pub win_value: f64,
    pub loss_value: f64,
    pub no_result_value: f64,
    pub static_score_value: f64,
    pub dynamic_score_value: f64,
    pub expected_score: f64,
    pub expected_score_stdev: f64,
    pub lead: f64,
    pub win_loss_value: f64,
    pub utility: f64,
    pub weight: f64,
    pub visits: i64,
}

impl ReportedSearchValues {
    /// Returns the values of the given averages. The win-loss and no-result
    /// values are clamped to their valid range, since floating point errors
    /// can make the averages stray slightly outside of it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: &Search,
        win_loss_value_avg: f64,
        no_result_value_avg: f64,
        score_mean_avg: f64,
        score_mean_sq_avg: f64,
        lead_avg: f64,
        utility_avg: f64,
        total_weight: f64,
        total_visits: i64
    ) -> Self
    {
        let score_stdev = get_score_stdev(score_mean_avg, score_mean_sq_avg);
        let sqrt_area = search.root_board().sqrt_area();
        let static_score_value = score_value::expected_white_score_value(
            score_mean_avg, score_stdev,
            0.0, 2.0,
            sqrt_area
        );
        let dynamic_score_value = score_value::expected_white_score_value(
            score_mean_avg, score_stdev,
            search.recent_score_center(), search.options().dynamic_score_center_scale,
            sqrt_area
        );

        let win_loss_value = win_loss_value_avg.max(-1.0).min(1.0);
        let no_result_value = no_result_value_avg.max(0.0).min(1.0 - win_loss_value.abs());

        Self {
            win_value: (0.5 * (win_loss_value + (1.0 - no_result_value))).max(0.0),
            loss_value: (0.5 * (-win_loss_value + (1.0 - no_result_value))).max(0.0),
            no_result_value,
            static_score_value,
            dynamic_score_value,
            expected_score: score_mean_avg,
            expected_score_stdev: score_stdev,
            lead: lead_avg,
            win_loss_value,
            utility: utility_avg,
            weight: total_weight,
            visits: total_visits,
        }
    }
}

impl Search {
    /// Returns the accumulated values of the given node, or `None` if it has
    /// no weight yet.
    pub fn get_node_values(&self, node: &SearchNode) -> Option<ReportedSearchValues> {
        let stats = node.stats.snapshot();

        if stats.weight_sum <= 0.0 {
            return None;
        }

        assert!(stats.visits >= 0);
        assert!(
            !self.is_root(node) || node.nn_output().is_some(),
            "the root has weight but no network evaluation"
        );

        Some(ReportedSearchValues::new(
            self,
            stats.win_loss_value_avg,
            stats.no_result_value_avg,
            stats.score_mean_avg,
            stats.score_mean_sq_avg,
            stats.lead_avg,
            stats.utility_avg,
            stats.weight_sum,
            stats.visits
        ))
    }

    pub fn get_root_values(&self) -> Option<ReportedSearchValues> {
        self.root().and_then(|root| self.get_node_values(root))
    }

    pub fn get_root_values_require_success(&self) -> Result<ReportedSearchValues, SearchError> {
        let root = self.root().ok_or_else(|| {
            debug!("root values requested without a root");
            SearchError::NoRoot
        })?;

        self.get_node_values(root).ok_or_else(|| {
            debug!("root values requested before the root has any weight");
            SearchError::NoRootValues
        })
    }

    /// Returns the values of the network evaluation of the given node, as if
    /// it had been visited exactly once.
    pub fn get_node_raw_nn_values(&self, node: &SearchNode) -> Option<ReportedSearchValues> {
        let nn_output = node.nn_output()?;
        let win_value = nn_output.white_win_prob as f64;
        let loss_value = nn_output.white_loss_prob as f64;
        let no_result_value = nn_output.white_no_result_prob as f64;
        let score_mean = nn_output.white_score_mean as f64;
        let score_stdev = get_score_stdev(score_mean, nn_output.white_score_mean_sq as f64);
        let sqrt_area = self.root_board().sqrt_area();

        assert!(win_value >= 0.0 && loss_value >= 0.0 && no_result_value >= 0.0);
        assert!(win_value + loss_value + no_result_value < 1.001);

        Some(ReportedSearchValues {
            win_value,
            loss_value,
            no_result_value,
            static_score_value: score_value::expected_white_score_value(score_mean, score_stdev, 0.0, 2.0, sqrt_area),
            dynamic_score_value: score_value::expected_white_score_value(
                score_mean, score_stdev,
                self.recent_score_center(), self.options().dynamic_score_center_scale,
                sqrt_area
            ),
            expected_score: score_mean,
            expected_score_stdev: score_stdev,
            lead: nn_output.white_lead as f64,
            win_loss_value: (win_value - loss_value).max(-1.0).min(1.0),
            utility: self.get_utility_from_nn(nn_output),
            weight: self.compute_weight_from_nn_output(nn_output),
            visits: 1,
        })
    }

    pub fn get_root_raw_nn_values(&self) -> Option<ReportedSearchValues> {
        self.root().and_then(|root| self.get_node_raw_nn_values(root))
    }

    pub fn get_root_raw_nn_values_require_success(&self) -> Result<ReportedSearchValues, SearchError> {
        let root = self.root().ok_or_else(|| {
            debug!("raw root values requested without a root");
            SearchError::NoRoot
        })?;

        self.get_node_raw_nn_values(root).ok_or_else(|| {
            debug!("raw root values requested before the root was evaluated");
            SearchError::NoRootRawNnValues
        })
    }

    /// Returns the values of the given node recomputed from its children,
    /// each weighted by its play selection value, together with the network
    /// evaluation of the node itself. This discards most of the weight that
    /// was spent on exploring moves that turned out to be bad.
    pub fn get_pruned_node_values(&self, node: &SearchNode) -> Option<ReportedSearchValues> {
        let selection = match self.get_play_selection_values(node, 1.0, false, LcbMode::Never) {
            Some(selection) => selection,
            None => return self.get_node_values(node),
        };

        let mut win_loss_value_sum = 0.0;
        let mut no_result_value_sum = 0.0;
        let mut score_mean_sum = 0.0;
        let mut score_mean_sq_sum = 0.0;
        let mut lead_sum = 0.0;
        let mut utility_sum = 0.0;
        let mut weight_sum = 0.0;

        for (child, &weight) in node.children().zip(selection.values.iter()) {
            let stats = child.stats.snapshot();

            if stats.visits <= 0 || stats.weight_sum <= 0.0 {
                continue;
            }

            win_loss_value_sum += weight * stats.win_loss_value_avg;
            no_result_value_sum += weight * stats.no_result_value_avg;
            score_mean_sum += weight * stats.score_mean_avg;
            score_mean_sq_sum += weight * stats.score_mean_sq_avg;
            lead_sum += weight * stats.lead_avg;
            utility_sum += weight * stats.utility_avg;
            weight_sum += weight;
        }

        // the evaluation of this node itself, with unit weight
        let nn_output = node.nn_output()?;
        let win_loss = (nn_output.white_win_prob - nn_output.white_loss_prob) as f64;
        let no_result = nn_output.white_no_result_prob as f64;
        let score_mean = nn_output.white_score_mean as f64;
        let score_mean_sq = nn_output.white_score_mean_sq as f64;

        win_loss_value_sum += win_loss;
        no_result_value_sum += no_result;
        score_mean_sum += score_mean;
        score_mean_sq_sum += score_mean_sq;
        lead_sum += nn_output.white_lead as f64;
        utility_sum += self.get_result_utility(win_loss, no_result) + self.get_score_utility(score_mean, score_mean_sq);
        weight_sum += 1.0;

        let stats = node.stats.snapshot();

        Some(ReportedSearchValues::new(
            self,
            win_loss_value_sum / weight_sum,
            no_result_value_sum / weight_sum,
            score_mean_sum / weight_sum,
            score_mean_sq_sum / weight_sum,
            lead_sum / weight_sum,
            utility_sum / weight_sum,
            stats.weight_sum,
            stats.visits
        ))
    }

    pub fn get_pruned_root_values(&self) -> Option<ReportedSearchValues> {
        self.root().and_then(|root| self.get_pruned_node_values(root))
    }
}
