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

use serde::Serialize;

use tk_go::symmetry::Symmetry;
use tk_go::{nn_pos, Color, Point};
use tk_utils::config::{ANALYSIS_PV_LEN, OWNERSHIP_MIN_WEIGHT};
use tk_utils::math::{round_dynamic, round_static};

use crate::analysis::AnalysisData;
use crate::error::SearchError;
use crate::node::SearchNode;
use crate::search::Search;

/// The number of significant digits kept of every reported value.
const OUTPUT_PRECISION: i32 = 8;

/// Ownership is reported in multiples of one millionth.
const OWNERSHIP_INVERSE_SCALE: f64 = 1e6;

/// Which optional parts to include in an `AnalysisReport`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisRequest {
    /// The player whose perspective values are reported from, or `None`
    /// for the player to move.
    pub perspective: Option<Color>,
    pub analysis_pv_len: usize,
    pub ownership_min_weight: f64,
    pub include_ownership: bool,
    pub include_ownership_stdev: bool,
    pub include_moves_ownership: bool,
    pub include_moves_ownership_stdev: bool,
    pub include_policy: bool,
    pub include_pv_visits: bool,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            perspective: None,
            analysis_pv_len: *ANALYSIS_PV_LEN,
            ownership_min_weight: *OWNERSHIP_MIN_WEIGHT,
            include_ownership: false,
            include_ownership_stdev: false,
            include_moves_ownership: false,
            include_moves_ownership_stdev: false,
            include_policy: false,
            include_pv_visits: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInfo {
    #[serde(rename = "move")]
    pub point: String,
    pub visits: i64,
    pub utility: f64,
    pub winrate: f64,
    pub score_mean: f64,
    pub score_selfplay: f64,
    pub score_lead: f64,
    pub score_stdev: f64,
    pub prior: f64,
    pub lcb: f64,
    pub utility_lcb: f64,
    pub order: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_symmetry_of: Option<String>,
    pub pv: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_visits: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_stdev: Option<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub visits: i64,
    pub winrate: f64,
    pub score_selfplay: f64,
    pub score_lead: f64,
    pub score_stdev: f64,
    pub utility: f64,
    pub this_hash: String,
    /// The smallest hash of the root position under any symmetry.
    pub sym_hash: String,
    pub current_player: String,
}

/// The analysis of the root, as it is reported to machines.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub move_infos: Vec<MoveInfo>,
    pub root_info: RootInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_stdev: Option<Vec<f64>>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Returns the lower confidence bound of the winrate of `pla`, derived from
/// the utility radius of `data`. This is only an approximation, since the
/// radius also covers the score utility.
fn get_hacked_lcb_for_winrate(search: &Search, data: &AnalysisData, pla: Color) -> f64 {
    let options = search.options();
    let winrate = 0.5 * (1.0 + data.win_loss_value);
    let factor = 0.5 * options.win_loss_utility_factor
        / (options.win_loss_utility_factor + options.static_score_utility_factor + options.dynamic_score_utility_factor + 1e-20);

    match pla {
        Color::White => winrate - data.radius * factor,
        Color::Black => winrate + data.radius * factor,
    }
}

fn round(x: f64) -> f64 {
    round_dynamic(x, OUTPUT_PRECISION)
}

impl Search {
    /// Returns the board cells of `values`, a vector over the network
    /// positions, from the perspective of `perspective` and rotated back
    /// through `symmetry`.
    fn ownership_cells(&self, values: &[f64], perspective: Color, symmetry: Symmetry, negate: bool) -> Vec<f64> {
        let board = self.root_board();
        let inverse = symmetry.invert();
        let mut out = Vec::with_capacity(board.x_size() * board.y_size());

        for y in 0..board.y_size() {
            for x in 0..board.x_size() {
                let sym_point = inverse.get_sym_point(Point::new(x, y), board.x_size(), board.y_size());
                let sym_pos = nn_pos::xy_to_pos(sym_point.x(), sym_point.y(), self.nn_x_len());
                let value = values.get(sym_pos).cloned().unwrap_or(0.0);
                let value = if negate && perspective == Color::Black { -value } else { value };

                out.push(round_static(value, OWNERSHIP_INVERSE_SCALE));
            }
        }

        out
    }

    /// Returns the ownership and standard deviation of the tree below `node`
    /// as board cells, or `None` for the parts that were not asked for.
    fn ownership_json(
        &self,
        node: &SearchNode,
        min_weight: f64,
        perspective: Color,
        symmetry: Symmetry,
        include_ownership: bool,
        include_ownership_stdev: bool
    ) -> Result<(Option<Vec<f64>>, Option<Vec<f64>>), SearchError>
    {
        if include_ownership_stdev {
            let (ownership, stdev) = self.get_average_and_standard_deviation_tree_ownership(min_weight, Some(node))?;

            Ok((
                Some(self.ownership_cells(&ownership, perspective, symmetry, true)),
                Some(self.ownership_cells(&stdev, perspective, symmetry, false))
            ))
        } else if include_ownership {
            let ownership = self.get_average_tree_ownership(min_weight, Some(node))?;

            Ok((Some(self.ownership_cells(&ownership, perspective, symmetry, true)), None))
        } else {
            Ok((None, None))
        }
    }

    /// Returns the analysis of the root, with moves expanded over the
    /// symmetries of the root position.
    ///
    /// # Arguments
    ///
    /// * `request` - which parts to include
    ///
    pub fn get_analysis_json(&self, request: &AnalysisRequest) -> Result<AnalysisReport, SearchError> {
        let root = self.root().ok_or(SearchError::NoRoot)?;
        let board = self.root_board();
        let root_pla = self.root_pla();
        let perspective = request.perspective.unwrap_or(root_pla);
        let flip = perspective == Color::Black;
        let vertex = |point: Point| board.vertex(point).to_string();

        let analysis_data = self.get_analysis_data(root, 0, false, request.analysis_pv_len, true);
        let mut move_infos = Vec::with_capacity(analysis_data.len());

        for data in &analysis_data {
            let mut winrate = 0.5 * (1.0 + data.win_loss_value);
            let mut utility = data.utility;
            let mut lcb = get_hacked_lcb_for_winrate(self, data, root_pla);
            let mut utility_lcb = data.lcb;
            let mut score_mean = data.score_mean;
            let mut lead = data.lead;

            if flip {
                winrate = 1.0 - winrate;
                lcb = 1.0 - lcb;
                utility = -utility;
                score_mean = -score_mean;
                lead = -lead;
                utility_lcb = -utility_lcb;
            }

            let (ownership, ownership_stdev) = match data.node {
                Some(node) => self.ownership_json(
                    node,
                    request.ownership_min_weight,
                    perspective,
                    data.symmetry,
                    request.include_moves_ownership,
                    request.include_moves_ownership_stdev
                )?,
                None => (None, None)
            };

            move_infos.push(MoveInfo {
                point: vertex(data.point),
                visits: data.num_visits,
                utility: round(utility),
                winrate: round(winrate),
                score_mean: round(lead),
                score_selfplay: round(score_mean),
                score_lead: round(lead),
                score_stdev: round(data.score_stdev),
                prior: round(data.policy_prior),
                lcb: round(lcb),
                utility_lcb: round(utility_lcb),
                order: data.order,
                is_symmetry_of: data.is_symmetry_of.map(vertex),
                pv: data.pv.iter().map(|&p| vertex(p)).collect(),
                pv_visits: if request.include_pv_visits { Some(data.pv_visits.clone()) } else { None },
                ownership,
                ownership_stdev,
            });
        }

        let root_values = self.get_pruned_root_values().ok_or(SearchError::NoRootValues)?;
        let mut winrate = 0.5 * (1.0 + root_values.win_loss_value);
        let mut score_mean = root_values.expected_score;
        let mut lead = root_values.lead;
        let mut utility = root_values.utility;

        if flip {
            winrate = 1.0 - winrate;
            score_mean = -score_mean;
            lead = -lead;
            utility = -utility;
        }

        let this_hash = board.sit_hash(root_pla);
        let sym_hash = Symmetry::ALL.iter()
            .map(|symmetry| symmetry.sym_board(board).sit_hash(root_pla))
            .min()
            .unwrap_or(this_hash);

        let root_info = RootInfo {
            visits: root_values.visits,
            winrate: round(winrate),
            score_selfplay: round(score_mean),
            score_lead: round(lead),
            score_stdev: round(root_values.expected_score_stdev),
            utility: round(utility),
            this_hash: format!("{:016X}", this_hash),
            sym_hash: format!("{:016X}", sym_hash),
            current_player: root_pla.to_string(),
        };

        let policy = match root.nn_output() {
            Some(nn_output) if request.include_policy => {
                let policy_probs = nn_output.policy_probs_maybe_noised();
                let mut policy = Vec::with_capacity(board.x_size() * board.y_size() + 1);

                for y in 0..board.y_size() {
                    for x in 0..board.x_size() {
                        let pos = nn_pos::xy_to_pos(x, y, self.nn_x_len());

                        policy.push(round(policy_probs[pos] as f64));
                    }
                }

                let pass_pos = nn_pos::pass_pos(self.nn_x_len(), self.nn_y_len());
                policy.push(round(policy_probs[pass_pos] as f64));
                Some(policy)
            },
            _ => None
        };

        let (ownership, ownership_stdev) = self.ownership_json(
            root,
            request.ownership_min_weight,
            perspective,
            Symmetry::IDENTITY,
            request.include_ownership,
            request.include_ownership_stdev
        )?;

        Ok(AnalysisReport { move_infos, root_info, policy, ownership, ownership_stdev })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tk_go::Board;

    use super::*;
    use crate::nn_output::NNOutput;
    use crate::node::StatsSnapshot;
    use crate::options::SearchOptions;

    fn stats(visits: i64, utility: f64, score: f64) -> StatsSnapshot {
        StatsSnapshot {
            visits,
            weight_sum: visits as f64,
            weight_sq_sum: visits as f64,
            win_loss_value_avg: utility,
            utility_avg: utility,
            utility_sq_avg: utility * utility + 0.01,
            score_mean_avg: score,
            score_mean_sq_avg: score * score + 4.0,
            lead_avg: score,
            ..StatsSnapshot::default()
        }
    }

    fn nn_output(ownership: f32) -> Arc<NNOutput> {
        let mut nn_output = NNOutput::new(0, 5, 5);

        nn_output.white_win_prob = 0.5;
        nn_output.white_loss_prob = 0.5;
        nn_output.white_owner_map = Some(vec! [ownership; 25]);
        nn_output.policy_probs[nn_pos::xy_to_pos(2, 2, 5)] = 0.6;
        nn_output.policy_probs[nn_pos::xy_to_pos(3, 0, 5)] = 0.3;
        nn_output.policy_probs[nn_pos::pass_pos(5, 5)] = 0.1;
        Arc::new(nn_output)
    }

    /// An empty 5x5 board, white to move, with the center and one point off
    /// the diagonals visited.
    fn search() -> Search {
        let mut search = Search::new(Board::new(5, 5), Color::White, SearchOptions::default());
        let root = SearchNode::new(Color::White, Point::NULL, 2);

        root.stats.store(&stats(31, 0.3, 2.0));
        root.set_nn_output(nn_output(0.25));

        let center = root.push_child(SearchNode::new(Color::Black, Point::new(2, 2), 0)).unwrap();
        center.stats.store(&stats(20, 0.4, 3.0));
        center.set_nn_output(nn_output(0.5));

        let other = root.push_child(SearchNode::new(Color::Black, Point::new(3, 0), 0)).unwrap();
        other.stats.store(&stats(10, 0.2, 1.0));
        other.set_nn_output(nn_output(-0.5));

        search.set_always_include_owner_map(true);
        search.set_root(root);
        search
    }

    #[test]
    fn moves_expanded_over_symmetries() {
        let search = search();
        let report = search.get_analysis_json(&AnalysisRequest::default()).unwrap();
        let moves = report.move_infos.iter().map(|m| m.point.as_str()).collect::<Vec<_>>();

        // the center is its own image, and the other point has eight
        assert_eq!(moves.len(), 9);
        assert_eq!(moves[0], "C3");
        assert_eq!(moves[1], "D5");
        assert!(report.move_infos[1].is_symmetry_of.is_none());
        assert!(report.move_infos[2..].iter().all(|m| m.is_symmetry_of.as_deref() == Some("D5")));
        assert_eq!(report.move_infos.iter().map(|m| m.order).collect::<Vec<_>>(), (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn white_perspective() {
        let search = search();
        let report = search.get_analysis_json(&AnalysisRequest::default()).unwrap();
        let center = &report.move_infos[0];

        assert_eq!(center.visits, 20);
        assert_relative_eq!(center.winrate, 0.7);
        assert_relative_eq!(center.score_lead, 3.0);
        assert_relative_eq!(center.score_mean, 3.0);
        assert_relative_eq!(center.score_stdev, 2.0);
        assert_relative_eq!(center.prior, 0.6, epsilon = 1e-6);
        assert!(center.lcb < center.winrate);
        assert!(center.utility_lcb < center.utility);
        assert_eq!(report.root_info.current_player, "W");
    }

    #[test]
    fn black_perspective() {
        let search = search();
        let white = search.get_analysis_json(&AnalysisRequest::default()).unwrap();
        let black = search.get_analysis_json(&AnalysisRequest { perspective: Some(Color::Black), ..AnalysisRequest::default() }).unwrap();

        assert_relative_eq!(black.move_infos[0].winrate, 1.0 - white.move_infos[0].winrate, epsilon = 1e-9);
        assert_relative_eq!(black.move_infos[0].lcb, 1.0 - white.move_infos[0].lcb, epsilon = 1e-9);
        assert_relative_eq!(black.move_infos[0].utility, -white.move_infos[0].utility);
        assert_relative_eq!(black.root_info.score_lead, -white.root_info.score_lead);
        assert_eq!(black.root_info.this_hash, white.root_info.this_hash);
    }

    #[test]
    fn sym_hash_of_empty_board() {
        let search = search();
        let report = search.get_analysis_json(&AnalysisRequest::default()).unwrap();

        // every symmetry of an empty square board is the board itself
        assert_eq!(report.root_info.this_hash, report.root_info.sym_hash);
        assert_eq!(report.root_info.this_hash.len(), 16);
    }

    #[test]
    fn policy_and_ownership() {
        let search = search();
        let report = search.get_analysis_json(&AnalysisRequest {
            include_policy: true,
            include_ownership: true,
            include_moves_ownership: true,
            include_pv_visits: true,
            ..AnalysisRequest::default()
        }).unwrap();

        let policy = report.policy.as_ref().unwrap();
        assert_eq!(policy.len(), 26);
        assert_relative_eq!(policy[12], 0.6, epsilon = 1e-6);
        assert_relative_eq!(policy[25], 0.1, epsilon = 1e-6);

        let ownership = report.ownership.as_ref().unwrap();
        assert_eq!(ownership.len(), 25);
        assert!(report.ownership_stdev.is_none());
        assert!(report.move_infos.iter().all(|m| m.ownership.as_ref().map(|o| o.len()) == Some(25)));
        assert_eq!(report.move_infos[0].ownership.as_ref().unwrap()[0], 0.5);
        assert_eq!(report.move_infos[0].pv_visits, Some(vec! [20]));
    }

    #[test]
    fn ownership_requires_owner_map() {
        let mut search = search();
        search.set_always_include_owner_map(false);

        let request = AnalysisRequest { include_ownership: true, ..AnalysisRequest::default() };
        assert_eq!(search.get_analysis_json(&request), Err(SearchError::OwnerMapDisabled));
        assert!(search.get_analysis_json(&AnalysisRequest::default()).is_ok());
    }

    #[test]
    fn serialized_names() {
        let search = search();
        let report = search.get_analysis_json(&AnalysisRequest::default()).unwrap();
        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["moveInfos"][0]["move"], "C3");
        assert!(json["moveInfos"][0].get("scoreSelfplay").is_some());
        assert!(json["moveInfos"][0].get("pvVisits").is_none());
        assert!(json["moveInfos"][0].get("isSymmetryOf").is_none());
        assert_eq!(json["moveInfos"][2]["isSymmetryOf"], "D5");
        assert_eq!(json["rootInfo"]["currentPlayer"], "W");
        assert!(json.get("policy").is_none());
    }

    #[test]
    fn no_root() {
        let search = Search::new(Board::new(5, 5), Color::White, SearchOptions::default());

        assert_eq!(search.get_analysis_json(&AnalysisRequest::default()), Err(SearchError::NoRoot));
    }
}
