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

use std::fmt;
use std::sync::Arc;

use tk_go::nn_pos;
use tk_go::Board;

/// A cached evaluation of a position by the neural network. Every value is
/// from the perspective of white.
#[derive(Clone, Debug, PartialEq)]
pub struct NNOutput {
    pub nn_hash: u64,

    pub white_win_prob: f32,
    pub white_loss_prob: f32,
    pub white_no_result_prob: f32,

    pub white_score_mean: f32,
    pub white_score_mean_sq: f32,
    pub white_lead: f32,
    pub var_time_left: f32,

    pub shortterm_winloss_error: f32,
    pub shortterm_score_error: f32,

    /// The dimensions of the planes of the network, which may be larger than
    /// the board.
    pub nn_x_len: usize,
    pub nn_y_len: usize,

    /// The expected owner of each point, `1.0` for white and `-1.0` for
    /// black. Absent if the network was not asked for it.
    pub white_owner_map: Option<Vec<f32>>,

    /// The probability of each position, with pass last. Illegal moves are
    /// negative.
    pub policy_probs: Vec<f32>,

    /// The policy after root noise was added, if any.
    pub noised_policy_probs: Option<Vec<f32>>,

    pub policy_optimism_used: f32,
}

impl NNOutput {
    /// Returns an evaluation with every value zero, no owner map, and a
    /// policy where every move is legal but has zero probability.
    pub fn new(nn_hash: u64, nn_x_len: usize, nn_y_len: usize) -> Self {
        Self {
            nn_hash,
            white_win_prob: 0.0,
            white_loss_prob: 0.0,
            white_no_result_prob: 0.0,
            white_score_mean: 0.0,
            white_score_mean_sq: 0.0,
            white_lead: 0.0,
            var_time_left: 0.0,
            shortterm_winloss_error: 0.0,
            shortterm_score_error: 0.0,
            nn_x_len,
            nn_y_len,
            white_owner_map: None,
            policy_probs: vec! [0.0; nn_pos::policy_size(nn_x_len, nn_y_len)],
            noised_policy_probs: None,
            policy_optimism_used: 0.0,
        }
    }

    /// Returns the noised policy if there is one, otherwise the raw policy.
    pub fn policy_probs_maybe_noised(&self) -> &[f32] {
        self.noised_policy_probs.as_deref().unwrap_or(&self.policy_probs)
    }

    /// Returns the average of several evaluations of the same position.
    ///
    /// If the evaluations disagree about which moves are legal, then the
    /// policy of the first one is used as-is rather than mixing probabilities
    /// with the illegal markers.
    ///
    /// # Arguments
    ///
    /// * `others` - the evaluations, all with the same hash
    ///
    pub fn average(others: &[Arc<NNOutput>]) -> NNOutput {
        assert!(!others.is_empty(), "cannot average zero evaluations");

        let first = &others[0];
        let len = others.len() as f32;

        for other in &others[1..] {
            assert_eq!(other.nn_hash, first.nn_hash, "averaging evaluations of different positions");
        }

        let mean = |f: fn(&NNOutput) -> f32| -> f32 {
            others.iter().map(|o| f(o)).sum::<f32>() / len
        };
        let mut out = NNOutput::new(first.nn_hash, first.nn_x_len, first.nn_y_len);

        out.white_win_prob = mean(|o| o.white_win_prob);
        out.white_loss_prob = mean(|o| o.white_loss_prob);
        out.white_no_result_prob = mean(|o| o.white_no_result_prob);
        out.white_score_mean = mean(|o| o.white_score_mean);
        out.white_score_mean_sq = mean(|o| o.white_score_mean_sq);
        out.white_lead = mean(|o| o.white_lead);
        out.var_time_left = mean(|o| o.var_time_left);
        out.shortterm_winloss_error = mean(|o| o.shortterm_winloss_error);
        out.shortterm_score_error = mean(|o| o.shortterm_score_error);

        // only the evaluations that have an owner map contribute to it
        let owner_maps = others.iter()
            .filter_map(|o| o.white_owner_map.as_ref())
            .collect::<Vec<_>>();

        if !owner_maps.is_empty() {
            let count = owner_maps.len() as f32;
            let mut owner_map = vec! [0.0f32; first.nn_x_len * first.nn_y_len];

            for map in owner_maps {
                for (acc, &x) in owner_map.iter_mut().zip(map.iter()) {
                    *acc += x;
                }
            }

            for acc in owner_map.iter_mut() {
                *acc /= count;
            }

            out.white_owner_map = Some(owner_map);
        }

        let is_mismatch = others[1..].iter().any(|other| {
            other.policy_probs.iter().zip(first.policy_probs.iter())
                .any(|(&a, &b)| (a < 0.0) != (b < 0.0))
        });

        if is_mismatch {
            warn!(nn_hash = first.nn_hash, "evaluations disagree on legal moves, keeping the first policy");

            out.policy_probs = first.policy_probs.clone();
        } else {
            for (pos, p) in out.policy_probs.iter_mut().enumerate() {
                *p = others.iter().map(|o| o.policy_probs[pos]).sum::<f32>() / len;
            }
        }

        if others.iter().all(|o| o.policy_optimism_used == first.policy_optimism_used) {
            out.policy_optimism_used = first.policy_optimism_used;
        } else {
            out.policy_optimism_used = others.iter().map(|o| o.policy_optimism_used / len).sum();
        }

        out
    }

    /// Returns a value that renders this evaluation for humans, with the
    /// policy and owner map laid out as grids over the given board.
    pub fn debug_print<'a>(&'a self, board: &'a Board) -> DebugPrint<'a> {
        DebugPrint { nn_output: self, board }
    }
}

/// Wrapper for printing an `NNOutput` from within a `write!` macro.
pub struct DebugPrint<'a> {
    nn_output: &'a NNOutput,
    board: &'a Board
}

impl<'a> fmt::Display for DebugPrint<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let out = self.nn_output;

        writeln!(f, "Win {:.2}c", out.white_win_prob * 100.0)?;
        writeln!(f, "Loss {:.2}c", out.white_loss_prob * 100.0)?;
        writeln!(f, "NoResult {:.2}c", out.white_no_result_prob * 100.0)?;
        writeln!(f, "ScoreMean {:.2}", out.white_score_mean)?;
        writeln!(f, "ScoreMeanSq {:.1}", out.white_score_mean_sq)?;
        writeln!(f, "Lead {:.2}", out.white_lead)?;
        writeln!(f, "VarTimeLeft {:.1}", out.var_time_left)?;
        writeln!(f, "STWinlossError {:.2}c", out.shortterm_winloss_error * 100.0)?;
        writeln!(f, "STScoreError {:.2}", out.shortterm_score_error)?;
        writeln!(f, "OptimismUsed {:.2}", out.policy_optimism_used)?;

        writeln!(f, "Policy")?;
        writeln!(f, "Pass{:4} ", permille(out.policy_probs[nn_pos::pass_pos(out.nn_x_len, out.nn_y_len)]))?;

        for y in 0..self.board.y_size() {
            for x in 0..self.board.x_size() {
                let prob = out.policy_probs[nn_pos::xy_to_pos(x, y, out.nn_x_len)];

                if prob < 0.0 {
                    write!(f, "   - ")?;
                } else {
                    write!(f, "{:4} ", permille(prob))?;
                }
            }

            writeln!(f)?;
        }

        if let Some(ref owner_map) = out.white_owner_map {
            for y in 0..self.board.y_size() {
                for x in 0..self.board.x_size() {
                    write!(f, "{:5} ", permille(owner_map[nn_pos::xy_to_pos(x, y, out.nn_x_len)]))?;
                }

                writeln!(f)?;
            }

            writeln!(f)?;
        }

        Ok(())
    }
}

fn permille(x: f32) -> i32 {
    (x * 1000.0).round() as i32
}
