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

use std::sync::Arc;

use tk_go::{nn_pos, Board, Color, Point};
use tk_mcts::{NNOutput, Search, SearchNode, SearchOptions, StatsSnapshot};
use tracing_subscriber::EnvFilter;

/// Install a subscriber that prints the events of the search to the test
/// output, filtered by `RUST_LOG`. Only the first call has any effect.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns the statistics of a node that has been visited `visits` times,
/// each time with the given utility and score, and a small utility variance.
#[allow(dead_code)]
pub fn stats(visits: i64, utility: f64, score: f64) -> StatsSnapshot {
    StatsSnapshot {
        visits,
        weight_sum: visits as f64,
        weight_sq_sum: visits as f64,
        win_loss_value_avg: utility,
        no_result_value_avg: 0.0,
        score_mean_avg: score,
        score_mean_sq_avg: score * score + 1.0,
        lead_avg: score,
        utility_avg: utility,
        utility_sq_avg: utility * utility + 0.01,
    }
}

/// Returns an evaluation on a board of the given size, with the given
/// ownership at every point and policy at the given moves.
#[allow(dead_code)]
pub fn evaluation(x_size: usize, y_size: usize, ownership: Option<f32>, policy: &[(Point, f32)]) -> Arc<NNOutput> {
    let mut nn_output = NNOutput::new(0, x_size, y_size);

    nn_output.white_win_prob = 0.5;
    nn_output.white_loss_prob = 0.5;
    nn_output.white_owner_map = ownership.map(|own| vec! [own; x_size * y_size]);

    for &(point, prob) in policy {
        nn_output.policy_probs[nn_pos::point_to_pos(point, x_size, y_size)] = prob;
    }

    Arc::new(nn_output)
}

/// Returns a node with the given statistics, and the given evaluation if
/// there is one.
#[allow(dead_code)]
pub fn node(
    next_pla: Color,
    prev_move: Point,
    capacity: usize,
    stats: StatsSnapshot,
    nn_output: Option<Arc<NNOutput>>
) -> SearchNode
{
    let node = SearchNode::new(next_pla, prev_move, capacity);

    node.stats.store(&stats);
    if let Some(nn_output) = nn_output {
        node.set_nn_output(nn_output);
    }

    node
}

/// Returns a search of an empty board with the given root.
#[allow(dead_code)]
pub fn search_with_root(size: usize, root: SearchNode, options: SearchOptions) -> Search {
    let mut search = Search::new(Board::new(size, size), root.next_pla(), options);

    search.set_root(root);
    search
}
