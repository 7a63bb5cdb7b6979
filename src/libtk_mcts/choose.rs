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

/// Returns `value` while far into the game, and `early_value` at the very
/// start of it, decaying exponentially between the two with the given
/// halflife in moves. The halflife is scaled to the board size, so that it
/// corresponds to the same fraction of the game on every board.
///
/// # Arguments
///
/// * `halflife` -
/// * `early_value` -
/// * `value` -
/// * `move_number` - the number of moves played so far
/// * `sqrt_board_area` -
///
pub fn interpolate_early(halflife: f64, early_value: f64, value: f64, move_number: usize, sqrt_board_area: f64) -> f64 {
    let raw_halflives = move_number as f64 / halflife;
    let halflives = raw_halflives * 19.0 / sqrt_board_area;

    value + (early_value - value) * 0.5f64.powf(halflives)
}

/// Choose an index into `relative_probs`, where the probability of each
/// index is its relative probability raised to `1 / temperature`. A
/// temperature of (nearly) zero always picks the first largest element.
/// Elements that are not positive are never chosen unless every element is.
///
/// # Arguments
///
/// * `relative_probs` -
/// * `temperature` -
/// * `at` - a uniformly random number in `[0, 1)`
///
pub fn choose_index_with_temperature(relative_probs: &[f64], temperature: f64, at: f64) -> usize {
    assert!(!relative_probs.is_empty(), "cannot choose from zero elements");
    debug_assert!(at >= 0.0 && at <= 1.0);

    if relative_probs.len() == 1 {
        return 0;
    }

    let (best_index, max_value) = relative_probs.iter()
        .enumerate()
        .fold((0, relative_probs[0]), |(best_i, best_x), (i, &x)| {
            if x > best_x { (i, x) } else { (best_i, best_x) }
        });

    if temperature <= 1e-4 || max_value <= 0.0 {
        return best_index;
    }

    // raise to the power in log space, relative to the maximum, so that
    // nothing overflows for small temperatures
    let log_max_value = max_value.ln();
    let inv_temperature = 1.0 / temperature;
    let mut cum = Vec::with_capacity(relative_probs.len());
    let mut cum_total = 0.0;

    for &x in relative_probs {
        if x > 0.0 {
            cum_total += ((x.ln() - log_max_value) * inv_temperature).exp();
        }

        cum.push(cum_total);
    }

    // the first element whose cumulative sum reaches `at`, skipping any zero
    // elements that share a cumulative sum with an earlier one
    let at = at * cum_total;

    relative_probs.iter()
        .zip(cum.iter())
        .position(|(&x, &c)| x > 0.0 && c >= at)
        .unwrap_or(best_index)
}
