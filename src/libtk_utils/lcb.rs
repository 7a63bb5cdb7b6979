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

/// The smallest effective sample size for which a lower confidence bound is
/// computed at all.
pub const MIN_VISITS_FOR_LCB: i64 = 3;

/// The number of pre-computed entries in a `NormToTTable`.
const TABLE_SIZE: usize = 512;

/// Returns an approximation of the quantile of the Student's t-distribution
/// with `n` degrees of freedom that corresponds to the quantile `z` of the
/// standard normal distribution.
///
/// # Arguments
///
/// * `z` - the normal quantile
/// * `n` - the degrees of freedom, must be larger than one
///
pub fn norm_to_t_approx(z: f64, n: f64) -> f64 {
    debug_assert!(n > 1.0);

    (n * (z * z * (n - 1.5) / ((n - 1.0) * (n - 1.0))).exp() - n).sqrt()
}

/// Lookup table of `norm_to_t_approx(z, n)` for a fixed `z` and every integer
/// `n` starting at `MIN_VISITS_FOR_LCB`.
#[derive(Clone, Debug)]
pub struct NormToTTable {
    z: f64,
    table: Vec<f64>,
}

impl NormToTTable {
    pub fn new(z: f64) -> Self {
        let table = (0..TABLE_SIZE)
            .map(|i| norm_to_t_approx(z, (i as i64 + MIN_VISITS_FOR_LCB) as f64))
            .collect();

        Self { z, table }
    }

    /// Returns the normal quantile this table was built for.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Returns the t-quantile multiplier for the given (rounded) effective
    /// sample size. Sample sizes past the end of the table are clamped to the
    /// last entry.
    ///
    /// # Arguments
    ///
    /// * `num_visits` - must be at least `MIN_VISITS_FOR_LCB`
    ///
    pub fn get(&self, num_visits: i64) -> f64 {
        let idx = num_visits - MIN_VISITS_FOR_LCB;
        assert!(idx >= 0, "effective sample size {} is below the LCB minimum", num_visits);

        self.table[(idx as usize).min(self.table.len() - 1)]
    }
}
