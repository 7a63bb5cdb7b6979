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

//! Conversion of score distributions into utilities, based on a smooth
//! saturating function of the score. The expectation of that function over a
//! normally distributed score has no closed form, so it is integrated ahead
//! of time into a table indexed by mean and standard deviation.

use std::f64::consts::{FRAC_2_PI, FRAC_PI_2};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The board length that the table is computed for, scores on other boards
/// are rescaled to it.
const ASSUMED_BOARD_LEN: i64 = 19;

/// How far past the largest possible score the table reaches.
const EXTRA_SCORE_RADIUS: i64 = 60;

const MEAN_RADIUS: i64 = ASSUMED_BOARD_LEN * ASSUMED_BOARD_LEN + EXTRA_SCORE_RADIUS;
const MEAN_LEN: i64 = 2 * MEAN_RADIUS;
const STDEV_LEN: i64 = ASSUMED_BOARD_LEN * ASSUMED_BOARD_LEN + EXTRA_SCORE_RADIUS;

/// The number of integration steps per point, and per standard deviation.
/// Must be even.
const STEPS_PER_UNIT: i64 = 10;

/// The number of standard deviations on either side of the mean that are
/// integrated over.
const BOUND_STDEVS: i64 = 5;

/// Returns the utility of the given final score for white.
///
/// # Arguments
///
/// * `white_score` - the final score, white minus black
/// * `center` - the score that has zero utility
/// * `scale` - how quickly the utility saturates, relative to the board size
/// * `sqrt_board_area` -
///
pub fn white_score_value_of_score_smooth(white_score: f64, center: f64, scale: f64, sqrt_board_area: f64) -> f64 {
    ((white_score - center) / (scale * sqrt_board_area)).atan() * FRAC_2_PI
}

/// Returns the derivative of `white_score_value_of_score_smooth` with respect
/// to the score.
pub fn white_d_score_value_d_score_smooth(white_score: f64, center: f64, scale: f64, sqrt_board_area: f64) -> f64 {
    let adjusted_score = white_score - center;
    let scale_factor = scale * sqrt_board_area;

    scale_factor / (scale_factor * scale_factor + adjusted_score * adjusted_score) * FRAC_2_PI
}

/// Returns the score whose utility is the given value, the inverse of
/// `white_score_value_of_score_smooth`. Values at (or past) the saturation
/// points are clamped to a very large score.
pub fn approx_white_score_of_score_value_smooth(score_value: f64, center: f64, scale: f64, sqrt_board_area: f64) -> f64 {
    debug_assert!(score_value >= -1.0 && score_value <= 1.0);

    let unscaled = (score_value * FRAC_PI_2).tan().max(-1e6).min(1e6);

    unscaled * (scale * sqrt_board_area) + center
}

/// The expected utility of a normally distributed score, tabulated by the
/// (rescaled) mean and standard deviation of the score.
pub struct ScoreValueTable {
    expected: Vec<f64>
}

impl ScoreValueTable {
    pub fn new() -> Self {
        let started_at = Instant::now();

        // the normal kernel, sampled at every step within the bounds
        let min_stdev_steps = -BOUND_STDEVS * STEPS_PER_UNIT;
        let max_stdev_steps = -min_stdev_steps;
        let normal_pdf = (min_stdev_steps..=max_stdev_steps)
            .map(|i| {
                let x = i as f64 / STEPS_PER_UNIT as f64;

                (-0.5 * x * x).exp()
            })
            .collect::<Vec<_>>();

        // the utility at every step that the integration can reach
        let min_sv_steps = -(MEAN_RADIUS * STEPS_PER_UNIT + STEPS_PER_UNIT / 2 + BOUND_STDEVS * STDEV_LEN * STEPS_PER_UNIT);
        let max_sv_steps = -min_sv_steps;
        let sv_precomp = (min_sv_steps..=max_sv_steps)
            .map(|i| {
                let mean = i as f64 / STEPS_PER_UNIT as f64;

                white_score_value_of_score_smooth(mean, 0.0, 1.0, ASSUMED_BOARD_LEN as f64)
            })
            .collect::<Vec<_>>();

        let mut expected = Vec::with_capacity((MEAN_LEN * STDEV_LEN) as usize);

        for mean_idx in 0..MEAN_LEN {
            let mean_steps = (mean_idx - MEAN_RADIUS) * STEPS_PER_UNIT - STEPS_PER_UNIT / 2;

            for stdev_idx in 0..STDEV_LEN {
                let mut w_sum = 0.0;
                let mut wsv_sum = 0.0;

                for (i, &w) in (min_stdev_steps..=max_stdev_steps).zip(normal_pdf.iter()) {
                    let x_steps = mean_steps + stdev_idx * i;
                    debug_assert!(x_steps >= min_sv_steps && x_steps <= max_sv_steps);

                    w_sum += w;
                    wsv_sum += w * sv_precomp[(x_steps - min_sv_steps) as usize];
                }

                expected.push(wsv_sum / w_sum);
            }
        }

        debug!(
            entries = expected.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "built score value table"
        );

        Self { expected }
    }

    #[inline]
    fn at(&self, mean_idx: i64, stdev_idx: i64) -> f64 {
        self.expected[(mean_idx * STDEV_LEN + stdev_idx) as usize]
    }

    /// Returns the expected utility for white of a normally distributed
    /// final score.
    ///
    /// # Arguments
    ///
    /// * `white_score_mean` -
    /// * `white_score_stdev` -
    /// * `center` - the score that has zero utility
    /// * `scale` - how quickly the utility saturates, relative to the board size
    /// * `sqrt_board_area` -
    ///
    pub fn expected_white_score_value(
        &self,
        white_score_mean: f64,
        white_score_stdev: f64,
        center: f64,
        scale: f64,
        sqrt_board_area: f64
    ) -> f64
    {
        let scale_factor = ASSUMED_BOARD_LEN as f64 / (scale * sqrt_board_area);
        let mean_scaled = (white_score_mean - center) * scale_factor;
        let stdev_scaled = white_score_stdev * scale_factor;

        let mean_rounded = mean_scaled.round();
        let stdev_floored = stdev_scaled.floor();
        let mut mean_idx_0 = mean_rounded as i64 + MEAN_RADIUS;
        let mut mean_idx_1 = mean_idx_0 + 1;
        let mut stdev_idx_0 = stdev_floored as i64;
        let mut stdev_idx_1 = stdev_idx_0 + 1;

        if mean_idx_0 < 0 {
            mean_idx_0 = 0;
            mean_idx_1 = 0;
        }
        if mean_idx_1 >= MEAN_LEN {
            mean_idx_0 = MEAN_LEN - 1;
            mean_idx_1 = MEAN_LEN - 1;
        }
        assert!(stdev_idx_0 >= 0, "negative score stdev {}", white_score_stdev);
        if stdev_idx_1 >= STDEV_LEN {
            stdev_idx_0 = STDEV_LEN - 1;
            stdev_idx_1 = STDEV_LEN - 1;
        }

        let lambda_mean = mean_scaled - mean_rounded + 0.5;
        let lambda_stdev = stdev_scaled - stdev_floored;

        let a00 = self.at(mean_idx_0, stdev_idx_0);
        let a01 = self.at(mean_idx_0, stdev_idx_1);
        let a10 = self.at(mean_idx_1, stdev_idx_0);
        let a11 = self.at(mean_idx_1, stdev_idx_1);

        let b0 = a00 + lambda_stdev * (a01 - a00);
        let b1 = a10 + lambda_stdev * (a11 - a10);

        b0 + lambda_mean * (b1 - b0)
    }
}

impl Default for ScoreValueTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A place for a `ScoreValueTable` with an explicit lifecycle, it must be
/// initialized before it is read and may be freed afterwards.
pub struct TableSlot {
    inner: RwLock<Option<Arc<ScoreValueTable>>>
}

impl TableSlot {
    pub fn new() -> Self {
        Self { inner: RwLock::new(None) }
    }

    /// Build the table.
    ///
    /// # Panics
    ///
    /// If the table has already been built.
    pub fn init(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        assert!(inner.is_none(), "score value table is already initialized");

        *inner = Some(Arc::new(ScoreValueTable::new()));
    }

    /// Build the table, unless it has already been built.
    pub fn ensure(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if inner.is_none() {
            *inner = Some(Arc::new(ScoreValueTable::new()));
        }
    }

    /// Release the table, any reader that still holds on to it keeps it
    /// alive until it is done.
    pub fn free(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if inner.take().is_some() {
            debug!("freed score value table");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Returns the table.
    ///
    /// # Panics
    ///
    /// If the table has not been initialized.
    pub fn get(&self) -> Arc<ScoreValueTable> {
        match *self.inner.read().unwrap_or_else(|e| e.into_inner()) {
            Some(ref table) => table.clone(),
            None => panic!("score value table is not initialized")
        }
    }
}

impl Default for TableSlot {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref TABLES: TableSlot = TableSlot::new();
}

/// Build the process-wide score value table.
///
/// # Panics
///
/// If the table has already been built.
pub fn init_tables() {
    TABLES.init()
}

/// Build the process-wide score value table if it has not been built yet.
pub fn ensure_tables() {
    if !TABLES.is_initialized() {
        TABLES.ensure()
    }
}

pub fn free_tables() {
    TABLES.free()
}

pub fn tables_initialized() -> bool {
    TABLES.is_initialized()
}

/// Returns the expected utility for white of a normally distributed final
/// score using the process-wide table.
///
/// # Panics
///
/// If the table has not been initialized.
pub fn expected_white_score_value(
    white_score_mean: f64,
    white_score_stdev: f64,
    center: f64,
    scale: f64,
    sqrt_board_area: f64
) -> f64
{
    TABLES.get().expected_white_score_value(white_score_mean, white_score_stdev, center, scale, sqrt_board_area)
}

/// Returns the standard deviation of a score distribution from its first two
/// moments.
pub fn get_score_stdev(score_mean: f64, score_mean_sq: f64) -> f64 {
    (score_mean_sq - score_mean * score_mean).max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    lazy_static! {
        static ref TABLE: ScoreValueTable = ScoreValueTable::new();
    }

    #[test]
    fn smooth_is_odd_and_bounded() {
        for &s in &[0.5, 3.0, 40.0, 1000.0] {
            let v = white_score_value_of_score_smooth(s, 0.0, 1.0, 15.0);

            assert!(v > 0.0 && v < 1.0);
            assert_relative_eq!(white_score_value_of_score_smooth(-s, 0.0, 1.0, 15.0), -v);
        }
    }

    #[test]
    fn derivative_matches_difference() {
        let h = 1e-5;
        let (center, scale, area) = (2.0, 0.75, 15.0);

        for &s in &[-20.0, 0.0, 7.5] {
            let numeric = (
                white_score_value_of_score_smooth(s + h, center, scale, area) -
                white_score_value_of_score_smooth(s - h, center, scale, area)
            ) / (2.0 * h);

            assert_relative_eq!(white_d_score_value_d_score_smooth(s, center, scale, area), numeric, epsilon = 1e-8);
        }
    }

    #[test]
    fn inverse_round_trip() {
        for &s in &[-30.0, -1.0, 0.0, 4.5, 80.0] {
            let v = white_score_value_of_score_smooth(s, 1.5, 0.75, 19.0);

            assert_relative_eq!(approx_white_score_of_score_value_smooth(v, 1.5, 0.75, 19.0), s, epsilon = 1e-6);
        }
    }

    #[test]
    fn inverse_saturates() {
        assert_relative_eq!(approx_white_score_of_score_value_smooth(1.0, 0.0, 1.0, 1.0), 1e6);
        assert_relative_eq!(approx_white_score_of_score_value_smooth(-1.0, 0.0, 1.0, 1.0), -1e6);
    }

    #[test]
    fn zero_stdev_converges_to_closed_form() {
        for &mean in &[-50.0, -12.3, -0.5, 0.0, 2.0, 7.25, 33.0, 200.0] {
            let expected = white_score_value_of_score_smooth(mean, 0.0, 1.0, 19.0);
            let actual = TABLE.expected_white_score_value(mean, 0.0, 0.0, 1.0, 19.0);

            assert_relative_eq!(actual, expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn uncertainty_shrinks_towards_zero() {
        let certain = TABLE.expected_white_score_value(10.0, 0.0, 0.0, 1.0, 19.0);
        let uncertain = TABLE.expected_white_score_value(10.0, 30.0, 0.0, 1.0, 19.0);

        assert!(uncertain > 0.0);
        assert!(uncertain < certain);
    }

    #[test]
    fn symmetric_around_center() {
        let a = TABLE.expected_white_score_value(3.0 + 4.0, 5.0, 3.0, 0.75, 15.0);
        let b = TABLE.expected_white_score_value(3.0 - 4.0, 5.0, 3.0, 0.75, 15.0);

        assert_relative_eq!(a, -b, epsilon = 1e-9);
    }

    #[test]
    fn clamps_extreme_inputs() {
        let far = TABLE.expected_white_score_value(1e9, 1e9, 0.0, 1.0, 19.0);

        assert!(far.is_finite());
        assert!(far > 0.0 && far <= 1.0);
    }

    #[test]
    fn private_slot_lifecycle() {
        let slot = TableSlot::new();
        assert!(!slot.is_initialized());

        slot.init();
        assert!(slot.is_initialized());

        let held = slot.get();
        slot.free();
        assert!(!slot.is_initialized());

        // a table that was handed out remains usable after the slot is freed
        assert!(held.expected_white_score_value(5.0, 1.0, 0.0, 1.0, 19.0) > 0.0);

        slot.ensure();
        slot.ensure();
        assert!(slot.is_initialized());
    }

    #[test]
    #[should_panic]
    fn double_init() {
        let slot = TableSlot::new();

        slot.init();
        slot.init();
    }

    #[test]
    #[should_panic]
    fn read_uninitialized() {
        TableSlot::new().get();
    }

    #[test]
    fn score_stdev() {
        assert_relative_eq!(get_score_stdev(2.0, 13.0), 3.0);
        assert_eq!(get_score_stdev(2.0, 3.0), 0.0);
    }
}
