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

use std::f64::consts::PI;

/// Round `x` to the nearest multiple of `1 / inverse_scale`.
///
/// # Arguments
///
/// * `x` -
/// * `inverse_scale` -
///
pub fn round_static(x: f64, inverse_scale: f64) -> f64 {
    (x * inverse_scale).round() / inverse_scale
}

/// Round `x` so that it keeps about `precision` significant digits after
/// its leading digit. Values that are (nearly) zero are returned as-is.
///
/// # Arguments
///
/// * `x` -
/// * `precision` -
///
pub fn round_dynamic(x: f64, precision: i32) -> f64 {
    let abs_x = x.abs();
    if abs_x <= 1e-60 || !abs_x.is_finite() {
        return x;
    }

    let order_of_magnitude = abs_x.log10().floor() as i32;
    let rounding_magnitude = order_of_magnitude - precision;

    if rounding_magnitude >= 0 {
        x.round()
    } else {
        round_static(x, 10.0f64.powi(-rounding_magnitude))
    }
}

/// Returns the cumulative distribution function of the Student's
/// t-distribution with three degrees of freedom, which has a closed form.
pub fn t3_cdf(t: f64) -> f64 {
    let sqrt3 = 3.0f64.sqrt();
    let u = t / sqrt3;

    0.5 + (u / (1.0 + u * u) + u.atan()) / PI
}
