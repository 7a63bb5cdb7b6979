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

use std::env;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

/// Errors produced while reading configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

lazy_static! {
    /// Whether to include the second moments and the short-term errors of
    /// every node when printing a search tree.
    pub static ref VERBOSE: bool = has_opt("--verbose");

    /// The default maximum length of the principal variations that are
    /// included in analysis reports.
    pub static ref ANALYSIS_PV_LEN: usize = get_opt("--analysis-pv-len").unwrap_or(15);

    /// The minimum weight of a child for it to contribute to the averaged
    /// ownership of its parent.
    pub static ref OWNERSHIP_MIN_WEIGHT: f64 = get_env("OWNERSHIP_MIN_WEIGHT").unwrap_or(0.0);
}

/// Returns a description of the process-wide configuration.
pub fn get_description() -> String {
    vec! [
        format!("VERBOSE {}", *VERBOSE),
        format!("ANALYSIS_PV_LEN {}", *ANALYSIS_PV_LEN),
        format!("OWNERSHIP_MIN_WEIGHT {}", *OWNERSHIP_MIN_WEIGHT),
    ].join("\n")
}

fn args() -> ::std::vec::IntoIter<String> {
    let mut out = env::args().collect::<Vec<_>>();

    if let Ok(tk_opts) = env::var("TK_OPTS") {
        for opt in tk_opts.split_whitespace() {
            out.push(opt.to_string());
        }
    }

    out.into_iter()
}

/// Returns true if any command-line argument with the given name is present.
///
/// # Arguments
///
/// * `name` - the command-line arguments to check for
///
pub fn has_opt(name: &str) -> bool {
    args().skip(1).any(|arg| arg == name)
}

pub fn get_opt<T: FromStr>(name: &str) -> Option<T> {
    args().skip(1).zip(args().skip(2))
        .filter_map(|(arg, value)| {
            if arg == name {
                T::from_str(&value).ok()
            } else {
                None
            }
        })
        .next()
}

pub fn get_env<T: FromStr>(name: &str) -> Option<T> {
    match env::var(name) {
        Ok(value) => T::from_str(&value).ok(),
        _ => None
    }
}

/// Parse a list of interpolation points on the form `x0,y0:x1,y1:...`, or a
/// single constant value, into a list of points sorted by `x`.
///
/// # Arguments
///
/// * `s` - the string to parse
///
pub fn parse_intp_list(s: &str) -> Result<Vec<(i32, f32)>, ConfigError> {
    lazy_static! {
        static ref POINT: Regex = Regex::new(r"(-?[0-9]+),(-?[0-9\.]+):?").expect("valid interpolation regex");
    }

    let invalid = || ConfigError::InvalidValue { name: "interpolation list".into(), value: s.into() };
    let mut out = POINT.captures_iter(s)
        .map(|point| {
            let x = point[1].parse::<i32>().map_err(|_| invalid())?;
            let y = point[2].parse::<f32>().map_err(|_| invalid())?;

            Ok((x, y))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    out.sort_by_key(|p| p.0);

    if out.is_empty() {
        s.trim().parse::<f32>()
            .map(|v| vec! [(0, v)])
            .map_err(|_| invalid())
    } else {
        Ok(out)
    }
}

/// Returns the interpolation list stored in the environment variable with
/// the given name, or `None` if the variable is not set.
///
/// # Arguments
///
/// * `name` - the name of the environment variable
///
pub fn get_intp_list(name: &str) -> Result<Option<Vec<(i32, f32)>>, ConfigError> {
    get_env::<String>(name)
        .map(|s| parse_intp_list(&s))
        .transpose()
}

/// Returns the piecewise linear interpolation of `points` at `x`. Values
/// outside of the range of `points` are clamped to the nearest end point.
///
/// # Arguments
///
/// * `points` - the interpolation points, sorted by their first element
/// * `x` -
///
pub fn get_intp_value(points: &[(i32, f32)], x: i32) -> f32 {
    if let Some(i) = points.iter().position(|e| e.0 >= x) {
        let x0 = &points[if i == 0 { 0 } else { i-1 }];
        let x1 = &points[i];
        let a = if x0.0 >= x1.0 {
            0.5
        } else {
            (x - x0.0) as f32 / (x1.0 - x0.0) as f32
        };

        (1.0 - a) * x0.1 + a * x1.1
    } else {
        points.last().map(|p| p.1).unwrap_or(0.0)
    }
}
