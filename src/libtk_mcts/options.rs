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

use serde::Deserialize;

use tk_utils::config::{self, ConfigError};

/// Tuning parameters of move selection and reporting. Every field has a
/// default, so a configuration only needs to mention what it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /* -------- Lower confidence bound -------- */

    /// The smallest selection value for a child to be considered for the
    /// best lower confidence bound.
    pub min_visits_for_lcb: f64,
    /// The smallest selection value, relative to the most weighted child,
    /// for a child to be considered for the best lower confidence bound.
    pub min_visit_prop_for_lcb: f64,
    /// The number of standard deviations of the lower confidence bound.
    pub lcb_stdevs: f64,
    pub use_lcb_for_selection: bool,
    /// Also allow the first child to receive the lower confidence bound
    /// bonus.
    pub use_non_buggy_lcb: bool,

    /* -------- Move choice -------- */

    pub chosen_move_subtract: f64,
    pub chosen_move_prune: f64,
    pub chosen_move_temperature: f64,
    pub chosen_move_temperature_early: f64,
    pub chosen_move_temperature_halflife: f64,
    /// If present, the temperature as a piecewise linear function of the move
    /// number, which replaces the early and halflife parameters.
    pub chosen_move_temperature_schedule: Option<Vec<(i32, f32)>>,

    pub fill_dame_before_pass: bool,
    pub root_symmetry_pruning: bool,
    pub use_noise_pruning: bool,

    /* -------- Utility -------- */

    pub win_loss_utility_factor: f64,
    pub static_score_utility_factor: f64,
    pub dynamic_score_utility_factor: f64,
    pub dynamic_score_center_scale: f64,
    pub no_result_utility_for_white: f64,

    /* -------- Exploration -------- */

    pub cpuct_exploration: f64,
    pub cpuct_exploration_log: f64,
    pub cpuct_exploration_base: f64,
    pub cpuct_utility_stdev_prior: f64,
    pub cpuct_utility_stdev_prior_weight: f64,
    pub cpuct_utility_stdev_scale: f64,

    /* -------- First play urgency -------- */

    pub fpu_reduction_max: f64,
    pub root_fpu_reduction_max: f64,
    pub fpu_loss_prop: f64,
    pub root_fpu_loss_prop: f64,
    pub fpu_parent_weight_by_visited_policy: bool,
    pub fpu_parent_weight_by_visited_policy_pow: f64,
    pub fpu_parent_weight: f64,

    /* -------- Weighting of children -------- */

    pub noise_prune_utility_scale: f64,
    pub noise_pruning_cap: f64,
    pub value_weight_exponent: f64,

    pub use_uncertainty: bool,
    pub uncertainty_coeff: f64,
    pub uncertainty_exponent: f64,
    pub uncertainty_max_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_visits_for_lcb: 3.0,
            min_visit_prop_for_lcb: 0.15,
            lcb_stdevs: 5.0,
            use_lcb_for_selection: true,
            use_non_buggy_lcb: true,

            chosen_move_subtract: 0.0,
            chosen_move_prune: 1.0,
            chosen_move_temperature: 0.1,
            chosen_move_temperature_early: 0.5,
            chosen_move_temperature_halflife: 19.0,
            chosen_move_temperature_schedule: None,

            fill_dame_before_pass: true,
            root_symmetry_pruning: true,
            use_noise_pruning: true,

            win_loss_utility_factor: 1.0,
            static_score_utility_factor: 0.1,
            dynamic_score_utility_factor: 0.3,
            dynamic_score_center_scale: 0.75,
            no_result_utility_for_white: 0.0,

            cpuct_exploration: 1.0,
            cpuct_exploration_log: 0.45,
            cpuct_exploration_base: 500.0,
            cpuct_utility_stdev_prior: 0.40,
            cpuct_utility_stdev_prior_weight: 2.0,
            cpuct_utility_stdev_scale: 0.85,

            fpu_reduction_max: 0.2,
            root_fpu_reduction_max: 0.1,
            fpu_loss_prop: 0.0,
            root_fpu_loss_prop: 0.0,
            fpu_parent_weight_by_visited_policy: true,
            fpu_parent_weight_by_visited_policy_pow: 2.0,
            fpu_parent_weight: 0.0,

            noise_prune_utility_scale: 0.15,
            noise_pruning_cap: 1e50,
            value_weight_exponent: 0.25,

            use_uncertainty: false,
            uncertainty_coeff: 0.25,
            uncertainty_exponent: 1.0,
            uncertainty_max_weight: 8.0,
        }
    }
}

macro_rules! override_from_env {
    ($options:ident, $($name:literal => $field:ident),* $(,)?) => {
        $(
            if let Some(value) = config::get_env($name) {
                $options.$field = value;
            }
        )*
    };
}

impl SearchOptions {
    /// Returns the options described by the given JSON object, with every
    /// missing field set to its default.
    ///
    /// # Arguments
    ///
    /// * `json` -
    ///
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: SearchOptions = serde_json::from_str(json)?;

        options.validate()?;
        Ok(options)
    }

    /// Returns the default options, with any overrides present in the
    /// environment applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();

        override_from_env!(options,
            "MIN_VISITS_FOR_LCB" => min_visits_for_lcb,
            "MIN_VISIT_PROP_FOR_LCB" => min_visit_prop_for_lcb,
            "LCB_STDEVS" => lcb_stdevs,
            "USE_LCB_FOR_SELECTION" => use_lcb_for_selection,
            "CHOSEN_MOVE_SUBTRACT" => chosen_move_subtract,
            "CHOSEN_MOVE_PRUNE" => chosen_move_prune,
            "CHOSEN_MOVE_TEMPERATURE_EARLY" => chosen_move_temperature_early,
            "CHOSEN_MOVE_TEMPERATURE_HALFLIFE" => chosen_move_temperature_halflife,
            "ROOT_SYMMETRY_PRUNING" => root_symmetry_pruning,
            "USE_NOISE_PRUNING" => use_noise_pruning,
            "CPUCT_EXPLORATION" => cpuct_exploration,
            "FPU_REDUCTION_MAX" => fpu_reduction_max,
            "ROOT_FPU_REDUCTION_MAX" => root_fpu_reduction_max,
            "VALUE_WEIGHT_EXPONENT" => value_weight_exponent,
            "USE_UNCERTAINTY" => use_uncertainty,
        );

        // the temperature may either be a constant, or a schedule keyed by
        // the move number
        if let Some(points) = config::get_intp_list("CHOSEN_MOVE_TEMPERATURE")? {
            if points.len() == 1 {
                options.chosen_move_temperature = points[0].1 as f64;
            } else {
                options.chosen_move_temperature_schedule = Some(points);
            }
        }

        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, value: f64| ConfigError::InvalidValue {
            name: name.into(),
            value: value.to_string()
        };

        if !(self.lcb_stdevs > 0.0) {
            return Err(invalid("lcb_stdevs", self.lcb_stdevs));
        }
        if !(self.cpuct_utility_stdev_prior > 0.0) {
            return Err(invalid("cpuct_utility_stdev_prior", self.cpuct_utility_stdev_prior));
        }
        if !(self.cpuct_exploration_base > 0.0) {
            return Err(invalid("cpuct_exploration_base", self.cpuct_exploration_base));
        }
        if !(self.chosen_move_temperature_halflife > 0.0) {
            return Err(invalid("chosen_move_temperature_halflife", self.chosen_move_temperature_halflife));
        }
        if !(self.uncertainty_max_weight > 0.0) {
            return Err(invalid("uncertainty_max_weight", self.uncertainty_max_weight));
        }

        Ok(())
    }

    /// Returns the largest magnitude that a utility can have.
    pub fn utility_radius(&self) -> f64 {
        self.win_loss_utility_factor + self.static_score_utility_factor + self.dynamic_score_utility_factor
    }
}
