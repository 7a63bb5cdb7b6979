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

use tk_go::{nn_pos, Color, Point};
use tk_utils::config::VERBOSE;

use crate::analysis::{AnalysisData, ParentValues};
use crate::node::SearchNode;
use crate::search::Search;

/// Which parts of the search tree to print, and how much detail to include.
#[derive(Clone, Debug, PartialEq)]
pub struct PrintTreeOptions {
    /// How many levels to expand below the end of `branch`.
    pub max_depth: usize,
    pub max_children_to_show: usize,
    pub min_visits_to_show: i64,
    pub min_visits_to_expand: i64,
    /// The minimum visits to show a child, relative to the visits of the
    /// node the printing started at.
    pub min_visits_prop_to_show: f64,
    pub min_visits_prop_to_expand: f64,
    /// The length of the principal variation printed for each node.
    pub max_pv_depth: usize,
    /// Print the second moments and weight sums of each node.
    pub print_sqs: bool,
    pub print_avg_shortterm_error: bool,
    /// Follow these moves, printing only the nodes along them, before
    /// expanding the tree.
    pub branch: Vec<Point>,
}

impl Default for PrintTreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_children_to_show: 100_000,
            min_visits_to_show: 1,
            min_visits_to_expand: 1,
            min_visits_prop_to_show: 0.0,
            min_visits_prop_to_expand: 0.0,
            max_pv_depth: 7,
            print_sqs: *VERBOSE,
            print_avg_shortterm_error: *VERBOSE,
            branch: vec! [],
        }
    }
}

/// Wrapper that prints the ownership of the network at the root within a
/// `write!` macro.
pub struct RootOwnershipMap<'a> {
    search: &'a Search,
    perspective: Color,
}

impl<'a> fmt::Display for RootOwnershipMap<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let nn_output = match self.search.root().and_then(|root| root.nn_output()) {
            Some(nn_output) => nn_output,
            None => return Ok(())
        };
        let owner_map = match nn_output.white_owner_map.as_deref() {
            Some(owner_map) => owner_map,
            None => return Ok(())
        };
        let board = self.search.root_board();

        for y in 0..board.y_size() {
            for x in 0..board.x_size() {
                let own = owner_map[nn_pos::xy_to_pos(x, y, nn_output.nn_x_len)] as f64;

                write!(fmt, "{:6.1} ", self.perspective.sign(own) * 100.0)?;
            }
            writeln!(fmt)?;
        }
        writeln!(fmt)
    }
}

/// Wrapper that prints the policy at the root within a `write!` macro.
pub struct RootPolicyMap<'a> {
    search: &'a Search,
}

impl<'a> fmt::Display for RootPolicyMap<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let nn_output = match self.search.root().and_then(|root| root.nn_output()) {
            Some(nn_output) => nn_output,
            None => return Ok(())
        };
        let policy_probs = nn_output.policy_probs_maybe_noised();
        let board = self.search.root_board();

        for y in 0..board.y_size() {
            for x in 0..board.x_size() {
                let policy = policy_probs[nn_pos::xy_to_pos(x, y, nn_output.nn_x_len)] as f64;

                write!(fmt, "{:6.1} ", policy * 100.0)?;
            }
            writeln!(fmt)?;
        }
        writeln!(fmt)
    }
}

/// Wrapper that prints a search tree, one node per line, within a `write!`
/// macro.
pub struct PrintTree<'a> {
    search: &'a Search,
    node: &'a SearchNode,
    options: &'a PrintTreeOptions,
    perspective: Color,
}

impl<'a> fmt::Display for PrintTree<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let point = if self.search.is_root(self.node) { Point::NULL } else { self.node.prev_move() };
        let mut data = self.search.get_analysis_data_of_single_child(
            Some(self.node),
            point,
            f64::NAN,
            0.0,
            &ParentValues::default(),
            self.options.max_pv_depth
        );
        data.weight_factor = f64::NAN;

        let mut prefix = String::new();

        self.search.write_tree(fmt, self.node, self.options, &mut prefix, 0, 0, &data, self.perspective)
    }
}

impl Search {
    /// Returns the given principal variation as text, skipping `NULL`
    /// entries.
    pub fn pv_to_string(&self, pv: &[Point]) -> String {
        let board = self.root_board();

        pv.iter()
            .filter(|point| !point.is_null())
            .map(|&point| board.vertex(point).to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns the principal variation below `node` as text.
    pub fn print_pv(&self, node: &SearchNode, max_depth: usize) -> String {
        self.pv_to_string(&self.get_pv(node, max_depth))
    }

    /// Returns the principal variation below `node` that starts with
    /// `point` as text, or an empty string if there is no such child.
    pub fn print_pv_for_move(&self, node: &SearchNode, point: Point, max_depth: usize) -> String {
        let mut pv = vec! [];
        let mut pv_visits = vec! [];

        self.append_pv_for_move(&mut pv, &mut pv_visits, node, point, max_depth);
        self.pv_to_string(&pv)
    }

    /// Returns a grid of the ownership of the network at the root in
    /// percent, from the perspective of `perspective` or the player to move.
    pub fn print_root_ownership_map(&self, perspective: Option<Color>) -> RootOwnershipMap<'_> {
        RootOwnershipMap {
            search: self,
            perspective: perspective.unwrap_or_else(|| self.root_pla()),
        }
    }

    /// Returns a grid of the policy at the root in percent.
    pub fn print_root_policy_map(&self) -> RootPolicyMap<'_> {
        RootPolicyMap { search: self }
    }

    /// Returns a printable view of the tree below `node`.
    ///
    /// # Arguments
    ///
    /// * `node` -
    /// * `options` - which nodes to print
    /// * `perspective` - the player whose perspective values are printed
    ///   from, or `None` for the player to move at `node`
    ///
    pub fn print_tree<'a>(
        &'a self,
        node: &'a SearchNode,
        options: &'a PrintTreeOptions,
        perspective: Option<Color>
    ) -> PrintTree<'a>
    {
        PrintTree {
            search: self,
            node,
            options,
            perspective: perspective.unwrap_or_else(|| node.next_pla()),
        }
    }

    fn write_tree(
        &self,
        out: &mut fmt::Formatter,
        node: &SearchNode,
        options: &PrintTreeOptions,
        prefix: &mut String,
        orig_visits: i64,
        depth: usize,
        data: &AnalysisData,
        perspective: Color
    ) -> fmt::Result
    {
        let factor = perspective.sign(1.0);
        let orig_visits = if depth == 0 { data.num_visits } else { orig_visits };

        write!(out, "{}: ", prefix)?;

        if data.num_visits > 0 {
            write!(out, "T {:6.2}c ", factor * data.utility * 100.0)?;
            write!(out, "W {:6.2}c ", factor * data.result_utility * 100.0)?;
            write!(out, "S {:6.2}c ({:+5.1} L {:+5.1}) ",
                factor * data.score_utility * 100.0,
                factor * data.score_mean,
                factor * data.lead
            )?;
        }
        if depth > 0 && !data.lcb.is_nan() {
            write!(out, "LCB {:7.2}c ", factor * data.lcb * 100.0)?;
        }
        if !data.policy_prior.is_nan() {
            write!(out, "P {:5.2}% ", data.policy_prior * 100.0)?;
        }
        if !data.weight_factor.is_nan() {
            write!(out, "WF {:5.1} ", data.weight_factor)?;
        }
        if data.play_selection_value >= 0.0 && depth > 0 {
            write!(out, "PSV {:7.0} ", data.play_selection_value)?;
        }
        if options.print_sqs {
            write!(out, "SMSQ {:5.1} USQ {:7.5} W {:6.2} WSQ {:8.2} ",
                data.score_mean_sq_avg,
                data.utility_sq_avg,
                data.weight_sum,
                data.weight_sq_sum
            )?;
        }
        if options.print_avg_shortterm_error {
            let (wl_error, score_error) = self.get_average_shortterm_wl_and_score_error_helper(node);

            write!(out, "STWL {:6.2}c STS {:5.1} ", wl_error, score_error)?;
        }

        writeln!(out, "N {:7}  --  {}", data.num_visits, self.pv_to_string(&data.pv))?;

        let branch_len = options.branch.len();

        if depth >= branch_len {
            if depth >= options.max_depth + branch_len
                || data.num_visits < options.min_visits_to_expand
                || (data.num_visits as f64) < orig_visits as f64 * options.min_visits_prop_to_expand
            {
                return Ok(());
            }
        }
        if depth == branch_len {
            writeln!(out, "---{}({})---", node.next_pla(), if node.next_pla() == perspective { "^" } else { "v" })?;
        }

        let analysis_data = self.get_analysis_data(node, 0, true, options.max_pv_depth, false);
        let num_children = analysis_data.len();

        // keep every child up to the last one that passes the filter
        let mut last_index = num_children.saturating_sub(1);

        while last_index > 0 {
            let visits = analysis_data[last_index].num_visits;

            if visits >= options.min_visits_to_show && visits as f64 >= orig_visits as f64 * options.min_visits_prop_to_show {
                break;
            }

            last_index -= 1;
        }

        let num_to_recurse = num_children.min(options.max_children_to_show).min(last_index + 1);

        for (i, child_data) in analysis_data.iter().enumerate() {
            let child = match child_data.node {
                Some(child) => child,
                None => continue
            };
            let point = child.prev_move();
            let is_expanded = if depth >= branch_len {
                i < num_to_recurse
            } else {
                point == options.branch[depth]
            };

            if !is_expanded {
                continue;
            }

            let old_len = prefix.len();

            if point.is_pass() {
                prefix.push_str("pss");
            } else {
                prefix.push_str(&self.root_board().vertex(point).to_string());
            }
            prefix.push(' ');
            while prefix.len() < old_len + 4 {
                prefix.push(' ');
            }

            self.write_tree(out, child, options, prefix, orig_visits, depth + 1, child_data, perspective)?;
            prefix.truncate(old_len);
        }

        Ok(())
    }
}
