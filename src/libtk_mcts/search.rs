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

use tk_go::symmetry::{self, Symmetry, SymmetryPruning};
use tk_go::{nn_pos, Board, Color, Point};
use tk_utils::config;
use tk_utils::lcb::NormToTTable;

use crate::error::SearchError;
use crate::node::SearchNode;
use crate::options::SearchOptions;
use crate::score_value;

/// The parts of the game history that the search statistics depend on.
#[derive(Clone, Debug, PartialEq)]
pub struct RootHistory {
    /// The number of moves played before the root position.
    pub move_number: usize,
    pub territory_scoring: bool,
    pub encore_phase: i32,
}

impl Default for RootHistory {
    fn default() -> Self {
        Self {
            move_number: 0,
            territory_scoring: false,
            encore_phase: 0,
        }
    }
}

/// The context that every statistic of a search tree is read through: the
/// root node, the root position, and the options.
///
/// The tree itself may be grown concurrently by another thread through the
/// atomic statistics of its nodes, every method here only reads.
pub struct Search {
    options: SearchOptions,
    norm_to_t: NormToTTable,

    root: Option<Box<SearchNode>>,
    root_board: Board,
    root_pla: Color,
    root_history: RootHistory,

    avoid_moves_black: Vec<i32>,
    avoid_moves_white: Vec<i32>,
    only_symmetries: Option<Vec<Symmetry>>,
    root_symmetries: SymmetryPruning,

    recent_score_center: f64,
    always_include_owner_map: bool,

    nn_x_len: usize,
    nn_y_len: usize,
}

impl Search {
    /// Returns a search without a root node for the given position. The
    /// score utility tables are built if they do not already exist.
    ///
    /// # Arguments
    ///
    /// * `root_board` - the position at the root
    /// * `root_pla` - the player to move at the root
    /// * `options` -
    ///
    pub fn new(root_board: Board, root_pla: Color, options: SearchOptions) -> Self {
        score_value::ensure_tables();
        debug!("new search with configuration\n{}", config::get_description());

        let root_symmetries = symmetry::mark_duplicate_move_locs(&root_board, root_pla, None, &[]);

        Self {
            norm_to_t: NormToTTable::new(options.lcb_stdevs),
            options,
            root: None,
            nn_x_len: root_board.x_size(),
            nn_y_len: root_board.y_size(),
            root_board,
            root_pla,
            root_history: RootHistory::default(),
            avoid_moves_black: vec! [],
            avoid_moves_white: vec! [],
            only_symmetries: None,
            root_symmetries,
            recent_score_center: 0.0,
            always_include_owner_map: false,
        }
    }

    /// Use network planes of the given size, which must be at least as large
    /// as the board.
    pub fn with_nn_size(mut self, nn_x_len: usize, nn_y_len: usize) -> Self {
        assert!(nn_x_len >= self.root_board.x_size() && nn_y_len >= self.root_board.y_size());

        self.nn_x_len = nn_x_len;
        self.nn_y_len = nn_y_len;
        self
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Replace the options, rebuilding the confidence bound table if the
    /// number of standard deviations changed.
    pub fn set_options(&mut self, options: SearchOptions) {
        if options.lcb_stdevs != self.norm_to_t.z() {
            self.norm_to_t = NormToTTable::new(options.lcb_stdevs);
        }

        self.options = options;
    }

    pub(crate) fn norm_to_t(&self) -> &NormToTTable {
        &self.norm_to_t
    }

    pub fn root(&self) -> Option<&SearchNode> {
        self.root.as_deref()
    }

    /// Install a new root node, dropping the previous tree.
    pub fn set_root(&mut self, root: SearchNode) {
        assert_eq!(root.next_pla(), self.root_pla, "root node is for the wrong player");

        self.root = Some(Box::new(root));
    }

    pub fn take_root(&mut self) -> Option<Box<SearchNode>> {
        self.root.take()
    }

    /// Returns true if the given node is the root of this search.
    pub fn is_root(&self, node: &SearchNode) -> bool {
        self.root.as_deref().map(|root| std::ptr::eq(root, node)).unwrap_or(false)
    }

    pub fn root_board(&self) -> &Board {
        &self.root_board
    }

    pub fn root_pla(&self) -> Color {
        self.root_pla
    }

    pub fn root_history(&self) -> &RootHistory {
        &self.root_history
    }

    pub fn set_root_history(&mut self, root_history: RootHistory) {
        self.root_history = root_history;
    }

    /// Forbid moves for the given player. Every point with a positive entry
    /// is avoided, and an empty vector removes all restrictions.
    ///
    /// # Arguments
    ///
    /// * `color` -
    /// * `avoid_moves` - one entry per point of the board, in row-major order
    ///
    pub fn set_avoid_moves(&mut self, color: Color, avoid_moves: Vec<i32>) {
        assert!(
            avoid_moves.is_empty() || avoid_moves.len() == self.root_board.x_size() * self.root_board.y_size(),
            "avoid moves must cover the whole board"
        );

        match color {
            Color::Black => self.avoid_moves_black = avoid_moves,
            Color::White => self.avoid_moves_white = avoid_moves,
        }

        self.refresh_root_symmetries();
    }

    pub fn avoid_moves(&self, color: Color) -> &[i32] {
        match color {
            Color::Black => &self.avoid_moves_black,
            Color::White => &self.avoid_moves_white,
        }
    }

    /// Returns true if `color` has been asked to not play at `point`.
    pub fn is_avoided(&self, color: Color, point: Point) -> bool {
        let avoid_moves = self.avoid_moves(color);

        !avoid_moves.is_empty()
            && self.root_board.is_on_board(point)
            && avoid_moves[self.root_board.index(point)] > 0
    }

    /// Restrict the root symmetries to the given subset, or lift the
    /// restriction with `None`.
    pub fn set_only_symmetries(&mut self, only_symmetries: Option<Vec<Symmetry>>) {
        self.only_symmetries = only_symmetries;
        self.refresh_root_symmetries();
    }

    pub fn root_symmetries(&self) -> &SymmetryPruning {
        &self.root_symmetries
    }

    fn refresh_root_symmetries(&mut self) {
        self.root_symmetries = symmetry::mark_duplicate_move_locs(
            &self.root_board,
            self.root_pla,
            self.only_symmetries.as_deref(),
            self.avoid_moves(self.root_pla)
        );
    }

    pub fn recent_score_center(&self) -> f64 {
        self.recent_score_center
    }

    pub fn set_recent_score_center(&mut self, recent_score_center: f64) {
        self.recent_score_center = recent_score_center;
    }

    pub fn always_include_owner_map(&self) -> bool {
        self.always_include_owner_map
    }

    pub fn set_always_include_owner_map(&mut self, always_include_owner_map: bool) {
        self.always_include_owner_map = always_include_owner_map;
    }

    pub fn nn_x_len(&self) -> usize {
        self.nn_x_len
    }

    pub fn nn_y_len(&self) -> usize {
        self.nn_y_len
    }

    /// Returns the position of the given move in the network planes.
    pub fn get_pos(&self, point: Point) -> usize {
        nn_pos::point_to_pos(point, self.nn_x_len, self.nn_y_len)
    }

    /// Returns the move at the given position of the network planes.
    pub fn pos_to_point(&self, pos: usize) -> Point {
        nn_pos::pos_to_point(pos, self.root_board.x_size(), self.root_board.y_size(), self.nn_x_len, self.nn_y_len)
    }

    /// Returns the policy of `point` in the given policy vector, or `-1` if
    /// the move has no position in it.
    pub(crate) fn policy_of(&self, policy_probs: &[f32], point: Point) -> f64 {
        policy_probs.get(self.get_pos(point)).map(|&p| p as f64).unwrap_or(-1.0)
    }

    /// Returns false if the given move at the root is the image of another
    /// move under a symmetry of the root position, and symmetry pruning is
    /// enabled.
    pub fn is_allowed_root_move(&self, point: Point) -> bool {
        debug_assert!(point.is_pass() || self.root_board.is_on_board(point));

        !(self.options.root_symmetry_pruning
            && !point.is_pass()
            && self.root_symmetries.is_duplicate(&self.root_board, point))
    }

    /// Returns the child of `node` that was reached by playing `point`.
    pub fn get_child_for_move<'a>(&self, node: &'a SearchNode, point: Point) -> Option<&'a SearchNode> {
        node.child_for_move(point)
    }

    /// Returns `node`, or the root if it is `None`.
    pub(crate) fn node_or_root<'a>(&'a self, node: Option<&'a SearchNode>) -> Result<&'a SearchNode, SearchError> {
        node.or_else(|| self.root()).ok_or(SearchError::NoRoot)
    }
}
