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

use crate::board::Board;
use crate::color::Color;
use crate::point::Point;

/// One of the eight elements of the dihedral group of a rectangle (or of a
/// square, if transposes are included). Bit `0x1` flips the y-axis, bit
/// `0x2` flips the x-axis and bit `0x4` transposes, applied in that order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Symmetry(u8);

pub const NUM_SYMMETRIES: usize = 8;

/// The number of symmetries that do not transpose, which are the only ones
/// that keep a non-square board the same shape.
pub const NUM_SYMMETRIES_WITHOUT_TRANSPOSE: usize = 4;

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry(0);
    pub const FLIP_UD: Symmetry = Symmetry(1);
    pub const FLIP_LR: Symmetry = Symmetry(2);
    pub const ROT_180: Symmetry = Symmetry(3);
    pub const TRANSPOSE: Symmetry = Symmetry(4);
    pub const ROT_90: Symmetry = Symmetry(5);
    pub const ROT_270: Symmetry = Symmetry(6);
    pub const TRANSPOSE_ANTI: Symmetry = Symmetry(7);

    pub const ALL: [Symmetry; NUM_SYMMETRIES] = [
        Symmetry(0), Symmetry(1), Symmetry(2), Symmetry(3),
        Symmetry(4), Symmetry(5), Symmetry(6), Symmetry(7)
    ];

    pub fn new(index: u8) -> Symmetry {
        assert!((index as usize) < NUM_SYMMETRIES, "invalid symmetry {}", index);

        Symmetry(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_transpose(self) -> bool {
        self.0 & 0x4 != 0
    }

    #[inline]
    fn flip_x(self) -> bool {
        self.0 & 0x2 != 0
    }

    #[inline]
    fn flip_y(self) -> bool {
        self.0 & 0x1 != 0
    }

    /// Returns the symmetry that undoes this one.
    pub fn invert(self) -> Symmetry {
        match self {
            Symmetry::ROT_90 => Symmetry::ROT_270,
            Symmetry::ROT_270 => Symmetry::ROT_90,
            other => other
        }
    }

    /// Returns the symmetry equivalent to applying `self` first and then
    /// `next`.
    ///
    /// # Arguments
    ///
    /// * `next` -
    ///
    pub fn compose(self, next: Symmetry) -> Symmetry {
        let next = if self.is_transpose() {
            (next.0 & 0x4) | ((next.0 & 0x2) >> 1) | ((next.0 & 0x1) << 1)
        } else {
            next.0
        };

        Symmetry(self.0 ^ next)
    }

    pub fn compose3(self, next: Symmetry, next_next: Symmetry) -> Symmetry {
        self.compose(next).compose(next_next)
    }

    /// Returns the image of the given point on a board of the given size.
    /// Passing and `NULL` are their own images.
    ///
    /// # Arguments
    ///
    /// * `point` - the point to transform
    /// * `x_size` - the width of the original board
    /// * `y_size` - the height of the original board
    ///
    pub fn get_sym_point(self, point: Point, x_size: usize, y_size: usize) -> Point {
        if point.is_special() {
            return point;
        }

        let mut x = point.x();
        let mut y = point.y();

        if self.flip_x() { x = x_size - x - 1; }
        if self.flip_y() { y = y_size - y - 1; }
        if self.is_transpose() {
            ::std::mem::swap(&mut x, &mut y);
        }

        Point::new(x, y)
    }

    /// Returns a copy of the given board with this symmetry applied, the
    /// dimensions are swapped for symmetries that transpose.
    pub fn sym_board(self, board: &Board) -> Board {
        let (x_size, y_size) = if self.is_transpose() {
            (board.y_size(), board.x_size())
        } else {
            (board.x_size(), board.y_size())
        };
        let mut other = Board::new(x_size, y_size);

        for point in board.points() {
            other.set(self.get_sym_point(point, board.x_size(), board.y_size()), board.at(point));
        }

        other.set_ko_point(board.ko_point().map(|ko| {
            self.get_sym_point(ko, board.x_size(), board.y_size())
        }));
        other
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Symmetry::IDENTITY => "identity",
            Symmetry::FLIP_UD => "flip_ud",
            Symmetry::FLIP_LR => "flip_lr",
            Symmetry::ROT_180 => "rot_180",
            Symmetry::TRANSPOSE => "transpose",
            Symmetry::ROT_90 => "rot_90",
            Symmetry::ROT_270 => "rot_270",
            _ => "transpose_anti"
        };

        f.pad(name)
    }
}

/// Returns if the given board is identical to its own image under the given
/// symmetry.
///
/// # Arguments
///
/// * `board` -
/// * `symmetry` -
///
pub fn is_symmetric(board: &Board, symmetry: Symmetry) -> bool {
    if symmetry.is_transpose() && board.x_size() != board.y_size() {
        return false;
    }

    board.points().all(|point| {
        let other = symmetry.get_sym_point(point, board.x_size(), board.y_size());

        board.at(point) == board.at(other)
    })
}

/// The moves at the root that can be skipped because they are the image of
/// another move under a symmetry of the current board.
#[derive(Clone, Debug)]
pub struct SymmetryPruning {
    is_dup: Vec<bool>,
    valid_symmetries: Vec<Symmetry>,
}

impl SymmetryPruning {
    /// Returns true if the given point is a duplicate of some other point.
    pub fn is_duplicate(&self, board: &Board, point: Point) -> bool {
        board.is_on_board(point) && self.is_dup[board.index(point)]
    }

    /// Returns the symmetries of the board, always starting with the
    /// identity.
    pub fn valid_symmetries(&self) -> &[Symmetry] {
        &self.valid_symmetries
    }
}

/// Determine which symmetries leave the board unchanged, and mark every
/// point that is the image of an earlier point under one of them. The scan
/// order ensures the kept representative for black is towards the upper
/// right, and for white towards the lower left.
///
/// # Arguments
///
/// * `board` - the current board
/// * `next_pla` - the player to move
/// * `only_symmetries` - if given, only these symmetries are considered
/// * `avoid_moves` - per-point avoid restrictions, or empty if there are none
///
pub fn mark_duplicate_move_locs(
    board: &Board,
    next_pla: Color,
    only_symmetries: Option<&[Symmetry]>,
    avoid_moves: &[i32]
) -> SymmetryPruning
{
    let mut out = SymmetryPruning {
        is_dup: vec! [false; board.x_size() * board.y_size()],
        valid_symmetries: vec! [Symmetry::IDENTITY],
    };

    if board.ko_point().is_some() {
        return out;
    }

    let upper_bound = if board.x_size() == board.y_size() {
        NUM_SYMMETRIES
    } else {
        NUM_SYMMETRIES_WITHOUT_TRANSPOSE
    };

    for &symmetry in &Symmetry::ALL[1..upper_bound] {
        if only_symmetries.map(|only| !only.contains(&symmetry)).unwrap_or(false) {
            continue;
        }

        if is_symmetric(board, symmetry) {
            out.valid_symmetries.push(symmetry);
        }
    }

    let (x_size, y_size) = (board.x_size(), board.y_size());
    let order: Vec<Point> = if next_pla == Color::Black {
        (0..x_size).rev()
            .flat_map(|x| (0..y_size).map(move |y| Point::new(x, y)))
            .collect()
    } else {
        (0..x_size)
            .flat_map(|x| (0..y_size).rev().map(move |y| Point::new(x, y)))
            .collect()
    };

    for point in order {
        let index = board.index(point);

        if !avoid_moves.is_empty() && avoid_moves[index] > 0 {
            continue;
        }

        for &symmetry in &out.valid_symmetries[1..] {
            let other = symmetry.get_sym_point(point, x_size, y_size);

            if !out.is_dup[index] && other != point {
                let other_index = board.index(other);

                out.is_dup[other_index] = true;
            }
        }
    }

    out
}

fn symmetry_difference(board: &Board, other: &Board, symmetry: Symmetry, max_difference: f64) -> f64 {
    let mut difference = 0.0;

    for point in board.points() {
        let sym_point = symmetry.get_sym_point(point, board.x_size(), board.y_size());
        let a = board.at(point);
        let b = other.at(sym_point);

        if a != b {
            difference += if a.is_none() || b.is_none() { 1.0 } else { 3.0 };

            if difference > max_difference {
                return max_difference;
            }
        }
    }

    difference
}

/// Returns, for every symmetry, how different `board` would be from `other`
/// if the symmetry was applied to it. An empty point against a stone counts
/// as one, and two different stones count as three. Every difference is
/// capped at `max_difference`, which is also reported for any symmetry that
/// is not comparable.
pub fn symmetry_differences(board: &Board, other: &Board, max_difference: f64) -> [f64; NUM_SYMMETRIES] {
    let mut out = [max_difference; NUM_SYMMETRIES];

    if board.x_size() != other.x_size() || board.y_size() != other.y_size() {
        return out;
    }

    let num_symmetries = if board.x_size() != board.y_size() {
        NUM_SYMMETRIES_WITHOUT_TRANSPOSE
    } else {
        NUM_SYMMETRIES
    };

    for &symmetry in &Symmetry::ALL[..num_symmetries] {
        out[symmetry.index()] = symmetry_difference(board, other, symmetry, max_difference);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use proptest::prelude::*;
    use super::*;

    fn arb_symmetry() -> impl Strategy<Value = Symmetry> {
        (0u8..8).prop_map(Symmetry::new)
    }

    #[test]
    fn bijection_square() {
        for &symmetry in &Symmetry::ALL {
            let images = Board::new(9, 9).points()
                .map(|p| symmetry.get_sym_point(p, 9, 9))
                .collect::<HashSet<_>>();

            assert_eq!(images.len(), 81, "{}", symmetry);
        }
    }

    #[test]
    fn bijection_non_square() {
        for &symmetry in &Symmetry::ALL[..NUM_SYMMETRIES_WITHOUT_TRANSPOSE] {
            let images = Board::new(7, 4).points()
                .map(|p| symmetry.get_sym_point(p, 7, 4))
                .collect::<HashSet<_>>();

            assert_eq!(images.len(), 28, "{}", symmetry);
            assert!(images.iter().all(|p| p.x() < 7 && p.y() < 4));
        }
    }

    #[test]
    fn specials_are_fixed() {
        for &symmetry in &Symmetry::ALL {
            assert_eq!(symmetry.get_sym_point(Point::PASS, 15, 15), Point::PASS);
            assert_eq!(symmetry.get_sym_point(Point::NULL, 15, 15), Point::NULL);
        }
    }

    #[test]
    fn rotations_are_inverses() {
        assert_eq!(Symmetry::ROT_90.invert(), Symmetry::ROT_270);
        assert_eq!(Symmetry::ROT_270.invert(), Symmetry::ROT_90);
        assert_eq!(Symmetry::ROT_90.compose(Symmetry::ROT_90), Symmetry::ROT_180);
    }

    #[test]
    fn transposed_point() {
        // (x, y) on a 7x4 board lands on (y, x) of the 4x7 board
        assert_eq!(Symmetry::TRANSPOSE.get_sym_point(Point::new(5, 1), 7, 4), Point::new(1, 5));
        assert_eq!(Symmetry::TRANSPOSE_ANTI.get_sym_point(Point::new(5, 1), 7, 4), Point::new(2, 1));
    }

    #[test]
    fn sym_board_moves_stones_and_ko() {
        let mut board = Board::new(7, 4);
        board.place(Color::Black, Point::new(5, 1));
        board.set_ko_point(Some(Point::new(0, 0)));

        let other = Symmetry::TRANSPOSE.sym_board(&board);

        assert_eq!(other.x_size(), 4);
        assert_eq!(other.y_size(), 7);
        assert_eq!(other.at(Point::new(1, 5)), Some(Color::Black));
        assert_eq!(other.ko_point(), Some(Point::new(0, 0)));
    }

    #[test]
    fn empty_board_has_all_symmetries() {
        let board = Board::new(15, 15);
        let pruning = mark_duplicate_move_locs(&board, Color::Black, None, &[]);

        assert_eq!(pruning.valid_symmetries(), &Symmetry::ALL[..]);

        // one representative per orbit of the 8 symmetries on a 15x15 board
        let unique = board.points().filter(|&p| !pruning.is_duplicate(&board, p)).count();

        assert_eq!(unique, 8 * 9 / 2);
    }

    #[test]
    fn black_keeps_upper_right() {
        let board = Board::new(9, 9);
        let pruning = mark_duplicate_move_locs(&board, Color::Black, None, &[]);

        assert!(!pruning.is_duplicate(&board, Point::new(8, 0)));
        assert!(pruning.is_duplicate(&board, Point::new(0, 0)));
        assert!(pruning.is_duplicate(&board, Point::new(0, 8)));
        assert!(pruning.is_duplicate(&board, Point::new(8, 8)));
    }

    #[test]
    fn white_keeps_lower_left() {
        let board = Board::new(9, 9);
        let pruning = mark_duplicate_move_locs(&board, Color::White, None, &[]);

        assert!(!pruning.is_duplicate(&board, Point::new(0, 8)));
        assert!(pruning.is_duplicate(&board, Point::new(8, 0)));
    }

    #[test]
    fn ko_disables_pruning() {
        let mut board = Board::new(9, 9);
        board.set_ko_point(Some(Point::new(4, 4)));

        let pruning = mark_duplicate_move_locs(&board, Color::Black, None, &[]);

        assert_eq!(pruning.valid_symmetries(), &[Symmetry::IDENTITY]);
        assert!(board.points().all(|p| !pruning.is_duplicate(&board, p)));
    }

    #[test]
    fn only_symmetries_filter() {
        let board = Board::new(9, 9);
        let only = [Symmetry::FLIP_LR];
        let pruning = mark_duplicate_move_locs(&board, Color::Black, Some(&only), &[]);

        assert_eq!(pruning.valid_symmetries(), &[Symmetry::IDENTITY, Symmetry::FLIP_LR]);
        assert!(pruning.is_duplicate(&board, Point::new(0, 3)));
        assert!(!pruning.is_duplicate(&board, Point::new(8, 3)));
    }

    #[test]
    fn non_square_skips_transpose() {
        let board = Board::new(9, 7);
        let pruning = mark_duplicate_move_locs(&board, Color::Black, None, &[]);

        assert!(pruning.valid_symmetries().iter().all(|s| !s.is_transpose()));
        assert_eq!(pruning.valid_symmetries().len(), 4);
    }

    #[test]
    fn avoided_points_do_not_mark() {
        let board = Board::new(3, 3);
        let mut avoid = vec! [0; 9];

        // every point but (0, 0) is avoided, so only images of (0, 0) are marked
        for a in avoid.iter_mut().skip(1) {
            *a = 1;
        }

        let pruning = mark_duplicate_move_locs(&board, Color::Black, None, &avoid);

        assert!(!pruning.is_duplicate(&board, Point::new(0, 0)));
        assert!(pruning.is_duplicate(&board, Point::new(2, 2)));
        assert!(!pruning.is_duplicate(&board, Point::new(1, 0)));
    }

    #[test]
    fn asymmetric_stone() {
        let mut board = Board::new(9, 9);
        board.place(Color::Black, Point::new(1, 2));

        assert!(is_symmetric(&board, Symmetry::IDENTITY));
        assert!(!is_symmetric(&board, Symmetry::FLIP_LR));
    }

    #[test]
    fn differences() {
        let mut board = Board::new(9, 9);
        let mut other = Board::new(9, 9);

        board.place(Color::Black, Point::new(1, 2));
        other.place(Color::Black, Point::new(7, 2));
        other.place(Color::White, Point::new(1, 2));

        let diff = symmetry_differences(&board, &other, 100.0);

        assert_eq!(diff[Symmetry::FLIP_LR.index()], 1.0);
        assert_eq!(diff[Symmetry::IDENTITY.index()], 4.0);
        assert_eq!(symmetry_differences(&board, &Board::new(9, 7), 100.0), [100.0; NUM_SYMMETRIES]);
    }

    #[test]
    fn differences_are_capped() {
        let mut board = Board::new(9, 9);
        board.place(Color::Black, Point::new(1, 2));
        board.place(Color::Black, Point::new(2, 2));

        let diff = symmetry_differences(&board, &Board::new(9, 9), 1.5);

        assert_eq!(diff[Symmetry::IDENTITY.index()], 1.5);
    }

    proptest! {
        #[test]
        fn compose_with_inverse_is_identity(s in arb_symmetry()) {
            prop_assert_eq!(s.compose(s.invert()), Symmetry::IDENTITY);
            prop_assert_eq!(s.invert().compose(s), Symmetry::IDENTITY);
        }

        #[test]
        fn compose_is_associative(a in arb_symmetry(), b in arb_symmetry(), c in arb_symmetry()) {
            prop_assert_eq!(a.compose(b).compose(c), a.compose(b.compose(c)));
            prop_assert_eq!(a.compose3(b, c), a.compose(b).compose(c));
        }

        #[test]
        fn compose_matches_point_images(a in arb_symmetry(), b in arb_symmetry(), x in 0usize..9, y in 0usize..9) {
            let p = Point::new(x, y);
            let two_steps = b.get_sym_point(a.get_sym_point(p, 9, 9), 9, 9);

            prop_assert_eq!(a.compose(b).get_sym_point(p, 9, 9), two_steps);
        }

        #[test]
        fn inverse_round_trip(s in arb_symmetry(), x in 0usize..7, y in 0usize..4) {
            let p = Point::new(x, y);
            let (w, h) = if s.is_transpose() { (4, 7) } else { (7, 4) };
            let image = s.get_sym_point(p, 7, 4);

            prop_assert_eq!(s.invert().get_sym_point(image, w, h), p);
        }
    }
}
