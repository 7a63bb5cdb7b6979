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

use crate::color::Color;
use crate::point::{Point, PointIter};
use crate::vertex::Vertex;
use crate::zobrist;
use crate::MAX_BOARD_LEN;

/// The stone configuration of a rectangular board, and a possibly active
/// ko-like restriction on one of its points.
///
/// This is only the part of the game state that the search statistics need,
/// the game rules themselves are evaluated elsewhere.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    x_size: usize,
    y_size: usize,
    stones: Vec<Option<Color>>,
    ko_point: Option<Point>,
}

impl Board {
    pub fn new(x_size: usize, y_size: usize) -> Board {
        assert!(x_size >= 1 && x_size <= MAX_BOARD_LEN, "unsupported board width {}", x_size);
        assert!(y_size >= 1 && y_size <= MAX_BOARD_LEN, "unsupported board height {}", y_size);

        Board {
            x_size,
            y_size,
            stones: vec! [None; x_size * y_size],
            ko_point: None,
        }
    }

    #[inline]
    pub fn x_size(&self) -> usize {
        self.x_size
    }

    #[inline]
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Returns `sqrt(x_size * y_size)`.
    pub fn sqrt_area(&self) -> f64 {
        ((self.x_size * self.y_size) as f64).sqrt()
    }

    /// Returns an iterator over every point on this board in row-major order.
    pub fn points(&self) -> PointIter {
        PointIter::new(self.x_size, self.y_size)
    }

    /// Returns true if the given point is a location on this board.
    pub fn is_on_board(&self, point: Point) -> bool {
        !point.is_special() && point.x() < self.x_size && point.y() < self.y_size
    }

    /// Returns the row-major index of the given on-board point.
    #[inline]
    pub fn index(&self, point: Point) -> usize {
        debug_assert!(self.is_on_board(point));

        point.y() * self.x_size + point.x()
    }

    /// Returns the color of the stone at the given point, if any.
    #[inline]
    pub fn at(&self, point: Point) -> Option<Color> {
        self.stones[self.index(point)]
    }

    /// Place (or remove) a stone at the given point. Any ko restriction is
    /// cleared.
    pub fn set(&mut self, point: Point, color: Option<Color>) {
        let index = self.index(point);

        self.stones[index] = color;
        self.ko_point = None;
    }

    /// Place a stone of the given color at the given point.
    pub fn place(&mut self, color: Color, point: Point) {
        self.set(point, Some(color));
    }

    #[inline]
    pub fn ko_point(&self) -> Option<Point> {
        self.ko_point
    }

    /// Mark the given point as temporarily unplayable.
    pub fn set_ko_point(&mut self, ko_point: Option<Point>) {
        debug_assert!(ko_point.map(|p| self.is_on_board(p)).unwrap_or(true));

        self.ko_point = ko_point;
    }

    /// Returns true if `color` may play at `point`. Passing is always legal,
    /// otherwise the point must be an empty on-board point that is not
    /// restricted by ko.
    pub fn is_legal(&self, point: Point, _color: Color) -> bool {
        if point.is_pass() {
            true
        } else if !self.is_on_board(point) {
            false
        } else {
            self.at(point).is_none() && self.ko_point != Some(point)
        }
    }

    /// Returns the on-board orthogonal neighbours of the given point.
    pub fn adjacent(&self, point: Point) -> impl Iterator<Item=Point> + '_ {
        static OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

        OFFSETS.iter()
            .filter_map(move |&(dx, dy)| point.offset(dx, dy, self.x_size, self.y_size))
    }

    /// Returns the zobrist hash of the situation on this board, with the
    /// given player to move.
    pub fn sit_hash(&self, to_move: Color) -> u64 {
        let table = &*zobrist::TABLE;
        let mut hash = table.x_size[self.x_size] ^ table.y_size[self.y_size];

        for point in self.points() {
            if let Some(color) = self.at(point) {
                hash ^= table.stones[color as usize][point.y() * Point::STRIDE + point.x()];
            }
        }

        if let Some(ko_point) = self.ko_point {
            hash ^= table.ko[ko_point.y() * Point::STRIDE + ko_point.x()];
        }

        hash ^ table.to_move[to_move as usize]
    }

    /// Returns a displayable text coordinate for the given point on this
    /// board.
    pub fn vertex(&self, point: Point) -> Vertex {
        Vertex::new(point, self.x_size, self.y_size)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in 0..self.y_size {
            write!(f, "{:>2} ", self.y_size - y)?;

            for x in 0..self.x_size {
                let point = Point::new(x, y);
                let symbol = match self.at(point) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None if self.ko_point == Some(point) => '*',
                    None => '.'
                };

                write!(f, "{} ", symbol)?;
            }

            writeln!(f)?;
        }

        write!(f, "   ")?;
        for x in 0..self.x_size {
            write!(f, "{} ", Vertex::column_letter(x))?;
        }

        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_legal() {
        let board = Board::new(15, 15);

        for point in board.points() {
            assert!(board.is_legal(point, Color::Black));
        }

        assert!(board.is_legal(Point::PASS, Color::White));
        assert!(!board.is_legal(Point::NULL, Color::White));
    }

    #[test]
    fn occupied_is_illegal() {
        let mut board = Board::new(9, 9);
        board.place(Color::Black, Point::new(4, 4));

        assert!(!board.is_legal(Point::new(4, 4), Color::White));
        assert!(board.is_legal(Point::new(4, 5), Color::White));
    }

    #[test]
    fn ko_is_illegal() {
        let mut board = Board::new(9, 9);
        board.set_ko_point(Some(Point::new(2, 3)));

        assert!(!board.is_legal(Point::new(2, 3), Color::White));

        board.place(Color::White, Point::new(0, 0));
        assert_eq!(board.ko_point(), None);
    }

    #[test]
    fn off_board_is_illegal() {
        let board = Board::new(7, 5);

        assert!(!board.is_legal(Point::new(6, 5), Color::Black));
        assert!(!board.is_legal(Point::new(7, 0), Color::Black));
    }

    #[test]
    fn adjacent_at_corner() {
        let board = Board::new(9, 9);

        assert_eq!(board.adjacent(Point::new(0, 0)).count(), 2);
        assert_eq!(board.adjacent(Point::new(4, 0)).count(), 3);
        assert_eq!(board.adjacent(Point::new(4, 4)).count(), 4);
    }

    #[test]
    fn hash_depends_on_stones_and_player() {
        let mut board = Board::new(15, 15);
        let empty_b = board.sit_hash(Color::Black);
        let empty_w = board.sit_hash(Color::White);

        assert_ne!(empty_b, empty_w);

        board.place(Color::Black, Point::new(7, 7));
        assert_ne!(board.sit_hash(Color::Black), empty_b);

        board.set(Point::new(7, 7), None);
        assert_eq!(board.sit_hash(Color::Black), empty_b);
    }

    #[test]
    fn hash_depends_on_size() {
        assert_ne!(Board::new(15, 15).sit_hash(Color::Black), Board::new(19, 19).sit_hash(Color::Black));
    }
}
