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

use crate::MAX_BOARD_LEN;

/// A location on the board, or one of the two special moves `PASS` and
/// `NULL`. On-board points are stored independent of the board size, so the
/// same point can be interpreted on boards of different dimensions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Point {
    packed_index: u16
}

impl Point {
    pub const STRIDE: usize = MAX_BOARD_LEN;

    /// Passing move.
    pub const PASS: Point = Point { packed_index: 0xfffe };

    /// The absence of a move, used by root nodes and empty slots.
    pub const NULL: Point = Point { packed_index: 0xffff };

    pub fn new(x: usize, y: usize) -> Self {
        debug_assert!(x < MAX_BOARD_LEN && y < MAX_BOARD_LEN);

        Self {
            packed_index: (Self::STRIDE * y + x) as u16
        }
    }

    pub fn x(&self) -> usize {
        debug_assert!(!self.is_special());

        self.packed_index as usize % Self::STRIDE
    }

    pub fn y(&self) -> usize {
        debug_assert!(!self.is_special());

        self.packed_index as usize / Self::STRIDE
    }

    pub fn is_pass(&self) -> bool {
        *self == Self::PASS
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Returns true if this point is either `PASS` or `NULL`.
    pub fn is_special(&self) -> bool {
        self.is_pass() || self.is_null()
    }

    /// Returns the point offset by the given amount, or `None` if it would
    /// fall outside of a board of the given size.
    pub fn offset(&self, dx: isize, dy: isize, x_size: usize, y_size: usize) -> Option<Point> {
        if self.is_special() {
            return None;
        }

        let x = self.x() as isize + dx;
        let y = self.y() as isize + dy;

        if x < 0 || y < 0 || x >= x_size as isize || y >= y_size as isize {
            None
        } else {
            Some(Point::new(x as usize, y as usize))
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            write!(f, "pass")
        } else if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "({}, {})", self.x(), self.y())
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::NULL
    }
}

/// Iterator over all points of a board in row-major order.
pub struct PointIter {
    x: usize,
    y: usize,
    x_size: usize,
    y_size: usize
}

impl PointIter {
    pub fn new(x_size: usize, y_size: usize) -> Self {
        Self { x: 0, y: 0, x_size, y_size }
    }
}

impl Iterator for PointIter {
    type Item = Point;

    fn next(&mut self) -> Option<Self::Item> {
        if self.x < self.x_size && self.y < self.y_size {
            let out = Point::new(self.x, self.y);

            self.x += 1;
            if self.x == self.x_size {
                self.x = 0;
                self.y += 1;
            }

            Some(out)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_set::HashSet;
    use super::*;

    #[test]
    fn identity() {
        let point = Point::new(3, 7);

        assert_eq!(point.x(), 3);
        assert_eq!(point.y(), 7);
    }

    #[test]
    fn offset_bottomleft() {
        let point = Point::new(0, 0);

        assert_eq!(point.offset(-1, 0, 15, 15), None);
        assert_eq!(point.offset(0, -1, 15, 15), None);
        assert_eq!(point.offset(1, 0, 15, 15), Some(Point::new(1, 0)));
        assert_eq!(point.offset(0, 1, 15, 15), Some(Point::new(0, 1)));
    }

    #[test]
    fn offset_topright() {
        let point = Point::new(14, 9);

        assert_eq!(point.offset(1, 0, 15, 10), None);
        assert_eq!(point.offset(0, 1, 15, 10), None);
        assert_eq!(point.offset(-1, -1, 15, 10), Some(Point::new(13, 8)));
    }

    #[test]
    fn specials_are_not_on_board() {
        for point in PointIter::new(19, 19) {
            assert!(!point.is_special());
        }
    }

    #[test]
    fn has_all_points() {
        assert_eq!(PointIter::new(19, 19).collect::<HashSet<_>>().len(), 361);
        assert_eq!(PointIter::new(15, 9).collect::<HashSet<_>>().len(), 135);
    }

    #[test]
    fn default_is_null() {
        assert!(Point::default().is_null());
        assert!(!Point::PASS.is_null());
    }
}
