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

use crate::point::Point;

/// Column letters, skipping `I` to avoid confusion with `J`.
const LETTERS: [char; 25] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N',
    'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z'
];

/// Human readable coordinate of a point, such as `D4`, with rows counted
/// from the bottom of the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Vertex {
    point: Point,
    x_size: usize,
    y_size: usize
}

impl Vertex {
    pub fn new(point: Point, x_size: usize, y_size: usize) -> Self {
        Self { point, x_size, y_size }
    }

    pub fn column_letter(x: usize) -> char {
        LETTERS[x]
    }

    /// Parse a text coordinate on a board of the given size, returns `None`
    /// if it is malformed or outside of the board.
    ///
    /// # Arguments
    ///
    /// * `text` -
    /// * `x_size` -
    /// * `y_size` -
    ///
    pub fn parse(text: &str, x_size: usize, y_size: usize) -> Option<Point> {
        let text = text.trim().to_ascii_uppercase();

        if text == "PASS" {
            return Some(Point::PASS);
        }

        let mut chars = text.chars();
        let letter = chars.next()?;
        let x = LETTERS.iter().position(|&l| l == letter)?;
        let row = chars.as_str().parse::<usize>().ok()?;

        if x >= x_size || row == 0 || row > y_size {
            None
        } else {
            Some(Point::new(x, y_size - row))
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.point.is_pass() {
            f.pad("pass")
        } else if self.point.is_null() {
            f.pad("null")
        } else if self.point.x() >= self.x_size || self.point.y() >= self.y_size {
            f.pad("illegal")
        } else {
            f.pad(&format!("{}{}",
                LETTERS[self.point.x()],
                self.y_size - self.point.y()
            ))
        }
    }
}
