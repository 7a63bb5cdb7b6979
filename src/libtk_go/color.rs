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

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    Black = 0,
    White = 1
}

impl Color {
    /// Returns the opposite of this color.
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black
        }
    }

    /// Returns the long name of this color.
    pub fn name(self) -> &'static str {
        match self {
            Color::Black => "Black",
            Color::White => "White"
        }
    }

    /// Returns `value` if this color is white, and `-value` if it is black.
    /// Useful to convert white-perspective values into this colors
    /// perspective, and back.
    pub fn sign(self, value: f64) -> f64 {
        match self {
            Color::Black => -value,
            Color::White => value
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Color::Black => f.pad("B"),
            Color::White => f.pad("W")
        }
    }
}
