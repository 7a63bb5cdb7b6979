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

//! Mapping between board points and positions in the (possibly larger)
//! fixed-size planes produced by the neural network.

use crate::point::Point;
use crate::MAX_BOARD_LEN;

/// The largest policy vector, every point of the largest board plus pass.
pub const MAX_NN_POLICY_SIZE: usize = MAX_BOARD_LEN * MAX_BOARD_LEN + 1;

pub fn xy_to_pos(x: usize, y: usize, nn_x_len: usize) -> usize {
    y * nn_x_len + x
}

/// Returns the network position of the given point. Passing maps to the
/// final entry of the policy, and `NULL` one row past it.
pub fn point_to_pos(point: Point, nn_x_len: usize, nn_y_len: usize) -> usize {
    if point.is_pass() {
        nn_x_len * nn_y_len
    } else if point.is_null() {
        nn_x_len * (nn_y_len + 1)
    } else {
        xy_to_pos(point.x(), point.y(), nn_x_len)
    }
}

/// Returns the point at the given network position on a board of the given
/// size, or `NULL` if that position is outside of the board.
pub fn pos_to_point(pos: usize, x_size: usize, y_size: usize, nn_x_len: usize, nn_y_len: usize) -> Point {
    if pos == nn_x_len * nn_y_len {
        return Point::PASS;
    }

    let x = pos % nn_x_len;
    let y = pos / nn_x_len;

    if x >= x_size || y >= y_size {
        Point::NULL
    } else {
        Point::new(x, y)
    }
}

pub fn pass_pos(nn_x_len: usize, nn_y_len: usize) -> usize {
    nn_x_len * nn_y_len
}

pub fn is_pass_pos(pos: usize, nn_x_len: usize, nn_y_len: usize) -> bool {
    pos == pass_pos(nn_x_len, nn_y_len)
}

pub fn policy_size(nn_x_len: usize, nn_y_len: usize) -> usize {
    nn_x_len * nn_y_len + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_smaller_board() {
        for y in 0..9 {
            for x in 0..13 {
                let point = Point::new(x, y);
                let pos = point_to_pos(point, 15, 15);

                assert_eq!(pos_to_point(pos, 13, 9, 15, 15), point);
            }
        }
    }

    #[test]
    fn outside_board_is_null() {
        assert_eq!(pos_to_point(xy_to_pos(14, 0, 15), 13, 9, 15, 15), Point::NULL);
        assert_eq!(pos_to_point(xy_to_pos(0, 10, 15), 13, 9, 15, 15), Point::NULL);
    }

    #[test]
    fn pass() {
        assert_eq!(point_to_pos(Point::PASS, 15, 15), 225);
        assert_eq!(pos_to_point(225, 15, 15, 15, 15), Point::PASS);
        assert!(is_pass_pos(225, 15, 15));
        assert_eq!(policy_size(15, 15), 226);
    }
}
