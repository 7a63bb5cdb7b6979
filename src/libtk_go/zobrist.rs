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

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::point::Point;
use crate::MAX_BOARD_LEN;

const NUM_POINTS: usize = Point::STRIDE * MAX_BOARD_LEN;

pub(crate) struct ZobristTable {
    /// One random key for every (color, point) pair.
    pub stones: [[u64; NUM_POINTS]; 2],

    /// One random key for every possible ko point.
    pub ko: [u64; NUM_POINTS],

    /// Keys for the board width and height.
    pub x_size: [u64; MAX_BOARD_LEN + 1],
    pub y_size: [u64; MAX_BOARD_LEN + 1],

    /// Keys for the player to move.
    pub to_move: [u64; 2],
}

impl ZobristTable {
    fn new(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut out = Self {
            stones: [[0; NUM_POINTS]; 2],
            ko: [0; NUM_POINTS],
            x_size: [0; MAX_BOARD_LEN + 1],
            y_size: [0; MAX_BOARD_LEN + 1],
            to_move: [0; 2],
        };

        for color in out.stones.iter_mut() {
            rng.fill(&mut color[..]);
        }

        rng.fill(&mut out.ko[..]);
        rng.fill(&mut out.x_size[..]);
        rng.fill(&mut out.y_size[..]);
        rng.fill(&mut out.to_move[..]);
        out
    }
}

lazy_static! {
    pub(crate) static ref TABLE: ZobristTable = ZobristTable::new(0x7e6e_4b1d_05c3_a9f1);
}
