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

#[macro_use] extern crate lazy_static;
extern crate ordered_float;
extern crate rand;
extern crate serde;
extern crate serde_json;
extern crate thiserror;
extern crate tk_go;
extern crate tk_utils;
#[macro_use] extern crate tracing;

#[cfg(test)] #[macro_use] extern crate approx;
#[cfg(test)] #[macro_use] extern crate proptest;

/* -------- Modules -------- */

pub mod analysis;
mod choose;
mod error;
pub mod node;
pub mod nn_output;
pub mod options;
pub mod ownership;
pub mod print;
pub mod report;
pub mod score_value;
mod search;
pub mod selection;
pub mod snapshot;
pub mod utility;
pub mod values;
pub mod weights;

/* -------- Exports -------- */

pub use self::analysis::AnalysisData;
pub use self::choose::{choose_index_with_temperature, interpolate_early};
pub use self::error::SearchError;
pub use self::node::{NodeStats, SearchNode, StatsSnapshot};
pub use self::nn_output::NNOutput;
pub use self::options::SearchOptions;
pub use self::print::PrintTreeOptions;
pub use self::report::{AnalysisReport, AnalysisRequest};
pub use self::search::*;
pub use self::selection::{LcbMode, PlaySelection};
pub use self::snapshot::{AnalysisSchedule, SearchSnapshot};
pub use self::values::ReportedSearchValues;
