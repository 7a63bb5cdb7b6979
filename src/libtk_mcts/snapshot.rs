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

use std::time::{Duration, Instant};

use tk_utils::config::ANALYSIS_PV_LEN;

use crate::analysis::AnalysisData;
use crate::search::Search;
use crate::selection::{LcbMode, PlaySelection};
use crate::values::ReportedSearchValues;

/// The state of the search at some instant, for reporting progress while
/// the search is running.
#[derive(Clone, Debug)]
pub struct SearchSnapshot<'a> {
    pub root_values: ReportedSearchValues,
    /// The moves the search would currently choose between, or `None` if it
    /// cannot choose any move yet.
    pub candidates: Option<PlaySelection>,
    pub analysis: Vec<AnalysisData<'a>>,
}

/// Decides when the caller should take another `SearchSnapshot`. The
/// caller polls it from its own loop, with the current time.
#[derive(Clone, Debug)]
pub struct AnalysisSchedule {
    period: Duration,
    max_pv_depth: usize,
    last: Option<Instant>,
}

impl AnalysisSchedule {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            max_pv_depth: *ANALYSIS_PV_LEN,
            last: None,
        }
    }

    /// Use principal variations of at most the given length.
    pub fn with_max_pv_depth(mut self, max_pv_depth: usize) -> Self {
        self.max_pv_depth = max_pv_depth;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the instant of the most recent snapshot, if any.
    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// Returns a snapshot of `search` if at least one period has passed
    /// since the previous one, or if there has not been one yet. Nothing is
    /// returned, and the schedule is left unchanged, while the root has no
    /// values.
    ///
    /// # Arguments
    ///
    /// * `search` -
    /// * `now` - the current time
    ///
    pub fn poll<'a>(&mut self, search: &'a Search, now: Instant) -> Option<SearchSnapshot<'a>> {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.period {
                return None;
            }
        }

        let root = search.root()?;
        let root_values = search.get_root_values()?;
        let candidates = search.get_play_selection_values(root, 1.0, true, LcbMode::Default);
        let analysis = search.get_analysis_data(root, 0, false, self.max_pv_depth, false);

        trace!(visits = root_values.visits, moves = analysis.len(), "analysis snapshot");
        self.last = Some(now);

        Some(SearchSnapshot { root_values, candidates, analysis })
    }
}
