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

use thiserror::Error;

/// Failures of the operations that are required to produce a result.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("search has no root node")]
    NoRoot,

    #[error("search root has no values")]
    NoRootValues,

    #[error("search root has no network evaluation")]
    NoRootRawNnValues,

    #[error("tree ownership requested without always including the owner map")]
    OwnerMapDisabled,

    #[error("node is missing its network evaluation")]
    MissingEvaluation,
}
