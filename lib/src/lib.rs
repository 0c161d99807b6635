// Copyright 2025 The Szz Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Locating bug-introducing commits from known bug-fix commits.
//!
//! Given a fix commit, the [`engine::SzzEngine`] derives the lines the fix
//! touched in the parent revision ([`impact`]), attributes them with
//! iterated incremental blame ([`blame`]), suppresses noise commits
//! ([`classify`], [`comment`], [`refactor`]), and reduces the surviving
//! candidates according to the configured algorithm variant.

#![warn(missing_docs)]

pub mod blame;
pub mod classify;
pub mod comment;
pub mod commit;
pub mod config;
pub mod engine;
pub mod file_util;
pub mod git_subprocess;
pub mod impact;
pub mod refactor;
pub mod repo;
#[cfg(feature = "testing")]
pub mod testutils;
pub mod time_util;
