// Copyright 2025 ScopeDB <contact@scopedb.io>
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

//! Build-time version metadata for quorumkv binaries.

use const_format::formatcp;

shadow_rs::shadow!(build);

/// Short version string suitable for `--version`.
pub const VERSION: &str = build::PKG_VERSION;

/// Long version string suitable for `--long-version`, carrying the git
/// revision and build timestamp alongside the crate version.
pub const LONG_VERSION: &str = formatcp!(
    "{}\ncommit: {}{}\nbranch: {}\nbuilt: {}",
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    if build::GIT_CLEAN { "" } else { "-dirty" },
    build::BRANCH,
    build::BUILD_TIME,
);

/// Returns the long version string.
pub fn long_version() -> &'static str {
    LONG_VERSION
}

/// Returns the crate version string.
pub fn version() -> &'static str {
    VERSION
}
