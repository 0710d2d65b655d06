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

//! Shared `clap` styling for quorumkv's command-line binaries.

use anstyle::AnsiColor;
use anstyle::Color;
use anstyle::Style;
use clap::builder::Styles;

/// Returns the [`Styles`] every quorumkv CLI entry point should configure its
/// [`clap::Command`] with, so `--help` output is consistent across binaries.
pub fn styled() -> Styles {
    Styles::styled()
        .header(header())
        .usage(header())
        .literal(literal())
        .placeholder(placeholder())
}

fn header() -> Style {
    Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Yellow)))
}

fn literal() -> Style {
    Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Green)))
}

fn placeholder() -> Style {
    Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)))
}
