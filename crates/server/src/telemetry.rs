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

//! Log initialization: a file appender and a stderr appender, each
//! independently optional per [`quorumkv_core::TelemetryConfig`].

use logforth::append;
use logforth::append::file::FileBuilder;
use logforth::filter::EnvFilter;
use logforth::filter::env_filter::EnvFilterBuilder;
use logforth::layout;
use quorumkv_core::Address;
use quorumkv_core::TelemetryConfig;

pub fn init(service_name: &'static str, node_addr: Address, config: &TelemetryConfig) {
    let mut builder = logforth::starter_log::builder();

    if let Some(file) = &config.logs.file {
        let mut b = FileBuilder::new(&file.dir, service_name)
            .layout(layout::JsonLayout::default())
            .rollover_hourly()
            .filename_suffix("log");

        if let Some(max_files) = file.max_files {
            b = b.max_log_files(max_files);
        }

        let append = b.build().expect("failed to init file appender");
        builder = builder.dispatch(|b| b.filter(make_rust_log_filter(&file.filter)).append(append));
    }

    if let Some(stderr) = &config.logs.stderr {
        builder = builder.dispatch(|b| {
            b.filter(make_rust_log_filter_with_default_env(&stderr.filter))
                .append(append::Stderr::default().with_layout(layout::TextLayout::default()))
        });
    }

    // apply returns err if already set; ignored so tests can init repeatedly.
    let _ = builder.try_apply();

    log::info!(node:display = node_addr; "telemetry initialized for {service_name}");
}

fn make_rust_log_filter(filter: &str) -> EnvFilter {
    let builder = EnvFilterBuilder::try_from_spec(filter)
        .unwrap_or_else(|_| panic!("failed to parse filter: {filter}"));
    builder.build()
}

fn make_rust_log_filter_with_default_env(filter: &str) -> EnvFilter {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        make_rust_log_filter(&filter)
    } else {
        make_rust_log_filter(filter)
    }
}
