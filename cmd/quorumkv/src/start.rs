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

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::ValueHint;
use error_stack::Result;
use error_stack::ResultExt;
use quorumkv_core::Address;
use quorumkv_core::LoadConfigResult;
use quorumkv_core::load_config;
use quorumkv_core::make_runtime;
use quorumkv_server::ClusterConfig;
use quorumkv_server::Node;
use quorumkv_transport::LogEventSink;
use quorumkv_transport::UdpSubstrate;

use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct CommandStart {
    #[clap(short, long, help = "Path to config file", value_hint = ValueHint::FilePath)]
    config_file: PathBuf,
    /// The service name used for telemetry; defaults to 'quorumkv'.
    #[clap(short = 's', long = "service-name")]
    service_name: Option<String>,
}

impl CommandStart {
    pub fn run(self) -> Result<(), Error> {
        let LoadConfigResult { config, warnings } =
            load_config(&self.config_file).change_context_lazy(|| Error("failed to load config".to_string()))?;
        let service_name = self.service_name.unwrap_or_else(|| "quorumkv".to_string()).leak();
        let self_addr = Address::new(config.node.id, config.node.port);

        quorumkv_server::telemetry::init(service_name, self_addr, &config.telemetry);
        for warning in &warnings {
            log::warn!("{warning}");
        }
        log::info!("quorumkv node {self_addr} starting with loaded config: {config:#?}");

        let join_addr = config.node.join_addr.map(Address::from).unwrap_or(self_addr);
        let cluster_config = ClusterConfig {
            tfail: config.cluster.tfail,
            tremove: config.cluster.tremove,
            replication_factor: config.cluster.replication_factor,
            ring_size: config.cluster.ring_size,
            transaction_timeout_ticks: config.cluster.transaction_timeout_ticks,
            gossip_fanout_floor: config.cluster.gossip_fanout_floor,
        };
        let tick_interval = Duration::from_millis(config.cluster.tick_interval_millis);

        let runtime = make_runtime("quorumkv_runtime", "quorumkv_thread", 1);
        runtime.block_on(run(self_addr, join_addr, cluster_config, tick_interval))
    }
}

async fn run(
    self_addr: Address,
    join_addr: Address,
    cluster_config: ClusterConfig,
    tick_interval: Duration,
) -> Result<(), Error> {
    let substrate = Arc::new(
        UdpSubstrate::bind(self_addr).change_context_lazy(|| Error(format!("failed to bind to {self_addr}")))?,
    );
    let mut node = Node::new(self_addr, substrate, Arc::new(LogEventSink), cluster_config);
    node.start(join_addr);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || shutdown_handler.store(true, Ordering::SeqCst))
        .change_context_lazy(|| Error("failed to set up ctrl-c signal handler".to_string()))?;

    while !shutdown.load(Ordering::SeqCst) {
        node.tick();
        tokio::time::sleep(tick_interval).await;
    }

    log::info!("quorumkv node {self_addr} shutting down");
    Ok(())
}
