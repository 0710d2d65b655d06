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

use std::net::SocketAddr;
use std::num::NonZeroUsize;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default = "TelemetryConfig::disabled")]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// The 32-bit member id that, together with `port`, forms this node's
    /// stable address.
    pub id: u32,
    pub port: u16,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise_addr: Option<SocketAddr>,
    /// Address of the member to send the initial JOINREQ to. Unset means
    /// this node bootstraps the cluster by declaring itself in-group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_addr: Option<SocketAddr>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    #[serde(default = "default_tfail")]
    pub tfail: u64,
    #[serde(default = "default_tremove")]
    pub tremove: u64,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    #[serde(default = "default_ring_size")]
    pub ring_size: u32,
    #[serde(default = "default_transaction_timeout_ticks")]
    pub transaction_timeout_ticks: u64,
    #[serde(default = "default_tick_interval_millis")]
    pub tick_interval_millis: u64,
    #[serde(default = "default_gossip_fanout_floor")]
    pub gossip_fanout_floor: usize,
}

pub const fn default_tfail() -> u64 {
    5
}

pub const fn default_tremove() -> u64 {
    20
}

pub const fn default_replication_factor() -> usize {
    3
}

/// `RING_SIZE`, kept a power of two per the recommendation that it be at
/// least 2^16 to keep ring-position collisions negligible.
pub const fn default_ring_size() -> u32 {
    1 << 16
}

pub const fn default_transaction_timeout_ticks() -> u64 {
    10
}

pub const fn default_tick_interval_millis() -> u64 {
    1000
}

pub const fn default_gossip_fanout_floor() -> usize {
    3
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tfail: default_tfail(),
            tremove: default_tremove(),
            replication_factor: default_replication_factor(),
            ring_size: default_ring_size(),
            transaction_timeout_ticks: default_transaction_timeout_ticks(),
            tick_interval_millis: default_tick_interval_millis(),
            gossip_fanout_floor: default_gossip_fanout_floor(),
        }
    }
}

/// The well-known address new nodes send their JOINREQ to when no other
/// join address is configured.
pub const fn join_coordinator_id_port() -> (u32, u16) {
    (1, 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default = "LogsConfig::disabled")]
    pub logs: LogsConfig,
}

impl TelemetryConfig {
    pub fn disabled() -> Self {
        Self {
            logs: LogsConfig::disabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAppenderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<StderrAppenderConfig>,
}

impl LogsConfig {
    pub fn disabled() -> Self {
        Self {
            file: None,
            stderr: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct FileAppenderConfig {
    pub filter: String,
    pub dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct StderrAppenderConfig {
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                id: 1,
                port: 0,
                listen_addr: default_listen_addr(),
                advertise_addr: None,
                join_addr: None,
            },
            cluster: ClusterConfig::default(),
            telemetry: TelemetryConfig {
                logs: LogsConfig {
                    file: Some(FileAppenderConfig {
                        filter: "INFO".to_string(),
                        dir: "logs".to_string(),
                        max_files: Some(NonZeroUsize::new(64).unwrap()),
                    }),
                    stderr: Some(StderrAppenderConfig {
                        filter: "INFO".to_string(),
                    }),
                },
            },
        }
    }
}

/// An entry in the `QUORUMKV_CONFIG_*` → TOML-path translation table
/// consulted when overlaying environment variables onto a loaded config.
#[derive(Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct OptionEntry {
    pub env_name: &'static str,
    pub ent_path: &'static str,
    pub ent_type: &'static str,
}

pub const fn known_option_entries() -> &'static [OptionEntry] {
    &[
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_GOSSIP_FANOUT_FLOOR",
            ent_path: "cluster.gossip_fanout_floor",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_REPLICATION_FACTOR",
            ent_path: "cluster.replication_factor",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_RING_SIZE",
            ent_path: "cluster.ring_size",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_TFAIL",
            ent_path: "cluster.tfail",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_TICK_INTERVAL_MILLIS",
            ent_path: "cluster.tick_interval_millis",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_TRANSACTION_TIMEOUT_TICKS",
            ent_path: "cluster.transaction_timeout_ticks",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_CLUSTER_TREMOVE",
            ent_path: "cluster.tremove",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_NODE_ADVERTISE_ADDR",
            ent_path: "node.advertise_addr",
            ent_type: "string",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_NODE_ID",
            ent_path: "node.id",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_NODE_JOIN_ADDR",
            ent_path: "node.join_addr",
            ent_type: "string",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_NODE_LISTEN_ADDR",
            ent_path: "node.listen_addr",
            ent_type: "string",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_NODE_PORT",
            ent_path: "node.port",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_TELEMETRY_LOGS_FILE_DIR",
            ent_path: "telemetry.logs.file.dir",
            ent_type: "string",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_TELEMETRY_LOGS_FILE_FILTER",
            ent_path: "telemetry.logs.file.filter",
            ent_type: "string",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_TELEMETRY_LOGS_FILE_MAX_FILES",
            ent_path: "telemetry.logs.file.max_files",
            ent_type: "integer",
        },
        OptionEntry {
            env_name: "QUORUMKV_CONFIG_TELEMETRY_LOGS_STDERR_FILTER",
            ent_path: "telemetry.logs.stderr.filter",
            ent_type: "string",
        },
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        insta::assert_toml_snapshot!(config, @r"
        [node]
        id = 1
        port = 0
        listen_addr = '0.0.0.0:0'

        [cluster]
        tfail = 5
        tremove = 20
        replication_factor = 3
        ring_size = 65536
        transaction_timeout_ticks = 10
        tick_interval_millis = 1000
        gossip_fanout_floor = 3
        [telemetry.logs.file]
        filter = 'INFO'
        dir = 'logs'
        max_files = 64

        [telemetry.logs.stderr]
        filter = 'INFO'
        ");
    }
}
