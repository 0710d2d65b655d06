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

use behavior_tests::Cluster;
use quorumkv_server::ClusterConfig;

fn small_ring_config() -> ClusterConfig {
    ClusterConfig {
        ring_size: 1 << 10,
        ..ClusterConfig::default()
    }
}

#[test]
fn test_cluster_formation_and_heartbeat_propagation() {
    let mut cluster = Cluster::new(5, small_ring_config());
    cluster.join_all();
    cluster.settle(8);

    assert!(cluster.all_in_group());
    for id in 1..=5 {
        let table = cluster.node(id).membership().table();
        assert_eq!(table.active_len(), 5, "node {id} should see all five peers as active");
    }

    let hb_before = cluster.node(1).membership().table().get_active(cluster.addr(2)).unwrap().heartbeat;
    cluster.settle(3);
    let hb_after = cluster.node(1).membership().table().get_active(cluster.addr(2)).unwrap().heartbeat;
    assert!(hb_after > hb_before, "heartbeats must keep advancing as the cluster gossips");
}

#[test]
fn test_create_then_read_quorum_across_natural_nodes() {
    let mut cluster = Cluster::new(5, small_ring_config());
    cluster.join_all();
    cluster.settle(8);

    cluster.node_mut(1).create("widget", "gizmo");
    cluster.settle(4);

    assert!(cluster.events(1).contains(&"CreateSuccess(widget)".to_string()));
    assert!(cluster.replicas_holding("widget") >= 3, "all natural nodes must hold the written key");

    cluster.node_mut(2).read("widget");
    cluster.settle(4);
    assert!(
        cluster.events(2).iter().any(|e| e == "ReadSuccess(widget,gizmo)"),
        "events were: {:?}",
        cluster.events(2)
    );
}

#[test]
fn test_failure_detection_and_removal_reshapes_the_ring() {
    let config = ClusterConfig {
        ring_size: 1 << 10,
        tfail: 3,
        tremove: 6,
        ..ClusterConfig::default()
    };
    let mut cluster = Cluster::new(5, config);
    cluster.join_all();
    cluster.settle(8);
    assert!(cluster.all_in_group());

    let dead = cluster.addr(5);
    // Node 5 stops ticking: it sends no more heartbeats, so its peers'
    // failure detectors will time it out.
    for _ in 0..(config.tfail as usize + 2) {
        for id in 1..=4 {
            cluster.node_mut(id).tick();
        }
    }
    for id in 1..=4 {
        assert!(cluster.node(id).membership().table().is_failed(dead), "node {id} should mark node 5 failed");
    }

    for _ in 0..(config.tremove as usize + 2) {
        for id in 1..=4 {
            cluster.node_mut(id).tick();
        }
    }
    for id in 1..=4 {
        let table = cluster.node(id).membership().table();
        assert!(!table.is_failed(dead));
        assert!(!table.is_active(dead));
        assert_eq!(table.active_len(), 4);
    }

    // The ring rebuilds on the next tick from the shrunk active set.
    cluster.node_mut(1).tick();
    assert_eq!(cluster.node(1).ring().len(), 4);
}

#[test]
fn test_read_succeeds_after_a_replica_is_removed_from_the_ring() {
    let config = ClusterConfig {
        ring_size: 1 << 10,
        tfail: 3,
        tremove: 6,
        replication_factor: 3,
        ..ClusterConfig::default()
    };
    let mut cluster = Cluster::new(5, config);
    cluster.join_all();
    cluster.settle(8);

    cluster.node_mut(1).create("durable", "value");
    cluster.settle(4);
    assert!(cluster.replicas_holding("durable") >= 3);

    // Take node 5 down and let the cluster reconverge around 4 members.
    for _ in 0..(config.tremove as usize + config.tfail as usize + 4) {
        for id in 1..=4 {
            cluster.node_mut(id).tick();
        }
    }
    for id in 1..=4 {
        assert_eq!(cluster.node(id).membership().table().active_len(), 4);
    }

    cluster.node_mut(2).read("durable");
    cluster.settle(4);
    assert!(
        cluster.events(2).iter().any(|e| e == "ReadSuccess(durable,value)"),
        "read should still succeed from the remaining replicas; events were: {:?}",
        cluster.events(2)
    );
}
