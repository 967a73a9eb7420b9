// Leafspine: ECMP Table Compiler for Spine-Leaf Fabrics
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Test the construction of the topology and the naming scheme.

use crate::topology::*;
use lazy_static::lazy_static;
use maplit::{btreeset, hashmap};
use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;

lazy_static! {
    static ref TOPO: Topology = build_topology(FabricParams::default()).unwrap();
    static ref CORE_1_1: NodeName = NodeName::Core { row: 1, col: 1 };
    static ref UPPR_0_2: NodeName = NodeName::Upper { pod: 0, num: 2 };
    static ref LOWR_0_1: NodeName = NodeName::Lower { pod: 0, num: 1 };
    static ref H_0_1_3: NodeName = NodeName::Host { pod: 0, num: 1, child: 3 };
}

#[test]
fn test_default_counts() {
    assert_eq!(TOPO.switches().len(), 20);
    assert_eq!(TOPO.switches_by_role(SwitchRole::Core).count(), 4);
    assert_eq!(TOPO.switches_by_role(SwitchRole::AggUpper).count(), 8);
    assert_eq!(TOPO.switches_by_role(SwitchRole::AggLower).count(), 8);
    assert_eq!(TOPO.hosts().len(), 16);
    // 16 host links, 16 lower-upper links and 16 core-upper links, each stored twice
    assert_eq!(TOPO.links().len(), 96);
}

#[test]
fn test_switch_order() {
    let roles = TOPO.switches().iter().map(|s| s.role()).collect::<Vec<_>>();
    let mut sorted = roles.clone();
    sorted.sort_by_key(|r| match r {
        SwitchRole::Core => 0,
        SwitchRole::AggUpper => 1,
        SwitchRole::AggLower => 2,
    });
    assert_eq!(roles, sorted);
    assert_eq!(TOPO.switches()[0].name(), *CORE_1_1);
    assert_eq!(TOPO.switches()[1].name(), NodeName::Core { row: 1, col: 2 });
    assert_eq!(TOPO.switches()[4].name(), *UPPR_0_2);
}

#[test]
fn test_addresses() {
    let expected = hashmap! {
        *CORE_1_1 => Ipv4Addr::new(10, 4, 1, 1),
        NodeName::Core { row: 2, col: 1 } => Ipv4Addr::new(10, 4, 2, 1),
        *UPPR_0_2 => Ipv4Addr::new(10, 0, 2, 1),
        NodeName::Upper { pod: 3, num: 3 } => Ipv4Addr::new(10, 3, 3, 1),
        *LOWR_0_1 => Ipv4Addr::new(10, 0, 1, 1),
    };
    for (name, addr) in expected {
        assert_eq!(TOPO.switch(name).unwrap().address(), addr);
    }
    let host = TOPO.host(*H_0_1_3).unwrap();
    assert_eq!(host.address(), Ipv4Addr::new(10, 0, 1, 3));
    assert_eq!(host.mac().bytes(), [0x08, 0, 0, 0, 1, 3]);
}

#[test]
fn test_core_addresses_distinct() {
    // with six pods, pod 4 exists next to the core switches
    let topo = build_topology(FabricParams::new(6, 2, 2)).unwrap();
    let core: HashSet<Ipv4Addr> =
        topo.switches_by_role(SwitchRole::Core).map(|s| s.address()).collect();
    assert_eq!(core.len(), 4);
    assert!(core.iter().all(|a| a.octets()[0] == 10 && a.octets()[1] == 6));

    let pods: Vec<Ipv4Addr> = topo
        .switches()
        .iter()
        .filter(|s| s.role() != SwitchRole::Core)
        .map(|s| s.address())
        .chain(topo.hosts().iter().map(|h| h.address()))
        .collect();
    assert_eq!(pods.len(), 6 * 4 + 6 * 4);
    for addr in pods.iter() {
        assert!(!core.contains(addr), "{} is used by a core and a pod node", addr);
    }
    assert_eq!(pods.iter().collect::<HashSet<_>>().len(), pods.len());

    let upper = NodeName::Upper { pod: 4, num: 2 };
    assert_eq!(topo.switch(upper).unwrap().address(), Ipv4Addr::new(10, 4, 2, 1));
    let core_switch = NodeName::Core { row: 2, col: 1 };
    assert_eq!(topo.switch(core_switch).unwrap().address(), Ipv4Addr::new(10, 6, 2, 1));
}

#[test]
fn test_lookup_errors() {
    assert_eq!(TOPO.switch(*H_0_1_3), Err(TopologyError::NodeNotFound(*H_0_1_3)));
    assert_eq!(TOPO.host(*LOWR_0_1), Err(TopologyError::NodeNotFound(*LOWR_0_1)));
    let missing = NodeName::Lower { pod: 9, num: 0 };
    assert_eq!(TOPO.switch(missing), Err(TopologyError::NodeNotFound(missing)));
    assert!(!TOPO.contains(missing));
    assert_eq!(TOPO.links_of(missing).count(), 0);
}

#[test]
fn test_ports() {
    // host - lower
    assert_eq!(TOPO.port_towards(*H_0_1_3, *LOWR_0_1), Ok(HOST_PORT));
    assert_eq!(TOPO.port_towards(*LOWR_0_1, *H_0_1_3), Ok(1));
    // lower - upper
    assert_eq!(TOPO.port_towards(*LOWR_0_1, *UPPR_0_2), Ok(2));
    assert_eq!(TOPO.port_towards(*UPPR_0_2, *LOWR_0_1), Ok(1));
    // core - upper
    assert_eq!(TOPO.port_towards(*CORE_1_1, *UPPR_0_2), Ok(0));
    assert_eq!(TOPO.port_towards(*UPPR_0_2, *CORE_1_1), Ok(2));
    assert_eq!(
        TOPO.port_towards(*CORE_1_1, NodeName::Upper { pod: 2, num: 2 }),
        Ok(2)
    );
    // core row 2 only reaches the upper switches with number 3
    assert_eq!(
        TOPO.port_towards(NodeName::Core { row: 2, col: 1 }, *UPPR_0_2),
        Err(TopologyError::NotConnected(NodeName::Core { row: 2, col: 1 }, *UPPR_0_2))
    );
}

#[test]
fn test_neighbors() {
    let upper_neighbors = TOPO.links_of(*UPPR_0_2).map(|l| l.dst).collect::<BTreeSet<_>>();
    assert_eq!(
        upper_neighbors,
        btreeset! {
            NodeName::Core { row: 1, col: 1 },
            NodeName::Core { row: 1, col: 2 },
            NodeName::Lower { pod: 0, num: 0 },
            NodeName::Lower { pod: 0, num: 1 },
        }
    );
    assert_eq!(TOPO.neighbor_on(*UPPR_0_2, 3), Some(NodeName::Core { row: 1, col: 2 }));
    assert_eq!(TOPO.neighbor_on(*UPPR_0_2, 4), None);
    assert_eq!(
        TOPO.ports_where(*LOWR_0_1, |n| n.role() == Some(SwitchRole::AggUpper)),
        vec![2, 3]
    );
    assert_eq!(TOPO.ports_where(*CORE_1_1, |n| n.pod() == Some(3)), vec![3]);
}

#[test]
fn test_links_are_symmetric() {
    for l in TOPO.links() {
        assert!(TOPO.links().contains(&l.reversed()), "missing reverse of {:?}", l);
    }
}

#[test]
fn test_connected() {
    assert!(TOPO.is_connected());
    let small = build_topology(FabricParams::new(1, 1, 1)).unwrap();
    assert!(small.is_connected());
    assert_eq!(small.switches().len(), 5);
    assert_eq!(small.hosts().len(), 4);
}

#[test]
fn test_invalid_params() {
    match build_topology(FabricParams::new(0, 2, 2)) {
        Err(TopologyError::InvalidTopologyParams { param: "k", value: 0, .. }) => {}
        r => panic!("unexpected result: {:?}", r.map(|t| t.params())),
    }
    match build_topology(FabricParams::new(4, 3, 2)) {
        Err(TopologyError::InvalidTopologyParams { param: "rows", value: 3, .. }) => {}
        r => panic!("unexpected result: {:?}", r.map(|t| t.params())),
    }
    match build_topology(FabricParams::new(4, 2, 0)) {
        Err(TopologyError::InvalidTopologyParams { param: "cols", value: 0, .. }) => {}
        r => panic!("unexpected result: {:?}", r.map(|t| t.params())),
    }
    assert!(build_topology(FabricParams::new(256, 1, 1)).is_err());
    assert!(build_topology(FabricParams::new(255, 1, 1)).is_ok());
}

#[test]
fn test_node_names() {
    let cases = vec![
        ("core1_2", NodeName::Core { row: 1, col: 2 }),
        ("uppr3_2", NodeName::Upper { pod: 3, num: 2 }),
        ("lowr0_1", NodeName::Lower { pod: 0, num: 1 }),
        ("h2_1_3", NodeName::Host { pod: 2, num: 1, child: 3 }),
    ];
    for (s, name) in cases {
        assert_eq!(s.parse::<NodeName>(), Ok(name));
        assert_eq!(name.to_string(), s);
    }
    for s in ["", "core1", "core1_2_3", "lowr_1", "spine1_1", "h1_2", "uppr1_x", "core300_1"] {
        assert_eq!(s.parse::<NodeName>(), Err(TopologyError::InvalidName(s.to_string())));
    }
}

#[test]
fn test_name_order() {
    let mut names = vec![*H_0_1_3, *LOWR_0_1, *UPPR_0_2, *CORE_1_1];
    names.sort();
    assert_eq!(names, vec![*CORE_1_1, *UPPR_0_2, *LOWR_0_1, *H_0_1_3]);
    assert_eq!(H_0_1_3.role(), None);
    assert_eq!(CORE_1_1.pod(), None);
    assert_eq!(LOWR_0_1.pod(), Some(0));
}

#[test]
fn test_deterministic() {
    let a = build_topology(FabricParams::new(3, 2, 3)).unwrap();
    let b = build_topology(FabricParams::new(3, 2, 3)).unwrap();
    assert_eq!(a, b);
}
