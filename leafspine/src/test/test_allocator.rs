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

//! Test the assignment of control-plane endpoints.

use crate::allocator::*;
use crate::topology::{build_topology, FabricParams, NodeName};
use maplit::hashmap;
use std::net::{Ipv4Addr, SocketAddr};

fn endpoint(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[test]
fn test_default_allocation() {
    let topo = build_topology(FabricParams::default()).unwrap();
    let endpoints = allocate(&topo, &AllocatorConfig::default()).unwrap();
    assert_eq!(endpoints.len(), 20);

    let ports = endpoints.iter().map(|(_, addr)| addr.port()).collect::<Vec<_>>();
    assert_eq!(ports, (50051..=50070).collect::<Vec<u16>>());

    let expected = hashmap! {
        NodeName::Core { row: 1, col: 1 } => endpoint(50051),
        NodeName::Core { row: 2, col: 2 } => endpoint(50054),
        NodeName::Lower { pod: 0, num: 0 } => endpoint(50055),
        NodeName::Lower { pod: 0, num: 1 } => endpoint(50056),
        NodeName::Lower { pod: 3, num: 1 } => endpoint(50062),
        NodeName::Upper { pod: 0, num: 2 } => endpoint(50063),
        NodeName::Upper { pod: 3, num: 3 } => endpoint(50070),
    };
    for (name, addr) in expected {
        assert_eq!(endpoints.get(name), Some(addr), "wrong endpoint for {}", name);
    }
    assert_eq!(endpoints.get(NodeName::Host { pod: 0, num: 0, child: 2 }), None);
}

#[test]
fn test_allocation_order() {
    let topo = build_topology(FabricParams::default()).unwrap();
    let endpoints = allocate(&topo, &AllocatorConfig::default()).unwrap();
    let roles = endpoints.iter().map(|(n, _)| n.role().unwrap()).collect::<Vec<_>>();
    let expected = ALLOCATION_ORDER
        .iter()
        .flat_map(|r| std::iter::repeat(*r).take(topo.switches_by_role(*r).count()))
        .collect::<Vec<_>>();
    assert_eq!(roles, expected);
}

#[test]
fn test_custom_config() {
    let topo = build_topology(FabricParams::new(1, 1, 1)).unwrap();
    let config = AllocatorConfig { address: Ipv4Addr::new(192, 168, 0, 1), port_base: 9000 };
    let endpoints = allocate(&topo, &config).unwrap();
    assert_eq!(
        endpoints.iter().map(|(n, a)| (n.to_string(), a.to_string())).collect::<Vec<_>>(),
        vec![
            ("core1_1".to_string(), "192.168.0.1:9001".to_string()),
            ("lowr0_0".to_string(), "192.168.0.1:9002".to_string()),
            ("lowr0_1".to_string(), "192.168.0.1:9003".to_string()),
            ("uppr0_2".to_string(), "192.168.0.1:9004".to_string()),
            ("uppr0_3".to_string(), "192.168.0.1:9005".to_string()),
        ]
    );
}

#[test]
fn test_port_overflow() {
    let topo = build_topology(FabricParams::new(1, 1, 1)).unwrap();
    let config = AllocatorConfig { port_base: u16::MAX - 4, ..Default::default() };
    assert_eq!(
        allocate(&topo, &config),
        Err(AllocationError::PortOverflow(NodeName::Upper { pod: 0, num: 3 }))
    );
}
