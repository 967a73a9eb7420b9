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

//! Properties that must hold for every valid fabric, not only for the default one.

use crate::compiler::{compile, verify_program, MatchValue, Table};
use crate::topology::{build_topology, FabricParams, NodeName, SwitchRole};
use crate::{allocator::*, compile_fabric};
use std::collections::{HashMap, HashSet};

fn fabrics() -> Vec<FabricParams> {
    vec![
        FabricParams::default(),
        FabricParams::new(1, 1, 1),
        FabricParams::new(2, 1, 3),
        FabricParams::new(6, 2, 4),
        FabricParams::new(16, 2, 2),
    ]
}

#[test]
fn test_determinism() {
    for params in fabrics() {
        let a = compile_fabric(params, &AllocatorConfig::default()).unwrap();
        let b = compile_fabric(params, &AllocatorConfig::default()).unwrap();
        assert_eq!(a.topology, b.topology);
        assert_eq!(a.endpoints, b.endpoints);
        assert_eq!(a.plan, b.plan);
    }
}

#[test]
fn test_index_partition() {
    for params in fabrics() {
        let topo = build_topology(params).unwrap();
        let plan = compile(&topo).unwrap();
        assert_eq!(plan.len(), params.num_switches());
        for (switch, entries) in plan.iter() {
            let end = verify_program(switch, entries).unwrap();
            let expected = match switch.role().unwrap() {
                SwitchRole::Core => params.k,
                SwitchRole::AggUpper => 2,
                SwitchRole::AggLower => 2 + 2 * params.k,
            };
            assert_eq!(end as usize, expected, "wrong global offset on {}", switch);
        }
    }
}

#[test]
fn test_host_roundtrip() {
    for params in fabrics() {
        let topo = build_topology(params).unwrap();
        let plan = compile(&topo).unwrap();
        for host in topo.hosts() {
            let mut found = Vec::new();
            for (switch, entries) in plan.iter() {
                for entry in entries.iter().filter(|e| e.table == Table::SubTableSize) {
                    let prefix = entry.prefix().unwrap();
                    if prefix.prefix_len() == 32 && prefix.addr() == host.address() {
                        found.push(switch);
                    }
                }
            }
            assert_eq!(found.len(), 1, "{} matched on {:?}", host.name(), found);
            let lower = found[0];
            assert_eq!(lower.role(), Some(SwitchRole::AggLower));

            // the single routing entry of that bucket leads to the host
            let entries = plan.get(lower).unwrap();
            let offset = entries
                .iter()
                .find(|e| {
                    e.table == Table::SubTableOffset
                        && e.prefix().map(|p| p.addr()) == Some(host.address())
                })
                .and_then(|e| e.get_param("offset"))
                .unwrap();
            let row = entries.iter().find(|e| e.index() == Some(offset)).unwrap();
            let port = row.port().unwrap() as u16;
            assert_eq!(topo.neighbor_on(lower, port), Some(host.name()));
        }
    }
}

#[test]
fn test_port_agreement() {
    for params in fabrics() {
        let topo = build_topology(params).unwrap();
        let mut used: HashSet<(NodeName, u16)> = HashSet::new();
        for link in topo.links() {
            assert!(
                used.insert((link.src, link.src_port)),
                "{}:{} used twice",
                link.src,
                link.src_port
            );
            assert_eq!(topo.port_towards(link.src, link.dst), Ok(link.src_port));
            assert_eq!(topo.port_towards(link.dst, link.src), Ok(link.dst_port));
        }
        assert!(topo.is_connected());
    }
}

#[test]
fn test_next_hops_are_neighbors() {
    for params in fabrics() {
        let topo = build_topology(params).unwrap();
        let plan = compile(&topo).unwrap();
        for (switch, entries) in plan.iter() {
            for entry in entries.iter().filter(|e| e.port().is_some()) {
                let port = entry.port().unwrap() as u16;
                let neighbor = topo.neighbor_on(switch, port);
                assert!(neighbor.is_some(), "{}: port {} is not connected", switch, port);
                if entry.table == Table::PostFixTable {
                    assert_eq!(neighbor.and_then(|n| n.role()), Some(SwitchRole::Core));
                }
            }
        }
    }
}

#[test]
fn test_core_reaches_every_pod() {
    for params in fabrics() {
        let topo = build_topology(params).unwrap();
        let plan = compile(&topo).unwrap();
        for core in topo.switches_by_role(SwitchRole::Core) {
            let entries = plan.get(core.name()).unwrap();
            let mut offsets: HashMap<u8, u32> = HashMap::new();
            for e in entries.iter().filter(|e| e.table == Table::SubTableOffset) {
                let prefix = e.prefix().unwrap();
                assert_eq!(prefix.prefix_len(), 16);
                offsets.insert(prefix.addr().octets()[1], e.get_param("offset").unwrap());
            }
            assert_eq!(offsets.len(), params.k);
            for (pod, offset) in offsets {
                let row = entries
                    .iter()
                    .find(|e| {
                        e.get_match("metadata.final_offset") == Some(MatchValue::Exact(offset))
                    })
                    .unwrap();
                let neighbor = topo.neighbor_on(core.name(), row.port().unwrap() as u16).unwrap();
                assert_eq!(neighbor.pod(), Some(pod));
            }
        }
    }
}

#[test]
fn test_endpoints_unique() {
    for params in fabrics() {
        let fabric = compile_fabric(params, &AllocatorConfig::default()).unwrap();
        let ports = fabric.endpoints.iter().map(|(_, a)| a.port()).collect::<HashSet<_>>();
        assert_eq!(ports.len(), params.num_switches());
        for switch in fabric.topology.switches() {
            assert!(fabric.endpoints.get(switch.name()).is_some());
        }
    }
}
