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

//! # Helper (printer) functions
//! Module containing helper functions to get formatted strings of the topology, the control
//! endpoints and the compiled table entries.

use crate::allocator::ControlEndpoints;
use crate::compiler::{RoutingPlan, TableEntry};
use crate::topology::{NodeName, SwitchRole, Topology};

use itertools::Itertools;

/// Returns the formatted string of a single table entry, for example:
///
/// ```text
/// MyIngress.sub_table_size: hdr.ipv4.dstAddr=10.0.0.0/16 -> MyIngress.set_sub_table_size(len=1)
/// ```
pub fn table_entry(entry: &TableEntry) -> String {
    format!(
        "{}: {} -> {}({})",
        entry.table.qualified_name(),
        entry.matches.iter().map(|m| format!("{}={}", m.field, m.value)).join(", "),
        entry.action.qualified_name(),
        entry.params.iter().map(|p| format!("{}={}", p.name, p.value)).join(", "),
    )
}

/// Get a vector of strings, which represent the program of a single switch. The first line is the
/// switch name, followed by one indented line per entry, in installation order.
pub fn switch_program(switch: NodeName, entries: &[TableEntry]) -> Vec<String> {
    let mut result = Vec::with_capacity(entries.len() + 1);
    result.push(format!("{} ({} entries)", switch, entries.len()));
    result.extend(entries.iter().map(|e| format!("    {}", table_entry(e))));
    result
}

/// Get the programs of all switches in the plan, in installation order.
pub fn routing_plan(plan: &RoutingPlan) -> Vec<String> {
    plan.iter().flat_map(|(switch, entries)| switch_program(switch, entries)).collect()
}

/// Get a vector of strings describing all switches, hosts and links of the topology. Every
/// physical link is printed only once.
pub fn topology(topo: &Topology) -> Vec<String> {
    let params = topo.params();
    let mut result = vec![format!(
        "Fabric with k={}, {} core rows, {} core columns",
        params.k, params.rows, params.cols
    )];
    for role in [SwitchRole::Core, SwitchRole::AggUpper, SwitchRole::AggLower] {
        result.push(format!("{} switches:", role));
        result.extend(
            topo.switches_by_role(role).map(|s| format!("    {:<10} {}", s.name(), s.address())),
        );
    }
    result.push(String::from("hosts:"));
    result.extend(
        topo.hosts().iter().map(|h| format!("    {:<10} {} {}", h.name(), h.address(), h.mac())),
    );
    result.push(String::from("links:"));
    result.extend(topo.links().iter().filter(|l| l.src < l.dst).map(|l| {
        format!("    {}:{} <-> {}:{}", l.src, l.src_port, l.dst, l.dst_port)
    }));
    result
}

/// Get a vector of strings with the control endpoint of every switch, in allocation order.
pub fn endpoints(endpoints: &ControlEndpoints) -> Vec<String> {
    endpoints.iter().map(|(name, addr)| format!("{:<10} {}", name, addr)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::TableEntry;
    use ipnet::Ipv4Net;
    use std::net::Ipv4Addr;

    #[test]
    fn format_entries() {
        let net = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 16).unwrap();
        assert_eq!(
            table_entry(&TableEntry::sub_table_size(net, 1)),
            "MyIngress.sub_table_size: hdr.ipv4.dstAddr=10.0.0.0/16 \
             -> MyIngress.set_sub_table_size(len=1)"
        );
        assert_eq!(
            table_entry(&TableEntry::routing(3, 2)),
            "MyIngress.routing_table: metadata.final_offset=3 -> MyIngress.set_nhop(port=2)"
        );
        assert_eq!(
            table_entry(&TableEntry::post_fix(Ipv4Addr::new(0, 0, 0, 2), 3)),
            "MyIngress.post_fix_table: metadata.masked_dst_ip=0.0.0.2 -> MyIngress.set_nhop(port=3)"
        );
    }

    #[test]
    fn format_program() {
        let switch = NodeName::Core { row: 1, col: 2 };
        let lines = switch_program(switch, &[TableEntry::routing(0, 1)]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "core1_2 (1 entries)");
        assert!(lines[1].starts_with("    MyIngress.routing_table"));
    }
}
