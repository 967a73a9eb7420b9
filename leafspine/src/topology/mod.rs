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

#![deny(missing_docs, missing_debug_implementations)]

//! # Topology Model
//!
//! This module enumerates all switches, hosts and links of the spine-leaf fabric, derived from
//! the [`FabricParams`]. Building the topology is a pure function: the same parameters always
//! produce the same topology, in the same order.
//!
//! ## Addressing
//!
//! - **Core switches** `core{row}_{col}`: `10.{k}.{row}.{col}` (`10.4.row.col` for `k = 4`)
//! - **Upper switches** `uppr{pod}_{num}`, `num ∈ {2, 3}`: `10.{pod}.{num}.1`
//! - **Lower switches** `lowr{pod}_{num}`, `num ∈ {0, 1}`: `10.{pod}.{num}.1`
//! - **Hosts** `h{pod}_{num}_{child}`, `child ∈ {2, 3}`: `10.{pod}.{num}.{child}`
//!
//! ## Wiring
//!
//! - host ↔ lower: host port 1, switch port `child - 2`
//! - lower ↔ upper (full mesh inside the pod): lower port is the upper switch number, upper port
//!   is the lower switch number.
//! - upper ↔ core: core `(row, col)` connects to `uppr{pod}_{row + 1}` of every pod, using port
//!   `pod` on the core switch and port `col + 1` on the upper switch.
//!
//! ```rust
//! use leafspine::topology::{build_topology, FabricParams, NodeName};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let topo = build_topology(FabricParams::default())?;
//!     assert_eq!(topo.switches().len(), 20);
//!     assert_eq!(topo.hosts().len(), 16);
//!
//!     let core: NodeName = "core1_2".parse()?;
//!     let upper: NodeName = "uppr3_2".parse()?;
//!     assert_eq!(topo.port_towards(core, upper)?, 3);
//!     assert_eq!(topo.port_towards(upper, core)?, 3);
//!     Ok(())
//! }
//! ```

pub(crate) mod types;

pub use types::{
    FabricParams, HostNode, Link, NodeName, Port, SwitchNode, SwitchRole, TopologyError,
    HOST_CHILDREN, HOST_PORT, LOWER_SWITCH_NUMS, MAX_CORE_COLS, MAX_CORE_ROWS, MAX_PODS,
    MAX_PORT, UPPER_SWITCH_NUMS,
};

use itertools::iproduct;
use log::*;
use mac_address::MacAddress;
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// # Topology
///
/// All nodes and links of the fabric, stored in flat vectors. Nodes are looked up by their
/// [`NodeName`], and links refer to nodes only by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    params: FabricParams,
    /// All switches, in the order core, upper, lower
    switches: Vec<SwitchNode>,
    hosts: Vec<HostNode>,
    /// Two directed records for every physical link
    links: Vec<Link>,
    switch_lookup: HashMap<NodeName, usize>,
    host_lookup: HashMap<NodeName, usize>,
    /// Indices into `links`, for every node in which it is the `src`.
    adjacency: HashMap<NodeName, Vec<usize>>,
}

/// Build the topology from the fan-out parameters. This fails with
/// [`TopologyError::InvalidTopologyParams`] if any address or port derived from the parameters is
/// out of range. No partial topology is returned.
pub fn build_topology(params: FabricParams) -> Result<Topology, TopologyError> {
    params.validate()?;

    let mut topo = Topology {
        params,
        switches: Vec::with_capacity(params.num_switches()),
        hosts: Vec::with_capacity(params.num_hosts()),
        links: Vec::new(),
        switch_lookup: HashMap::new(),
        host_lookup: HashMap::new(),
        adjacency: HashMap::new(),
    };

    topo.create_core_switches();
    topo.create_upper_switches();
    topo.create_lower_switches();
    topo.create_hosts();
    topo.create_links()?;

    debug!(
        "Built topology with {} switches, {} hosts and {} links",
        topo.switches.len(),
        topo.hosts.len(),
        topo.links.len() / 2
    );

    Ok(topo)
}

impl Topology {
    fn create_core_switches(&mut self) {
        let octet = self.params.core_octet();
        for (row, col) in iproduct!(self.params.core_rows(), self.params.core_cols()) {
            let name = NodeName::Core { row, col };
            self.add_switch(name, SwitchRole::Core, Ipv4Addr::new(10, octet, row, col));
        }
    }

    fn create_upper_switches(&mut self) {
        for (pod, num) in iproduct!(self.params.pod_ids(), UPPER_SWITCH_NUMS) {
            let name = NodeName::Upper { pod, num };
            self.add_switch(name, SwitchRole::AggUpper, Ipv4Addr::new(10, pod, num, 1));
        }
    }

    fn create_lower_switches(&mut self) {
        for (pod, num) in iproduct!(self.params.pod_ids(), LOWER_SWITCH_NUMS) {
            let name = NodeName::Lower { pod, num };
            self.add_switch(name, SwitchRole::AggLower, Ipv4Addr::new(10, pod, num, 1));
        }
    }

    fn create_hosts(&mut self) {
        for (pod, num, child) in iproduct!(self.params.pod_ids(), LOWER_SWITCH_NUMS, HOST_CHILDREN)
        {
            let name = NodeName::Host { pod, num, child };
            let mac = MacAddress::new([0x08, 0x00, 0x00, pod, num, child]);
            self.host_lookup.insert(name, self.hosts.len());
            self.hosts.push(HostNode::new(name, Ipv4Addr::new(10, pod, num, child), mac));
        }
    }

    fn create_links(&mut self) -> Result<(), TopologyError> {
        // lower switches to hosts
        for (pod, num) in iproduct!(self.params.pod_ids(), LOWER_SWITCH_NUMS) {
            let lower = NodeName::Lower { pod, num };
            for child in HOST_CHILDREN {
                let host = NodeName::Host { pod, num, child };
                self.add_link(host, HOST_PORT, lower, Port::from(child - HOST_CHILDREN.start))?;
            }
        }

        // lower switches to upper switches
        for (pod, num) in iproduct!(self.params.pod_ids(), LOWER_SWITCH_NUMS) {
            let lower = NodeName::Lower { pod, num };
            for upper_num in UPPER_SWITCH_NUMS {
                let upper = NodeName::Upper { pod, num: upper_num };
                self.add_link(lower, Port::from(upper_num), upper, Port::from(num))?;
            }
        }

        // core switches to upper switches
        for (row, col) in iproduct!(self.params.core_rows(), self.params.core_cols()) {
            let core = NodeName::Core { row, col };
            for pod in self.params.pod_ids() {
                let upper = NodeName::Upper { pod, num: row + 1 };
                self.add_link(core, Port::from(pod), upper, Port::from(col) + 1)?;
            }
        }

        Ok(())
    }

    fn add_switch(&mut self, name: NodeName, role: SwitchRole, address: Ipv4Addr) {
        self.switch_lookup.insert(name, self.switches.len());
        self.switches.push(SwitchNode::new(name, role, address));
    }

    /// Add both directed records of a link, after checking that both ports are valid and unused.
    fn add_link(
        &mut self,
        a: NodeName,
        a_port: Port,
        b: NodeName,
        b_port: Port,
    ) -> Result<(), TopologyError> {
        for (node, port) in [(a, a_port), (b, b_port)] {
            if !self.contains(node) {
                return Err(TopologyError::NodeNotFound(node));
            }
            if port > MAX_PORT {
                return Err(TopologyError::InvalidTopologyParams {
                    param: "port",
                    value: port as usize,
                    reason: "exceeds the data-plane port range",
                });
            }
            if self.links_of(node).any(|l| l.src_port == port) {
                return Err(TopologyError::PortCollision { node, port });
            }
        }

        let link = Link { src: a, src_port: a_port, dst: b, dst_port: b_port };
        for l in [link, link.reversed()] {
            self.adjacency.entry(l.src).or_default().push(self.links.len());
            self.links.push(l);
        }
        Ok(())
    }

    /// Returns the parameters from which the topology was built.
    pub fn params(&self) -> FabricParams {
        self.params
    }

    /// Returns all switches, in the order core, upper, lower.
    pub fn switches(&self) -> &[SwitchNode] {
        &self.switches
    }

    /// Returns all switches of the given role, in creation order.
    pub fn switches_by_role(&self, role: SwitchRole) -> impl Iterator<Item = &SwitchNode> + '_ {
        self.switches.iter().filter(move |s| s.role() == role)
    }

    /// Returns all hosts
    pub fn hosts(&self) -> &[HostNode] {
        &self.hosts
    }

    /// Returns all directed link records. Every physical link appears twice.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns true if the node (switch or host) exists.
    pub fn contains(&self, name: NodeName) -> bool {
        self.switch_lookup.contains_key(&name) || self.host_lookup.contains_key(&name)
    }

    /// Returns the switch with the given name.
    pub fn switch(&self, name: NodeName) -> Result<&SwitchNode, TopologyError> {
        self.switch_lookup
            .get(&name)
            .map(|idx| &self.switches[*idx])
            .ok_or(TopologyError::NodeNotFound(name))
    }

    /// Returns the host with the given name.
    pub fn host(&self, name: NodeName) -> Result<&HostNode, TopologyError> {
        self.host_lookup
            .get(&name)
            .map(|idx| &self.hosts[*idx])
            .ok_or(TopologyError::NodeNotFound(name))
    }

    /// Returns all links of a node, seen from that node, in the order in which they were created.
    pub fn links_of(&self, name: NodeName) -> impl Iterator<Item = &Link> + '_ {
        self.adjacency.get(&name).into_iter().flatten().map(move |idx| &self.links[*idx])
    }

    /// Returns the local port of `from` on the link towards `to`.
    pub fn port_towards(&self, from: NodeName, to: NodeName) -> Result<Port, TopologyError> {
        if !self.contains(from) {
            return Err(TopologyError::NodeNotFound(from));
        }
        self.links_of(from)
            .find(|l| l.dst == to)
            .map(|l| l.src_port)
            .ok_or(TopologyError::NotConnected(from, to))
    }

    /// Returns the node connected to the given local port, if any.
    pub fn neighbor_on(&self, name: NodeName, port: Port) -> Option<NodeName> {
        self.links_of(name).find(|l| l.src_port == port).map(|l| l.dst)
    }

    /// Returns the local ports of `name` leading to a node for which `filter` returns true, in
    /// ascending order.
    pub fn ports_where<F>(&self, name: NodeName, filter: F) -> Vec<Port>
    where
        F: Fn(&NodeName) -> bool,
    {
        let mut ports: Vec<Port> =
            self.links_of(name).filter(|l| filter(&l.dst)).map(|l| l.src_port).collect();
        ports.sort_unstable();
        ports
    }

    /// Returns true if every node can reach every other node over the links.
    pub fn is_connected(&self) -> bool {
        let mut graph: UnGraph<NodeName, ()> = UnGraph::default();
        let mut idx = HashMap::new();
        let switches = self.switches.iter().map(|s| s.name());
        for name in switches.chain(self.hosts.iter().map(|h| h.name())) {
            idx.insert(name, graph.add_node(name));
        }
        // only add every physical link once
        for l in self.links.iter().filter(|l| l.src < l.dst) {
            graph.add_edge(idx[&l.src], idx[&l.dst], ());
        }
        connected_components(&graph) == 1
    }
}
