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

//! # Routing Table Compiler
//!
//! Compiles the forwarding entries of every switch in the [`Topology`]. The data plane resolves a
//! packet in two steps: First, the destination prefix is matched in `sub_table_size` and
//! `sub_table_offset`, which yields a bucket `[offset, offset + size)` of equally good next hops.
//! Then, the data plane picks `offset + (hash % size)` and looks up the egress port in the flat
//! `routing_table`. Upper switches additionally get a `post_fix_table`, which matches on the
//! low-order octet of the destination.
//!
//! Every switch keeps its own [`IndexSpace`], starting at offset 0. For every destination group,
//! the entries are emitted in the order size, offset, and then the `size` routing table entries.
//! This order must be kept when installing the entries.
//!
//! | role  | destination groups                                        | bucket                |
//! |-------|-----------------------------------------------------------|-----------------------|
//! | core  | `10.{pod}.0.0/16` for every pod                           | port towards the pod  |
//! | upper | `10.{pod}.{num}.0/24`                                     | ports 0 and 1 (lower) |
//! | lower | `10.{pod}.{num}.{child}/32` for every attached host       | port towards the host |
//! | lower | `10.{target}.0.0/16` for every pod                        | ports 2 and 3 (upper) |
//!
//! ```rust
//! use leafspine::compiler::{compile, verify_program};
//! use leafspine::topology::{build_topology, FabricParams, NodeName};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let topo = build_topology(FabricParams::default())?;
//!     let plan = compile(&topo)?;
//!
//!     let lower = NodeName::Lower { pod: 1, num: 0 };
//!     let entries = plan.get(lower).unwrap();
//!     assert_eq!(verify_program(lower, entries)?, 10);
//!     Ok(())
//! }
//! ```

mod entry;
mod index_space;

pub use entry::{
    field, param, Action, ActionParam, FieldMatch, MatchValue, Table, TableEntry,
    MAX_BUCKET_SIZE, PIPELINE,
};
pub use index_space::{verify_program, IndexSpace};

use crate::topology::{NodeName, Port, SwitchRole, Topology, TopologyError, HOST_CHILDREN};

use ipnet::{Ipv4Net, PrefixLenError};
use log::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use thiserror::Error;

/// # Routing Plan
///
/// Ordered entries of every switch. Iterating over the plan yields the switches in the order
/// core, upper, lower, which is the recommended order for installing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutingPlan {
    programs: BTreeMap<NodeName, Vec<TableEntry>>,
}

impl RoutingPlan {
    /// Returns the entries of a switch
    pub fn get(&self, switch: NodeName) -> Option<&[TableEntry]> {
        self.programs.get(&switch).map(|e| e.as_slice())
    }

    /// Iterate over all switches and their entries, in the order core, upper, lower.
    pub fn iter(&self) -> impl Iterator<Item = (NodeName, &[TableEntry])> + '_ {
        self.programs.iter().map(|(n, e)| (*n, e.as_slice()))
    }

    /// Iterate over all switches in the plan
    pub fn switches(&self) -> impl Iterator<Item = NodeName> + '_ {
        self.programs.keys().copied()
    }

    /// Number of switches in the plan
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns true if the plan contains no switch
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Total number of entries of all switches
    pub fn num_entries(&self) -> usize {
        self.programs.values().map(|e| e.len()).sum()
    }
}

/// Compiler Errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A bucket overlaps a previously assigned range of the routing table.
    #[error(
        "Offset collision on {switch}: [{offset}, +{size}) overlaps \
         [{existing_offset}, +{existing_size})"
    )]
    OffsetCollision {
        /// Switch on which the collision happens
        switch: NodeName,
        /// Offset of the new bucket
        offset: u32,
        /// Size of the new bucket
        size: u32,
        /// Offset of the existing bucket
        existing_offset: u32,
        /// Size of the existing bucket
        existing_size: u32,
    },
    /// A bucket would end beyond the largest routing table index.
    #[error("Bucket [{offset}, +{size}) on {switch} exceeds the index range")]
    IndexOverflow {
        /// Switch of the bucket
        switch: NodeName,
        /// Offset of the bucket
        offset: u32,
        /// Size of the bucket
        size: u32,
    },
    /// The bucket size is zero, or larger than the data plane supports.
    #[error("Invalid bucket size on {switch}: {size}")]
    InvalidBucketSize {
        /// Switch of the bucket
        switch: NodeName,
        /// Requested size
        size: u32,
    },
    /// An index below the global offset is not covered by any bucket or routing entry.
    #[error("Index {index} on {switch} is not covered")]
    IndexGap {
        /// Switch with the gap
        switch: NodeName,
        /// First uncovered index
        index: u32,
    },
    /// A prefix has no size or no offset, or more than one of either.
    #[error("Inconsistent size and offset entries for {prefix} on {switch}")]
    InconsistentGroup {
        /// Switch of the group
        switch: NodeName,
        /// Destination prefix
        prefix: Ipv4Net,
    },
    /// A routing table entry comes before the bucket containing it.
    #[error("Routing table entry {index} on {switch} precedes its bucket")]
    UnorderedEntry {
        /// Switch of the entry
        switch: NodeName,
        /// Index of the entry
        index: u32,
    },
    /// An entry lacks its match field or action parameter.
    #[error("Malformed entry on {0}")]
    MalformedEntry(NodeName),
    /// Destination prefix cannot be constructed
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(#[from] PrefixLenError),
    /// Error propagated from the topology
    #[error("Topology Error: {0}")]
    Topology(#[from] TopologyError),
}

/// Compile the entries of all switches in the topology.
pub fn compile(topo: &Topology) -> Result<RoutingPlan, CompileError> {
    let mut plan = RoutingPlan::default();
    for switch in topo.switches() {
        let entries = compile_switch(topo, switch.name())?;
        plan.programs.insert(switch.name(), entries);
    }
    info!("Compiled {} entries for {} switches", plan.num_entries(), plan.len());
    Ok(plan)
}

/// Compile the entries of a single switch.
pub fn compile_switch(topo: &Topology, name: NodeName) -> Result<Vec<TableEntry>, CompileError> {
    let switch = topo.switch(name)?;
    let mut program = ProgramBuilder::new(name);
    match switch.role() {
        SwitchRole::Core => compile_core(topo, &mut program)?,
        SwitchRole::AggUpper => compile_upper(topo, &mut program)?,
        SwitchRole::AggLower => compile_lower(topo, &mut program)?,
    }
    debug!(
        "{}: {} buckets, global offset {}, {} entries",
        name,
        program.space.num_buckets(),
        program.space.global_offset(),
        program.entries.len()
    );
    Ok(program.entries)
}

/// Every pod is reached over the single link towards that pod.
fn compile_core(topo: &Topology, program: &mut ProgramBuilder) -> Result<(), CompileError> {
    let core = program.switch;
    for pod in topo.params().pod_ids() {
        let ports = topo.ports_where(core, |n| n.pod() == Some(pod));
        program.add_group(pod_prefix(pod)?, &ports)?;
    }
    Ok(())
}

fn compile_upper(topo: &Topology, program: &mut ProgramBuilder) -> Result<(), CompileError> {
    let upper = program.switch;
    let (pod, num) = match upper {
        NodeName::Upper { pod, num } => (pod, num),
        _ => return Err(TopologyError::NodeNotFound(upper).into()),
    };

    // inner pod: spread over both lower switches
    let downlinks = topo.ports_where(upper, |n| n.role() == Some(SwitchRole::AggLower));
    program.add_group(Ipv4Net::new(Ipv4Addr::new(10, pod, num, 0), 24)?, &downlinks)?;

    // post fix: fixed assignment of the low-order octet to the core uplinks
    for target in HOST_CHILDREN {
        let port = Port::from((target - HOST_CHILDREN.start + num) % 2) + 2;
        match topo.neighbor_on(upper, port) {
            Some(NodeName::Core { .. }) => {
                program.add_post_fix(Ipv4Addr::new(0, 0, 0, target), port)
            }
            _ => debug!("{}: port {} is not a core uplink, skip post fix {}", upper, port, target),
        }
    }
    Ok(())
}

fn compile_lower(topo: &Topology, program: &mut ProgramBuilder) -> Result<(), CompileError> {
    let lower = program.switch;

    // direct delivery to the attached hosts
    let host_links = topo.links_of(lower).filter(|l| l.dst.is_host()).copied().collect::<Vec<_>>();
    for link in host_links {
        let host = topo.host(link.dst)?;
        program.add_group(Ipv4Net::new(host.address(), 32)?, &[link.src_port])?;
    }

    // every pod (including the own one) over both upper switches
    let uplinks = topo.ports_where(lower, |n| n.role() == Some(SwitchRole::AggUpper));
    for target in topo.params().pod_ids() {
        program.add_group(pod_prefix(target)?, &uplinks)?;
    }
    Ok(())
}

fn pod_prefix(pod: u8) -> Result<Ipv4Net, CompileError> {
    Ok(Ipv4Net::new(Ipv4Addr::new(10, pod, 0, 0), 16)?)
}

/// Accumulates the entries of a single switch, together with its index space.
#[derive(Debug)]
struct ProgramBuilder {
    switch: NodeName,
    space: IndexSpace,
    entries: Vec<TableEntry>,
}

impl ProgramBuilder {
    fn new(switch: NodeName) -> Self {
        Self { switch, space: IndexSpace::new(switch), entries: Vec::new() }
    }

    /// Emit size, offset and one routing table entry per port, and advance the global offset.
    fn add_group(&mut self, prefix: Ipv4Net, ports: &[Port]) -> Result<(), CompileError> {
        let size = ports.len() as u32;
        let offset = self.space.reserve(size)?;
        trace!("{}: {} -> [{}, +{}) ports {:?}", self.switch, prefix, offset, size, ports);
        self.entries.push(TableEntry::sub_table_size(prefix, size));
        self.entries.push(TableEntry::sub_table_offset(prefix, offset));
        for (i, port) in ports.iter().enumerate() {
            self.entries.push(TableEntry::routing(offset + i as u32, *port));
        }
        Ok(())
    }

    fn add_post_fix(&mut self, masked: Ipv4Addr, port: Port) {
        trace!("{}: post fix {} -> port {}", self.switch, masked, port);
        self.entries.push(TableEntry::post_fix(masked, port));
    }
}
