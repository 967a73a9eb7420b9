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

//! Module containing all type definitions of the topology model

use mac_address::MacAddress;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::{Range, RangeInclusive};
use std::str::FromStr;
use thiserror::Error;

/// Port number of a switch or host interface.
pub type Port = u16;

/// Largest port number the data plane can address (9 bit egress port).
pub const MAX_PORT: Port = 511;
/// Switch numbers of the lower (host-facing) switches inside every pod.
pub const LOWER_SWITCH_NUMS: Range<u8> = 0..2;
/// Switch numbers of the upper (spine-facing) switches inside every pod.
pub const UPPER_SWITCH_NUMS: Range<u8> = 2..4;
/// Child numbers of the hosts attached to every lower switch. The child number is also the last
/// octet of the host address.
pub const HOST_CHILDREN: Range<u8> = 2..4;
/// Local port of every host towards its lower switch.
pub const HOST_PORT: Port = 1;

/// Largest number of pods. Pods use the second address octet `0..k`, and the core switches use
/// the octet `k` itself.
pub const MAX_PODS: usize = 255;
/// Largest number of core rows. Core row `r` attaches to the upper switch `r + 1` of every pod.
pub const MAX_CORE_ROWS: usize = 2;
/// Largest number of core columns (last octet of the core address).
pub const MAX_CORE_COLS: usize = 255;

/// # Fabric Parameters
///
/// Fan-out degree `k` (number of pods) and the dimensions of the core grid. All other quantities
/// of the topology are derived from these three numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FabricParams {
    /// Number of pods
    pub k: usize,
    /// Number of rows in the core grid
    pub rows: usize,
    /// Number of columns in the core grid
    pub cols: usize,
}

impl Default for FabricParams {
    fn default() -> Self {
        Self { k: 4, rows: 2, cols: 2 }
    }
}

impl FabricParams {
    /// Create new fabric parameters. They are not checked until [`FabricParams::validate`] is
    /// called (which happens when building the topology).
    pub fn new(k: usize, rows: usize, cols: usize) -> Self {
        Self { k, rows, cols }
    }

    /// Check that all derived addresses and ports stay within their valid range.
    pub fn validate(&self) -> Result<(), TopologyError> {
        check_param("k", self.k, MAX_PODS, "pod and core addresses use the second octet")?;
        check_param("rows", self.rows, MAX_CORE_ROWS, "core row r attaches to upper switch r + 1")?;
        check_param("cols", self.cols, MAX_CORE_COLS, "core column is the last address octet")?;
        Ok(())
    }

    /// Pod identifiers `0..k`. Only meaningful on validated parameters.
    pub fn pod_ids(&self) -> Range<u8> {
        0..self.k as u8
    }

    /// Core rows `1..=rows`. Only meaningful on validated parameters.
    pub fn core_rows(&self) -> RangeInclusive<u8> {
        1..=self.rows as u8
    }

    /// Core columns `1..=cols`. Only meaningful on validated parameters.
    pub fn core_cols(&self) -> RangeInclusive<u8> {
        1..=self.cols as u8
    }

    /// Second address octet of the core switches.
    pub fn core_octet(&self) -> u8 {
        self.k as u8
    }

    /// Number of switches in the fabric (core, upper and lower).
    pub fn num_switches(&self) -> usize {
        self.rows * self.cols + self.k * (UPPER_SWITCH_NUMS.len() + LOWER_SWITCH_NUMS.len())
    }

    /// Number of hosts in the fabric.
    pub fn num_hosts(&self) -> usize {
        self.k * LOWER_SWITCH_NUMS.len() * HOST_CHILDREN.len()
    }
}

fn check_param(
    param: &'static str,
    value: usize,
    max: usize,
    reason: &'static str,
) -> Result<(), TopologyError> {
    if value == 0 {
        Err(TopologyError::InvalidTopologyParams { param, value, reason: "must be at least 1" })
    } else if value > max {
        Err(TopologyError::InvalidTopologyParams { param, value, reason })
    } else {
        Ok(())
    }
}

/// Role of a switch in the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SwitchRole {
    /// Core (spine) switch
    Core,
    /// Aggregation switch facing the core
    AggUpper,
    /// Aggregation switch facing the hosts
    AggLower,
}

impl fmt::Display for SwitchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::AggUpper => write!(f, "upper"),
            Self::AggLower => write!(f, "lower"),
        }
    }
}

/// # Node Name
///
/// Identity of every node in the fabric, made of its role and indices. The string form is
/// `core{row}_{col}`, `uppr{pod}_{num}`, `lowr{pod}_{num}` and `h{pod}_{num}_{child}`, and can
/// be parsed back with [`FromStr`]. Names are ordered core first, then upper, lower and hosts,
/// each by their indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeName {
    /// Core switch
    Core {
        /// row in the core grid, starting at 1
        row: u8,
        /// column in the core grid, starting at 1
        col: u8,
    },
    /// Upper aggregation switch
    Upper {
        /// pod of the switch
        pod: u8,
        /// switch number, in [`UPPER_SWITCH_NUMS`]
        num: u8,
    },
    /// Lower aggregation switch
    Lower {
        /// pod of the switch
        pod: u8,
        /// switch number, in [`LOWER_SWITCH_NUMS`]
        num: u8,
    },
    /// Host
    Host {
        /// pod of the host
        pod: u8,
        /// switch number of the lower switch the host is attached to
        num: u8,
        /// child number, in [`HOST_CHILDREN`]
        child: u8,
    },
}

impl NodeName {
    /// Returns the role, or `None` if the node is a host.
    pub fn role(&self) -> Option<SwitchRole> {
        match self {
            Self::Core { .. } => Some(SwitchRole::Core),
            Self::Upper { .. } => Some(SwitchRole::AggUpper),
            Self::Lower { .. } => Some(SwitchRole::AggLower),
            Self::Host { .. } => None,
        }
    }

    /// Returns true if the node is a switch
    pub fn is_switch(&self) -> bool {
        self.role().is_some()
    }

    /// Returns true if the node is a host
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host { .. })
    }

    /// Returns the pod of the node, or `None` for core switches.
    pub fn pod(&self) -> Option<u8> {
        match self {
            Self::Core { .. } => None,
            Self::Upper { pod, .. } | Self::Lower { pod, .. } | Self::Host { pod, .. } => {
                Some(*pod)
            }
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core { row, col } => write!(f, "core{}_{}", row, col),
            Self::Upper { pod, num } => write!(f, "uppr{}_{}", pod, num),
            Self::Lower { pod, num } => write!(f, "lowr{}_{}", pod, num),
            Self::Host { pod, num, child } => write!(f, "h{}_{}_{}", pod, num, child),
        }
    }
}

impl FromStr for NodeName {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TopologyError::InvalidName(s.to_string());
        let (kind, rest) = ["core", "uppr", "lowr", "h"]
            .iter()
            .find_map(|kind| s.strip_prefix(*kind).map(|rest| (*kind, rest)))
            .ok_or_else(invalid)?;
        let idx = rest
            .split('_')
            .map(|x| x.parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| invalid())?;
        match (kind, idx.as_slice()) {
            ("core", [row, col]) => Ok(Self::Core { row: *row, col: *col }),
            ("uppr", [pod, num]) => Ok(Self::Upper { pod: *pod, num: *num }),
            ("lowr", [pod, num]) => Ok(Self::Lower { pod: *pod, num: *num }),
            ("h", [pod, num, child]) => Ok(Self::Host { pod: *pod, num: *num, child: *child }),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for NodeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Switch of the fabric. Created once while building the topology, and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchNode {
    name: NodeName,
    role: SwitchRole,
    address: Ipv4Addr,
}

impl SwitchNode {
    pub(crate) fn new(name: NodeName, role: SwitchRole, address: Ipv4Addr) -> Self {
        Self { name, role, address }
    }

    /// Name of the switch
    pub fn name(&self) -> NodeName {
        self.name
    }

    /// Role of the switch
    pub fn role(&self) -> SwitchRole {
        self.role
    }

    /// Address of the switch
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }
}

/// Host of the fabric, attached to exactly one lower switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostNode {
    name: NodeName,
    address: Ipv4Addr,
    mac: MacAddress,
}

impl HostNode {
    pub(crate) fn new(name: NodeName, address: Ipv4Addr, mac: MacAddress) -> Self {
        Self { name, address, mac }
    }

    /// Name of the host
    pub fn name(&self) -> NodeName {
        self.name
    }

    /// Address of the host
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// MAC address of the host
    pub fn mac(&self) -> MacAddress {
        self.mac
    }
}

/// Directed link record. Every physical link is stored twice, once for every endpoint, such that
/// `src_port` is always the local port of `src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    /// Local node
    pub src: NodeName,
    /// Port on the local node
    pub src_port: Port,
    /// Remote node
    pub dst: NodeName,
    /// Port on the remote node
    pub dst_port: Port,
}

impl Link {
    /// Returns the same link, seen from the other endpoint.
    pub fn reversed(&self) -> Self {
        Self { src: self.dst, src_port: self.dst_port, dst: self.src, dst_port: self.src_port }
    }
}

/// Topology Errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A fan-out parameter, or a value derived from it, is outside of its valid range.
    #[error("Invalid topology parameter {param} = {value}: {reason}")]
    InvalidTopologyParams {
        /// Name of the parameter or derived quantity
        param: &'static str,
        /// The offending value
        value: usize,
        /// Why the value is invalid
        reason: &'static str,
    },
    /// Two links of the same node would use the same local port.
    #[error("Port {port} of {node} is used by more than one link")]
    PortCollision {
        /// Node on which the collision happens
        node: NodeName,
        /// Port used twice
        port: Port,
    },
    /// The node is not present in the topology.
    #[error("Node {0} was not found in the topology")]
    NodeNotFound(NodeName),
    /// The two nodes are not directly connected.
    #[error("No link between {0} and {1}")]
    NotConnected(NodeName, NodeName),
    /// The string does not describe a node name.
    #[error("Invalid node name: {0}")]
    InvalidName(String),
}
