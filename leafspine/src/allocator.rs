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

//! # Address/Port Allocator
//!
//! Every switch process listens for control-plane connections on its own port. The ports are
//! assigned in a fixed order: first all core switches (row-major), then all lower switches (by
//! pod, then switch number), and finally all upper switches (by pod, then switch number). The
//! `i`-th switch in this order uses port `port_base + 1 + i`. Tools that start the switch
//! processes must use the same order.

use crate::topology::{NodeName, SwitchRole, Topology};

use log::*;
use serde::Serialize;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Default control-plane port base. The first switch uses `DEFAULT_PORT_BASE + 1`.
pub const DEFAULT_PORT_BASE: u16 = 50050;

/// Allocation order of the switch roles
pub const ALLOCATION_ORDER: [SwitchRole; 3] =
    [SwitchRole::Core, SwitchRole::AggLower, SwitchRole::AggUpper];

/// Configuration of the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocatorConfig {
    /// Address on which all switch processes listen
    pub address: Ipv4Addr,
    /// The first switch uses `port_base + 1`.
    pub port_base: u16,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { address: Ipv4Addr::LOCALHOST, port_base: DEFAULT_PORT_BASE }
    }
}

/// Allocation Errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The same switch would get two endpoints
    #[error("Switch {0} is allocated twice")]
    DuplicateAllocation(NodeName),
    /// The port range is exhausted
    #[error("No port left for switch {0}")]
    PortOverflow(NodeName),
}

/// # Control Endpoints
///
/// Control-plane endpoint of every switch, kept in allocation order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlEndpoints {
    order: Vec<(NodeName, SocketAddr)>,
    lookup: HashMap<NodeName, usize>,
}

impl ControlEndpoints {
    fn insert(&mut self, name: NodeName, endpoint: SocketAddr) -> Result<(), AllocationError> {
        if self.lookup.contains_key(&name) {
            return Err(AllocationError::DuplicateAllocation(name));
        }
        self.lookup.insert(name, self.order.len());
        self.order.push((name, endpoint));
        Ok(())
    }

    /// Returns the endpoint of a switch
    pub fn get(&self, name: NodeName) -> Option<SocketAddr> {
        self.lookup.get(&name).map(|idx| self.order[*idx].1)
    }

    /// Iterate over all switches in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeName, SocketAddr)> + '_ {
        self.order.iter().copied()
    }

    /// Number of allocated switches
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no switch is allocated
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Assign a control-plane endpoint to every switch of the topology.
pub fn allocate(
    topo: &Topology,
    config: &AllocatorConfig,
) -> Result<ControlEndpoints, AllocationError> {
    let mut endpoints = ControlEndpoints::default();
    let mut port = config.port_base;
    for role in ALLOCATION_ORDER.iter() {
        for switch in topo.switches_by_role(*role) {
            let name = switch.name();
            port = port.checked_add(1).ok_or(AllocationError::PortOverflow(name))?;
            endpoints.insert(name, SocketAddr::V4(SocketAddrV4::new(config.address, port)))?;
        }
    }
    debug!("Allocated {} control endpoints on {}", endpoints.len(), config.address);
    Ok(endpoints)
}
