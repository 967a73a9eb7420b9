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

//! This is a library for compiling the forwarding tables of a multi-tier spine-leaf fabric, in
//! which traffic is spread over equal-cost paths (ECMP) by the data plane.
//!
//! ## Fabric
//!
//! The fabric consists of `k` pods, each with two upper and two lower aggregation switches, and a
//! grid of `rows x cols` core switches. Every lower switch serves two hosts. The fabric is fully
//! determined by [`FabricParams`](topology::FabricParams), and all names, addresses and ports are
//! derived from them.
//!
//! ## Structure
//!
//! - **[`Topology`](topology)**: Switches, hosts and the port-level wiring between them. See
//!   [`build_topology`](topology::build_topology).
//!
//! - **[`Allocator`](allocator)**: Control-plane endpoint of every switch process.
//!
//! - **[`Compiler`](compiler)**: Ordered match-action entries for every switch, collected in a
//!   [`RoutingPlan`](compiler::RoutingPlan). The entries of every switch must be installed in the
//!   given order.
//!
//! - **[`Delivery`](delivery)**: Interface through which the entries are installed on the
//!   switches. Implementations live in `leafspine_runtime`.
//!
//! ## Usage
//!
//! ```rust
//! use leafspine::{compile_fabric, Error};
//! use leafspine::allocator::AllocatorConfig;
//! use leafspine::topology::FabricParams;
//!
//! fn main() -> Result<(), Error> {
//!     let fabric = compile_fabric(FabricParams::default(), &AllocatorConfig::default())?;
//!     assert_eq!(fabric.plan.len(), 20);
//!     assert_eq!(fabric.endpoints.len(), 20);
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod compiler;
pub mod delivery;
mod error;
pub mod printer;
pub mod topology;

pub use error::Error;

use allocator::{allocate, AllocatorConfig, ControlEndpoints};
use compiler::{compile, RoutingPlan};
use topology::{build_topology, FabricParams, Topology};

#[cfg(test)]
mod test;

/// Everything that is derived from the fabric parameters.
#[derive(Debug, Clone)]
pub struct CompiledFabric {
    /// The topology
    pub topology: Topology,
    /// Control-plane endpoint of every switch
    pub endpoints: ControlEndpoints,
    /// Entries of every switch
    pub plan: RoutingPlan,
}

/// Build the topology, allocate the control endpoints and compile the entries of all switches.
pub fn compile_fabric(
    params: FabricParams,
    config: &AllocatorConfig,
) -> Result<CompiledFabric, Error> {
    let topology = build_topology(params)?;
    let endpoints = allocate(&topology, config)?;
    let plan = compile(&topology)?;
    Ok(CompiledFabric { topology, endpoints, plan })
}
