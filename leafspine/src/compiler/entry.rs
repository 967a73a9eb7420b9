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

//! # Table Entries
//!
//! Pure description of a single match-action entry, as expected by the `MyIngress` pipeline of
//! the ECMP data plane. An entry carries no connection state.

use crate::topology::Port;

use ipnet::Ipv4Net;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// Name of the control block containing all tables and actions.
pub const PIPELINE: &str = "MyIngress";

/// Largest number of next hops in a single bucket (width of the data-plane hash selection).
pub const MAX_BUCKET_SIZE: u32 = 2;

/// Match field names
pub mod field {
    /// Destination address of the IPv4 header (LPM)
    pub const DST_ADDR: &str = "hdr.ipv4.dstAddr";
    /// Final index into the routing table, computed by the data plane (exact)
    pub const FINAL_OFFSET: &str = "metadata.final_offset";
    /// Masked low-order part of the destination address (exact)
    pub const MASKED_DST_IP: &str = "metadata.masked_dst_ip";
}

/// Action parameter names
pub mod param {
    /// Bucket size
    pub const LEN: &str = "len";
    /// Bucket offset
    pub const OFFSET: &str = "offset";
    /// Egress port
    pub const PORT: &str = "port";
}

/// Tables of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Destination prefix to bucket size
    SubTableSize,
    /// Destination prefix to bucket offset
    SubTableOffset,
    /// Index to next hop
    RoutingTable,
    /// Masked destination to next hop
    PostFixTable,
}

impl Table {
    /// Name of the table inside the pipeline
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubTableSize => "sub_table_size",
            Self::SubTableOffset => "sub_table_offset",
            Self::RoutingTable => "routing_table",
            Self::PostFixTable => "post_fix_table",
        }
    }

    /// Fully qualified name, like `MyIngress.routing_table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", PIPELINE, self.name())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Actions of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Write the bucket size into the metadata
    SetSubTableSize,
    /// Write the bucket offset into the metadata
    SetSubTableOffset,
    /// Set the egress port
    SetNhop,
}

impl Action {
    /// Name of the action inside the pipeline
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSubTableSize => "set_sub_table_size",
            Self::SetSubTableOffset => "set_sub_table_offset",
            Self::SetNhop => "set_nhop",
        }
    }

    /// Fully qualified name, like `MyIngress.set_nhop`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", PIPELINE, self.name())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Value of a match field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchValue {
    /// Longest prefix match, value and prefix length
    Lpm(Ipv4Net),
    /// Exact match on a number
    Exact(u32),
    /// Exact match on an address
    ExactAddr(Ipv4Addr),
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lpm(net) => write!(f, "{}", net),
            Self::Exact(x) => write!(f, "{}", x),
            Self::ExactAddr(addr) => write!(f, "{}", addr),
        }
    }
}

/// Match on a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldMatch {
    /// Field name
    pub field: &'static str,
    /// Value to match
    pub value: MatchValue,
}

/// Single named action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ActionParam {
    /// Parameter name
    pub name: &'static str,
    /// Parameter value
    pub value: u32,
}

/// # Table Entry
///
/// One match-action entry. Match fields and action parameters are kept in order. Two entries are
/// equal if all their parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableEntry {
    /// Table in which the entry is installed
    pub table: Table,
    /// Ordered match fields
    pub matches: Vec<FieldMatch>,
    /// Action executed on a match
    pub action: Action,
    /// Ordered action parameters
    pub params: Vec<ActionParam>,
}

impl TableEntry {
    /// `sub_table_size` entry: packets towards `prefix` use a bucket of `len` next hops.
    pub fn sub_table_size(prefix: Ipv4Net, len: u32) -> Self {
        Self {
            table: Table::SubTableSize,
            matches: vec![FieldMatch { field: field::DST_ADDR, value: MatchValue::Lpm(prefix) }],
            action: Action::SetSubTableSize,
            params: vec![ActionParam { name: param::LEN, value: len }],
        }
    }

    /// `sub_table_offset` entry: the bucket of `prefix` starts at `offset`.
    pub fn sub_table_offset(prefix: Ipv4Net, offset: u32) -> Self {
        Self {
            table: Table::SubTableOffset,
            matches: vec![FieldMatch { field: field::DST_ADDR, value: MatchValue::Lpm(prefix) }],
            action: Action::SetSubTableOffset,
            params: vec![ActionParam { name: param::OFFSET, value: offset }],
        }
    }

    /// `routing_table` entry: index `index` sends the packet out of `port`.
    pub fn routing(index: u32, port: Port) -> Self {
        Self {
            table: Table::RoutingTable,
            matches: vec![FieldMatch {
                field: field::FINAL_OFFSET,
                value: MatchValue::Exact(index),
            }],
            action: Action::SetNhop,
            params: vec![ActionParam { name: param::PORT, value: u32::from(port) }],
        }
    }

    /// `post_fix_table` entry: destinations whose masked address equals `masked` are sent out of
    /// `port`.
    pub fn post_fix(masked: Ipv4Addr, port: Port) -> Self {
        Self {
            table: Table::PostFixTable,
            matches: vec![FieldMatch {
                field: field::MASKED_DST_IP,
                value: MatchValue::ExactAddr(masked),
            }],
            action: Action::SetNhop,
            params: vec![ActionParam { name: param::PORT, value: u32::from(port) }],
        }
    }

    /// Returns the value matched on `field`, if the entry matches on it.
    pub fn get_match(&self, field: &str) -> Option<MatchValue> {
        self.matches.iter().find(|m| m.field == field).map(|m| m.value)
    }

    /// Returns the value of the action parameter `name`, if present.
    pub fn get_param(&self, name: &str) -> Option<u32> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Returns the destination prefix of a `sub_table_size` or `sub_table_offset` entry.
    pub fn prefix(&self) -> Option<Ipv4Net> {
        match self.get_match(field::DST_ADDR) {
            Some(MatchValue::Lpm(net)) => Some(net),
            _ => None,
        }
    }

    /// Returns the routing table index of a `routing_table` entry.
    pub fn index(&self) -> Option<u32> {
        match (self.table, self.get_match(field::FINAL_OFFSET)) {
            (Table::RoutingTable, Some(MatchValue::Exact(idx))) => Some(idx),
            _ => None,
        }
    }

    /// Returns the egress port of a `set_nhop` entry.
    pub fn port(&self) -> Option<u32> {
        self.get_param(param::PORT)
    }
}
