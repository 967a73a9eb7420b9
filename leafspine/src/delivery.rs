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

//! # Entry Delivery Interface
//!
//! The compiler only produces a [`RoutingPlan`](crate::compiler::RoutingPlan). Installing the
//! entries on a running switch is done by an [`EntrySink`], which is implemented outside of this
//! crate (see `leafspine_runtime`).
//!
//! The entries of a single switch must be delivered completely and in order. If delivery fails
//! half-way, the complete sequence must be sent again, not only the remaining suffix. Different
//! switches are independent of each other.

use crate::compiler::TableEntry;
use crate::topology::NodeName;

use serde::Serialize;
use thiserror::Error;

/// Reason why a single entry could not be installed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeliveryError {
    /// The entry could not be transmitted to the device
    #[error("Transport error: {0}")]
    Transport(String),
    /// The device refused the entry
    #[error("Rejected by device: {reason}")]
    Rejected {
        /// Reason reported by the device
        reason: String,
    },
}

/// Result of delivering a single entry
pub type DeliveryResult = Result<(), DeliveryError>;

/// # Entry Sink
///
/// Receives the ordered entries of one switch and reports one result per entry, in the same
/// order. A sink may stop after the first failure, in which case the result vector is shorter
/// than the entry slice.
pub trait EntrySink {
    /// Deliver all entries of `switch`.
    fn deliver(&mut self, switch: NodeName, entries: &[TableEntry]) -> Vec<DeliveryResult>;
}

impl<S: EntrySink + ?Sized> EntrySink for &mut S {
    fn deliver(&mut self, switch: NodeName, entries: &[TableEntry]) -> Vec<DeliveryResult> {
        (**self).deliver(switch, entries)
    }
}

impl<S: EntrySink + ?Sized> EntrySink for Box<S> {
    fn deliver(&mut self, switch: NodeName, entries: &[TableEntry]) -> Vec<DeliveryResult> {
        (**self).deliver(switch, entries)
    }
}

/// Returns true if every entry was delivered successfully.
pub fn all_delivered(num_entries: usize, results: &[DeliveryResult]) -> bool {
    results.len() == num_entries && results.iter().all(|r| r.is_ok())
}
