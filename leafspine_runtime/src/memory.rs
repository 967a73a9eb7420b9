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

//! # In-memory sink
//!
//! Records all deliveries in memory. Failures can be injected, which makes this sink useful for
//! dry runs and for testing the retry behavior.

use leafspine::compiler::TableEntry;
use leafspine::delivery::{DeliveryError, DeliveryResult, EntrySink};
use leafspine::topology::NodeName;

use log::*;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    installed: BTreeMap<NodeName, Vec<TableEntry>>,
    attempts: Vec<NodeName>,
    failures: HashMap<NodeName, VecDeque<usize>>,
}

/// # Memory Sink
///
/// All clones of the sink share the same state, so a clone can be handed to every worker of
/// [`program_fabric_parallel`](crate::program_fabric_parallel).
///
/// The installed entries of a switch are replaced on every delivery, like a device that is reset
/// before it is programmed again.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Create an empty sink without any failures.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Option<MutexGuard<'_, MemoryState>> {
        self.state.lock().ok()
    }

    /// Let the next delivery to `switch` fail at the entry with the given position. Calling this
    /// multiple times lets consecutive deliveries fail.
    pub fn inject_failure(&self, switch: NodeName, position: usize) {
        if let Some(mut state) = self.lock() {
            state.failures.entry(switch).or_default().push_back(position);
        }
    }

    /// Returns the entries accepted during the last delivery to `switch`.
    pub fn installed(&self, switch: NodeName) -> Option<Vec<TableEntry>> {
        self.lock().and_then(|s| s.installed.get(&switch).cloned())
    }

    /// Returns all switches in the order in which they were delivered, including retries.
    pub fn attempts(&self) -> Vec<NodeName> {
        self.lock().map(|s| s.attempts.clone()).unwrap_or_default()
    }

    /// Number of deliveries to the given switch
    pub fn num_attempts(&self, switch: NodeName) -> usize {
        self.attempts().into_iter().filter(|s| *s == switch).count()
    }
}

impl EntrySink for MemorySink {
    fn deliver(&mut self, switch: NodeName, entries: &[TableEntry]) -> Vec<DeliveryResult> {
        let mut state = match self.lock() {
            Some(state) => state,
            None => return vec![Err(DeliveryError::Transport("poisoned state".to_string()))],
        };
        state.attempts.push(switch);
        let fail_at = state.failures.get_mut(&switch).and_then(|f| f.pop_front());

        let accepted = fail_at.unwrap_or(entries.len()).min(entries.len());
        state.installed.insert(switch, entries[..accepted].to_vec());

        let mut results = vec![Ok(()); accepted];
        if accepted < entries.len() {
            debug!("{}: injected failure at entry {}", switch, accepted);
            results.push(Err(DeliveryError::Rejected { reason: "injected failure".to_string() }));
        }
        results
    }
}
