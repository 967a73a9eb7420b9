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

//! # Runtime System
//!
//! This system installs a compiled [`RoutingPlan`] on the switches of the fabric, using any
//! [`EntrySink`]. The entries of every switch are delivered as one complete, ordered sequence. If
//! any entry fails, the whole sequence of that switch is delivered again, since a partially
//! programmed switch may have inconsistent size and offset entries. Switches are independent of
//! each other, which allows programming them in parallel (see [`program_fabric_parallel`]).
//!
//! Two sinks are shipped: [`DumpSink`](dump::DumpSink) writes the requests of every switch into a
//! file, and [`MemorySink`](memory::MemorySink) keeps them in memory.

#![deny(missing_docs, missing_debug_implementations)]

pub mod dump;
pub mod memory;

use leafspine::compiler::{RoutingPlan, TableEntry};
use leafspine::delivery::{all_delivered, DeliveryError, EntrySink};
use leafspine::topology::NodeName;

use log::*;
use serde::Serialize;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Runtime Errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Error while accessing the file system
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Error while serializing a request or a report
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// Error while building or compiling the fabric
    #[error("Fabric Error: {0}")]
    Fabric(#[from] leafspine::Error),
    /// A worker thread panicked, or its channel was closed early.
    #[error("Worker thread failed")]
    Worker,
}

/// Options for programming the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Number of additional attempts for a switch, after its first delivery failed.
    pub retries: usize,
    /// Number of worker threads for [`program_fabric_parallel`]. `None` uses one thread per CPU.
    pub threads: Option<usize>,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self { retries: 2, threads: None }
    }
}

/// Failure of a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// Position of the entry in the sequence of the switch
    pub position: usize,
    /// Reported error
    pub error: DeliveryError,
}

/// Outcome of programming a single switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchReport {
    /// The programmed switch
    pub switch: NodeName,
    /// Number of entries of the switch
    pub entries: usize,
    /// Number of times the sequence was delivered
    pub attempts: usize,
    /// Number of entries accepted during the last attempt
    pub delivered: usize,
    /// Failures of the last attempt. Empty if the switch was programmed successfully.
    pub failures: Vec<EntryFailure>,
}

impl SwitchReport {
    /// Returns true if every entry was accepted during the last attempt.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.delivered == self.entries
    }
}

/// Outcome of programming the fabric, with the switches in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramReport {
    /// Report of every switch
    pub switches: Vec<SwitchReport>,
}

impl ProgramReport {
    /// Returns true if every switch was programmed successfully.
    pub fn is_success(&self) -> bool {
        self.switches.iter().all(|s| s.is_success())
    }

    /// Iterate over all switches which could not be programmed.
    pub fn failed(&self) -> impl Iterator<Item = &SwitchReport> + '_ {
        self.switches.iter().filter(|s| !s.is_success())
    }

    /// Returns the report of a single switch.
    pub fn get(&self, switch: NodeName) -> Option<&SwitchReport> {
        self.switches.iter().find(|s| s.switch == switch)
    }

    /// Total number of delivered sequences, including retries.
    pub fn total_attempts(&self) -> usize {
        self.switches.iter().map(|s| s.attempts).sum()
    }
}

/// Deliver the complete sequence of a single switch, and deliver it again from the start as long
/// as it fails and retries are left.
pub fn program_switch<S: EntrySink + ?Sized>(
    sink: &mut S,
    switch: NodeName,
    entries: &[TableEntry],
    retries: usize,
) -> SwitchReport {
    let mut report = SwitchReport {
        switch,
        entries: entries.len(),
        attempts: 0,
        delivered: 0,
        failures: vec![],
    };

    while report.attempts <= retries {
        report.attempts += 1;
        let results = sink.deliver(switch, entries);
        let success = all_delivered(entries.len(), &results);
        report.delivered = results.iter().filter(|r| r.is_ok()).count();
        report.failures = results
            .into_iter()
            .enumerate()
            .filter_map(|(position, r)| r.err().map(|error| EntryFailure { position, error }))
            .collect();
        if success {
            debug!("{}: installed {} entries", switch, entries.len());
            return report;
        }
        match report.failures.first() {
            Some(f) => warn!(
                "{}: attempt {} failed at entry {}: {}",
                switch, report.attempts, f.position, f.error
            ),
            None => warn!(
                "{}: attempt {} stopped after {} of {} entries",
                switch, report.attempts, report.delivered, report.entries
            ),
        }
    }

    error!("{}: giving up after {} attempts", switch, report.attempts);
    report
}

/// # Program the fabric
///
/// Deliver the entries of all switches in the plan through a single sink, in the order of the
/// plan (core, upper, lower). A switch that could not be programmed does not stop the others. The
/// outcome of every switch is reported in the returned [`ProgramReport`].
pub fn program_fabric<S: EntrySink + ?Sized>(
    plan: &RoutingPlan,
    sink: &mut S,
    options: ProgramOptions,
) -> ProgramReport {
    info!("Programming {} switches", plan.len());
    let report = ProgramReport {
        switches: plan
            .iter()
            .map(|(switch, entries)| {
                program_switch(&mut *sink, switch, entries, options.retries)
            })
            .collect(),
    };
    log_summary(&report);
    report
}

/// # Program the fabric in parallel
///
/// Same as [`program_fabric`], but the switches are distributed among `options.threads` worker
/// threads (one per CPU if not set). Every worker creates its own sink using `make_sink`. The
/// entries of each switch are still delivered by a single worker, in order. The reports are
/// returned in the order of the plan.
pub fn program_fabric_parallel<S, F>(
    plan: &RoutingPlan,
    make_sink: F,
    options: ProgramOptions,
) -> Result<ProgramReport, RuntimeError>
where
    S: EntrySink,
    F: Fn() -> Result<S, RuntimeError> + Send + Sync + 'static,
{
    let n_threads = options.threads.unwrap_or_else(num_cpus::get).max(1).min(plan.len().max(1));
    info!("Programming {} switches using {} threads", plan.len(), n_threads);

    let plan = Arc::new(plan.clone());
    // reversed, such that `pop` yields the switches in plan order
    let mut order = plan.switches().collect::<Vec<_>>();
    order.reverse();
    let queue = Arc::new(Mutex::new(order));
    let make_sink = Arc::new(make_sink);
    let (sender, receiver) = channel::<SwitchReport>();

    let workers: Vec<JoinHandle<Result<(), RuntimeError>>> = (0..n_threads)
        .map(|_| {
            let tx = sender.clone();
            let p = plan.clone();
            let q = queue.clone();
            let m = make_sink.clone();
            thread::spawn(move || {
                let mut sink = m()?;
                loop {
                    let switch = match q.lock().map_err(|_| RuntimeError::Worker)?.pop() {
                        Some(switch) => switch,
                        None => return Ok(()),
                    };
                    let entries = p.get(switch).unwrap_or_default();
                    let report = program_switch(&mut sink, switch, entries, options.retries);
                    tx.send(report).map_err(|_| RuntimeError::Worker)?;
                }
            })
        })
        .collect();
    drop(sender);

    let mut switches = receiver.iter().collect::<Vec<_>>();
    for worker in workers {
        worker.join().map_err(|_| RuntimeError::Worker)??;
    }
    if switches.len() != plan.len() {
        return Err(RuntimeError::Worker);
    }
    switches.sort_by_key(|s| s.switch);

    let report = ProgramReport { switches };
    log_summary(&report);
    Ok(report)
}

fn log_summary(report: &ProgramReport) {
    let failed = report.failed().count();
    if failed == 0 {
        info!(
            "Programmed {} switches ({} attempts)",
            report.switches.len(),
            report.total_attempts()
        );
    } else {
        error!("{} of {} switches could not be programmed", failed, report.switches.len());
    }
}
