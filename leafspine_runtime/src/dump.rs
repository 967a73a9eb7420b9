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

//! # Request dump sink
//!
//! Writes the requests of every switch into `{dir}/{switch}-p4runtime-requests.txt`, one JSON
//! object per line. Every delivery truncates the file of the switch, so after a retry the file
//! contains exactly the last complete sequence.

use crate::RuntimeError;
use leafspine::allocator::ControlEndpoints;
use leafspine::compiler::TableEntry;
use leafspine::delivery::{DeliveryError, DeliveryResult, EntrySink};
use leafspine::topology::NodeName;

use log::*;
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Suffix of the request dump files
pub const DUMP_SUFFIX: &str = "-p4runtime-requests.txt";

/// Single line in the dump file
#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    switch: NodeName,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    position: usize,
    update: &'static str,
    table_entry: &'a TableEntry,
}

/// Sink writing all requests into one file per switch.
#[derive(Debug, Clone)]
pub struct DumpSink {
    dir: PathBuf,
    endpoints: Option<ControlEndpoints>,
}

impl DumpSink {
    /// Create a new sink, writing into `dir`. The directory is created if it does not exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        Ok(Self { dir, endpoints: None })
    }

    /// Record the control endpoint of the switch in every request.
    pub fn with_endpoints(mut self, endpoints: ControlEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Path of the dump file of a switch
    pub fn path(&self, switch: NodeName) -> PathBuf {
        self.dir.join(format!("{}{}", switch, DUMP_SUFFIX))
    }

    fn write_entry(
        &self,
        file: &mut impl Write,
        switch: NodeName,
        position: usize,
        entry: &TableEntry,
    ) -> Result<(), RuntimeError> {
        let request = WriteRequest {
            switch,
            address: self.endpoints.as_ref().and_then(|e| e.get(switch)),
            position,
            update: "INSERT",
            table_entry: entry,
        };
        serde_json::to_writer(&mut *file, &request)?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

impl EntrySink for DumpSink {
    fn deliver(&mut self, switch: NodeName, entries: &[TableEntry]) -> Vec<DeliveryResult> {
        let path = self.path(switch);
        let mut file = match File::create(&path) {
            Ok(f) => BufWriter::new(f),
            Err(e) => {
                error!("Cannot create {}: {}", path.display(), e);
                return vec![Err(DeliveryError::Transport(e.to_string()))];
            }
        };

        let mut results = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match self.write_entry(&mut file, switch, position, entry) {
                Ok(()) => results.push(Ok(())),
                Err(e) => {
                    results.push(Err(DeliveryError::Transport(e.to_string())));
                    return results;
                }
            }
        }
        if let Err(e) = file.flush() {
            // the buffered entries are lost
            results.clear();
            results.push(Err(DeliveryError::Transport(e.to_string())));
        }
        trace!("{}: wrote {} requests to {}", switch, entries.len(), path.display());
        results
    }
}
