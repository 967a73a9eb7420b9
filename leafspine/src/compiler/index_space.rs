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

//! # Index Space
//!
//! Bookkeeping of the switch-local `routing_table` indices. Every bucket occupies the range
//! `[offset, offset + size)`, and no two buckets of the same switch may overlap.

use super::entry::{Table, TableEntry, MAX_BUCKET_SIZE};
use super::CompileError;
use crate::topology::NodeName;

use ipnet::Ipv4Net;
use std::collections::{BTreeMap, HashMap};

/// # Index Space
///
/// Ranges of the routing table of a single switch which are already assigned to a bucket. The
/// `global_offset` is the end of the highest range, and new buckets are appended there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpace {
    switch: NodeName,
    /// offset -> size
    ranges: BTreeMap<u32, u32>,
    end: u32,
}

impl IndexSpace {
    /// Create an empty index space for the given switch
    pub fn new(switch: NodeName) -> Self {
        Self { switch, ranges: BTreeMap::new(), end: 0 }
    }

    /// The next free index after all assigned ranges.
    pub fn global_offset(&self) -> u32 {
        self.end
    }

    /// Number of assigned buckets
    pub fn num_buckets(&self) -> usize {
        self.ranges.len()
    }

    /// Append a bucket of `size` entries at the current global offset, and return its offset.
    pub fn reserve(&mut self, size: u32) -> Result<u32, CompileError> {
        let offset = self.end;
        self.claim(offset, size)?;
        Ok(offset)
    }

    /// Assign the range `[offset, offset + size)`. Fails with [`CompileError::OffsetCollision`] if
    /// the range overlaps any range assigned before, and with [`CompileError::IndexOverflow`] if
    /// it ends beyond `u32::MAX`. On failure, nothing is changed.
    pub fn claim(&mut self, offset: u32, size: u32) -> Result<(), CompileError> {
        if size == 0 || size > MAX_BUCKET_SIZE {
            return Err(CompileError::InvalidBucketSize { switch: self.switch, size });
        }
        let end = offset
            .checked_add(size)
            .ok_or(CompileError::IndexOverflow { switch: self.switch, offset, size })?;
        let collision = |(existing_offset, existing_size): (&u32, &u32)| {
            CompileError::OffsetCollision {
                switch: self.switch,
                offset,
                size,
                existing_offset: *existing_offset,
                existing_size: *existing_size,
            }
        };
        // the range starting at or before `offset` must end before `offset`. Stored ranges never
        // end beyond `u32::MAX`, so `o + s` cannot overflow.
        if let Some((o, s)) = self.ranges.range(..=offset).next_back() {
            if o + s > offset {
                return Err(collision((o, s)));
            }
        }
        // the range starting after `offset` must start after the new range ends.
        if let Some((o, s)) = self.ranges.range(offset..).next() {
            if *o < end {
                return Err(collision((o, s)));
            }
        }
        self.ranges.insert(offset, size);
        self.end = self.end.max(end);
        Ok(())
    }

    /// Returns the first index below the global offset that is not covered by any range.
    pub fn find_gap(&self) -> Option<u32> {
        let mut next = 0;
        for (o, s) in self.ranges.iter() {
            if *o != next {
                return Some(next);
            }
            next = o + s;
        }
        None
    }

    /// Returns true if the ranges cover `[0, global_offset)` without gaps. Overlaps are
    /// impossible by construction.
    pub fn is_partition(&self) -> bool {
        self.find_gap().is_none()
    }

    /// Returns true if `index` is covered by an assigned range.
    pub fn contains(&self, index: u32) -> bool {
        self.ranges.range(..=index).next_back().map(|(o, s)| index - o < *s).unwrap_or(false)
    }

    /// Iterate over all assigned ranges as `(offset, size)`, ordered by offset.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.ranges.iter().map(|(o, s)| (*o, *s))
    }
}

/// Check the program of a single switch, and return its final global offset.
///
/// The ranges are derived from the entries themselves: every prefix needs both a size and an
/// offset entry, the buckets must partition `[0, global_offset)`, every index must have exactly
/// one routing table entry, and every routing table entry must come after the bucket that
/// contains it.
pub fn verify_program(switch: NodeName, entries: &[TableEntry]) -> Result<u32, CompileError> {
    let mut space = IndexSpace::new(switch);
    let mut sizes: HashMap<Ipv4Net, u32> = HashMap::new();
    let mut offsets: HashMap<Ipv4Net, u32> = HashMap::new();
    let mut rows: BTreeMap<u32, usize> = BTreeMap::new();

    for entry in entries {
        match entry.table {
            Table::SubTableSize | Table::SubTableOffset => {
                let prefix = entry.prefix().ok_or(CompileError::MalformedEntry(switch))?;
                let (value, this, other) = if entry.table == Table::SubTableSize {
                    (entry.get_param(super::entry::param::LEN), &mut sizes, &offsets)
                } else {
                    (entry.get_param(super::entry::param::OFFSET), &mut offsets, &sizes)
                };
                let value = value.ok_or(CompileError::MalformedEntry(switch))?;
                if this.insert(prefix, value).is_some() {
                    return Err(CompileError::InconsistentGroup { switch, prefix });
                }
                if other.contains_key(&prefix) {
                    space.claim(offsets[&prefix], sizes[&prefix])?;
                }
            }
            Table::RoutingTable => {
                let index = entry.index().ok_or(CompileError::MalformedEntry(switch))?;
                if !space.contains(index) {
                    return Err(CompileError::UnorderedEntry { switch, index });
                }
                *rows.entry(index).or_default() += 1;
            }
            Table::PostFixTable => {}
        }
    }

    // every size needs an offset, and vice versa
    if let Some(prefix) = sizes
        .keys()
        .chain(offsets.keys())
        .find(|p| !(sizes.contains_key(p) && offsets.contains_key(p)))
    {
        return Err(CompileError::InconsistentGroup { switch, prefix: *prefix });
    }

    if let Some(index) = space.find_gap() {
        return Err(CompileError::IndexGap { switch, index });
    }

    for index in 0..space.global_offset() {
        match rows.get(&index) {
            None => return Err(CompileError::IndexGap { switch, index }),
            Some(1) => {}
            Some(_) => {
                return Err(CompileError::OffsetCollision {
                    switch,
                    offset: index,
                    size: 1,
                    existing_offset: index,
                    existing_size: 1,
                })
            }
        }
    }

    Ok(space.global_offset())
}
