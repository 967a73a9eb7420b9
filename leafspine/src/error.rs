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

//! Module containing all error types

use crate::allocator::AllocationError;
use crate::compiler::CompileError;
use crate::topology::TopologyError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Error propagated from the topology model
    #[error("Topology Error: {0}")]
    TopologyError(#[from] TopologyError),
    /// Error propagated from the allocator
    #[error("Allocation Error: {0}")]
    AllocationError(#[from] AllocationError),
    /// Error propagated from the compiler
    #[error("Compile Error: {0}")]
    CompileError(#[from] CompileError),
}
