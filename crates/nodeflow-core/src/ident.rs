// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Dense handle types for interned nodes and ports.
//!
//! String identifiers exist only in the document and in host-facing lookups.
//! Everything is interned to dense integer handles at load so the hot path
//! indexes flat arrays and never hashes. Handle assignment is a
//! deterministic function of the declared ordering: nodes in load order,
//! and within a node, inputs before outputs, each in declared order.

use serde::Serialize;

/// Globally unique port handle, contiguous in `[0, total_ports)`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct PortHandle(pub u32);

impl PortHandle {
    /// The handle as an array index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node position in load order.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct NodeIx(pub u32);

impl NodeIx {
    /// The position as an array index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Port direction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    /// The port receives values from at most one edge.
    Input,
    /// The port is written by its owning node and fans out along edges.
    Output,
}
