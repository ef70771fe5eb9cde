// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Upstream notification that a downstream VC slot is free.

use std::fmt;

/// A credit for one buffer slot of one virtual channel.
///
/// Credits travel on the reverse direction of the channel that carried the
/// flit they account for, with the same latency semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credit {
    /// The virtual channel the freed slot belongs to.
    pub vc: u32,
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "credit vc{}", self.vc)
    }
}
