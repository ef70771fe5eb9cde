// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A sequence of flits routed as a unit.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::message::Message;

/// A packet: all of its flits take the same path through the fabric.
pub struct Packet {
    /// Position of this packet within its message.
    pub id: u32,

    /// Number of flits in this packet.
    pub num_flits: u32,

    /// The owning message.
    pub message: Rc<Message>,

    hop_count: Cell<u32>,
}

impl Packet {
    pub(crate) fn new(id: u32, num_flits: u32, message: &Rc<Message>) -> Self {
        assert!(num_flits > 0);
        Self {
            id,
            num_flits,
            message: message.clone(),
            hop_count: Cell::new(0),
        }
    }

    /// Number of routers this packet's head flit has visited.
    pub fn hop_count(&self) -> u32 {
        self.hop_count.get()
    }

    /// Count one router traversal.
    pub fn increment_hop_count(&self) {
        self.hop_count.set(self.hop_count.get() + 1);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.p{}", self.message, self.id)
    }
}
