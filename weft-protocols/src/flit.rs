// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The atomic transfer unit.

use std::fmt;
use std::rc::Rc;

use crate::packet::Packet;

/// A flow-control digit.
///
/// The shape (`id`, `head`, `tail`, packet back-reference) is fixed at
/// assembly; `vc` is the mutable routing state, re-assigned on every hop.
/// Only head flits are presented to routing algorithms - the other flits of
/// a packet inherit the head's route through the router's per-VC state.
pub struct Flit {
    /// Position of this flit within its packet.
    pub id: u32,

    /// First flit of the packet; carries the route.
    pub head: bool,

    /// Last flit of the packet; releases the downstream VC.
    pub tail: bool,

    /// The virtual channel assigned on the current hop.
    pub vc: u32,

    /// The owning packet.
    pub packet: Rc<Packet>,
}

impl Flit {
    pub(crate) fn new(id: u32, head: bool, tail: bool, packet: &Rc<Packet>) -> Self {
        Self {
            id,
            head,
            tail,
            vc: 0,
            packet: packet.clone(),
        }
    }

    /// The protocol class this flit travels in. Flits never change class.
    pub fn protocol_class(&self) -> u32 {
        self.packet.message.protocol_class
    }
}

impl fmt::Display for Flit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.f{}", self.packet, self.id)
    }
}
