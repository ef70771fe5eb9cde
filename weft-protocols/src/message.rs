// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The application-level transfer unit.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use weft_engine::types::SetupError;

use crate::UNSET;
use crate::flit::Flit;
use crate::packet::Packet;

/// An application-level message.
///
/// The shape (packet count, flit count, protocol class, opcode, transaction)
/// is immutable after assembly. The addressing and timestamps are filled in
/// by the sending terminal and the fabric as the message moves.
pub struct Message {
    /// The protocol class every flit of this message travels in.
    pub protocol_class: u32,

    /// Application-defined message type.
    pub opcode: u32,

    /// The transaction this message belongs to.
    pub transaction: u64,

    /// Number of packets the message was split into.
    pub num_packets: u32,

    /// Total number of flits across all packets.
    pub num_flits: u32,

    id: Cell<u64>,
    source: Cell<u32>,
    destination: Cell<u32>,

    create_time: Cell<u64>,
    inject_time: Cell<u64>,
    deliver_time: Cell<u64>,
}

impl Message {
    /// Assemble a message of `num_flits` flits into packets of at most
    /// `max_packet_size` flits, returning the shared message record and the
    /// flits in packetization order.
    pub fn assemble(
        protocol_class: u32,
        opcode: u32,
        transaction: u64,
        num_flits: u32,
        max_packet_size: u32,
    ) -> Result<(Rc<Message>, Vec<Flit>), SetupError> {
        if num_flits == 0 {
            weft_engine::config_error!("message must contain at least one flit");
        }
        if max_packet_size == 0 {
            weft_engine::config_error!("max_packet_size must be at least one flit");
        }

        let num_packets = num_flits.div_ceil(max_packet_size);
        let message = Rc::new(Message {
            protocol_class,
            opcode,
            transaction,
            num_packets,
            num_flits,
            id: Cell::new(UNSET),
            source: Cell::new(u32::MAX),
            destination: Cell::new(u32::MAX),
            create_time: Cell::new(UNSET),
            inject_time: Cell::new(UNSET),
            deliver_time: Cell::new(UNSET),
        });

        let mut flits = Vec::with_capacity(num_flits as usize);
        let mut flits_left = num_flits;
        for p in 0..num_packets {
            let packet_length = flits_left.min(max_packet_size);
            let packet = Rc::new(Packet::new(p, packet_length, &message));
            for f in 0..packet_length {
                let head = f == 0;
                let tail = f == packet_length - 1;
                flits.push(Flit::new(f, head, tail, &packet));
            }
            flits_left -= packet_length;
        }
        debug_assert_eq!(flits_left, 0);

        Ok((message, flits))
    }

    /// The message id assigned by the sending terminal.
    pub fn id(&self) -> u64 {
        self.id.get()
    }

    /// Source interface id.
    pub fn source(&self) -> u32 {
        self.source.get()
    }

    /// Destination interface id.
    pub fn destination(&self) -> u32 {
        self.destination.get()
    }

    /// Stamp the send-side identity. Called once, by the sending terminal.
    pub fn set_send_info(&self, id: u64, source: u32, destination: u32, create_time: u64) {
        assert_eq!(self.id.get(), UNSET, "message sent twice");
        self.id.set(id);
        self.source.set(source);
        self.destination.set(destination);
        self.create_time.set(create_time);
    }

    /// Time the message was created by the terminal.
    pub fn create_time(&self) -> u64 {
        self.create_time.get()
    }

    /// Time the first flit entered the fabric.
    pub fn inject_time(&self) -> u64 {
        self.inject_time.get()
    }

    /// Record the injection of the first flit; later calls are ignored.
    pub fn mark_injected(&self, time: u64) {
        if self.inject_time.get() == UNSET {
            self.inject_time.set(time);
        }
    }

    /// Time the last flit left the fabric.
    pub fn deliver_time(&self) -> u64 {
        self.deliver_time.get()
    }

    /// Record the ejection of the last flit.
    pub fn mark_delivered(&self, time: u64) {
        assert_eq!(self.deliver_time.get(), UNSET, "message delivered twice");
        self.deliver_time.set(time);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "msg{}[{}->{}]", self.id.get(), self.source.get(), self.destination.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packetization_shapes() {
        // 10 flits in packets of 4: 4 + 4 + 2.
        let (message, flits) = Message::assemble(0, 0, 1, 10, 4).unwrap();
        assert_eq!(message.num_packets, 3);
        assert_eq!(message.num_flits, 10);
        assert_eq!(flits.len(), 10);

        let lengths: Vec<u32> = (0..3).map(|p| {
            flits.iter().filter(|f| f.packet.id == p).count() as u32
        }).collect();
        assert_eq!(lengths, vec![4, 4, 2]);
    }

    #[test]
    fn head_and_tail_flags() {
        let (_, flits) = Message::assemble(0, 0, 1, 7, 3).unwrap();
        for flit in &flits {
            assert_eq!(flit.head, flit.id == 0);
            assert_eq!(flit.tail, flit.id == flit.packet.num_flits - 1);
        }
        // Exactly one head and one tail per packet.
        for p in 0..3 {
            let in_packet: Vec<_> = flits.iter().filter(|f| f.packet.id == p).collect();
            assert_eq!(in_packet.iter().filter(|f| f.head).count(), 1);
            assert_eq!(in_packet.iter().filter(|f| f.tail).count(), 1);
        }
    }

    #[test]
    fn single_flit_packet_is_head_and_tail() {
        let (message, flits) = Message::assemble(0, 0, 1, 1, 16).unwrap();
        assert_eq!(message.num_packets, 1);
        assert!(flits[0].head && flits[0].tail);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(Message::assemble(0, 0, 1, 0, 4).is_err());
        assert!(Message::assemble(0, 0, 1, 4, 0).is_err());
    }
}
