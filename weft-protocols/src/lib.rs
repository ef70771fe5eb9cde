// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The wire-level data model of the WEFT simulator.
//!
//! A [message](crate::message::Message) is the application-level unit. It is
//! packetized into [packets](crate::packet::Packet), each of which is a
//! sequence of [flits](crate::flit::Flit) - the atomic unit the fabric moves
//! and arbitrates. Back-pressure flows the other way as
//! [credits](crate::credit::Credit).
//!
//! Flits are owned values: at any instant an in-flight flit is held by
//! exactly one buffer or one channel slot, and transfers are ownership
//! moves. Packets and messages are shared metadata records (`Rc`), referenced
//! one-way (`Flit -> Packet -> Message`), with the mutable bookkeeping
//! (addresses, timestamps) held in `Cell`s.
//!
//! [`pc::PcVcMap`] is the protocol-class to virtual-channel map: each
//! protocol class owns a disjoint, contiguous range of VCs, and no flit ever
//! leaves its class's range.

pub mod credit;
pub mod flit;
pub mod message;
pub mod packet;
pub mod pc;

/// Sentinel for timestamps and ids that have not been assigned yet.
pub const UNSET: u64 = u64::MAX;
