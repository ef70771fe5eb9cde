// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The routing and injection algorithm contracts.
//!
//! Routing algorithms live per `(input port, input VC)` of a router;
//! injection algorithms live per protocol class of an interface. Both are
//! built by the owning topology from name-keyed settings (see
//! [`topology`](crate::topology)), may hold state, and must be
//! deterministic given their inputs and the global random stream.

use weft_protocols::flit::Flit;
use weft_protocols::message::Message;
use weft_protocols::pc::PcVcInfo;

/// The non-empty set of hops a head flit is allowed to take.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingResponse {
    /// Allowed `(output port, output VC)` pairs, all within the flit's
    /// protocol-class VC range.
    pub options: Vec<(u32, u32)>,
}

impl RoutingResponse {
    /// Add one allowed hop.
    pub fn add(&mut self, output_port: u32, output_vc: u32) {
        self.options.push((output_port, output_vc));
    }
}

/// A routing algorithm instance for one `(input port, input VC)`.
///
/// Presented with head flits only; the rest of a packet inherits the head's
/// route through the router's per-VC state. Returning an empty response is
/// fatal in the router - it indicates a misconfiguration, not congestion.
pub trait RoutingAlgorithm {
    /// Compute the allowed hops for `flit` from this algorithm's position.
    fn route(&mut self, flit: &Flit) -> RoutingResponse;

    /// Pipeline latency of the route computation, in router cycles.
    fn latency(&self) -> u64;
}

/// An injection algorithm instance for one protocol class of an interface.
pub trait InjectionAlgorithm {
    /// Choose the `(output port, output VC)` for one packet of `message`.
    /// Called once per packet, in packet order.
    fn inject(&mut self, message: &Message, packet_id: u32) -> (u32, u32);
}

/// An injection algorithm that keeps every packet of a message on one VC,
/// rotating across the lower half of the class's range between messages.
///
/// This is the torus dimension-order companion (packets enter on VC class
/// 0), but is usable by any topology whose routing starts in class 0.
pub struct RotatingInjection {
    pc_vcs: PcVcInfo,
    current: u32,
}

impl RotatingInjection {
    #[must_use]
    pub fn new(pc_vcs: PcVcInfo) -> Self {
        Self { pc_vcs, current: 0 }
    }

    fn class_width(&self) -> u32 {
        // Class 0 is the lower half of the range; a single-VC class keeps
        // everything on the base VC.
        (self.pc_vcs.num_vcs / 2).max(1)
    }
}

impl InjectionAlgorithm for RotatingInjection {
    fn inject(&mut self, _message: &Message, packet_id: u32) -> (u32, u32) {
        if packet_id == 0 {
            self.current = (self.current + 1) % self.class_width();
        }
        (0, self.pc_vcs.base_vc + self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotating_injection_is_stable_within_a_message() {
        let mut alg = RotatingInjection::new(PcVcInfo {
            base_vc: 2,
            num_vcs: 4,
        });
        let (message, _) = Message::assemble(0, 0, 1, 12, 4).unwrap();

        let first: Vec<(u32, u32)> = (0..3).map(|p| alg.inject(&message, p)).collect();
        assert_eq!(first, vec![(0, 3), (0, 3), (0, 3)]);

        // The next message lands on the other class-0 VC.
        let (message2, _) = Message::assemble(0, 0, 2, 4, 4).unwrap();
        assert_eq!(alg.inject(&message2, 0), (0, 2));
    }

    #[test]
    fn rotating_injection_single_vc_class() {
        let mut alg = RotatingInjection::new(PcVcInfo {
            base_vc: 5,
            num_vcs: 1,
        });
        let (message, _) = Message::assemble(0, 0, 1, 2, 1).unwrap();
        assert_eq!(alg.inject(&message, 0), (0, 5));
        assert_eq!(alg.inject(&message, 1), (0, 5));
    }
}
