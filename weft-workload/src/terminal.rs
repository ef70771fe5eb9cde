// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Library routines shared by terminal implementations.
//!
//! Terminals are independent implementations of the workload's terminal
//! contract; the pieces they all need - injection pacing, id generation,
//! enroute accounting, transaction counters - live here as plain routines
//! and small structs rather than a base type.

use std::collections::HashMap;

use weft_engine::engine::Simulator;

/// Cycles needed to send `num_flits` at `rate` flits/cycle, with the
/// fractional remainder resolved probabilistically so the long-run average
/// matches the exact quotient.
pub fn cycles_to_send(sim: &Simulator, rate: f64, num_flits: u32) -> u64 {
    assert!(rate > 0.0 && rate <= 1.0);
    let exact = f64::from(num_flits) / rate;
    let mut cycles = exact as u64;
    let remainder = exact - cycles as f64;
    if remainder > 0.0 && sim.random.next_f64() < remainder {
        cycles += 1;
    }
    cycles
}

/// Message and transaction id generation plus enroute flit accounting for
/// one terminal.
pub struct SendAccounting {
    terminal: u64,
    next_message: u64,
    next_transaction: u64,
    flits_sent: u64,
    flits_delivered: u64,
}

impl SendAccounting {
    #[must_use]
    pub fn new(terminal: u32) -> Self {
        Self {
            terminal: u64::from(terminal) << 32,
            next_message: 0,
            next_transaction: 0,
            flits_sent: 0,
            flits_delivered: 0,
        }
    }

    /// A run-unique message id.
    pub fn create_message_id(&mut self) -> u64 {
        let id = self.terminal | self.next_message;
        self.next_message += 1;
        id
    }

    /// A run-unique transaction id.
    pub fn create_transaction_id(&mut self) -> u64 {
        let id = self.terminal | self.next_transaction;
        self.next_transaction += 1;
        id
    }

    /// Count flits handed to the interface.
    pub fn sent(&mut self, num_flits: u32) {
        self.flits_sent += u64::from(num_flits);
    }

    /// Count flits observed delivered.
    pub fn delivered(&mut self, num_flits: u32) {
        self.flits_delivered += u64::from(num_flits);
        assert!(self.flits_delivered <= self.flits_sent);
    }

    /// Flits launched but not yet observed delivered.
    pub fn enroute_flits(&self) -> u32 {
        (self.flits_sent - self.flits_delivered) as u32
    }
}

/// Pending-message counters for open transactions.
#[derive(Default)]
pub struct TransactionTracker {
    outstanding: HashMap<u64, u32>,
}

impl TransactionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking `transaction`, expecting `expected` completions.
    pub fn start(&mut self, transaction: u64, expected: u32) {
        assert!(expected > 0);
        let previous = self.outstanding.insert(transaction, expected);
        assert!(previous.is_none(), "transaction {transaction} already open");
    }

    /// Record one completion; returns true when the transaction closed.
    pub fn complete_one(&mut self, transaction: u64) -> bool {
        let remaining = self
            .outstanding
            .get_mut(&transaction)
            .unwrap_or_else(|| panic!("transaction {transaction} is not open"));
        assert!(*remaining > 0);
        *remaining -= 1;
        if *remaining == 0 {
            self.outstanding.remove(&transaction);
            true
        } else {
            false
        }
    }

    /// Whether `transaction` is still open.
    pub fn is_open(&self, transaction: u64) -> bool {
        self.outstanding.contains_key(&transaction)
    }

    /// Number of open transactions.
    pub fn open_count(&self) -> usize {
        self.outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use weft_engine::test_helpers::start_test;

    use super::*;

    #[test]
    fn cycles_to_send_averages_to_the_quotient() {
        let sim = start_test();
        // 10 flits at 0.3 flits/cycle: exactly 33.33 cycles.
        let total: u64 = (0..10_000).map(|_| cycles_to_send(&sim, 0.3, 10)).sum();
        let mean = total as f64 / 10_000.0;
        assert!((mean - 10.0 / 0.3).abs() < 0.1, "mean was {mean}");
    }

    #[test]
    fn cycles_to_send_exact_rate() {
        let sim = start_test();
        for _ in 0..100 {
            assert_eq!(cycles_to_send(&sim, 0.5, 8), 16);
        }
    }

    #[test]
    fn ids_are_unique_across_terminals() {
        let mut a = SendAccounting::new(1);
        let mut b = SendAccounting::new(2);
        assert_ne!(a.create_message_id(), b.create_message_id());
        assert_eq!(a.create_message_id(), (1 << 32) | 1);
        assert_eq!(a.create_transaction_id(), 1 << 32);
    }

    #[test]
    fn enroute_counts_sent_minus_delivered() {
        let mut accounting = SendAccounting::new(0);
        accounting.sent(10);
        accounting.sent(6);
        accounting.delivered(10);
        assert_eq!(accounting.enroute_flits(), 6);
    }

    #[test]
    fn transactions_close_after_expected_completions() {
        let mut tracker = TransactionTracker::new();
        tracker.start(7, 3);
        assert!(!tracker.complete_one(7));
        assert!(!tracker.complete_one(7));
        assert!(tracker.is_open(7));
        assert!(tracker.complete_one(7));
        assert!(!tracker.is_open(7));
        assert_eq!(tracker.open_count(), 0);
    }
}
