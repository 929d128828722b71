//! Peripheral side of a DMA transfer
//!
//! The DMAC hands a peripheral a buffer plus a starting index and a unit count. The buffer is
//! circular: index `start + i` refers to `buffer[(start + i) % buffer.len()]`. Peripherals
//! return how many units they actually accepted or produced, which may be fewer than requested.

use crate::channel::Port;
use std::collections::VecDeque;

pub trait Peripheral {
    /// Memory to peripheral. Returns the number of units consumed.
    fn drain(&mut self, src: &[u128], start: usize, len: usize) -> usize;

    /// Peripheral to memory. Returns the number of units written.
    fn source(&mut self, dst: &mut [u128], start: usize, len: usize) -> usize;
}

pub trait PeripheralBus {
    fn peripheral(&mut self, port: Port) -> &mut dyn Peripheral;
}

/// Peripheral that accepts and produces nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPeripheral;

impl Peripheral for NullPeripheral {
    fn drain(&mut self, _src: &[u128], _start: usize, _len: usize) -> usize {
        0
    }

    fn source(&mut self, _dst: &mut [u128], _start: usize, _len: usize) -> usize {
        0
    }
}

/// Bounded quadword FIFO, usable as a stand-in for any peripheral interface
#[derive(Debug, Clone)]
pub struct FifoPeripheral {
    fifo: VecDeque<u128>,
    capacity: usize,
}

impl FifoPeripheral {
    pub fn new(capacity: usize) -> Self {
        Self { fifo: VecDeque::with_capacity(capacity.min(1 << 16)), capacity }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn push(&mut self, value: u128) {
        self.fifo.push_back(value);
    }

    pub fn pop(&mut self) -> Option<u128> {
        self.fifo.pop_front()
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn drain_all(&mut self) -> Vec<u128> {
        self.fifo.drain(..).collect()
    }
}

impl Default for FifoPeripheral {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Peripheral for FifoPeripheral {
    fn drain(&mut self, src: &[u128], start: usize, len: usize) -> usize {
        if src.is_empty() {
            return 0;
        }

        let accepted = len.min(self.capacity.saturating_sub(self.fifo.len()));
        for i in 0..accepted {
            self.fifo.push_back(src[(start + i) % src.len()]);
        }
        accepted
    }

    fn source(&mut self, dst: &mut [u128], start: usize, len: usize) -> usize {
        if dst.is_empty() {
            return 0;
        }

        let produced = len.min(self.fifo.len());
        let dst_len = dst.len();
        for (i, value) in self.fifo.drain(..produced).enumerate() {
            dst[(start + i) % dst_len] = value;
        }
        produced
    }
}

/// One FIFO per peripheral port
#[derive(Debug, Clone, Default)]
pub struct FifoBus {
    fifos: [FifoPeripheral; Port::COUNT],
}

impl FifoBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fifo(&mut self, port: Port) -> &mut FifoPeripheral {
        &mut self.fifos[port.index()]
    }
}

impl PeripheralBus for FifoBus {
    fn peripheral(&mut self, port: Port) -> &mut dyn Peripheral {
        &mut self.fifos[port.index()]
    }
}

/// Bus where every port is a [`NullPeripheral`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus(NullPeripheral);

impl PeripheralBus for NullBus {
    fn peripheral(&mut self, _port: Port) -> &mut dyn Peripheral {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_drain_wraps_and_respects_capacity() {
        let mut fifo = FifoPeripheral::new(3);
        let buffer = [10, 11, 12, 13];

        assert_eq!(fifo.drain(&buffer, 2, 4), 3);
        assert_eq!(fifo.pop(), Some(12));
        assert_eq!(fifo.drain_all(), vec![13, 10]);
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn fifo_source_stops_when_empty() {
        let mut fifo = FifoPeripheral::unbounded();
        fifo.push(1);
        fifo.push(2);

        let mut buffer = [0; 4];
        assert_eq!(fifo.source(&mut buffer, 3, 4), 2);
        assert_eq!(buffer, [2, 0, 0, 1]);
        assert!(fifo.is_empty());
    }
}
