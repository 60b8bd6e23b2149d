//! In-memory register file for driver tests

use std::cell::{Cell, RefCell};

use crate::bus::RegisterBus;

const SIZE: usize = 0x1000;

/// Register file backed by RAM, logging every access
///
/// Writes store the value as-is, so write-one-to-clear flags read back as
/// the bits that were written.
pub struct FakeBus {
    memory: Vec<Cell<u8>>,
    writes: RefCell<Vec<(u16, u8)>>,
    reads: RefCell<Vec<u16>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            memory: (0..SIZE).map(|_| Cell::new(0)).collect(),
            writes: RefCell::new(Vec::new()),
            reads: RefCell::new(Vec::new()),
        }
    }

    /// Set a register without logging
    pub fn poke(&self, addr: u16, value: u8) {
        self.memory[addr as usize].set(value);
    }

    /// Set a 16-bit register without logging
    pub fn poke16(&self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.poke(addr, lo);
        self.poke(addr + 1, hi);
    }

    /// Read a register without logging
    pub fn peek(&self, addr: u16) -> u8 {
        self.memory[addr as usize].get()
    }

    /// Read a 16-bit register without logging
    pub fn peek16(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.peek(addr), self.peek(addr + 1)])
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.writes.borrow().clone()
    }

    pub fn reads(&self) -> Vec<u16> {
        self.reads.borrow().clone()
    }

    /// Check if `addr` was ever written
    pub fn written(&self, addr: u16) -> bool {
        self.writes.borrow().iter().any(|&(a, _)| a == addr)
    }

    pub fn clear_log(&self) {
        self.writes.borrow_mut().clear();
        self.reads.borrow_mut().clear();
    }
}

impl RegisterBus for FakeBus {
    fn read8(&self, addr: u16) -> u8 {
        self.reads.borrow_mut().push(addr);
        self.peek(addr)
    }

    fn write8(&self, addr: u16, value: u8) {
        self.writes.borrow_mut().push((addr, value));
        self.poke(addr, value);
    }
}
