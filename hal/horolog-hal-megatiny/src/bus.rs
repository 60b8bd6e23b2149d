//! Register access
//!
//! 16-bit peripheral registers on AVR go through a shared TEMP latch: the
//! low byte must be read first and written first. The default 16-bit
//! methods follow that order.

/// Configuration change protection register
pub const CCP: u16 = 0x0034;

/// CCP signature unlocking protected I/O registers
pub const CCP_IOREG: u8 = 0xD8;

/// Byte-addressed access to the peripheral register file
pub trait RegisterBus {
    fn read8(&self, addr: u16) -> u8;

    fn write8(&self, addr: u16, value: u8);

    /// Read a 16-bit register, low byte first
    fn read16(&self, addr: u16) -> u16 {
        let lo = self.read8(addr);
        let hi = self.read8(addr + 1);
        u16::from_le_bytes([lo, hi])
    }

    /// Write a 16-bit register, low byte first
    fn write16(&self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write8(addr, lo);
        self.write8(addr + 1, hi);
    }

    /// Write a register guarded by configuration change protection
    fn protected_write8(&self, addr: u16, value: u8) {
        self.write8(CCP, CCP_IOREG);
        self.write8(addr, value);
    }

    /// Read-modify-write a register
    fn modify8(&self, addr: u16, f: impl FnOnce(u8) -> u8) {
        let value = self.read8(addr);
        self.write8(addr, f(value));
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read8(&self, addr: u16) -> u8 {
        (**self).read8(addr)
    }

    fn write8(&self, addr: u16, value: u8) {
        (**self).write8(addr, value)
    }

    fn read16(&self, addr: u16) -> u16 {
        (**self).read16(addr)
    }

    fn write16(&self, addr: u16, value: u16) {
        (**self).write16(addr, value)
    }

    fn protected_write8(&self, addr: u16, value: u8) {
        (**self).protected_write8(addr, value)
    }
}

/// Volatile access to the memory-mapped register file
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Must only be used on a tinyAVR, where the data space addresses used
    /// by the drivers are peripheral registers. The caller also takes over
    /// ownership of every timer a driver is built on.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read8(&self, addr: u16) -> u8 {
        // SAFETY: addr is a peripheral register (see `Mmio::new`)
        unsafe { core::ptr::read_volatile(addr as usize as *const u8) }
    }

    #[inline(always)]
    fn write8(&self, addr: u16, value: u8) {
        // SAFETY: addr is a peripheral register (see `Mmio::new`)
        unsafe { core::ptr::write_volatile(addr as usize as *mut u8, value) }
    }

    // The TEMP latch is shared by every 16-bit register of a peripheral, so
    // an interrupt in between the two halves would corrupt the access.
    fn read16(&self, addr: u16) -> u16 {
        critical_section::with(|_| {
            let lo = self.read8(addr);
            let hi = self.read8(addr + 1);
            u16::from_le_bytes([lo, hi])
        })
    }

    fn write16(&self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        critical_section::with(|_| {
            self.write8(addr, lo);
            self.write8(addr + 1, hi);
        })
    }

    // The protected register must be written within four cycles of the
    // signature.
    fn protected_write8(&self, addr: u16, value: u8) {
        critical_section::with(|_| {
            self.write8(CCP, CCP_IOREG);
            self.write8(addr, value);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBus;

    #[test]
    fn test_16bit_access_low_byte_first() {
        let bus = FakeBus::new();
        bus.write16(0x0A4C, 0x1234);
        assert_eq!(bus.writes(), vec![(0x0A4C, 0x34), (0x0A4D, 0x12)]);
        assert_eq!(bus.read16(0x0A4C), 0x1234);
        assert_eq!(bus.reads(), vec![0x0A4C, 0x0A4D]);
    }

    #[test]
    fn test_protected_write_unlocks_first() {
        let bus = FakeBus::new();
        bus.protected_write8(0x007C, 0x03);
        assert_eq!(bus.writes(), vec![(CCP, CCP_IOREG), (0x007C, 0x03)]);
    }

    #[test]
    fn test_modify_keeps_other_bits() {
        let bus = FakeBus::new();
        bus.poke(0x0A0A, 0b0000_0001);
        bus.modify8(0x0A0A, |v| v | 0b10);
        assert_eq!(bus.peek(0x0A0A), 0b11);
    }
}
