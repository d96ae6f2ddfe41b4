use super::interrupts::{Interrupt, IF_ADDR};

/// Abstraction over the Game Boy bus (memory and IO) as seen by the CPU.
///
/// Both accessors are total: an implementation that blocks a region (for
/// example during OAM DMA) returns an open-bus value such as `0xFF` and
/// drops writes instead of failing.
pub trait Bus {
    fn read8(&mut self, addr: u16) -> u8;
    fn write8(&mut self, addr: u16, value: u8);

    /// Raise an interrupt request by setting its bit in IF (`$FF0F`).
    ///
    /// Peripherals call this synchronously; the CPU only notices the new
    /// bit at its next instruction boundary.
    fn request_interrupt(&mut self, irq: Interrupt) {
        let iflags = self.read8(IF_ADDR);
        self.write8(IF_ADDR, iflags | irq.bits());
    }
}
