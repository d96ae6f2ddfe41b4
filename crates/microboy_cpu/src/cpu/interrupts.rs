use bitflags::bitflags;

use super::pipeline::Cursor;
use super::{Bus, Cpu};

/// Interrupt flags register (IF).
pub const IF_ADDR: u16 = 0xFF0F;
/// Interrupt enable register (IE).
pub const IE_ADDR: u16 = 0xFFFF;

bitflags! {
    /// Interrupt request lines as laid out in IF/IE.
    ///
    /// Lower bits have higher priority.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Interrupt: u8 {
        const VBLANK = 0x01;
        const LCD_STAT = 0x02;
        const TIMER = 0x04;
        const SERIAL = 0x08;
        const JOYPAD = 0x10;
    }
}

impl Interrupt {
    /// The highest-priority line in this set, if any.
    pub fn highest_priority(self) -> Option<Interrupt> {
        let bits = self.bits();
        (bits != 0).then(|| Interrupt::from_bits_retain(bits & bits.wrapping_neg()))
    }

    /// Handler address of a single interrupt line (0x40, 0x48, ... 0x60).
    pub fn vector(self) -> u16 {
        0x0040 + (self.bits().trailing_zeros() as u16) * 8
    }
}

impl Cpu {
    /// Lines that are both requested (IF) and enabled (IE), regardless of IME.
    pub(in crate::cpu) fn pending_interrupts<B: Bus>(&self, bus: &mut B) -> Interrupt {
        Interrupt::from_bits_truncate(bus.read8(IE_ADDR) & bus.read8(IF_ADDR))
    }

    /// Apply delayed IME change requested by EI.
    ///
    /// Runs at every instruction boundary. EI only arms the enable; the
    /// boundary after the following instruction retires commits it.
    #[inline]
    pub(in crate::cpu) fn apply_ime_delay(&mut self) {
        if self.ime_enable_delay {
            self.ime = true;
            self.ime_enable_delay = false;
        } else if self.ime_enable_pending {
            self.ime_enable_pending = false;
            self.ime_enable_delay = true;
        }
    }

    /// Decide what the CPU does at an instruction boundary.
    ///
    /// Returns the pipeline to start (interrupt dispatch or opcode fetch),
    /// or `None` when the CPU is halted and spends this cycle idle.
    pub(in crate::cpu) fn begin_instruction<B: Bus>(&mut self, bus: &mut B) -> Option<Cursor> {
        self.apply_ime_delay();
        let pending = self.pending_interrupts(bus);

        if self.halted {
            // Wake-up ignores IME; whether the interrupt is then serviced is
            // decided at the next boundary.
            if !pending.is_empty() {
                self.halted = false;
                log::debug!(
                    "GB CPU leaving HALT: pending={:?} ime={} pc=0x{:04X}",
                    pending,
                    self.ime,
                    self.regs.pc
                );
            }
            return None;
        }

        debug_assert!(
            self.scratch.is_empty(),
            "scratch stack not drained at instruction boundary"
        );
        if self.ime && !pending.is_empty() {
            return Cursor::at(self.program.interrupt);
        }
        self.instr_pc = self.regs.pc;
        Cursor::at(self.program.fetch)
    }

    /// HALT: stop fetching until an enabled interrupt is requested.
    ///
    /// With IME clear and an interrupt already pending the CPU does not halt
    /// at all; instead the next PC advance is skipped once (HALT bug).
    pub(in crate::cpu) fn halt<B: Bus>(&mut self, bus: &mut B) {
        let pending = self.pending_interrupts(bus);
        if self.ime || pending.is_empty() {
            self.halted = true;
            log::debug!("GB CPU entering HALT at pc=0x{:04X}", self.instr_pc);
        } else {
            self.halt_bug = true;
            log::debug!(
                "GB CPU HALT bug armed at pc=0x{:04X}: pending={:?} with IME clear",
                self.instr_pc,
                pending
            );
        }
    }

    /// First step of interrupt dispatch: latch the highest-priority pending
    /// line, clear its IF bit and leave the vector on the scratch stack for
    /// the final PC store.
    pub(in crate::cpu) fn acknowledge_interrupt<B: Bus>(&mut self, bus: &mut B) {
        // Only a later EI or RETI may turn IME back on, not one issued
        // before the dispatch.
        self.ime = false;
        self.ime_enable_pending = false;
        self.ime_enable_delay = false;

        // EI followed by HALT with a request already pending: the interrupt
        // wins the race and returns to the HALT opcode instead of skipping
        // the next PC advance.
        if self.halt_bug {
            self.halt_bug = false;
            self.regs.pc = self.regs.pc.wrapping_sub(1);
        }

        let ie = bus.read8(IE_ADDR);
        let iflags = bus.read8(IF_ADDR);
        // The boundary check that started this pipeline ran in the same call.
        let Some(irq) = Interrupt::from_bits_truncate(ie & iflags).highest_priority() else {
            panic!("interrupt dispatch started with no pending interrupt");
        };
        log::debug!(
            "GB CPU interrupt: irq={:?} vector=0x{:04X} pc=0x{:04X} sp=0x{:04X} IF=0x{:02X} IE=0x{:02X}",
            irq,
            irq.vector(),
            self.regs.pc,
            self.regs.sp,
            iflags & 0x1F,
            ie,
        );
        bus.write8(IF_ADDR, iflags & !irq.bits());
        self.scratch.push_word(irq.vector());
    }
}
