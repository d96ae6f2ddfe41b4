use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Flag bits in the F register.
    ///
    /// Layout (bit index in the byte, from MSB to LSB):
    /// - bit 7: Z (zero)
    /// - bit 6: N (subtract)
    /// - bit 5: H (half carry)
    /// - bit 4: C (carry)
    /// - bits 0–3 are always zero.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const Z = 0x80;
        const N = 0x40;
        const H = 0x20;
        const C = 0x10;
    }
}

impl Flags {
    /// Build flags from a raw F byte. The low nibble is dropped.
    #[inline]
    pub const fn from_f(value: u8) -> Self {
        Self::from_bits_truncate(value)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pick = |flag: Flags, c: char| if self.contains(flag) { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            pick(Flags::Z, 'Z'),
            pick(Flags::N, 'N'),
            pick(Flags::H, 'H'),
            pick(Flags::C, 'C')
        )
    }
}

/// Registers for the Game Boy CPU (SM83).
///
/// Only the 8-bit halves are stored; the AF/BC/DE/HL views are packed and
/// unpacked on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f.bits()])
    }

    #[inline]
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.f = Flags::from_f(f);
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.b = b;
        self.c = c;
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.d = d;
        self.e = e;
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.h = h;
        self.l = l;
    }

    pub fn get8(&self, reg: R8) -> u8 {
        match reg {
            R8::A => self.a,
            R8::B => self.b,
            R8::C => self.c,
            R8::D => self.d,
            R8::E => self.e,
            R8::H => self.h,
            R8::L => self.l,
        }
    }

    pub fn set8(&mut self, reg: R8, value: u8) {
        match reg {
            R8::A => self.a = value,
            R8::B => self.b = value,
            R8::C => self.c = value,
            R8::D => self.d = value,
            R8::E => self.e = value,
            R8::H => self.h = value,
            R8::L => self.l = value,
        }
    }

    pub fn get16(&self, reg: R16) -> u16 {
        match reg {
            R16::Af => self.af(),
            R16::Bc => self.bc(),
            R16::De => self.de(),
            R16::Hl => self.hl(),
            R16::Sp => self.sp,
            R16::Pc => self.pc,
        }
    }

    pub fn set16(&mut self, reg: R16, value: u16) {
        match reg {
            R16::Af => self.set_af(value),
            R16::Bc => self.set_bc(value),
            R16::De => self.set_de(value),
            R16::Hl => self.set_hl(value),
            R16::Sp => self.sp = value,
            R16::Pc => self.pc = value,
        }
    }

    #[inline]
    pub fn flag(&self, flag: Flags) -> bool {
        self.f.contains(flag)
    }
}

/// 8-bit register selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum R8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

impl R8 {
    pub const fn name(self) -> &'static str {
        match self {
            R8::A => "A",
            R8::B => "B",
            R8::C => "C",
            R8::D => "D",
            R8::E => "E",
            R8::H => "H",
            R8::L => "L",
        }
    }
}

/// 16-bit register selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum R16 {
    Af,
    Bc,
    De,
    Hl,
    Sp,
    Pc,
}

impl R16 {
    pub const fn name(self) -> &'static str {
        match self {
            R16::Af => "AF",
            R16::Bc => "BC",
            R16::De => "DE",
            R16::Hl => "HL",
            R16::Sp => "SP",
            R16::Pc => "PC",
        }
    }
}

/// Branch condition tested by the conditional jump/call/return family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Always,
    /// Taken when `flag` is set (`expect == true`) or clear (`expect == false`).
    Flag { flag: Flags, expect: bool },
}

impl Cond {
    pub const NZ: Cond = Cond::Flag { flag: Flags::Z, expect: false };
    pub const Z: Cond = Cond::Flag { flag: Flags::Z, expect: true };
    pub const NC: Cond = Cond::Flag { flag: Flags::C, expect: false };
    pub const C: Cond = Cond::Flag { flag: Flags::C, expect: true };

    #[inline]
    pub fn holds(self, flags: Flags) -> bool {
        match self {
            Cond::Always => true,
            Cond::Flag { flag, expect } => flags.contains(flag) == expect,
        }
    }
}
