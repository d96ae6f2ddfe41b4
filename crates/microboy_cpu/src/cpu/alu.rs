//! Flag-producing arithmetic, logic, rotate and bit operations.
//!
//! Every function here is pure: it takes operands (and the incoming flags
//! where some of them survive the operation) and returns the result together
//! with the complete new flag set. The pipeline steps in `exec` are the only
//! place where results are written back to the register file.

use super::Flags;

#[inline]
fn zero(value: u8) -> Flags {
    if value == 0 {
        Flags::Z
    } else {
        Flags::empty()
    }
}

#[inline]
fn when(cond: bool, flag: Flags) -> Flags {
    if cond {
        flag
    } else {
        Flags::empty()
    }
}

/// 8-bit ADD/ADC. `carry` is the incoming carry bit (always false for ADD).
pub fn add(a: u8, b: u8, carry: bool) -> (u8, Flags) {
    let full = a as u16 + b as u16 + carry as u16;
    let result = full as u8;
    let flags = zero(result)
        | when((result ^ a ^ b) & 0x10 != 0, Flags::H)
        | when(full > 0xFF, Flags::C);
    (result, flags)
}

/// 8-bit SUB/SBC/CP. `borrow` is the incoming carry bit (always false for SUB).
pub fn sub(a: u8, b: u8, borrow: bool) -> (u8, Flags) {
    let full = a as i16 - b as i16 - borrow as i16;
    let result = full as u8;
    let flags = zero(result)
        | Flags::N
        | when((result ^ a ^ b) & 0x10 != 0, Flags::H)
        | when(full < 0, Flags::C);
    (result, flags)
}

pub fn and(a: u8, b: u8) -> (u8, Flags) {
    let result = a & b;
    (result, zero(result) | Flags::H)
}

pub fn or(a: u8, b: u8) -> (u8, Flags) {
    let result = a | b;
    (result, zero(result))
}

pub fn xor(a: u8, b: u8) -> (u8, Flags) {
    let result = a ^ b;
    (result, zero(result))
}

/// INC r. C is left as it was.
pub fn inc(value: u8, flags: Flags) -> (u8, Flags) {
    let result = value.wrapping_add(1);
    let flags = (flags & Flags::C) | zero(result) | when(value & 0x0F == 0x0F, Flags::H);
    (result, flags)
}

/// DEC r. C is left as it was.
pub fn dec(value: u8, flags: Flags) -> (u8, Flags) {
    let result = value.wrapping_sub(1);
    let flags =
        (flags & Flags::C) | zero(result) | Flags::N | when(value & 0x0F == 0, Flags::H);
    (result, flags)
}

#[inline]
fn shifted(result: u8, carry: bool, check_zero: bool) -> (u8, Flags) {
    let z = if check_zero { zero(result) } else { Flags::empty() };
    (result, z | when(carry, Flags::C))
}

/// RLC / RLCA: bit 7 goes to both C and bit 0.
///
/// `check_zero` is false for the accumulator form, which always clears Z.
pub fn rlc(value: u8, check_zero: bool) -> (u8, Flags) {
    shifted(value.rotate_left(1), value & 0x80 != 0, check_zero)
}

/// RRC / RRCA: bit 0 goes to both C and bit 7.
pub fn rrc(value: u8, check_zero: bool) -> (u8, Flags) {
    shifted(value.rotate_right(1), value & 0x01 != 0, check_zero)
}

/// RL / RLA: rotate left through carry.
pub fn rl(value: u8, carry: bool, check_zero: bool) -> (u8, Flags) {
    shifted((value << 1) | carry as u8, value & 0x80 != 0, check_zero)
}

/// RR / RRA: rotate right through carry.
pub fn rr(value: u8, carry: bool, check_zero: bool) -> (u8, Flags) {
    shifted((value >> 1) | ((carry as u8) << 7), value & 0x01 != 0, check_zero)
}

pub fn sla(value: u8) -> (u8, Flags) {
    shifted(value << 1, value & 0x80 != 0, true)
}

/// Arithmetic shift right; bit 7 is preserved.
pub fn sra(value: u8) -> (u8, Flags) {
    shifted((value >> 1) | (value & 0x80), value & 0x01 != 0, true)
}

pub fn srl(value: u8) -> (u8, Flags) {
    shifted(value >> 1, value & 0x01 != 0, true)
}

pub fn swap(value: u8) -> (u8, Flags) {
    let result = value.rotate_left(4);
    (result, zero(result))
}

/// BIT n: Z reflects the tested bit, H is set, N cleared, C untouched.
pub fn bit(n: u8, value: u8, flags: Flags) -> Flags {
    (flags & Flags::C) | Flags::H | when(value & (1 << n) == 0, Flags::Z)
}

#[inline]
pub fn set(n: u8, value: u8) -> u8 {
    value | (1 << n)
}

#[inline]
pub fn res(n: u8, value: u8) -> u8 {
    value & !(1 << n)
}

/// Decimal adjust after a BCD addition or subtraction.
///
/// The direction comes from N; H and C select the 0x06/0x60 corrections.
/// N is preserved, H always cleared, C is set when the upper digit needed
/// correcting (and never cleared once set by the prior operation).
pub fn daa(a: u8, flags: Flags) -> (u8, Flags) {
    let mut value = a as u16;
    let mut carry = flags.contains(Flags::C);

    if !flags.contains(Flags::N) {
        if flags.contains(Flags::H) || value & 0x0F > 0x09 {
            value += 0x06;
        }
        if carry || value > 0x9F {
            value += 0x60;
        }
    } else {
        if flags.contains(Flags::H) {
            value = value.wrapping_sub(0x06) & 0xFF;
        }
        if carry {
            value = value.wrapping_sub(0x60);
        }
    }

    if value & 0x100 != 0 {
        carry = true;
    }
    let result = value as u8;
    (result, zero(result) | (flags & Flags::N) | when(carry, Flags::C))
}

pub fn cpl(a: u8, flags: Flags) -> (u8, Flags) {
    (!a, flags | Flags::N | Flags::H)
}

pub fn scf(flags: Flags) -> Flags {
    (flags & Flags::Z) | Flags::C
}

pub fn ccf(flags: Flags) -> Flags {
    (flags & Flags::Z) | when(!flags.contains(Flags::C), Flags::C)
}

/// ADD HL,rr: Z untouched, N cleared, H from bit 11, C from bit 15.
pub fn add16(a: u16, b: u16, flags: Flags) -> (u16, Flags) {
    let result = a.wrapping_add(b);
    let flags = (flags & Flags::Z)
        | when((a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF, Flags::H)
        | when(a as u32 + b as u32 > 0xFFFF, Flags::C);
    (result, flags)
}

/// SP plus a signed 8-bit offset (ADD SP,e / LD HL,SP+e).
///
/// Z and N are cleared; H and C come from the unsigned low-byte addition.
pub fn add_sp(sp: u16, offset: u8) -> (u16, Flags) {
    let result = sp.wrapping_add(offset as i8 as u16);
    let check = sp ^ offset as u16 ^ sp.wrapping_add(offset as u16);
    let flags = when(check & 0x10 != 0, Flags::H) | when(check & 0x100 != 0, Flags::C);
    (result, flags)
}
