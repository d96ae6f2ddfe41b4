//! Cycle-stepped CPU engine for the Game Boy family (SM83).
//!
//! The CPU consumes a byte-addressable [`cpu::Bus`] and is advanced one
//! machine cycle per [`Cpu::step`] call. Video, audio, timers and the
//! memory map live behind the bus.

pub mod cpu;
pub mod memory;

pub use cpu::{Bus, Cpu, CpuConfig, Interrupt, Model, Registers};
pub use memory::FlatBus;
