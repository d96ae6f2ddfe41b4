//! Headless runner for test ROMs.
//!
//! Loads a ROM image into a [`FlatBus`], starts from the post-boot register
//! state and steps the CPU one machine cycle at a time until the ROM executes
//! the `LD B,B` debug marker or the cycle budget runs out.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context};
use microboy_cpu::{Cpu, CpuConfig, FlatBus, Model, Registers};
use typed_builder::TypedBuilder;

/// Mnemonic test ROMs execute to signal that they are done.
pub const DONE_MARKER: &str = "LD B,B";

/// Register values a passing mooneye-style test leaves behind.
pub const PASS_FINGERPRINT: [u8; 6] = [3, 5, 8, 13, 21, 34];

const ADDRESS_SPACE: usize = 0x1_0000;

#[derive(Clone, Debug, TypedBuilder)]
pub struct RunConfig {
    #[builder(setter(into))]
    pub rom_path: PathBuf,
    #[builder(default)]
    pub model: Model,
    /// Give up after this many machine cycles.
    #[builder(default = 100_000_000)]
    pub max_cycles: u64,
}

/// Outcome of a single ROM run.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    /// Whether the done marker executed before the cycle budget ran out.
    pub finished: bool,
    pub cycles: u64,
    pub registers: Registers,
}

impl RunReport {
    /// `B C D E H L` as a byte array.
    pub fn fingerprint(&self) -> [u8; 6] {
        let r = &self.registers;
        [r.b, r.c, r.d, r.e, r.h, r.l]
    }

    pub fn passed(&self) -> bool {
        self.finished && self.fingerprint() == PASS_FINGERPRINT
    }
}

pub fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    let rom = read_rom(&config.rom_path)?;
    log::info!(
        "Loaded ROM '{}' ({} bytes), model={:?}",
        config.rom_path.display(),
        rom.len(),
        config.model
    );
    run_rom(&rom, config.model, config.max_cycles)
}

fn read_rom(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read ROM file '{}'", path.display()))
}

/// Run an in-memory ROM image mapped at address 0.
pub fn run_rom(rom: &[u8], model: Model, max_cycles: u64) -> anyhow::Result<RunReport> {
    if rom.len() > ADDRESS_SPACE {
        bail!(
            "ROM is {} bytes, larger than the {} byte address space",
            rom.len(),
            ADDRESS_SPACE
        );
    }

    let mut bus = FlatBus::new();
    bus.load(0, rom);

    let mut cpu = Cpu::with_config(CpuConfig::builder().model(model).build());
    let done = Rc::new(Cell::new(false));
    let seen = Rc::clone(&done);
    cpu.set_trace(Some(Box::new(move |mnemonic: &'static str| {
        if mnemonic == DONE_MARKER {
            seen.set(true);
        }
    })));

    while !done.get() && cpu.cycles() < max_cycles {
        cpu.step(&mut bus);
    }
    // Let the marker instruction retire before sampling registers.
    while !cpu.at_instruction_boundary() {
        cpu.step(&mut bus);
    }

    Ok(RunReport {
        finished: done.get(),
        cycles: cpu.cycles(),
        registers: cpu.registers(),
    })
}
