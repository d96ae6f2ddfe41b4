pub mod alu;
mod bus;
mod exec;
mod init;
mod interrupts;
mod key1;
mod pipeline;
mod regs;
mod scratch;
mod table;

#[cfg(test)]
mod tests;

use std::fmt;

pub use bus::Bus;
pub use init::{CpuConfig, Model};
pub use interrupts::{Interrupt, IE_ADDR, IF_ADDR};
pub use key1::{Key1, KEY1_ADDR};
pub use regs::{Cond, Flags, Registers, R16, R8};
pub use scratch::ScratchStack;
pub use table::{cb_mnemonic, mnemonic};

use pipeline::{Cursor, Decision, Step};
use table::Program;

/// Per-instruction trace hook; receives the mnemonic of every opcode as it
/// is dispatched (CB-prefixed instructions report both `PREFIX CB` and the
/// prefixed mnemonic).
pub type TraceFn = Box<dyn FnMut(&'static str)>;

/// Game Boy CPU core driven one machine cycle at a time.
///
/// Each instruction runs as a precompiled pipeline of micro-steps. A call
/// to [`Cpu::step`] performs exactly one cycle-consuming step together with
/// the zero-cycle register transfers around it, so an instruction that
/// takes N machine cycles on hardware takes exactly N calls.
pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    /// Set by EI; becomes `ime_enable_delay` at the next boundary.
    ime_enable_pending: bool,
    /// Commits IME at the boundary after the instruction following EI.
    ime_enable_delay: bool,
    halted: bool,
    /// One-shot: swallow the next PC advance.
    halt_bug: bool,
    model: Model,
    key1: Option<Key1>,
    scratch: ScratchStack,
    /// In-flight pipeline; `None` at an instruction boundary.
    cursor: Option<Cursor>,
    program: &'static Program,
    /// Address of the opcode currently executing (for logging).
    instr_pc: u16,
    cycles: u64,
    trace: Option<TraceFn>,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("ime", &self.ime)
            .field("ime_enable_pending", &self.ime_enable_pending)
            .field("ime_enable_delay", &self.ime_enable_delay)
            .field("halted", &self.halted)
            .field("halt_bug", &self.halt_bug)
            .field("model", &self.model)
            .field("key1", &self.key1)
            .field("cursor", &self.cursor)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Cpu {
    /// Advance the CPU by a single machine cycle.
    ///
    /// At an instruction boundary this first decides between interrupt
    /// dispatch, opcode fetch, or idling in HALT. It then executes the next
    /// cycle-consuming step of the current pipeline plus every zero-cycle
    /// step that directly follows it, and returns as soon as the next
    /// cycle-consuming step is reached or the pipeline ends.
    pub fn step<B: Bus>(&mut self, bus: &mut B) {
        self.cycles += 1;

        let cursor = match self.cursor.take() {
            Some(cursor) => Some(cursor),
            None => self
                .begin_instruction(bus)
                .and_then(|cursor| self.run_immediates(cursor, bus)),
        };

        if let Some(cursor) = cursor {
            self.cursor = self.run_cycle(cursor, bus);
        }
    }

    /// Execute zero-cycle steps until a cycle-consuming one is reached.
    fn run_immediates<B: Bus>(&mut self, mut cursor: Cursor, bus: &mut B) -> Option<Cursor> {
        loop {
            let step = self.program.step(cursor.pos);
            if step.consumes_cycle() {
                return Some(cursor);
            }
            self.exec(step, bus, &mut cursor);
            cursor = self.advance(cursor, step)?;
        }
    }

    fn run_cycle<B: Bus>(&mut self, mut cursor: Cursor, bus: &mut B) -> Option<Cursor> {
        let step = self.program.step(cursor.pos);
        self.exec(step, bus, &mut cursor);
        let next = self.advance(cursor, step)?;
        self.run_immediates(next, bus)
    }

    /// Move the cursor past `step`, following branches and opcode dispatch.
    fn advance(&mut self, mut cursor: Cursor, step: Step) -> Option<Cursor> {
        match step {
            Step::Branch { taken, .. } => match cursor.decision.take() {
                Decision::Taken => Cursor::at(taken),
                Decision::NotTaken => cursor.next(),
                Decision::Pending => panic!("branch advanced before its condition was evaluated"),
            },
            Step::Dispatch(table) => {
                let program: &'static Program = self.program;
                let opcode = self.scratch.pop_byte();
                let entry = program.entry(table, opcode);
                log::trace!("0x{:04X}: {}", self.instr_pc, entry.mnemonic);
                if let Some(trace) = self.trace.as_mut() {
                    trace(entry.mnemonic.as_str());
                }
                Cursor::at(entry.span)
            }
            _ => cursor.next(),
        }
    }

    /// `true` between instructions, i.e. the next `step` makes a fresh
    /// fetch/interrupt/halt decision.
    #[inline]
    pub fn at_instruction_boundary(&self) -> bool {
        self.cursor.is_none()
    }

    /// Total number of `step` calls since construction or reset.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    pub fn model(&self) -> Model {
        self.model
    }

    /// KEY1 state; `None` on models without a speed switch.
    #[inline]
    pub fn key1(&self) -> Option<&Key1> {
        self.key1.as_ref()
    }

    #[inline]
    pub fn key1_mut(&mut self) -> Option<&mut Key1> {
        self.key1.as_mut()
    }

    /// Whether the CPU currently runs at double speed (CGB only).
    #[inline]
    pub fn double_speed(&self) -> bool {
        self.key1.is_some_and(|key1| key1.double_speed)
    }

    /// Register snapshot, e.g. for conformance fingerprints.
    #[inline]
    pub fn registers(&self) -> Registers {
        self.regs
    }

    /// Overwrite all registers, e.g. to skip the boot ROM.
    #[inline]
    pub fn set_registers(&mut self, regs: Registers) {
        self.regs = regs;
    }

    /// Install or remove the per-instruction trace hook.
    pub fn set_trace(&mut self, trace: Option<TraceFn>) {
        self.trace = trace;
    }
}
