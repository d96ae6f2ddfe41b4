//! Micro-step pipeline building blocks.
//!
//! An instruction is a flat run of [`Step`]s stored in one shared arena
//! (see `table`). A [`Span`] addresses such a run; a [`Cursor`] walks it
//! for exactly one CPU. Only three steps take a machine cycle
//! (`ReadByte`, `WriteByte`, `Delay`); every other step piggybacks on the
//! cycle next to it.

use super::{Cond, R16, R8};

/// Location of a pipeline inside the step arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: u16,
    pub len: u16,
}

impl Span {
    #[inline]
    pub const fn end(self) -> usize {
        self.start as usize + self.len as usize
    }
}

/// Which opcode table a dispatch step decodes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Base,
    Cb,
}

/// Two-operand accumulator operations: pop rhs, pop lhs, push result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    /// Same as `Sub` but the result is dropped.
    Cp,
}

impl AluOp {
    pub const ALL: [AluOp; 8] = [
        AluOp::Add,
        AluOp::Adc,
        AluOp::Sub,
        AluOp::Sbc,
        AluOp::And,
        AluOp::Xor,
        AluOp::Or,
        AluOp::Cp,
    ];

    pub const fn prefix(self) -> &'static str {
        match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB ",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND ",
            AluOp::Xor => "XOR ",
            AluOp::Or => "OR ",
            AluOp::Cp => "CP ",
        }
    }
}

/// Single-operand byte operations: pop a value, push the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Inc,
    Dec,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    /// Accumulator rotates: identical to the CB forms except Z is always cleared.
    Rlca,
    Rrca,
    Rla,
    Rra,
    Set(u8),
    Res(u8),
}

impl UnaryOp {
    /// CB-prefixed rotate/shift group in opcode order.
    pub const CB_SHIFTS: [UnaryOp; 8] = [
        UnaryOp::Rlc,
        UnaryOp::Rrc,
        UnaryOp::Rl,
        UnaryOp::Rr,
        UnaryOp::Sla,
        UnaryOp::Sra,
        UnaryOp::Swap,
        UnaryOp::Srl,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Inc => "INC",
            UnaryOp::Dec => "DEC",
            UnaryOp::Rlc => "RLC",
            UnaryOp::Rrc => "RRC",
            UnaryOp::Rl => "RL",
            UnaryOp::Rr => "RR",
            UnaryOp::Sla => "SLA",
            UnaryOp::Sra => "SRA",
            UnaryOp::Swap => "SWAP",
            UnaryOp::Srl => "SRL",
            UnaryOp::Rlca => "RLCA",
            UnaryOp::Rrca => "RRCA",
            UnaryOp::Rla => "RLA",
            UnaryOp::Rra => "RRA",
            UnaryOp::Set(_) => "SET",
            UnaryOp::Res(_) => "RES",
        }
    }
}

/// One micro-step of an instruction.
///
/// Stack effects are written as `before -- after`, top of the scratch
/// stack on the right; `w` is a word (two bytes), `b` a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Nop,
    /// `-- b`
    LoadReg8(R8),
    /// `b --`
    StoreReg8(R8),
    /// `-- w`
    LoadReg16(R16),
    /// `w --`
    StoreReg16(R16),
    /// `-- w`
    Const16(u16),
    /// PC += 1, unless the HALT bug swallows this one advance.
    AdvancePc,
    /// `b -- w` with `w = 0xFF00 | b`.
    HighPage,
    /// `b b -- b` (`Cp` leaves nothing).
    Alu(AluOp),
    /// `b -- b`
    Unary(UnaryOp),
    /// `b --`, flags only.
    Bit(u8),
    /// `w -- w`
    Inc16,
    /// `w -- w`
    Dec16,
    /// `w w -- w` with ADD HL,rr flags.
    AddWords,
    /// `b -- w`: SP plus the signed byte, with ADD SP,e flags.
    AddSpOffset,
    /// `b --`: PC += signed byte.
    JumpRelative,
    /// SP -= 2, `-- w` where `w` is the new SP.
    StackSlot,
    IncSp,
    /// `value addr -- b addr b addr`: splits a word store into two byte
    /// stores, ordered so the first `WriteByte` hits the high byte when
    /// `high_first` is set.
    SplitWord { high_first: bool },
    IncHl,
    DecHl,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Ei,
    Di,
    /// RETI: IME on immediately, no delay.
    EnableIme,
    Halt,
    Stop,
    /// First step of the interrupt-dispatch pipeline: `-- w` (vector).
    AckInterrupt,
    /// Undefined opcode; behaves as NOP.
    Illegal,
    /// Evaluates `cond` into the cursor's [`Decision`]; when taken the
    /// cursor continues at `taken`, otherwise after this step.
    Branch { cond: Cond, taken: Span },
    /// Drop `n` bytes the not-taken path of a branch leaves behind.
    Discard(u8),
    /// `b --` on advance: continue with the pipeline for the decoded opcode.
    Dispatch(Table),
    /// `w -- b`, one machine cycle.
    ReadByte,
    /// `b w --`, one machine cycle.
    WriteByte,
    /// Internal delay, one machine cycle.
    Delay,
}

impl Step {
    #[inline]
    pub const fn consumes_cycle(&self) -> bool {
        matches!(self, Step::ReadByte | Step::WriteByte | Step::Delay)
    }
}

/// Outcome of the branch step the cursor currently sits on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Decision {
    #[default]
    Pending,
    Taken,
    NotTaken,
}

impl Decision {
    /// Read the decision and reset it for the next branch.
    #[inline]
    pub fn take(&mut self) -> Decision {
        std::mem::take(self)
    }
}

/// Live position of one CPU inside a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub pos: usize,
    pub end: usize,
    pub decision: Decision,
}

impl Cursor {
    #[inline]
    pub fn at(span: Span) -> Option<Cursor> {
        if span.len == 0 {
            return None;
        }
        Some(Cursor {
            pos: span.start as usize,
            end: span.end(),
            decision: Decision::Pending,
        })
    }

    /// The step after this one within the same span, if any.
    #[inline]
    pub fn next(self) -> Option<Cursor> {
        let pos = self.pos + 1;
        (pos < self.end).then_some(Cursor { pos, ..self })
    }
}

/// A not-yet-placed run of steps. Composite operand accessors and
/// parameter fetches are fragments that get spliced into the instruction
/// using them, so every template is a single flat run in the arena.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment(Vec<Step>);

impl Fragment {
    #[inline]
    pub fn append(&mut self, other: Fragment) {
        self.0.extend(other.0);
    }

    #[inline]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    #[cfg(test)]
    pub fn cycles(&self) -> usize {
        self.0.iter().filter(|step| step.consumes_cycle()).count()
    }
}

impl From<Step> for Fragment {
    fn from(step: Step) -> Self {
        Fragment(vec![step])
    }
}

/// Concatenate steps and fragments into one flat fragment.
macro_rules! sequence {
    ($($part:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut seq = $crate::cpu::pipeline::Fragment::default();
        $( seq.append($crate::cpu::pipeline::Fragment::from($part)); )*
        seq
    }};
}

pub(crate) use sequence;
