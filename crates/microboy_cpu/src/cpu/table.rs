//! Precompiled pipelines for every opcode.
//!
//! All templates live in one arena of [`Step`]s that is built once, on
//! first use, and only read afterwards. The base and CB-prefixed tables
//! map an opcode byte to the [`Span`] of its pipeline plus a mnemonic used
//! for tracing.

use lazy_static::lazy_static;

use super::pipeline::{sequence, AluOp, Fragment, Span, Step, Table, UnaryOp};
use super::{Cond, R16, R8};

lazy_static! {
    pub(crate) static ref PROGRAM: Program = Program::build();
}

/// One decoded opcode.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub span: Span,
    pub mnemonic: String,
}

/// The shared, immutable step arena plus the dispatch tables into it.
pub(crate) struct Program {
    steps: Vec<Step>,
    /// Opcode fetch: read at PC, advance PC, dispatch through the base table.
    pub fetch: Span,
    /// Interrupt entry: five machine cycles ending at the vector.
    pub interrupt: Span,
    base: [Entry; 256],
    cb: [Entry; 256],
}

impl Program {
    #[inline]
    pub fn step(&self, pos: usize) -> Step {
        match self.steps.get(pos) {
            Some(step) => *step,
            None => panic!("pipeline cursor {pos} points past the step arena"),
        }
    }

    #[inline]
    pub fn entry(&self, table: Table, opcode: u8) -> &Entry {
        match table {
            Table::Base => &self.base[opcode as usize],
            Table::Cb => &self.cb[opcode as usize],
        }
    }

    fn build() -> Self {
        let mut asm = Assembler::default();

        let fetch = asm.place(sequence![param_byte(), Step::Dispatch(Table::Base)]);
        let interrupt = asm.place(sequence![
            Step::AckInterrupt,
            Step::Delay,
            push(R16::Pc),
            Step::Delay,
            Step::StoreReg16(R16::Pc),
        ]);
        let base = std::array::from_fn(|op| asm.base(op as u8));
        let cb = std::array::from_fn(|op| asm.cb(op as u8));

        log::debug!("opcode tables built: {} steps", asm.steps.len());

        Program {
            steps: asm.steps,
            fetch,
            interrupt,
            base,
            cb,
        }
    }
}

/// Mnemonic of an unprefixed opcode, as passed to the trace callback.
pub fn mnemonic(opcode: u8) -> &'static str {
    &PROGRAM.entry(Table::Base, opcode).mnemonic
}

/// Mnemonic of a CB-prefixed opcode.
pub fn cb_mnemonic(opcode: u8) -> &'static str {
    &PROGRAM.entry(Table::Cb, opcode).mnemonic
}

/// Byte operand of an instruction, as encoded in the low/middle opcode bits.
#[derive(Clone, Copy, Debug)]
enum Operand {
    Reg(R8),
    Mem(R16),
    Imm,
}

impl Operand {
    /// Operand order used by the 3-bit register field: B C D E H L (HL) A.
    fn decode(index: u8) -> Operand {
        match index & 7 {
            0 => Operand::Reg(R8::B),
            1 => Operand::Reg(R8::C),
            2 => Operand::Reg(R8::D),
            3 => Operand::Reg(R8::E),
            4 => Operand::Reg(R8::H),
            5 => Operand::Reg(R8::L),
            6 => Operand::Mem(R16::Hl),
            _ => Operand::Reg(R8::A),
        }
    }

    fn read(self) -> Fragment {
        match self {
            Operand::Reg(r) => sequence![Step::LoadReg8(r)],
            Operand::Mem(rr) => sequence![Step::LoadReg16(rr), Step::ReadByte],
            Operand::Imm => param_byte(),
        }
    }

    fn write(self) -> Fragment {
        match self {
            Operand::Reg(r) => sequence![Step::StoreReg8(r)],
            Operand::Mem(rr) => sequence![Step::LoadReg16(rr), Step::WriteByte],
            Operand::Imm => unreachable!("immediate operands are read-only"),
        }
    }

    fn name(self) -> String {
        match self {
            Operand::Reg(r) => r.name().to_string(),
            Operand::Mem(rr) => format!("({})", rr.name()),
            Operand::Imm => "n".to_string(),
        }
    }
}

const RP: [R16; 4] = [R16::Bc, R16::De, R16::Hl, R16::Sp];
const RP2: [R16; 4] = [R16::Bc, R16::De, R16::Hl, R16::Af];
const CC: [(Cond, &str); 4] = [
    (Cond::NZ, "NZ"),
    (Cond::Z, "Z"),
    (Cond::NC, "NC"),
    (Cond::C, "C"),
];

/// Read the byte at PC and advance PC: `-- b`.
fn param_byte() -> Fragment {
    sequence![Step::LoadReg16(R16::Pc), Step::AdvancePc, Step::ReadByte]
}

/// Little-endian immediate word: `-- w`.
fn param_word() -> Fragment {
    sequence![param_byte(), param_byte()]
}

/// Push a register pair onto the machine stack (3 cycles).
fn push(rr: R16) -> Fragment {
    sequence![
        Step::LoadReg16(rr),
        Step::StackSlot,
        Step::Delay,
        Step::SplitWord { high_first: true },
        Step::WriteByte,
        Step::WriteByte,
    ]
}

/// Pop a register pair from the machine stack (2 cycles).
fn pop(rr: R16) -> Fragment {
    sequence![
        Step::LoadReg16(R16::Sp),
        Step::ReadByte,
        Step::IncSp,
        Step::LoadReg16(R16::Sp),
        Step::ReadByte,
        Step::IncSp,
        Step::StoreReg16(rr),
    ]
}

/// Read-modify-write of a byte operand.
fn modify(operand: Operand, op: UnaryOp) -> Fragment {
    sequence![operand.read(), Step::Unary(op), operand.write()]
}

/// `A <- A op operand`.
fn alu(op: AluOp, operand: Operand) -> Fragment {
    let store = if op == AluOp::Cp {
        Fragment::default()
    } else {
        sequence![Step::StoreReg8(R8::A)]
    };
    sequence![Step::LoadReg8(R8::A), operand.read(), Step::Alu(op), store]
}

#[derive(Default)]
struct Assembler {
    steps: Vec<Step>,
}

impl Assembler {
    fn place(&mut self, fragment: Fragment) -> Span {
        let start = self.steps.len();
        self.steps.extend_from_slice(fragment.steps());
        let len = self.steps.len() - start;
        match (u16::try_from(start), u16::try_from(len)) {
            (Ok(start), Ok(len)) => Span { start, len },
            _ => panic!("step arena outgrew 16-bit spans"),
        }
    }

    /// A conditional node. `taken` replaces the rest of the instruction; the
    /// not-taken path only drops the `operand` bytes still on the scratch
    /// stack.
    fn branch(&mut self, cond: Cond, taken: Fragment, operand: u8) -> Fragment {
        let taken = self.place(taken);
        let skip = if operand == 0 {
            Fragment::default()
        } else {
            sequence![Step::Discard(operand)]
        };
        sequence![Step::Branch { cond, taken }, skip]
    }

    fn entry(&mut self, fragment: Fragment, mnemonic: impl Into<String>) -> Entry {
        Entry {
            span: self.place(fragment),
            mnemonic: mnemonic.into(),
        }
    }

    fn jp(&mut self, cond: Cond) -> Fragment {
        let taken = sequence![Step::Delay, Step::StoreReg16(R16::Pc)];
        sequence![param_word(), self.branch(cond, taken, 2)]
    }

    fn jr(&mut self, cond: Cond) -> Fragment {
        let taken = sequence![Step::Delay, Step::JumpRelative];
        sequence![param_byte(), self.branch(cond, taken, 1)]
    }

    fn call(&mut self, cond: Cond) -> Fragment {
        let taken = sequence![push(R16::Pc), Step::StoreReg16(R16::Pc)];
        sequence![param_word(), self.branch(cond, taken, 2)]
    }

    fn ret_cond(&mut self, cond: Cond) -> Fragment {
        let taken = sequence![pop(R16::Pc), Step::Delay];
        sequence![Step::Delay, self.branch(cond, taken, 0)]
    }

    fn base(&mut self, op: u8) -> Entry {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = (y >> 1) as usize;
        let q = y & 1;

        match (x, z) {
            (0, 0) => match y {
                0 => self.entry(sequence![Step::Nop], "NOP"),
                1 => self.entry(
                    sequence![
                        Step::LoadReg16(R16::Sp),
                        param_word(),
                        Step::SplitWord { high_first: false },
                        Step::WriteByte,
                        Step::WriteByte,
                    ],
                    "LD (nn),SP",
                ),
                2 => self.entry(sequence![Step::Stop], "STOP"),
                3 => {
                    let jr = self.jr(Cond::Always);
                    self.entry(jr, "JR e")
                }
                _ => {
                    let (cond, name) = CC[(y - 4) as usize];
                    let jr = self.jr(cond);
                    self.entry(jr, format!("JR {name},e"))
                }
            },
            (0, 1) => {
                let rr = RP[p];
                if q == 0 {
                    self.entry(
                        sequence![param_word(), Step::StoreReg16(rr)],
                        format!("LD {},nn", rr.name()),
                    )
                } else {
                    self.entry(
                        sequence![
                            Step::Delay,
                            Step::LoadReg16(R16::Hl),
                            Step::LoadReg16(rr),
                            Step::AddWords,
                            Step::StoreReg16(R16::Hl),
                        ],
                        format!("ADD HL,{}", rr.name()),
                    )
                }
            }
            (0, 2) => {
                let (addr, post, text) = match p {
                    0 => (R16::Bc, None, "(BC)"),
                    1 => (R16::De, None, "(DE)"),
                    2 => (R16::Hl, Some(Step::IncHl), "(HL+)"),
                    _ => (R16::Hl, Some(Step::DecHl), "(HL-)"),
                };
                let post = post.map(Fragment::from).unwrap_or_default();
                if q == 0 {
                    self.entry(
                        sequence![
                            Step::LoadReg8(R8::A),
                            Step::LoadReg16(addr),
                            Step::WriteByte,
                            post,
                        ],
                        format!("LD {text},A"),
                    )
                } else {
                    self.entry(
                        sequence![
                            Step::LoadReg16(addr),
                            Step::ReadByte,
                            Step::StoreReg8(R8::A),
                            post,
                        ],
                        format!("LD A,{text}"),
                    )
                }
            }
            (0, 3) => {
                let rr = RP[p];
                let (step, name) = if q == 0 {
                    (Step::Inc16, "INC")
                } else {
                    (Step::Dec16, "DEC")
                };
                self.entry(
                    sequence![Step::Delay, Step::LoadReg16(rr), step, Step::StoreReg16(rr)],
                    format!("{name} {}", rr.name()),
                )
            }
            (0, 4) | (0, 5) => {
                let operand = Operand::decode(y);
                let op = if z == 4 { UnaryOp::Inc } else { UnaryOp::Dec };
                self.entry(modify(operand, op), format!("{} {}", op.name(), operand.name()))
            }
            (0, 6) => {
                let operand = Operand::decode(y);
                self.entry(
                    sequence![param_byte(), operand.write()],
                    format!("LD {},n", operand.name()),
                )
            }
            (0, _) => {
                let (fragment, name) = match y {
                    0 => (modify(Operand::Reg(R8::A), UnaryOp::Rlca), "RLCA"),
                    1 => (modify(Operand::Reg(R8::A), UnaryOp::Rrca), "RRCA"),
                    2 => (modify(Operand::Reg(R8::A), UnaryOp::Rla), "RLA"),
                    3 => (modify(Operand::Reg(R8::A), UnaryOp::Rra), "RRA"),
                    4 => (sequence![Step::Daa], "DAA"),
                    5 => (sequence![Step::Cpl], "CPL"),
                    6 => (sequence![Step::Scf], "SCF"),
                    _ => (sequence![Step::Ccf], "CCF"),
                };
                self.entry(fragment, name)
            }
            (1, _) => {
                if y == 6 && z == 6 {
                    return self.entry(sequence![Step::Halt], "HALT");
                }
                let dst = Operand::decode(y);
                let src = Operand::decode(z);
                self.entry(
                    sequence![src.read(), dst.write()],
                    format!("LD {},{}", dst.name(), src.name()),
                )
            }
            (2, _) => {
                let op = AluOp::ALL[y as usize];
                let src = Operand::decode(z);
                self.entry(alu(op, src), format!("{}{}", op.prefix(), src.name()))
            }
            (_, 0) => match y {
                0..=3 => {
                    let (cond, name) = CC[y as usize];
                    let ret = self.ret_cond(cond);
                    self.entry(ret, format!("RET {name}"))
                }
                4 => self.entry(
                    sequence![
                        Step::LoadReg8(R8::A),
                        param_byte(),
                        Step::HighPage,
                        Step::WriteByte,
                    ],
                    "LDH (n),A",
                ),
                5 => self.entry(
                    sequence![
                        param_byte(),
                        Step::AddSpOffset,
                        Step::StoreReg16(R16::Sp),
                        Step::Delay,
                        Step::Delay,
                    ],
                    "ADD SP,e",
                ),
                6 => self.entry(
                    sequence![
                        param_byte(),
                        Step::HighPage,
                        Step::ReadByte,
                        Step::StoreReg8(R8::A),
                    ],
                    "LDH A,(n)",
                ),
                _ => self.entry(
                    sequence![
                        param_byte(),
                        Step::AddSpOffset,
                        Step::StoreReg16(R16::Hl),
                        Step::Delay,
                    ],
                    "LD HL,SP+e",
                ),
            },
            (_, 1) => {
                if q == 0 {
                    let rr = RP2[p];
                    return self.entry(pop(rr), format!("POP {}", rr.name()));
                }
                match p {
                    0 => self.entry(sequence![pop(R16::Pc), Step::Delay], "RET"),
                    1 => self.entry(
                        sequence![pop(R16::Pc), Step::Delay, Step::EnableIme],
                        "RETI",
                    ),
                    2 => self.entry(
                        sequence![Step::LoadReg16(R16::Hl), Step::StoreReg16(R16::Pc)],
                        "JP HL",
                    ),
                    _ => self.entry(
                        sequence![
                            Step::Delay,
                            Step::LoadReg16(R16::Hl),
                            Step::StoreReg16(R16::Sp),
                        ],
                        "LD SP,HL",
                    ),
                }
            }
            (_, 2) => match y {
                0..=3 => {
                    let (cond, name) = CC[y as usize];
                    let jp = self.jp(cond);
                    self.entry(jp, format!("JP {name},nn"))
                }
                4 => self.entry(
                    sequence![
                        Step::LoadReg8(R8::A),
                        Step::LoadReg8(R8::C),
                        Step::HighPage,
                        Step::WriteByte,
                    ],
                    "LD (C),A",
                ),
                5 => self.entry(
                    sequence![Step::LoadReg8(R8::A), param_word(), Step::WriteByte],
                    "LD (nn),A",
                ),
                6 => self.entry(
                    sequence![
                        Step::LoadReg8(R8::C),
                        Step::HighPage,
                        Step::ReadByte,
                        Step::StoreReg8(R8::A),
                    ],
                    "LD A,(C)",
                ),
                _ => self.entry(
                    sequence![param_word(), Step::ReadByte, Step::StoreReg8(R8::A)],
                    "LD A,(nn)",
                ),
            },
            (_, 3) => match y {
                0 => {
                    let jp = self.jp(Cond::Always);
                    self.entry(jp, "JP nn")
                }
                1 => self.entry(
                    sequence![param_byte(), Step::Dispatch(Table::Cb)],
                    "PREFIX CB",
                ),
                6 => self.entry(sequence![Step::Di], "DI"),
                7 => self.entry(sequence![Step::Ei], "EI"),
                _ => self.illegal(),
            },
            (_, 4) => match y {
                0..=3 => {
                    let (cond, name) = CC[y as usize];
                    let call = self.call(cond);
                    self.entry(call, format!("CALL {name},nn"))
                }
                _ => self.illegal(),
            },
            (_, 5) => {
                if q == 0 {
                    let rr = RP2[p];
                    self.entry(push(rr), format!("PUSH {}", rr.name()))
                } else if p == 0 {
                    let call = self.call(Cond::Always);
                    self.entry(call, "CALL nn")
                } else {
                    self.illegal()
                }
            }
            (_, 6) => {
                let op = AluOp::ALL[y as usize];
                self.entry(alu(op, Operand::Imm), format!("{}n", op.prefix()))
            }
            _ => {
                let vector = (y as u16) * 8;
                self.entry(
                    sequence![
                        push(R16::Pc),
                        Step::Const16(vector),
                        Step::StoreReg16(R16::Pc),
                    ],
                    format!("RST {vector:02X}H"),
                )
            }
        }
    }

    fn illegal(&mut self) -> Entry {
        self.entry(sequence![Step::Illegal], "ILLEGAL")
    }

    fn cb(&mut self, op: u8) -> Entry {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let operand = Operand::decode(op & 7);
        let target = operand.name();

        match x {
            0 => {
                let shift = UnaryOp::CB_SHIFTS[y as usize];
                self.entry(modify(operand, shift), format!("{} {target}", shift.name()))
            }
            1 => self.entry(
                sequence![operand.read(), Step::Bit(y)],
                format!("BIT {y},{target}"),
            ),
            2 => self.entry(
                modify(operand, UnaryOp::Res(y)),
                format!("RES {y},{target}"),
            ),
            _ => self.entry(
                modify(operand, UnaryOp::Set(y)),
                format!("SET {y},{target}"),
            ),
        }
    }
}
