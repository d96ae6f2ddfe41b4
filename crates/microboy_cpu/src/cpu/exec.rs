use super::key1::KEY1_ADDR;
use super::pipeline::{AluOp, Cursor, Decision, Step, UnaryOp};
use super::{alu, Bus, Cpu, Flags};

impl Cpu {
    /// Execute one micro-step against the register file, the scratch stack
    /// and (for the cycle-consuming steps) the bus.
    pub(super) fn exec<B: Bus>(&mut self, step: Step, bus: &mut B, cursor: &mut Cursor) {
        match step {
            Step::Nop | Step::Dispatch(_) | Step::Delay => {}

            Step::LoadReg8(r) => self.scratch.push_byte(self.regs.get8(r)),
            Step::StoreReg8(r) => {
                let value = self.scratch.pop_byte();
                self.regs.set8(r, value);
            }
            Step::LoadReg16(rr) => self.scratch.push_word(self.regs.get16(rr)),
            Step::StoreReg16(rr) => {
                let value = self.scratch.pop_word();
                self.regs.set16(rr, value);
            }
            Step::Const16(value) => self.scratch.push_word(value),

            Step::AdvancePc => {
                if self.halt_bug {
                    self.halt_bug = false;
                } else {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
            }
            Step::HighPage => {
                let offset = self.scratch.pop_byte();
                self.scratch.push_word(0xFF00 | offset as u16);
            }

            Step::Alu(op) => self.exec_alu(op),
            Step::Unary(op) => {
                let value = self.scratch.pop_byte();
                let result = self.exec_unary(op, value);
                self.scratch.push_byte(result);
            }
            Step::Bit(n) => {
                let value = self.scratch.pop_byte();
                self.regs.f = alu::bit(n, value, self.regs.f);
            }

            Step::Inc16 => {
                let value = self.scratch.pop_word();
                self.scratch.push_word(value.wrapping_add(1));
            }
            Step::Dec16 => {
                let value = self.scratch.pop_word();
                self.scratch.push_word(value.wrapping_sub(1));
            }
            Step::AddWords => {
                let rhs = self.scratch.pop_word();
                let lhs = self.scratch.pop_word();
                let (result, flags) = alu::add16(lhs, rhs, self.regs.f);
                self.regs.f = flags;
                self.scratch.push_word(result);
            }
            Step::AddSpOffset => {
                let offset = self.scratch.pop_byte();
                let (result, flags) = alu::add_sp(self.regs.sp, offset);
                self.regs.f = flags;
                self.scratch.push_word(result);
            }
            Step::JumpRelative => {
                let offset = self.scratch.pop_byte() as i8;
                self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
            }

            Step::StackSlot => {
                self.regs.sp = self.regs.sp.wrapping_sub(2);
                self.scratch.push_word(self.regs.sp);
            }
            Step::IncSp => self.regs.sp = self.regs.sp.wrapping_add(1),
            Step::SplitWord { high_first } => {
                let addr = self.scratch.pop_word();
                let [hi, lo] = self.scratch.pop_word().to_be_bytes();
                let (first, second) = if high_first {
                    ((hi, addr.wrapping_add(1)), (lo, addr))
                } else {
                    ((lo, addr), (hi, addr.wrapping_add(1)))
                };
                // Pushed in reverse: the first WriteByte pops `first`.
                self.scratch.push_byte(second.0);
                self.scratch.push_word(second.1);
                self.scratch.push_byte(first.0);
                self.scratch.push_word(first.1);
            }
            Step::IncHl => self.regs.set_hl(self.regs.hl().wrapping_add(1)),
            Step::DecHl => self.regs.set_hl(self.regs.hl().wrapping_sub(1)),

            Step::Daa => {
                let (a, flags) = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = a;
                self.regs.f = flags;
            }
            Step::Cpl => {
                let (a, flags) = alu::cpl(self.regs.a, self.regs.f);
                self.regs.a = a;
                self.regs.f = flags;
            }
            Step::Scf => self.regs.f = alu::scf(self.regs.f),
            Step::Ccf => self.regs.f = alu::ccf(self.regs.f),

            Step::Ei => {
                if !self.ime {
                    self.ime_enable_pending = true;
                }
            }
            Step::Di => {
                self.ime = false;
                self.ime_enable_pending = false;
                self.ime_enable_delay = false;
            }
            Step::EnableIme => self.ime = true,
            Step::Halt => self.halt(bus),
            Step::Stop => self.stop(),
            Step::AckInterrupt => self.acknowledge_interrupt(bus),
            Step::Illegal => {
                log::debug!(
                    "GB CPU undefined opcode at pc=0x{:04X}; executing as NOP",
                    self.instr_pc
                );
            }

            Step::Discard(n) => {
                for _ in 0..n {
                    self.scratch.pop_byte();
                }
            }
            Step::Branch { cond, .. } => {
                cursor.decision = if cond.holds(self.regs.f) {
                    Decision::Taken
                } else {
                    Decision::NotTaken
                };
            }

            Step::ReadByte => {
                let addr = self.scratch.pop_word();
                let value = self.read_byte(bus, addr);
                self.scratch.push_byte(value);
            }
            Step::WriteByte => {
                let addr = self.scratch.pop_word();
                let value = self.scratch.pop_byte();
                self.write_byte(bus, addr, value);
            }
        }
    }

    fn exec_alu(&mut self, op: AluOp) {
        let rhs = self.scratch.pop_byte();
        let lhs = self.scratch.pop_byte();
        let carry = self.regs.flag(Flags::C);
        let (result, flags) = match op {
            AluOp::Add => alu::add(lhs, rhs, false),
            AluOp::Adc => alu::add(lhs, rhs, carry),
            AluOp::Sub | AluOp::Cp => alu::sub(lhs, rhs, false),
            AluOp::Sbc => alu::sub(lhs, rhs, carry),
            AluOp::And => alu::and(lhs, rhs),
            AluOp::Xor => alu::xor(lhs, rhs),
            AluOp::Or => alu::or(lhs, rhs),
        };
        self.regs.f = flags;
        if op != AluOp::Cp {
            self.scratch.push_byte(result);
        }
    }

    fn exec_unary(&mut self, op: UnaryOp, value: u8) -> u8 {
        let flags = self.regs.f;
        let carry = flags.contains(Flags::C);
        let (result, flags) = match op {
            UnaryOp::Inc => alu::inc(value, flags),
            UnaryOp::Dec => alu::dec(value, flags),
            UnaryOp::Rlc => alu::rlc(value, true),
            UnaryOp::Rrc => alu::rrc(value, true),
            UnaryOp::Rl => alu::rl(value, carry, true),
            UnaryOp::Rr => alu::rr(value, carry, true),
            UnaryOp::Sla => alu::sla(value),
            UnaryOp::Sra => alu::sra(value),
            UnaryOp::Swap => alu::swap(value),
            UnaryOp::Srl => alu::srl(value),
            UnaryOp::Rlca => alu::rlc(value, false),
            UnaryOp::Rrca => alu::rrc(value, false),
            UnaryOp::Rla => alu::rl(value, carry, false),
            UnaryOp::Rra => alu::rr(value, carry, false),
            UnaryOp::Set(n) => (alu::set(n, value), flags),
            UnaryOp::Res(n) => (alu::res(n, value), flags),
        };
        self.regs.f = flags;
        result
    }

    /// STOP. Only the CGB speed switch is modelled; otherwise the opcode
    /// byte is consumed and nothing else happens.
    fn stop(&mut self) {
        if self.key1.as_mut().is_some_and(|key1| key1.switch_speed()) {
            log::info!("GB CPU speed switch: double_speed={}", self.double_speed());
        } else {
            log::debug!("GB CPU STOP at pc=0x{:04X} ignored", self.instr_pc);
        }
    }

    /// Bus read issued by a pipeline step. KEY1 belongs to the CPU on CGB.
    fn read_byte<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        match self.key1 {
            Some(key1) if addr == KEY1_ADDR => key1.read(),
            _ => bus.read8(addr),
        }
    }

    fn write_byte<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        match self.key1.as_mut() {
            Some(key1) if addr == KEY1_ADDR => key1.write(value),
            _ => bus.write8(addr, value),
        }
    }
}
