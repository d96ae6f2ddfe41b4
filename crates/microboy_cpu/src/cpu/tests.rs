use std::cell::RefCell;
use std::rc::Rc;

use super::*;

struct TestBus {
    memory: [u8; 0x10000],
    /// Every bus write in issue order.
    writes: Vec<(u16, u8)>,
}

impl Default for TestBus {
    fn default() -> Self {
        Self {
            memory: [0; 0x10000],
            writes: Vec::new(),
        }
    }
}

impl TestBus {
    fn with_program(program: &[u8]) -> Self {
        let mut bus = Self::default();
        bus.memory[0x0100..0x0100 + program.len()].copy_from_slice(program);
        bus
    }
}

impl Bus for TestBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write8(&mut self, addr: u16, value: u8) {
        self.writes.push((addr, value));
        self.memory[addr as usize] = value;
    }
}

/// Run one full instruction (or interrupt dispatch) and return the number of
/// `step` calls it took.
fn run_instruction(cpu: &mut Cpu, bus: &mut TestBus) -> usize {
    let mut calls = 1;
    cpu.step(bus);
    while !cpu.at_instruction_boundary() {
        cpu.step(bus);
        calls += 1;
    }
    calls
}

fn record_trace(cpu: &mut Cpu) -> Rc<RefCell<Vec<&'static str>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    cpu.set_trace(Some(Box::new(move |mnemonic: &'static str| {
        sink.borrow_mut().push(mnemonic)
    })));
    log
}

/// Machine cycles per unprefixed opcode with the branch not taken.
///
/// HALT, STOP and the undefined opcodes count as a single fetch here. 0xCB is
/// measured with the zero byte that follows it (RLC B).
#[rustfmt::skip]
const BASE_CYCLES: [usize; 256] = [
    1,3,2,2,1,1,2,1,5,2,2,2,1,1,2,1,
    1,3,2,2,1,1,2,1,3,2,2,2,1,1,2,1,
    2,3,2,2,1,1,2,1,2,2,2,2,1,1,2,1,
    2,3,2,2,3,3,3,1,2,2,2,2,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    2,2,2,2,2,2,1,2,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    1,1,1,1,1,1,2,1,1,1,1,1,1,1,2,1,
    2,3,3,4,3,4,2,4,2,4,3,2,3,6,2,4,
    2,3,3,1,3,4,2,4,2,4,3,1,3,1,2,4,
    3,3,2,1,1,4,2,4,4,1,4,1,1,1,2,4,
    3,3,2,1,1,4,2,4,3,2,4,1,1,1,2,4,
];

/// Conditional opcodes and their cycle count when taken.
const TAKEN_CYCLES: [(u8, usize); 16] = [
    (0x20, 3), (0x28, 3), (0x30, 3), (0x38, 3),
    (0xC0, 5), (0xC8, 5), (0xD0, 5), (0xD8, 5),
    (0xC2, 4), (0xCA, 4), (0xD2, 4), (0xDA, 4),
    (0xC4, 6), (0xCC, 6), (0xD4, 6), (0xDC, 6),
];

fn cycles_for(opcode: u8, flags: Flags) -> usize {
    let mut bus = TestBus::with_program(&[opcode]);
    let mut cpu = Cpu::new();
    cpu.regs.f = flags;
    let cycles = run_instruction(&mut cpu, &mut bus);
    assert!(
        cpu.scratch.is_empty(),
        "{opcode:02X} left {} scratch bytes",
        cpu.scratch.len()
    );
    cycles
}

/// Flags that make the condition encoded in `opcode` hold.
fn flags_taking(opcode: u8) -> Flags {
    match (opcode >> 3) & 3 {
        0 => Flags::empty(),
        1 => Flags::Z,
        2 => Flags::empty(),
        _ => Flags::C,
    }
}

fn flags_skipping(opcode: u8) -> Flags {
    match (opcode >> 3) & 3 {
        0 => Flags::Z,
        1 => Flags::empty(),
        2 => Flags::C,
        _ => Flags::empty(),
    }
}

#[test]
fn base_opcodes_take_published_cycle_counts() {
    for opcode in 0..=255u8 {
        let conditional = TAKEN_CYCLES.iter().find(|(op, _)| *op == opcode);
        let flags = match conditional {
            Some(_) => flags_skipping(opcode),
            None => Flags::empty(),
        };
        assert_eq!(
            cycles_for(opcode, flags),
            BASE_CYCLES[opcode as usize],
            "{opcode:02X} {}",
            mnemonic(opcode)
        );
    }
}

#[test]
fn conditional_opcodes_take_extra_cycles_when_taken() {
    for (opcode, taken) in TAKEN_CYCLES {
        assert_eq!(
            cycles_for(opcode, flags_taking(opcode)),
            taken,
            "{opcode:02X} {}",
            mnemonic(opcode)
        );
    }
}

#[test]
fn cb_opcodes_take_published_cycle_counts() {
    for opcode in 0..=255u8 {
        let mut bus = TestBus::with_program(&[0xCB, opcode]);
        let mut cpu = Cpu::new();
        let expected = match (opcode & 7, opcode >> 6) {
            (6, 1) => 3,
            (6, _) => 4,
            _ => 2,
        };
        assert_eq!(
            run_instruction(&mut cpu, &mut bus),
            expected,
            "CB {opcode:02X} {}",
            cb_mnemonic(opcode)
        );
        assert_eq!(cpu.regs.pc, 0x0102);
        assert!(cpu.scratch.is_empty());
    }
}

#[test]
fn jp_nz_timing_depends_on_zero_flag() {
    let mut bus = TestBus::with_program(&[0xC2, 0x00, 0x20]);
    let mut cpu = Cpu::new();
    cpu.regs.f = Flags::Z;
    assert_eq!(run_instruction(&mut cpu, &mut bus), 3);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert!(cpu.scratch.is_empty());

    let mut bus = TestBus::with_program(&[0xC2, 0x00, 0x20]);
    let mut cpu = Cpu::new();
    cpu.regs.f = Flags::empty();
    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert_eq!(cpu.regs.pc, 0x2000);
}

#[test]
fn memory_write_lands_on_its_own_cycle() {
    // LD (nn),A: fetch, lo, hi, write.
    let mut bus = TestBus::with_program(&[0xEA, 0x00, 0xC0]);
    let mut cpu = Cpu::new();
    cpu.regs.a = 0x5A;
    for _ in 0..3 {
        cpu.step(&mut bus);
        assert!(bus.writes.is_empty());
    }
    cpu.step(&mut bus);
    assert_eq!(bus.writes, vec![(0xC000, 0x5A)]);
    assert!(cpu.at_instruction_boundary());
}

#[test]
fn push_writes_high_byte_first_and_pop_restores() {
    // PUSH BC; POP DE
    let mut bus = TestBus::with_program(&[0xC5, 0xD1]);
    let mut cpu = Cpu::new();
    cpu.regs.set_bc(0x1234);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert_eq!(bus.writes, vec![(0xFFFD, 0x12), (0xFFFC, 0x34)]);
    assert_eq!(cpu.regs.sp, 0xFFFC);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 3);
    assert_eq!(cpu.regs.de(), 0x1234);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn pop_af_masks_low_flag_bits() {
    let mut bus = TestBus::with_program(&[0xF1]);
    bus.memory[0xFFFC] = 0xFF;
    bus.memory[0xFFFD] = 0x42;
    let mut cpu = Cpu::new();
    cpu.regs.sp = 0xFFFC;
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(cpu.regs.f.bits(), 0xF0);
}

#[test]
fn ld_nn_sp_stores_little_endian() {
    let mut bus = TestBus::with_program(&[0x08, 0x00, 0xC0]);
    let mut cpu = Cpu::new();
    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(bus.writes, vec![(0xC000, 0xFE), (0xC001, 0xFF)]);
}

#[test]
fn call_and_ret_round_trip() {
    // CALL 0x0200 ; at 0x0200: RET
    let mut bus = TestBus::with_program(&[0xCD, 0x00, 0x02]);
    bus.memory[0x0200] = 0xC9;
    let mut cpu = Cpu::new();
    assert_eq!(run_instruction(&mut cpu, &mut bus), 6);
    assert_eq!(cpu.regs.pc, 0x0200);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(bus.memory[0xFFFD], 0x01);
    assert_eq!(bus.memory[0xFFFC], 0x03);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn jr_backwards_wraps_signed_offset() {
    let mut bus = TestBus::with_program(&[0x00, 0x18, 0xFD]);
    let mut cpu = Cpu::new();
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 3);
    assert_eq!(cpu.regs.pc, 0x0100);
}

#[test]
fn vblank_dispatch_takes_five_cycles() {
    let mut bus = TestBus::with_program(&[0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;

    for _ in 0..4 {
        cpu.step(&mut bus);
        assert!(!cpu.at_instruction_boundary());
    }
    cpu.step(&mut bus);
    assert!(cpu.at_instruction_boundary());

    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!cpu.ime);
    assert_eq!(bus.memory[IF_ADDR as usize] & 0x1F, 0);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(bus.memory[0xFFFD], 0x01);
    assert_eq!(bus.memory[0xFFFC], 0x00);
}

#[test]
fn highest_priority_interrupt_wins() {
    let mut bus = TestBus::with_program(&[0x00]);
    bus.memory[IE_ADDR as usize] = 0x1F;
    bus.memory[IF_ADDR as usize] = (Interrupt::TIMER | Interrupt::JOYPAD).bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(bus.memory[IF_ADDR as usize], Interrupt::JOYPAD.bits());
}

#[test]
fn interrupt_needs_both_ie_and_if() {
    let mut bus = TestBus::with_program(&[0x00, 0x00]);
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IE_ADDR as usize] = Interrupt::TIMER.bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0101);
}

#[test]
fn request_interrupt_is_seen_at_next_boundary() {
    let mut bus = TestBus::with_program(&[0x00, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::SERIAL.bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.pc, 0x0101);

    bus.request_interrupt(Interrupt::SERIAL);
    assert_eq!(bus.memory[IF_ADDR as usize], Interrupt::SERIAL.bits());
    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0058);
}

#[test]
fn ei_enables_after_following_instruction() {
    // EI; NOP; NOP
    let mut bus = TestBus::with_program(&[0xFB, 0x00, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();

    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert!(!cpu.ime);
    // The instruction after EI still runs uninterrupted.
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0102);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(bus.memory[0xFFFD], 0x01);
    assert_eq!(bus.memory[0xFFFC], 0x02);
}

#[test]
fn request_raised_right_after_ei_waits_for_that_instruction() {
    // EI; LDH (0F),A with A=1; NOP
    let mut bus = TestBus::with_program(&[0xFB, 0xE0, 0x0F, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();
    cpu.regs.a = Interrupt::VBLANK.bits();

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 3);
    assert_eq!(cpu.regs.pc, 0x0103);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(bus.memory[0xFFFC], 0x03);
    assert_eq!(bus.memory[0xFFFD], 0x01);
}

#[test]
fn ei_with_ime_set_does_not_reenable_after_dispatch() {
    // EI; NOP with IME already on, handler at 0x0040 is NOP.
    let mut bus = TestBus::with_program(&[0xFB, 0x00]);
    bus.memory[IE_ADDR as usize] = (Interrupt::VBLANK | Interrupt::TIMER).bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;

    run_instruction(&mut cpu, &mut bus);
    bus.memory[IF_ADDR as usize] = (Interrupt::VBLANK | Interrupt::TIMER).bits();

    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!cpu.ime);

    // The handler runs; TIMER stays queued instead of nesting.
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0041);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0042);
    assert!(!cpu.ime);
    assert_eq!(bus.memory[IF_ADDR as usize], Interrupt::TIMER.bits());
}

#[test]
fn dispatch_cancels_scheduled_ei() {
    // EI arms the enable, then the dispatch must drop it.
    let mut bus = TestBus::with_program(&[0xFB, 0x00]);
    bus.memory[IE_ADDR as usize] = (Interrupt::VBLANK | Interrupt::TIMER).bits();
    let mut cpu = Cpu::new();

    run_instruction(&mut cpu, &mut bus);
    cpu.ime = true;
    bus.memory[IF_ADDR as usize] = (Interrupt::VBLANK | Interrupt::TIMER).bits();

    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    for _ in 0..3 {
        assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
        assert!(!cpu.ime);
    }
    assert_eq!(cpu.regs.pc, 0x0043);
}

#[test]
fn not_taken_branches_drain_operands() {
    // JR NZ,e; JP NZ,nn; CALL NZ,nn with Z set.
    let mut bus = TestBus::with_program(&[0x20, 0x05, 0xC2, 0x00, 0x20, 0xC4, 0x00, 0x20]);
    let mut cpu = Cpu::new();
    cpu.regs.f = Flags::Z;
    for (cycles, pc) in [(2, 0x0102), (3, 0x0105), (3, 0x0108)] {
        assert_eq!(run_instruction(&mut cpu, &mut bus), cycles);
        assert_eq!(cpu.regs.pc, pc);
        assert!(cpu.scratch.is_empty());
    }
}

#[test]
fn di_cancels_pending_ei() {
    // EI; DI; NOP
    let mut bus = TestBus::with_program(&[0xFB, 0xF3, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();

    for _ in 0..3 {
        assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    }
    assert_eq!(cpu.regs.pc, 0x0103);
    assert!(!cpu.ime);
}

#[test]
fn reti_enables_ime_immediately() {
    let mut bus = TestBus::with_program(&[0xD9]);
    bus.memory[0xFFFC] = 0x00;
    bus.memory[0xFFFD] = 0x02;
    let mut cpu = Cpu::new();
    cpu.regs.sp = 0xFFFC;
    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert!(cpu.ime);
    assert_eq!(cpu.regs.pc, 0x0200);
}

#[test]
fn halt_waits_for_interrupt_without_ime() {
    let mut bus = TestBus::with_program(&[0x76, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::TIMER.bits();
    let mut cpu = Cpu::new();

    run_instruction(&mut cpu, &mut bus);
    assert!(cpu.is_halted());
    for _ in 0..10 {
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc, 0x0101);
    }

    bus.request_interrupt(Interrupt::TIMER);
    // Wake-up cycle: no fetch yet.
    cpu.step(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0101);

    // IME clear: execution resumes after HALT without dispatch.
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0102);
    assert_eq!(bus.memory[IF_ADDR as usize], Interrupt::TIMER.bits());
}

#[test]
fn halt_with_ime_dispatches_to_handler() {
    let mut bus = TestBus::with_program(&[0x76, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();
    cpu.ime = true;

    run_instruction(&mut cpu, &mut bus);
    assert!(cpu.is_halted());
    cpu.step(&mut bus);

    bus.request_interrupt(Interrupt::VBLANK);
    cpu.step(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(bus.memory[0xFFFC], 0x01);
    assert_eq!(bus.memory[0xFFFD], 0x01);
}

#[test]
fn halt_bug_reads_next_byte_twice() {
    // HALT; LD A,n; INC D -- with the bug the 0x3E is both opcode and operand.
    let mut bus = TestBus::with_program(&[0x76, 0x3E, 0x14]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();
    cpu.regs.d = 0;
    let trace = record_trace(&mut cpu);

    run_instruction(&mut cpu, &mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0101);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 2);
    assert_eq!(cpu.regs.a, 0x3E);
    assert_eq!(cpu.regs.pc, 0x0102);

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.d, 1);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert_eq!(*trace.borrow(), vec!["HALT", "LD A,n", "INC D"]);
}

#[test]
fn ei_halt_with_pending_interrupt_returns_to_halt() {
    let mut bus = TestBus::with_program(&[0xFB, 0x76, 0x00]);
    bus.memory[IE_ADDR as usize] = Interrupt::VBLANK.bits();
    bus.memory[IF_ADDR as usize] = Interrupt::VBLANK.bits();
    let mut cpu = Cpu::new();

    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert!(!cpu.is_halted());

    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    // Return address is the HALT opcode itself.
    assert_eq!(bus.memory[0xFFFC], 0x01);
    assert_eq!(bus.memory[0xFFFD], 0x01);
}

// LD A,1; LDH (4D),A; STOP; LDH A,(4D)
const SPEED_SWITCH: [u8; 7] = [0x3E, 0x01, 0xE0, 0x4D, 0x10, 0xF0, 0x4D];

#[test]
fn stop_switches_speed_on_cgb() {
    let mut bus = TestBus::with_program(&SPEED_SWITCH);
    let mut cpu = Cpu::with_config(CpuConfig::builder().model(Model::Cgb).build());
    assert!(!cpu.double_speed());

    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.key1().map(|key1| key1.prepare_switch), Some(true));
    assert_eq!(bus.memory[KEY1_ADDR as usize], 0, "KEY1 must not reach the bus");

    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert!(cpu.double_speed());

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0xFE);
}

#[test]
fn stop_is_a_nop_on_dmg() {
    let mut bus = TestBus::with_program(&SPEED_SWITCH);
    let mut cpu = Cpu::new();
    assert!(cpu.key1().is_none());

    for _ in 0..4 {
        run_instruction(&mut cpu, &mut bus);
    }
    assert!(!cpu.double_speed());
    assert_eq!(bus.memory[KEY1_ADDR as usize], 0x01);
    assert_eq!(cpu.regs.a, 0x01);
    assert_eq!(cpu.regs.pc, 0x0107);
}

#[test]
fn illegal_opcode_acts_as_nop() {
    let mut bus = TestBus::with_program(&[0xD3, 0x00]);
    let mut cpu = Cpu::new();
    let before = cpu.registers();
    assert_eq!(run_instruction(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x0101);
    assert_eq!(cpu.regs.af(), before.af());
}

#[test]
fn trace_reports_prefix_and_cb_mnemonic() {
    // LD B,B; SWAP A
    let mut bus = TestBus::with_program(&[0x40, 0xCB, 0x37]);
    let mut cpu = Cpu::new();
    let trace = record_trace(&mut cpu);
    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(*trace.borrow(), vec!["LD B,B", "PREFIX CB", "SWAP A"]);
    assert_eq!(cpu.regs.a, 0x10);
}

#[test]
fn boot_state_matches_model() {
    let dmg = Cpu::new().registers();
    assert_eq!(
        (dmg.af(), dmg.bc(), dmg.de(), dmg.hl(), dmg.sp, dmg.pc),
        (0x01B0, 0x0013, 0x00D8, 0x014D, 0xFFFE, 0x0100)
    );

    let cgb = Cpu::with_config(CpuConfig::builder().model(Model::Cgb).build()).registers();
    assert_eq!(
        (cgb.af(), cgb.bc(), cgb.de(), cgb.hl(), cgb.sp, cgb.pc),
        (0x1180, 0x0000, 0xFF56, 0x000D, 0xFFFE, 0x0100)
    );

    let cold = Cpu::with_config(CpuConfig::builder().skip_boot(false).build()).registers();
    assert_eq!(cold, Registers::default());
}

#[test]
fn reset_returns_to_boundary() {
    let mut bus = TestBus::with_program(&[0xC3, 0x00, 0x02]);
    let mut cpu = Cpu::new();
    cpu.step(&mut bus);
    assert!(!cpu.at_instruction_boundary());

    cpu.reset(true);
    assert!(cpu.at_instruction_boundary());
    assert_eq!(cpu.cycles(), 0);
    assert_eq!(cpu.regs.pc, 0x0100);
}

/// Stores the Fibonacci sequence at 0xC000 through a subroutine, then loads
/// terms 4..=9 into B C D E H L and signals completion with `LD B,B`.
#[rustfmt::skip]
const FIBONACCI: &[u8] = &[
    0x21, 0x00, 0xC0, // 0100 LD HL,C000
    0x3E, 0x01,       // 0103 LD A,1
    0x22,             // 0105 LD (HL+),A
    0x22,             // 0106 LD (HL+),A
    0x0E, 0x07,       // 0107 LD C,7
    0xCD, 0x20, 0x01, // 0109 CALL 0120
    0x0D,             // 010C DEC C
    0x20, 0xFA,       // 010D JR NZ,0109
    0x21, 0x03, 0xC0, // 010F LD HL,C003
    0x46, 0x23,       // 0112 LD B,(HL); INC HL
    0x4E, 0x23,       // 0114 LD C,(HL); INC HL
    0x56, 0x23,       // 0116 LD D,(HL); INC HL
    0x5E, 0x23,       // 0118 LD E,(HL); INC HL
    0x7E, 0x23,       // 011A LD A,(HL); INC HL
    0x6E,             // 011C LD L,(HL)
    0x67,             // 011D LD H,A
    0x40,             // 011E LD B,B
    0x00,             // 011F
    0x2B,             // 0120 DEC HL
    0x7E,             // 0121 LD A,(HL)
    0x2B,             // 0122 DEC HL
    0x86,             // 0123 ADD A,(HL)
    0x23, 0x23,       // 0124 INC HL; INC HL
    0x22,             // 0126 LD (HL+),A
    0xC9,             // 0127 RET
];

#[test]
fn fibonacci_program_reaches_pass_pattern() {
    let mut bus = TestBus::with_program(FIBONACCI);
    let mut cpu = Cpu::new();
    let trace = record_trace(&mut cpu);

    let mut guard = 0;
    while !trace.borrow().contains(&"LD B,B") {
        cpu.step(&mut bus);
        guard += 1;
        assert!(guard < 10_000, "program did not finish");
    }
    assert!(cpu.at_instruction_boundary());

    let regs = cpu.registers();
    assert_eq!(
        (regs.b, regs.c, regs.d, regs.e, regs.h, regs.l),
        (3, 5, 8, 13, 21, 34)
    );
    assert_eq!(&bus.memory[0xC000..0xC009], &[1, 1, 2, 3, 5, 8, 13, 21, 34]);
    assert_eq!(cpu.regs.sp, 0xFFFE);
    assert_eq!(cpu.cycles(), guard);
}
