use typed_builder::TypedBuilder;

use super::table::PROGRAM;
use super::{Cpu, Flags, Key1, Registers, ScratchStack};

/// Hardware variant the CPU is wired into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Model {
    #[default]
    Dmg,
    /// Colour model: adds the KEY1 speed switch.
    Cgb,
}

#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct CpuConfig {
    #[builder(default)]
    pub model: Model,
    /// Start in the state the boot ROM leaves behind (PC=0x0100) instead of
    /// the all-zero power-on state.
    #[builder(default = true)]
    pub skip_boot: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            ime: false,
            ime_enable_pending: false,
            ime_enable_delay: false,
            halted: false,
            halt_bug: false,
            model: config.model,
            key1: None,
            scratch: ScratchStack::new(),
            cursor: None,
            program: &PROGRAM,
            instr_pc: 0,
            cycles: 0,
            trace: None,
        };
        cpu.reset(config.skip_boot);
        cpu
    }

    /// Reset the CPU. The model and trace hook are kept.
    pub fn reset(&mut self, skip_boot: bool) {
        self.regs = Registers::default();
        self.ime = false;
        self.ime_enable_pending = false;
        self.ime_enable_delay = false;
        self.halted = false;
        self.halt_bug = false;
        self.key1 = match self.model {
            Model::Dmg => None,
            Model::Cgb => Some(Key1::default()),
        };
        self.scratch.clear();
        self.cursor = None;
        self.instr_pc = 0;
        self.cycles = 0;
        if skip_boot {
            self.apply_boot_state();
        }
    }

    /// Initialize registers to match the boot ROM's state after it hands
    /// control to cartridge code (values per Pan Docs).
    fn apply_boot_state(&mut self) {
        let regs = &mut self.regs;
        match self.model {
            Model::Dmg => {
                regs.a = 0x01;
                regs.f = Flags::Z | Flags::H | Flags::C;
                regs.set_bc(0x0013);
                regs.set_de(0x00D8);
                regs.set_hl(0x014D);
            }
            Model::Cgb => {
                regs.a = 0x11;
                regs.f = Flags::Z;
                regs.set_bc(0x0000);
                regs.set_de(0xFF56);
                regs.set_hl(0x000D);
            }
        }
        regs.sp = 0xFFFE;
        regs.pc = 0x0100;

        // IME is clear when control reaches 0x0100.
        self.ime = false;
    }
}
