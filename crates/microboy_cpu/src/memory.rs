use crate::cpu::Bus;

const SIZE: usize = 0x1_0000;

/// Flat 64 KiB RAM covering the whole address space.
///
/// No regions are decoded: ROM, IO registers and IE are all plain bytes.
/// Good enough for CPU tests and for ROMs that fit in 32 KiB without a
/// mapper.
#[derive(Clone)]
pub struct FlatBus {
    memory: Box<[u8; SIZE]>,
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; SIZE]),
        }
    }

    /// Copy `bytes` into memory starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the data would run past the end of the address space.
    pub fn load(&mut self, offset: u16, bytes: &[u8]) {
        let start = offset as usize;
        let end = start + bytes.len();
        assert!(
            end <= SIZE,
            "{} bytes at 0x{offset:04X} do not fit in the address space",
            bytes.len()
        );
        self.memory[start..end].copy_from_slice(bytes);
    }

    #[inline]
    pub fn peek(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    #[inline]
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }
}

impl Bus for FlatBus {
    #[inline]
    fn read8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    #[inline]
    fn write8(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }
}
