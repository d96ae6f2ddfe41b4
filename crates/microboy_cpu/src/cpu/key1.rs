/// Address of the CGB speed-switch register.
pub const KEY1_ADDR: u16 = 0xFF4D;

/// CGB KEY1 register.
///
/// - bit 7: current speed (0 = normal, 1 = double), read only
/// - bit 0: prepare speed switch, read/write
/// - all other bits read as 1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Key1 {
    pub double_speed: bool,
    pub prepare_switch: bool,
}

impl Key1 {
    pub fn read(&self) -> u8 {
        let mut value = 0x7E;
        if self.double_speed {
            value |= 0x80;
        }
        if self.prepare_switch {
            value |= 0x01;
        }
        value
    }

    pub fn write(&mut self, value: u8) {
        self.prepare_switch = value & 0x01 != 0;
    }

    /// Toggle the CPU speed if a switch was prepared. Called by STOP.
    ///
    /// Returns `true` if a speed switch occurred.
    pub fn switch_speed(&mut self) -> bool {
        if !self.prepare_switch {
            return false;
        }
        self.double_speed = !self.double_speed;
        self.prepare_switch = false;
        true
    }
}
