/// Deepest the scratch stack ever gets: CALL keeps the target word under
/// the return address and the stack slot while the push is in flight.
const CAPACITY: usize = 16;

/// LIFO byte buffer that carries operands between the micro-steps of a
/// single instruction.
///
/// Words are stored as two bytes, low byte first, so `pop_word` yields the
/// high byte before the low byte. Underflow or overflow means a pipeline
/// template is wired wrong and panics immediately.
#[derive(Clone, Debug)]
pub struct ScratchStack {
    buf: [u8; CAPACITY],
    len: usize,
}

impl Default for ScratchStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchStack {
    pub const fn new() -> Self {
        Self {
            buf: [0; CAPACITY],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn push_byte(&mut self, value: u8) {
        if self.len == CAPACITY {
            panic!("scratch stack overflow: pipeline pushed more than {CAPACITY} bytes");
        }
        self.buf[self.len] = value;
        self.len += 1;
    }

    #[inline]
    pub fn pop_byte(&mut self) -> u8 {
        if self.len == 0 {
            panic!("scratch stack underflow: pipeline read a value it never wrote");
        }
        self.len -= 1;
        self.buf[self.len]
    }

    #[inline]
    pub fn push_word(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.push_byte(lo);
        self.push_byte(hi);
    }

    #[inline]
    pub fn pop_word(&mut self) -> u16 {
        let hi = self.pop_byte();
        let lo = self.pop_byte();
        u16::from_be_bytes([hi, lo])
    }
}
