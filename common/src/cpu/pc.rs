use crate::constants::INSTRUCTION_SIZE;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PC {
    pub value: u32,
}

impl PC {
    pub fn new(value: u32) -> Self {
        Self { value }
    }

    /// Address of the instruction following the current one.
    pub fn next(&self) -> u32 {
        self.value.wrapping_add(INSTRUCTION_SIZE)
    }

    // Increment PC by 4 bytes (standard instruction length)
    pub fn step(&mut self) {
        self.value = self.next();
    }

    // Branch: byte offset relative to the following instruction
    pub fn branch(&mut self, offset: u32) {
        self.value = self.next().wrapping_add(offset);
    }

    // Jump: absolute target
    pub fn jump(&mut self, target: u32) {
        self.value = target;
    }

    pub fn is_aligned(&self) -> bool {
        self.value % INSTRUCTION_SIZE == 0
    }
}

impl PartialEq<u32> for PC {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}
