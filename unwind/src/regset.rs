//! Registers from a Linux core file `.reg` note.

use nios2_common::isa::{Register, RegisterLayout, NUM_BASE_GPRS};

use crate::target::RegisterSet;

/// Word index in the gregset of each general register, or `None` when the
/// kernel does not save it.
const GPR_SLOTS: [Option<usize>; NUM_BASE_GPRS] = [
    None,
    Some(8),
    Some(9),
    Some(10),
    Some(11),
    Some(12),
    Some(13),
    Some(14),
    Some(0),
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    Some(5),
    Some(6),
    Some(7),
    Some(23),
    Some(24),
    Some(25),
    Some(26),
    Some(27),
    Some(28),
    Some(29),
    Some(30),
    None,
    None,
    Some(19),
    Some(18),
    Some(17),
    Some(21),
    None,
    Some(16),
];

const PC_SLOT: usize = 21;
const ESTATUS_SLOT: usize = 20;

pub const GREGSET_WORDS: usize = 32;

fn slot(layout: RegisterLayout, reg: Register) -> Option<usize> {
    if reg == layout.pc() {
        Some(PC_SLOT)
    } else if reg == layout.estatus() {
        Some(ESTATUS_SLOT)
    } else {
        GPR_SLOTS.get(reg.index()).copied().flatten()
    }
}

/// Fill a register file from a little-endian gregset. Registers the
/// gregset does not hold, or that lie past its end, read as zero.
pub fn supply_gregset(layout: RegisterLayout, gregs: &[u8]) -> RegisterSet {
    let word = |slot: usize| {
        gregs
            .get(slot * 4..slot * 4 + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
    };

    let mut registers = RegisterSet::new(layout);
    for index in 0..layout.num_regs() {
        let reg = Register::new(index as u8);
        let value = slot(layout, reg).and_then(word).unwrap_or(0);
        registers.set(reg, Some(value));
    }
    registers
}

#[cfg(test)]
mod tests {
    use nios2_common::isa::{Dpx, Encoding, Nios2};

    use super::*;

    fn gregset() -> Vec<u8> {
        (0..GREGSET_WORDS as u32)
            .flat_map(|i| (0x100 + i).to_le_bytes())
            .collect()
    }

    #[test]
    fn test_supply_gregset() {
        let layout = Nios2::LAYOUT;
        let regs = supply_gregset(layout, &gregset());

        assert_eq!(regs.value(Register::ZERO), Some(0));
        assert_eq!(regs.value(Register::AT), Some(0x108));
        assert_eq!(regs.value(Register::R8), Some(0x100));
        assert_eq!(regs.value(Register::ET), Some(0));
        assert_eq!(regs.sp(), Ok(0x112));
        assert_eq!(regs.value(Register::RA), Some(0x110));
        assert_eq!(regs.pc(), Ok(0x115));
        assert_eq!(regs.value(layout.estatus()), Some(0x114));
        assert_eq!(regs.value(layout.status()), Some(0));
    }

    #[test]
    fn test_short_gregset_and_dpx_layout() {
        let layout = Dpx::LAYOUT;
        let regs = supply_gregset(layout, &gregset()[..16 * 4]);
        assert_eq!(regs.value(Register::R9), Some(0x101));
        // pc lives in word 21, past the end.
        assert_eq!(regs.pc(), Ok(0));
        assert_eq!(regs.value(Register::new(40)), Some(0));
    }
}
