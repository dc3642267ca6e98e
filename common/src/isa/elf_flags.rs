//! Nios II specific ELF header values.

use super::ext_regs::ExtRegMap;

/// Architecture field of `e_flags`.
pub const EF_NIOS2_ARCH: u32 = 0x0000_000F;
pub const E_NIOS2_ARCH_1: u32 = 0x0000_0000;
pub const E_NIOS2_ARCH_DPX: u32 = 0x0000_0004;

/// Register-field width of the encoding.
pub const EF_NIOS2_ENCODE: u32 = 0x0000_0070;
pub const E_NIOS2_ENCODE_5B: u32 = 0x0000_0000;
pub const E_NIOS2_ENCODE_6B: u32 = 0x0000_0010;

/// DPX extension-register map configuration.
pub const EF_NIOS2_REGISTER_MAP: u32 = 0x0000_0F00;
pub const E_NIOS2_REG_MAP_SHIFT: u32 = 8;

/// Section flag marking gp-relative data.
pub const SHF_NIOS2_GPREL: u32 = 0x1000_0000;

/// Dynamic tag holding the address of `_gp`.
pub const DT_NIOS2_GP: u32 = 0x7000_0002;

/// `e_machine` value for Nios II.
pub const EM_ALTERA_NIOS2: u16 = 113;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Nios2,
    Dpx,
}

/// The fields of `e_flags` that select an encoding and register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfFlags(pub u32);

impl ElfFlags {
    /// `None` for architecture values this toolchain does not know.
    pub fn arch(&self) -> Option<Arch> {
        match self.0 & EF_NIOS2_ARCH {
            E_NIOS2_ARCH_1 => Some(Arch::Nios2),
            E_NIOS2_ARCH_DPX => Some(Arch::Dpx),
            _ => None,
        }
    }

    /// Width in bits of the register fields.
    pub fn register_field_width(&self) -> u32 {
        match self.0 & EF_NIOS2_ENCODE {
            E_NIOS2_ENCODE_6B => 6,
            _ => 5,
        }
    }

    pub fn register_map_config(&self) -> u32 {
        (self.0 & EF_NIOS2_REGISTER_MAP) >> E_NIOS2_REG_MAP_SHIFT
    }

    pub fn ext_reg_map(&self) -> Option<&'static ExtRegMap> {
        ExtRegMap::for_config(self.register_map_config())
    }

    pub fn with_register_map(config: u32) -> u32 {
        (config << E_NIOS2_REG_MAP_SHIFT) & EF_NIOS2_REGISTER_MAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = ElfFlags(E_NIOS2_ARCH_DPX | E_NIOS2_ENCODE_6B | ElfFlags::with_register_map(2));
        assert_eq!(flags.arch(), Some(Arch::Dpx));
        assert_eq!(flags.register_field_width(), 6);
        assert_eq!(flags.register_map_config(), 2);
        assert_eq!(flags.ext_reg_map().map(|m| m.rx_tx.len), Some(16));

        let base = ElfFlags(0);
        assert_eq!(base.arch(), Some(Arch::Nios2));
        assert_eq!(base.register_field_width(), 5);
        assert_eq!(ElfFlags(0x3).arch(), None);
    }
}
