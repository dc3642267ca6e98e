//! Register-file layouts for the base and DPX variants.
//!
//! Both variants place the general purpose registers first, then the program
//! counter, then the control registers. The base variant exposes 49 registers
//! (32 GPRs, `pc`, 16 control registers); DPX widens this to 129 (64 GPRs, `pc`,
//! 64 control registers).

use std::borrow::Cow;

use super::Register;

/// Indices of control registers, relative to the first control register.
pub mod ctl {
    pub const STATUS: usize = 0;
    pub const ESTATUS: usize = 1;
    pub const BSTATUS: usize = 2;
    pub const IENABLE: usize = 3;
    pub const IPENDING: usize = 4;
    pub const CPUID: usize = 5;
    pub const EXCEPTION: usize = 7;
    pub const BADADDR: usize = 12;
    pub const CONFIG: usize = 13;

    /// DPX only.
    pub const THREADNUM: usize = 16;
}

/// Bits of the `status` control register.
pub mod status {
    pub const PIE: u32 = 1 << 0;
    pub const U: u32 = 1 << 1;
    pub const EH: u32 = 1 << 2;
    pub const IH: u32 = 1 << 3;
    pub const IL_SHIFT: u32 = 4;
    pub const CRS_SHIFT: u32 = 10;
    pub const PRS_SHIFT: u32 = 16;
    pub const NMI: u32 = 1 << 22;
    pub const RSIE: u32 = 1 << 23;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLayout {
    pub num_gprs: usize,
    pub num_ctl: usize,
    named_ctl: &'static [(usize, &'static str)],
}

impl RegisterLayout {
    pub const NIOS2: RegisterLayout = RegisterLayout {
        num_gprs: 32,
        num_ctl: 16,
        named_ctl: &[
            (0, "status"),
            (1, "estatus"),
            (2, "bstatus"),
            (3, "ienable"),
            (4, "ipending"),
            (5, "cpuid"),
            (7, "exception"),
            (8, "pteaddr"),
            (9, "tlbacc"),
            (10, "tlbmisc"),
            (12, "badaddr"),
            (13, "config"),
            (14, "mpubase"),
            (15, "mpuacc"),
        ],
    };

    pub const DPX: RegisterLayout = RegisterLayout {
        num_gprs: 64,
        num_ctl: 64,
        named_ctl: &[(5, "cpuid"), (16, "threadnum")],
    };

    pub const fn num_regs(&self) -> usize {
        self.num_gprs + 1 + self.num_ctl
    }

    pub const fn pc(&self) -> Register {
        Register::new(self.num_gprs as u8)
    }

    pub const fn ctl_base(&self) -> usize {
        self.num_gprs + 1
    }

    /// Register-file index of control register `n`.
    pub const fn ctl(&self, n: usize) -> Register {
        Register::new((self.ctl_base() + n) as u8)
    }

    pub fn status(&self) -> Register {
        self.ctl(ctl::STATUS)
    }

    pub fn estatus(&self) -> Register {
        self.ctl(ctl::ESTATUS)
    }

    pub fn bstatus(&self) -> Register {
        self.ctl(ctl::BSTATUS)
    }

    pub fn is_gpr(&self, reg: Register) -> bool {
        reg.index() < self.num_gprs
    }

    /// Control register number of `reg`, if it is one.
    pub fn control_index(&self, reg: Register) -> Option<usize> {
        let index = reg.index();
        (index >= self.ctl_base() && index < self.num_regs()).then(|| index - self.ctl_base())
    }

    pub fn contains(&self, reg: Register) -> bool {
        reg.index() < self.num_regs()
    }

    /// Display name of `reg`; `None` past the end of the register file.
    pub fn name(&self, reg: Register) -> Option<Cow<'static, str>> {
        if self.is_gpr(reg) {
            return Some(match reg.abi_name() {
                Some(name) => Cow::Borrowed(name),
                None => Cow::Owned(format!("r{}", reg.number())),
            });
        }
        if reg == self.pc() {
            return Some(Cow::Borrowed("pc"));
        }
        let n = self.control_index(reg)?;
        Some(
            match self.named_ctl.iter().find(|(index, _)| *index == n) {
                Some((_, name)) => Cow::Borrowed(*name),
                None => Cow::Owned(format!("ctl{n}")),
            },
        )
    }

    /// Look a register up by its display name.
    pub fn by_name(&self, name: &str) -> Option<Register> {
        (0..self.num_regs())
            .map(|i| Register::new(i as u8))
            .find(|&reg| self.name(reg).is_some_and(|n| n == name))
    }

    /// Map a DWARF register number to a register-file index.
    ///
    /// The DWARF numbering is the register-file numbering for both variants.
    pub fn dwarf_to_register(&self, dwarf: u32) -> Option<Register> {
        ((dwarf as usize) < self.num_regs()).then(|| Register::new(dwarf as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_layout() {
        let layout = RegisterLayout::NIOS2;
        assert_eq!(layout.num_regs(), 49);
        assert_eq!(layout.pc(), Register::new(32));
        assert_eq!(layout.status(), Register::new(33));
        assert_eq!(layout.ctl(15), Register::new(48));
        assert_eq!(layout.name(Register::new(32)).as_deref(), Some("pc"));
        assert_eq!(layout.name(Register::new(35)).as_deref(), Some("bstatus"));
        assert_eq!(layout.name(Register::new(39)).as_deref(), Some("ctl6"));
        assert_eq!(layout.name(Register::new(48)).as_deref(), Some("mpuacc"));
        assert_eq!(layout.name(Register::new(49)), None);

        let names = [
            "status", "estatus", "bstatus", "ienable", "ipending", "cpuid", "ctl6", "exception",
            "pteaddr", "tlbacc", "tlbmisc", "ctl11", "badaddr", "config", "mpubase", "mpuacc",
        ];
        for (n, name) in names.iter().enumerate() {
            assert_eq!(layout.name(layout.ctl(n)).as_deref(), Some(*name), "ctl{n}");
        }
    }

    #[test]
    fn test_dpx_layout() {
        let layout = RegisterLayout::DPX;
        assert_eq!(layout.num_regs(), 129);
        assert_eq!(layout.pc(), Register::new(64));
        assert_eq!(layout.ctl(ctl::CPUID), Register::new(70));
        assert_eq!(layout.ctl(ctl::THREADNUM), Register::new(81));
        assert_eq!(layout.name(Register::new(63)).as_deref(), Some("r63"));
        assert_eq!(layout.name(Register::new(65)).as_deref(), Some("ctl0"));
        assert_eq!(layout.name(Register::new(81)).as_deref(), Some("threadnum"));
        assert_eq!(layout.name(Register::new(128)).as_deref(), Some("ctl63"));
        assert_eq!(layout.by_name("sp"), Some(Register::SP));
        assert_eq!(layout.by_name("threadnum"), Some(Register::new(81)));
    }

    #[test]
    fn test_dwarf_mapping() {
        assert_eq!(
            RegisterLayout::NIOS2.dwarf_to_register(27),
            Some(Register::SP)
        );
        assert_eq!(
            RegisterLayout::NIOS2.dwarf_to_register(32),
            Some(RegisterLayout::NIOS2.pc())
        );
        assert_eq!(RegisterLayout::NIOS2.dwarf_to_register(49), None);
        assert_eq!(
            RegisterLayout::DPX.dwarf_to_register(64),
            Some(RegisterLayout::DPX.pc())
        );
        assert_eq!(RegisterLayout::DPX.dwarf_to_register(129), None);
    }
}
