use std::fmt::Display;
use std::ops::Index;

use nios2_common::{
    cpu::Registers,
    isa::{Register, RegisterLayout},
};

/// General purpose and control registers of one register layout.
///
/// The `pc` slot of the layout is not stored here; reads of it return zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    layout: RegisterLayout,
    gprs: Vec<u32>,
    ctl: Vec<u32>,
}

impl RegisterFile {
    pub fn new(layout: RegisterLayout) -> Self {
        Self {
            layout,
            gprs: vec![0; layout.num_gprs],
            ctl: vec![0; layout.num_ctl],
        }
    }

    pub fn layout(&self) -> RegisterLayout {
        self.layout
    }

    pub fn clear(&mut self) {
        self.gprs.fill(0);
        self.ctl.fill(0);
    }

    /// Control register `n`; zero past the end of the bank.
    pub fn read_ctl(&self, n: usize) -> u32 {
        self.ctl.get(n).copied().unwrap_or(0)
    }

    /// Write control register `n`; ignored past the end of the bank.
    pub fn write_ctl(&mut self, n: usize, value: u32) {
        if let Some(slot) = self.ctl.get_mut(n) {
            *slot = value;
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(RegisterLayout::NIOS2)
    }
}

impl Registers for RegisterFile {
    fn read(&self, reg: Register) -> u32 {
        self[reg]
    }

    fn write(&mut self, reg: Register, value: u32) {
        if reg == Register::ZERO {
            return; // r0 is hardwired to zero
        }
        if self.layout.is_gpr(reg) {
            self.gprs[reg.index()] = value;
        } else if let Some(n) = self.layout.control_index(reg) {
            self.ctl[n] = value;
        }
    }
}

impl Index<Register> for RegisterFile {
    type Output = u32;

    fn index(&self, reg: Register) -> &Self::Output {
        if self.layout.is_gpr(reg) {
            &self.gprs[reg.index()]
        } else if let Some(n) = self.layout.control_index(reg) {
            &self.ctl[n]
        } else {
            &0
        }
    }
}

impl Display for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const COLUMNS: usize = 4;
        let rule = "+--------+------------".repeat(COLUMNS) + "+";
        let name = |reg: Register| self.layout.name(reg).unwrap_or_default();

        writeln!(f, "{rule}")?;
        let rows = self.gprs.len().div_ceil(COLUMNS);
        for row in 0..rows {
            for column in 0..COLUMNS {
                let n = column * rows + row;
                match self.gprs.get(n) {
                    Some(value) => {
                        let reg = Register::new(n as u8);
                        write!(f, "| {:<6} | {:#010x} ", name(reg), value)?;
                    }
                    None => write!(f, "| {:<6} | {:<10} ", "", "")?,
                }
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "{rule}")?;

        // Only control registers with a name or a non-zero value.
        let mut shown = 0;
        for (n, value) in self.ctl.iter().enumerate() {
            let reg = self.layout.ctl(n);
            let reg_name = name(reg);
            if *value == 0 && reg_name.starts_with("ctl") {
                continue;
            }
            write!(f, "| {:<9} | {:#010x} ", reg_name, value)?;
            shown += 1;
            if shown % 3 == 0 {
                writeln!(f, "|")?;
            }
        }
        if shown % 3 != 0 {
            writeln!(f, "|")?;
        }
        Ok(())
    }
}
