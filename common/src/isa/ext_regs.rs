//! DPX extension-register banks.
//!
//! Registers r32..r63 may be addressed through three alias banks: receive and
//! transmit FIFOs (`rxN` when read, `txN` when written), coprocessor registers
//! (`crN`), and coprocessor in/out ports (`criN`/`croN`). The ELF header
//! selects one of the built-in bank layouts.

use std::borrow::Cow;

use super::Register;

/// A contiguous run of `len` registers starting at register `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bank {
    pub offset: u8,
    pub len: u8,
}

impl Bank {
    const fn new(offset: u8, len: u8) -> Self {
        Self { offset, len }
    }

    fn index_of(&self, reg: Register) -> Option<u8> {
        let n = reg.number().checked_sub(self.offset)?;
        (n < self.len).then_some(n)
    }

    fn register(&self, n: u8) -> Option<Register> {
        (n < self.len).then(|| Register::new(self.offset + n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtRegMap {
    pub rx_tx: Bank,
    pub cr: Bank,
    pub cri_cro: Bank,
}

const fn map(rx_tx: (u8, u8), cr: (u8, u8), cri_cro: (u8, u8)) -> ExtRegMap {
    ExtRegMap {
        rx_tx: Bank::new(rx_tx.0, rx_tx.1),
        cr: Bank::new(cr.0, cr.1),
        cri_cro: Bank::new(cri_cro.0, cri_cro.1),
    }
}

/// Built-in layouts, indexed by the ELF register-map configuration.
pub const EXT_REG_MAPS: [ExtRegMap; 17] = [
    map((32, 8), (40, 16), (56, 8)),
    map((32, 8), (40, 8), (48, 16)),
    map((32, 16), (48, 8), (56, 8)),
    map((32, 16), (48, 16), (56, 0)),
    map((32, 16), (48, 0), (48, 16)),
    map((32, 32), (64, 0), (64, 0)),
    map((32, 8), (40, 0), (40, 0)),
    map((32, 8), (40, 0), (40, 8)),
    map((32, 8), (40, 0), (48, 16)),
    map((32, 8), (40, 8), (48, 0)),
    map((32, 8), (40, 8), (48, 8)),
    map((32, 8), (48, 16), (64, 0)),
    map((32, 16), (48, 0), (48, 0)),
    map((32, 16), (48, 0), (48, 8)),
    map((32, 16), (48, 8), (56, 0)),
    // 15 and 16 repeat 0 and 1 for older toolchains.
    map((32, 8), (40, 16), (56, 8)),
    map((32, 8), (40, 8), (48, 16)),
];

impl ExtRegMap {
    /// Layout for a register-map configuration number.
    pub fn for_config(config: u32) -> Option<&'static ExtRegMap> {
        EXT_REG_MAPS.get(config as usize)
    }

    /// Resolve an alias such as `rx3` or `cro0` to its general purpose register.
    pub fn resolve(&self, alias: &str) -> Option<Register> {
        // `cri`/`cro` must be tried before `cr`.
        if let Some(n) = number_after(alias, "cri").or_else(|| number_after(alias, "cro")) {
            return self.cri_cro.register(n);
        }
        if let Some(n) = number_after(alias, "rx").or_else(|| number_after(alias, "tx")) {
            return self.rx_tx.register(n);
        }
        if let Some(n) = number_after(alias, "cr") {
            return self.cr.register(n);
        }
        None
    }

    /// The alias of `reg`, if it falls in a bank. `is_dest` selects the
    /// write-side name for the directional banks.
    pub fn alias(&self, reg: Register, is_dest: bool) -> Option<Cow<'static, str>> {
        if let Some(n) = self.rx_tx.index_of(reg) {
            let prefix = if is_dest { "tx" } else { "rx" };
            return Some(Cow::Owned(format!("{prefix}{n}")));
        }
        if let Some(n) = self.cr.index_of(reg) {
            return Some(Cow::Owned(format!("cr{n}")));
        }
        if let Some(n) = self.cri_cro.index_of(reg) {
            let prefix = if is_dest { "cro" } else { "cri" };
            return Some(Cow::Owned(format!("{prefix}{n}")));
        }
        None
    }
}

/// Parse `<prefix><decimal>`, rejecting trailing characters.
fn number_after(name: &str, prefix: &str) -> Option<u8> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map() {
        let map = ExtRegMap::for_config(0).unwrap();
        assert_eq!(map.resolve("rx0"), Some(Register::new(32)));
        assert_eq!(map.resolve("tx7"), Some(Register::new(39)));
        assert_eq!(map.resolve("rx8"), None);
        assert_eq!(map.resolve("cr15"), Some(Register::new(55)));
        assert_eq!(map.resolve("cri0"), Some(Register::new(56)));
        assert_eq!(map.resolve("cro7"), Some(Register::new(63)));
        assert_eq!(map.resolve("r40"), None);
        assert_eq!(map.resolve("cr"), None);
        assert_eq!(map.resolve("cr1x"), None);
    }

    #[test]
    fn test_alias() {
        let map = ExtRegMap::for_config(1).unwrap();
        assert_eq!(map.alias(Register::new(33), false).as_deref(), Some("rx1"));
        assert_eq!(map.alias(Register::new(33), true).as_deref(), Some("tx1"));
        assert_eq!(map.alias(Register::new(47), false).as_deref(), Some("cr7"));
        assert_eq!(map.alias(Register::new(48), true).as_deref(), Some("cro0"));
        assert_eq!(map.alias(Register::new(20), false), None);
    }

    #[test]
    fn test_empty_banks() {
        let map = ExtRegMap::for_config(5).unwrap();
        assert_eq!(map.resolve("rx31"), Some(Register::new(63)));
        assert_eq!(map.resolve("cr0"), None);
        assert_eq!(map.alias(Register::new(63), false).as_deref(), Some("rx31"));
        assert!(ExtRegMap::for_config(17).is_none());
    }

    #[test]
    fn test_every_alias_resolves_back() {
        for map in &EXT_REG_MAPS {
            for n in 32..64u8 {
                let reg = Register::new(n);
                for is_dest in [false, true] {
                    if let Some(alias) = map.alias(reg, is_dest) {
                        assert_eq!(map.resolve(&alias), Some(reg), "{alias}");
                    }
                }
            }
        }
    }
}
