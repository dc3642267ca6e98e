use bitflags::bitflags;

bitflags! {
    /// Access-class and attribute bits of a memory section or an access request.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AvmFlags: u32 {
        /// Reachable by instruction fetch.
        const INSTRUCTION = 1 << 12;
        /// Reachable by loads and stores.
        const DATA = 1 << 13;
        /// The access-class bits.
        const MASTER_MASK = Self::INSTRUCTION.bits() | Self::DATA.bits();
        /// Stores are refused.
        const READONLY = 1 << 16;
        /// The access bypasses the data cache.
        const NOCACHE = 1 << 17;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_algebra() {
        let text = AvmFlags::INSTRUCTION | AvmFlags::DATA | AvmFlags::READONLY;
        assert!(text.contains(AvmFlags::READONLY));
        assert!(text.intersects(AvmFlags::MASTER_MASK));
        assert_eq!(text & AvmFlags::MASTER_MASK, AvmFlags::MASTER_MASK);
        assert!(!AvmFlags::DATA.intersects(AvmFlags::INSTRUCTION));
        assert!((text & !AvmFlags::READONLY).contains(AvmFlags::DATA));
        assert!(AvmFlags::default().is_empty());
        assert_eq!(format!("{:08x}", text), "00013000");
    }
}
