//! Sparse simulator memory.
//!
//! The address space is a list of [`Section`]s sorted by base address and
//! pairwise disjoint. An access walks across as many adjacent sections as it
//! needs and stops at the first byte that is unmapped, belongs to a section of
//! the wrong access class, or is read-only for a store. The number of bytes
//! actually transferred is returned; callers treat a short count as a fault.
//!
//! The top address bit selects the uncached alias of the lower half of the
//! address space. It is stripped before lookup and turns the access into a
//! [`AvmFlags::NOCACHE`] access.

mod flags;

use std::fmt::Write;

pub use flags::AvmFlags;

use nios2_common::{constants::UNCACHED_ADDRESS_BIT, error::MemoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    ForceWrite,
}

/// A contiguous, owned memory region `[base, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    base: u32,
    end: u32,
    flags: AvmFlags,
    data: Vec<u8>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn flags(&self) -> AvmFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        (self.end - self.base) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.base
    }

    pub fn contains(&self, address: u32) -> bool {
        self.base <= address && address < self.end
    }

    fn word_at(&self, offset: usize) -> u32 {
        let mut bytes = [0xFF; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if let Some(b) = self.data.get(offset + i) {
                *byte = *b;
            }
        }
        u32::from_le_bytes(bytes)
    }
}

#[derive(Debug, Default, Clone)]
pub struct AddressSpace {
    sections: Vec<Section>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Map `length` bytes at `base`.
    ///
    /// The section's storage is rounded up to whole words and filled with
    /// `0xFF` before `initial` is copied in. Insertion fails, leaving the
    /// address space unchanged, if the new range touches any mapped byte.
    pub fn add_memory(
        &mut self,
        name: &str,
        base: u32,
        flags: AvmFlags,
        initial: Option<&[u8]>,
        length: u32,
    ) -> Result<&Section, MemoryError> {
        if length == 0 {
            return Err(MemoryError::EmptySection(base));
        }
        let end = base
            .checked_add(length)
            .ok_or(MemoryError::AddressCalculationOverflow)?;

        let index = self.sections.partition_point(|s| s.base <= base);
        let overlaps_prev = index > 0 && self.sections[index - 1].end > base;
        let overlaps_next = self.sections.get(index).is_some_and(|s| s.base < end);
        if overlaps_prev || overlaps_next {
            return Err(MemoryError::SectionOverlap(base, end));
        }

        let mut data = vec![0xFF; (length as usize).next_multiple_of(4)];
        if let Some(initial) = initial {
            let n = initial.len().min(length as usize);
            data[..n].copy_from_slice(&initial[..n]);
        }

        self.sections.insert(
            index,
            Section {
                name: name.to_string(),
                base,
                end,
                flags,
                data,
            },
        );
        Ok(&self.sections[index])
    }

    /// Drop every section.
    pub fn clear_sections(&mut self) {
        self.sections.clear();
    }

    /// Index of the section holding `address`.
    fn find_section(&self, address: u32) -> Option<usize> {
        let index = self.sections.partition_point(|s| s.base <= address);
        (index > 0 && self.sections[index - 1].end > address).then(|| index - 1)
    }

    pub fn section_at(&self, address: u32) -> Option<&Section> {
        self.find_section(address).map(|index| &self.sections[index])
    }

    /// Highest end address over the sections reachable with `flags`.
    pub fn end_address(&self, flags: AvmFlags) -> u32 {
        self.sections
            .iter()
            .filter(|s| s.flags.intersects(flags & AvmFlags::MASTER_MASK))
            .map(|s| s.end)
            .max()
            .unwrap_or(0)
    }

    /// Section and offset serving the first byte of an access at `address`.
    fn locate(&self, address: u32, flags: AvmFlags, access: Access) -> Option<(usize, usize)> {
        if flags.contains(AvmFlags::INSTRUCTION) && address % 4 != 0 {
            return None;
        }
        let index = self.find_section(address)?;
        let section = &self.sections[index];
        if !section.flags.intersects(flags & AvmFlags::MASTER_MASK) {
            return None;
        }
        if access == Access::Write && section.flags.contains(AvmFlags::READONLY) {
            return None;
        }
        Some((index, (address - section.base) as usize))
    }

    fn strip_uncached(address: u32, flags: AvmFlags) -> (u32, AvmFlags) {
        if address & UNCACHED_ADDRESS_BIT != 0 {
            (address & !UNCACHED_ADDRESS_BIT, flags | AvmFlags::NOCACHE)
        } else {
            (address, flags)
        }
    }

    /// Copy memory at `address` into `buf`, returning the number of bytes read.
    pub fn read(&self, address: u32, buf: &mut [u8], flags: AvmFlags) -> usize {
        let (mut address, flags) = Self::strip_uncached(address, flags);
        let mut done = 0;
        while done < buf.len() {
            let Some((index, offset)) = self.locate(address, flags, Access::Read) else {
                break;
            };
            let section = &self.sections[index];
            let n = (section.len() - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&section.data[offset..offset + n]);
            done += n;
            address = address.wrapping_add(n as u32);
        }
        done
    }

    fn transfer_in(&mut self, address: u32, buf: &[u8], flags: AvmFlags, access: Access) -> usize {
        let (mut address, flags) = Self::strip_uncached(address, flags);
        let mut done = 0;
        while done < buf.len() {
            let Some((index, offset)) = self.locate(address, flags, access) else {
                break;
            };
            let section = &mut self.sections[index];
            let n = (section.len() - offset).min(buf.len() - done);
            section.data[offset..offset + n].copy_from_slice(&buf[done..done + n]);
            done += n;
            address = address.wrapping_add(n as u32);
        }
        done
    }

    /// Copy `buf` to memory at `address`, returning the number of bytes written.
    pub fn write(&mut self, address: u32, buf: &[u8], flags: AvmFlags) -> usize {
        self.transfer_in(address, buf, flags, Access::Write)
    }

    /// Like [`write`](Self::write), but ignores [`AvmFlags::READONLY`].
    pub fn force_write(&mut self, address: u32, buf: &[u8], flags: AvmFlags) -> usize {
        self.transfer_in(address, buf, flags, Access::ForceWrite)
    }

    /// Read exactly `buf.len()` bytes.
    pub fn read_exact(&self, address: u32, buf: &mut [u8], flags: AvmFlags) -> Result<(), MemoryError> {
        let n = self.read(address, buf, flags);
        match n {
            0 => Err(MemoryError::InvalidMemoryAccess(address)),
            n if n < buf.len() => Err(MemoryError::ShortAccess(address, n, buf.len())),
            _ => Ok(()),
        }
    }

    /// Write exactly `buf.len()` bytes.
    pub fn write_exact(&mut self, address: u32, buf: &[u8], flags: AvmFlags) -> Result<(), MemoryError> {
        let n = self.write(address, buf, flags);
        match n {
            0 => Err(MemoryError::InvalidMemoryAccess(address)),
            n if n < buf.len() => Err(MemoryError::ShortAccess(address, n, buf.len())),
            _ => Ok(()),
        }
    }

    /// Read a little-endian word.
    pub fn read_u32(&self, address: u32, flags: AvmFlags) -> Result<u32, MemoryError> {
        let mut bytes = [0; 4];
        self.read_exact(address, &mut bytes, flags)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Textual listing of the sections, with a word dump when `verbose`.
    pub fn dump_sections(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "sections: {}", self.sections.len());
        for (i, section) in self.sections.iter().enumerate() {
            let _ = write!(
                out,
                "section[{i}]: {{range: 0x{:08x}-0x{:08x}, flags: 0x{:08x}, name: \"{}\" }}",
                section.base, section.end, section.flags, section.name
            );
            if verbose {
                for offset in (0..section.len()).step_by(4) {
                    if offset % 16 == 0 {
                        let _ = write!(out, "\n# {:08x}:", section.base as usize + offset);
                    }
                    let _ = write!(out, " {:08x}", section.word_at(offset));
                }
            }
            out.push('\n');
        }
        out
    }
}
