//! Header validation and extraction of loadable segments, sections and
//! function symbols from a Nios II ELF32 executable.

use elf::{
    abi,
    endian::LittleEndian,
    file::{Class, FileHeader},
    segment::ProgramHeader,
    ElfBytes,
};
use nios2_common::isa::elf_flags::EM_ALTERA_NIOS2;

use super::{
    error::{ElfError, Result},
    loader::{ElfSection, ElfSegment, ElfSymbol},
};

pub fn validate_elf_header(header: &FileHeader<LittleEndian>) -> Result<()> {
    if header.class != Class::ELF32 {
        return Err(ElfError::Not32Bit);
    }

    if header.e_machine != EM_ALTERA_NIOS2 {
        return Err(ElfError::NotNios2(header.e_machine));
    }

    if header.e_type != abi::ET_EXEC {
        return Err(ElfError::NotExecutable);
    }

    if header.e_phnum == 0 {
        return Err(ElfError::NoProgramHeader);
    }

    Ok(())
}

fn parse_segment(elf: &ElfBytes<LittleEndian>, segment: &ProgramHeader) -> Result<ElfSegment> {
    let vaddr: u32 = segment
        .p_vaddr
        .try_into()
        .map_err(|_| ElfError::InvalidVirtualAddress(segment.p_vaddr))?;

    let mem_size: u32 = segment
        .p_memsz
        .try_into()
        .map_err(|_| ElfError::InvalidMemorySize)?;

    if segment.p_filesz > segment.p_memsz {
        return Err(ElfError::SegmentSizeExceedsMemorySize);
    }

    let data = elf.segment_data(segment)?.to_vec();

    Ok(ElfSegment {
        vaddr,
        mem_size,
        writable: segment.p_flags & abi::PF_W != 0,
        executable: segment.p_flags & abi::PF_X != 0,
        data,
    })
}

pub fn parse_segments(elf: &ElfBytes<LittleEndian>) -> Result<Vec<ElfSegment>> {
    elf.segments()
        .ok_or(ElfError::NoSegmentAvailable)?
        .iter()
        .filter(|segment| segment.p_type == abi::PT_LOAD && segment.p_memsz > 0)
        .map(|segment| parse_segment(elf, &segment))
        .collect()
}

/// Allocated sections by name. Files without section headers have none.
pub fn parse_sections(elf: &ElfBytes<LittleEndian>) -> Result<Vec<ElfSection>> {
    let (headers, strtab) = elf.section_headers_with_strtab()?;
    let (Some(headers), Some(strtab)) = (headers, strtab) else {
        return Ok(Vec::new());
    };

    let sections = headers
        .iter()
        .filter(|header| header.sh_flags & abi::SHF_ALLOC as u64 != 0)
        .filter_map(|header| {
            let name = strtab.get(header.sh_name as usize).ok()?;
            Some(ElfSection {
                name: name.to_string(),
                addr: header.sh_addr as u32,
                size: header.sh_size as u32,
            })
        })
        .collect();
    Ok(sections)
}

/// Function symbols sorted by address. Files without a symbol table have none.
pub fn parse_symbols(elf: &ElfBytes<LittleEndian>) -> Result<Vec<ElfSymbol>> {
    let Some((symtab, strtab)) = elf.symbol_table()? else {
        return Ok(Vec::new());
    };

    let mut symbols: Vec<ElfSymbol> = symtab
        .iter()
        .filter(|sym| sym.st_symtype() == abi::STT_FUNC && !sym.is_undefined())
        .filter_map(|sym| {
            let name = strtab.get(sym.st_name as usize).ok()?;
            Some(ElfSymbol {
                name: name.to_string(),
                value: sym.st_value as u32,
                size: sym.st_size as u32,
            })
        })
        .collect();
    symbols.sort_by_key(|sym| sym.value);
    Ok(symbols)
}
