//! A writer for minimal little-endian ELF32 Nios II executables.
//!
//! The output has one `PT_LOAD` program header per segment, a section header
//! per segment plus any extra (contentless) sections, and a symbol table with
//! the registered function symbols.

use std::io::Write;

use nios2_common::isa::elf_flags::EM_ALTERA_NIOS2;
use tempfile::NamedTempFile;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;
const SYM_SIZE: usize = 16;

const PT_LOAD: u32 = 1;
const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_NOBITS: u32 = 8;
const SHF_WRITE: u32 = 1;
const SHF_ALLOC: u32 = 2;
const SHF_EXECINSTR: u32 = 4;

const STB_GLOBAL: u8 = 1;
const STT_FUNC: u8 = 2;

struct Segment {
    name: String,
    vaddr: u32,
    data: Vec<u8>,
    mem_size: u32,
    writable: bool,
    executable: bool,
}

struct ExtraSection {
    name: String,
    addr: u32,
    size: u32,
}

struct Function {
    name: String,
    addr: u32,
    size: u32,
}

pub struct ElfBuilder {
    entry: u32,
    flags: u32,
    machine: u16,
    segments: Vec<Segment>,
    sections: Vec<ExtraSection>,
    functions: Vec<Function>,
}

/// Appends NUL-terminated names, returning their offsets.
struct StringTable(Vec<u8>);

impl StringTable {
    fn new() -> Self {
        Self(vec![0])
    }

    fn add(&mut self, name: &str) -> u32 {
        let offset = self.0.len() as u32;
        self.0.extend_from_slice(name.as_bytes());
        self.0.push(0);
        offset
    }
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn put16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[allow(clippy::too_many_arguments)]
fn section_header(
    out: &mut Vec<u8>,
    name: u32,
    kind: u32,
    flags: u32,
    addr: u32,
    offset: u32,
    size: u32,
    link: u32,
    info: u32,
    entsize: u32,
) {
    for value in [name, kind, flags, addr, offset, size, link, info, 4, entsize] {
        put32(out, value);
    }
}

impl ElfBuilder {
    pub fn new(entry: u32) -> Self {
        Self {
            entry,
            flags: 0,
            machine: EM_ALTERA_NIOS2,
            segments: Vec::new(),
            sections: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Raw `e_flags` value.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn segment(
        mut self,
        name: &str,
        vaddr: u32,
        data: &[u8],
        mem_size: u32,
        writable: bool,
        executable: bool,
    ) -> Self {
        self.segments.push(Segment {
            name: name.to_string(),
            vaddr,
            data: data.to_vec(),
            mem_size: mem_size.max(data.len() as u32),
            writable,
            executable,
        });
        self
    }

    /// Read-only, executable code.
    pub fn text(self, vaddr: u32, code: &[u8]) -> Self {
        self.segment(".text", vaddr, code, code.len() as u32, false, true)
    }

    /// Writable data, zero-filled up to `mem_size`.
    pub fn data(self, vaddr: u32, data: &[u8], mem_size: u32) -> Self {
        self.segment(".data", vaddr, data, mem_size, true, false)
    }

    /// An allocated section with no file contents, such as `.plt`.
    pub fn section(mut self, name: &str, addr: u32, size: u32) -> Self {
        self.sections.push(ExtraSection {
            name: name.to_string(),
            addr,
            size,
        });
        self
    }

    pub fn function(mut self, name: &str, addr: u32, size: u32) -> Self {
        self.functions.push(Function {
            name: name.to_string(),
            addr,
            size,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len();
        let mut body = Vec::new();
        let body_start = EHDR_SIZE + phnum * PHDR_SIZE;

        // Segment contents.
        let mut segment_offsets = Vec::with_capacity(phnum);
        for segment in &self.segments {
            pad4(&mut body);
            segment_offsets.push((body_start + body.len()) as u32);
            body.extend_from_slice(&segment.data);
        }

        let mut shstrtab = StringTable::new();
        let mut strtab = StringTable::new();

        // Symbols, each attached to the segment section that covers it.
        pad4(&mut body);
        let symtab_offset = (body_start + body.len()) as u32;
        body.extend_from_slice(&[0; SYM_SIZE]);
        for function in &self.functions {
            let shndx = self
                .segments
                .iter()
                .position(|s| s.vaddr <= function.addr && function.addr < s.vaddr + s.mem_size)
                .map_or(1, |i| i + 1);
            put32(&mut body, strtab.add(&function.name));
            put32(&mut body, function.addr);
            put32(&mut body, function.size);
            body.push((STB_GLOBAL << 4) | STT_FUNC);
            body.push(0);
            put16(&mut body, shndx as u16);
        }
        let symtab_size = (self.functions.len() + 1) * SYM_SIZE;

        let strtab_offset = (body_start + body.len()) as u32;
        let mut headers = Vec::new();

        // Section headers: null, segments, extras, symtab, strtab, shstrtab.
        section_header(&mut headers, 0, 0, 0, 0, 0, 0, 0, 0, 0);
        for (segment, offset) in self.segments.iter().zip(&segment_offsets) {
            let mut flags = SHF_ALLOC;
            if segment.writable {
                flags |= SHF_WRITE;
            }
            if segment.executable {
                flags |= SHF_EXECINSTR;
            }
            let name = shstrtab.add(&segment.name);
            section_header(
                &mut headers,
                name,
                SHT_PROGBITS,
                flags,
                segment.vaddr,
                *offset,
                segment.data.len() as u32,
                0,
                0,
                0,
            );
        }
        for section in &self.sections {
            let name = shstrtab.add(&section.name);
            section_header(
                &mut headers,
                name,
                SHT_NOBITS,
                SHF_ALLOC | SHF_EXECINSTR,
                section.addr,
                0,
                section.size,
                0,
                0,
                0,
            );
        }
        let symtab_index = 1 + self.segments.len() + self.sections.len();
        let symtab_name = shstrtab.add(".symtab");
        let strtab_name = shstrtab.add(".strtab");
        let shstrtab_name = shstrtab.add(".shstrtab");

        section_header(
            &mut headers,
            symtab_name,
            SHT_SYMTAB,
            0,
            0,
            symtab_offset,
            symtab_size as u32,
            symtab_index as u32 + 1,
            1,
            SYM_SIZE as u32,
        );
        body.extend_from_slice(&strtab.0);
        section_header(
            &mut headers,
            strtab_name,
            SHT_STRTAB,
            0,
            0,
            strtab_offset,
            strtab.0.len() as u32,
            0,
            0,
            0,
        );
        let shstrtab_offset = (body_start + body.len()) as u32;
        body.extend_from_slice(&shstrtab.0);
        section_header(
            &mut headers,
            shstrtab_name,
            SHT_STRTAB,
            0,
            0,
            shstrtab_offset,
            shstrtab.0.len() as u32,
            0,
            0,
            0,
        );
        pad4(&mut body);

        let shoff = (body_start + body.len()) as u32;
        let shnum = symtab_index + 3;

        let mut out = Vec::with_capacity(shoff as usize + headers.len());
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        put16(&mut out, 2); // ET_EXEC
        put16(&mut out, self.machine);
        put32(&mut out, 1);
        put32(&mut out, self.entry);
        put32(&mut out, if phnum > 0 { EHDR_SIZE as u32 } else { 0 });
        put32(&mut out, shoff);
        put32(&mut out, self.flags);
        put16(&mut out, EHDR_SIZE as u16);
        put16(&mut out, PHDR_SIZE as u16);
        put16(&mut out, phnum as u16);
        put16(&mut out, SHDR_SIZE as u16);
        put16(&mut out, shnum as u16);
        put16(&mut out, (shnum - 1) as u16);

        for (segment, offset) in self.segments.iter().zip(&segment_offsets) {
            let mut flags = PF_R;
            if segment.writable {
                flags |= PF_W;
            }
            if segment.executable {
                flags |= PF_X;
            }
            put32(&mut out, PT_LOAD);
            put32(&mut out, *offset);
            put32(&mut out, segment.vaddr);
            put32(&mut out, segment.vaddr);
            put32(&mut out, segment.data.len() as u32);
            put32(&mut out, segment.mem_size);
            put32(&mut out, flags);
            put32(&mut out, 4);
        }

        out.extend_from_slice(&body);
        out.extend_from_slice(&headers);
        out
    }

    /// Write the executable to a temporary file that lives as long as the
    /// returned handle.
    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temporary file");
        file.write_all(&self.build()).expect("Failed to write ELF");
        file.flush().expect("Failed to flush ELF");
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = ElfBuilder::new(0x1000)
            .text(0x1000, &[1, 2, 3, 4])
            .function("main", 0x1000, 4)
            .build();
        assert_eq!(&bytes[..4], b"\x7fELF");
        assert_eq!(u16::from_le_bytes([bytes[18], bytes[19]]), EM_ALTERA_NIOS2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 0x1000);
        // The only segment's contents follow the program header.
        assert_eq!(&bytes[EHDR_SIZE + PHDR_SIZE..EHDR_SIZE + PHDR_SIZE + 4], &[1, 2, 3, 4]);

        let shoff = u32::from_le_bytes(bytes[32..36].try_into().unwrap()) as usize;
        let shnum = u16::from_le_bytes([bytes[48], bytes[49]]) as usize;
        assert_eq!(shnum, 5);
        assert_eq!(bytes.len(), shoff + shnum * SHDR_SIZE);
    }
}
