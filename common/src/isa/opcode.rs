//! Opcode names shared by the base and DPX encodings.
//!
//! Mnemonics follow the Nios II processor reference. DPX reuses the base
//! operations and adds the thread/messaging and bit-manipulation instructions
//! grouped at the end.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use variant_count::VariantCount;

use super::InstructionType;

#[derive(
    Debug, Default, PartialEq, Eq, Clone, Copy, Hash, VariantCount, Serialize, Deserialize,
)]
#[allow(clippy::upper_case_acronyms)]
pub enum Opcode {
    // J-type
    CALL,
    JMPI,

    // I-type arithmetic and logic
    ADDI,
    ANDI,
    ORI,
    XORI,
    ANDHI,
    ORHI,
    XORHI,
    MULI,
    CMPGEI,
    CMPLTI,
    CMPNEI,
    CMPEQI,
    CMPGEUI,
    CMPLTUI,

    // Loads and stores
    LDB,
    LDBU,
    LDH,
    LDHU,
    LDW,
    STB,
    STH,
    STW,
    LDBIO,
    LDBUIO,
    LDHIO,
    LDHUIO,
    LDWIO,
    STBIO,
    STHIO,
    STWIO,

    // Branches
    BR,
    BEQ,
    BNE,
    BGE,
    BGEU,
    BLT,
    BLTU,

    // Cache maintenance
    INITD,
    INITDA,
    FLUSHD,
    FLUSHDA,
    INITI,
    FLUSHI,
    FLUSHP,
    SYNC,

    // R-type arithmetic and logic
    #[default]
    ADD,
    SUB,
    AND,
    OR,
    XOR,
    NOR,
    MUL,
    MULXSS,
    MULXSU,
    MULXUU,
    DIV,
    DIVU,
    CMPEQ,
    CMPNE,
    CMPGE,
    CMPGEU,
    CMPLT,
    CMPLTU,

    // Shifts and rotates
    SLL,
    SLLI,
    SRL,
    SRLI,
    SRA,
    SRAI,
    ROL,
    ROLI,
    ROR,

    // Control transfer through registers
    RET,
    JMP,
    CALLR,
    NEXTPC,
    ERET,
    BRET,
    TRAP,
    BREAK,

    // Control and shadow registers
    RDCTL,
    WRCTL,
    RDPRS,
    WRPRS,

    CUSTOM,

    // DPX only
    MOVHI20,
    ANDCI,
    ANDCHI,
    INSERT,
    EXTRACT,
    MERGE,
    SNDI,
    RCVI,
    SND,
    RCV,
    FORK,
    EXIT,
    CIDALLOC,
    TXALLOC,
    RXFREE,
    JREL,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::CALL => "call",
            Opcode::JMPI => "jmpi",

            Opcode::ADDI => "addi",
            Opcode::ANDI => "andi",
            Opcode::ORI => "ori",
            Opcode::XORI => "xori",
            Opcode::ANDHI => "andhi",
            Opcode::ORHI => "orhi",
            Opcode::XORHI => "xorhi",
            Opcode::MULI => "muli",
            Opcode::CMPGEI => "cmpgei",
            Opcode::CMPLTI => "cmplti",
            Opcode::CMPNEI => "cmpnei",
            Opcode::CMPEQI => "cmpeqi",
            Opcode::CMPGEUI => "cmpgeui",
            Opcode::CMPLTUI => "cmpltui",

            Opcode::LDB => "ldb",
            Opcode::LDBU => "ldbu",
            Opcode::LDH => "ldh",
            Opcode::LDHU => "ldhu",
            Opcode::LDW => "ldw",
            Opcode::STB => "stb",
            Opcode::STH => "sth",
            Opcode::STW => "stw",
            Opcode::LDBIO => "ldbio",
            Opcode::LDBUIO => "ldbuio",
            Opcode::LDHIO => "ldhio",
            Opcode::LDHUIO => "ldhuio",
            Opcode::LDWIO => "ldwio",
            Opcode::STBIO => "stbio",
            Opcode::STHIO => "sthio",
            Opcode::STWIO => "stwio",

            Opcode::BR => "br",
            Opcode::BEQ => "beq",
            Opcode::BNE => "bne",
            Opcode::BGE => "bge",
            Opcode::BGEU => "bgeu",
            Opcode::BLT => "blt",
            Opcode::BLTU => "bltu",

            Opcode::INITD => "initd",
            Opcode::INITDA => "initda",
            Opcode::FLUSHD => "flushd",
            Opcode::FLUSHDA => "flushda",
            Opcode::INITI => "initi",
            Opcode::FLUSHI => "flushi",
            Opcode::FLUSHP => "flushp",
            Opcode::SYNC => "sync",

            Opcode::ADD => "add",
            Opcode::SUB => "sub",
            Opcode::AND => "and",
            Opcode::OR => "or",
            Opcode::XOR => "xor",
            Opcode::NOR => "nor",
            Opcode::MUL => "mul",
            Opcode::MULXSS => "mulxss",
            Opcode::MULXSU => "mulxsu",
            Opcode::MULXUU => "mulxuu",
            Opcode::DIV => "div",
            Opcode::DIVU => "divu",
            Opcode::CMPEQ => "cmpeq",
            Opcode::CMPNE => "cmpne",
            Opcode::CMPGE => "cmpge",
            Opcode::CMPGEU => "cmpgeu",
            Opcode::CMPLT => "cmplt",
            Opcode::CMPLTU => "cmpltu",

            Opcode::SLL => "sll",
            Opcode::SLLI => "slli",
            Opcode::SRL => "srl",
            Opcode::SRLI => "srli",
            Opcode::SRA => "sra",
            Opcode::SRAI => "srai",
            Opcode::ROL => "rol",
            Opcode::ROLI => "roli",
            Opcode::ROR => "ror",

            Opcode::RET => "ret",
            Opcode::JMP => "jmp",
            Opcode::CALLR => "callr",
            Opcode::NEXTPC => "nextpc",
            Opcode::ERET => "eret",
            Opcode::BRET => "bret",
            Opcode::TRAP => "trap",
            Opcode::BREAK => "break",

            Opcode::RDCTL => "rdctl",
            Opcode::WRCTL => "wrctl",
            Opcode::RDPRS => "rdprs",
            Opcode::WRPRS => "wrprs",

            Opcode::CUSTOM => "custom",

            Opcode::MOVHI20 => "movhi20",
            Opcode::ANDCI => "andci",
            Opcode::ANDCHI => "andchi",
            Opcode::INSERT => "insert",
            Opcode::EXTRACT => "extract",
            Opcode::MERGE => "merge",
            Opcode::SNDI => "sndi",
            Opcode::RCVI => "rcvi",
            Opcode::SND => "snd",
            Opcode::RCV => "rcv",
            Opcode::FORK => "fork",
            Opcode::EXIT => "exit",
            Opcode::CIDALLOC => "cidalloc",
            Opcode::TXALLOC => "txalloc",
            Opcode::RXFREE => "rxfree",
            Opcode::JREL => "jrel",
        }
    }

    /// Operand shape of the opcode once decoded, independent of encoding.
    pub fn ins_type(&self) -> InstructionType {
        match self {
            Opcode::CALL | Opcode::JMPI | Opcode::MOVHI20 => InstructionType::JType,

            Opcode::ADDI
            | Opcode::ANDI
            | Opcode::ORI
            | Opcode::XORI
            | Opcode::ANDHI
            | Opcode::ORHI
            | Opcode::XORHI
            | Opcode::MULI
            | Opcode::CMPGEI
            | Opcode::CMPLTI
            | Opcode::CMPNEI
            | Opcode::CMPEQI
            | Opcode::CMPGEUI
            | Opcode::CMPLTUI
            | Opcode::RDPRS
            | Opcode::ANDCI
            | Opcode::ANDCHI
            | Opcode::INSERT
            | Opcode::EXTRACT
            | Opcode::MERGE
            | Opcode::SNDI
            | Opcode::RCVI
            | Opcode::INITD
            | Opcode::INITDA
            | Opcode::FLUSHD
            | Opcode::FLUSHDA => InstructionType::IType,

            _ if self.is_load() || self.is_store() => InstructionType::IType,
            _ if self.is_conditional_branch() || *self == Opcode::BR => InstructionType::IType,

            _ => InstructionType::RType,
        }
    }

    pub fn is_load(&self) -> bool {
        matches!(
            self,
            Opcode::LDB
                | Opcode::LDBU
                | Opcode::LDH
                | Opcode::LDHU
                | Opcode::LDW
                | Opcode::LDBIO
                | Opcode::LDBUIO
                | Opcode::LDHIO
                | Opcode::LDHUIO
                | Opcode::LDWIO
        )
    }

    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Opcode::STB
                | Opcode::STH
                | Opcode::STW
                | Opcode::STBIO
                | Opcode::STHIO
                | Opcode::STWIO
        )
    }

    /// Loads and stores that bypass the data cache.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Opcode::LDBIO
                | Opcode::LDBUIO
                | Opcode::LDHIO
                | Opcode::LDHUIO
                | Opcode::LDWIO
                | Opcode::STBIO
                | Opcode::STHIO
                | Opcode::STWIO
        )
    }

    /// Width in bytes of a load or store.
    pub fn access_width(&self) -> Option<usize> {
        match self {
            Opcode::LDB | Opcode::LDBU | Opcode::STB => Some(1),
            Opcode::LDBIO | Opcode::LDBUIO | Opcode::STBIO => Some(1),
            Opcode::LDH | Opcode::LDHU | Opcode::STH => Some(2),
            Opcode::LDHIO | Opcode::LDHUIO | Opcode::STHIO => Some(2),
            Opcode::LDW | Opcode::STW | Opcode::LDWIO | Opcode::STWIO => Some(4),
            _ => None,
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Opcode::BEQ | Opcode::BNE | Opcode::BGE | Opcode::BGEU | Opcode::BLT | Opcode::BLTU
        )
    }

    /// Instructions that leave straight-line code: branches, calls, jumps and returns.
    pub fn is_control_transfer(&self) -> bool {
        self.is_conditional_branch()
            || matches!(
                self,
                Opcode::BR
                    | Opcode::CALL
                    | Opcode::JMPI
                    | Opcode::CALLR
                    | Opcode::JMP
                    | Opcode::RET
                    | Opcode::ERET
                    | Opcode::BRET
                    | Opcode::JREL
            )
    }

    /// Operations that exist only in the DPX encoding.
    pub fn is_dpx_only(&self) -> bool {
        matches!(
            self,
            Opcode::MOVHI20
                | Opcode::ANDCI
                | Opcode::ANDCHI
                | Opcode::INSERT
                | Opcode::EXTRACT
                | Opcode::MERGE
                | Opcode::SNDI
                | Opcode::RCVI
                | Opcode::SND
                | Opcode::RCV
                | Opcode::FORK
                | Opcode::EXIT
                | Opcode::CIDALLOC
                | Opcode::TXALLOC
                | Opcode::RXFREE
                | Opcode::JREL
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
