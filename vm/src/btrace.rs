//! Branch trace.
//!
//! Records the source and destination of every taken control transfer into a
//! fixed-size buffer. A linear buffer stops recording once it is full; a ring
//! buffer overwrites the oldest entry.

use std::fmt::Write;

use nios2_config::BtraceMode;
use serde::Serialize;

use crate::error::{Result, VMErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BtraceEntry {
    pub from: u32,
    pub to: u32,
}

const EMPTY_ENTRY: BtraceEntry = BtraceEntry {
    from: u32::MAX,
    to: u32::MAX,
};

#[derive(Debug, Clone, Default)]
pub struct BranchTrace {
    mode: BtraceMode,
    index: u32,
    buffer: Vec<BtraceEntry>,
}

impl BranchTrace {
    /// A zero-sized buffer disables tracing.
    pub fn new(mode: BtraceMode, size: u32) -> Self {
        let mode = if size == 0 { BtraceMode::Disabled } else { mode };
        let buffer = match mode {
            BtraceMode::Disabled => Vec::new(),
            _ => vec![EMPTY_ENTRY; size as usize],
        };
        Self {
            mode,
            index: 0,
            buffer,
        }
    }

    pub fn mode(&self) -> BtraceMode {
        self.mode
    }

    pub fn size(&self) -> u32 {
        self.buffer.len() as u32
    }

    /// Next slot to be written.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != BtraceMode::Disabled && !self.buffer.is_empty()
    }

    pub fn record(&mut self, from: u32, to: u32) {
        if !self.is_enabled() || self.index >= self.size() {
            return;
        }

        self.buffer[self.index as usize] = BtraceEntry { from, to };
        self.index += 1;

        if self.mode == BtraceMode::Ring && self.index >= self.size() {
            self.index = 0;
        }
    }

    /// Up to `limit` entries, oldest first, each paired with its level
    /// (how many transfers ago it was recorded).
    pub fn entries(&self, limit: u32) -> Vec<(u32, BtraceEntry)> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let size = self.size();
        let limit = match self.mode {
            BtraceMode::Linear => limit.min(self.index),
            _ => limit.min(size),
        };

        let start = (self.index + size - limit) % size;
        (0..limit)
            .map(|i| {
                let slot = (start + i) % size;
                (limit - i, self.buffer[slot as usize])
            })
            .collect()
    }

    pub fn show(&self, limit: u32) -> String {
        if !self.is_enabled() {
            return "no trace data\n".to_string();
        }

        let mut out = String::from(" Level   From       To\n");
        for (level, entry) in self.entries(limit) {
            let _ = writeln!(out, "-{:05} 0x{:08x} 0x{:08x}", level, entry.from, entry.to);
        }
        out
    }
}

pub const BTRACE_HELP: &str = "List of branch-trace commands:\n\n\
                               init -- Initialize and enable branch trace\n\
                               show -- Show trace data\n";

/// A parsed `btrace` command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtraceCommand {
    Help,
    Init { mode: BtraceMode, size: u32 },
    Show { limit: u32 },
}

/// Numbers accept a `0x` prefix as well as decimal.
fn parse_number(command: &str, arg: &str) -> Result<u32> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|_| VMErrorKind::InvalidOption(format!("btrace {command}"), arg.to_string()).into())
}

impl BtraceCommand {
    /// Parse the arguments following `btrace`.
    pub fn parse<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut args = args.into_iter().peekable();
        let Some(sub) = args.next() else {
            return Ok(BtraceCommand::Help);
        };

        let command = match sub {
            "init" => {
                let mode = match args.peek() {
                    Some(&"ring") => Some(BtraceMode::Ring),
                    Some(&"linear") => Some(BtraceMode::Linear),
                    _ => None,
                };
                if mode.is_some() {
                    args.next();
                }
                let size = match args.next() {
                    Some(arg) => parse_number(sub, arg)?,
                    None => 1024,
                };
                BtraceCommand::Init {
                    mode: mode.unwrap_or(BtraceMode::Ring),
                    size,
                }
            }
            "show" => {
                let limit = match args.next() {
                    Some(arg) => parse_number(sub, arg)?,
                    None => u32::MAX,
                };
                BtraceCommand::Show { limit }
            }
            other => return Err(VMErrorKind::UnknownCommand(format!("btrace {other}")))?,
        };

        if let Some(extra) = args.next() {
            return Err(VMErrorKind::TooManyOptions(
                format!("btrace {sub}"),
                extra.to_string(),
            ))?;
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_stops_when_full() {
        let mut trace = BranchTrace::new(BtraceMode::Linear, 2);
        trace.record(0x100, 0x200);
        trace.record(0x204, 0x300);
        trace.record(0x304, 0x400);
        assert_eq!(trace.index(), 2);
        assert_eq!(
            trace.show(10),
            " Level   From       To\n\
             -00002 0x00000100 0x00000200\n\
             -00001 0x00000204 0x00000300\n"
        );
    }

    #[test]
    fn test_ring_wraps() {
        let mut trace = BranchTrace::new(BtraceMode::Ring, 3);
        for i in 0..4 {
            trace.record(i, i + 0x10);
        }
        let entries = trace.entries(u32::MAX);
        let froms: Vec<u32> = entries.iter().map(|(_, e)| e.from).collect();
        assert_eq!(froms, vec![1, 2, 3]);
        assert_eq!(entries[0].0, 3);

        let latest = trace.entries(1);
        assert_eq!(latest, vec![(1, BtraceEntry { from: 3, to: 0x13 })]);
    }

    #[test]
    fn test_ring_shows_unfilled_slots() {
        let mut trace = BranchTrace::new(BtraceMode::Ring, 2);
        trace.record(4, 8);
        let entries = trace.entries(u32::MAX);
        assert_eq!(entries[0].1, EMPTY_ENTRY);
        assert_eq!(entries[1].1, BtraceEntry { from: 4, to: 8 });
    }

    #[test]
    fn test_disabled() {
        let mut trace = BranchTrace::new(BtraceMode::Ring, 0);
        assert_eq!(trace.mode(), BtraceMode::Disabled);
        trace.record(1, 2);
        assert_eq!(trace.show(5), "no trace data\n");
        assert_eq!(BranchTrace::default().show(5), "no trace data\n");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BtraceCommand::parse([]).unwrap(), BtraceCommand::Help);
        assert_eq!(
            BtraceCommand::parse(["init"]).unwrap(),
            BtraceCommand::Init {
                mode: BtraceMode::Ring,
                size: 1024
            }
        );
        assert_eq!(
            BtraceCommand::parse(["init", "linear", "0x10"]).unwrap(),
            BtraceCommand::Init {
                mode: BtraceMode::Linear,
                size: 16
            }
        );
        assert_eq!(
            BtraceCommand::parse(["show", "5"]).unwrap(),
            BtraceCommand::Show { limit: 5 }
        );
        assert_eq!(
            BtraceCommand::parse(["show"]).unwrap(),
            BtraceCommand::Show { limit: u32::MAX }
        );
    }

    #[test]
    fn test_parse_errors() {
        let err = BtraceCommand::parse(["show", "5", "6"]).unwrap_err();
        assert_eq!(err.source.to_string(), "too many options for btrace show: 6");
        assert_eq!(
            err,
            VMErrorKind::TooManyOptions("btrace show".into(), "6".into())
        );

        let err = BtraceCommand::parse(["init", "ring", "abc"]).unwrap_err();
        assert_eq!(
            err,
            VMErrorKind::InvalidOption("btrace init".into(), "abc".into())
        );

        let err = BtraceCommand::parse(["clear"]).unwrap_err();
        assert_eq!(err, VMErrorKind::UnknownCommand("btrace clear".into()));
    }
}
