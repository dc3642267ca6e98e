use std::{fmt, path::PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use nios2_common::isa::{elf_flags::Arch, Dpx, Encoding, Nios2, Register};
use nios2_config::{BtraceMode, Config, SimConfig};
use nios2_sim::{
    cpu::{ExecState, Signal, StopReason},
    elf::ElfFile,
    Simulator,
};
use nios2_unwind::{BacktraceFrame, RegisterSet, Unwinder};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// ELF executable to run.
    pub path: PathBuf,

    /// Stop after this many instructions instead of running to completion.
    #[arg(long)]
    pub steps: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Capture the program's output into the report instead of forwarding it.
    #[arg(long)]
    pub capture: bool,

    /// Simulator commands to run after the program stops, e.g. "btrace show 8".
    #[arg(short = 'x', long = "command", value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Most recent branches to show.
    #[arg(long, default_value_t = 16)]
    pub btrace_limit: u32,

    /// Deepest frame to unwind.
    #[arg(long, default_value_t = nios2_unwind::DEFAULT_DEPTH_LIMIT)]
    pub backtrace_limit: usize,

    #[command(flatten)]
    pub sim: SimArgs,
}

/// Overrides for `NIOS2_SIM_*`.
#[derive(Debug, Default, Args)]
pub struct SimArgs {
    #[arg(long)]
    pub hwdiv: Option<bool>,

    #[arg(long)]
    pub hwmul: Option<bool>,

    #[arg(long)]
    pub hwmulx: Option<bool>,

    #[arg(long)]
    pub cpuid: Option<u32>,

    #[arg(long)]
    pub heap_size: Option<u32>,

    #[arg(long)]
    pub stack_base: Option<u32>,

    #[arg(long)]
    pub stack_size: Option<u32>,

    #[arg(long, value_enum)]
    pub btrace_mode: Option<BtraceMode>,

    #[arg(long)]
    pub btrace_size: Option<u32>,
}

impl SimArgs {
    pub fn apply(&self, mut config: SimConfig) -> SimConfig {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        set!(hwdiv, hwmul, hwmulx, cpuid, heap_size, stack_base, stack_size, btrace_mode, btrace_size);
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRow {
    pub level: u32,
    pub from: u32,
    pub to: u32,
}

/// Where the program ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub arch: &'static str,
    pub state: ExecState,
    pub signal: Option<Signal>,
    /// Instructions completed when single-stepping.
    pub steps: Option<u64>,
    pub registers: Vec<RegisterValue>,
    pub btrace: Vec<BranchRow>,
    pub backtrace: Vec<BacktraceFrame>,
    pub commands: Vec<String>,
    pub output: Vec<String>,
}

impl Report {
    pub fn exit_code(&self) -> i32 {
        match self.state {
            ExecState::Exited(code) => code.into(),
            ExecState::Stopped(_) => self.signal.map_or(1, |signal| 128 + signal.number()),
            ExecState::Running => 1,
        }
    }

    pub fn register(&self, name: &str) -> Option<u32> {
        self.registers
            .iter()
            .find(|reg| reg.name == name)
            .map(|reg| reg.value)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.output {
            write!(f, "{line}")?;
        }
        match self.state {
            ExecState::Exited(code) => return writeln!(f, "[{}] exited with code {code}", self.arch),
            ExecState::Stopped(reason) => {
                write!(f, "[{}] stopped: {reason}", self.arch)?;
                if let Some(signal) = self.signal {
                    write!(f, " ({signal})")?;
                }
                if let Some(steps) = self.steps {
                    write!(f, " after {steps} instructions")?;
                }
                writeln!(f)?;
            }
            ExecState::Running => writeln!(f, "[{}] running", self.arch)?,
        }

        writeln!(f, "\nregisters:")?;
        for row in self.registers.chunks(4) {
            for reg in row {
                write!(f, "  {:>9} 0x{:08x}", reg.name, reg.value)?;
            }
            writeln!(f)?;
        }

        if !self.btrace.is_empty() {
            writeln!(f, "\nbranch trace:\n Level   From       To")?;
            for row in &self.btrace {
                writeln!(f, "-{:05} 0x{:08x} 0x{:08x}", row.level, row.from, row.to)?;
            }
        }

        if !self.backtrace.is_empty() {
            writeln!(f, "\nbacktrace:")?;
            for frame in &self.backtrace {
                writeln!(f, "{frame}")?;
            }
        }

        for output in &self.commands {
            write!(f, "\n{output}")?;
        }
        Ok(())
    }
}

pub fn handle_command(args: RunArgs) -> anyhow::Result<i32> {
    let report = run_elf(&args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(report.exit_code())
}

pub fn run_elf(args: &RunArgs) -> anyhow::Result<Report> {
    let elf = ElfFile::from_path(&args.path)
        .with_context(|| format!("failed to load {}", args.path.display()))?;
    let config = SimConfig::from_env().context("invalid NIOS2_SIM_* configuration")?;
    let config = args.sim.apply(config);

    match elf.arch()? {
        Arch::Nios2 => run_with::<Nios2>(&elf, config, args),
        Arch::Dpx => run_with::<Dpx>(&elf, config, args),
    }
}

fn run_with<E: Encoding>(elf: &ElfFile, config: SimConfig, args: &RunArgs) -> anyhow::Result<Report> {
    let mut sim = Simulator::<E>::new(config);
    if args.capture {
        sim = sim.with_logs();
    }
    sim.load_elf(elf)?;

    let (state, steps) = match args.steps {
        Some(steps) => {
            let (state, done) = step(&mut sim, steps);
            (state, Some(done))
        }
        None => (sim.run(), None),
    };
    tracing::debug!(?state, "simulation finished");

    let commands = args
        .commands
        .iter()
        .map(|command| sim.do_command(command))
        .collect::<Result<Vec<_>, _>>()?;

    let layout = sim.layout();
    let registers = sim
        .fetch_registers()
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let reg = Register::new(index as u8);
            let name = layout
                .name(reg)
                .map_or_else(|| reg.to_string(), |name| name.into_owned());
            RegisterValue { name, value }
        })
        .collect();

    let btrace = sim
        .btrace()
        .entries(args.btrace_limit)
        .into_iter()
        // A ring buffer that has not wrapped yet holds unused slots.
        .filter(|(_, entry)| entry.from != u32::MAX)
        .map(|(level, entry)| BranchRow {
            level,
            from: entry.from,
            to: entry.to,
        })
        .collect();

    let backtrace = match (state, sim.program()) {
        (ExecState::Stopped(_), Some(program)) => {
            let unwinder = Unwinder::<E>::new(&sim, program);
            unwinder.backtrace(RegisterSet::from_simulator(&sim)?, args.backtrace_limit)
        }
        _ => Vec::new(),
    };

    let output = sim
        .logs()
        .unwrap_or_default()
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .collect();

    Ok(Report {
        arch: E::NAME,
        state,
        signal: sim.stop_reason().1,
        steps,
        registers,
        btrace,
        backtrace,
        commands,
        output,
    })
}

/// Single-step up to `steps` instructions, returning the final state and
/// how many instructions completed.
fn step<E: Encoding>(sim: &mut Simulator<E>, steps: u64) -> (ExecState, u64) {
    let mut state = ExecState::Running;
    for done in 0..steps {
        state = sim.step();
        if state != ExecState::Stopped(StopReason::Step) {
            return (state, done + 1);
        }
    }
    (state, steps)
}
