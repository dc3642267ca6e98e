use clap::Parser;
use serde_json::json;

use nios2_cli::{command::run::run_elf, RunArgs};
use nios2_common::isa::{Instruction, Nios2, Opcode, Register};
use nios2_common_testing::{
    asm::{self, assemble},
    ElfBuilder,
};
use nios2_sim::cpu::{ExecState, Signal, StopReason};
use tempfile::NamedTempFile;

const TEXT: u32 = 0x1000;
const DATA: u32 = 0x2000;

#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    args: RunArgs,
}

fn args(file: &NamedTempFile, extra: &[&str]) -> RunArgs {
    let path = file.path().to_str().unwrap();
    let argv = ["nios2-run", path, "--capture"].into_iter().chain(extra.iter().copied());
    Cli::try_parse_from(argv).unwrap().args
}

fn write_program(program: &[Instruction], builder: impl FnOnce(ElfBuilder) -> ElfBuilder) -> NamedTempFile {
    builder(ElfBuilder::new(TEXT).text(TEXT, &assemble::<Nios2>(program))).write_temp()
}

#[test]
fn test_exit_with_output() {
    let [hi, lo] = asm::movia(Register::R5, DATA);
    let program = [
        asm::movi(Register::R4, 1),
        hi,
        lo,
        asm::movi(Register::R6, 3),
        asm::syscall(0x0001),
        asm::movi(Register::R4, 3),
        asm::syscall(0x0010),
    ];
    let file = write_program(&program, |b| b.data(DATA, b"hi\n", 4));

    let report = run_elf(&args(&file, &[])).unwrap();
    assert_eq!(report.state, ExecState::Exited(3));
    assert_eq!(report.exit_code(), 3);
    assert_eq!(report.output, ["hi\n"]);
    assert!(report.backtrace.is_empty());
    assert_eq!(report.to_string(), "hi\n[nios2] exited with code 3\n");
}

#[test]
fn test_stop_reports_backtrace() {
    let g = TEXT + 0x10;
    let [hi, lo] = asm::movia(Register::SP, 0x07FF_F000);
    let program = [hi, lo, asm::call(g), asm::nop(), asm::trap(31), asm::ret()];
    let file = write_program(&program, |b| {
        b.function("_start", TEXT, 0x10).function("g", g, 8)
    });

    let report = run_elf(&args(&file, &["-x", "btrace show 1"])).unwrap();
    assert_eq!(report.state, ExecState::Stopped(StopReason::Breakpoint));
    assert_eq!(report.signal, Some(Signal::SIGTRAP));
    assert_eq!(report.exit_code(), 128 + 5);
    assert_eq!(report.register("pc"), Some(g));
    assert_eq!(report.register("ra"), Some(TEXT + 12));

    let functions: Vec<_> = report
        .backtrace
        .iter()
        .map(|frame| frame.function.as_deref())
        .collect();
    assert_eq!(functions, [Some("g"), Some("_start")]);

    assert_eq!(report.btrace.len(), 1);
    assert_eq!((report.btrace[0].from, report.btrace[0].to), (TEXT + 8, g));
    assert_eq!(report.commands, [format!(" Level   From       To\n-00001 0x{:08x} 0x{g:08x}\n", TEXT + 8)]);

    let text = report.to_string();
    assert!(text.starts_with("[nios2] stopped: breakpoint (SIGTRAP)\n"), "{text}");
    assert!(text.contains("#0   0x00001010 in g ()"), "{text}");
}

#[test]
fn test_single_steps() {
    let program = [asm::nop(), asm::nop(), asm::nop(), asm::movi(Register::R4, 0), asm::syscall(0x0010)];
    let file = write_program(&program, |b| b);

    let report = run_elf(&args(&file, &["--steps", "2"])).unwrap();
    assert_eq!(report.state, ExecState::Stopped(StopReason::Step));
    assert_eq!(report.steps, Some(2));
    assert_eq!(report.register("pc"), Some(TEXT + 8));

    let report = run_elf(&args(&file, &["--steps", "100"])).unwrap();
    assert_eq!(report.state, ExecState::Exited(0));
    assert_eq!(report.steps, Some(5));
}

#[test]
fn test_flags_override_config() {
    let div = asm::rtype(Opcode::DIV, Register::R6, Register::R4, Register::R5);
    let file = write_program(&[div], |b| b);

    let report = run_elf(&args(&file, &["--hwdiv", "false"])).unwrap();
    assert!(matches!(
        report.state,
        ExecState::Stopped(StopReason::UnimplementedInstruction(_))
    ));
    assert_eq!(report.signal, Some(Signal::SIGILL));
}

#[test]
fn test_json_report() {
    let file = write_program(&[asm::movi(Register::R4, 9), asm::syscall(0x0010)], |b| b);
    let report = run_elf(&args(&file, &["--json"])).unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["arch"], json!("nios2"));
    assert_eq!(value["state"], json!({ "Exited": 9 }));
    assert_eq!(value["registers"][4], json!({ "name": "r4", "value": 9 }));
}

#[test]
fn test_missing_file() {
    let file = NamedTempFile::new().unwrap();
    let args = args(&file, &[]);
    std::fs::remove_file(file.path()).unwrap();
    let err = run_elf(&args).unwrap_err();
    assert!(err.to_string().starts_with("failed to load"));
}
