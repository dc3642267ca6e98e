use nios2_common::isa::{Encoding, Instruction, Nios2, Register};
use nios2_common_testing::{
    asm::{self, assemble},
    ElfBuilder,
};
use nios2_config::SimConfig;
use nios2_sim::{
    cpu::{ExecState, StopReason},
    elf::ElfFile,
    Simulator,
};
use nios2_unwind::{
    analyzer::analyze_prologue, next_pc, skip_prologue, FrameId, RegisterSet, Unwinder,
    DEFAULT_DEPTH_LIMIT,
};

const START: u32 = 0x1000;
const MAIN: u32 = 0x1020;
const F: u32 = 0x1040;
const G: u32 = 0x1068;
const STACK_TOP: u32 = 0x07FF_F000;

/// `_start` calls `main`, which calls `f`, which calls the leaf `g`.
/// `g` stops on the debugger breakpoint.
fn program() -> Vec<Instruction> {
    let [hi, lo] = asm::movia(Register::SP, STACK_TOP);
    vec![
        // _start
        hi,
        lo,
        asm::call(MAIN),
        asm::movi(Register::R4, 0),
        asm::syscall(0x0010),
        asm::nop(),
        asm::nop(),
        asm::nop(),
        // main
        asm::addi(Register::SP, Register::SP, -8),
        asm::stw(Register::RA, 4, Register::SP),
        asm::call(F),
        asm::ldw(Register::RA, 4, Register::SP),
        asm::addi(Register::SP, Register::SP, 8),
        asm::ret(),
        asm::nop(),
        asm::nop(),
        // f
        asm::addi(Register::SP, Register::SP, -16),
        asm::stw(Register::RA, 12, Register::SP),
        asm::stw(Register::FP, 8, Register::SP),
        asm::mov(Register::FP, Register::SP),
        asm::call(G),
        asm::ldw(Register::RA, 12, Register::SP),
        asm::ldw(Register::FP, 8, Register::SP),
        asm::addi(Register::SP, Register::SP, 16),
        asm::ret(),
        asm::nop(),
        // g
        asm::trap(31),
        asm::ret(),
    ]
}

fn builder() -> ElfBuilder {
    ElfBuilder::new(START)
        .text(START, &assemble::<Nios2>(&program()))
        .function("_start", START, 0x20)
        .function("main", MAIN, 0x20)
        .function("f", F, 0x28)
        .function("g", G, 0x08)
}

fn run(elf: &ElfFile) -> Simulator<Nios2> {
    let mut sim = Simulator::<Nios2>::new(SimConfig::default());
    sim.load_elf(elf).unwrap();
    assert_eq!(sim.run(), ExecState::Stopped(StopReason::Breakpoint));
    sim
}

#[test]
fn test_backtrace_from_leaf() {
    let elf = ElfFile::from_bytes(&builder().build()).unwrap();
    let sim = run(&elf);
    assert_eq!(sim.cpu.pc.value, G);

    let unwinder = Unwinder::<Nios2>::new(&sim, &elf);
    let registers = RegisterSet::from_simulator(&sim).unwrap();
    let frames = unwinder.backtrace(registers, DEFAULT_DEPTH_LIMIT);

    let names: Vec<_> = frames.iter().map(|f| f.function.as_deref()).collect();
    assert_eq!(names, [Some("g"), Some("f"), Some("main"), Some("_start")]);
    let pcs: Vec<_> = frames.iter().map(|f| f.pc).collect();
    assert_eq!(pcs, [G, F + 20, MAIN + 12, START + 12]);

    let main_cfa = STACK_TOP;
    let f_cfa = main_cfa - 8;
    let g_cfa = f_cfa - 16;
    assert_eq!(frames[0].id, Some(FrameId { stack: g_cfa, code: G }));
    assert_eq!(frames[1].id, Some(FrameId { stack: f_cfa, code: F }));
    assert_eq!(frames[2].id, Some(FrameId { stack: main_cfa, code: MAIN }));
    // `_start` sets up the stack itself; there is nothing above it.
    assert_eq!(frames[3].id, None);
    assert_eq!(frames[3].sp, Some(STACK_TOP));

    assert_eq!(frames[0].to_string(), "#0   0x00001068 in g ()");
    assert!(frames.iter().take(3).all(|f| f.unwinder == Some("prologue")));
}

#[test]
fn test_backtrace_mid_prologue() {
    let elf = ElfFile::from_bytes(&builder().build()).unwrap();
    let mut sim = Simulator::<Nios2>::new(SimConfig::default());
    sim.load_elf(&elf).unwrap();

    // Stop before `f` saves fp.
    let bp = F + 8;
    sim.write_memory(bp, &Nios2::BREAKPOINT.to_le_bytes());
    assert_eq!(sim.run(), ExecState::Stopped(StopReason::Breakpoint));
    assert_eq!(sim.cpu.pc.value, bp);

    let unwinder = Unwinder::<Nios2>::new(&sim, &elf);
    let registers = RegisterSet::from_simulator(&sim).unwrap();

    let (analysis, cache) = analyze_prologue::<Nios2>(&sim, F, &registers, true);
    assert_eq!(analysis.base_register(), Some(Register::SP));
    let cache = cache.unwrap();
    assert_eq!(cache.cfa, STACK_TOP - 8);
    assert_eq!(cache.saved_address(Register::RA), Some(STACK_TOP - 12));
    assert_eq!(cache.saved_address(Register::FP), None);

    let frames = unwinder.backtrace(registers, DEFAULT_DEPTH_LIMIT);
    let pcs: Vec<_> = frames.iter().map(|f| f.pc).collect();
    assert_eq!(pcs, [bp, MAIN + 12, START + 12]);
}

#[test]
fn test_plt_stub_frame() {
    let elf = ElfFile::from_bytes(&builder().section(".plt", G, 8).build()).unwrap();
    let sim = run(&elf);

    let unwinder = Unwinder::<Nios2>::new(&sim, &elf);
    let frames = unwinder.backtrace(RegisterSet::from_simulator(&sim).unwrap(), DEFAULT_DEPTH_LIMIT);
    assert_eq!(frames[0].unwinder, Some("stub"));
    assert_eq!(
        frames[0].id,
        Some(FrameId {
            stack: STACK_TOP - 24,
            code: G
        })
    );
    assert_eq!(frames[1].pc, F + 20);
    assert_eq!(frames.len(), 4);
}

#[test]
fn test_depth_limit() {
    let elf = ElfFile::from_bytes(&builder().build()).unwrap();
    let sim = run(&elf);
    let unwinder = Unwinder::<Nios2>::new(&sim, &elf);
    let frames = unwinder.backtrace(RegisterSet::from_simulator(&sim).unwrap(), 2);
    assert_eq!(frames.len(), 2);
}

#[test]
fn test_skip_prologue_and_step_over_simulator() {
    let elf = ElfFile::from_bytes(&builder().build()).unwrap();
    let sim = run(&elf);

    assert_eq!(skip_prologue::<Nios2>(&sim, F), F + 16);
    assert_eq!(skip_prologue::<Nios2>(&sim, MAIN), MAIN + 8);
    assert_eq!(skip_prologue::<Nios2>(&sim, G), G);

    let registers = RegisterSet::from_simulator(&sim).unwrap();
    assert_eq!(next_pc::<Nios2>(&sim, &registers, F + 16), Ok(G));
    assert_eq!(next_pc::<Nios2>(&sim, &registers, G + 4), Ok(F + 20));
}

#[test]
fn test_call_ending_a_function() {
    // Neither `_start` nor `h` has anything after its last call, so their
    // return addresses are the first instruction of the next function.
    const H: u32 = START + 12;
    const K: u32 = H + 12;
    let [hi, lo] = asm::movia(Register::SP, STACK_TOP);
    let program = [
        // _start
        hi,
        lo,
        asm::call(H),
        // h
        asm::addi(Register::SP, Register::SP, -8),
        asm::stw(Register::RA, 4, Register::SP),
        asm::call(K),
        // k
        asm::addi(Register::SP, Register::SP, -16),
        asm::stw(Register::RA, 12, Register::SP),
        asm::trap(31),
        asm::ret(),
    ];
    let elf = ElfBuilder::new(START)
        .text(START, &assemble::<Nios2>(&program))
        .function("_start", START, 12)
        .function("h", H, 12)
        .function("k", K, 16)
        .build();
    let elf = ElfFile::from_bytes(&elf).unwrap();
    let sim = run(&elf);

    let unwinder = Unwinder::<Nios2>::new(&sim, &elf);
    let frames = unwinder.backtrace(RegisterSet::from_simulator(&sim).unwrap(), DEFAULT_DEPTH_LIMIT);

    let names: Vec<_> = frames.iter().map(|f| f.function.as_deref()).collect();
    assert_eq!(names, [Some("k"), Some("h"), Some("_start")]);
    let pcs: Vec<_> = frames.iter().map(|f| f.pc).collect();
    assert_eq!(pcs, [K + 8, K, H]);
    assert_eq!(frames[0].id, Some(FrameId { stack: STACK_TOP - 8, code: K }));
    assert_eq!(frames[1].id, Some(FrameId { stack: STACK_TOP, code: H }));
    assert_eq!(frames[2].id, None);
}
