use std::fmt;

use serde::Deserialize;

use super::Config;

/// CPU features and memory layout of the simulated system.
///
/// Defaults describe a core with hardware divide and multiply, a heap placed
/// right after the loaded program and a stack just below 128 MiB.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub hwdiv: bool,
    pub hwmul: bool,
    pub hwmulx: bool,
    pub mmu: bool,
    pub mpu: bool,

    pub cpuid: u32,

    #[serde(rename = "breakaddr")]
    pub break_addr: u32,
    #[serde(rename = "exceptionaddr")]
    pub exception_addr: u32,

    #[serde(rename = "heapsize")]
    pub heap_size: u32,
    #[serde(rename = "stackbase")]
    pub stack_base: u32,
    #[serde(rename = "stacksize")]
    pub stack_size: u32,

    #[serde(rename = "btracemode")]
    pub btrace_mode: BtraceMode,
    #[serde(rename = "btracesize")]
    pub btrace_size: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hwdiv: true,
            hwmul: true,
            hwmulx: true,
            mmu: false,
            mpu: false,
            cpuid: 0,
            break_addr: 0,
            exception_addr: 0,
            heap_size: 0x0080_0000,
            stack_base: 0x0780_0000,
            stack_size: 0x0080_0000,
            btrace_mode: BtraceMode::Ring,
            btrace_size: 1024,
        }
    }
}

impl Config for SimConfig {
    const PREFIX: &'static str = "SIM";
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap_derive", derive(clap::ValueEnum))]
pub enum BtraceMode {
    #[serde(rename = "disabled")]
    #[cfg_attr(feature = "clap_derive", clap(name = "disabled"))]
    Disabled,

    #[serde(rename = "linear")]
    #[cfg_attr(feature = "clap_derive", clap(name = "linear"))]
    Linear,

    #[default]
    #[serde(rename = "ring")]
    #[cfg_attr(feature = "clap_derive", clap(name = "ring"))]
    Ring,
}

impl fmt::Display for BtraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BtraceMode::Disabled => write!(f, "disabled"),
            BtraceMode::Linear => write!(f, "linear"),
            BtraceMode::Ring => write!(f, "ring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: &[&str] = &[
        "NIOS2_SIM_HWDIV",
        "NIOS2_SIM_CPUID",
        "NIOS2_SIM_STACKBASE",
        "NIOS2_SIM_BTRACEMODE",
        "NIOS2_SIM_BTRACESIZE",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn read_config() {
        clear_env();
        std::env::set_var("NIOS2_SIM_HWDIV", "false");
        std::env::set_var("NIOS2_SIM_CPUID", "3");
        std::env::set_var("NIOS2_SIM_STACKBASE", "16777216");
        std::env::set_var("NIOS2_SIM_BTRACEMODE", "linear");
        std::env::set_var("NIOS2_SIM_BTRACESIZE", "16");

        let config = <SimConfig as Config>::from_env().unwrap();
        clear_env();

        assert!(!config.hwdiv);
        assert!(config.hwmul);
        assert_eq!(config.cpuid, 3);
        assert_eq!(config.stack_base, 0x0100_0000);
        assert_eq!(config.stack_size, 0x0080_0000);
        assert_eq!(config.btrace_mode, BtraceMode::Linear);
        assert_eq!(config.btrace_size, 16);
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        clear_env();

        let config = <SimConfig as Config>::from_env().unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.btrace_mode.to_string(), "ring");
    }
}
