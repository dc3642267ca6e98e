use clap::Parser;

use nios2_cli::{command::run, RunArgs};

#[derive(Debug, Parser)]
#[command(name = "nios2-run", author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: RunArgs,
}

fn main() -> anyhow::Result<()> {
    let _guard = nios2_cli::setup_logger();
    let Cli { args } = Cli::parse();

    let code = run::handle_command(args)?;
    std::process::exit(code)
}
