use anyhow::Context;
use clap::Parser;
use std::{io::Write, path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use step::{Config, Vm, VmConfig};

#[derive(Parser, Debug)]
#[command(name = "step")]
#[command(about = "Run a step program")]
struct Cli {
    /// Path to the source file
    source: PathBuf,

    /// Maximum operand stack depth
    #[arg(long, default_value_t = 256)]
    stack_capacity: usize,

    /// Maximum program size in words
    #[arg(long, default_value_t = 256)]
    program_capacity: usize,

    /// Maximum size of the string data in bytes
    #[arg(long, default_value_t = 256)]
    data_capacity: usize,

    /// Tokens per arena chunk
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u64).range(1..))]
    token_chunk: u64,

    /// Print every token to stderr as `line:col: kind text`
    #[arg(long)]
    tokens: bool,

    /// Print the compiled program to stderr before running it
    #[arg(long)]
    disassemble: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            vm: VmConfig {
                stack_capacity: self.stack_capacity,
                program_capacity: self.program_capacity,
                data_capacity: self.data_capacity,
            },
            token_chunk_capacity: self.token_chunk as usize,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.config();
    let path = cli.source.display();
    let source = std::fs::read_to_string(&cli.source)
        .with_context(|| format!("could not read {}", path))?;
    debug!(path = %path, bytes = source.len(), "loaded source");

    let mut vm = Vm::load_with(&source, &config, |token| {
        if cli.tokens {
            eprintln!("{}", token);
        }
    })
    .with_context(|| path.to_string())?;

    if cli.disassemble {
        eprintln!("{}", vm.program());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = step::execute(&mut vm, &mut out);
    out.flush()?;
    result.with_context(|| path.to_string())
}
