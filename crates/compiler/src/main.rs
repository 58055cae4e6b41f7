//! Snow Compiler CLI
//!
//! Command-line interface for compiling and running `.snow` programs.

use clap::{Parser as ClapParser, Subcommand};
use snow_runtime::vm::{RunMode, Vm};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "snowc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Snow compiler - compile and run .snow programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .snow file to a bytecode program
    Build {
        /// Input .snow source file
        input: PathBuf,

        /// Output bytecode path (defaults to input filename with .snowc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the binary-encoded program instead of the textual mnemonic form
        #[arg(long)]
        binary: bool,

        /// Emit DEBUG_TRAP after every lowered return
        #[arg(long)]
        debug_trap: bool,
    },

    /// Compile and immediately run a .snow file
    Run {
        /// Input .snow source file
        input: PathBuf,

        /// Run with DEBUG_TRAP reporting each trap to stderr
        #[arg(long)]
        debug: bool,
    },

    /// Run an already-compiled bytecode program
    Exec {
        /// Input program file (textual or, with --binary, binary-encoded)
        input: PathBuf,

        /// Read the input as a binary-encoded program
        #[arg(long)]
        binary: bool,

        /// Run with DEBUG_TRAP reporting each trap to stderr
        #[arg(long)]
        debug: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, binary, debug_trap } => {
            let output = output.unwrap_or_else(|| input.with_extension("snowc"));
            run_build(&input, &output, binary, debug_trap);
        }
        Commands::Run { input, debug } => {
            run_run(&input, debug);
        }
        Commands::Exec { input, binary, debug } => {
            run_exec(&input, binary, debug);
        }
    }
}

fn read_source(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn compile_or_exit(source: &str, file: &str, config: &snowc::CompilerConfig) -> snow_core::Program {
    match snowc::compile(source, file, config) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn run_build(input: &Path, output: &Path, binary: bool, debug_trap: bool) {
    let source = read_source(input);
    let file = input.display().to_string();
    let config = snowc::CompilerConfig::new().with_debug_trap(debug_trap).with_emit_binary(binary);
    let program = compile_or_exit(&source, &file, &config);

    let write_result = if binary {
        fs::write(output, program.to_binary())
    } else {
        fs::write(output, program.to_text())
    };
    if let Err(e) = write_result {
        eprintln!("Error writing {}: {}", output.display(), e);
        process::exit(1);
    }
    println!("Compiled {} -> {}", input.display(), output.display());
}

fn run_run(input: &Path, debug: bool) {
    let source = read_source(input);
    let file = input.display().to_string();
    let config = snowc::CompilerConfig::new().with_debug_trap(debug);
    let program = compile_or_exit(&source, &file, &config);
    execute(program, debug);
}

fn run_exec(input: &Path, binary: bool, debug: bool) {
    let program = if binary {
        let bytes = fs::read(input).unwrap_or_else(|e| {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        });
        snow_core::Program::from_binary(&bytes)
    } else {
        let text = read_source(input);
        snow_core::Program::from_text(&text)
    };
    let program = program.unwrap_or_else(|e| {
        eprintln!("Error loading program: {e}");
        process::exit(1);
    });
    execute(program, debug);
}

fn execute(program: snow_core::Program, debug: bool) {
    let mode = if debug { RunMode::Debug } else { RunMode::Run };
    let mut vm = Vm::new(mode);
    match vm.run(&program) {
        Ok(stack) => {
            if let Some(top) = stack.last() {
                println!("{top}");
            }
        }
        Err(e) => {
            eprintln!("Runtime error: {e}");
            process::exit(1);
        }
    }
}
