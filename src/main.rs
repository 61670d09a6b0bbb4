use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;

use minischeme::evaluator::Interpreter;
use minischeme::{BracketMatching, InterpreterConfig, MAX_EVAL_DEPTH, with_eval_stack};

/// minischeme reads a whole program, evaluates its top-level forms in order and
/// prints every result that has a value.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Program to run. Standard input is read when omitted.
    file: Option<PathBuf>,

    /// Require `]` to close `[` and `)` to close `(`.
    #[arg(long)]
    strict_brackets: bool,

    /// Maximum nested evaluation depth.
    #[arg(long, value_name = "N", default_value_t = MAX_EVAL_DEPTH)]
    max_depth: usize,

    /// Start an interactive session instead of running a program.
    #[cfg(feature = "repl")]
    #[arg(long, conflicts_with = "file")]
    repl: bool,
}

fn read_source(file: Option<&PathBuf>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// Run `source` writing to `out`. Returns false when the program failed or its output
/// could not be flushed; a program error is reported on `out`, after whatever the
/// program printed.
fn run_to<W: Write>(interpreter: &mut Interpreter, source: &str, out: &mut W) -> bool {
    match interpreter.run_source(source, out) {
        Ok(()) => match out.flush() {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Failed to write output: {e}");
                false
            }
        },
        Err(e) => {
            let _ = writeln!(out, "{e}");
            let _ = out.flush();
            false
        }
    }
}

/// Run `source` to completion. Any failure ends the process with status 1 after the
/// interpreter's arena is released.
fn run(source: &str, config: InterpreterConfig) {
    let mut interpreter = Interpreter::new(config);
    let succeeded = run_to(&mut interpreter, source, &mut io::stdout().lock());
    log::debug!("arena at exit: {:?}", interpreter.arena().stats());

    if !succeeded {
        interpreter.fatal_exit(1);
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = InterpreterConfig {
        bracket_matching: if args.strict_brackets {
            BracketMatching::Strict
        } else {
            BracketMatching::Permissive
        },
        max_eval_depth: args.max_depth,
    };

    #[cfg(feature = "repl")]
    if args.repl {
        if let Err(e) = with_eval_stack(move || minischeme::repl::run_repl(config)) {
            eprintln!("{e}");
            process::exit(1);
        }
        return;
    }

    let source = read_source(args.file.as_ref()).unwrap_or_else(|e| {
        match &args.file {
            Some(path) => eprintln!("Failed to read '{}': {e}", path.display()),
            None => eprintln!("Failed to read standard input: {e}"),
        }
        process::exit(1);
    });

    if let Err(e) = with_eval_stack(|| run(&source, config)) {
        eprintln!("The evaluator encountered an unexpected error and must exit: {e}");
        process::exit(1);
    }
}
