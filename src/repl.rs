//! Interactive read-eval-print loop.
//!
//! One interpreter lives for the whole session, so definitions persist between
//! inputs. Errors are reported and the session continues. An input with unclosed
//! brackets keeps reading on a continuation prompt until it is complete.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::evaluator::Interpreter;
use crate::{InterpreterConfig, ParseErrorKind};

const PROMPT: &str = "minischeme> ";
const CONTINUATION_PROMPT: &str = "         .. ";

/// What to do with a line of input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Env,
    Stats,
    Quit,
    Source,
}

fn classify(line: &str) -> Command {
    match line {
        ":help" => Command::Help,
        ":env" => Command::Env,
        ":stats" => Command::Stats,
        ":quit" | ":exit" => Command::Quit,
        _ => Command::Source,
    }
}

pub fn run_repl(config: InterpreterConfig) {
    println!("minischeme interactive session");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize the line editor: {e}");
            return;
        }
    };
    let mut interp = Interpreter::new(config);
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match classify(trimmed) {
                        Command::Help => {
                            print_help();
                            continue;
                        }
                        Command::Env => {
                            print_environment(&interp);
                            continue;
                        }
                        Command::Stats => {
                            println!("{:?}", interp.arena().stats());
                            continue;
                        }
                        Command::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        Command::Source => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                pending.push_str(&line);
                pending.push('\n');

                let mut out = Vec::new();
                let result = interp.run_source(&pending, &mut out);
                if matches!(
                    result.as_ref().err().and_then(|e| e.parse_error_kind()),
                    Some(ParseErrorKind::Unterminated)
                ) {
                    continue;
                }
                pending.clear();

                print!("{}", String::from_utf8_lossy(&out));
                if let Err(e) = result {
                    println!("{e}");
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    log::debug!("session ended: {:?}", interp.arena().stats());
}

fn print_help() {
    println!("Commands:");
    println!("  :help   - Show this help message");
    println!("  :env    - Show global bindings");
    println!("  :stats  - Show arena allocation counts");
    println!("  :quit   - Exit the interpreter");
    println!("  :exit   - Exit the interpreter");
    println!("  Ctrl+D  - Exit the interpreter");
    println!("  Ctrl+C  - Discard an unfinished multi-line input, or exit");
    println!();
    println!("Special forms:");
    println!("  quote if define let let* letrec set! set-car! set-cdr! lambda cond and or");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))");
    println!();
}

fn print_environment(interp: &Interpreter) {
    let bindings = interp.global_bindings();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();
    for binding in bindings {
        if binding.builtin {
            builtins.push(binding.name);
        } else {
            user_defined.push((binding.name, binding.rendered));
        }
    }

    if !builtins.is_empty() {
        println!("Primitives ({}):", builtins.len());
        let mut col = 0;
        for name in builtins.iter().rev() {
            print!("  {name:<10}");
            col += 1;
            if col % 6 == 0 {
                println!();
            }
        }
        if col % 6 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
