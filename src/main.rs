use std::{
    env, fs,
    io::{self, BufRead, Write},
    process,
};

use cse::{
    postfix::{PostfixLanguage, block_depth, split_chunks},
    runtime::{
        error::EvalError,
        value::TypedValue,
        vm::{CompletionState, CseEvaluator, EvaluatorConfig},
    },
};

struct CliOptions {
    config: EvaluatorConfig,
    /// Set when `--step-limit` was given; otherwise chunks run to completion.
    bounded: bool,
    json: bool,
    digest: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args: Vec<String> = env::args().collect();
    let options = match extract_options(&mut args) {
        Some(options) => options,
        None => process::exit(2),
    };

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => print_help(),
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: cse run <file>");
                process::exit(2);
            }
            if !run_file(&args[2], &options) {
                process::exit(1);
            }
        }
        "repl" => repl(&options),
        other => {
            eprintln!("Error: unknown command {}", other);
            print_help();
            process::exit(2);
        }
    }
}

fn print_help() {
    println!(
        "\
CSE machine CLI

Usage:
  cse run <file>
  cse repl

Flags:
  --trace              Print each executed instruction with the stash and frame
  --step-limit <n>     Stop each chunk after n steps (default: run to completion)
  --gc-threshold <n>   Allocations between mark-and-sweep passes (default: 1024)
  --no-gc              Disable automatic mark-and-sweep
  --json               Print the final machine snapshot as JSON
  --digest             Print the SHA-256 digest of the final machine snapshot

Environment:
  RUST_LOG             Log filter (default: warn)
"
    );
}

fn extract_options(args: &mut Vec<String>) -> Option<CliOptions> {
    let mut config = EvaluatorConfig::default();
    let trace = take_flag(args, "--trace");
    let no_gc = take_flag(args, "--no-gc");
    let json = take_flag(args, "--json");
    let digest = take_flag(args, "--digest");
    let step_limit = take_value(args, "--step-limit")?;
    let gc_threshold = take_value(args, "--gc-threshold")?;

    config.trace = trace;
    config.gc_enabled = !no_gc;
    if let Some(threshold) = gc_threshold {
        config.gc_threshold = threshold;
    }
    let bounded = step_limit.is_some();
    if let Some(limit) = step_limit {
        config.step_limit = limit;
    }
    Some(CliOptions {
        config,
        bounded,
        json,
        digest,
    })
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let present = args.iter().any(|arg| arg == flag);
    if present {
        args.retain(|arg| arg != flag);
    }
    present
}

/// Removes `flag <n>` from `args`. The outer `None` means a usage error was
/// already reported.
fn take_value(args: &mut Vec<String>, flag: &str) -> Option<Option<usize>> {
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: cse run <file> {} <n>", flag);
                return None;
            }
            let raw = args.remove(i + 1);
            args.remove(i);
            match raw.parse::<usize>() {
                Ok(parsed) => value = Some(parsed),
                Err(_) => {
                    eprintln!("Error: {} expects a non-negative integer.", flag);
                    return None;
                }
            }
            continue;
        }
        i += 1;
    }
    Some(value)
}

fn new_evaluator(options: &CliOptions) -> CseEvaluator<PostfixLanguage> {
    CseEvaluator::with_config(PostfixLanguage::new(), options.config.clone())
}

/// Evaluates one chunk and returns its settled outcome.
fn evaluate(
    evaluator: &mut CseEvaluator<PostfixLanguage>,
    chunk: &str,
    options: &CliOptions,
) -> Result<Option<TypedValue>, EvalError> {
    let completion = evaluator.evaluate_chunk(chunk);
    if completion.is_pending() && !options.bounded {
        evaluator.run_to_completion(None);
    }
    match completion.state() {
        CompletionState::Resolved(value) => Ok(value),
        CompletionState::Rejected(err) => Err(err),
        CompletionState::Pending => Err(EvalError::Evaluator(format!(
            "chunk still running after {} steps",
            options.config.step_limit
        ))),
    }
}

fn print_value(value: Option<TypedValue>) {
    if let Some(value) = value {
        println!("{}", value);
    }
}

fn run_file(path: &str, options: &CliOptions) -> bool {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading {}: {}", path, err);
            return false;
        }
    };

    let mut evaluator = new_evaluator(options);
    let mut ok = true;
    for chunk in split_chunks(&source) {
        match evaluate(&mut evaluator, &chunk, options) {
            Ok(value) => print_value(value),
            Err(err) => {
                eprintln!("error: {}", err);
                ok = false;
                break;
            }
        }
    }
    report_state(&evaluator, options) && ok
}

fn report_state(evaluator: &CseEvaluator<PostfixLanguage>, options: &CliOptions) -> bool {
    let mut ok = true;
    if options.json {
        ok &= print_json(evaluator);
    }
    if options.digest {
        match evaluator.snapshot().digest() {
            Ok(digest) => println!("digest: {}", digest),
            Err(err) => {
                eprintln!("Error hashing snapshot: {}", err);
                ok = false;
            }
        }
    }
    ok
}

fn print_json(evaluator: &CseEvaluator<PostfixLanguage>) -> bool {
    match evaluator.snapshot().to_json() {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(err) => {
            eprintln!("Error serialising snapshot: {}", err);
            false
        }
    }
}

fn repl(options: &CliOptions) {
    println!(
        "CSE REPL v{} (type :help for help, :quit to exit)",
        env!("CARGO_PKG_VERSION")
    );

    let mut evaluator = new_evaluator(options);
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    loop {
        print!("cse> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let Some(input) = read_repl_input(&mut reader) else {
            break;
        };

        match input.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":help" | ":h" => {
                print_repl_help();
                continue;
            }
            ":state" => {
                print_json(&evaluator);
                continue;
            }
            _ => {}
        }

        match evaluate(&mut evaluator, &input, options) {
            Ok(value) => print_value(value),
            Err(err) => eprintln!("error: {}", err),
        }
    }
    report_state(&evaluator, options);
}

fn print_repl_help() {
    println!(
        "\
Commands:
  :help, :h     Show this help
  :state        Print the machine snapshot as JSON
  :quit, :q     Exit"
    );
}

/// Reads one chunk, continuing over lines while an `if` or `fn` is open.
fn read_repl_input(reader: &mut impl BufRead) -> Option<String> {
    let mut input = String::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => {
                return if input.is_empty() { None } else { Some(input) };
            }
            Ok(_) => {
                input.push_str(&line);
                if block_depth(&input) <= 0 {
                    return Some(input);
                }
                print!("  ... ");
                if io::stdout().flush().is_err() {
                    return Some(input);
                }
            }
        }
    }
}

