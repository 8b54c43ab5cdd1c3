use std::io::{self, BufRead, Write};
use std::process;

use psh::cli::{self, CliArgs};
use psh::{eval, logging, parser, EvalResult, State};

const PROMPT: &str = "psh> ";

enum LineResult {
    Status(i32),
    Exit(i32),
}

fn main() {
    let args = cli::parse();
    match run_main(args) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("psh: {err:?}");
            process::exit(2);
        }
    }
}

fn run_main(args: CliArgs) -> anyhow::Result<i32> {
    logging::init_logging(args.log_level)?;
    let mut state = State::new();
    Ok(match args.command {
        Some(line) => match eval_line(&mut state, &line) {
            LineResult::Status(code) | LineResult::Exit(code) => code,
        },
        None => repl(&mut state),
    })
}

fn repl(state: &mut State) -> i32 {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut last_status = 0;
    loop {
        print!("{}", PROMPT);
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("psh: {}", e);
                break;
            }
        }
        match eval_line(state, &line) {
            LineResult::Status(code) => last_status = code,
            LineResult::Exit(code) => return code,
        }
    }
    last_status
}

fn eval_line(state: &mut State, line: &str) -> LineResult {
    if line.trim().is_empty() {
        return LineResult::Status(0);
    }
    let pipeline = match parser::parse(line) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("psh: {}", e);
            return LineResult::Status(2);
        }
    };
    match eval::eval(state, &pipeline) {
        Ok(EvalResult::Done(status)) => LineResult::Status(status.code()),
        Ok(EvalResult::Exit(code)) => LineResult::Exit(code),
        Err(e) => {
            eprintln!("psh: {}", e);
            LineResult::Status(2)
        }
    }
}
