use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
    process::exit,
};

use anyhow::anyhow;
use clap::Parser as _;
use interpreter::{InterpretError, Interpreter};
use log::info;
use parser::Parser;

#[derive(clap::Parser)]
#[command(version, about = "Tree-walking interpreter for Lox")]
struct Args {
    /// Script to run. Starts an interactive prompt when omitted.
    file: Option<PathBuf>,

    /// Print the parsed program instead of running it.
    #[arg(long)]
    print_ast: bool,

    /// Print the scanned tokens instead of running the program.
    #[arg(long, conflicts_with = "print_ast")]
    print_tokens: bool,
}

// Exit codes from sysexits.h
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

fn run_file(path: PathBuf, args: &Args, interpreter: &mut Interpreter) -> anyhow::Result<()> {
    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {e}", path.display());
            exit(EX_IOERR);
        }
    };

    if let Err(e) = run(&source, args, interpreter) {
        eprintln!("{}", report(&e));
        exit(match e {
            InterpretError::RuntimeError(_) => EX_SOFTWARE,
            InterpretError::ScanError(_) | InterpretError::CompileError(_) => EX_DATAERR,
        });
    }
    Ok(())
}

fn run_prompt(args: &Args, interpreter: &mut Interpreter) -> anyhow::Result<()> {
    loop {
        print!("> ");
        stdout().flush()?;
        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            // Ctrl-D
            println!();
            return Ok(());
        }
        if let Err(e) = run(&line, args, interpreter) {
            eprintln!("{}", report(&e));
        }
    }
}

fn run(source: &str, args: &Args, interpreter: &mut Interpreter) -> Result<(), InterpretError> {
    if args.print_tokens {
        for token in scanner::scan(source)? {
            println!("{:>4} {:<12} '{}'", token.line, token.ty(), token.lexeme);
        }
        return Ok(());
    }

    if args.print_ast {
        for stmt in Parser::new(scanner::scan(source)?).parse()? {
            println!("{stmt}");
        }
        return Ok(());
    }

    interpreter.run_source(source, &mut stdout())
}

fn report(error: &InterpretError) -> String {
    match error {
        InterpretError::RuntimeError(e) => format!("{e}\n[line {}]", e.line),
        e => e.to_string(),
    }
}

fn run_session(args: Args) -> anyhow::Result<()> {
    let mut interpreter = Interpreter::new();

    match args.file.clone() {
        Some(file) => {
            info!("Running {}", file.display());
            run_file(file, &args, &mut interpreter)
        }
        None => run_prompt(&args, &mut interpreter),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let session = std::thread::Builder::new()
        .name("interpreter".to_string())
        .stack_size(interpreter::STACK_SIZE)
        .spawn(move || run_session(args))?;

    session.join().map_err(|_| anyhow!("Interpreter thread panicked"))?
}
