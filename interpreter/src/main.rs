use anyhow::{anyhow, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rill_lib::compiler::{self, CompilationError};
use rill_lib::core::{render, Token};
use rill_lib::parser;
use rill_lib::scanner;
use rill_lib::vm::{self, base};

use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// script to compile; opens a repl when omitted
    script: Option<PathBuf>,

    /// execute the program instead of printing its instruction listing
    #[arg(short, long)]
    run: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 't', long)]
    show_tokens: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'a', long)]
    show_ast: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let script = match &cli.script {
        Some(script) => script.clone(),
        None => return repl(),
    };
    let src = std::fs::read_to_string(script)?;
    match run_source(&src, &cli) {
        Ok(()) => Ok(()),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}

fn run_source(src: &str, cli: &Cli) -> Result<()> {
    let tokens = scanner::scan(src)?;
    #[cfg(feature = "dev")]
    if cli.show_tokens {
        println!("{:#?}", tokens);
        return Ok(());
    }

    let program = parser::parse(&tokens)?;
    #[cfg(feature = "dev")]
    if cli.show_ast {
        println!("{:#?}", program);
        return Ok(());
    }

    let code = compiler::generate(&program, &base::base_table())
        .map_err(|error| locate(error, &tokens))?;
    if cli.run {
        let mut evaluator = vm::Evaluator::new(vm::Module::Generated(code));
        evaluator.register(base::BASE_MODULE, base::base_module());
        evaluator.run()?;
    } else {
        print!("{}", render(&code));
    }
    Ok(())
}

/// Attach source coordinates to a lowering error, which only knows token
/// indices.
fn locate(error: CompilationError, tokens: &[Token]) -> anyhow::Error {
    let CompilationError::UndefinedSymbol {
        tokens: ref range, ..
    } = error;
    match tokens.get(range.start) {
        Some(token) => anyhow!(
            "{} at line {}, column {}",
            error,
            token.span.start_line,
            token.span.start_col
        ),
        None => anyhow!("{}", error),
    }
}

fn repl() -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("rill> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(&line);
                match compile_line(&line) {
                    Ok(listing) => print!("{}", listing),
                    Err(error) => eprintln!("{}", error),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(error) => return Err(error.into()),
        }
    }
}

fn compile_line(line: &str) -> Result<String> {
    let tokens = scanner::scan(line)?;
    let program = parser::parse(&tokens)?;
    let code = compiler::generate(&program, &base::base_table())
        .map_err(|error| locate(error, &tokens))?;
    Ok(render(&code))
}
