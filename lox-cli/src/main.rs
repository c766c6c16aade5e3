mod completer;
mod report;
mod state;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use env_logger::{Builder, Env};
use log::{LevelFilter, debug, info};
use lox::{ErrorTier, Lox, LoxError, Parser, Runner};
use rustyline::Editor;
use rustyline::error::ReadlineError;

use completer::LoxHelper;
use report::report_error;
use state::ReplState;

/// Unreadable input file.
const EXIT_NO_INPUT: u8 = 66;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs a file as a Lox program
    Run { file: PathBuf },

    /// Prints each token of a file
    Tokenize { file: PathBuf },

    /// Parses a file and prints its syntax tree
    Parse { file: PathBuf },

    /// Evaluates a file as a single expression and prints the result
    Evaluate { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    info!("CLI arguments: {:?}", cli);

    let Some(command) = cli.command else {
        return match run_repl(&mut Lox::interactive()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    };

    let (Command::Run { file }
    | Command::Tokenize { file }
    | Command::Parse { file }
    | Command::Evaluate { file }) = &command;
    let source = match read_source(file) {
        Ok(source) => source,
        Err(e) => {
            report_error(&e, "", None, io::stderr());
            return ExitCode::from(EXIT_NO_INPUT);
        }
    };
    let filename = file.to_string_lossy();

    let errors = match command {
        Command::Run { .. } => run_file(&mut Lox::new(), &source),
        Command::Tokenize { .. } => tokenize(&source),
        Command::Parse { .. } => parse(&source),
        Command::Evaluate { .. } => evaluate(&source),
    };

    for error in &errors {
        report_error(error, &source, Some(&filename), io::stderr());
    }
    ExitCode::from(exit_status(&errors))
}

fn init_logger(verbose: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("off"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn read_source(path: &Path) -> Result<String, LoxError> {
    info!("Reading file: {:?}", path);
    let source = fs::read_to_string(path)?;
    debug!("Read {} bytes from {:?}", source.len(), path);
    Ok(source)
}

/// Compile errors take precedence over runtime errors. Output failures
/// while running count as runtime errors.
fn exit_status(errors: &[LoxError]) -> u8 {
    let tiers: Vec<ErrorTier> = errors
        .iter()
        .filter_map(|error| match error {
            LoxError::Io(_) => Some(ErrorTier::Runtime),
            error => error.tier(),
        })
        .collect();
    if tiers.contains(&ErrorTier::Compile) {
        ErrorTier::Compile.exit_code()
    } else if tiers.contains(&ErrorTier::Runtime) {
        ErrorTier::Runtime.exit_code()
    } else {
        0
    }
}

fn run_file<R: Runner>(runner: &mut R, source: &str) -> Vec<LoxError> {
    let stdout = io::stdout();
    runner.run(source, stdout.lock()).err().unwrap_or_default()
}

fn tokenize(source: &str) -> Vec<LoxError> {
    let (tokens, errors) = lox::tokenize(source);
    let mut stdout = io::stdout().lock();
    for token in &tokens {
        writeln!(stdout, "{}", token).ok();
    }
    errors
}

fn parse(source: &str) -> Vec<LoxError> {
    let (tokens, mut errors) = lox::tokenize(source);
    let mut parser = Parser::new(tokens, 0);
    let statements = parser.parse();
    errors.extend(parser.take_errors());
    if !errors.is_empty() {
        return errors;
    }

    let mut stdout = io::stdout().lock();
    for statement in &statements {
        writeln!(stdout, "{}", statement).ok();
    }
    errors
}

fn evaluate(source: &str) -> Vec<LoxError> {
    let mut stdout = io::stdout().lock();
    match Lox::new().evaluate(source, &mut stdout) {
        Ok(value) => {
            writeln!(stdout, "{}", value).ok();
            Vec::new()
        }
        Err(errors) => errors,
    }
}

fn run_repl<R: Runner>(runner: &mut R) -> Result<(), ReadlineError> {
    let mut rl: Editor<LoxHelper, _> = Editor::with_config(rustyline::Config::default())?;
    rl.set_helper(Some(LoxHelper::new()));
    if let Some(helper) = rl.helper() {
        helper.set_variables(runner.variable_names());
    }
    let mut state = ReplState::new();

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                if state.process_line(&line) {
                    let buffer = state.take_buffer();
                    let source = if ReplState::should_auto_print(&buffer) {
                        ReplState::wrap_for_print(&buffer)
                    } else {
                        buffer
                    };
                    if let Err(errors) = runner.run(&source, io::stdout()) {
                        for error in &errors {
                            report_error(error, &source, None, io::stderr());
                        }
                    }

                    if let Some(helper) = rl.helper() {
                        helper.set_variables(runner.variable_names());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                if state.is_empty() {
                    break;
                }
                state.cancel();
                println!();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }

    Ok(())
}
