use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use starbridge::{
    DialectUpdate, EvalOptions, Evaluated, ExecOptions, Session, Value, configure, render_error,
};
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

/// Starbridge - run Starlark configuration programs
#[derive(Parser, Debug)]
#[command(name = "starbridge")]
#[command(about = "Execute a Starlark file and evaluate expressions", long_about = None)]
struct Args {
    /// Program to execute (reads stdin when neither FILE nor -e is given)
    file: Option<String>,

    /// Expression to evaluate after the program; its repr is printed
    #[arg(short, long = "eval", value_name = "EXPR")]
    eval: Vec<String>,

    /// Cancel each program or expression after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Allow the `set` builtin
    #[arg(long)]
    allow_set: bool,

    /// Allow recursion and `while` loops
    #[arg(long)]
    allow_recursion: bool,

    /// Allow rebinding top-level names
    #[arg(long)]
    allow_global_reassign: bool,

    /// Predeclare a global; VALUE is read as a Starlark literal, or as a
    /// string when it does not parse as one
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,
}

fn parse_assignment(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", arg)),
    }
}

/// A literal such as `3`, `[1, 2]` or `"x"`, evaluated in a throwaway session.
fn parse_value(text: &str) -> Value {
    Session::new()
        .eval(text)
        .unwrap_or_else(|_| Value::from(text))
}

fn timeout(args: &Args) -> Result<Option<Duration>> {
    args.timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .into_diagnostic()
                .wrap_err_with(|| format!("invalid --timeout {}", secs))
        })
        .transpose()
}

fn run(args: Args) -> Result<ExitCode> {
    let timeout = timeout(&args)?;

    let mut update = DialectUpdate::new();
    if args.allow_set {
        update = update.allow_set(true);
    }
    if args.allow_recursion {
        update = update.allow_recursion(true);
    }
    if args.allow_global_reassign {
        update = update.allow_global_reassign(true);
    }
    let dialect = configure(update);
    tracing::debug!(?dialect, "Dialect configured");

    let globals = args
        .set
        .iter()
        .map(|(name, text)| (name.clone(), parse_value(text)));
    let session = Session::builder()
        .globals(globals)
        .build()
        .into_diagnostic()
        .wrap_err("cannot predeclare globals")?;

    let program = match &args.file {
        Some(path) => Some((
            path.clone(),
            std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("cannot read {}", path))?,
        )),
        None if args.eval.is_empty() => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .into_diagnostic()
                .wrap_err("cannot read stdin")?;
            Some(("<stdin>".to_string(), source))
        }
        None => None,
    };

    if let Some((filename, source)) = program {
        let options = ExecOptions {
            filename: Some(filename),
            timeout,
            ..ExecOptions::default()
        };
        if let Err(e) = session.exec_with(&source, options) {
            render_error(&e, &source);
            return Ok(ExitCode::FAILURE);
        }
    }

    for expr in &args.eval {
        let options = EvalOptions {
            timeout,
            convert: false,
            ..EvalOptions::default()
        };
        match session.eval_with(expr, options) {
            Ok(Evaluated::Repr(repr)) => println!("{}", repr),
            Ok(Evaluated::Value(value)) => println!("{:?}", value),
            Err(e) => {
                render_error(&e, expr);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    use tracing_subscriber::{EnvFilter, fmt};

    // STARBRIDGE_LOG takes precedence over RUST_LOG; default to WARN.
    let filter = EnvFilter::try_from_env("STARBRIDGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run(args)
}
