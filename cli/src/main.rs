use std::path::{Path, PathBuf};

use anyhow::Context;
use argot_core::{
    BoundArgs, CliError, CommandTree, Dispatcher, Execute, ParseFailure, Parser as ArgParser,
    ParserOptions, TreeManifest,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

/// Exit code for token lines the tree rejects.
const EXIT_PARSE_FAILURE: i32 = 2;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "argot", version)]
#[command(about = "Parse and dispatch command lines against a command tree manifest")]
struct Cli {
    /// Enable debug logging on stderr (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse tokens against a tree and print the outcome.
    Parse(ParseArgs),
    /// Parse tokens and dispatch them to an echo executor.
    Run(RunArgs),
    /// Build a tree manifest and report structural errors.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Command tree manifest (YAML, or JSON by extension).
    #[arg(long)]
    tree: PathBuf,
    /// Parser options file overriding the manifest's `parser` section.
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    source: TreeArgs,
    /// Output format for the outcome.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// Tokens to parse, after `--`.
    #[arg(last = true)]
    tokens: Vec<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    source: TreeArgs,
    /// Tokens to parse and dispatch, after `--`.
    #[arg(last = true)]
    tokens: Vec<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Command tree manifest (YAML, or JSON by extension).
    #[arg(long)]
    tree: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Run(args) => run_run(args),
        Command::Check(args) => run_check(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Prints the command path and bound fields of whatever it runs.
struct Echo {
    command: String,
}

impl Execute<BoundArgs> for Echo {
    fn execute(&self, args: &BoundArgs) -> anyhow::Result<i32> {
        let line = serde_json::to_string(&serde_json::json!({
            "command": self.command,
            "args": args,
        }))?;
        println!("{line}");
        Ok(0)
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<TreeManifest> {
    TreeManifest::load(path).with_context(|| format!("Failed to load tree '{}'", path.display()))
}

fn parser_options(manifest: &TreeManifest, args: &TreeArgs) -> anyhow::Result<ParserOptions> {
    match &args.options {
        Some(path) => ParserOptions::load(path)
            .with_context(|| format!("Failed to load options '{}'", path.display())),
        None => Ok(manifest.parser.clone()),
    }
}

fn build_parser(tree: CommandTree, options: ParserOptions) -> anyhow::Result<ArgParser> {
    ArgParser::new(tree, options).context("Failed to prepare parser")
}

fn report_failure(failure: &ParseFailure) {
    for error in failure.errors() {
        eprintln!("error: [{:?}] {}", error.kind, error.message);
    }
}

// ---------------------------------------------------------------------------
// parse command
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OutcomeReport<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a BoundArgs>,
    #[serde(skip_serializing_if = "no_errors")]
    errors: &'a [CliError],
}

fn no_errors(errors: &&[CliError]) -> bool {
    errors.is_empty()
}

fn run_parse(args: ParseArgs) -> anyhow::Result<i32> {
    let manifest = load_manifest(&args.source.tree)?;
    let options = parser_options(&manifest, &args.source)?;
    let parser = build_parser(manifest.build()?, options)?;
    debug!(tokens = ?args.tokens, "Parsing tokens");

    let outcome = parser.parse(&args.tokens);
    let report = match &outcome {
        Ok(invocation) => OutcomeReport {
            success: true,
            command: Some(invocation.command()),
            args: Some(invocation.args()),
            errors: &[],
        },
        Err(failure) => OutcomeReport {
            success: false,
            command: None,
            args: None,
            errors: failure.errors(),
        },
    };

    match args.format {
        CliOutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        CliOutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
    }
    Ok(if outcome.is_ok() { 0 } else { EXIT_PARSE_FAILURE })
}

// ---------------------------------------------------------------------------
// run command
// ---------------------------------------------------------------------------

fn run_run(args: RunArgs) -> anyhow::Result<i32> {
    let manifest = load_manifest(&args.source.tree)?;
    let options = parser_options(&manifest, &args.source)?;
    let tree = manifest.build_with(|path, _, node| {
        node.executor::<BoundArgs, _>(Echo {
            command: path.to_string(),
        })
    })?;
    let parser = build_parser(tree, options)?;

    let invocation = match parser.parse(&args.tokens) {
        Ok(invocation) => invocation,
        Err(failure) => {
            report_failure(&failure);
            return Ok(EXIT_PARSE_FAILURE);
        }
    };
    info!(command = %invocation.command(), "Dispatching");
    let code = Dispatcher::new().execute(&invocation)?;
    Ok(code)
}

// ---------------------------------------------------------------------------
// check command
// ---------------------------------------------------------------------------

fn run_check(args: CheckArgs) -> anyhow::Result<i32> {
    let manifest = load_manifest(&args.tree)?;
    let parser = build_parser(manifest.build()?, manifest.parser.clone())?;
    let commands = parser.tree().len();
    println!("ok: {} ({commands} commands)", args.tree.display());
    Ok(0)
}
