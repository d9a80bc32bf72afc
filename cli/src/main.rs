mod summary;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;

use interpreter::ReplBackend;
use litbook::backend::CommandBackend;
use litbook::build::discover::discover_documents;
use litbook::{Backend, BackendConfig, BuildConfig, BuildReport, ConfigFile, Document};

/// Looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "litbook.toml";

/// Exit code for problems that stop a build before any document runs.
const EXIT_SETUP: i32 = 2;

#[derive(Parser)]
#[command(name = "litbook", version, about = "Compile literate Markdown by executing its code blocks")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile every document under the input root
    Build(BuildArgs),

    /// Parse documents without executing them
    Check(CheckArgs),

    /// List the code segments of a document
    Blocks(BlocksArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Input root (overrides `input` in the config file)
    input: Option<PathBuf>,

    /// Output root (overrides `output` in the config file)
    output: Option<PathBuf>,

    /// Config file [default: ./litbook.toml when present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of documents compiled in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Cancel the rest of the build at the first failing document
    #[arg(long, conflicts_with = "fail_slow")]
    fail_fast: bool,

    /// Compile every document and report all failures
    #[arg(long)]
    fail_slow: bool,

    /// Per-segment execution timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Width at which rendered output lines are wrapped
    #[arg(long)]
    width: Option<usize>,

    /// Reuse outputs of documents whose source has not changed
    #[arg(long)]
    incremental: bool,

    /// Write a JSON build report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Document or directory of documents
    path: PathBuf,

    /// Config file [default: ./litbook.toml when present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fence language treated as executable [default: the configured backend's]
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(clap::Args)]
struct BlocksArgs {
    /// Document to inspect
    file: PathBuf,

    /// Config file [default: ./litbook.toml when present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fence language treated as executable [default: the configured backend's]
    #[arg(short, long)]
    language: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => do_build(args, cli.no_color),
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Blocks(args) => do_blocks(args, cli.no_color),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(EXIT_SETUP);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn do_build(args: BuildArgs, no_color: bool) -> Result<i32> {
    let config = resolve_config(args)?;
    debug!(
        input = %config.input.display(),
        output = %config.output.display(),
        jobs = config.jobs,
        "resolved build config"
    );

    let report = run_build(&config)?;
    summary::print_report(&report, no_color);
    Ok(report.exit_code())
}

fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    Ok(match path {
        Some(path) => ConfigFile::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => ConfigFile::load(Path::new(DEFAULT_CONFIG))?,
        None => ConfigFile::default(),
    })
}

/// Config file first, command-line flags on top.
fn resolve_config(args: BuildArgs) -> Result<BuildConfig> {
    let base = load_config_file(args.config.as_deref())?;

    let fail_fast = match (args.fail_fast, args.fail_slow) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let overrides = ConfigFile {
        input: args.input,
        output: args.output,
        jobs: args.jobs,
        fail_fast,
        timeout_ms: args.timeout_ms,
        width: args.width,
        incremental: args.incremental.then_some(true),
        report: args.report,
        extensions: None,
        backend: None,
    };

    Ok(base.merge(overrides).resolve()?)
}

fn run_build(config: &BuildConfig) -> Result<BuildReport> {
    let report = match &config.backend {
        BackendConfig::Builtin => litbook::build(config, &ReplBackend::new()),
        BackendConfig::Command {
            command,
            language,
            comment_prefix,
        } => {
            let backend = CommandBackend::new(command.clone(), language.clone(), comment_prefix.clone());
            litbook::build(config, &backend)
        }
    };
    report.context("build aborted")
}

/// Fence language and document extensions for the commands that only parse.
fn parse_settings(config: Option<&Path>, language: Option<String>) -> Result<(String, Vec<String>)> {
    let file = load_config_file(config)?;
    let language = match (language, &file.backend) {
        (Some(language), _) => language,
        (None, Some(BackendConfig::Command { language, .. })) => language.clone(),
        (None, _) => ReplBackend::new().language().to_string(),
    };
    let extensions = file
        .extensions
        .unwrap_or_else(|| vec!["md".to_string()])
        .into_iter()
        .map(|e| e.trim_start_matches('.').to_string())
        .collect();
    Ok((language, extensions))
}

fn do_check(args: CheckArgs, no_color: bool) -> Result<i32> {
    let (language, extensions) = parse_settings(args.config.as_deref(), args.language)?;
    let paths = if args.path.is_dir() {
        discover_documents(&args.path, &extensions, None)?
            .into_iter()
            .map(|relative| args.path.join(relative))
            .collect()
    } else {
        vec![args.path.clone()]
    };

    let mut failed = 0;
    for path in &paths {
        if parse_document(path, &language, no_color)?.is_none() {
            failed += 1;
        }
    }

    if failed == 0 {
        eprintln!("ok: {} document(s) parsed successfully", paths.len());
        Ok(0)
    } else {
        eprintln!("error: {} of {} document(s) failed to parse", failed, paths.len());
        Ok(1)
    }
}

fn do_blocks(args: BlocksArgs, no_color: bool) -> Result<i32> {
    let (language, _) = parse_settings(args.config.as_deref(), args.language)?;
    let Some(document) = parse_document(&args.file, &language, no_color)? else {
        return Ok(1);
    };

    for code in document.code_segments() {
        let mode = if code.is_executable() {
            code.mode.as_str()
        } else {
            "-"
        };
        println!(
            "{:>5}  {:<10} {:<9} {} line(s)",
            code.line,
            code.language,
            mode,
            code.code.lines().count()
        );
    }
    Ok(0)
}

/// Parse one document, printing diagnostics for every parse error.
/// `Ok(None)` means the document is malformed.
fn parse_document(path: &Path, language: &str, no_color: bool) -> Result<Option<Document>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source.clone());

    let parser = litbook::parser::Parser::new(path, source, language).with_file_id(file_id);
    match parser.parse() {
        Ok(document) => {
            debug!(
                document = %path.display(),
                segments = document.code_segment_count(),
                "parsed"
            );
            Ok(Some(document))
        }
        Err(errors) => {
            let writer = StandardStream::stderr(color_choice(no_color));
            let config = term::Config::default();
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            }
            Ok(None)
        }
    }
}
