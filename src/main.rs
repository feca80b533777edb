use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use grokline::{
    ErrorStrategy, GrokConfig, GrokFilterConfig, NoMatchPolicy, OverwritePolicy, PatternCompiler,
    PatternRegistry, PipelineConfig, StreamPipeline, UnknownPatternPolicy,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OverwriteArg {
    Allow,
    KeepFirst,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NoMatchArg {
    Ignore,
    Tag,
}

#[derive(Parser)]
#[command(name = "grokline")]
#[command(about = "Extract structured fields from text lines with grok patterns")]
#[command(version)]
struct Args {
    /// Grok expressions, tried in order (e.g. '%{IP:client} %{WORD:verb}')
    #[arg(value_name = "EXPRESSION")]
    expressions: Vec<String>,

    /// Additional grok expressions
    #[arg(short = 'p', long = "pattern", action = ArgAction::Append)]
    extra_expressions: Vec<String>,

    /// YAML configuration describing patterns and filters
    #[arg(short = 'c', long = "config")]
    config_file: Option<PathBuf>,

    /// File of NAME BODY pattern definitions (repeatable)
    #[arg(long = "patterns-file", action = ArgAction::Append)]
    patterns_files: Vec<PathBuf>,

    /// Directory of pattern files, read recursively (repeatable)
    #[arg(long = "patterns-dir", action = ArgAction::Append)]
    patterns_dirs: Vec<PathBuf>,

    /// Start from an empty registry instead of the built-in patterns
    #[arg(long)]
    no_base_patterns: bool,

    /// Field to match expressions against
    #[arg(long, default_value = "message")]
    source: String,

    /// What happens when a field already exists
    #[arg(long, value_enum, default_value = "allow")]
    overwrite: OverwriteArg,

    /// What happens to lines no expression matches
    #[arg(long, value_enum, default_value = "ignore")]
    on_no_match: NoMatchArg,

    /// Drop unknown pattern references instead of failing
    #[arg(long)]
    lenient: bool,

    /// Maximum nesting of pattern references
    #[arg(long)]
    max_depth: Option<usize>,

    /// Match batches of lines in parallel
    #[arg(long)]
    parallel: bool,

    /// Add path and line_number fields to every event
    #[arg(long)]
    source_fields: bool,

    /// Print the registered patterns and exit
    #[arg(long)]
    list_patterns: bool,

    /// Debug mode - show processing details
    #[arg(long)]
    debug: bool,

    /// Fail on first error instead of skipping lines
    #[arg(long)]
    fail_fast: bool,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// Input file (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,
}

impl Args {
    fn all_expressions(&self) -> Vec<String> {
        let mut all = self.expressions.clone();
        all.extend(self.extra_expressions.iter().cloned());
        all
    }

    /// Merge the config file (if any) with command-line options
    fn grok_config(&self) -> Result<GrokConfig> {
        let mut config = match &self.config_file {
            Some(path) => GrokConfig::from_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?,
            None => GrokConfig::default(),
        };

        config.patterns_dir.extend(self.patterns_files.iter().cloned());
        config.patterns_dir.extend(self.patterns_dirs.iter().cloned());
        if self.lenient {
            config.unknown_patterns = UnknownPatternPolicy::Lenient;
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }

        let expressions = self.all_expressions();
        if !expressions.is_empty() {
            config.filters.push(GrokFilterConfig {
                source: self.source.clone(),
                patterns: expressions,
                on_no_match: match self.on_no_match {
                    NoMatchArg::Ignore => NoMatchPolicy::Ignore,
                    NoMatchArg::Tag => NoMatchPolicy::Tag,
                },
                overwrite: match self.overwrite {
                    OverwriteArg::Allow => OverwritePolicy::Allow,
                    OverwriteArg::KeepFirst => OverwritePolicy::KeepFirst,
                },
                ..GrokFilterConfig::default()
            });
        }

        Ok(config)
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let grok_config = args.grok_config()?;

    let mut registry = if args.no_base_patterns {
        PatternRegistry::new()
    } else {
        PatternRegistry::with_base_patterns()
    };
    grok_config
        .extend_registry(&mut registry)
        .context("Failed to load additional patterns")?;

    if args.list_patterns {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for name in registry.names() {
            writeln!(out, "{} {}", name, registry.lookup(name).unwrap_or_default())?;
        }
        return Ok(());
    }

    if grok_config.filters.is_empty() {
        bail!("Must provide grok expressions or a --config file with filters");
    }

    // Compile everything up front; the registry stays frozen from here on
    let compiler = PatternCompiler::with_options(&registry, grok_config.compiler_options());
    let chain = grok_config
        .build_chain(&compiler)
        .context("Failed to compile grok filters")?;

    let config = PipelineConfig {
        error_strategy: if args.fail_fast {
            ErrorStrategy::FailFast
        } else {
            ErrorStrategy::Skip
        },
        max_line_length: args.max_line_length,
        parallel: args.parallel,
        add_source_fields: args.source_fields,
        ..PipelineConfig::default()
    };
    let mut pipeline = StreamPipeline::new(config, chain);

    // Set up input
    let input_filename = args
        .input_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let input: Box<dyn BufRead> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path)
            .with_context(|| format!("Failed to open input file '{}'", input_path.display()))?;
        Box::new(BufReader::with_capacity(args.buffer_size, file))
    } else {
        Box::new(BufReader::with_capacity(args.buffer_size, io::stdin()))
    };

    // Set up output
    let mut output: Box<dyn Write> = if let Some(output_path) = &args.output_file {
        let file = File::create(output_path)
            .with_context(|| format!("Failed to create output file '{}'", output_path.display()))?;
        Box::new(io::BufWriter::with_capacity(args.buffer_size, file))
    } else {
        Box::new(io::BufWriter::with_capacity(args.buffer_size, io::stdout()))
    };

    let stats = pipeline
        .process_stream(input, &mut output, input_filename.as_deref())
        .context("Processing failed")?;

    match output.flush() {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        other => other?,
    }

    if args.debug {
        eprintln!("Final statistics:");
        eprintln!("  Patterns registered: {}", registry.len());
        eprintln!("  Matchers compiled: {}", compiler.cached_len());
        eprintln!("  Records processed: {}", stats.records_processed);
        eprintln!("  Records output: {}", stats.records_output);
        eprintln!("  Events through chain: {}", pipeline.total_processed());
        eprintln!("  Records unmatched: {}", stats.records_unmatched);
        eprintln!("  Errors: {}", stats.errors);
        eprintln!("  Processing time: {:?}", stats.processing_time);
        if let Some(rate) = stats.rate() {
            eprintln!("  Processing rate: {:.0} records/second", rate);
        }
    }

    Ok(())
}
