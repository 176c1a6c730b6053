use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_assembly::app::App;
use kira_assembly::config::{ConfigLoader, ResolvedConfig, parse_delimiter};
use kira_assembly::domain::{
    AssemblyId, DecompressorKind, FieldSpec, MissingArchivePolicy, SpeciesName,
};
use kira_assembly::download::HttpDownloader;
use kira_assembly::error::AssemblyError;
use kira_assembly::eutils::EutilsHttpClient;
use kira_assembly::formatter::check_column_names;
use kira_assembly::output::{JsonOutput, OutputMode, TextOutput};

const DEFAULT_SPECIES: &str = "Homo sapiens";

#[derive(Parser)]
#[command(name = "kira-asm")]
#[command(about = "Fetch NCBI assembly metadata tables and GenBank archives for a species")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (default: ./kira-asm.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory for the generated files
    #[arg(long, global = true)]
    output_dir: Option<Utf8PathBuf>,

    /// Contact email sent to NCBI with every request
    #[arg(long, global = true)]
    email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write the assembly metadata table <species>.txt")]
    Dataset(DatasetArgs),
    #[command(about = "Download and decompress the GenBank archive <species>.gbff")]
    Sequence(SequenceArgs),
    #[command(about = "List assembly identifiers for a species")]
    Search(SpeciesArgs),
    #[command(about = "Show the summary of one assembly")]
    Summary(SummaryArgs),
}

#[derive(Args)]
struct SpeciesArgs {
    #[arg(default_value = DEFAULT_SPECIES)]
    species: String,

    /// Maximum number of assemblies returned by the search
    #[arg(long)]
    retmax: Option<u32>,
}

#[derive(Args)]
struct DatasetArgs {
    #[command(flatten)]
    target: SpeciesArgs,

    /// Comma-separated column names, overriding the configured columns
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    #[arg(long)]
    delimiter: Option<String>,
}

#[derive(Args)]
struct SequenceArgs {
    #[command(flatten)]
    target: SpeciesArgs,

    #[arg(long)]
    decompressor: Option<DecompressorKind>,

    /// Behaviour when the archive server does not answer with success
    #[arg(long)]
    on_missing: Option<MissingArchivePolicy>,
}

#[derive(Args)]
struct SummaryArgs {
    id: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<AssemblyError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AssemblyError) -> u8 {
    match error {
        AssemblyError::InvalidSpecies(_)
        | AssemblyError::InvalidAssemblyId(_)
        | AssemblyError::InvalidFieldPath { .. }
        | AssemblyError::InvalidColumnName { .. }
        | AssemblyError::InvalidDelimiter(_)
        | AssemblyError::ConfigRead(_)
        | AssemblyError::ConfigParse(_)
        | AssemblyError::NoAssemblies(_)
        | AssemblyError::EmptySummary(_) => 2,
        AssemblyError::EutilsHttp(_)
        | AssemblyError::EutilsStatus { .. }
        | AssemblyError::MalformedResponse(_)
        | AssemblyError::DownloadHttp(_)
        | AssemblyError::DownloadStatus { .. }
        | AssemblyError::MissingTool(_)
        | AssemblyError::Decompression(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(email) = cli.email {
        config.eutils.email = Some(email);
    }

    match cli.command {
        Commands::Dataset(args) => run_dataset(args, config, output_mode),
        Commands::Sequence(args) => run_sequence(args, config, output_mode),
        Commands::Search(args) => run_search(args, config, output_mode),
        Commands::Summary(args) => run_summary(args, config, output_mode),
    }
}

fn build_app(config: ResolvedConfig) -> miette::Result<App<EutilsHttpClient, HttpDownloader>> {
    let eutils = EutilsHttpClient::new(config.eutils.clone())?;
    let downloader = HttpDownloader::new(config.eutils.timeout, config.on_missing_archive)?;
    Ok(App::new(config, eutils, downloader))
}

fn apply_species_args(
    args: &SpeciesArgs,
    config: &mut ResolvedConfig,
) -> miette::Result<SpeciesName> {
    if let Some(retmax) = args.retmax {
        config.eutils.retmax = retmax;
    }
    Ok(args.species.parse::<SpeciesName>()?)
}

fn run_dataset(
    args: DatasetArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let species = apply_species_args(&args.target, &mut config)?;
    if let Some(columns) = args.columns {
        config.columns = columns
            .iter()
            .map(|name| FieldSpec::shorthand(name))
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(delimiter) = args.delimiter {
        config.delimiter = parse_delimiter(&delimiter)?;
    }
    check_column_names(&config.columns, config.delimiter)?;

    let app = build_app(config)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let report = app.dataset(&species, &JsonOutput)?;
            JsonOutput::print_dataset(&report).into_diagnostic()
        }
        OutputMode::Interactive => {
            let report = app.dataset(&species, &TextOutput)?;
            TextOutput::print_dataset(&report);
            Ok(())
        }
    }
}

fn run_sequence(
    args: SequenceArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let species = apply_species_args(&args.target, &mut config)?;
    if let Some(kind) = args.decompressor {
        config.decompressor = kind;
    }
    if let Some(policy) = args.on_missing {
        config.on_missing_archive = policy;
    }

    let app = build_app(config)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let report = app.sequence(&species, &JsonOutput)?;
            JsonOutput::print_sequence(&report).into_diagnostic()
        }
        OutputMode::Interactive => {
            let report = app.sequence(&species, &TextOutput)?;
            TextOutput::print_sequence(&report);
            Ok(())
        }
    }
}

fn run_search(
    args: SpeciesArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let species = apply_species_args(&args, &mut config)?;
    let app = build_app(config)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.search(&species, &JsonOutput)?;
            JsonOutput::print_search(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let result = app.search(&species, &TextOutput)?;
            TextOutput::print_search(&result);
            Ok(())
        }
    }
}

fn run_summary(
    args: SummaryArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let id = args.id.parse::<AssemblyId>()?;
    let app = build_app(config)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.summary(&id, &JsonOutput)?;
            JsonOutput::print_summary(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let result = app.summary(&id, &TextOutput)?;
            TextOutput::print_summary(&result);
            Ok(())
        }
    }
}
