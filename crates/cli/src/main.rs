use clap::{Parser, Subcommand, ValueEnum, builder::styling};
use clap_cargo::style;
use miette::{IntoDiagnostic, WrapErr};
use oasdoc_core::{Format, OpenApiReader, ReadResult, ReaderSettings, ResolutionPolicy, SpecVersion};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod convert;
mod cycles;
mod validate;

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Read, validate and convert OpenAPI 3.0 / 3.1 descriptions")]
#[command(styles = CLAP_STYLING)]
struct Cli {
    /// Log resolution progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

pub const CLAP_STYLING: styling::Styles = styling::Styles::styled()
    .header(style::HEADER)
    .usage(style::USAGE)
    .literal(style::LITERAL)
    .placeholder(style::PLACEHOLDER)
    .error(style::ERROR)
    .valid(style::VALID)
    .invalid(style::INVALID);

#[derive(Subcommand)]
enum Commands {
    /// Read a description and report its diagnostics
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// How far to follow references, overriding the config
        #[arg(long, value_enum)]
        resolve: Option<Resolve>,

        /// Reader settings as YAML or JSON
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Write a description for another version or format
    Convert {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum, default_value = "3.1")]
        target: Target,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Write local references inline instead of as `$ref`
        #[arg(long)]
        inline_local: bool,

        /// Load external documents and write their content inline
        #[arg(long)]
        inline_external: bool,

        /// Output file, stdout when omitted
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// List reference cycles between component definitions
    Cycles {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Resolve {
    Local,
    Full,
}

impl From<Resolve> for ResolutionPolicy {
    fn from(resolve: Resolve) -> Self {
        match resolve {
            Resolve::Local => ResolutionPolicy::LocalOnly,
            Resolve::Full => ResolutionPolicy::Full,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    #[value(name = "3.0")]
    V3_0,
    #[value(name = "3.1")]
    V3_1,
}

impl From<Target> for SpecVersion {
    fn from(target: Target) -> Self {
        match target {
            Target::V3_0 => SpecVersion::V3_0,
            Target::V3_1 => SpecVersion::V3_1,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            file,
            resolve,
            config,
            json,
        } => {
            let mut settings = match config {
                Some(path) => load_settings(&path)?,
                None => ReaderSettings::new(),
            };
            if let Some(resolve) = resolve {
                settings.resolution = resolve.into();
            }

            let passed = validate::handle_validate_command(&file, settings, json).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Convert {
            file,
            target,
            format,
            inline_local,
            inline_external,
            output,
        } => {
            let options = convert::ConvertOptions {
                target: target.into(),
                format: format.into(),
                inline_local,
                inline_external,
                output,
            };
            convert::handle_convert_command(&file, options).await?;
        }
        Commands::Cycles { file } => {
            cycles::handle_cycles_command(&file).await?;
        }
    }

    Ok(())
}

fn load_settings(path: &Path) -> miette::Result<ReaderSettings> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read config: {}", path.display()))?;
    ReaderSettings::from_yaml(&text).into_diagnostic()
}

/// Read a local file with the given settings
pub(crate) async fn read_document(file: &Path, settings: ReaderSettings) -> miette::Result<ReadResult> {
    if !file.exists() {
        return Err(miette::miette!("File not found: {}", file.display()));
    }

    let location = oasdoc_core::reader::file_location(file).into_diagnostic()?;
    OpenApiReader::new(settings)
        .load_async(&location)
        .await
        .into_diagnostic()
}
