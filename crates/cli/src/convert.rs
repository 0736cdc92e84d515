use colored::Colorize;
use miette::{IntoDiagnostic, WrapErr};
use oasdoc_core::{Format, OpenApiWriter, ReaderSettings, ResolutionPolicy, SpecVersion, WriterSettings};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConvertOptions {
    pub target: SpecVersion,
    pub format: Format,
    pub inline_local: bool,
    pub inline_external: bool,
    pub output: Option<PathBuf>,
}

/// Handle the convert command
pub async fn handle_convert_command(file: &Path, options: ConvertOptions) -> miette::Result<()> {
    // External content can only be inlined once it has been loaded
    let resolution = if options.inline_external {
        ResolutionPolicy::Full
    } else {
        ResolutionPolicy::LocalOnly
    };
    let result = super::read_document(file, ReaderSettings::new().with_resolution(resolution)).await?;

    for diagnostic in &result.diagnostics {
        if diagnostic.is_error() {
            eprintln!("{} {}", "✗".red(), diagnostic.to_string().red());
        } else {
            eprintln!("{} {}", "⚠".yellow(), diagnostic.to_string().yellow());
        }
    }

    let settings = WriterSettings::new()
        .with_target(options.target)
        .with_format(options.format)
        .with_inline_local_references(options.inline_local)
        .with_inline_external_references(options.inline_external);
    debug!(target_version = ?options.target, format = ?options.format, "writing");
    let writer = OpenApiWriter::new(settings);

    match options.output {
        Some(path) => {
            let out = std::fs::File::create(&path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
            writer
                .write(&result.document, std::io::BufWriter::new(out))
                .into_diagnostic()?;
            eprintln!("{} Wrote {}", "✓".green().bold(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            writer.write(&result.document, stdout.lock()).into_diagnostic()?;
        }
    }

    Ok(())
}
