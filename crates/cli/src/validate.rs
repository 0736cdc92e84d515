use colored::Colorize;
use miette::{IntoDiagnostic, Severity};
use oasdoc_core::{Diagnostic, Diagnostics, ReaderSettings, ReferenceSummary};
use serde_json::json;
use std::path::Path;
use tracing::debug;

/// Handle the validate command. Returns false when the document has errors.
pub async fn handle_validate_command(file: &Path, settings: ReaderSettings, json: bool) -> miette::Result<bool> {
    debug!(file = %file.display(), resolution = ?settings.resolution, "validating");
    let result = super::read_document(file, settings).await?;
    let summary = ReferenceSummary::of(&result.document);

    if json {
        print_results_json(file, &result.diagnostics, &summary)?;
    } else {
        print_results(file, &result.diagnostics, &summary);
    }

    Ok(!result.diagnostics.has_errors())
}

fn severity_label(diagnostic: &Diagnostic) -> &'static str {
    match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Advice => "advice",
    }
}

/// Print diagnostics and the reference summary in a human-readable format
pub fn print_results(file: &Path, diagnostics: &Diagnostics, summary: &ReferenceSummary) {
    println!();
    println!("{}", "Validation Results".bold());
    println!("{}", "===================".bold());
    println!();

    if diagnostics.has_errors() {
        println!("{} {}", "✗".red().bold(), file.display().to_string().red());
    } else {
        println!("{} {}", "✓".green().bold(), file.display().to_string().green());
    }

    for diagnostic in diagnostics {
        let line = format!("{} [{}]", diagnostic, diagnostic.kind.code());
        if diagnostic.is_error() {
            println!("  {} {}", "✗".red(), line.red());
        } else {
            println!("  {} {}", "⚠".yellow(), line.yellow());
        }
        if let Some(help) = diagnostic.kind.help() {
            println!("    {}", help.dimmed());
        }
    }

    println!();
    println!("{}", "References".bold());
    println!("{}", "----------".bold());
    println!("Total:      {}", summary.total);
    println!("Resolved:   {}", summary.resolved.to_string().green());
    if summary.unresolved > 0 {
        println!("Unresolved: {}", summary.unresolved.to_string().yellow());
    } else {
        println!("Unresolved: {}", summary.unresolved);
    }
    println!("External:   {}", summary.external);

    println!();
    if diagnostics.has_errors() {
        println!("{}", diagnostics.to_string().red().bold());
    } else if diagnostics.is_empty() {
        println!("{}", "Document is valid ✓".green().bold());
    } else {
        println!("{}", diagnostics.to_string().yellow().bold());
    }
}

/// Print diagnostics and the reference summary as JSON
pub fn print_results_json(
    file: &Path,
    diagnostics: &Diagnostics,
    summary: &ReferenceSummary,
) -> miette::Result<()> {
    let entries: Vec<_> = diagnostics
        .iter()
        .map(|d| {
            json!({
                "severity": severity_label(d),
                "code": d.kind.code(),
                "message": d.message(),
                "pointer": d.pointer,
                "help": d.kind.help(),
            })
        })
        .collect();

    let output = json!({
        "path": file.display().to_string(),
        "success": !diagnostics.has_errors(),
        "errors": diagnostics.error_count(),
        "warnings": diagnostics.warning_count(),
        "references": summary,
        "diagnostics": entries,
    });

    let text = serde_json::to_string_pretty(&output).into_diagnostic()?;
    println!("{}", text);
    Ok(())
}
