use colored::Colorize;
use oasdoc_core::{ReaderSettings, ReferenceGraph};
use std::path::Path;

/// Handle the cycles command
pub async fn handle_cycles_command(file: &Path) -> miette::Result<()> {
    let result = super::read_document(file, ReaderSettings::new()).await?;
    let graph = ReferenceGraph::build(&result.document);
    let cycles = graph.cycles();

    println!(
        "{} definitions, {} references between them",
        graph.len(),
        graph.edge_count()
    );

    if cycles.is_empty() {
        println!("{}", "No reference cycles ✓".green().bold());
        return Ok(());
    }

    println!("{}", format!("{} reference cycle(s)", cycles.len()).yellow().bold());
    for cycle in &cycles {
        let names: Vec<String> = cycle.iter().map(|d| d.to_string()).collect();
        println!("  {} {}", "↻".yellow(), names.join(", "));
    }

    Ok(())
}
