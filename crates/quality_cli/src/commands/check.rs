use anyhow::{Context, Result, bail};
use quality_core::QualitySuite;
use quality_engine::{Orchestrator, Registry};
use quality_parser::parse_file;
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::OutputFormat;
use crate::output;
use crate::sources::SuiteFiles;

/// Rule identities of one source, in evaluation order.
struct SourceRules {
    name: String,
    path: String,
    rules: Vec<String>,
}

/// Builds every rule of every source and checks that referential rules name
/// a known source. No data is read.
pub fn build_rules(
    registry: &Registry,
    suite: &QualitySuite,
    files: &SuiteFiles,
) -> Result<Vec<(String, Vec<String>)>> {
    let orchestrator = Orchestrator::new(registry, suite.settings.clone());

    suite
        .sources
        .iter()
        .map(|spec| -> Result<(String, Vec<String>)> {
            let rules = orchestrator
                .prepare(&suite.rules_for(spec))
                .with_context(|| format!("Invalid rules for source '{}'", spec.name))?;

            for rule in &rules {
                for key in rule.reference_requirements() {
                    if !files.has_reference(&key.source) {
                        bail!(
                            "Rule '{}' of source '{}' references unknown source '{}'",
                            rule.id(),
                            spec.name,
                            key.source
                        );
                    }
                }
            }

            let ids = rules.iter().map(|r| r.id().to_string()).collect();
            Ok((spec.name.clone(), ids))
        })
        .collect()
}

pub fn execute(suite_path: &Path, format: OutputFormat) -> Result<u8> {
    info!("Checking suite: {}", suite_path.display());

    let suite = parse_file(suite_path)
        .with_context(|| format!("Failed to parse suite file: {}", suite_path.display()))?;
    let files = SuiteFiles::resolve(&suite, suite_path, &[])?;
    let registry = Registry::with_builtins();

    let sources: Vec<SourceRules> = build_rules(&registry, &suite, &files)?
        .into_iter()
        .zip(&suite.sources)
        .map(|((name, rules), spec)| SourceRules {
            name,
            path: spec.path.clone(),
            rules,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&suite, &sources)?,
        OutputFormat::Text => print_text(&suite, &sources),
    }

    Ok(0)
}

fn print_json(suite: &QualitySuite, sources: &[SourceRules]) -> Result<()> {
    let output = json!({
        "valid": true,
        "name": suite.name,
        "settings": suite.settings,
        "sources": sources.iter().map(|s| json!({
            "name": s.name,
            "path": s.path,
            "rules": s.rules,
        })).collect::<Vec<_>>(),
        "references": suite.references.iter().map(|r| &r.name).collect::<Vec<_>>(),
        "rule_count": suite.rule_count(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(suite: &QualitySuite, sources: &[SourceRules]) {
    output::print_info(&format!("Suite loaded: {}", suite.name));
    output::print_success("Suite is valid");

    let settings = &suite.settings;
    println!("\nSuite Summary:");
    println!("  Name:        {}", suite.name);
    println!(
        "  Description: {}",
        suite.description.as_deref().unwrap_or("N/A")
    );
    println!("  Batch size:  {}", settings.batch_size);
    println!("  Max samples: {}", settings.max_sample_failures);
    println!(
        "  Fail-fast:   {}",
        if settings.fail_fast {
            format!("on ({:?} scope)", settings.fail_fast_scope).to_lowercase()
        } else {
            "off".to_string()
        }
    );
    println!("  Rules:       {}", suite.rule_count());

    println!("\nSources:");
    for source in sources {
        println!(
            "  {} ({}): {} rules",
            source.name,
            source.path,
            source.rules.len()
        );
        for rule in &source.rules {
            println!("    - {}", rule);
        }
    }

    if !suite.references.is_empty() {
        println!("\nReferences:");
        for reference in &suite.references {
            println!("  {} ({})", reference.name, reference.path);
        }
    }
}
