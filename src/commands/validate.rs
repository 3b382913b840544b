//! `loko validate`

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use loko_core::usecase::{DetectDrift, ValidateArchitecture};
use loko_core::Severity;
use loko_store::D2SyntaxParser;

use super::{load_model, TerminalReporter};

pub async fn run(root: &Path, strict: bool, exit_code: bool, check_drift: bool) -> Result<i32> {
    let reporter = TerminalReporter;
    let (_, systems, graph) = load_model(root, &reporter).await?;

    let report = ValidateArchitecture::new().execute(&systems, &graph, strict);
    println!(
        "{} systems, {} containers, {} components",
        report.systems, report.containers, report.components
    );

    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".dimmed(),
        };
        println!("{marker} [{}] {}", issue.code, issue.title);
        if !issue.description.is_empty() {
            println!("    {}", issue.description);
        }
        for affected in &issue.affected {
            println!("    affects: {affected}");
        }
        if !issue.suggestion.is_empty() {
            println!("    hint: {}", issue.suggestion.dimmed());
        }
    }

    let mut drift_errors = 0usize;
    if check_drift {
        let issues = DetectDrift::new(Arc::new(D2SyntaxParser::new())).execute(&systems, &graph)?;
        for issue in &issues {
            let marker = match issue.severity {
                Severity::Error => "error".red().bold(),
                _ => "warning".yellow().bold(),
            };
            println!("{marker} [drift:{:?}] {} — {}", issue.kind, issue.component, issue.message);
            if issue.severity == Severity::Error || (strict && issue.severity == Severity::Warning) {
                drift_errors += 1;
            }
        }
        if issues.is_empty() {
            println!("{} no drift detected", "✓".green());
        }
    }

    let failed = !report.is_valid() || drift_errors > 0;
    if failed {
        println!(
            "{} {} error(s), {} warning(s)",
            "✗".red(),
            report.error_count() + drift_errors,
            report.warning_count()
        );
    } else {
        println!("{} architecture is valid", "✓".green());
    }

    if exit_code && failed {
        return Ok(1);
    }
    Ok(0)
}
