// Colored terminal output for stage summaries and results.
//
// This module handles all terminal-specific formatting. The main.rs
// command handlers delegate here.

use colored::Colorize;

use crate::cooccurrence::CooccurrenceMatrix;
use crate::pipeline::StageSummary;
use crate::terms::category::{Category, ExpandedTermSet};
use crate::terms::expander::ExpansionReport;
use crate::terms::suggest::KeywordSuggestion;

/// Print the processed / skipped / failed line every stage ends with.
pub fn display_stage_summary(summary: &StageSummary) {
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().to_string()
    } else {
        summary.failed.to_string().normal().to_string()
    };
    let skipped = if summary.skipped > 0 {
        summary.skipped.to_string().yellow().to_string()
    } else {
        summary.skipped.to_string().normal().to_string()
    };

    println!(
        "{} {} processed, {} skipped, {} failed{}",
        format!("[{}]", summary.stage).bold(),
        summary.processed.to_string().green(),
        skipped,
        failed,
        if summary.cached {
            " (cached)".dimmed().to_string()
        } else {
            String::new()
        },
    );
    if let Some(path) = &summary.output {
        println!("  {} {}", "->".dimmed(), path.display());
    }
}

/// Terms per category, with the seeds that failed to expand.
pub fn display_expansion(terms: &ExpandedTermSet, report: Option<&ExpansionReport>) {
    println!("\n{}", "=== Expanded Terms ===".bold());
    for (category, list) in terms.iter() {
        let preview: Vec<&str> = list.iter().take(8).map(String::as_str).collect();
        let more = list.len().saturating_sub(preview.len());
        let suffix = if more > 0 {
            format!(" (+{more} more)").dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<14} {:>4}  {}{}",
            category.label(),
            list.len(),
            super::truncate_chars(&preview.join(", "), 90).dimmed(),
            suffix
        );
    }

    if let Some(report) = report {
        println!(
            "\n  Seeds queried: {}  |  candidates seen: {}  |  added: {}",
            report.seeds_queried, report.candidates_seen, report.terms_added
        );
        for failed in &report.failed {
            println!(
                "  {} {} ({}): {}",
                "!".yellow(),
                failed.seed,
                failed.category,
                super::truncate_chars(&failed.error, 80).dimmed()
            );
        }
    }
}

/// Category totals and the strongest term pairs.
pub fn display_cooccurrence(matrix: &CooccurrenceMatrix, top: usize) {
    println!(
        "\n{}",
        format!(
            "=== Co-occurrence ({} documents, {} pairs) ===",
            matrix.document_count(),
            matrix.len()
        )
        .bold()
    );

    println!(
        "\n  {:<14} {:>9} {:>10} {:>7}",
        "Category".dimmed(),
        "Mentions".dimmed(),
        "Documents".dimmed(),
        "Terms".dimmed()
    );
    for (category, totals) in matrix.category_totals() {
        println!(
            "  {:<14} {:>9} {:>10} {:>7}",
            category.label(),
            totals.mentions,
            totals.documents,
            totals.distinct_terms
        );
    }

    let pairs = matrix.top_pairs(top);
    if pairs.is_empty() {
        println!("\n  No co-occurring term pairs.");
        return;
    }

    println!("\n  Top pairs:");
    for (i, (a, b, count)) in pairs.iter().enumerate() {
        println!("  {:>4}. {:<32} {:<32} {:>5}", i + 1, a, b, count.to_string().cyan());
    }

    let mut shown_header = false;
    for (i, &a) in Category::ALL.iter().enumerate() {
        for &b in &Category::ALL[i + 1..] {
            let n = matrix.category_count(a, b);
            if n == 0 {
                continue;
            }
            if !shown_header {
                println!("\n  Category overlap (documents):");
                shown_header = true;
            }
            println!("    {} + {}: {}", a.label(), b.label(), n);
        }
    }
}

/// Ranked keyword suggestions.
pub fn display_suggestions(suggestions: &[KeywordSuggestion]) {
    if suggestions.is_empty() {
        println!("No uncovered keywords found.");
        return;
    }
    println!(
        "\n{}",
        format!("=== Keyword Suggestions ({}) ===", suggestions.len()).bold()
    );
    for (i, s) in suggestions.iter().enumerate() {
        println!("  {:>3}. {:<30} {:.3}", i + 1, s.keyword, s.score);
    }
    println!(
        "\n{}",
        "Add relevant keywords to a category's seeds, then run `epitrace expand --refresh`.".dimmed()
    );
}
