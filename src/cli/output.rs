//! Terminal rendering for reports.

use console::style;

use access_checker::models::{AnalysisSource, ComprehensiveReport, Rating};

pub fn print_availability(name: &str, available: bool, hint: &str) {
    let status = if available {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", name, status);
    if !available {
        println!("                  {}", style(hint).dim());
    }
}

pub fn print_report(report: &ComprehensiveReport) {
    let rating = match report.rating {
        Rating::Excellent | Rating::Good => style(report.rating.as_str()).green(),
        Rating::Fair => style(report.rating.as_str()).yellow(),
        Rating::Poor | Rating::VeryPoor => style(report.rating.as_str()).red(),
    };

    println!("\n{}", style("Accessibility Report").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<15} {}/100 ({})", "Overall", report.overall_score, rating);
    println!("  {:<15} {}", "Image average", report.average_score);
    match report.secondary_score {
        Some(score) => println!("  {:<15} {}", "Whole set", score),
        None if report.whole_set_fallback => println!(
            "  {:<15} {}",
            "Whole set",
            style("unavailable, per-image results only").yellow()
        ),
        None => {}
    }
    println!(
        "  {:<15} {:.0}%",
        "Confidence",
        report.confidence * 100.0
    );
    println!(
        "  {:<15} {} ({} degraded, {} failed)",
        "Images",
        report.images_analyzed,
        report.statistics.degraded,
        report.statistics.failed
    );

    print_section("Positive features", &report.positive_features, "+");
    print_section("Barriers", &report.barriers, "-");
    print_section("Safety concerns", &report.safety_concerns, "!");
    print_section("Recommendations", &report.recommendations, "→");

    println!("\n{}", style("Per image:").cyan());
    for result in &report.per_image_results {
        let marker = match result.source {
            AnalysisSource::Failed => style("✗").red(),
            AnalysisSource::Placeholder => style("○").yellow(),
            _ => style("✓").green(),
        };
        println!(
            "  {} {:<30} {:>3} {}",
            marker,
            result.filename,
            result.score(),
            style(result.source.as_str()).dim()
        );
        if let Some(error) = &result.error {
            println!("      {}", style(error).dim());
        }
    }
    println!();
}

fn print_section(title: &str, items: &[String], bullet: &str) {
    if items.is_empty() {
        return;
    }
    println!("\n{}", style(format!("{}:", title)).cyan());
    for item in items {
        println!("  {} {}", style(bullet).dim(), item);
    }
}
