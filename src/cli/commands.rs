//! Command implementations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;
use tracing::info_span;

use access_checker::config::{DegradeMode, Strategy};
use access_checker::providers::{labels_from_config, vision_from_config, ProviderKind};
use access_checker::providers::{create_vision_provider, LabelProvider, VisionProvider};
use access_checker::{Analyzer, Config, ImageInput};

use super::output;

/// Flags for the `analyze` subcommand that override the config file.
pub struct AnalyzeOptions {
    pub strategy: Option<String>,
    pub strict: bool,
    pub no_whole_set: bool,
    pub concurrency: Option<usize>,
    pub json: bool,
}

/// Load config from an explicit path or by discovery.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Ok(Config::load_from_path(path).await?)
        }
        None => Ok(Config::load().await),
    }
}

/// Analyze a set of photos and print the combined report.
pub async fn cmd_analyze(
    mut config: Config,
    files: &[PathBuf],
    options: AnalyzeOptions,
) -> anyhow::Result<()> {
    if let Some(name) = options.strategy.as_deref() {
        config.analysis.strategy = Strategy::from_str(name)
            .with_context(|| format!("Unknown strategy '{}' (expected vision or labels)", name))?;
    }
    if options.strict {
        config.analysis.degrade = DegradeMode::Strict;
    }
    if options.no_whole_set {
        config.analysis.whole_set = false;
    }
    if let Some(n) = options.concurrency {
        config.analysis.max_concurrency = n;
    }
    let mut images = Vec::with_capacity(files.len());
    for path in files {
        let image = ImageInput::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        images.push(image);
    }

    let analyzer = Analyzer::from_config(&config)?.with_span(info_span!(
        "analyze",
        strategy = config.analysis.strategy.as_str(),
        images = images.len()
    ));

    if !options.json {
        eprintln!(
            "{} Analyzing {} image(s) with {} strategy",
            style("→").dim(),
            images.len(),
            config.analysis.strategy
        );
    }

    let report = analyzer.analyze_images(&images).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }
    Ok(())
}

/// Show provider availability.
pub fn cmd_providers(config: &Config) -> anyhow::Result<()> {
    let timeout = config.analysis.provider_timeout();

    println!("\n{}", style("Provider Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Vision Providers:").cyan());
    for kind in ProviderKind::vision() {
        if let Some(provider) = create_vision_provider(*kind, &config.providers, timeout) {
            output::print_availability(
                provider.name(),
                provider.is_available(),
                &provider.availability_hint(),
            );
        }
    }

    println!("\n{}", style("Label Detection:").cyan());
    let labels = labels_from_config(&config.providers, timeout);
    output::print_availability(labels.name(), labels.is_available(), &labels.availability_hint());

    println!("\n{}", style("Active Configuration:").cyan());
    let vision = vision_from_config(&config.providers, timeout);
    println!("  {:<15} {}", "Strategy", config.analysis.strategy);
    println!("  {:<15} {}", "Vision", vision.name());
    println!("  {:<15} {}", "On failure", config.analysis.degrade.as_str());
    Ok(())
}

/// Print the effective configuration as TOML, with API keys masked.
pub fn cmd_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    for settings in [
        &mut shown.providers.gemini,
        &mut shown.providers.openai,
        &mut shown.providers.groq,
    ] {
        settings.api_key = settings.api_key.as_ref().map(|_| "***".to_string());
    }
    shown.providers.labels.api_key = shown
        .providers
        .labels
        .api_key
        .as_ref()
        .map(|_| "***".to_string());

    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    eprintln!("{} Source: {}", style("→").dim(), source);

    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
