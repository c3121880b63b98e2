
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, ConfigError, EmbeddingConfig, GenerationConfig, RetrievalConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Lingo Press Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used to embed study material.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Generation").bold().yellow());
    configure_generation(&mut config.generation)?;

    eprintln!();
    for (label, var) in [
        ("Embedding", config.embedding.api_key_env.as_str()),
        ("Generation", config.generation.api_key_env.as_str()),
    ] {
        if api_key_present(var) {
            eprintln!("{}", style(format!("✓ {label} API key found in {var}")).green());
        } else {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: {var} is not set")).yellow()
            );
            eprintln!("You can continue, but export {var} (or add it to .env) before running.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.embedding.base_url).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!("  API Key: {}", key_status(&config.embedding.api_key_env));

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Grammar Results: {}", style(config.retrieval.grammar_n).cyan());
    eprintln!("  Vocabulary Results: {}", style(config.retrieval.vocab_n).cyan());
    eprintln!(
        "  Near-duplicate Threshold: {}",
        style(config.retrieval.mmr_similarity_threshold).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Generation Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.generation.base_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!("  Max Tokens: {}", style(config.generation.max_tokens).cyan());
    eprintln!("  API Key: {}", key_status(&config.generation.api_key_env));

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!("Database: {}", style(config.database_path().display()).dim());

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Embedding endpoint")
        .default(embedding.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                base_url: input.clone(),
                ..embedding.clone()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 8192")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Texts per embedding request")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 100 {
                Err("Batch size must be 100 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_base_url(base_url)?;
    embedding.set_model(model)?;
    embedding.set_dimension(dimension)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let grammar_n: usize = Input::new()
        .with_prompt("Grammar chunks per retrieval")
        .default(retrieval.grammar_n)
        .interact_text()?;

    let vocab_n: usize = Input::new()
        .with_prompt("Vocabulary chunks per retrieval")
        .default(retrieval.vocab_n)
        .interact_text()?;

    let threshold: f32 = Input::new()
        .with_prompt("Near-duplicate similarity threshold")
        .default(retrieval.mmr_similarity_threshold)
        .interact_text()?;

    retrieval.set_grammar_n(grammar_n)?;
    retrieval.set_vocab_n(vocab_n)?;
    retrieval.set_mmr_similarity_threshold(threshold)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Generation model")
        .default(generation.model.clone())
        .interact_text()?;

    let max_tokens: u32 = Input::new()
        .with_prompt("Max tokens per draft")
        .default(generation.max_tokens)
        .interact_text()?;

    generation.set_model(model)?;
    generation.set_max_tokens(max_tokens)?;

    Ok(())
}

fn api_key_present(var: &str) -> bool {
    std::env::var(var).is_ok_and(|key| !key.trim().is_empty())
}

fn key_status(var: &str) -> String {
    if api_key_present(var) {
        format!("{} ({})", style("set").green(), var)
    } else {
        format!("{} ({})", style("missing").red(), var)
    }
}
