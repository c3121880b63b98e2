// Configuration management module
// TOML settings for the embedding provider, retrieval, generation and chunking

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, GenerationConfig, RetrievalConfig, api_key_from_env,
};

