// Configuration management
// TOML settings in the base directory, plus the interactive setup wizard

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestConfig, LlmConfig, OllamaConfig, RetrievalConfig,
};

/// Resolve the base directory, preferring an explicit override
#[inline]
pub fn resolve_base_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    override_dir.map_or_else(Config::default_base_dir, Ok)
}
