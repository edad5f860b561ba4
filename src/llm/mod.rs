// Language model
// Prompt completion against a local Ollama server, whole or as a fragment stream

pub mod ollama;
pub mod stream;

pub use ollama::OllamaGenerator;
pub use stream::{FragmentSender, TokenStream};

use crate::Result;

/// Produces text from a fully assembled prompt
pub trait Generator: Send + Sync {
    /// Generate the whole answer before returning
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Start generation and return fragments as they are produced.
    ///
    /// Concatenating every fragment yields the same text `complete` would.
    fn stream(&self, prompt: &str) -> Result<TokenStream>;

    fn model_name(&self) -> &str;
}
