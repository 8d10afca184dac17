//! Language model capability

use crate::{Result, Turn};
use async_trait::async_trait;

/// Generates the agent's reply to a completed user turn
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Produce a reply given the prior dialogue and the new user utterance.
    ///
    /// `history` does not yet contain `user_text`.
    async fn generate(&self, history: &[Turn], user_text: &str) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
