//! Question generators - remote AI provider and offline template.

mod template;

pub use template::TemplateQuestionGenerator;

#[cfg(feature = "gemini")]
mod gemini;
#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiQuestionGenerator};
