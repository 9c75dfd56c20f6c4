//! exampaper-llm
//!
//! Text generation: an OpenAI-compatible chat client, `{name}` prompt
//! templates, and the question-paper / answer-key generator built on them.
#![deny(unused_imports)]

pub mod client;
pub mod paper;
pub mod prompt;

pub use client::ChatClient;
pub use paper::{PaperGenerator, GENERATION_TEMPERATURE};
pub use prompt::PromptTemplate;
