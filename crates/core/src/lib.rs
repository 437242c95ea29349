pub mod backends;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod render;
pub mod traits;

pub use backends::{BedrockConfig, BedrockRuntimeClient, DEFAULT_MODEL_ID};
pub use error::ExpansionError;
pub use models::{
    BatchProgress, BatchReport, InferenceRequest, InferenceResponse, QueryExpansion, ResultRow,
    SamplingParameters, MAX_TOKENS_RANGE, SAMPLE_QUERIES, TEMPERATURE_RANGE, TOP_K_RANGE,
    TOP_P_RANGE,
};
pub use orchestrator::QueryExpander;
pub use parser::{aggregate_completions, escape_bare_ampersands, parse_rows, validate_document};
pub use prompt::{build_instructions, build_prompt, wrap_conversation, PromptTemplate};
pub use render::{render_expansion, render_row, render_rows};
pub use traits::InferenceBackend;
