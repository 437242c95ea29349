pub mod bedrock;

pub use bedrock::{BedrockConfig, BedrockRuntimeClient, DEFAULT_MODEL_ID};
