use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid prompt template: {0}")]
    InvalidTemplate(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("malformed completion payload: {0}")]
    MalformedResponse(String),

    #[error("malformed xml at byte {position}: {details}")]
    XmlParse { position: u64, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ExpansionError> = std::result::Result<T, E>;
