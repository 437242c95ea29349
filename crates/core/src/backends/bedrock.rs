use crate::traits::InferenceBackend;
use crate::{ExpansionError, InferenceRequest, InferenceResponse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;
use url::Url;

pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-instant-v1";

const BACKEND: &str = "bedrock-runtime";

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub endpoint: String,
    pub model_id: String,
    pub api_key: Option<String>,
}

impl BedrockConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_key: None,
        }
    }

    pub fn from_env() -> Result<Self, ExpansionError> {
        let endpoint = non_blank_env("BEDROCK_ENDPOINT")
            .ok_or_else(|| ExpansionError::Config("BEDROCK_ENDPOINT is not set".to_string()))?;

        Ok(Self {
            endpoint,
            model_id: non_blank_env("BEDROCK_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            api_key: non_blank_env("BEDROCK_API_KEY"),
        })
    }

    pub fn invoke_url(&self) -> Result<Url, ExpansionError> {
        if self.model_id.trim().is_empty() {
            return Err(ExpansionError::Config("model id is empty".to_string()));
        }

        let mut url = Url::parse(self.endpoint.trim())?;
        url.path_segments_mut()
            .map_err(|_| {
                ExpansionError::Config(format!("endpoint cannot be a base url: {}", self.endpoint))
            })?
            .pop_if_empty()
            .extend(["model", self.model_id.trim(), "invoke"]);
        Ok(url)
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

pub struct BedrockRuntimeClient {
    client: Client,
    invoke_url: Url,
    api_key: Option<String>,
}

impl BedrockRuntimeClient {
    pub fn new(config: BedrockConfig) -> Result<Self, ExpansionError> {
        let invoke_url = config.invoke_url()?;
        Ok(Self {
            client: Client::new(),
            invoke_url,
            api_key: config.api_key,
        })
    }

    pub fn invoke_url(&self) -> &Url {
        &self.invoke_url
    }
}

#[async_trait]
impl InferenceBackend for BedrockRuntimeClient {
    async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResponse, ExpansionError> {
        debug!(
            url = %self.invoke_url,
            temperature = request.temperature,
            top_p = request.top_p,
            top_k = request.top_k,
            max_tokens_to_sample = request.max_tokens_to_sample,
            "invoking model"
        );

        let mut builder = self
            .client
            .post(self.invoke_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(serde_json::to_vec(request)?);

        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExpansionError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {body}"),
            });
        }

        decode_completion(&body)
    }
}

pub fn decode_completion(body: &str) -> Result<InferenceResponse, ExpansionError> {
    serde_json::from_str::<InferenceResponse>(body)
        .map_err(|error| ExpansionError::MalformedResponse(format!("{error}; body: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SamplingParameters;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let endpoint = format!("http://{}", listener.local_addr().expect("local addr"));

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let read = socket.read(&mut chunk).await.expect("read request");
                if read == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..read]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&raw).to_string()
        });

        (endpoint, handle)
    }

    #[tokio::test]
    async fn invoke_posts_json_and_returns_completion() {
        let (endpoint, server) = serve_once("200 OK", r#"{"completion":" <response/>"}"#).await;
        let client = BedrockRuntimeClient::new(BedrockConfig::new(endpoint)).expect("client builds");
        let request = InferenceRequest::new("hello", &SamplingParameters::default());

        let response = client.invoke(&request).await.expect("invoke succeeds");
        assert_eq!(response.completion, " <response/>");

        let raw = server.await.expect("server task").to_lowercase();
        assert!(raw.starts_with("post /model/anthropic.claude-instant-v1/invoke http/1.1"));
        assert!(raw.contains("content-type: application/json"));
        assert!(raw.contains("accept: application/json"));
        assert!(raw.contains(r#""max_tokens_to_sample":1024"#));
        assert!(!raw.contains("authorization:"));
    }

    #[tokio::test]
    async fn api_key_is_sent_as_bearer_token() {
        let (endpoint, server) = serve_once("200 OK", r#"{"completion":"ok"}"#).await;
        let mut config = BedrockConfig::new(endpoint);
        config.api_key = Some("secret-token".to_string());
        let client = BedrockRuntimeClient::new(config).expect("client builds");

        client
            .invoke(&InferenceRequest::new("", &SamplingParameters::default()))
            .await
            .expect("invoke succeeds");

        let raw = server.await.expect("server task");
        assert!(raw.to_lowercase().contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn non_success_status_maps_to_backend_response() {
        let (endpoint, server) =
            serve_once("429 Too Many Requests", r#"{"message":"throttled"}"#).await;
        let client = BedrockRuntimeClient::new(BedrockConfig::new(endpoint)).expect("client builds");

        let result = client
            .invoke(&InferenceRequest::new("hello", &SamplingParameters::default()))
            .await;
        server.await.expect("server task");

        match result {
            Err(ExpansionError::BackendResponse { backend, details }) => {
                assert_eq!(backend, "bedrock-runtime");
                assert!(details.contains("429"));
                assert!(details.contains("throttled"));
            }
            other => panic!("expected backend response error, got {other:?}"),
        }
    }

    #[test]
    fn invoke_url_appends_model_path() {
        let mut config = BedrockConfig::new("https://bedrock-runtime.us-east-1.amazonaws.com");
        let url = config.invoke_url().expect("url builds");
        assert_eq!(
            url.as_str(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-instant-v1/invoke"
        );

        config.endpoint = "http://localhost:8080/proxy/".to_string();
        config.model_id = "anthropic.claude-v2:1".to_string();
        let url = config.invoke_url().expect("url builds");
        assert_eq!(url.path(), "/proxy/model/anthropic.claude-v2:1/invoke");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            BedrockConfig::new("not a url").invoke_url(),
            Err(ExpansionError::Url(_))
        ));
        assert!(matches!(
            BedrockConfig::new("mailto:someone@example.com").invoke_url(),
            Err(ExpansionError::Config(_))
        ));

        let mut config = BedrockConfig::new("https://example.com");
        config.model_id = "  ".to_string();
        assert!(BedrockRuntimeClient::new(config).is_err());
    }

    #[test]
    fn completion_is_extracted_verbatim() {
        let response = decode_completion(r#"{"completion":"X","stop_reason":"stop_sequence","stop":"\n\nHuman:"}"#)
            .expect("body decodes");
        assert_eq!(response.completion, "X");
    }

    #[test]
    fn missing_completion_is_malformed() {
        assert!(matches!(
            decode_completion(r#"{"message":"throttled"}"#),
            Err(ExpansionError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_completion("<html>"),
            Err(ExpansionError::MalformedResponse(_))
        ));
    }
}
