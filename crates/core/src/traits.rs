use crate::{ExpansionError, InferenceRequest, InferenceResponse};
use async_trait::async_trait;

#[async_trait]
pub trait InferenceBackend {
    async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResponse, ExpansionError>;
}
