use crate::parser::{aggregate_completions, parse_rows};
use crate::prompt::PromptTemplate;
use crate::traits::InferenceBackend;
use crate::{
    BatchProgress, BatchReport, ExpansionError, InferenceRequest, QueryExpansion,
    SamplingParameters,
};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

pub struct QueryExpander<B>
where
    B: InferenceBackend,
{
    backend: B,
    parameters: SamplingParameters,
    template: PromptTemplate,
}

impl<B> QueryExpander<B>
where
    B: InferenceBackend + Send + Sync,
{
    pub fn new(backend: B, parameters: SamplingParameters) -> Result<Self, ExpansionError> {
        Self::with_template(backend, parameters, PromptTemplate::default())
    }

    pub fn with_template(
        backend: B,
        parameters: SamplingParameters,
        template: PromptTemplate,
    ) -> Result<Self, ExpansionError> {
        parameters.validate()?;
        Ok(Self {
            backend,
            parameters,
            template,
        })
    }

    pub fn parameters(&self) -> &SamplingParameters {
        &self.parameters
    }

    pub async fn expand(&self, query: &str) -> Result<QueryExpansion, ExpansionError> {
        let requested_at = Utc::now();
        let completion = self.complete(query).await?;

        Ok(QueryExpansion {
            query: query.to_string(),
            completion,
            requested_at,
        })
    }

    async fn complete(&self, query: &str) -> Result<String, ExpansionError> {
        let request = InferenceRequest::new(self.template.build_prompt(query), &self.parameters);
        debug!(query = %query, prompt_chars = request.prompt.len(), "built prompt");

        let response = self.backend.invoke(&request).await?;
        Ok(response.completion)
    }

    // Results keep input order whatever the concurrency; the first error aborts the batch.
    pub async fn run_batch<Q, F>(
        &self,
        queries: &[Q],
        concurrency: usize,
        mut on_progress: F,
    ) -> Result<BatchReport, ExpansionError>
    where
        Q: AsRef<str>,
        F: FnMut(BatchProgress),
    {
        if concurrency == 0 {
            return Err(ExpansionError::InvalidParameter(
                "batch concurrency must be at least 1".to_string(),
            ));
        }

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = queries.len();
        let span = info_span!("batch", %batch_id, total, concurrency);

        let completions = async {
            let mut completed = 0usize;
            stream::iter(queries.iter().map(|query| {
                let query = query.as_ref();
                async move {
                    info!(query = %query, "Processing query");
                    self.complete(query).await
                }
            }))
            .buffered(concurrency)
            .inspect_ok(|_| {
                completed += 1;
                on_progress(BatchProgress { completed, total });
            })
            .try_collect::<Vec<_>>()
            .await
        }
        .instrument(span)
        .await?;

        let aggregate_document = aggregate_completions(&completions)?;
        let rows = parse_rows(&aggregate_document)?;
        info!(%batch_id, rows = rows.len(), "batch complete");

        Ok(BatchReport {
            batch_id,
            aggregate_document,
            rows,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
