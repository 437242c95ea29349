use crate::error::ExpansionError;
use crate::prompt::STOP_SEQUENCES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_K_RANGE: (u32, u32) = (1, 500);
pub const MAX_TOKENS_RANGE: (u32, u32) = (0, 2048);

pub const SAMPLE_QUERIES: [&str; 5] = [
    "levaquin effective",
    "lupus criteria",
    "chrohns risk",
    "6 yo m nut allergy coconut milk",
    "25 f sublcinical hyperthyrodism",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SamplingParameters {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 10,
            max_tokens: 1_024,
        }
    }
}

impl SamplingParameters {
    pub fn validate(&self) -> Result<(), ExpansionError> {
        check_unit_interval("temperature", self.temperature, TEMPERATURE_RANGE)?;
        check_unit_interval("top_p", self.top_p, TOP_P_RANGE)?;

        if !(TOP_K_RANGE.0..=TOP_K_RANGE.1).contains(&self.top_k) {
            return Err(ExpansionError::InvalidParameter(format!(
                "top_k must be within {}..={}, got {}",
                TOP_K_RANGE.0, TOP_K_RANGE.1, self.top_k
            )));
        }
        if self.max_tokens > MAX_TOKENS_RANGE.1 {
            return Err(ExpansionError::InvalidParameter(format!(
                "max_tokens must be within {}..={}, got {}",
                MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1, self.max_tokens
            )));
        }

        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f32, range: (f32, f32)) -> Result<(), ExpansionError> {
    // NaN fails both comparisons and is rejected here too.
    if value >= range.0 && value <= range.1 {
        Ok(())
    } else {
        Err(ExpansionError::InvalidParameter(format!(
            "{name} must be within {}..={}, got {value}",
            range.0, range.1
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens_to_sample: u32,
    pub stop_sequences: Vec<String>,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, parameters: &SamplingParameters) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            top_k: parameters.top_k,
            max_tokens_to_sample: parameters.max_tokens,
            stop_sequences: STOP_SEQUENCES.iter().map(|stop| stop.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferenceResponse {
    pub completion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExpansion {
    pub query: String,
    pub completion: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResultRow {
    pub query: String,
    pub alternate_queries: Vec<String>,
    pub thought_process: String,
}

impl ResultRow {
    pub fn formatted_alternate_queries(&self) -> String {
        self.alternate_queries
            .iter()
            .map(|alternate| format!("Alternate Query: {alternate}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub aggregate_document: String,
    pub rows: Vec<ResultRow>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_slider_defaults_and_validate() {
        let parameters = SamplingParameters::default();
        assert_eq!(parameters.top_k, 10);
        assert_eq!(parameters.max_tokens, 1024);
        assert!(parameters.validate().is_ok());
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        let base = SamplingParameters::default();
        let cases = [
            SamplingParameters { temperature: 1.5, ..base },
            SamplingParameters { temperature: f32::NAN, ..base },
            SamplingParameters { top_p: -0.1, ..base },
            SamplingParameters { top_k: 0, ..base },
            SamplingParameters { top_k: 501, ..base },
            SamplingParameters { max_tokens: 4096, ..base },
        ];

        for parameters in cases {
            assert!(
                matches!(parameters.validate(), Err(ExpansionError::InvalidParameter(_))),
                "{parameters:?} should be rejected"
            );
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let parameters = SamplingParameters {
            temperature: 1.0,
            top_p: 0.0,
            top_k: 500,
            max_tokens: 0,
        };
        assert!(parameters.validate().is_ok());
    }

    #[test]
    fn request_serializes_wire_field_names() {
        let request = InferenceRequest::new("hello", &SamplingParameters::default());
        let value = serde_json::to_value(&request).expect("request serializes");
        let object = value.as_object().expect("request is an object");

        let mut keys = object.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "max_tokens_to_sample",
                "prompt",
                "stop_sequences",
                "temperature",
                "top_k",
                "top_p"
            ]
        );
        assert_eq!(value["max_tokens_to_sample"], 1024);
        assert_eq!(value["stop_sequences"][0], "\n\nHuman:");
    }

    #[test]
    fn response_ignores_extra_fields() {
        let response: InferenceResponse =
            serde_json::from_str(r#"{"completion":" ok","stop_reason":"stop_sequence"}"#)
                .expect("response parses");
        assert_eq!(response.completion, " ok");
    }

    #[test]
    fn alternate_queries_are_labelled_one_per_line() {
        let row = ResultRow {
            query: "lupus criteria".to_string(),
            alternate_queries: vec!["A1".to_string(), "A2".to_string()],
            thought_process: String::new(),
        };
        assert_eq!(
            row.formatted_alternate_queries(),
            "Alternate Query: A1\nAlternate Query: A2"
        );
    }

    #[test]
    fn progress_fraction_is_clamped() {
        assert_eq!(BatchProgress { completed: 0, total: 0 }.fraction(), 1.0);
        assert_eq!(BatchProgress { completed: 5, total: 5 }.fraction(), 1.0);
        assert!((BatchProgress { completed: 2, total: 5 }.fraction() - 0.4).abs() < f64::EPSILON);
    }
}
