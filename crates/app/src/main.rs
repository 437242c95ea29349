use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use query_expansion_core::{
    parse_rows, render_expansion, render_rows, BatchProgress, BedrockConfig, BedrockRuntimeClient,
    QueryExpander, SamplingParameters, DEFAULT_MODEL_ID, SAMPLE_QUERIES,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "query-expansion", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model runtime base URL
    #[arg(long, env = "BEDROCK_ENDPOINT")]
    endpoint: Option<String>,

    /// Model identifier
    #[arg(long, env = "BEDROCK_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    /// Bearer token for the model runtime
    #[arg(long, env = "BEDROCK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value = "0.1", value_parser = parse_unit_interval)]
    temperature: f32,

    /// Nucleus sampling cutoff
    #[arg(long, default_value = "0.9", value_parser = parse_unit_interval)]
    top_p: f32,

    /// Number of candidate tokens considered per step
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=500))]
    top_k: u32,

    /// Maximum tokens to sample
    #[arg(long, default_value = "1024", value_parser = clap::value_parser!(u32).range(0..=2048))]
    max_tokens: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a single query and print the raw model answer.
    Expand {
        /// Search query
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Expand the provided sample queries and print the parsed expansions.
    Samples {
        /// Number of model calls kept in flight.
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
    },
    /// Parse a saved aggregate response document without calling the model.
    Parse {
        /// Path to the XML document.
        #[arg(long)]
        file: String,
    },
}

fn parse_unit_interval(raw: &str) -> Result<f32, String> {
    let value: f32 = raw
        .parse()
        .map_err(|error| format!("`{raw}` is not a number: {error}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("`{raw}` is not within 0.0..=1.0"))
    }
}

impl Cli {
    fn sampling_parameters(&self) -> SamplingParameters {
        SamplingParameters {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
        }
    }

    fn expander(&self) -> anyhow::Result<QueryExpander<BedrockRuntimeClient>> {
        let endpoint = self
            .endpoint
            .clone()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .context("a model endpoint is required (--endpoint or BEDROCK_ENDPOINT)")?;

        let config = BedrockConfig {
            endpoint,
            model_id: self.model_id.clone(),
            api_key: self.api_key.clone(),
        };
        let client = BedrockRuntimeClient::new(config)?;
        info!(url = %client.invoke_url(), "model runtime configured");

        Ok(QueryExpander::new(client, self.sampling_parameters())?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "query-expansion boot"
    );

    match &cli.command {
        Command::Expand { query } => {
            if query.trim().is_empty() {
                warn!("expanding an empty query");
            }
            let expander = cli.expander()?;
            let expansion = expander.expand(query).await?;

            println!("Query Expansion Determination Results");
            print!("{}", render_expansion(&expansion));
        }
        Command::Samples { concurrency } => {
            let expander = cli.expander()?;

            println!("Provided Sample Queries");
            for query in SAMPLE_QUERIES {
                println!("- {query}");
            }
            println!();

            let report = expander
                .run_batch(&SAMPLE_QUERIES, usize::from(*concurrency), report_progress)
                .await?;

            info!(
                batch_id = %report.batch_id,
                elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "sample batch finished"
            );

            println!("Query Expansion Determinations");
            print!("{}", render_rows(&report.rows));
        }
        Command::Parse { file } => {
            let document = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("unable to read {file}"))?;
            let rows = parse_rows(&document)?;

            if rows.is_empty() {
                warn!(file = %file, "document contains no responses");
            }
            print!("{}", render_rows(&rows));
        }
    }

    Ok(())
}

fn report_progress(progress: BatchProgress) {
    eprintln!(
        "Creating query expansions... {:>3.0}% ({}/{})",
        progress.fraction() * 100.0,
        progress.completed,
        progress.total
    );
}
