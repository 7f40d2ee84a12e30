// LeadFlow CLI Entry Point
// Runs one pipeline turn and prints the result as JSON.

use anyhow::{bail, Context};
use leadflow_core::brain::few_shot::ExampleLibrary;
use leadflow_core::models::Lead;
use leadflow_core::telemetry::init_subscriber;
use leadflow_core::{ConversationContext, Orchestrator, PipelineConfig, TenantConfig};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

const USAGE: &str = "usage: leadflow <message> [--context FILE] [--tenant FILE] [--examples FILE]";

// --- Arguments ---
#[derive(Debug, Default)]
struct Args {
    message: String,
    context: Option<PathBuf>,
    tenant: Option<PathBuf>,
    examples: Option<PathBuf>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut message = None;
    let mut iter = raw.into_iter();

    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--context" => &mut args.context,
            "--tenant" => &mut args.tenant,
            "--examples" => &mut args.examples,
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            _ => {
                if message.replace(arg.clone()).is_some() {
                    bail!("more than one message given\n{}", USAGE);
                }
                continue;
            }
        };
        let value = iter.next().with_context(|| format!("{} needs a file path", arg))?;
        *slot = Some(PathBuf::from(value));
    }

    args.message = message.filter(|m| !m.trim().is_empty()).context(USAGE)?;
    Ok(args)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    init_subscriber("leadflow")?;
    let config = PipelineConfig::from_env()?;
    info!(
        provider = %config.provider_base_url,
        model = %config.chat_model,
        "Starting LeadFlow turn"
    );

    let context = match &args.context {
        Some(path) => read_json::<ConversationContext>(path)?,
        None => ConversationContext::new(Lead {
            phone: "unknown".to_string(),
            ..Default::default()
        }),
    };
    let tenant = args
        .tenant
        .as_deref()
        .map(read_json::<TenantConfig>)
        .transpose()?;

    let mut orchestrator = Orchestrator::from_config(&config);
    if let Some(path) = &args.examples {
        let library = ExampleLibrary::from_json_file(path)?;
        info!(examples = library.len(), "Loaded example library");
        orchestrator = orchestrator.with_library(library);
    }

    let result = orchestrator
        .run(&args.message, &context, tenant.as_ref())
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
