//! Command-line entry point: classify and execute one input through the
//! brain kernel, printing the resulting trace.

use brain_kernel::prelude::*;
use brain_kernel::ids::UnitId;
use brain_kernel::unit::ResourceEstimate;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "brain-kernel", about = "Cognitive request processor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Commands {
    /// Classify and execute a single input.
    Run {
        /// Input text. Reads from stdin if omitted.
        text: Option<String>,
        /// Print the full JSON trace instead of a human summary.
        #[arg(long)]
        json: bool,
    },
    /// Classify an input without executing a strategy.
    Classify {
        text: Option<String>,
    },
    /// Print the effective configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,brain_kernel=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { text, json } => {
            let input = resolve_input(text)?;
            let kernel = build_demo_kernel();

            info!(chars = input.len(), "dispatching request");
            let result = kernel.process(&input).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
        }
        Commands::Classify { text } => {
            let input = resolve_input(text)?;
            let classifier = Classifier::new();
            let classification = classifier.classify(&input).await?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::ShowConfig => {
            let config = KernelConfig::load()?;
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn resolve_input(text: Option<String>) -> anyhow::Result<String> {
    match text {
        Some(t) => Ok(t),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf.trim().to_string())
        }
    }
}

fn print_summary(result: &ExecutionResult) {
    println!("strategy: {}", result.strategy_used);
    if let Some(c) = &result.classification {
        println!("classified as: {} (risk {:?}, {:?})", c.primary_unit, c.risk_level, c.method);
    }
    println!("replans: {}", result.replan_count);
    println!("final content:\n{}", serde_json::to_string_pretty(&result.final_content).unwrap_or_default());
}

/// Wires up a registry covering every canonical unit with a minimal
/// passthrough implementation, so the binary is runnable standalone
/// without requiring a caller to supply real lobes first.
fn build_demo_kernel() -> BrainKernel {
    let registry = Arc::new(UnitRegistry::new());
    for id in UnitId::canonical() {
        registry.register(Arc::new(PassthroughUnit(id.clone())));
    }

    BrainKernel::new(registry, Classifier::new())
        .with_outcome_logger(OutcomeLogger::default())
}

/// A stand-in lobe that echoes its input back as content. Real
/// deployments register their own units in place of this one.
struct PassthroughUnit(UnitId);

#[async_trait]
impl Unit for PassthroughUnit {
    fn id(&self) -> UnitId {
        self.0.clone()
    }

    async fn process(
        &self,
        input: &str,
        _state: &Blackboard,
        _cancel: CancellationToken,
    ) -> Result<LobeResult> {
        let content: Value = json!({
            "unit": self.0.to_string(),
            "echo": input,
        });
        Ok(LobeResult::new(self.0.clone(), content, 0.6))
    }

    fn estimate_fitness(&self, _text: &str) -> f64 {
        0.4
    }

    fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
        ResourceEstimate::default()
    }
}
