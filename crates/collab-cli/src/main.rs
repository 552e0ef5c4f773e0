//! Collab Deploy - collaborative classifier deployment CLI
//!
//! The `collab-deploy` command provisions a collaboratively-trained
//! classifier and registers it with the model index.
//!
//! ## Commands
//!
//! - `deploy`: Provision every component and register the model
//! - `plan`: Print the provisioning plan without contacting any remote
//! - `convert`: Write the fixed-point form of a model's coefficients

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collab_chain::{RelayClient, RelayConfig};
use collab_core::{
    from_fixed_point, init_tracing, to_fixed_point_scalar, to_fixed_point_vector, DeployConfig,
    LogFormat, ModelSource, ProvisionSpan,
};
use collab_provision::{
    deploy_model, prepare_plan, write_report_json, DeployRequest, HttpModelIndex, PlannedStage,
    ProvisioningPlan, RegistrationMode,
};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "collab-deploy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy collaboratively-trained classifiers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Deployment configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model coefficient file, overriding `model.source`
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision all components, hand control to the coordinator and
    /// register the model
    Deploy {
        /// Relay endpoint, overriding `chain.relay_url`
        #[arg(long)]
        relay_url: Option<String>,

        /// Model index base URL, overriding `registry.base_url`
        #[arg(long)]
        registry_url: Option<String>,

        /// Write the deployment report (JSON) here, on success or failure
        #[arg(long)]
        report: Option<PathBuf>,

        /// Do nothing and exit successfully
        #[arg(long)]
        skip: bool,

        /// Continuous-integration flag; `true` makes registration failures non-fatal
        #[arg(long, env = "CI", hide_env_values = true)]
        ci: Option<String>,
    },

    /// Show the provisioning plan without contacting any remote
    Plan,

    /// Convert the model's coefficients to fixed point and write them as JSON
    Convert {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Deploy {
            relay_url,
            registry_url,
            report,
            skip,
            ci,
        } => {
            if skip {
                info!("Skipping deployment");
                return Ok(());
            }
            let mut config = config;
            if let Some(url) = relay_url {
                config.chain.relay_url = url;
            }
            if let Some(url) = registry_url {
                config.registry.base_url = url;
            }
            let mode = RegistrationMode::from_ci_flag(ci.as_deref());
            cmd_deploy(&config, cli.model.as_deref(), mode, report.as_deref()).await
        }
        Commands::Plan => cmd_plan(&config, cli.model.as_deref()),
        Commands::Convert { output } => {
            cmd_convert(&config, cli.model.as_deref(), output.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    match path {
        Some(path) => DeployConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Ok(DeployConfig::default()),
    }
}

fn load_model(config: &DeployConfig, override_path: Option<&Path>) -> Result<ModelSource> {
    let path = override_path.unwrap_or(config.model.source.as_path());
    ModelSource::load(path).with_context(|| format!("Failed to load model from {:?}", path))
}

fn build_request(
    config: &DeployConfig,
    model: Option<&Path>,
    mode: RegistrationMode,
) -> Result<DeployRequest> {
    let source = load_model(config, model)?;
    DeployRequest::from_config(config, source, mode).context("Invalid deployment request")
}

async fn cmd_deploy(
    config: &DeployConfig,
    model: Option<&Path>,
    mode: RegistrationMode,
    report_path: Option<&Path>,
) -> Result<()> {
    let request = build_request(config, model, mode)?;

    let mut relay_config = RelayConfig::new(&config.chain.relay_url);
    if let Some(secs) = config.chain.request_timeout_secs {
        relay_config = relay_config.with_timeout(Duration::from_secs(secs));
    }
    let relay = RelayClient::new(relay_config).context("Failed to create relay client")?;
    let index = HttpModelIndex::new(
        &config.registry.base_url,
        Duration::from_secs(config.registry.request_timeout_secs),
    )
    .context("Failed to create model index client")?;

    info!(
        relay = %config.chain.relay_url,
        index = %index.endpoint(),
        mode = ?mode,
        "Starting deployment"
    );

    let result = deploy_model(&relay, &index, &request).await;

    let report = match &result {
        Ok(outcome) => Some(&outcome.deployment.report),
        Err(err) => err.report(),
    };
    if let (Some(path), Some(report)) = (report_path, report) {
        write_report_json(path, report)?;
        info!(path = ?path, "Wrote deployment report");
    }

    let outcome = result.context("Deployment failed")?;
    println!("Coordinator: {}", outcome.deployment.coordinator.address);
    println!("Classifier:  {}", outcome.deployment.classifier.address);
    println!("Data:        {}", outcome.deployment.data_handler.address);
    println!("Incentive:   {}", outcome.deployment.incentive_mechanism.address);
    if !outcome.registration.is_registered() {
        println!("Registration skipped (CI)");
    }
    Ok(())
}

fn cmd_plan(config: &DeployConfig, model: Option<&Path>) -> Result<()> {
    let _span = ProvisionSpan::enter("dry-run", &config.model.name);
    let request = build_request(config, model, RegistrationMode::Strict)?;
    let plan = prepare_plan(&request).context("Failed to build provisioning plan")?;
    print!("{}", render_plan(&plan));
    Ok(())
}

fn render_plan(plan: &ProvisioningPlan) -> String {
    let mut out = format!(
        "{} weights, {} updates, digest {}\n",
        plan.total_weights(),
        plan.update_count(),
        plan.weights_digest()
    );
    for (i, stage) in plan.stages().iter().enumerate() {
        let detail = match stage {
            PlannedStage::CreateClassifier { labels, initial, .. } => format!(
                "labels={} weights=[0..{})",
                labels.join(","),
                initial.end_offset()
            ),
            PlannedStage::ApplyWeights(chunk) => {
                format!("weights=[{}..{})", chunk.start_offset, chunk.end_offset())
            }
            _ => String::new(),
        };
        out.push_str(&format!("{:>3}. {:<28} {}\n", i + 1, stage.id(), detail));
    }
    out
}

/// Fixed-point form of a model, as written by `convert`.
#[derive(Debug, Serialize)]
struct ConvertedModel {
    scale: i64,
    digest: String,
    intercept: i64,
    coef: Vec<i64>,
    /// Largest decimal error introduced by rounding.
    max_error: f64,
}

fn convert_model(config: &DeployConfig, source: &ModelSource) -> Result<ConvertedModel> {
    let scale = config.scale()?;
    let weights = to_fixed_point_vector(&source.coef, scale).context("Failed to convert coef")?;
    let intercept =
        to_fixed_point_scalar(source.intercept, scale).context("Failed to convert intercept")?;
    let max_error = source
        .coef
        .iter()
        .zip(weights.as_slice())
        .map(|(&original, &fixed)| (original - from_fixed_point(fixed, scale)).abs())
        .fold(0.0, f64::max);

    Ok(ConvertedModel {
        scale: scale.get(),
        digest: weights.digest(),
        intercept: intercept.value(),
        coef: weights.into_values(),
        max_error,
    })
}

fn cmd_convert(config: &DeployConfig, model: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let source = load_model(config, model)?;
    let converted = convert_model(config, &source)?;
    let json = serde_json::to_string_pretty(&converted)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Wrote {} weights to {:?}", converted.coef.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_model(dir: &Path, coef: &[f64]) -> PathBuf {
        let path = dir.join("model.json");
        let body = serde_json::json!({ "coef": coef, "intercept": 0.5 });
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[test]
    fn test_cli_parses_deploy_overrides() {
        let cli = Cli::try_parse_from([
            "collab-deploy",
            "--model",
            "m.json",
            "deploy",
            "--relay-url",
            "http://relay:8545",
            "--ci",
            "true",
        ])
        .unwrap();
        assert_eq!(cli.model, Some(PathBuf::from("m.json")));
        match cli.command {
            Commands::Deploy { relay_url, ci, skip, .. } => {
                assert_eq!(relay_url.as_deref(), Some("http://relay:8545"));
                assert_eq!(ci.as_deref(), Some("true"));
                assert!(!skip);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_render_plan_lists_offsets() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = write_model(temp_dir.path(), &[0.25; 600]);
        let config = DeployConfig::default();

        let request = build_request(&config, Some(&model), RegistrationMode::Strict).unwrap();
        let plan = prepare_plan(&request).unwrap();
        let rendered = render_plan(&plan);

        assert!(rendered.starts_with("600 weights, 2 updates"));
        assert!(rendered.contains("apply_weights@250"));
        assert!(rendered.contains("weights=[500..600)"));
        assert!(rendered.contains("transfer_control"));
    }

    #[test]
    fn test_convert_writes_fixed_point_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = write_model(temp_dir.path(), &[0.1, -0.000000002, 3.0]);
        let output = temp_dir.path().join("fixed.json");
        let config = DeployConfig::default();

        cmd_convert(&config, Some(&model), Some(&output)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["scale"], 1_000_000_000i64);
        assert_eq!(written["intercept"], 500_000_000i64);
        assert_eq!(
            written["coef"],
            serde_json::json!([100_000_000i64, -2i64, 3_000_000_000i64])
        );
    }

    #[test]
    fn test_missing_model_file_is_an_error() {
        let config = DeployConfig::default();
        let err = cmd_plan(&config, Some(Path::new("/nonexistent/model.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load model"));
    }

    #[tokio::test]
    async fn test_deploy_against_unreachable_relay_fails_and_writes_report() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = write_model(temp_dir.path(), &[0.25; 10]);
        let report = temp_dir.path().join("report.json");
        let mut config = DeployConfig::default();
        config.chain.relay_url = "http://127.0.0.1:1".to_string();
        config.chain.request_timeout_secs = Some(2);

        let result = cmd_deploy(&config, Some(&model), RegistrationMode::Relaxed, Some(&report)).await;

        assert!(result.is_err());
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(written["success"], false);
        assert_eq!(written["stages"][0]["stage"], "create_data_handler");
        assert_eq!(written["stages"][0]["status"], "failed");
    }
}
