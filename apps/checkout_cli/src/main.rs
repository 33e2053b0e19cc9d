use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use checkout_host::InMemoryCheckoutHost;
use clap::{Parser, Subcommand};
use coupon_core::{ApplyOutcome, CouponWidget, RemoveOutcome, RollbackOutcome, WidgetSnapshot};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_catalog_endpoint, DEFAULT_CONFIG_PATH};

/// Drives the checkout coupon widget against a simulated checkout host.
#[derive(Parser, Debug)]
#[command(name = "checkout-cli")]
struct Args {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// GraphQL endpoint serving coupon metaobjects.
    #[arg(long)]
    catalog_endpoint: Option<String>,
    /// Discount codes already applied when the session starts.
    #[arg(long = "applied")]
    applied: Vec<String>,
    /// Codes the simulated host refuses to add.
    #[arg(long = "reject")]
    reject: Vec<String>,
    /// Codes whose host calls fail outright.
    #[arg(long = "unavailable")]
    unavailable: Vec<String>,
    /// Artificial latency per host call, in milliseconds.
    #[arg(long, default_value_t = 0)]
    host_latency_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the loaded coupon catalog.
    Catalog,
    /// Apply a coupon as the only active discount.
    Apply { code: String },
    /// Remove an applied discount code.
    Remove { code: String },
    /// Run several steps in order, e.g. `--step apply:FLAT20 --step remove:FLAT20`.
    Session {
        #[arg(long = "step", required = true)]
        steps: Vec<Step>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Apply(String),
    Remove(String),
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let Some((action, code)) = raw.split_once(':') else {
            bail!("step '{raw}' must look like apply:CODE or remove:CODE");
        };
        let code = code.trim();
        if code.is_empty() {
            bail!("step '{raw}' is missing a coupon code");
        }
        match action.trim().to_ascii_lowercase().as_str() {
            "apply" => Ok(Self::Apply(code.to_string())),
            "remove" => Ok(Self::Remove(code.to_string())),
            other => bail!("unknown step action '{other}'"),
        }
    }
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: String,
    outcome: String,
    snapshot: WidgetSnapshot,
}

fn describe_apply(outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::Applied { removals } if removals.failed.is_empty() => "applied".into(),
        ApplyOutcome::Applied { removals } => format!(
            "applied; {} active code(s) could not be removed",
            removals.failed.len()
        ),
        ApplyOutcome::AlreadyApplied => "already applied".into(),
        ApplyOutcome::Busy => "rejected: another operation is in flight".into(),
        ApplyOutcome::Failed {
            error, rollback, ..
        } => {
            let rollback = match rollback {
                RollbackOutcome::NotNeeded => "nothing to restore".to_string(),
                RollbackOutcome::Restored(code) => format!("restored {code}"),
                RollbackOutcome::Failed { code, reason } => {
                    format!("could not restore {code}: {reason}")
                }
            };
            format!("failed: {error}; {rollback}")
        }
    }
}

fn describe_remove(outcome: &RemoveOutcome) -> String {
    match outcome {
        RemoveOutcome::Removed => "removed".into(),
        RemoveOutcome::Busy => "rejected: another operation is in flight".into(),
        RemoveOutcome::Failed(error) => format!("failed: {error}"),
    }
}

async fn run_step(widget: &CouponWidget, step: &Step) -> StepReport {
    let (label, outcome) = match step {
        Step::Apply(code) => (
            format!("apply:{code}"),
            describe_apply(&widget.apply(code).await),
        ),
        Step::Remove(code) => (
            format!("remove:{code}"),
            describe_remove(&widget.remove(code).await),
        ),
    };
    info!(step = %label, %outcome, "session: step finished");
    StepReport {
        step: label,
        outcome,
        snapshot: widget.snapshot(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(endpoint) = args.catalog_endpoint {
        settings.catalog_endpoint = Some(normalize_catalog_endpoint(&endpoint)?);
    }
    debug!(?settings, "settings loaded");

    let host = Arc::new(
        InMemoryCheckoutHost::new()
            .with_applied(args.applied)
            .with_rejected(args.reject)
            .with_unavailable(args.unavailable)
            .with_latency(Duration::from_millis(args.host_latency_ms)),
    );
    let widget = CouponWidget::new(host, settings.catalog_strategy()?, settings.widget_config());
    let catalog = widget.load_catalog().await;

    let steps = match args.command {
        Command::Catalog => {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
            return Ok(());
        }
        Command::Apply { code } => vec![Step::Apply(code)],
        Command::Remove { code } => vec![Step::Remove(code)],
        Command::Session { steps } => steps,
    };

    for step in &steps {
        let report = run_step(&widget, step).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
