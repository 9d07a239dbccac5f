use std::sync::{Arc, PoisonError};

use anyhow::{anyhow, bail};
use colored::Colorize;
use trellis_channel::{executor_for, ChannelConsumer, CompositeRequestChannel};
use trellis_memory::InMemoryConnection;
use trellis_request::{BatchRequestBuilder, Request, RequestType};
use trellis_types::ExecutionContext;

use crate::cli::*;
use crate::config::TrellisConfig;
use crate::report::{RequestSummary, RunReport, Status};
use crate::script::Script;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = TrellisConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => cmd_run(args, &config, cli.format),
        Command::Types => cmd_types(cli.format),
        Command::Config => cmd_config(&config, cli.format),
    }
}

fn cmd_run(args: RunArgs, config: &TrellisConfig, format: OutputFormat) -> anyhow::Result<()> {
    let script = Script::load(&args.script)?;
    let context = match args.user {
        Some(user) => ExecutionContext::for_user(user),
        None => ExecutionContext::new(),
    };
    let report = execute(script, config, args.mode, context)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    let failed = report.failed();
    if failed > 0 {
        bail!("{failed} of {} requests failed", report.requests.len());
    }
    Ok(())
}

/// Run `script` against a fresh in-memory repository.
pub fn execute(
    script: Script,
    config: &TrellisConfig,
    mode: RunMode,
    context: ExecutionContext,
) -> anyhow::Result<RunReport> {
    if script.is_empty() {
        bail!("script has no operations");
    }
    let connection = InMemoryConnection::with_config(config.memory.clone());
    let workspace = config.memory.default_workspace.clone();
    let requests = match mode {
        RunMode::Bulk => run_bulk(script, connection, &workspace)?,
        RunMode::Channel => run_channel(script, connection, &workspace, config, context)?,
    };
    Ok(RunReport { mode, requests })
}

fn run_bulk(
    script: Script,
    mut connection: InMemoryConnection,
    workspace: &str,
) -> anyhow::Result<Vec<RequestSummary>> {
    let mut builder = BatchRequestBuilder::new();
    script.apply(&mut builder, workspace)?;
    let request = builder
        .pop()
        .ok_or_else(|| anyhow!("script produced no requests"))?;
    let members = match connection.run(request) {
        Request::Composite(composite) => composite.into_requests(),
        single => vec![single],
    };
    Ok(members
        .iter()
        .enumerate()
        .map(|(index, request)| RequestSummary::of(index, request))
        .collect())
}

fn run_channel(
    script: Script,
    connection: InMemoryConnection,
    workspace: &str,
    config: &TrellisConfig,
    context: ExecutionContext,
) -> anyhow::Result<Vec<RequestSummary>> {
    let channel = Arc::new(CompositeRequestChannel::new());
    let executor = executor_for(&config.channel)?;
    channel.start(
        executor.as_ref(),
        ChannelConsumer::connection(connection, context),
        config.channel.close_consumer_on_completion,
    )?;

    let mut builder = channel.builder();
    let built = script
        .apply(&mut builder, workspace)
        .and_then(|()| builder.flush().map_err(anyhow::Error::from));
    channel.close();
    if let Err(err) = built {
        channel.cancel(true);
        return Err(err);
    }
    channel.wait()?;

    Ok(channel
        .all_requests()
        .iter()
        .enumerate()
        .map(|(index, shared)| {
            let request = shared.lock().unwrap_or_else(PoisonError::into_inner);
            RequestSummary::of(index, &request)
        })
        .collect())
}

fn print_report(report: &RunReport) {
    for summary in &report.requests {
        let marker = match summary.status {
            Status::Ok => "✓".green().bold(),
            Status::Failed => "✗".red().bold(),
            Status::Cancelled => "-".yellow(),
        };
        println!(
            "{} {:>3}  {}",
            marker,
            summary.index,
            summary.request_type.cyan()
        );
        if let Some(error) = &summary.error {
            println!("       {}", error.red());
        }
        for line in &summary.details {
            println!("       {}", line.dimmed());
        }
    }
    let failed = report.failed();
    let total = report.requests.len();
    if failed == 0 {
        println!("\n{} {} requests processed", "✓".green().bold(), total.to_string().bold());
    } else {
        println!(
            "\n{} {} of {} requests failed",
            "✗".red().bold(),
            failed.to_string().bold(),
            total
        );
    }
}

fn cmd_types(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let table: Vec<_> = RequestType::ALL
                .iter()
                .map(|t| serde_json::json!({ "ordinal": t.ordinal(), "label": t.label() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        OutputFormat::Text => {
            for request_type in RequestType::ALL {
                println!("{:>3}  {}", request_type.ordinal().to_string().yellow(), request_type.label());
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &TrellisConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", config.to_toml()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"[
        {"op": "create_node", "under": "/", "name": "docs",
         "properties": {"title": "Documents", "tags": ["a", "b"]}},
        {"op": "create_node", "under": "/docs", "name": "intro"},
        {"op": "set_property", "on": "/docs/intro", "name": "body", "value": "hello world"},
        {"op": "search", "expression": "hello"},
        {"op": "read_branch", "at": "/", "depth": 3}
    ]"#;

    fn run(text: &str, config: &TrellisConfig, mode: RunMode) -> RunReport {
        execute(Script::parse(text).unwrap(), config, mode, ExecutionContext::new()).unwrap()
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    #[test]
    fn bulk_run_reports_every_request() {
        let report = run(SCRIPT, &TrellisConfig::default(), RunMode::Bulk);
        assert_eq!(report.requests.len(), 5);
        assert_eq!(report.failed(), 0);
        assert!(report.requests[0].details[0].starts_with("/docs ("));
        assert_eq!(report.requests[3].request_type, "full-text search");
        assert!(report.requests[3].details[0].starts_with("/docs/intro"));
        assert_eq!(report.requests[4].details.len(), 3);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let report = run(
            r#"[
                {"op": "delete_branch", "at": "/missing"},
                {"op": "create_node", "under": "/", "name": "kept"},
                {"op": "verify_node_exists", "at": "/kept"}
            ]"#,
            &TrellisConfig::default(),
            RunMode::Bulk,
        );
        assert_eq!(report.failed(), 1);
        assert_eq!(report.requests[0].status, Status::Failed);
        assert!(report.requests[0].error.as_deref().unwrap().contains("/missing"));
        assert_eq!(report.requests[2].status, Status::Ok);
    }

    #[test]
    fn configured_repository_is_used() {
        let config = TrellisConfig::from_toml(
            r#"
            [memory]
            default_workspace = "main"
            predefined_workspaces = ["archive"]
            "#,
        )
        .unwrap();
        let report = run(r#"[{"op": "get_workspaces"}]"#, &config, RunMode::Bulk);
        assert_eq!(report.requests[0].details, vec!["archive".to_string(), "main".to_string()]);
    }

    #[test]
    fn empty_script_is_rejected() {
        let err = execute(Script::default(), &TrellisConfig::default(), RunMode::Bulk, ExecutionContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("no operations"));
    }

    // =========================================================================
    // Channel
    // =========================================================================

    #[test]
    fn channel_run_matches_bulk() {
        let bulk = run(SCRIPT, &TrellisConfig::default(), RunMode::Bulk);
        let streamed = run(SCRIPT, &TrellisConfig::default(), RunMode::Channel);
        assert_eq!(streamed.mode, RunMode::Channel);
        assert_eq!(streamed.requests.len(), bulk.requests.len());
        for (a, b) in streamed.requests.iter().zip(&bulk.requests) {
            assert_eq!(a.request_type, b.request_type);
            assert_eq!(a.status, b.status);
        }
    }

    #[test]
    fn channel_run_on_a_worker_pool() {
        let mut config = TrellisConfig::default();
        config.channel.worker_threads = 2;
        let report = run(SCRIPT, &config, RunMode::Channel);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn script_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.json");
        std::fs::write(&path, SCRIPT).unwrap();
        let script = Script::load(&path).unwrap();
        assert_eq!(script.len(), 5);
    }
}
