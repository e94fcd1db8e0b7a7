use crate::cli::{Commands, ModeArg, SyncArgs};
use anyhow::Context;
use feedsync_core::{NormalizeStats, SyncEngine, SyncMode, SyncReport, normalize_file};
use feedsync_integrations::BilibiliConnector;
use std::path::Path;
use std::sync::Arc;

pub async fn run(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Sync { mode, args } => print_sync(mode, &args).await?,
        Commands::Full { args } => print_sync(ModeArg::Full, &args).await?,
        Commands::Incremental { args } => print_sync(ModeArg::Incremental, &args).await?,
        Commands::Normalize { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            let stats = normalize(&input, &output).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Config { args } => {
            println!("{}", serde_json::to_string_pretty(&effective_config(&args))?);
        }
    }
    Ok(())
}

async fn print_sync(mode: ModeArg, args: &SyncArgs) -> anyhow::Result<()> {
    let report = sync(mode, args).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tracing::instrument(level = "info", skip(args))]
pub async fn sync(mode: ModeArg, args: &SyncArgs) -> anyhow::Result<SyncReport> {
    let cfg = args.sync_config();
    if let Err(e) = cfg.validate() {
        tracing::error!(error = %e, "missing or invalid configuration");
        return Err(e).context("set --host-mid or FEEDSYNC_HOST_MID to the feed owner's mid");
    }

    let connector = BilibiliConnector::new(&args.bilibili_config(), cfg.target_id)?;
    let engine = SyncEngine::new(Arc::new(connector), &cfg)?;
    let report = engine.run(SyncMode::from(mode)).await?;
    Ok(report)
}

pub async fn normalize(input: &Path, output: &Path) -> anyhow::Result<NormalizeStats> {
    let stats = normalize_file(input, output)
        .await
        .with_context(|| format!("normalize {}", input.display()))?;
    Ok(stats)
}

/// Effective settings with the cookie redacted.
pub fn effective_config(args: &SyncArgs) -> serde_json::Value {
    let sync = args.sync_config();
    let http = args.bilibili_config();
    serde_json::json!({
        "host_mid": args.host_mid,
        "output_path": sync.output_path.display().to_string(),
        "delay_secs": sync.delay.as_secs_f64(),
        "web_location": sync.locale_tag,
        "base_url": http.base_url,
        "user_agent": http.user_agent,
        "accept_language": http.accept_language,
        "origin": http.origin,
        "referer": http.referer_for(sync.target_id),
        "cookie": http.redacted_cookie(),
        "timeout_secs": http.timeout.as_secs_f64(),
    })
}
