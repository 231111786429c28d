//! `hmux fetch` – submit every URL at once, then drive the engine from a
//! fixed host tick until all transfers have been reported.

use anyhow::{Context, Result};
use hmux_core::config::EngineConfig;
use hmux_core::{CollectingSink, Finished, Method, MultiContext};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub urls: Vec<String>,
    pub method: Method,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
    pub timeout_ms: Option<u64>,
    pub tick_ms: u64,
    pub include_body: bool,
    pub json: bool,
}

/// One line of `--json` output.
#[derive(Debug, Serialize)]
struct FetchRecord<'a> {
    id: usize,
    url: &'a str,
    ok: bool,
    code: i32,
    status: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    headers: &'a [String],
}

impl<'a> FetchRecord<'a> {
    fn from_finished(f: &'a Finished) -> Self {
        Self {
            id: f.id.as_usize(),
            url: &f.url,
            ok: f.is_success(),
            code: f.code.value(),
            status: f.status,
            body: f.body.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()),
            error: f.error.as_deref(),
            headers: &f.headers,
        }
    }
}

/// Only absolute http(s) URLs are handed to the engine.
pub(crate) fn validate_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid URL: {}", raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("unsupported scheme {:?} in {}", other, raw),
    }
}

fn print_finished(f: &Finished, include_body: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&FetchRecord::from_finished(f))?);
        return Ok(());
    }
    match (&f.body, &f.error) {
        (Some(body), _) => {
            println!("{} {} {} ({} bytes)", f.id, f.status, f.url, body.len());
            if include_body {
                println!("{}", String::from_utf8_lossy(body));
            }
        }
        (None, error) => {
            println!(
                "{} FAILED {} [{}]: {}",
                f.id,
                f.url,
                f.code,
                error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}

pub async fn run_fetch(cfg: &EngineConfig, args: FetchArgs) -> Result<()> {
    for url in &args.urls {
        validate_url(url)?;
    }

    let mut ctx = MultiContext::new(cfg.clone(), CollectingSink::new())
        .context("create multi context")?;
    let timeout_ms = args.timeout_ms.unwrap_or(cfg.default_timeout_ms);

    let mut submitted = 0usize;
    for url in &args.urls {
        let id = ctx
            .create_transfer(url, timeout_ms)
            .with_context(|| format!("create transfer for {}", url))?;
        for line in &args.headers {
            ctx.set_header(id, line)?;
        }
        match ctx.submit(id, args.method, &args.body) {
            Ok(()) => submitted += 1,
            Err(e) => {
                // Not registered: no completion will arrive for it.
                tracing::warn!("submit {} failed: {}", url, e);
                eprintln!("hmux: {} not submitted: {}", url, e);
                ctx.release(id)?;
            }
        }
    }
    tracing::info!(submitted, method = %args.method, "fetch started");

    let mut ticker = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut reported = 0usize;
    let mut failed = args.urls.len() - submitted;
    while reported < submitted {
        ticker.tick().await;
        ctx.poll().context("engine poll step failed")?;
        for f in ctx.sink_mut().drain() {
            reported += 1;
            if !f.is_success() {
                failed += 1;
            }
            print_finished(&f, args.include_body, args.json)?;
        }
    }
    ctx.teardown()?;

    if failed > 0 {
        anyhow::bail!("{} of {} transfers failed", failed, args.urls.len());
    }
    Ok(())
}
