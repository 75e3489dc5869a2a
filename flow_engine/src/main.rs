/// main.rs: Replay entry point
///
/// Drives the order-flow engine from a recorded event file:
///   1. Load config from .env / FLOW_* variables
///   2. Read JSON-lines events ({"type":"tick",...} / {"type":"bar",...})
///   3. Write one JSON bar snapshot per line to stdout
///   4. Log POC / VAH / VAL for every profile and TPO session
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flow_engine::{Bar, EngineConfig, OrderFlowEngine, Tick};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Event {
    Tick(Tick),
    Bar(Bar),
}

fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────
    let cfg = EngineConfig::from_env()?;
    let input = env::args()
        .nth(1)
        .or_else(|| env::var("FLOW_REPLAY_INPUT").ok())
        .context("usage: replay <events.jsonl>  (or set FLOW_REPLAY_INPUT)")?;

    info!(
        "Config: tick_size={} weighting={:?} vwap={} profile={}",
        cfg.tick_size,
        cfg.order_flow.scheme(),
        cfg.vwap.price_source,
        cfg.volume_profile.period
    );

    let mut engine = OrderFlowEngine::new(cfg).context("engine config rejected")?;

    // ── Replay ───────────────────────────────────────────────────────────
    let file = File::open(&input).with_context(|| format!("opening {input}"))?;
    let reader = BufReader::new(file);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let (mut ticks, mut bars, mut skipped) = (0u64, 0u64, 0u64);
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {input}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: Event = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(e) => {
                skipped += 1;
                warn!(line = n + 1, error = %e, "unparseable event skipped");
                continue;
            }
        };
        match event {
            Event::Tick(t) => {
                if engine.on_tick(&t) {
                    ticks += 1;
                }
            }
            Event::Bar(b) => {
                let snap = engine.on_bar_close(&b);
                serde_json::to_writer(&mut out, &snap)?;
                out.write_all(b"\n")?;
                bars += 1;
            }
        }
    }
    out.flush()?;

    // ── Summary ──────────────────────────────────────────────────────────
    info!(
        "Replayed {} ticks, {} bars ({} dropped, {} unparseable)",
        ticks, bars, engine.ticks_dropped(), skipped
    );
    for p in engine.volume_profiles() {
        info!(
            "Volume profile bars {}..={} date={:?} volume={:.0} POC={:?} VAH={:?} VAL={:?}",
            p.start_bar, p.end_bar, p.session_date, p.total_volume(), p.poc(), p.vah(), p.val()
        );
    }
    for s in engine.tpo_sessions() {
        info!(
            "TPO {} bars {}..={} POC={:?} VAH={:?} VAL={:?}",
            s.date, s.start_bar, s.end_bar, s.poc(), s.vah(), s.val()
        );
    }
    info!("Final CVD {:.0}", engine.cvd());

    Ok(())
}
