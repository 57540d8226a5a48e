//! Deskwallet CLI - desktop wallet bridge process
//!
//!   deskwallet serve                 → Serve the UI, the action API and QR images
//!   deskwallet qr <address> [--out]  → Write a payment QR PNG, output JSON
//!
//! Configuration (flags override env, env overrides defaults; `.env` is loaded first):
//!   DESKWALLET_NETWORK    bitcoin|testnet|signet|regtest
//!   DESKWALLET_ELECTRUM   Electrum server URL
//!   DESKWALLET_ASSETS     Static UI directory
//!   DESKWALLET_PORT       Listen port on 127.0.0.1 (0 = ephemeral)

use anyhow::{anyhow, bail, Context};
use deskwallet::codec;
use deskwallet::engine::bdk::BdkEngine;
use deskwallet::logging::init_logging;
use deskwallet::server::{create_router, AppState};
use deskwallet::{install_signal_handlers, ui, BridgeConfig, EventRouter, Network, UiDispatcher};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

fn main() {
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("deskwallet {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") | None => cmd_serve(&opts),
        Some("qr") => cmd_qr(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    let render = |value: &Value| {
        let formatted = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
        formatted.unwrap_or_else(|_| value.to_string())
    };

    match result {
        Ok(output) => println!("{}", render(&output)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)})));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    address: Option<String>,
    network: Option<String>,
    electrum_url: Option<String>,
    assets_dir: Option<String>,
    port: Option<u16>,
    out: Option<String>,
    size: Option<u32>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv();

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            let mut takes_value = true;
            match arg.as_str() {
                "--network" | "-n" => opts.network = value,
                "--electrum" | "-e" => opts.electrum_url = value,
                "--assets" | "-a" => opts.assets_dir = value,
                "--port" | "-p" => opts.port = value.and_then(|v| v.parse().ok()),
                "--out" | "-o" => opts.out = value,
                "--size" | "-s" => opts.size = value.and_then(|v| v.parse().ok()),
                _ => {
                    takes_value = false;
                    match arg.as_str() {
                        "--help" | "-h" => opts.help = true,
                        "--version" | "-V" => opts.version = true,
                        "--pretty" => opts.pretty = true,
                        _ if !arg.starts_with('-') => positional.push(arg.clone()),
                        _ => {} // Ignore unknown flags
                    }
                }
            }
            i += if takes_value { 2 } else { 1 };
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.address = positional.next();
        opts
    }

    /// Env-backed config with CLI flags applied on top.
    fn config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::from_env().context("Invalid environment")?;
        if let Some(raw) = self.network.as_deref() {
            let network = Network::from_str(raw).ok_or_else(|| anyhow!("Unknown network: {}", raw))?;
            config = config.with_network(network);
        }
        if let Some(url) = self.electrum_url.as_deref() {
            config = config.with_electrum(url);
        }
        if let Some(dir) = self.assets_dir.as_deref() {
            config = config.with_assets_dir(dir);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(size) = self.size {
            config.qr_size = size;
        }
        Ok(config)
    }
}

/// `KEY=value` lines from `./.env`; existing env vars win.
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"deskwallet - Desktop wallet bridge

USAGE:
    deskwallet [command] [address] [options]

COMMANDS:
    serve                   Serve UI assets, /api, /events and /img (default)
    qr <address>            Write the payment QR code for <address> as PNG

OPTIONS:
    --network, -n <net>     Network: bitcoin|testnet|signet|regtest (env: DESKWALLET_NETWORK)
    --electrum, -e <url>    Electrum server URL (env: DESKWALLET_ELECTRUM)
    --assets, -a <dir>      Static UI directory (default: assets, env: DESKWALLET_ASSETS)
    --port, -p <port>       Listen port on 127.0.0.1 (default: ephemeral, env: DESKWALLET_PORT)
    --out, -o <path>        qr: output file (default: <address>.png)
    --size, -s <px>         Minimum QR image size (default: 256)
    --pretty                Pretty-print JSON output
    --help, -h              Show this help
    --version, -V           Show version

LOGGING:
    RUST_LOG=debug          Log filter (default: info)
    DESKWALLET_LOG_JSON=1   JSON log lines on stderr"#
    );
}

fn cmd_qr(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.config()?;
    let Some(raw) = opts.address.as_deref() else { bail!("Usage: deskwallet qr <address>") };

    let address = codec::decode_for_network(raw, config.network)?;
    let png = codec::encode_payment_image(&address, config.qr_size)?;
    let path = PathBuf::from(opts.out.clone().unwrap_or_else(|| format!("{}.png", address)));
    std::fs::write(&path, &png).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(json!({
        "address": address.to_string(),
        "uri": codec::payment_uri(&address),
        "path": path.display().to_string(),
        "bytes": png.len(),
    }))
}

fn cmd_serve(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.config()?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;

    rt.block_on(async {
        let shutdown = install_signal_handlers();
        let mut shutdown_rx = shutdown.subscribe();

        let (notifier, queue) = ui::channel();
        let dispatcher = UiDispatcher::default();
        let ui_task = tokio::spawn(dispatcher.clone().run(queue));

        let engine = Arc::new(BdkEngine::new(config.network, config.electrum_url.clone()));
        let router = Arc::new(EventRouter::new(engine, notifier, &config));
        let state = AppState::new(router.clone(), dispatcher, &config).with_shutdown(shutdown.clone());
        let app = create_router(state, &config.assets_dir);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port))
            .await
            .context("Failed to bind")?;
        let addr = listener.local_addr().context("No local address")?;

        info!(network = config.network.as_str(), "Deskwallet listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /                - UI assets ({})", config.assets_dir.display());
        info!("  POST /api             - connect / send");
        info!("  GET  /events          - UI notifications (SSE)");
        info!("  GET  /img/:address    - Payment QR (PNG)");
        debug!("  GET  /state           - Current view state");
        debug!("  GET  /health          - Health check");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutdown signal received, stopping server...");
            })
            .await
            .context("Server error")?;

        router.shutdown().await;
        ui_task.abort();
        Ok(json!({"status": "stopped", "address": addr.to_string()}))
    })
}
