use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::{ProviderBuilder, WsConnect};
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use op_relay_bridge::{
    ActionDispatcher, AlloyChainClient, EventListener, Metrics, PayloadCache, RelayBridgeArgs,
    RelayServer, WsLogSource,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = RelayBridgeArgs::parse();

    let log_level = args.log_level.to_string();
    if args.log_format.to_lowercase() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::new(log_level))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(log_level))
            .with_ansi(false)
            .init();
    }

    if let Err(e) = run(args).await {
        error!(error = ?e, "relay bridge failed");
        std::process::exit(1);
    }
}

async fn run(args: RelayBridgeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.metrics_port {
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(address = %metrics_addr, "starting metrics server");
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("setting up Prometheus endpoint")?;
    }

    let signer: PrivateKeySigner = args
        .builder_private_key
        .parse()
        .context("parsing builder private key")?;
    let wallet = EthereumWallet::from(signer);

    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_ws(WsConnect::new(args.chain_ws_url.clone()))
        .await
        .with_context(|| format!("connecting to chain at {}", args.chain_ws_url))?;

    let metrics = Arc::new(Metrics::default());
    let cache = PayloadCache::new();

    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let chain = Arc::new(AlloyChainClient::new(
        provider.clone(),
        args.contract_address,
    ));
    let dispatcher = ActionDispatcher::new(
        chain,
        args.relay_url.clone(),
        args.action_timeout(),
        args.dedup_capacity,
        metrics.clone(),
    );
    let listener = EventListener::new(
        WsLogSource::new(provider),
        args.contract_address,
        event_tx,
        args.reconnect_delay(),
        metrics.clone(),
    );
    let server = RelayServer::new(args.listen_addr, cache.clone(), metrics.clone());

    info!(
        contract = %args.contract_address,
        listen_addr = %args.listen_addr,
        "starting relay bridge"
    );

    let token = CancellationToken::new();

    let dispatcher_task = tokio::spawn(dispatcher.run(event_rx));
    let listener_token = token.clone();
    let listener_task = tokio::spawn(async move { listener.run(listener_token).await });
    let server_token = token.clone();
    let server_task = tokio::spawn(async move { server.listen(server_token).await });

    let result = tokio::select! {
        res = listener_task => {
            res.context("listener task panicked")?
        }
        res = server_task => {
            res.context("server task panicked")?
        }
        res = dispatcher_task => {
            res.context("dispatcher task panicked")?;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    token.cancel();
    result
}
