//! Process entry point: parses [`Config`], wires the durable store, RPC gateway,
//! and [`Engine`] together, and runs until `Ctrl+C`.

use std::sync::Arc;

use clap::Parser;
use frt_stress_test::rpc_gateway::{GatewayConfig, RpcGateway};
use frt_stress_test::{Config, Engine, Store};
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(Config::parse());
    info!("starting with config: {config:?}");

    let store = match Store::new(&config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("could not initialize the data directory: {e}");
            std::process::exit(1);
        }
    };

    let core_wallet = match store.load_core_wallet() {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            let wallet = frt_stress_test::types::CoreWallet::generate();
            if let Err(e) = store.save_core_wallet(&wallet) {
                error!("could not persist a newly generated core wallet: {e}");
                std::process::exit(1);
            }
            wallet
        }
        Err(e) => {
            error!("could not load the core wallet: {e}");
            std::process::exit(1);
        }
    };

    let gateway_config = GatewayConfig {
        allow_skip_preflight: config.skip_preflight,
        request_timeout: config.request_timeout(),
        confirm_timeout: config.request_timeout(),
    };
    let gateway = Arc::new(RpcGateway::new(config.rpc_url.clone(), gateway_config));

    let engine = Arc::new(Engine::new(config.clone(), store, gateway, config.program_id, &core_wallet));

    if let Err(e) = engine.start().await {
        error!("engine failed to start: {e}");
        std::process::exit(1);
    }
    info!("engine started");

    if tokio::signal::ctrl_c().await.is_err() {
        error!("could not install the Ctrl+C signal handler");
        std::process::exit(1);
    }

    info!("shutdown requested, stopping the engine");
    if let Err(e) = engine.stop().await {
        error!("engine failed to stop cleanly: {e}");
        std::process::exit(1);
    }
}
