// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nairabridge_server::api::router;
use nairabridge_server::assets::TokenRegistry;
use nairabridge_server::config::Config;
use nairabridge_server::exchange::{contract_ref, DepositListener, DepositSink, ExchangeSettlement};
use nairabridge_server::fiat::{PaystackClient, PaystackRail};
use nairabridge_server::oracle::{HttpRateFeed, PriceOracle};
use nairabridge_server::orchestrator::ExchangeOrchestrator;
use nairabridge_server::state::AppState;
use nairabridge_server::storage::{ActivityLedger, BankLedger, Store, WalletDirectory};
use nairabridge_server::vault::HmacStreamVault;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;

    let store = Store::open(&config.data_dir.join("nairabridge.redb"))?;
    let activities = ActivityLedger::new(store.clone());
    let bank_ledger = BankLedger::new(store.clone());
    let wallets = WalletDirectory::new(store.clone());

    let registry = TokenRegistry::from_config(&config)?;
    let vault_address = Address::from_str(&config.exchange_contract_address)?;
    info!(
        vault = %vault_address,
        vault_ref = %contract_ref(&config.exchange_contract_address),
        "Exchange vault configured"
    );

    let oracle = Arc::new(PriceOracle::new(
        Arc::new(HttpRateFeed::new(config.rate_source_url.as_str())?),
        Duration::from_secs(config.oracle_staleness_minutes * 60),
    ));

    let settlement = Arc::new(ExchangeSettlement::new(
        &config.ledger_rpc_url,
        &config.ledger_admin_key,
        &config.exchange_contract_address,
        registry.clone(),
    )?);

    let paystack = PaystackClient::new(
        config.paystack_api_base_url.as_str(),
        config.paystack_secret_key.as_str(),
    )?;
    let rail = Arc::new(PaystackRail::new(paystack.clone(), bank_ledger.clone()));

    let orchestrator = Arc::new(ExchangeOrchestrator::new(
        oracle.clone(),
        settlement,
        rail,
        activities.clone(),
        bank_ledger.clone(),
        wallets.clone(),
    ));

    // Background tasks share one cancellation token for coordinated shutdown.
    let shutdown = CancellationToken::new();
    oracle.spawn_periodic(
        Duration::from_secs(config.oracle_refresh_minutes * 60),
        shutdown.clone(),
    );
    let listener = DepositListener::new(
        store.clone(),
        activities.clone(),
        registry,
        orchestrator.clone() as Arc<dyn DepositSink>,
        config.ledger_rpc_url.clone(),
        vault_address,
    );
    tokio::spawn(listener.run(shutdown.clone()));

    let state = AppState {
        oracle,
        orchestrator,
        activities,
        bank_ledger,
        wallets,
        paystack,
        vault: Arc::new(HmacStreamVault::new(&config.vault_key)),
        webhook_secret: config.paystack_secret_key.clone(),
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "NairaBridge server listening (docs at /docs)");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
    shutdown.cancel();
}
