// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ActivityListResponse, ActivityStatsResponse, AssetRate, BalanceResponse,
        CreateVirtualAccountRequest, HealthResponse, InitializePaymentRequest,
        InitializePaymentResponse, PaymentVerifyResponse, QuoteRequest, QuoteResponse, RatesResponse,
        RegisterWalletRequest, SwapRequest, SwapResponse, TransferRequest, TransferResponse,
        VirtualAccountResponse, WalletResponse,
    },
    state::AppState,
    storage::{Activity, ActivityMetadata, ActivityStatus, ActivityType, BankAccount},
};

pub mod exchange;
pub mod fiat;
pub mod health;
pub mod users;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/swap", post(exchange::execute_swap))
        .route("/quote", post(exchange::quote))
        .route("/rates", get(exchange::current_rates))
        .route("/payments/initialize", post(fiat::initialize_payment))
        .route("/payments/{reference}/verify", get(fiat::verify_payment))
        .route("/transfers", post(fiat::transfer))
        .route("/users/{user_id}/activities", get(users::list_activities))
        .route(
            "/users/{user_id}/activities/stats",
            get(users::activity_stats),
        )
        .route("/users/{user_id}/balance", get(users::balance))
        .route(
            "/users/{user_id}/virtual-account",
            post(users::create_virtual_account),
        )
        .route("/users/{user_id}/wallet", post(users::register_wallet))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/webhook/paystack", post(webhook::paystack_webhook))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        exchange::execute_swap,
        exchange::quote,
        exchange::current_rates,
        fiat::initialize_payment,
        fiat::verify_payment,
        fiat::transfer,
        users::list_activities,
        users::activity_stats,
        users::balance,
        users::create_virtual_account,
        users::register_wallet,
        webhook::paystack_webhook,
        health::health
    ),
    components(
        schemas(
            SwapRequest,
            SwapResponse,
            QuoteRequest,
            QuoteResponse,
            RatesResponse,
            AssetRate,
            BalanceResponse,
            ActivityListResponse,
            ActivityStatsResponse,
            CreateVirtualAccountRequest,
            VirtualAccountResponse,
            InitializePaymentRequest,
            InitializePaymentResponse,
            PaymentVerifyResponse,
            TransferRequest,
            TransferResponse,
            RegisterWalletRequest,
            WalletResponse,
            HealthResponse,
            Activity,
            ActivityType,
            ActivityStatus,
            ActivityMetadata,
            BankAccount
        )
    ),
    tags(
        (name = "Exchange", description = "Swap execution, quotes and rates"),
        (name = "Fiat", description = "Card payments and internal transfers"),
        (name = "Users", description = "Activities, balances and virtual accounts"),
        (name = "Webhooks", description = "Payment processor callbacks"),
        (name = "Health", description = "Service probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use alloy::primitives::Address;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::exchange::{SettlementError, SettlementLeg, SettlementOutcome};
    use crate::fiat::paystack::{PaystackClient, PaystackError, TransferReceipt};
    use crate::fiat::FiatRail;
    use crate::oracle::{HttpRateFeed, PriceOracle};
    use crate::orchestrator::ExchangeOrchestrator;
    use crate::storage::{
        test_support::temp_store, ActivityLedger, BankAccount, BankLedger, WalletDirectory,
    };
    use crate::vault::HmacStreamVault;

    struct NoopSettlement;

    #[async_trait]
    impl SettlementLeg for NoopSettlement {
        async fn pay_out(
            &self,
            _asset: crate::assets::Asset,
            _recipient: Address,
            _amount: Decimal,
        ) -> Result<SettlementOutcome, SettlementError> {
            Ok(SettlementOutcome {
                tx_id: "0x0".to_string(),
                success: true,
            })
        }
    }

    struct NoopRail;

    #[async_trait]
    impl FiatRail for NoopRail {
        async fn ensure_transfer_recipient(
            &self,
            _account: &BankAccount,
        ) -> Result<String, PaystackError> {
            Ok("RCP_0".to_string())
        }

        async fn pay_out(
            &self,
            _recipient_code: &str,
            _amount_kobo: i64,
            _narration: &str,
        ) -> Result<TransferReceipt, PaystackError> {
            Ok(TransferReceipt {
                transfer_code: "TRF_0".to_string(),
                status: "success".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (_dir, store) = temp_store();
        let oracle = Arc::new(PriceOracle::new(
            Arc::new(HttpRateFeed::new("http://127.0.0.1:1").unwrap()),
            Duration::from_secs(3600),
        ));
        let orchestrator = Arc::new(ExchangeOrchestrator::new(
            oracle.clone(),
            Arc::new(NoopSettlement),
            Arc::new(NoopRail),
            ActivityLedger::new(store.clone()),
            BankLedger::new(store.clone()),
            WalletDirectory::new(store.clone()),
        ));
        let state = AppState {
            oracle,
            orchestrator,
            activities: ActivityLedger::new(store.clone()),
            bank_ledger: BankLedger::new(store.clone()),
            wallets: WalletDirectory::new(store),
            paystack: PaystackClient::new("http://127.0.0.1:1", "sk_test_x").unwrap(),
            vault: Arc::new(HmacStreamVault::new("master")),
            webhook_secret: "sk_test_x".to_string(),
        };

        let app = router(state);
        let _ = app.into_make_service();
    }
}
