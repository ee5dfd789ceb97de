//! Integration tests for the orchestrator's own surface: worker lifecycle
//! invariants, singleton enforcement, and Health semantics. These build a
//! fully offline `Engine` (an `RpcGateway` never dials out until a method on
//! it is awaited) so they exercise real cross-module wiring without a live
//! validator.

use std::sync::Arc;

use frt_stress_test::rpc_gateway::{GatewayConfig, RpcGateway};
use frt_stress_test::types::{CoreWallet, TokenSide, WorkerKind, WorkerStatus};
use frt_stress_test::{Config, Engine, Store};
use solana_sdk::pubkey::Pubkey;

fn test_engine() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let program_id = Pubkey::new_unique();
    let config = Arc::new(Config::parse_from([
        "frt-stress-test",
        "--program-id",
        &program_id.to_string(),
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]));
    let store = Arc::new(Store::new(dir.path()).unwrap());
    let gateway = Arc::new(RpcGateway::new(config.rpc_url.clone(), GatewayConfig::default()));
    let core_wallet = CoreWallet::generate();
    store.save_core_wallet(&core_wallet).unwrap();
    let engine = Engine::new(config, store, gateway, program_id, &core_wallet);
    (engine, dir)
}

#[tokio::test]
async fn fresh_engine_is_stopped_with_no_workers() {
    let (engine, _dir) = test_engine();
    let health = engine.health().await;
    assert_eq!(health.state, "Stopped");
    assert_eq!(health.total_workers, 0);
    assert_eq!(health.running, 0);
    assert_eq!(health.failed, 0);
    assert!(!health.is_healthy());
}

#[tokio::test]
async fn create_worker_rejects_a_second_swap_direction_on_the_same_pool() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();

    engine
        .create_worker(WorkerKind::SwapAB, pool_id, None, 1_000, false, false)
        .expect("first SwapAB worker is allowed");

    let err = engine
        .create_worker(WorkerKind::SwapAB, pool_id, None, 1_000, false, false)
        .expect_err("a second SwapAB worker on the same pool must be rejected");
    match err {
        frt_stress_test::engine::EngineError::Structured { code, .. } => {
            assert_eq!(code, frt_stress_test::constants::ENGINE_ERROR_DUPLICATE_SWAP_DIRECTION);
        }
        other => panic!("expected a structured duplicate-direction error, got {other:?}"),
    }

    // SwapBA on the same pool is a distinct direction and must still be allowed.
    engine
        .create_worker(WorkerKind::SwapBA, pool_id, None, 1_000, false, false)
        .expect("SwapBA is a distinct singleton from SwapAB");
}

#[tokio::test]
async fn create_worker_allows_unbounded_deposit_workers_on_one_pool_side() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();

    for _ in 0..5 {
        engine
            .create_worker(WorkerKind::Deposit, pool_id, Some(TokenSide::A), 500, false, true)
            .expect("deposit workers are not singleton");
    }

    let health = engine.health().await;
    assert_eq!(health.total_workers, 5);
}

#[tokio::test]
async fn create_worker_rejects_auto_refill_with_zero_initial_amount() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();

    let err = engine
        .create_worker(WorkerKind::Deposit, pool_id, Some(TokenSide::A), 0, true, false)
        .expect_err("autoRefill with a zero initial amount violates the worker invariant");
    assert!(matches!(
        err,
        frt_stress_test::engine::EngineError::Structured { code, .. }
            if code == frt_stress_test::constants::ENGINE_ERROR_INVALID_WORKER_STATE
    ));
}

#[tokio::test]
async fn create_worker_rejects_a_token_side_on_swap_workers() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();

    let err = engine
        .create_worker(WorkerKind::SwapAB, pool_id, Some(TokenSide::A), 1_000, false, false)
        .expect_err("swap workers must not carry a token_side");
    assert!(matches!(
        err,
        frt_stress_test::engine::EngineError::Structured { code, .. }
            if code == frt_stress_test::constants::ENGINE_ERROR_INVALID_WORKER_STATE
    ));
}

#[tokio::test]
async fn created_worker_round_trips_through_the_store_with_created_status() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();

    let worker = engine
        .create_worker(WorkerKind::Withdraw, pool_id, Some(TokenSide::B), 2_000, false, true)
        .unwrap();

    assert_eq!(worker.status, WorkerStatus::Created);
    assert_eq!(worker.pool_id, pool_id);
    assert!(worker.worker_id.starts_with("wd-"));
}

#[tokio::test]
async fn empty_worker_on_an_unknown_id_fails_with_invalid_worker_state() {
    let (engine, _dir) = test_engine();
    let err = engine.empty_worker("does-not-exist").await.expect_err("must fail");
    assert!(matches!(
        err,
        frt_stress_test::engine::EngineError::Structured { code, .. }
            if code == frt_stress_test::constants::ENGINE_ERROR_INVALID_WORKER_STATE
    ));
}

#[tokio::test]
async fn stop_worker_on_an_id_with_no_running_handle_still_records_a_session() {
    let (engine, dir) = test_engine();
    let pool_id = Pubkey::new_unique();
    let worker = engine
        .create_worker(WorkerKind::Deposit, pool_id, Some(TokenSide::A), 500, false, true)
        .unwrap();

    engine.stop_worker(&worker.worker_id).await.unwrap();

    let sessions_dir = dir.path().join("sessions").join(&worker.worker_id);
    let entries: Vec<_> = std::fs::read_dir(&sessions_dir).unwrap().collect();
    assert_eq!(entries.len(), 1, "stopping an unstarted worker still records one session");
}

#[tokio::test]
async fn pause_and_resume_transition_engine_state_without_touching_workers() {
    let (engine, _dir) = test_engine();
    let pool_id = Pubkey::new_unique();
    engine
        .create_worker(WorkerKind::Deposit, pool_id, Some(TokenSide::A), 500, false, true)
        .unwrap();

    engine.pause().await;
    assert_eq!(engine.state().await, frt_stress_test::engine::EngineState::Paused);
    assert_eq!(engine.health().await.total_workers, 1);

    engine.resume().await;
    assert_eq!(engine.state().await, frt_stress_test::engine::EngineState::Started);
    assert_eq!(engine.health().await.total_workers, 1);
}
