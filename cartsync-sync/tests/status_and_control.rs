//! Readiness view and the control surface.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cartsync_channel::{ContextId, TabRegistry};
use cartsync_client::HttpResponse;
use cartsync_core::{
    Config, CredentialStore, MemoryCredentialStore, ProgressSnapshot, SyncError, SyncOutcome,
};
use cartsync_sync::{Coordinator, StatusAggregator};
use support::{client, range, ScriptedRetailer, ScriptedTransport};

fn tabs_with_retailer_open() -> Arc<TabRegistry> {
    let tabs = Arc::new(TabRegistry::new());
    tabs.open(ContextId::from("tab-7"));
    tabs
}

fn aggregator(
    retailer: Arc<ScriptedRetailer>,
    transport: Arc<ScriptedTransport>,
    tabs: Arc<TabRegistry>,
) -> (StatusAggregator, Arc<cartsync_sync::SyncOrchestrator>) {
    let orch = support::orchestrator(retailer.clone(), transport.clone());
    let status = StatusAggregator::new(orch.clone(), client(transport), retailer, tabs);
    (status, orch)
}

#[tokio::test]
async fn idle_status_probes_everything() {
    let retailer = Arc::new(ScriptedRetailer::new().logged_in(true));
    let transport = ScriptedTransport::replying(vec![Ok(HttpResponse::new(200, "{}"))]);
    let (status, _) = aggregator(retailer.clone(), transport.clone(), tabs_with_retailer_open());

    let s = status.compute_status().await;

    assert!(s.warehouse_connected);
    assert!(s.counterpart_connected);
    assert!(s.has_counterpart_tab);
    assert!(!s.network_error);
    assert!(!s.sync_in_progress);
    assert!(s.sync_progress.is_none());
    assert_eq!(retailer.login_checks.load(Ordering::SeqCst), 1);
    assert!(transport.calls()[0].url.ends_with("/user"));
}

#[tokio::test]
async fn no_tab_means_no_login_probe() {
    let retailer = Arc::new(ScriptedRetailer::new().logged_in(true));
    let transport = ScriptedTransport::replying(vec![Ok(HttpResponse::new(200, "{}"))]);
    let (status, _) = aggregator(retailer.clone(), transport, Arc::new(TabRegistry::new()));

    let s = status.compute_status().await;

    assert!(!s.has_counterpart_tab);
    assert!(!s.counterpart_connected);
    assert_eq!(retailer.login_checks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_service_is_flagged_not_disconnected() {
    let retailer = Arc::new(ScriptedRetailer::new());
    let transport =
        ScriptedTransport::replying(vec![Err(SyncError::Network("connection refused".into()))]);
    let (status, _) = aggregator(retailer, transport, Arc::new(TabRegistry::new()));

    let s = status.compute_status().await;

    assert!(!s.warehouse_connected);
    assert!(s.network_error);
}

#[tokio::test(start_paused = true)]
async fn status_during_a_run_skips_credential_and_login_probes() {
    let (retailer, gate) = ScriptedRetailer::new().logged_in(false).gated();
    let retailer = Arc::new(retailer);
    let transport = ScriptedTransport::replying(vec![]);
    let (status, orch) = aggregator(retailer.clone(), transport.clone(), tabs_with_retailer_open());

    let run = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.start(range()).await })
    };
    while !orch.is_running() {
        tokio::task::yield_now().await;
    }

    let s = status.compute_status().await;

    assert!(s.sync_in_progress);
    assert!(s.counterpart_connected);
    assert!(s.has_counterpart_tab);
    assert_eq!(s.sync_progress, Some(ProgressSnapshot::listing()));
    assert_eq!(retailer.login_checks.load(Ordering::SeqCst), 0);
    assert!(transport.calls().is_empty());

    gate.notify_one();
    assert_eq!(run.await.expect("join").expect("run"), SyncOutcome::empty());
    assert!(!status.compute_status().await.sync_in_progress);
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

fn coordinator(
    credentials: Arc<MemoryCredentialStore>,
    retailer: Arc<ScriptedRetailer>,
    transport: Arc<ScriptedTransport>,
) -> Coordinator {
    Coordinator::new(
        Config::default(),
        credentials,
        transport,
        retailer,
        Arc::new(TabRegistry::new()),
    )
}

#[tokio::test]
async fn connect_stores_the_token_and_reports_status() {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let transport = ScriptedTransport::replying(vec![Ok(HttpResponse::new(200, "{}"))]);
    let coord = coordinator(credentials.clone(), Arc::new(ScriptedRetailer::new()), transport.clone());

    let status = coord.connect("  tok-9\n").await.expect("connect");

    assert!(status.warehouse_connected);
    assert_eq!(credentials.get().expect("get").as_deref(), Some("tok-9"));
    let auth = transport.calls()[0]
        .header("authorization")
        .map(str::to_string);
    assert_eq!(auth.as_deref(), Some("Bearer tok-9"));
}

#[tokio::test]
async fn blank_token_is_rejected() {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let coord = coordinator(
        credentials.clone(),
        Arc::new(ScriptedRetailer::new()),
        ScriptedTransport::replying(vec![]),
    );

    let err = coord.connect("   ").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)), "got: {err}");
    assert!(!credentials.is_present());
}

#[tokio::test]
async fn disconnect_clears_the_credential() {
    let credentials = Arc::new(MemoryCredentialStore::with_token("tok-1"));
    let coord = coordinator(
        credentials.clone(),
        Arc::new(ScriptedRetailer::new()),
        ScriptedTransport::replying(vec![]),
    );

    coord.disconnect().expect("disconnect");
    assert!(!credentials.is_present());
    assert!(!coord.get_status().await.warehouse_connected);
}

#[tokio::test]
async fn inverted_range_is_rejected_before_listing() {
    let retailer = Arc::new(ScriptedRetailer::new());
    let coord = coordinator(
        Arc::new(MemoryCredentialStore::with_token("tok-1")),
        retailer.clone(),
        ScriptedTransport::replying(vec![]),
    );

    let err = coord
        .start_sync(Some("2026-10-01"), Some("2026-09-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)), "got: {err}");
    assert_eq!(retailer.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_the_run_end() {
    let coord = coordinator(
        Arc::new(MemoryCredentialStore::with_token("tok-1")),
        Arc::new(ScriptedRetailer::new()),
        ScriptedTransport::replying(vec![]),
    );
    let mut rx = coord.subscribe();

    let outcome = coord.start_sync(None, None).await.expect("sync");

    assert_eq!(outcome, SyncOutcome::empty());
    assert_eq!(rx.recv().await.expect("listing"), Some(ProgressSnapshot::listing()));
    assert_eq!(rx.recv().await.expect("end"), None);
}
