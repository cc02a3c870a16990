//! ChannelRetailer against a page-script peer that reads the serialized
//! envelope the way the daemon writes it to the socket.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cartsync_channel::{ContextId, RemoteChannel, ResponseEnvelope, TabRegistry};
use cartsync_client::HttpResponse;
use cartsync_core::{RecordId, SyncOutcome};
use cartsync_sync::{ChannelRetailer, ProgressPublisher, RetailerApi, SyncOrchestrator};
use serde_json::{json, Value};
use support::{client, range, ScriptedTransport, FETCH_INTERVAL};

/// Answers from the decoded wire line only; records every line it saw.
fn spawn_page_script(channel: Arc<RemoteChannel>) -> Arc<Mutex<Vec<Value>>> {
    let (lease, mut inbound) = channel.register(ContextId::from("tab-1"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            let wire = serde_json::to_string(&envelope).expect("encode");
            let line: Value = serde_json::from_str(&wire).expect("parse");
            let id = line["id"].as_u64().expect("correlation id");
            let result = match line["action"].as_str().expect("action") {
                "fetchRecords" => json!(["A-1", {"orderId": "A-2"}, "A-3"]),
                "fetchRecordDetail" => match line["orderId"].as_str() {
                    Some("A-1") => json!({
                        "orderId": "A-1",
                        "orderDate": "08/02/2026",
                        "orderTotal": "19.99",
                        "paymentMethod": "visa 4242",
                        "items": [{"name": "Kettle", "quantity": 1}]
                    }),
                    Some("A-2") => json!({}),
                    _ => Value::Null,
                },
                "checkLogin" => json!({"loggedIn": true}),
                other => panic!("unexpected action {other}"),
            };
            log.lock().expect("log").push(line);
            channel.deliver(&lease, ResponseEnvelope::ok(id, result));
        }
    });
    seen
}

fn setup() -> (Arc<RemoteChannel>, Arc<ChannelRetailer>) {
    let tabs = Arc::new(TabRegistry::new());
    tabs.open(ContextId::from("tab-1"));
    let channel = Arc::new(RemoteChannel::new(tabs, Duration::from_secs(30)));
    let retailer = Arc::new(ChannelRetailer::new(channel.clone()));
    (channel, retailer)
}

#[tokio::test]
async fn listing_sends_retailer_dates_and_reads_both_shapes() {
    let (channel, retailer) = setup();
    let page = spawn_page_script(channel);

    let listed = retailer.list_records(&range()).await.expect("listing");
    let ids: Vec<&str> = listed.iter().map(|s| s.id.0.as_str()).collect();
    assert_eq!(ids, vec!["A-1", "A-2", "A-3"]);

    let seen = page.lock().expect("log").clone();
    assert_eq!(seen[0]["startDate"], json!("07/21/2026"));
    assert_eq!(seen[0]["endDate"], json!("10/19/2026"));
}

#[tokio::test]
async fn detail_request_names_the_record() {
    let (channel, retailer) = setup();
    let page = spawn_page_script(channel);

    let detail = retailer
        .fetch_record_detail(&RecordId::from("A-1"))
        .await
        .expect("detail")
        .expect("record");
    assert_eq!(detail["orderTotal"], json!("19.99"));

    let empty = retailer.fetch_record_detail(&RecordId::from("A-2")).await.expect("detail");
    assert!(empty.is_none());
    let null = retailer.fetch_record_detail(&RecordId::from("A-3")).await.expect("detail");
    assert!(null.is_none());
    assert!(retailer.check_login().await.expect("login"));

    let seen = page.lock().expect("log").clone();
    let asked: Vec<&Value> = seen.iter().take(3).map(|line| &line["orderId"]).collect();
    assert_eq!(asked, vec![&json!("A-1"), &json!("A-2"), &json!("A-3")]);
    let ids: Vec<u64> = seen.iter().map(|line| line["id"].as_u64().expect("id")).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {ids:?}");
}

#[tokio::test(start_paused = true)]
async fn sync_over_the_channel_imports_the_readable_record() {
    let (channel, retailer) = setup();
    spawn_page_script(channel);
    let transport = ScriptedTransport::replying(vec![Ok(HttpResponse::new(
        200,
        json!({"imported": 1, "duplicates": 0, "skipped": 0, "errors": 0}).to_string(),
    ))]);
    let orchestrator = SyncOrchestrator::new(
        retailer,
        client(transport.clone()),
        ProgressPublisher::default(),
        FETCH_INTERVAL,
    );

    let SyncOutcome::Completed(report) = orchestrator.start(range()).await.expect("sync") else {
        panic!("expected a completed run");
    };
    assert_eq!(report.imported, 1);
    assert_eq!(report.fetch_failed, 2);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let records = &calls[0].body.as_ref().expect("body")["records"];
    assert_eq!(records.as_array().expect("records").len(), 1);
    assert_eq!(records[0]["orderId"], json!("A-1"));
    assert!(records[0].get("paymentMethod").is_none());
}
