//! Full application lifecycle over a real listener.

mod common;

use common::TestEnv;
use smm_service::config::SmmConfig;
use smm_service::startup::Application;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn serves_and_shuts_down_gracefully() {
    let env = TestEnv::new().await;
    let mut config = SmmConfig::for_memory();
    config.scheduler.enabled = true;
    config.scheduler.reconcile_interval_secs = 1;
    config.scheduler.rate_sync_interval_secs = 1;
    config.common.shutdown_grace_secs = 2;

    let app = Application::build_with(config, env.store(), env.providers())
        .await
        .unwrap();
    let base = format!("http://127.0.0.1:{}", app.port());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(app.run_until_stopped(async {
        stop_rx.await.ok();
    }));

    let client = reqwest::Client::new();
    let health = client
        .get(format!("{}/health", base))
        .header("x-request-id", "lifecycle-1")
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.headers()["x-request-id"], "lifecycle-1");

    let ready = client.get(format!("{}/ready", base)).send().await.unwrap();
    assert_eq!(ready.status(), 200);

    let metrics = client.get(format!("{}/metrics", base)).send().await.unwrap();
    assert_eq!(metrics.status(), 200);

    drop(client);
    stop_tx.send(()).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops within the grace period")
        .unwrap();
    assert!(outcome.is_ok());
}
