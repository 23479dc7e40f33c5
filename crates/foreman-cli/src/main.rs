//! Demo: one coordinator, three simulated workers, consensus labeling.
//!
//! ワーカーの推論部分はダミー（キーワード分類器）です。コーディネータから
//! 見れば payload も label も不透明なので、本物の分類器と差し替え可能です。

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use foreman_core::app::{Config, Coordinator, SubmitOutcome};
use foreman_core::domain::{TaskStatus, WorkerId};
use foreman_core::impls::InMemoryStore;
use foreman_core::ports::{SystemClock, UlidGenerator};

/// Shape of the demo task payloads. The coordinator never looks inside;
/// only the workers do.
#[derive(Debug, Deserialize)]
struct ReviewPayload {
    text: String,
}

/// Stand-in for the real inference: keyword sentiment, normalized to
/// exactly "positive" / "negative" so votes can agree byte-for-byte.
fn classify(text: &str) -> (&'static str, f64) {
    let lowered = text.to_lowercase();
    let positive = ["love", "great", "good", "excellent", "happy"]
        .iter()
        .any(|kw| lowered.contains(kw));
    if positive {
        ("positive", 0.9)
    } else {
        ("negative", 0.8)
    }
}

/// One simulated worker: register, then claim/classify/submit until told to
/// stop. `contrarian` flips every label to demonstrate minority votes
/// earning nothing.
async fn worker_loop(
    coordinator: Coordinator,
    worker_id: WorkerId,
    contrarian: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if let Err(err) = coordinator.register_worker(&worker_id, None).await {
        warn!(worker = %worker_id, error = %err, "registration failed");
        return;
    }

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Liveness only: leases are left to lapse on purpose once this
        // worker has voted, so the next claim cycle can reach other workers.
        if let Err(err) = coordinator.heartbeat(&worker_id, &[]).await {
            warn!(worker = %worker_id, error = %err, "heartbeat failed");
        }

        let claimed = match coordinator.claim_next(&worker_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown_rx.changed() => continue,
                    _ = sleep(Duration::from_millis(200)) => continue,
                }
            }
            Err(err) => {
                warn!(worker = %worker_id, error = %err, "claim failed");
                continue;
            }
        };

        let payload: ReviewPayload = match serde_json::from_value(claimed.payload.clone()) {
            Ok(payload) => payload,
            // Malformed payload: leave the lease to lapse and move on.
            Err(err) => {
                warn!(worker = %worker_id, task = %claimed.id, error = %err, "malformed payload");
                continue;
            }
        };
        let (mut label, confidence) = classify(&payload.text);
        if contrarian {
            label = if label == "positive" { "negative" } else { "positive" };
        }
        info!(worker = %worker_id, task = %claimed.id, label, "classified");

        match coordinator
            .submit_result(&worker_id, claimed.id, label, confidence)
            .await
        {
            Ok(SubmitOutcome::Finalized { label }) => {
                info!(worker = %worker_id, task = %claimed.id, %label, "quorum reached");
            }
            Ok(SubmitOutcome::Recorded) => {}
            // Duplicate: this worker already voted in an earlier claim cycle.
            Err(err) => {
                info!(worker = %worker_id, task = %claimed.id, error = %err, "submission rejected");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .init();

    // Short lease and sweep so the quorum demo converges in seconds; a real
    // deployment reads these from the environment (Config::from_env).
    let config = Config {
        lease_seconds: 2,
        requeue_sweep_seconds: 1,
        ..Config::default()
    };

    let clock = Arc::new(SystemClock);
    let coordinator = Coordinator::new(
        Arc::new(InMemoryStore::new()),
        clock,
        Arc::new(UlidGenerator::new(SystemClock)),
        Arc::new(config),
    );
    let sweeper = coordinator.start_sweeper();

    // Three tasks, each needing three independent votes. The generous
    // attempt bound absorbs claim cycles burned on duplicate voters.
    let texts = [
        "I love this product, it works great",
        "terrible experience, would not recommend",
        "excellent support and a happy ending",
    ];
    for text in texts {
        let task = coordinator
            .create_task(serde_json::json!({ "text": text }), Some(3), Some(10))
            .await
            .expect("create task");
        info!(task = %task.id, "task created");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = Vec::new();
    for (name, contrarian) in [("w1", false), ("w2", false), ("w3", true)] {
        workers.push(tokio::spawn(worker_loop(
            coordinator.clone(),
            WorkerId::new(name),
            contrarian,
            shutdown_rx.clone(),
        )));
    }

    // Wait until every task reached a terminal state.
    loop {
        let tasks = coordinator.list_tasks(None).await.expect("list tasks");
        if tasks.iter().all(|t| t.status.is_terminal()) {
            break;
        }
        sleep(Duration::from_millis(200)).await;
    }

    for task in coordinator.list_tasks(None).await.expect("list tasks") {
        let text = serde_json::from_value::<ReviewPayload>(task.payload.clone())
            .map(|payload| payload.text)
            .unwrap_or_default();
        match task.status {
            TaskStatus::Completed => info!(
                task = %task.id,
                label = task.finalized_label.as_deref().unwrap_or("?"),
                attempts = task.attempts,
                text = %text,
                "finalized"
            ),
            _ => warn!(task = %task.id, status = ?task.status, text = %text, "not finalized"),
        }
    }

    info!("leaderboard:");
    for row in coordinator.leaderboard().await.expect("leaderboard") {
        info!("  {}: {} point(s)", row.worker_id, row.points);
    }
    let stats = coordinator.stats().await.expect("stats");
    info!(
        tasks = stats.tasks_total,
        submissions = stats.submissions,
        workers = stats.workers,
        "final stats"
    );

    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    sweeper.shutdown_and_join().await;
}
