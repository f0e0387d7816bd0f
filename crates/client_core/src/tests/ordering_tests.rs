use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot, Mutex};

use shared::domain::{Level, LevelId};

use crate::{
    ordering::{OrderSink, OrderSinkError, Reorderer},
    ClientEvent,
};

fn level(id: &str) -> Level {
    Level {
        id: LevelId::from(id),
        name: id.to_string(),
        description: String::new(),
        index: 0,
        steps: Vec::new(),
    }
}

fn levels(ids: &[&str]) -> Vec<Level> {
    ids.iter().map(|id| level(id)).collect()
}

fn id(raw: &str) -> LevelId {
    LevelId::from(raw)
}

/// One scripted sink response. `entered` fires when the submission arrives;
/// `release` (when present) holds the submission open until the test decides
/// its outcome.
struct ScriptedCall {
    entered: Option<oneshot::Sender<()>>,
    release: Option<oneshot::Receiver<bool>>,
    outcome: bool,
}

impl ScriptedCall {
    fn immediate(outcome: bool) -> Self {
        Self {
            entered: None,
            release: None,
            outcome,
        }
    }

    fn gated() -> (Self, oneshot::Receiver<()>, oneshot::Sender<bool>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        (
            Self {
                entered: Some(entered_tx),
                release: Some(release_rx),
                outcome: false,
            },
            entered_rx,
            release_tx,
        )
    }
}

struct ScriptedSink {
    script: Mutex<VecDeque<ScriptedCall>>,
    submitted: Arc<Mutex<Vec<Vec<LevelId>>>>,
}

impl ScriptedSink {
    fn new(script: Vec<ScriptedCall>) -> (Self, Arc<Mutex<Vec<Vec<LevelId>>>>) {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: Mutex::new(script.into()),
                submitted: Arc::clone(&submitted),
            },
            submitted,
        )
    }
}

#[async_trait]
impl OrderSink<LevelId> for ScriptedSink {
    async fn submit_order(&self, order: &[LevelId]) -> Result<(), OrderSinkError> {
        self.submitted.lock().await.push(order.to_vec());
        let call = self
            .script
            .lock()
            .await
            .pop_front()
            .expect("unexpected order submission");
        if let Some(entered) = call.entered {
            let _ = entered.send(());
        }
        let outcome = match call.release {
            Some(release) => release.await.expect("release dropped"),
            None => call.outcome,
        };
        if outcome {
            Ok(())
        } else {
            Err(OrderSinkError::Rejected(500))
        }
    }
}

fn reorderer(sink: ScriptedSink) -> (Arc<Reorderer<Level, ScriptedSink>>, broadcast::Receiver<ClientEvent>) {
    let (events, events_rx) = broadcast::channel(16);
    (Arc::new(Reorderer::new(sink, "levels", events)), events_rx)
}

#[tokio::test]
async fn confirmed_submission_keeps_optimistic_order() {
    let (sink, _submitted) = ScriptedSink::new(vec![ScriptedCall::immediate(true)]);
    let (reorderer, mut events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    reorderer.reorder(&id("b"), &id("a")).await.expect("reorder");

    let order = reorderer.current_order().await;
    assert_eq!(order, vec![id("b"), id("a"), id("c")]);
    assert!(matches!(
        events.recv().await.expect("event"),
        ClientEvent::OrderPersisted { .. }
    ));
}

#[tokio::test]
async fn rejected_submission_restores_pre_gesture_order() {
    let (sink, _submitted) = ScriptedSink::new(vec![ScriptedCall::immediate(false)]);
    let (reorderer, mut events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    let err = reorderer
        .reorder(&id("b"), &id("a"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, OrderSinkError::Rejected(500)));

    assert_eq!(
        reorderer.current_order().await,
        vec![id("a"), id("b"), id("c")]
    );
    match events.recv().await.expect("event") {
        ClientEvent::OrderRolledBack { collection, reason } => {
            assert_eq!(collection, "levels");
            assert!(reason.contains("500"), "unexpected reason: {reason}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn noop_gestures_submit_nothing() {
    let (sink, submitted) = ScriptedSink::new(Vec::new());
    let (reorderer, _events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    reorderer.reorder(&id("b"), &id("b")).await.expect("same id");
    reorderer.reorder(&id("x"), &id("b")).await.expect("unknown moved");
    reorderer.reorder(&id("b"), &id("x")).await.expect("unknown target");

    assert_eq!(
        reorderer.current_order().await,
        vec![id("a"), id("b"), id("c")]
    );
    assert!(submitted.lock().await.is_empty());
}

#[tokio::test]
async fn optimistic_order_is_visible_while_submission_is_pending() {
    let (call, entered, release) = ScriptedCall::gated();
    let (sink, _submitted) = ScriptedSink::new(vec![call]);
    let (reorderer, _events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    let task = {
        let reorderer = Arc::clone(&reorderer);
        tokio::spawn(async move { reorderer.reorder(&id("c"), &id("a")).await })
    };
    entered.await.expect("submission started");

    assert_eq!(
        reorderer.current_order().await,
        vec![id("c"), id("a"), id("b")]
    );

    release.send(true).expect("release");
    task.await.expect("join").expect("reorder");
    assert_eq!(
        reorderer.current_order().await,
        vec![id("c"), id("a"), id("b")]
    );
}

#[tokio::test]
async fn stale_failure_is_discarded_after_newer_gesture_settles() {
    let (first, first_entered, first_release) = ScriptedCall::gated();
    let (second, second_entered, second_release) = ScriptedCall::gated();
    let (sink, submitted) = ScriptedSink::new(vec![first, second]);
    let (reorderer, _events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    // First gesture: b before a -> [b, a, c], submission held open.
    let first_task = {
        let reorderer = Arc::clone(&reorderer);
        tokio::spawn(async move { reorderer.reorder(&id("b"), &id("a")).await })
    };
    first_entered.await.expect("first submission started");

    // Second gesture builds on the unconfirmed optimistic order:
    // c before b -> [c, b, a].
    let second_task = {
        let reorderer = Arc::clone(&reorderer);
        tokio::spawn(async move { reorderer.reorder(&id("c"), &id("b")).await })
    };
    second_entered.await.expect("second submission started");

    // The newer submission settles first, confirming [c, b, a].
    second_release.send(true).expect("release second");
    second_task.await.expect("join").expect("second reorder");

    // The older submission now fails; it is stale and must not disturb the
    // newer confirmed order.
    first_release.send(false).expect("release first");
    let err = first_task.await.expect("join").expect_err("first fails");
    assert!(matches!(err, OrderSinkError::Rejected(500)));

    assert_eq!(
        reorderer.current_order().await,
        vec![id("c"), id("b"), id("a")]
    );

    // Each submission carried the entire order, not a delta.
    let submitted = submitted.lock().await.clone();
    assert_eq!(
        submitted,
        vec![
            vec![id("b"), id("a"), id("c")],
            vec![id("c"), id("b"), id("a")],
        ]
    );
}

#[tokio::test]
async fn replace_supersedes_inflight_submission() {
    let (call, entered, release) = ScriptedCall::gated();
    let (sink, _submitted) = ScriptedSink::new(vec![call]);
    let (reorderer, _events) = reorderer(sink);
    reorderer.replace(levels(&["a", "b", "c"])).await;

    let task = {
        let reorderer = Arc::clone(&reorderer);
        tokio::spawn(async move { reorderer.reorder(&id("b"), &id("a")).await })
    };
    entered.await.expect("submission started");

    // A refetch lands while the submission is pending; its data is
    // authoritative and the eventual failure must not roll it back.
    reorderer.replace(levels(&["d", "e"])).await;

    release.send(false).expect("release");
    let _ = task.await.expect("join");

    assert_eq!(reorderer.current_order().await, vec![id("d"), id("e")]);
}
