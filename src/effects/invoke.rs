//! Lowering of `invoke` hooks into effects.

use crate::core::{EffectFn, EffectOutcome, EffectSender, Event, InvokeFn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name of the event sent when an invoked operation succeeds.
pub const DONE_EVENT: &str = "done";
/// Name of the event sent when an invoked operation fails.
pub const ERROR_EVENT: &str = "error";

/// Wrap an async operation as an effect.
///
/// The effect starts the operation, spawns a task awaiting it, and returns a
/// cleanup that cancels delivery: an outcome arriving after disposal is
/// dropped without being sent. The operation itself is not aborted.
pub fn lower_invoke(operation: InvokeFn) -> EffectFn {
    Arc::new(move |context, event, sender: EffectSender| {
        let work = operation(context, event);
        let cancelled = Arc::new(AtomicBool::new(false));

        let delivery = Arc::clone(&cancelled);
        let reply = sender.clone();
        sender.spawn(async move {
            let outcome = match work.await {
                Ok(data) => Event::new(DONE_EVENT).with("data", data),
                Err(error) => Event::new(ERROR_EVENT).with("error", error),
            };
            if !delivery.load(Ordering::Acquire) {
                reply.send(outcome);
            }
        });

        EffectOutcome::cleanup(move || cancelled.store(true, Ordering::Release))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RuntimeState;
    use crate::effects::runtime::testing::RecordingDispatcher;
    use crate::effects::{start_effects, stop_effects, Dispatcher, PendingEffect};
    use futures::future::FutureExt;
    use serde_json::json;

    fn start(operation: InvokeFn) -> (Arc<RecordingDispatcher>, Vec<crate::effects::EffectHandle>) {
        let recorder = Arc::new(RecordingDispatcher::default());
        let dispatcher: Arc<dyn Dispatcher> = recorder.clone();
        let state = RuntimeState {
            name: Some("loading".to_string()),
            context: json!({ "id": 7 }),
            is_final: false,
        };
        let running = start_effects(
            vec![PendingEffect::new(lower_invoke(operation), Event::new("fetch"))],
            &state,
            &dispatcher,
        );
        (recorder, running)
    }

    async fn run_spawned(recorder: &RecordingDispatcher) {
        let tasks: Vec<_> = recorder.spawned.lock().drain(..).collect();
        for task in tasks {
            task.await;
        }
    }

    #[tokio::test]
    async fn success_sends_done_with_data() {
        let (recorder, running) = start(Arc::new(|ctx, _| {
            let id = ctx["id"].clone();
            async move { Ok::<_, serde_json::Value>(json!({ "id": id })) }.boxed()
        }));
        assert_eq!(running.len(), 1);

        run_spawned(&recorder).await;
        let posted = recorder.posted.lock();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].name(), Some(DONE_EVENT));
        assert_eq!(posted[0].get("data"), Some(&json!({ "id": 7 })));
    }

    #[tokio::test]
    async fn failure_sends_error() {
        let (recorder, _running) = start(Arc::new(|_, _| {
            async { Err::<serde_json::Value, _>(json!("offline")) }.boxed()
        }));

        run_spawned(&recorder).await;
        let posted = recorder.posted.lock();
        assert_eq!(posted[0].name(), Some(ERROR_EVENT));
        assert_eq!(posted[0].get("error"), Some(&json!("offline")));
    }

    #[tokio::test]
    async fn outcome_after_disposal_is_dropped_silently() {
        let (recorder, running) = start(Arc::new(|_, _| {
            async { Ok::<_, serde_json::Value>(json!(42)) }.boxed()
        }));

        stop_effects(running);
        run_spawned(&recorder).await;

        assert!(recorder.posted.lock().is_empty());
        assert!(recorder.reported.lock().is_empty());
    }
}
