//! Fetching with Invokes
//!
//! This demo loads a record through an async invoke and retries on failure.
//!
//! Key concepts:
//! - `invoke` on enter, resolved as `done` / `error` events
//! - Immediate transitions deciding between retry and give-up
//! - Effects with cleanups, disposed when the state is left
//!
//! Run with: cargo run --example fetch_invoke

use serde_json::{json, Value};
use statewise::builder::{enter, immediate, transition, Description};
use statewise::core::Hooks;
use statewise::effects::{EffectOutcome, Session};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("=== Fetch With Invoke ===\n");

    // Fails twice, then succeeds.
    let calls = Arc::new(AtomicU32::new(0));
    let backend = Arc::clone(&calls);

    let machine = Description::new()
        .state("idle", vec![transition("fetch", "loading", Hooks::new())])
        .state(
            "loading",
            vec![
                transition("done", "loaded", Hooks::new().assign_event()),
                transition(
                    "error",
                    "checking",
                    Hooks::new().assign(|ctx, _| {
                        json!({ "attempts": ctx["attempts"].as_u64().unwrap_or(0) + 1 })
                    }),
                ),
                enter(
                    Hooks::new()
                        .invoke(move |ctx, _| {
                            let attempt = backend.fetch_add(1, Ordering::SeqCst);
                            let id = ctx["id"].clone();
                            async move {
                                if attempt < 2 {
                                    Err::<Value, _>(json!(format!("attempt {attempt} timed out")))
                                } else {
                                    Ok(json!({ "id": id, "title": "statewise" }))
                                }
                            }
                        })
                        .effect(|_, _, _| {
                            println!("  [spinner on]");
                            EffectOutcome::cleanup(|| println!("  [spinner off]"))
                        }),
                ),
            ],
        )
        .state(
            "checking",
            vec![
                immediate(
                    "failed",
                    Hooks::new().guard(|ctx, _| ctx["attempts"].as_u64() >= Some(5)),
                ),
                immediate("loading", Hooks::new()),
            ],
        )
        .state("loaded", vec![])
        .state("failed", vec![])
        .compile()
        .expect("fetch description is valid");

    let session = Session::new(machine, json!({ "id": 7, "attempts": 0 }));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _subscription = session.subscribe(move |state| {
        let _ = tx.send(state.clone());
    });

    session.send("fetch");
    while let Some(state) = rx.recv().await {
        println!(
            "state: {:<8} context: {}",
            state.name().unwrap_or("-"),
            state.context
        );
        if state.is_final {
            break;
        }
    }

    println!("\nBackend calls: {}", calls.load(Ordering::SeqCst));
    println!("Transition path: {:?}", session.history().get_path());

    println!("\n=== Demo Complete ===");
}
