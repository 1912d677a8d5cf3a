//! Checkpoint and Resume
//!
//! This demo saves a document review session to JSON and restores it
//! against the same compiled machine.
//!
//! Key concepts:
//! - Sharing one compiled machine between sessions
//! - Serializing snapshot and history with `Checkpoint`
//! - Resuming without re-running the initial transition
//!
//! Run with: cargo run --example checkpoint_resume

use serde_json::json;
use statewise::builder::{enter, transition, Description};
use statewise::checkpoint::Checkpoint;
use statewise::core::Hooks;
use statewise::effects::{EffectOutcome, Session, SessionBuilder};
use std::sync::Arc;

fn main() {
    println!("=== Checkpoint and Resume ===\n");

    let machine = Arc::new(
        Description::new()
            .state("draft", vec![transition("submit", "review", Hooks::new().assign_event())])
            .state(
                "review",
                vec![
                    transition("approve", "published", Hooks::new()),
                    transition("reject", "draft", Hooks::new()),
                    enter(Hooks::new().effect(|ctx, _, _| {
                        println!("  notifying reviewer {}", ctx["reviewer"]);
                        EffectOutcome::Detached
                    })),
                ],
            )
            .state("published", vec![])
            .compile()
            .expect("review description is valid"),
    );

    let session = Session::new(Arc::clone(&machine), json!({ "doc": "rfc-12" }));
    session.send(statewise::core::Event::new("submit").with("reviewer", json!("kim")));
    println!("Before save: {:?}", session.state().name());

    let saved = match session.checkpoint().to_json_pretty() {
        Ok(json) => json,
        Err(error) => {
            eprintln!("checkpoint failed: {error}");
            return;
        }
    };
    drop(session);
    println!("\nSaved checkpoint:\n{saved}\n");

    let restored = Checkpoint::from_json(&saved)
        .and_then(|checkpoint| SessionBuilder::new(Arc::clone(&machine)).resume(checkpoint));
    let session = match restored {
        Ok(session) => session,
        Err(error) => {
            eprintln!("resume failed: {error}");
            return;
        }
    };

    println!("After resume: {:?}", session.state().name());
    session.send("approve");
    println!("After approve: {:?} (final: {})", session.state().name(), session.state().is_final);
    println!("Path: {:?}", session.history().get_path());

    println!("\n=== Demo Complete ===");
}
