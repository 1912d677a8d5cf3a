//! Traffic Light State Machine
//!
//! This demo runs a cyclic machine with a pedestrian button.
//!
//! Key concepts:
//! - Cyclic transitions with no final state
//! - Guards choosing between transitions on the same event
//! - Internal transitions that update context without leaving the state
//! - Subscribers observing every send
//!
//! Run with: cargo run --example traffic_light

use serde_json::json;
use statewise::builder::{internal, transition, Description};
use statewise::core::Hooks;
use statewise::effects::Session;

fn main() {
    println!("=== Traffic Light State Machine ===\n");

    let machine = Description::new()
        .state(
            "red",
            vec![transition(
                "timer",
                "green",
                Hooks::new().assign_value(json!({ "waiting": false })),
            )],
        )
        .state(
            "green",
            vec![
                // A waiting pedestrian shortens green.
                transition(
                    "timer",
                    "yellow",
                    Hooks::new().guard(|ctx, _| ctx["waiting"] == json!(true)),
                ),
                transition(
                    "timer",
                    "green",
                    Hooks::new().assign(|ctx, _| {
                        json!({ "cycles": ctx["cycles"].as_u64().unwrap_or(0) + 1 })
                    }),
                ),
                internal("button", Hooks::new().assign_value(json!({ "waiting": true }))),
            ],
        )
        .state("yellow", vec![transition("timer", "red", Hooks::new())])
        .compile()
        .expect("traffic light description is valid");

    let session = Session::new(machine, json!({ "waiting": false, "cycles": 0 }));
    let _subscription = session.subscribe(|state| {
        println!(
            "  -> {:<7} context: {}",
            state.name().unwrap_or("-"),
            state.context
        );
    });

    println!("Initial state: {:?}\n", session.state().name());

    println!("Sequence:");
    for event in ["timer", "timer", "button", "timer", "timer"] {
        println!("send {event}");
        session.send(event);
    }

    println!("\nKey Characteristics:");
    println!("- No final state (cycles indefinitely)");
    println!("- The first transition whose guards pass wins");
    println!("- `button` is internal: green keeps running while context changes");

    println!("\n=== Demo Complete ===");
}
