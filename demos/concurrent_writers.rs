//! Concurrent writers racing on one entity.
//!
//! Several threads, each with its own machine and adapter cache, append
//! transitions to the same entity. Lost races surface as retryable
//! conflicts; the committed history stays totally ordered with exactly one
//! most-recent record.
//!
//! Run with: cargo run --example concurrent_writers

use std::sync::Arc;
use std::thread;
use waymark::{
    retry_on_conflict, state_enum, EntityId, GraphBuilder, Machine, MemoryAdapter, MemoryStore,
    Metadata,
};

state_enum! {
    pub enum CounterState {
        Idle,
        Ticking,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("waymark=warn,concurrent_writers=info")
        .init();

    let graph = Arc::new(
        GraphBuilder::new()
            .initial(CounterState::Idle)?
            .state(CounterState::Ticking)
            .transition(CounterState::Idle, &[CounterState::Ticking])?
            .transition(CounterState::Ticking, &[CounterState::Ticking])?
            .build()?,
    );

    let store: MemoryStore<CounterState> = MemoryStore::new();
    let entity = EntityId::new();
    store.register(entity);

    let mut handles = Vec::new();
    for writer in 0..4 {
        let store = store.clone();
        let graph = Arc::clone(&graph);
        handles.push(thread::spawn(move || {
            let adapter = MemoryAdapter::new(store, entity).expect("structured store");
            let mut machine = Machine::new(graph, adapter);
            for _ in 0..5 {
                let mut metadata = Metadata::new();
                metadata.insert("writer".to_string(), serde_json::json!(writer));
                retry_on_conflict(1_000, || {
                    machine.transition_to(&CounterState::Ticking, metadata.clone())
                })
                .expect("retry absorbs conflicts");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    let history = store.history(entity)?;
    tracing::info!(
        transitions = history.len(),
        most_recent = history.iter().filter(|r| r.most_recent).count(),
        "all writers finished"
    );
    for record in &history {
        tracing::info!(
            sort_key = record.sort_key,
            writer = %record.metadata["writer"],
            "committed slot"
        );
    }

    Ok(())
}
