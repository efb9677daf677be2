//! Order processing workflow.
//!
//! Declares a small order graph with an approval guard and audit callbacks,
//! then walks one order through it.
//!
//! Run with: cargo run --example order_workflow

use std::sync::Arc;
use waymark::{
    state_enum, EntityId, GraphBuilder, Machine, MemoryAdapter, MemoryStore, Metadata, State,
};

state_enum! {
    pub enum OrderState {
        Pending,
        Approved,
        Rejected,
        Shipped,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("waymark=debug,order_workflow=info")
        .init();

    let graph = Arc::new(
        GraphBuilder::new()
            .initial(OrderState::Pending)?
            .state(OrderState::Approved)
            .state(OrderState::Rejected)
            .state(OrderState::Shipped)
            .event("approve", OrderState::Pending, OrderState::Approved)?
            .event("reject", OrderState::Pending, OrderState::Rejected)?
            .event("ship", OrderState::Approved, OrderState::Shipped)?
            // Approval needs a named approver in the metadata.
            .guard_transition(None, Some(OrderState::Approved), |_, _, metadata| {
                metadata.contains_key("approver")
            })?
            .after_commit(None, Some(OrderState::Shipped), |_, record| {
                tracing::info!(sort_key = record.sort_key, "shipment confirmed, notifying customer");
            })?
            .build()?,
    );

    let store = MemoryStore::new();
    let order = EntityId::new();
    let mut machine = Machine::new(graph, MemoryAdapter::new(store, order)?);

    // An approval without an approver is rejected by the guard.
    let approved = machine.try_trigger("approve", Metadata::new())?;
    tracing::info!(approved, "approval without approver");

    let mut metadata = Metadata::new();
    metadata.insert("approver".to_string(), serde_json::json!("ops@example.com"));
    machine.trigger("approve", metadata)?;
    machine.trigger("ship", Metadata::new())?;

    for record in machine.history()? {
        tracing::info!(
            state = record.to_state.name(),
            sort_key = record.sort_key,
            most_recent = record.most_recent,
            "history entry"
        );
    }

    Ok(())
}
