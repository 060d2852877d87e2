//! Master/replica theme synchronization over the in-memory hub.
//!
//! Run with: `cargo run -p ripple-sync --example theme_sync`

use ripple_store::{Reducers, StoreError};
use ripple_sync::{shared_store, SharedStore, SyncOptions, MASTER_PORT_ID};
use ripple_transport::{MemoryHub, Port};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Theme {
    theme: String,
}

fn theme_endpoint(hub: &MemoryHub, port_id: &str) -> SharedStore<Theme> {
    let port: Arc<dyn Port> = Arc::new(hub.port(port_id));
    let reducers = Reducers::new().with("set_theme", |_: &Theme, args: &[Value]| Theme {
        theme: args
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    });
    shared_store(SyncOptions::new(
        "theme",
        port,
        Theme {
            theme: "light".to_string(),
        },
        reducers,
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let hub = MemoryHub::new();

    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    master.dispatch("set_theme", vec![json!("dark")]).await?;
    println!("master dispatched: theme = {}", master.state().theme);

    let replica = theme_endpoint(&hub, "replica");
    replica.ready().await;
    println!("replica hydrated: theme = {}", replica.state().theme);

    replica.dispatch("set_theme", vec![json!("light")]).await?;
    println!(
        "replica round trip: master = {}, replica = {}",
        master.state().theme,
        replica.state().theme
    );

    Ok(())
}
