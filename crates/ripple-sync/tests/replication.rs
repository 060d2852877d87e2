//! End-to-end replication scenarios over the in-memory hub.

use ripple_store::{Reducers, StoreError};
use ripple_sync::{
    shared_store, ChannelEvent, ChannelEvents, ChannelRegistry, Role, SharedStore, SyncOptions,
    MASTER_PORT_ID,
};
use ripple_transport::{MemoryHub, Port};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Theme {
    theme: String,
}

fn light() -> Theme {
    Theme {
        theme: "light".to_string(),
    }
}

fn theme_reducers() -> Reducers<Theme> {
    Reducers::new().with("set_theme", |_: &Theme, args: &[Value]| Theme {
        theme: args
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn theme_endpoint(hub: &MemoryHub, port_id: &str) -> SharedStore<Theme> {
    let port: Arc<dyn Port> = Arc::new(hub.port(port_id));
    shared_store(SyncOptions::new("theme", port, light(), theme_reducers()))
}

#[tokio::test]
async fn roles_follow_the_reserved_port_identity() {
    let hub = MemoryHub::new();
    assert_eq!(theme_endpoint(&hub, MASTER_PORT_ID).role(), Role::Master);
    assert_eq!(theme_endpoint(&hub, "replica").role(), Role::Replica);
}

#[tokio::test]
async fn replica_hydrates_from_master_snapshot() {
    let hub = MemoryHub::new();
    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    master.ready().await;
    master
        .dispatch("set_theme", vec![json!("dark")])
        .await
        .unwrap();

    let replica = theme_endpoint(&hub, "replica");
    assert_eq!(replica.state().theme, "light");
    timeout(TICK, replica.ready()).await.unwrap();
    assert_eq!(replica.state().theme, "dark");
}

#[tokio::test]
async fn replica_dispatch_round_trips_through_master() {
    let hub = MemoryHub::new();
    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    let replica = theme_endpoint(&hub, "replica");
    timeout(TICK, replica.ready()).await.unwrap();

    let confirmed = timeout(TICK, replica.dispatch("set_theme", vec![json!("dark")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed, vec![json!("dark")]);
    // By the time the dispatch resolves the master has applied the action
    // and the replica has applied the relayed broadcast.
    assert_eq!(master.state().theme, "dark");
    assert_eq!(replica.state().theme, "dark");
}

#[tokio::test]
async fn theme_changes_flow_both_ways() {
    let hub = MemoryHub::new();
    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    master
        .dispatch("set_theme", vec![json!("dark")])
        .await
        .unwrap();

    let replica = theme_endpoint(&hub, "replica");
    timeout(TICK, replica.ready()).await.unwrap();
    assert_eq!(replica.state().theme, "dark");

    timeout(TICK, replica.dispatch("set_theme", vec![json!("light")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(master.state().theme, "light");
    assert_eq!(replica.state().theme, "light");
}

#[tokio::test]
async fn master_broadcasts_reach_every_mirror() {
    let hub = MemoryHub::new();
    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    let first = theme_endpoint(&hub, "replica-1");
    let second = theme_endpoint(&hub, "replica-2");
    timeout(TICK, first.ready()).await.unwrap();
    timeout(TICK, second.ready()).await.unwrap();

    master
        .dispatch("set_theme", vec![json!("dark")])
        .await
        .unwrap();

    timeout(TICK, first.wait(|state| state.theme == "dark"))
        .await
        .unwrap();
    timeout(TICK, second.wait(|state| state.theme == "dark"))
        .await
        .unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct EventLog {
    entries: Vec<String>,
}

fn log_reducers() -> Reducers<EventLog> {
    Reducers::new().with("append", |state: &EventLog, args: &[Value]| {
        let mut entries = state.entries.clone();
        if let Some(entry) = args.first().and_then(Value::as_str) {
            entries.push(entry.to_string());
        }
        EventLog { entries }
    })
}

fn log_endpoint(hub: &MemoryHub, port_id: &str) -> SharedStore<EventLog> {
    let port: Arc<dyn Port> = Arc::new(hub.port(port_id));
    shared_store(SyncOptions::new(
        "log",
        port,
        EventLog::default(),
        log_reducers(),
    ))
}

#[tokio::test]
async fn concurrent_writers_converge_on_the_master_order() {
    let hub = MemoryHub::new();
    let master = log_endpoint(&hub, MASTER_PORT_ID);
    let first = log_endpoint(&hub, "replica-1");
    let second = log_endpoint(&hub, "replica-2");
    timeout(TICK, first.ready()).await.unwrap();
    timeout(TICK, second.ready()).await.unwrap();

    let mut writers = Vec::new();
    for (endpoint, prefix) in [
        (master.clone(), "m"),
        (first.clone(), "a"),
        (second.clone(), "b"),
    ] {
        writers.push(tokio::spawn(async move {
            for index in 0..4 {
                endpoint
                    .dispatch("append", vec![json!(format!("{prefix}{index}"))])
                    .await
                    .unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    // Replicas may still be draining relays for the other writer's actions.
    timeout(TICK, first.wait(|state| state.entries.len() == 12))
        .await
        .unwrap();
    timeout(TICK, second.wait(|state| state.entries.len() == 12))
        .await
        .unwrap();

    let reference = master.state().entries;
    assert_eq!(reference.len(), 12);
    assert_eq!(first.state().entries, reference);
    assert_eq!(second.state().entries, reference);

    let mut sorted = reference.clone();
    sorted.sort();
    let mut expected: Vec<String> = ["a", "b", "m"]
        .iter()
        .flat_map(|prefix| (0..4).map(move |index| format!("{prefix}{index}")))
        .collect();
    expected.sort();
    assert_eq!(sorted, expected);
}

#[tokio::test]
async fn channels_sharing_one_port_stay_isolated() {
    let hub = MemoryHub::new();
    let master_port: Arc<dyn Port> = Arc::new(hub.port(MASTER_PORT_ID));
    let replica_port: Arc<dyn Port> = Arc::new(hub.port("replica"));

    let master_a = shared_store(
        SyncOptions::new("theme", master_port.clone(), light(), theme_reducers())
            .with_channel("a"),
    );
    let master_b = shared_store(
        SyncOptions::new("theme", master_port, light(), theme_reducers()).with_channel("b"),
    );
    let replica_a = shared_store(
        SyncOptions::new("theme", replica_port.clone(), light(), theme_reducers())
            .with_channel("a"),
    );
    let replica_b = shared_store(
        SyncOptions::new("theme", replica_port, light(), theme_reducers()).with_channel("b"),
    );
    timeout(TICK, replica_a.ready()).await.unwrap();
    timeout(TICK, replica_b.ready()).await.unwrap();

    timeout(TICK, replica_a.dispatch("set_theme", vec![json!("dark")]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(master_a.state().theme, "dark");
    assert_eq!(replica_a.state().theme, "dark");
    assert_eq!(master_b.state().theme, "light");
    assert_eq!(replica_b.state().theme, "light");
}

#[tokio::test]
async fn stores_with_different_names_stay_isolated() {
    let hub = MemoryHub::new();
    let master_port: Arc<dyn Port> = Arc::new(hub.port(MASTER_PORT_ID));
    let replica_port: Arc<dyn Port> = Arc::new(hub.port("replica"));

    let theme_master = shared_store(SyncOptions::new(
        "theme",
        master_port.clone(),
        light(),
        theme_reducers(),
    ));
    let log_master = shared_store(SyncOptions::new(
        "log",
        master_port,
        EventLog::default(),
        log_reducers(),
    ));
    let theme_replica = shared_store(SyncOptions::new(
        "theme",
        replica_port,
        light(),
        theme_reducers(),
    ));
    timeout(TICK, theme_replica.ready()).await.unwrap();

    timeout(TICK, theme_replica.dispatch("set_theme", vec![json!("dark")]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(theme_master.state().theme, "dark");
    assert!(log_master.state().entries.is_empty());
}

fn theme_registry(hub: &MemoryHub, port_id: &str, default_channel: &str) -> ChannelRegistry<Theme> {
    let events = ChannelEvents::new(default_channel);
    let port: Arc<dyn Port> = Arc::new(hub.port(port_id));
    ChannelRegistry::new(events.clone(), move |channel| {
        shared_store(
            SyncOptions::new("theme", port.clone(), light(), theme_reducers())
                .with_channel(channel)
                .with_channels(events.clone()),
        )
    })
}

#[tokio::test]
async fn replica_registers_a_dynamic_channel() {
    let hub = MemoryHub::new();
    let master = theme_registry(&hub, MASTER_PORT_ID, "");
    let replica = theme_registry(&hub, "replica", "channel-x");

    let replica_store = replica.default();
    timeout(TICK, replica_store.ready()).await.unwrap();
    assert_eq!(replica_store.state().theme, "light");

    timeout(TICK, replica_store.dispatch("set_theme", vec![json!("dark")]))
        .await
        .unwrap()
        .unwrap();

    // Registration made the master lazily create its side of the channel.
    assert!(master
        .active_channels()
        .contains(&"channel-x".to_string()));
    assert_eq!(master.channel("channel-x").state().theme, "dark");
    assert_eq!(replica_store.state().theme, "dark");
}

#[tokio::test]
async fn removed_channels_stop_processing() {
    let hub = MemoryHub::new();
    let master = theme_registry(&hub, MASTER_PORT_ID, "");
    let replica = theme_registry(&hub, "replica", "channel-x");

    let replica_store = replica.default();
    timeout(TICK, replica_store.ready()).await.unwrap();

    master.events().notify("channel-x", ChannelEvent::Removed);
    assert!(!master
        .active_channels()
        .contains(&"channel-x".to_string()));

    // With the master-side endpoint gone the forward is never applied or
    // relayed, so the dispatch cannot complete.
    let outcome = timeout(
        Duration::from_millis(200),
        replica_store.dispatch("set_theme", vec![json!("dark")]),
    )
    .await;
    assert!(outcome.is_err());
}

#[tokio::test]
async fn shutdown_abandons_in_flight_dispatches() {
    let hub = MemoryHub::new();
    // No master port exists, so the forward can never be confirmed.
    let replica = theme_endpoint(&hub, "replica");

    let pending = {
        let replica = replica.clone();
        tokio::spawn(async move { replica.dispatch("set_theme", vec![json!("dark")]).await })
    };
    tokio::task::yield_now().await;

    replica.shutdown();
    let outcome = timeout(TICK, pending).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(StoreError::Abandoned)));
}

#[tokio::test]
async fn relayed_actions_fire_replica_listeners() {
    let hub = MemoryHub::new();
    let master = theme_endpoint(&hub, MASTER_PORT_ID);
    let replica = theme_endpoint(&hub, "replica");
    timeout(TICK, replica.ready()).await.unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let _sub = replica.on_action("set_theme", {
        let seen = seen.clone();
        move |args: &[Value]| seen.lock().extend(args.to_vec())
    });

    master
        .dispatch("set_theme", vec![json!("dark")])
        .await
        .unwrap();
    timeout(TICK, replica.wait(|state| state.theme == "dark"))
        .await
        .unwrap();
    assert_eq!(*seen.lock(), vec![json!("dark")]);
}
