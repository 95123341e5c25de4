// crates/drillcore/tests/event_bus_test.rs

use drillcore::events::{EventBus, FlowEvent, Telemetry};
use drillcore::GraphId;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[test]
fn test_handlers_run_in_subscription_order() {
    init_tracing();
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    for tag in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        bus.subscribe("ValveOpened", move |name: &str| {
            log.lock().unwrap().push(format!("{}:{}", tag, name));
        });
    }

    assert_eq!(bus.publish("ValveOpened"), 3);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:ValveOpened",
            "second:ValveOpened",
            "third:ValveOpened"
        ]
    );
}

#[test]
fn test_publish_without_subscribers_is_noop() {
    init_tracing();
    let bus = EventBus::new();
    assert_eq!(bus.publish("Nobody"), 0);
    assert_eq!(bus.publish(""), 0);
    assert_eq!(bus.subscriber_count("Nobody"), 0);
}

#[test]
fn test_unsubscribe_removes_handler() {
    let bus = EventBus::new();
    let hits = Arc::new(Mutex::new(0));

    let counter = Arc::clone(&hits);
    let id = bus.subscribe("Tick", move |_: &str| *counter.lock().unwrap() += 1);
    bus.publish("Tick");
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id), "second unsubscribe should report nothing removed");
    bus.publish("Tick");

    assert_eq!(*hits.lock().unwrap(), 1);
    assert_eq!(bus.subscriber_count("Tick"), 0);
}

#[test]
fn test_unsubscribe_during_dispatch_still_delivers_snapshot() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let later_id = Arc::new(Mutex::new(None));

    {
        let bus_ref = Arc::clone(&bus);
        let later_id = Arc::clone(&later_id);
        let log = Arc::clone(&log);
        bus.subscribe("Door", move |_: &str| {
            log.lock().unwrap().push("remover");
            if let Some(id) = later_id.lock().unwrap().take() {
                bus_ref.unsubscribe(id);
            }
        });
    }
    {
        let log = Arc::clone(&log);
        let id = bus.subscribe("Door", move |_: &str| log.lock().unwrap().push("removed"));
        *later_id.lock().unwrap() = Some(id);
    }

    assert_eq!(bus.publish("Door"), 2);
    assert_eq!(bus.publish("Door"), 1);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["remover", "removed", "remover"]
    );
}

#[test]
fn test_handler_may_publish_other_events() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    {
        let inner = Arc::clone(&bus);
        let log = Arc::clone(&log);
        bus.subscribe("A", move |name: &str| {
            log.lock().unwrap().push(name.to_string());
            inner.publish("B");
        });
    }
    {
        let log = Arc::clone(&log);
        bus.subscribe("B", move |name: &str| log.lock().unwrap().push(name.to_string()));
    }

    bus.publish("A");
    assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "published from one of its own handlers")]
fn test_reentrant_publish_panics_in_debug() {
    let bus = Arc::new(EventBus::new());
    let inner = Arc::clone(&bus);
    bus.subscribe("Loop", move |name: &str| {
        inner.publish(name);
    });
    bus.publish("Loop");
}

#[test]
fn test_same_name_published_from_two_threads() {
    init_tracing();
    let bus = Arc::new(EventBus::new());
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let started_tx = Mutex::new(started_tx);
    let hits = Arc::new(Mutex::new(0));

    {
        let hits = Arc::clone(&hits);
        bus.subscribe("Tick", move |_: &str| {
            let _ = started_tx.lock().unwrap().send(());
            std::thread::sleep(std::time::Duration::from_millis(100));
            *hits.lock().unwrap() += 1;
        });
    }

    let first = {
        let bus = Arc::clone(&bus);
        std::thread::spawn(move || bus.publish("Tick"))
    };
    started_rx.recv().unwrap();
    let second = {
        let bus = Arc::clone(&bus);
        std::thread::spawn(move || bus.publish("Tick"))
    };

    assert_eq!(first.join().unwrap(), 1);
    assert_eq!(second.join().unwrap(), 1);
    assert_eq!(*hits.lock().unwrap(), 2);
}

#[test]
fn test_panicking_handler_does_not_block_the_name() {
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(0));
    {
        let calls = Arc::clone(&calls);
        bus.subscribe("Alarm", move |_: &str| {
            let first = {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                panic!("handler failed");
            }
        });
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.publish("Alarm")));
    assert!(result.is_err());
    assert_eq!(bus.publish("Alarm"), 1);
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_telemetry_tags_events_with_session() {
    let telemetry = Telemetry::new(16);
    let mut rx = telemetry.subscribe();
    let session = Uuid::new_v4();
    let emitter = telemetry.create_emitter(session);

    let graph_id = GraphId::new();
    emitter.graph_started(graph_id, "Valve drill");
    emitter.step_fired("intro", "IntroDone");

    match rx.recv().await.unwrap() {
        FlowEvent::GraphStarted {
            graph_id: id,
            graph_name,
            ..
        } => {
            assert_eq!(id, graph_id);
            assert_eq!(graph_name, "Valve drill");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let fired = rx.recv().await.unwrap();
    assert_eq!(fired.session_id(), session);

    let json = serde_json::to_value(&fired).unwrap();
    assert_eq!(json["type"], "StepFired");
    assert_eq!(json["event_name"], "IntroDone");
}

#[test]
fn test_telemetry_with_zero_capacity_still_works() {
    let telemetry = Telemetry::new(0);
    let _rx = telemetry.subscribe();
    telemetry.create_emitter(Uuid::new_v4()).graph_restarted();
}
