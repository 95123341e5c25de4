// crates/drillkit/tests/kit_test.rs

use drillcore::{EndAction, FlowEvent, FlowGraph, Step};
use drillkit::{
    describe, register_props, AutoGate, DelayedGate, PresenterCall, RecordingPresenter,
    ScoreRecorder, ScoreRules,
};
use drillruntime::{FlowRuntime, StepStatus};
use std::io::Write;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn valve_graph() -> FlowGraph {
    FlowGraph::new("Valve drill")
        .with_step(
            Step::new("intro", "Intro")
                .with_end_action(EndAction::NextEvent)
                .with_links(["OpenValve"])
                .with_text("Open the valve, then read the gauge."),
        )
        .with_step(
            Step::new("open", "OpenValve")
                .with_target("Valve")
                .with_end_action(EndAction::NextEvent)
                .with_links(["ReadGauge"]),
        )
        .with_step(Step::new("read", "ReadGauge").with_target("Gauge"))
}

#[test]
fn test_register_props_adds_only_missing_targets() {
    let runtime = FlowRuntime::new();
    let valve = runtime.registry().register_new("Valve");

    let added = register_props(runtime.registry(), &valve_graph());

    assert_eq!(added, vec!["Gauge"]);
    assert_eq!(runtime.registry().resolve("Valve"), Ok(valve));
    assert!(runtime.registry().contains("Gauge"));
}

#[tokio::test]
async fn test_auto_gate_plays_graph_to_the_end() {
    init_tracing();
    let runtime = FlowRuntime::new();
    let graph = valve_graph();
    register_props(runtime.registry(), &graph);

    let rules = ScoreRules::new().with("OpenValve", 10).with("ReadGauge", 5);
    let score = ScoreRecorder::attach(runtime.event_bus(), &rules);
    let presenter = RecordingPresenter::new();

    let id = runtime.load_graph(graph).await.unwrap();
    let mut engine = runtime
        .spawn_engine(id, Box::new(AutoGate::new()), Some(Box::new(presenter.clone())))
        .await
        .unwrap();
    engine.start();
    while engine.pump() > 0 {}

    assert_eq!(engine.published().to_vec(), vec!["Intro", "OpenValve", "ReadGauge"]);
    assert_eq!(engine.status("read"), Some(&StepStatus::Held));
    assert_eq!(presenter.presented(), vec!["intro", "open", "read"]);
    assert!(matches!(
        presenter.calls()[1],
        PresenterCall::Highlight { ref step_id, .. } if step_id == "open"
    ));

    assert_eq!(score.total(), 15);
    assert_eq!(
        score.hits(),
        vec![("OpenValve".to_string(), 10), ("ReadGauge".to_string(), 5)]
    );
    assert_eq!(score.detach(runtime.event_bus()), 2);
    assert_eq!(runtime.event_bus().subscriber_count("OpenValve"), 0);
}

#[tokio::test]
async fn test_delayed_gate_completes_through_next_signal() {
    init_tracing();
    let runtime = FlowRuntime::new();
    let graph = valve_graph();
    register_props(runtime.registry(), &graph);
    let id = runtime.load_graph(graph).await.unwrap();

    let mut engine = runtime
        .spawn_engine(id, Box::new(DelayedGate::new(5)), None)
        .await
        .unwrap();
    engine.start();
    assert_eq!(engine.published().to_vec(), vec!["Intro"]);

    assert!(engine.next_signal().await);
    assert_eq!(engine.published().to_vec(), vec!["Intro", "OpenValve"]);
    assert!(engine.next_signal().await);
    assert_eq!(
        engine.published().to_vec(),
        vec!["Intro", "OpenValve", "ReadGauge"]
    );
    assert!(engine.is_idle());
}

#[test]
fn test_score_rules_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{ "points": { "OpenValve": 3, "ReadGauge": 7 } }"#)
        .unwrap();

    let rules = ScoreRules::from_file(file.path()).unwrap();
    assert_eq!(rules.points.get("ReadGauge"), Some(&7));
    assert_eq!(rules.points.len(), 2);
}

#[tokio::test]
async fn test_describe_formats_telemetry() {
    let runtime = FlowRuntime::new();
    runtime.registry().register_new("Valve");
    runtime.registry().register_new("Gauge");
    let mut events = runtime.subscribe_events();

    let id = runtime.load_graph(valve_graph()).await.unwrap();
    let mut engine = runtime
        .spawn_engine(id, Box::new(AutoGate::new()), None)
        .await
        .unwrap();
    engine.start();
    engine.pump();

    let mut lines = Vec::new();
    while let Ok(event) = events.try_recv() {
        if matches!(event, FlowEvent::StepFired { .. } | FlowEvent::StepArmed { .. }) {
            lines.push(describe(&event));
        }
    }
    assert_eq!(lines[0], "  ⚡ intro fired 'Intro'");
    assert_eq!(lines[1], "  👉 open waiting on 'Valve'");
}

#[tokio::test]
async fn test_bundled_toolbox_graph_plays_unattended() {
    init_tracing();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../drillcli/graphs/toolbox.json");
    let graph = drillruntime::load_graph(path).unwrap();

    let runtime = FlowRuntime::new();
    assert_eq!(
        register_props(runtime.registry(), &graph),
        vec!["Wrench", "Gloves", "Goggles", "Pipe"]
    );
    let id = runtime.load_graph(graph).await.unwrap();
    let mut engine = runtime
        .spawn_engine(id, Box::new(AutoGate::new()), None)
        .await
        .unwrap();
    engine.start();
    while engine.pump() > 0 {}

    assert_eq!(
        engine.published().to_vec(),
        vec![
            "BriefingDone",
            "ToolsGathered",
            "WrenchTaken",
            "GlovesTaken",
            "GogglesTaken",
            "PipeHighlighted",
            "PipeFitted",
            "DrillComplete",
        ]
    );
    let report = engine.report();
    assert!(report.sections.iter().all(|s| s.is_complete()));
}
