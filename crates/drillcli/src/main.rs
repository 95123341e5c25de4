// crates/drillcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use drillcore::{
    Compare, Condition, EndAction, FlowGraph, MediaCue, Operand, OperandSource, Step,
};
use drillkit::{register_props, spawn_printer, AutoGate, ScoreRecorder, ScoreRules, TracingPresenter};
use drillruntime::{FlowEngine, FlowRuntime, InteractionGate, ManualGate, ObjectRegistry, RuntimeConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "drill")]
#[command(about = "Training flow CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a graph file
    Run {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Props present in the scene (defaults to every target the graph names)
        #[arg(short, long, value_delimiter = ',')]
        props: Vec<String>,

        /// Props to interact with, in order
        #[arg(short, long, value_delimiter = ',')]
        script: Vec<String>,

        /// Read interactions from stdin, one prop name per line
        #[arg(long, conflicts_with_all = ["script", "auto"])]
        interactive: bool,

        /// Complete every gate as soon as it is armed
        #[arg(long, conflicts_with = "script")]
        auto: bool,

        /// Runtime variable, e.g. `pressure=55` or `offset=1.0,2.0`
        #[arg(long = "set", value_parser = parse_variable)]
        variables: Vec<(String, Operand)>,

        /// Score rules JSON file
        #[arg(long)]
        score: Option<PathBuf>,

        /// Runtime config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file
    Validate {
        /// Path to graph JSON file
        file: PathBuf,

        /// Also check interactive targets against these prop names
        #[arg(short, long, value_delimiter = ',')]
        props: Vec<String>,
    },

    /// Create a new example graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "drill.json")]
        output: PathBuf,
    },
}

fn parse_variable(arg: &str) -> Result<(String, Operand), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    let operand = if let Ok(n) = value.parse::<i64>() {
        Operand::Int(n)
    } else if let Ok(n) = value.parse::<f64>() {
        Operand::Float(n)
    } else {
        let components = value
            .split(',')
            .map(|c| c.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("'{}' is not a number or vector", value))?;
        Operand::Vector(components)
    };
    Ok((name.to_string(), operand))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            props,
            script,
            interactive,
            auto,
            variables,
            score,
            config,
            verbose,
        } => {
            // Initialize logging
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            let mode = if auto {
                Mode::Auto
            } else if interactive {
                Mode::Interactive
            } else {
                Mode::Script(script)
            };
            let options = RunOptions {
                props,
                variables,
                score,
                config,
                mode,
            };
            run_graph(file, options).await?;
        }

        Commands::Validate { file, props } => {
            validate_graph(file, props)?;
        }

        Commands::Init { output } => {
            create_example_graph(output)?;
        }
    }

    Ok(())
}

enum Mode {
    Script(Vec<String>),
    Interactive,
    Auto,
}

struct RunOptions {
    props: Vec<String>,
    variables: Vec<(String, Operand)>,
    score: Option<PathBuf>,
    config: Option<PathBuf>,
    mode: Mode,
}

async fn run_graph(file: PathBuf, options: RunOptions) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let config = match &options.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    let graph = drillruntime::load_graph(&file)?;

    println!("📋 Graph: {}", graph.name);
    println!("   Steps: {}", graph.steps.len());
    println!("   Sections: {}", graph.sections.len());
    println!();

    let runtime = FlowRuntime::with_config(config);
    if options.props.is_empty() {
        register_props(runtime.registry(), &graph);
    } else {
        for prop in &options.props {
            runtime.registry().register_new(prop.as_str());
        }
    }

    let score = match &options.score {
        Some(path) => Some(ScoreRecorder::attach(
            runtime.event_bus(),
            &ScoreRules::from_file(path)?,
        )),
        None => None,
    };

    // Subscribe to telemetry for real-time output
    let printer = spawn_printer(runtime.subscribe_events());

    let graph_id = runtime.load_graph(graph).await?;
    let manual = ManualGate::new();
    let gate: Box<dyn InteractionGate> = match options.mode {
        Mode::Auto => Box::new(AutoGate::new()),
        _ => Box::new(manual.clone()),
    };
    let mut engine = runtime
        .spawn_engine(graph_id, gate, Some(Box::new(TracingPresenter)))
        .await?;
    for (name, value) in options.variables {
        engine.set_variable(name, value);
    }

    engine.start();
    match options.mode {
        Mode::Auto => while engine.pump() > 0 {},
        Mode::Script(script) => {
            for prop in script {
                if manual.interact(&prop) == 0 {
                    println!("  ⚠️  Nothing is waiting on '{}'", prop);
                }
                engine.pump();
            }
        }
        Mode::Interactive => read_interactions(&mut engine, &manual).await?,
    }

    // Wait for telemetry to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();

    print_summary(&engine, score.as_ref());
    engine.teardown();
    Ok(())
}

async fn read_interactions(engine: &mut FlowEngine, gate: &ManualGate) -> Result<()> {
    println!("Type a prop name to interact, 'resume <step>', 'restart' or 'quit'.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ') {
            _ if line.is_empty() => continue,
            _ if line == "quit" => break,
            _ if line == "restart" => engine.restart(),
            Some(("resume", step)) => {
                if let Err(e) = engine.resume(step.trim()) {
                    println!("  ⚠️  {}", e);
                }
            }
            _ => {
                if gate.interact(line) == 0 {
                    let armed = gate.armed_targets();
                    println!("  ⚠️  Nothing is waiting on '{}' (armed: {:?})", line, armed);
                }
                engine.pump();
            }
        }
    }
    Ok(())
}

fn print_summary(engine: &FlowEngine, score: Option<&ScoreRecorder>) {
    let report = engine.report();
    println!();
    println!("📊 Run Summary:");
    println!("   Session ID: {}", report.session_id);
    println!("   Published: {}", report.published.join(" → "));

    if !report.sections.is_empty() {
        println!();
        println!("📚 Sections:");
        for section in &report.sections {
            let mark = if section.is_complete() { "✅" } else { "⏳" };
            println!(
                "   {} {}: {}/{}",
                mark, section.name, section.completed, section.total
            );
        }
    }

    let stalled: Vec<_> = report
        .steps
        .iter()
        .filter(|s| s.status.is_stalled())
        .collect();
    if !stalled.is_empty() {
        println!();
        println!("❌ Stalled steps:");
        for step in stalled {
            println!("   {} ({}): {}", step.id, step.event_name, step.status);
        }
    }

    if let Some(score) = score {
        println!();
        println!("🏆 Score: {}", score.total());
    }
}

fn validate_graph(file: PathBuf, props: Vec<String>) -> Result<()> {
    println!("🔍 Validating graph: {}", file.display());

    let graph = drillruntime::load_graph(&file)?;
    let registry = ObjectRegistry::new();
    for prop in &props {
        registry.register_new(prop.as_str());
    }
    let targets: Option<&dyn drillcore::ObjectLookup> = if props.is_empty() {
        None
    } else {
        Some(&registry)
    };

    let errors = drillruntime::validate(&graph, targets);
    if !errors.is_empty() {
        println!("❌ Graph has {} authoring errors:", errors.len());
        for error in &errors {
            println!("   • {}", error);
        }
        anyhow::bail!("validation failed");
    }

    println!("✅ Graph is valid:");
    println!("   Name: {}", graph.name);
    println!("   Steps: {}", graph.steps.len());
    let targets: Vec<&str> = graph.steps.iter().filter_map(|s| s.target_name()).collect();
    println!("   Props: {}", targets.join(", "));

    Ok(())
}

fn create_example_graph(output: PathBuf) -> Result<()> {
    let mut graph = FlowGraph::new("Pump room inspection");
    graph.description = Some("Open the intake valve, check the gauge, log the result".to_string());

    let mut intro = Step::new("intro", "IntroFinished")
        .with_end_action(EndAction::NextEvent)
        .with_links(["ValveOpened"])
        .with_text("Welcome. Open the intake valve to begin.");
    intro.content.voice = Some(MediaCue {
        name: "intro_vo".to_string(),
        content: None,
    });

    let valve = Step::new("valve", "ValveOpened")
        .with_target("IntakeValve")
        .with_end_action(EndAction::NextEvent)
        .with_links(["PressureChecked"])
        .with_text("Turn the intake valve.");

    let check = Step::new("check", "PressureChecked")
        .with_target("PressureGauge")
        .with_end_action(EndAction::NextEvent)
        .with_links(["LogSafe"])
        .with_condition(
            Condition::new(
                Compare::GreaterOrEqual,
                OperandSource::variable("pressure"),
                OperandSource::literal(40),
            )
            .otherwise(["LogLow"]),
        )
        .with_text("Read the pressure gauge.");

    let safe = Step::new("safe", "LogSafe")
        .with_target("Clipboard")
        .with_exit_event("InspectionDone")
        .with_text("Pressure is nominal. Sign the log.");
    let low = Step::new("low", "LogLow")
        .with_target("Clipboard")
        .with_exit_event("InspectionDone")
        .with_text("Pressure is low. Report it on the log.");

    for step in [intro, valve, check, safe, low] {
        graph.add_step(step);
    }
    graph = graph
        .with_start("intro")
        .with_section("Setup", ["intro", "valve"])
        .with_section("Inspection", ["check", "safe"]);

    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  drill run --file {} --set pressure=55 --script IntakeValve,PressureGauge,Clipboard",
        output.display()
    );

    Ok(())
}
