use crate::config::RuntimeConfig;
use crate::engine::{EngineServices, FlowEngine, SessionGates};
use crate::gate::InteractionGate;
use crate::loader::CompiledGraph;
use crate::presenter::Presenter;
use crate::registry::ObjectRegistry;
use drillcore::{EventBus, FlowError, FlowEvent, FlowGraph, GraphId, ObjectLookup, Telemetry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Scene-level host for training flows
///
/// Owns the object registry, the named-event bus, and the telemetry channel
/// shared by every engine it spawns.
pub struct FlowRuntime {
    config: RuntimeConfig,
    registry: Arc<ObjectRegistry>,
    event_bus: Arc<EventBus>,
    telemetry: Arc<Telemetry>,
    graphs: Arc<RwLock<HashMap<GraphId, Arc<CompiledGraph>>>>,
    sessions: Arc<RwLock<Vec<Weak<Mutex<SessionGates>>>>>,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ObjectRegistry::new()), config)
    }

    /// Create a new runtime around an existing registry
    pub fn with_registry(registry: Arc<ObjectRegistry>, config: RuntimeConfig) -> Self {
        let telemetry = Arc::new(Telemetry::new(config.telemetry_buffer));
        Self {
            config,
            registry,
            event_bus: Arc::new(EventBus::new()),
            telemetry,
            graphs: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get access to the object registry for registering scene props
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Get the named-event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Subscribe to telemetry from every engine spawned by this runtime
    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.telemetry.subscribe()
    }

    /// Validate and register a graph
    pub async fn load_graph(&self, graph: FlowGraph) -> Result<GraphId, FlowError> {
        let targets: Option<&dyn ObjectLookup> = if self.config.validate_targets_at_load {
            Some(self.registry.as_ref())
        } else {
            None
        };
        let compiled = CompiledGraph::compile_with(graph, targets)?;

        if self.config.warn_on_unreachable {
            for step in compiled.unreachable() {
                tracing::warn!(
                    "Step '{}' in graph '{}' is unreachable from any start step",
                    step.id,
                    compiled.name()
                );
            }
        }

        let id = compiled.id();
        self.graphs.write().await.insert(id, Arc::new(compiled));
        Ok(id)
    }

    pub async fn graph(&self, id: GraphId) -> Option<Arc<CompiledGraph>> {
        self.graphs.read().await.get(&id).cloned()
    }

    /// Build an engine for a loaded graph. The engine does not start until
    /// [`FlowEngine::start`] is called.
    pub async fn spawn_engine(
        &self,
        graph_id: GraphId,
        gate: Box<dyn InteractionGate>,
        presenter: Option<Box<dyn Presenter>>,
    ) -> Result<FlowEngine, FlowError> {
        let graph = self
            .graph(graph_id)
            .await
            .ok_or_else(|| FlowError::GraphNotFound(graph_id.to_string()))?;

        let session_id = Uuid::new_v4();
        tracing::debug!("Spawning session {} for graph '{}'", session_id, graph.name());
        let services = EngineServices {
            registry: Arc::clone(&self.registry),
            bus: Arc::clone(&self.event_bus),
            emitter: self.telemetry.create_emitter(session_id),
        };

        let engine = FlowEngine::new(graph, services, gate);
        {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|s| s.strong_count() > 0);
            sessions.push(engine.session_gates());
        }
        Ok(match presenter {
            Some(presenter) => engine.with_presenter(presenter),
            None => engine,
        })
    }

    /// Tear down every engine spawned so far, then forget every prop,
    /// subscription, and graph of the current scene. Engines release their
    /// gates at once and stay torn down.
    pub async fn unload_scene(&self) {
        let sessions = std::mem::take(&mut *self.sessions.write().await);
        let live: Vec<_> = sessions.iter().filter_map(Weak::upgrade).collect();
        tracing::info!("Unloading scene ({} live sessions)", live.len());
        for gates in live {
            gates.lock().unwrap_or_else(PoisonError::into_inner).close();
        }

        self.registry.clear();
        self.event_bus.clear();
        self.graphs.write().await.clear();
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}
