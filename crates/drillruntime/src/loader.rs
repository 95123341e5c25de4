// crates/drillruntime/src/loader.rs

use drillcore::{AuthoringError, FlowError, FlowGraph, GraphId, ObjectLookup, Step};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Read a graph asset from a JSON file.
pub fn load_graph(path: impl AsRef<Path>) -> Result<FlowGraph, FlowError> {
    let file = std::fs::File::open(path.as_ref())?;
    let graph: FlowGraph = serde_json::from_reader(std::io::BufReader::new(file))?;
    tracing::info!(
        "Loaded graph '{}' from {} ({} steps)",
        graph.name,
        path.as_ref().display(),
        graph.steps.len()
    );
    Ok(graph)
}

pub fn parse_graph(json: &str) -> Result<FlowGraph, FlowError> {
    Ok(serde_json::from_str(json)?)
}

enum LinkProblem {
    Unknown,
    Ambiguous { by_event: usize, by_id: usize },
}

/// Resolves link names to step indices: event name first, then id.
struct Linker<'a> {
    by_event: HashMap<&'a str, usize>,
    by_id: HashMap<&'a str, usize>,
}

impl<'a> Linker<'a> {
    fn new(steps: &'a [Step]) -> Self {
        let mut by_event = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, step) in steps.iter().enumerate() {
            by_event.entry(step.event_name.as_str()).or_insert(idx);
            by_id.entry(step.id.as_str()).or_insert(idx);
        }
        Self { by_event, by_id }
    }

    fn resolve(&self, link: &str) -> Result<usize, LinkProblem> {
        match (self.by_event.get(link), self.by_id.get(link)) {
            (Some(&a), Some(&b)) if a != b => Err(LinkProblem::Ambiguous {
                by_event: a,
                by_id: b,
            }),
            (Some(&a), _) => Ok(a),
            (None, Some(&b)) => Ok(b),
            (None, None) => Err(LinkProblem::Unknown),
        }
    }
}

fn outgoing(step: &Step) -> impl Iterator<Item = &String> {
    step.linked_event_names.iter().chain(
        step.condition
            .iter()
            .flat_map(|c| c.when_false.iter()),
    )
}

/// Check a graph for authoring defects. Every problem found is returned.
///
/// With `targets`, every interactive target must also resolve.
pub fn validate(graph: &FlowGraph, targets: Option<&dyn ObjectLookup>) -> Vec<AuthoringError> {
    let mut errors = Vec::new();
    if graph.steps.is_empty() {
        errors.push(AuthoringError::EmptyGraph);
        return errors;
    }

    let mut ids: HashSet<&str> = HashSet::new();
    let mut events: HashMap<&str, &str> = HashMap::new();
    for step in &graph.steps {
        if !ids.insert(step.id.as_str()) {
            errors.push(AuthoringError::DuplicateStepId(step.id.clone()));
        }
        if step.event_name.is_empty() {
            errors.push(AuthoringError::EmptyEventName(step.id.clone()));
            continue;
        }
        if let Some(first) = events.insert(step.event_name.as_str(), step.id.as_str()) {
            errors.push(AuthoringError::DuplicateEventName {
                name: step.event_name.clone(),
                first: first.to_string(),
                second: step.id.clone(),
            });
        }
    }

    let linker = Linker::new(&graph.steps);
    let link_error = |link: &str, problem: LinkProblem, step: &Step| match problem {
        LinkProblem::Unknown => AuthoringError::UnknownLink {
            step: step.id.clone(),
            link: link.to_string(),
        },
        LinkProblem::Ambiguous { by_event, by_id } => AuthoringError::AmbiguousLink {
            link: link.to_string(),
            by_event: graph.steps[by_event].id.clone(),
            by_id: graph.steps[by_id].id.clone(),
        },
    };

    for (idx, step) in graph.steps.iter().enumerate() {
        for link in outgoing(step) {
            match linker.resolve(link) {
                Ok(target) if target == idx => {
                    errors.push(AuthoringError::SelfLink(step.id.clone()));
                }
                Ok(_) => {}
                Err(problem) => errors.push(link_error(link, problem, step)),
            }
        }

        if let (Some(lookup), Some(target)) = (targets, step.target_name()) {
            if lookup.lookup(target).is_err() {
                errors.push(AuthoringError::UnresolvedTarget {
                    step: step.id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }

    for link in &graph.start {
        if linker.resolve(link).is_err() {
            errors.push(AuthoringError::UnknownStart(link.clone()));
        }
    }

    for section in &graph.sections {
        for name in &section.steps {
            if linker.resolve(name).is_err() {
                errors.push(AuthoringError::UnknownSectionStep {
                    section: section.name.clone(),
                    step: name.clone(),
                });
            }
        }
    }

    errors
}

/// Section with its member steps resolved to indices
#[derive(Debug, Clone)]
pub struct SectionIndex {
    pub name: String,
    pub steps: Vec<usize>,
}

/// A validated graph with every link resolved to a step index
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    graph: FlowGraph,
    links: Vec<Vec<usize>>,
    false_links: Vec<Vec<usize>>,
    starts: Vec<usize>,
    sections: Vec<SectionIndex>,
    by_name: HashMap<String, usize>,
    unreachable: Vec<usize>,
}

impl CompiledGraph {
    pub fn compile(graph: FlowGraph) -> Result<Self, AuthoringError> {
        Self::compile_with(graph, None)
    }

    /// Validate and index `graph`, failing on the first authoring error.
    pub fn compile_with(
        graph: FlowGraph,
        targets: Option<&dyn ObjectLookup>,
    ) -> Result<Self, AuthoringError> {
        if let Some(error) = validate(&graph, targets).into_iter().next() {
            tracing::error!("Graph '{}' failed validation: {}", graph.name, error);
            return Err(error);
        }

        let linker = Linker::new(&graph.steps);
        let resolve_all = |names: &[String]| -> Vec<usize> {
            names.iter().filter_map(|n| linker.resolve(n).ok()).collect()
        };

        let links: Vec<Vec<usize>> = graph
            .steps
            .iter()
            .map(|s| resolve_all(&s.linked_event_names))
            .collect();
        let false_links: Vec<Vec<usize>> = graph
            .steps
            .iter()
            .map(|s| {
                s.condition
                    .as_ref()
                    .map(|c| resolve_all(&c.when_false))
                    .unwrap_or_default()
            })
            .collect();

        let mut topology: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..graph.steps.len())
            .map(|idx| topology.add_node(idx))
            .collect();
        for (from, targets) in links.iter().zip(&false_links).enumerate() {
            for &to in targets.0.iter().chain(targets.1) {
                topology.add_edge(nodes[from], nodes[to], ());
            }
        }

        let mut starts = resolve_all(&graph.start);
        if starts.is_empty() {
            starts = nodes
                .iter()
                .filter(|&&n| {
                    topology
                        .neighbors_directed(n, Direction::Incoming)
                        .next()
                        .is_none()
                })
                .map(|n| topology[*n])
                .collect();
        }
        if starts.is_empty() {
            tracing::warn!(
                "Graph '{}' has no step without incoming links; starting at '{}'",
                graph.name,
                graph.steps[0].id
            );
            starts.push(0);
        }

        let mut reached = HashSet::new();
        for &start in &starts {
            let mut dfs = Dfs::new(&topology, nodes[start]);
            while let Some(n) = dfs.next(&topology) {
                reached.insert(topology[n]);
            }
        }
        let unreachable: Vec<usize> = (0..graph.steps.len())
            .filter(|idx| !reached.contains(idx))
            .collect();

        let sections = graph
            .sections
            .iter()
            .map(|s| SectionIndex {
                name: s.name.clone(),
                steps: resolve_all(&s.steps),
            })
            .collect();

        let mut by_name = HashMap::new();
        for (idx, step) in graph.steps.iter().enumerate() {
            by_name.insert(step.id.clone(), idx);
        }
        for (idx, step) in graph.steps.iter().enumerate() {
            by_name.insert(step.event_name.clone(), idx);
        }

        tracing::info!(
            "Compiled graph '{}': {} steps, {} start steps",
            graph.name,
            graph.steps.len(),
            starts.len()
        );

        Ok(Self {
            graph,
            links,
            false_links,
            starts,
            sections,
            by_name,
            unreachable,
        })
    }

    pub fn id(&self) -> GraphId {
        self.graph.id
    }

    pub fn name(&self) -> &str {
        &self.graph.name
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn steps(&self) -> &[Step] {
        &self.graph.steps
    }

    pub fn len(&self) -> usize {
        self.graph.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.steps.is_empty()
    }

    /// Step index for a link name (event name first, then id).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn links(&self, idx: usize) -> &[usize] {
        &self.links[idx]
    }

    pub fn false_links(&self, idx: usize) -> &[usize] {
        &self.false_links[idx]
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn sections(&self) -> &[SectionIndex] {
        &self.sections
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &Step> {
        self.unreachable.iter().map(|&idx| &self.graph.steps[idx])
    }
}
