use std::collections::HashMap;

use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};

/// A directed graph of data flow between disciplines.
///
/// Nodes are disciplines, addressed by name or by the index they were added
/// with. Edges are connections from one discipline's output to another
/// discipline's input. Feedback cycles are ordinary cycles in this graph;
/// nothing holds references to the disciplines themselves.
#[derive(Debug, Clone)]
pub struct CouplingGraph {
    graph: DiGraph<String, Connection>,
    node_map: HashMap<String, NodeIndex>,
}

/// One step of the evaluation plan derived from a [`CouplingGraph`].
///
/// Indices refer to disciplines in the order they were added to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// A discipline outside any feedback cycle, evaluated once.
    Single(usize),

    /// Disciplines whose outputs depend on each other, in declaration order.
    Cycle(Vec<usize>),
}

impl Stage {
    /// Returns the discipline indices in this stage.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        match self {
            Self::Single(index) => std::slice::from_ref(index),
            Self::Cycle(members) => members,
        }
    }

    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}

impl CouplingGraph {
    /// Creates an empty coupling graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Adds a discipline node, returning its index.
    ///
    /// Adding a name that already exists returns the existing index.
    pub fn add_discipline(&mut self, name: impl Into<String>) -> usize {
        self.get_or_add(name).index()
    }

    /// Connects a discipline output to a discipline input.
    ///
    /// Disciplines that are not yet in the graph are added automatically.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether_core::CouplingGraph;
    ///
    /// let mut graph = CouplingGraph::new();
    ///
    /// // d1.y1 feeds d2.y1 and d2.y2 feeds d1.y2: a feedback cycle.
    /// graph.connect(("d1", "y1"), ("d2", "y1"));
    /// graph.connect(("d2", "y2"), ("d1", "y2"));
    ///
    /// assert!(!graph.is_acyclic());
    /// ```
    pub fn connect<S: Into<Source>, T: Into<Target>>(&mut self, source: S, target: T) {
        let source = source.into();
        let target = target.into();

        let source_index = self.get_or_add(&source.discipline);
        let target_index = self.get_or_add(&target.discipline);

        self.graph
            .add_edge(source_index, target_index, Connection { source, target });
    }

    /// Returns the index of a discipline by name.
    #[must_use]
    pub fn index_of(&self, discipline: &str) -> Option<usize> {
        self.node_map.get(discipline).map(|index| index.index())
    }

    /// Returns the name of the discipline at `index`.
    #[must_use]
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(String::as_str)
    }

    /// Returns the number of disciplines in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns an iterator over all connections.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.graph.edge_weights()
    }

    /// Returns an iterator over all connections into a discipline.
    pub fn incoming_connections(&self, discipline: &str) -> impl Iterator<Item = &Connection> {
        self.edges(discipline, Direction::Incoming)
    }

    /// Returns an iterator over all connections out of a discipline.
    pub fn outgoing_connections(&self, discipline: &str) -> impl Iterator<Item = &Connection> {
        self.edges(discipline, Direction::Outgoing)
    }

    /// Returns the output feeding a discipline input, if it is connected.
    #[must_use]
    pub fn source_of(&self, discipline: &str, input: &str) -> Option<&Source> {
        self.incoming_connections(discipline)
            .find(|connection| connection.target.input == input)
            .map(|connection| &connection.source)
    }

    /// Returns `true` if the graph contains no feedback cycle.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.plan().iter().all(|stage| !stage.is_cycle())
    }

    /// Returns the evaluation plan.
    ///
    /// The plan lists strongly-connected groups of disciplines in
    /// topological order, so every stage appears after the stages it
    /// depends on. A group with more than one discipline, or a discipline
    /// that consumes its own output, is a [`Stage::Cycle`].
    ///
    /// # Examples
    ///
    /// ```
    /// use tether_core::{CouplingGraph, Stage};
    ///
    /// let mut graph = CouplingGraph::new();
    /// graph.connect(("d1", "y1"), ("d2", "y1"));
    /// graph.connect(("d2", "y2"), ("d1", "y2"));
    /// graph.connect(("d2", "y2"), ("obj", "y2"));
    ///
    /// assert_eq!(graph.plan(), vec![Stage::Cycle(vec![0, 1]), Stage::Single(2)]);
    /// ```
    #[must_use]
    pub fn plan(&self) -> Vec<Stage> {
        // Tarjan yields components in reverse topological order.
        tarjan_scc(&self.graph)
            .into_iter()
            .rev()
            .map(|component| {
                if let [node] = component.as_slice() {
                    if self.graph.contains_edge(*node, *node) {
                        Stage::Cycle(vec![node.index()])
                    } else {
                        Stage::Single(node.index())
                    }
                } else {
                    let mut members: Vec<usize> =
                        component.iter().map(|node| node.index()).collect();
                    members.sort_unstable();
                    Stage::Cycle(members)
                }
            })
            .collect()
    }

    fn edges(&self, discipline: &str, direction: Direction) -> impl Iterator<Item = &Connection> {
        self.node_map
            .get(discipline)
            .into_iter()
            .flat_map(move |&index| self.graph.edges_directed(index, direction))
            .map(|edge| edge.weight())
    }

    fn get_or_add<T: Into<String>>(&mut self, discipline: T) -> NodeIndex {
        let discipline = discipline.into();
        *self
            .node_map
            .entry(discipline.clone())
            .or_insert_with(|| self.graph.add_node(discipline))
    }
}

impl Default for CouplingGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// The output end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub discipline: String,
    pub output: String,
}

impl Source {
    #[must_use]
    pub fn new(discipline: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            discipline: discipline.into(),
            output: output.into(),
        }
    }
}

/// The input end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub discipline: String,
    pub input: String,
}

impl Target {
    #[must_use]
    pub fn new(discipline: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            discipline: discipline.into(),
            input: input.into(),
        }
    }
}

/// A directed connection from an output to an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: Source,
    pub target: Target,
}

impl<T: Into<String>> From<(T, T)> for Source {
    fn from((discipline, output): (T, T)) -> Self {
        Self::new(discipline, output)
    }
}

impl<T: Into<String>> From<(T, T)> for Target {
    fn from((discipline, input): (T, T)) -> Self {
        Self::new(discipline, input)
    }
}
