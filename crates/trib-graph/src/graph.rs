//! Column-level lineage graph over built dependencies

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use trib_core::{Dependency, DependencyKind, ResourceId};

/// Directed graph of resources; edges run from tail (upstream) to head
#[derive(Debug, Default)]
pub struct LineageGraph {
    graph: DiGraph<ResourceId, DependencyKind>,
    node_map: HashMap<ResourceId, NodeIndex>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dependencies(dependencies: &[Dependency]) -> Self {
        let mut graph = Self::new();
        for dependency in dependencies {
            graph.add_dependency(dependency);
        }
        graph
    }

    fn add_node(&mut self, id: &ResourceId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);
        idx
    }

    pub fn add_dependency(&mut self, dependency: &Dependency) {
        let tail = self.add_node(dependency.tail_id());
        let head = self.add_node(dependency.head_id());
        self.graph.add_edge(tail, head, dependency.kind());
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every resource `id` transitively reads from
    pub fn upstream(&self, id: &ResourceId) -> Vec<ResourceId> {
        self.reachable(id, Direction::Incoming)
    }

    /// Every resource that transitively reads from `id`
    pub fn downstream(&self, id: &ResourceId) -> Vec<ResourceId> {
        self.reachable(id, Direction::Outgoing)
    }

    fn reachable(&self, id: &ResourceId, direction: Direction) -> Vec<ResourceId> {
        let Some(&start) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();
        while let Some(idx) = queue.pop_front() {
            for neighbor in self.graph.neighbors_directed(idx, direction) {
                if visited.insert(neighbor) {
                    found.push(self.graph[neighbor].clone());
                    queue.push_back(neighbor);
                }
            }
        }
        found
    }

    /// Render as Graphviz DOT, labelling nodes through `labels` where known
    pub fn to_dot(&self, labels: &HashMap<ResourceId, String>) -> String {
        let mut dot = String::from("digraph lineage {\n  rankdir=LR;\n  node [shape=box];\n\n");

        let mut nodes: Vec<&ResourceId> = self.graph.node_weights().collect();
        nodes.sort();
        for id in nodes {
            let label = labels.get(id).map(String::as_str).unwrap_or(id.as_str());
            dot.push_str(&format!("  \"{}\" [label=\"{}\"];\n", id, label.replace('"', "\\\"")));
        }

        dot.push('\n');

        for edge in self.graph.edge_references() {
            let style = match edge.weight() {
                DependencyKind::Data => "",
                DependencyKind::Query => " [style=dashed]",
                DependencyKind::Definition => " [style=dotted]",
                DependencyKind::External => " [color=blue]",
            };
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\"{};\n",
                self.graph[edge.source()],
                self.graph[edge.target()],
                style
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trib_core::{LineageId, OrganizationId};

    fn id(s: &str) -> ResourceId {
        ResourceId::try_new(s).unwrap()
    }

    fn edge(head: &str, tail: &str) -> Dependency {
        Dependency::create(
            DependencyKind::Data,
            id(head),
            id(tail),
            LineageId::try_new("run").unwrap(),
            OrganizationId::try_new("org").unwrap(),
        )
    }

    fn chain() -> LineageGraph {
        // raw.amount -> stg.amount -> mart.total, raw.amount -> audit.amount
        LineageGraph::from_dependencies(&[
            edge("stg.amount", "raw.amount"),
            edge("mart.total", "stg.amount"),
            edge("audit.amount", "raw.amount"),
        ])
    }

    #[test]
    fn test_counts() {
        let graph = chain();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_upstream_is_transitive() {
        let graph = chain();
        assert_eq!(
            graph.upstream(&id("mart.total")),
            vec![id("stg.amount"), id("raw.amount")]
        );
        assert!(graph.upstream(&id("raw.amount")).is_empty());
    }

    #[test]
    fn test_downstream_is_transitive() {
        let graph = chain();
        let mut downstream = graph.downstream(&id("raw.amount"));
        downstream.sort();
        assert_eq!(
            downstream,
            vec![id("audit.amount"), id("mart.total"), id("stg.amount")]
        );
    }

    #[test]
    fn test_unknown_node_has_no_lineage() {
        assert!(chain().downstream(&id("missing")).is_empty());
    }

    #[test]
    fn test_to_dot_uses_labels() {
        let graph = LineageGraph::from_dependencies(&[edge("b", "a")]);
        let labels = HashMap::from([(id("a"), "DB.S.U.X".to_string())]);
        let dot = graph.to_dot(&labels);
        assert!(dot.starts_with("digraph lineage {"));
        assert!(dot.contains("\"a\" [label=\"DB.S.U.X\"];"));
        assert!(dot.contains("\"b\" [label=\"b\"];"));
        assert!(dot.contains("\"a\" -> \"b\";"));
    }
}
