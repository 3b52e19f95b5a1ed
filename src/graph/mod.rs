//! Schema Relationship Graph
//!
//! Directed petgraph over shape ids, built per service by walking services,
//! resources, operations, their input/output/error structures, members and
//! member targets. Every edge carries a [`RelationTag`].
//!
//! Edge tags are also indexed by an unordered pair of node indices, so
//! `relation(a, b)` and `relation(b, a)` resolve to the same record in O(1).
//! When both directions exist (a structure whose member targets the structure
//! itself) the first tag recorded wins. Traversal still follows direction.
//!
//! Closure queries use an explicit stack and a visited set and therefore
//! terminate on recursive models.

pub mod builder;
pub mod cache;
pub mod tags;

pub use cache::GraphCache;
pub use tags::{tag_edge, Crudl, EdgeSource, RelationTag};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{BindingError, Result};
use crate::model::{MemberShape, Model, Shape, ShapeId, ShapeType};

/// Unordered pair of node indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EdgeKey(NodeIndex, NodeIndex);

impl EdgeKey {
    fn new(a: NodeIndex, b: NodeIndex) -> Self {
        if a.index() <= b.index() {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// The relationship graph of one service
pub struct ResourceGraph {
    service: ShapeId,
    model: Arc<Model>,

    /// Primary graph structure; cycles allowed
    pub(crate) graph: DiGraph<ShapeId, RelationTag>,

    /// Node index lookup: shape id -> NodeIndex
    pub(crate) node_indices: HashMap<ShapeId, NodeIndex>,

    /// Edge tag lookup keyed by unordered endpoints
    pub(crate) tags: HashMap<EdgeKey, RelationTag>,
}

impl ResourceGraph {
    /// Build the graph for `service`. Prefer [`GraphCache::get`], which
    /// memoizes the result.
    pub fn build(model: Arc<Model>, service: &ShapeId) -> Result<Self> {
        builder::build(model, service)
    }

    pub(crate) fn empty(service: ShapeId, model: Arc<Model>) -> Self {
        Self {
            service,
            model,
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    /// Returns the node index and whether it was newly inserted.
    pub(crate) fn ensure_node(&mut self, id: &ShapeId) -> (NodeIndex, bool) {
        if let Some(&idx) = self.node_indices.get(id) {
            return (idx, false);
        }
        let idx = self.graph.add_node(id.clone());
        self.node_indices.insert(id.clone(), idx);
        (idx, true)
    }

    pub(crate) fn node_index(&self, id: &ShapeId) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    /// Add a directed edge once; the undirected tag record keeps its first value.
    pub(crate) fn link(&mut self, from: NodeIndex, to: NodeIndex, tag: RelationTag) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, tag);
        }
        self.tags.entry(EdgeKey::new(from, to)).or_insert(tag);
    }

    // ========== Public API ==========

    /// The service this graph is rooted at
    pub fn service(&self) -> &ShapeId {
        &self.service
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Number of shapes (including members) in the graph
    pub fn shape_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Top-level shape in this graph
    pub fn shape(&self, id: &ShapeId) -> Option<&Shape> {
        if !self.contains(id) {
            return None;
        }
        self.model.get(id)
    }

    /// Member shape in this graph
    pub fn member(&self, id: &ShapeId) -> Option<&MemberShape> {
        if !self.contains(id) {
            return None;
        }
        self.model.get_member(id)
    }

    /// Immediate successors
    pub fn children(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Immediate predecessors
    pub fn parents(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &ShapeId, direction: Direction) -> BTreeSet<ShapeId> {
        let Some(idx) = self.node_index(id) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n))
            .cloned()
            .collect()
    }

    /// Every shape reachable by forward edges, excluding `id` itself
    pub fn closure(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        self.walk(id, Direction::Outgoing)
    }

    /// Every shape that can reach `id`, excluding `id` itself
    pub fn reverse_closure(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        self.walk(id, Direction::Incoming)
    }

    fn walk(&self, id: &ShapeId, direction: Direction) -> BTreeSet<ShapeId> {
        let Some(start_idx) = self.node_index(id) else {
            return BTreeSet::new();
        };

        let mut result = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start_idx];

        while let Some(node_idx) = stack.pop() {
            if !visited.insert(node_idx) {
                continue;
            }
            if node_idx != start_idx {
                if let Some(node_id) = self.graph.node_weight(node_idx) {
                    result.insert(node_id.clone());
                }
            }
            stack.extend(self.graph.neighbors_directed(node_idx, direction));
        }
        result
    }

    pub fn filtered_closure(
        &self,
        id: &ShapeId,
        filter: impl Fn(&ShapeId) -> bool,
    ) -> BTreeSet<ShapeId> {
        self.closure(id).into_iter().filter(|s| filter(s)).collect()
    }

    pub fn filtered_reverse_closure(
        &self,
        id: &ShapeId,
        filter: impl Fn(&ShapeId) -> bool,
    ) -> BTreeSet<ShapeId> {
        self.reverse_closure(id)
            .into_iter()
            .filter(|s| filter(s))
            .collect()
    }

    /// Map every closure member, dropping `None`s
    pub fn transformed_closure<T: Ord>(
        &self,
        id: &ShapeId,
        transform: impl Fn(&ShapeId) -> Option<T>,
    ) -> BTreeSet<T> {
        self.closure(id).iter().filter_map(transform).collect()
    }

    fn is_shape_type(&self, id: &ShapeId, shape_type: ShapeType) -> bool {
        self.shape(id).map(|s| s.shape_type == shape_type).unwrap_or(false)
    }

    /// The unique service whose reverse closure contains `operation`
    pub fn service_for_operation(&self, operation: &ShapeId) -> Result<ShapeId> {
        let services =
            self.filtered_reverse_closure(operation, |s| self.is_shape_type(s, ShapeType::Service));
        let mut iter = services.into_iter();
        match (iter.next(), iter.next()) {
            (Some(service), None) => Ok(service),
            (None, _) => Err(BindingError::inconsistent(
                operation,
                "not in the reverse closure of any service",
            )),
            (Some(first), Some(second)) => Err(BindingError::inconsistent(
                operation,
                format!("reachable from more than one service ({}, {})", first, second),
            )),
        }
    }

    /// Tag of the edge between `a` and `b`, in either direction
    pub fn relation(&self, a: &ShapeId, b: &ShapeId) -> Option<RelationTag> {
        let ka = self.node_index(a)?;
        let kb = self.node_index(b)?;
        self.tags.get(&EdgeKey::new(ka, kb)).copied()
    }

    /// Operations reachable from the service, in id order
    pub fn operations(&self) -> Vec<&Shape> {
        self.closure(&self.service)
            .iter()
            .filter_map(|id| self.shape(id))
            .filter(|s| s.is_operation())
            .collect()
    }

    /// Every directed edge as (source, target, tag), in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&ShapeId, &ShapeId, RelationTag)> {
        self.graph.edge_references().map(|e| {
            (
                &self.graph[e.source()],
                &self.graph[e.target()],
                *e.weight(),
            )
        })
    }

    /// Export the graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph ResourceGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  bgcolor=\"#1e1e1e\";\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10, fontcolor=\"white\", color=\"#404040\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\"];\n");
        output.push('\n');

        let color_map = [
            (ShapeType::Service, "#9C27B0"),
            (ShapeType::Resource, "#795548"),
            (ShapeType::Operation, "#2196F3"),
            (ShapeType::Structure, "#00BCD4"),
            (ShapeType::Union, "#FF9800"),
            (ShapeType::Enum, "#FF5722"),
            (ShapeType::IntEnum, "#FF5722"),
            (ShapeType::List, "#4CAF50"),
            (ShapeType::Set, "#4CAF50"),
            (ShapeType::Map, "#4CAF50"),
        ];

        for node_idx in self.graph.node_indices() {
            let id = &self.graph[node_idx];
            let (label, color) = match self.shape(id) {
                Some(shape) => {
                    let color = color_map
                        .iter()
                        .find(|(ty, _)| *ty == shape.shape_type)
                        .map(|(_, color)| *color)
                        .unwrap_or("#607D8B");
                    (id.name().to_string(), color)
                }
                // member node
                None => (format!("${}", id.member().unwrap_or_default()), "#9E9E9E"),
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
                id, label, color
            ));
        }

        output.push('\n');

        for (source, target, tag) in self.edges() {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                source, target, tag
            ));
        }

        output.push_str("}\n");
        output
    }

    fn kind_of(&self, id: &ShapeId) -> &'static str {
        match self.shape(id) {
            Some(shape) => shape.shape_type.as_str(),
            None => ShapeType::Member.as_str(),
        }
    }
}

/// Indented tree from the service, each node prefixed by its kind and the
/// tag of the edge that reached it. Shapes already printed are not expanded
/// again.
impl fmt::Display for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.node_index(&self.service) else {
            return Ok(());
        };

        let mut expanded = HashSet::new();
        let mut stack: Vec<(NodeIndex, usize, Option<RelationTag>)> = vec![(root, 0, None)];
        let mut first = true;

        while let Some((idx, depth, tag)) = stack.pop() {
            let id = &self.graph[idx];
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{:indent$}{} ", "", self.kind_of(id), indent = depth * 2)?;
            if let Some(tag) = tag {
                write!(f, "{} ", tag)?;
            }
            write!(f, "{}", id)?;

            if !expanded.insert(idx) {
                continue;
            }
            let mut edges: Vec<_> = self.graph.edges_directed(idx, Direction::Outgoing).collect();
            // reversed so the first inserted edge is popped first
            edges.sort_by_key(|e| std::cmp::Reverse(e.id()));
            for edge in edges {
                stack.push((edge.target(), depth + 1, Some(*edge.weight())));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGraph")
            .field("service", &self.service)
            .field("shapes", &self.shape_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> ShapeId {
        ShapeId::parse(raw).unwrap()
    }

    fn recursive_model() -> Arc<Model> {
        let doc = json!({
            "smithy": "2.0",
            "shapes": {
                "ex#Trees": {
                    "type": "service",
                    "operations": [{ "target": "ex#PlantTree" }]
                },
                "ex#PlantTree": {
                    "type": "operation",
                    "input": { "target": "ex#Node" },
                    "output": { "target": "ex#Node" }
                },
                "ex#Node": {
                    "type": "structure",
                    "members": {
                        "name": { "target": "smithy.api#String" },
                        "children": { "target": "ex#NodeList" }
                    }
                },
                "ex#NodeList": {
                    "type": "list",
                    "member": { "target": "ex#Node" }
                }
            }
        });
        Arc::new(Model::from_json(&doc).unwrap())
    }

    #[test]
    fn test_recursive_model_terminates() {
        let graph = ResourceGraph::build(recursive_model(), &id("ex#Trees")).unwrap();
        let closure = graph.closure(&id("ex#Node"));
        assert!(closure.contains(&id("ex#NodeList")));
        assert!(closure.contains(&id("smithy.api#String")));
        assert!(!closure.contains(&id("ex#Node")));
        assert!(!closure.contains(&id("ex#Trees")));

        // the list reaches back to the node through its member
        assert!(graph.closure(&id("ex#NodeList")).contains(&id("ex#Node")));
        assert!(graph.reverse_closure(&id("ex#Node")).contains(&id("ex#Trees")));
    }

    #[test]
    fn test_first_tag_wins_for_shared_shape() {
        let graph = ResourceGraph::build(recursive_model(), &id("ex#Trees")).unwrap();
        assert_eq!(
            graph.relation(&id("ex#PlantTree"), &id("ex#Node")),
            Some(RelationTag::InputForOperation)
        );
        assert_eq!(
            graph.relation(&id("ex#Node"), &id("ex#PlantTree")),
            Some(RelationTag::InputForOperation)
        );
        // one directed edge even though input and output are the same shape
        assert_eq!(graph.children(&id("ex#PlantTree")).len(), 1);
    }

    #[test]
    fn test_children_and_parents_are_inverse() {
        let graph = ResourceGraph::build(recursive_model(), &id("ex#Trees")).unwrap();
        for (source, target, _) in graph.edges() {
            assert!(graph.children(source).contains(target));
            assert!(graph.parents(target).contains(source));
        }
    }

    #[test]
    fn test_service_for_operation() {
        let graph = ResourceGraph::build(recursive_model(), &id("ex#Trees")).unwrap();
        assert_eq!(graph.service_for_operation(&id("ex#PlantTree")).unwrap(), id("ex#Trees"));
        let err = graph.service_for_operation(&id("ex#Missing")).unwrap_err();
        assert!(matches!(err, BindingError::InconsistentSchema { .. }));
    }

    #[test]
    fn test_display_and_dot() {
        let graph = ResourceGraph::build(recursive_model(), &id("ex#Trees")).unwrap();
        let tree = graph.to_string();
        assert!(tree.starts_with("service ex#Trees"));
        assert!(tree.contains("  operation operation-for-service ex#PlantTree"));
        assert!(tree.contains("member member-of-shape ex#Node$name"));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph ResourceGraph {"));
        assert!(dot.contains("\"ex#PlantTree\" -> \"ex#Node\" [label=\"input-for-operation\"]"));
    }

    #[test]
    fn test_non_service_root_is_rejected() {
        let err = ResourceGraph::build(recursive_model(), &id("ex#Node")).unwrap_err();
        assert!(matches!(err, BindingError::InconsistentSchema { .. }));
    }
}
