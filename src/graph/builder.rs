//! Graph Construction
//!
//! Walks a service breadth-first with an explicit work queue. A shape already
//! present in the graph is linked again but never re-expanded, so recursive
//! structures terminate.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use super::tags::{tag_edge, EdgeSource, RelationTag};
use super::ResourceGraph;
use crate::error::{BindingError, Result};
use crate::model::{Model, ShapeId, ShapeType};

/// Build the relationship graph rooted at `service`
pub fn build(model: Arc<Model>, service: &ShapeId) -> Result<ResourceGraph> {
    model.expect_shape_of(service, ShapeType::Service)?;

    let mut graph = ResourceGraph::empty(service.clone(), Arc::clone(&model));
    let mut queue = VecDeque::new();
    graph.ensure_node(service);
    queue.push_back(service.clone());

    while let Some(current) = queue.pop_front() {
        let parent = graph.node_index(&current).ok_or_else(|| {
            BindingError::inconsistent(&current, "queued shape missing from graph")
        })?;
        for (child, tag) in references(&model, &current)? {
            let (child_idx, is_new) = graph.ensure_node(&child);
            graph.link(parent, child_idx, tag);
            if is_new {
                queue.push_back(child);
            }
        }
    }

    info!(
        service = %service,
        nodes = graph.shape_count(),
        edges = graph.edge_count(),
        "built resource graph"
    );
    Ok(graph)
}

/// Direct references of a shape, tagged, in expansion order.
fn references(model: &Model, id: &ShapeId) -> Result<Vec<(ShapeId, RelationTag)>> {
    if id.is_member() {
        let member = model.expect_member(id)?;
        let tag = tag_edge(EdgeSource::Member(member), &member.target)
            .ok_or_else(|| BindingError::inconsistent(id, "member without a target"))?;
        return Ok(vec![(member.target.clone(), tag)]);
    }

    let shape = model.expect_shape(id)?;
    let children: Vec<ShapeId> = match shape.shape_type {
        ShapeType::Service => shape
            .resources
            .iter()
            .chain(shape.operations.iter())
            .cloned()
            .collect(),
        ShapeType::Resource => shape
            .resources
            .iter()
            .chain(shape.all_resource_operations())
            .cloned()
            .collect(),
        ShapeType::Operation => shape
            .input
            .iter()
            .chain(shape.output.iter())
            .chain(shape.errors.iter())
            .cloned()
            .collect(),
        _ => shape
            .mixins
            .iter()
            .cloned()
            .chain(shape.members.iter().map(|m| m.id.clone()))
            .collect(),
    };

    let mut tagged = Vec::with_capacity(children.len());
    for child in children {
        let tag = tag_edge(EdgeSource::Shape(shape), &child).ok_or_else(|| {
            BindingError::inconsistent(id, format!("no relation to {}", child))
        })?;
        debug!(parent = %id, child = %child, tag = %tag, "tagged edge");
        tagged.push((child, tag));
    }
    Ok(tagged)
}
