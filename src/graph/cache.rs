//! Graph Cache
//!
//! Memoizes one [`ResourceGraph`] per service for the lifetime of a
//! generation run. The cache is an explicit context object; components that
//! need graph access receive it by reference.
//!
//! Each service has its own holder guarded by a mutex, so concurrent
//! requests for the same service build at most once while different
//! services build independently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use super::ResourceGraph;
use crate::error::{BindingError, Result};
use crate::model::{Model, ShapeId, ShapeType};

type Holder = Arc<Mutex<Option<Arc<ResourceGraph>>>>;

pub struct GraphCache {
    model: Arc<Model>,
    holders: Mutex<BTreeMap<ShapeId, Holder>>,
    builds: AtomicUsize,
}

impl GraphCache {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            holders: Mutex::new(BTreeMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Number of graphs actually constructed so far
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn holder(&self, service: &ShapeId) -> Holder {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(holders.entry(service.clone()).or_default())
    }

    /// The graph for `service`, building it on first request.
    pub fn get(&self, service: &ShapeId) -> Result<Arc<ResourceGraph>> {
        self.model.expect_shape_of(service, ShapeType::Service)?;

        let holder = self.holder(service);
        let mut slot = holder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(graph) = slot.as_ref() {
            debug!(service = %service, "graph cache hit");
            return Ok(Arc::clone(graph));
        }

        info!(service = %service, "graph cache miss, building");
        let graph = Arc::new(ResourceGraph::build(Arc::clone(&self.model), service)?);
        self.builds.fetch_add(1, Ordering::SeqCst);
        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    /// Already-built graph for `service`, without building
    pub fn cached(&self, service: &ShapeId) -> Option<Arc<ResourceGraph>> {
        let holder = {
            let holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
            holders.get(service).cloned()?
        };
        let slot = holder.lock().unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }

    /// Snapshot of every built graph, in service id order
    pub fn built(&self) -> Vec<Arc<ResourceGraph>> {
        let holders: Vec<Holder> = {
            let holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
            holders.values().cloned().collect()
        };
        holders
            .iter()
            .filter_map(|h| h.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    /// A graph containing `shape`.
    ///
    /// A service id yields its own graph. Otherwise already-built graphs are
    /// scanned first, then the remaining services are built in id order.
    pub fn graph_containing(&self, shape: &ShapeId) -> Result<Arc<ResourceGraph>> {
        if self.model.get(shape).map(|s| s.is_service()).unwrap_or(false) {
            return self.get(shape);
        }

        if let Some(graph) = self.built().into_iter().find(|g| g.contains(shape)) {
            return Ok(graph);
        }

        for service in self.model.services() {
            if self.cached(&service.id).is_some() {
                continue;
            }
            let graph = self.get(&service.id)?;
            if graph.contains(shape) {
                return Ok(graph);
            }
        }

        Err(BindingError::inconsistent(shape, "not contained in any service graph"))
    }

    /// The unique service whose graph reaches `operation`.
    ///
    /// Fails when no service, or more than one, binds the operation.
    pub fn service_for_operation(&self, operation: &ShapeId) -> Result<ShapeId> {
        self.model.expect_shape_of(operation, ShapeType::Operation)?;

        let mut owners = Vec::new();
        for service in self.model.services() {
            let graph = self.get(&service.id)?;
            if graph.contains(operation) {
                owners.push(graph.service_for_operation(operation)?);
            }
        }

        match owners.as_slice() {
            [service] => Ok(service.clone()),
            [] => Err(BindingError::inconsistent(
                operation,
                "not in the reverse closure of any service",
            )),
            many => Err(BindingError::inconsistent(
                operation,
                format!(
                    "reachable from more than one service: {}",
                    many.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }
}

impl std::fmt::Debug for GraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("bundle_hash", &self.model.bundle_hash)
            .field("builds", &self.build_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Arc<Model> {
        let doc = json!({
            "smithy": "2.0",
            "shapes": {
                "ex#Alpha": { "type": "service", "operations": [{ "target": "ex#Ping" }, { "target": "ex#Shared" }] },
                "ex#Beta": { "type": "service", "operations": [{ "target": "ex#Shared" }] },
                "ex#Ping": { "type": "operation" },
                "ex#Shared": { "type": "operation" },
                "ex#Orphan": { "type": "operation" }
            }
        });
        Arc::new(Model::from_json(&doc).unwrap())
    }

    fn id(raw: &str) -> ShapeId {
        ShapeId::parse(raw).unwrap()
    }

    #[test]
    fn test_get_is_memoized() {
        let cache = GraphCache::new(model());
        let first = cache.get(&id("ex#Alpha")).unwrap();
        let second = cache.get(&id("ex#Alpha")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn test_concurrent_requests_build_once() {
        let cache = GraphCache::new(model());
        let graphs: Vec<Arc<ResourceGraph>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get(&id("ex#Alpha")).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(graphs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn test_service_for_operation_across_services() {
        let cache = GraphCache::new(model());
        assert_eq!(cache.service_for_operation(&id("ex#Ping")).unwrap(), id("ex#Alpha"));
        assert!(cache.service_for_operation(&id("ex#Shared")).is_err());
        assert!(cache.service_for_operation(&id("ex#Orphan")).is_err());
    }

    #[test]
    fn test_graph_containing_falls_back_to_scan() {
        let cache = GraphCache::new(model());
        let graph = cache.graph_containing(&id("ex#Ping")).unwrap();
        assert_eq!(graph.service(), &id("ex#Alpha"));
        assert!(cache.graph_containing(&id("ex#Orphan")).is_err());
        // both services were built while searching for the orphan
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn test_non_service_is_rejected() {
        let cache = GraphCache::new(model());
        let err = cache.get(&id("ex#Ping")).unwrap_err();
        assert!(matches!(err, BindingError::InconsistentSchema { .. }));
        assert_eq!(cache.build_count(), 0);
    }
}
