// SPDX-License-Identifier: MIT OR Apache-2.0
//! Media loading node.
//!
//! The node never waits for I/O. It asks the [`AssetTracker`] for its
//! handle every tick and reports `loading` until the host has collected the
//! finished load with [`AssetTracker::update`].

use patchflow_graph::{
    Control, MediaHandle, NodeCatalog, NodeCategory, NodeDefinition, Port, PortType, Value,
};
use patchflow_runtime::{
    AssetStatus, AssetTracker, ExecutionContext, ExecutionError, ExecutorRegistry, NodeExecutor,
    Outputs,
};
use std::sync::Arc;

/// Register the media package
pub fn register(
    catalog: &mut NodeCatalog,
    executors: &mut ExecutorRegistry,
    tracker: Arc<AssetTracker>,
) {
    catalog.register(NodeDefinition {
        id: "media.load".to_string(),
        name: "Load Media".to_string(),
        category: NodeCategory::Media,
        description: "Resolve an asset id or URL to a media handle".to_string(),
        inputs: vec![Port::input("source", PortType::Any)],
        outputs: vec![
            Port::output("media", PortType::Media),
            Port::output("ready", PortType::Bool),
            Port::output("loading", PortType::Bool),
            Port::output("_error", PortType::String),
        ],
        controls: vec![Control::new("source", "")],
    });
    executors.register("media.load", LoadMedia { tracker });
}

/// Executor for `media.load`
pub struct LoadMedia {
    tracker: Arc<AssetTracker>,
}

impl LoadMedia {
    /// Create an executor backed by `tracker`
    pub fn new(tracker: Arc<AssetTracker>) -> Self {
        Self { tracker }
    }
}

impl NodeExecutor for LoadMedia {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
        let handle = match ctx.input_or_control("source") {
            Some(Value::Media(handle)) => handle.clone(),
            Some(other) => MediaHandle::new(other.to_text()),
            None => MediaHandle::new(""),
        };
        if handle.as_str().is_empty() {
            return Ok(Outputs::new().with("ready", false).with("loading", false));
        }

        Ok(match self.tracker.request(&handle) {
            AssetStatus::Loading => Outputs::new().with("ready", false).with("loading", true),
            AssetStatus::Ready(resource) => Outputs::new()
                .with("media", resource.handle.clone())
                .with("ready", true)
                .with("loading", false),
            AssetStatus::Failed(err) => Outputs::new()
                .with("ready", false)
                .with("loading", false)
                .with_soft_error(err.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use patchflow_graph::Graph;
    use patchflow_runtime::{
        AssetError, AssetFuture, AssetSource, Engine, EngineConfig, MediaResource, UrlRegistry,
    };
    use tokio::runtime::Handle;

    /// Serves any handle starting with `ok`
    struct PrefixSource;

    impl AssetSource for PrefixSource {
        fn load(&self, handle: MediaHandle, urls: UrlRegistry) -> AssetFuture {
            async move {
                if !handle.as_str().starts_with("ok") {
                    return Err(AssetError::NotFound(handle.to_string()));
                }
                let url = urls.create(&handle);
                Ok(MediaResource::new(handle, vec![0; 4]).with_url(url))
            }
            .boxed()
        }
    }

    fn engine_with(tracker: &Arc<AssetTracker>, source: &str) -> (Engine, patchflow_graph::NodeId) {
        let (catalog, executors) = crate::full_library(Arc::clone(tracker));
        let mut graph = Graph::new("media");
        let node = catalog.create_node("media.load").unwrap().with_control("source", source);
        let id = graph.add_node(node).unwrap();
        (Engine::new(graph, executors, EngineConfig::default()).unwrap(), id)
    }

    async fn tick_until_settled(
        engine: &mut Engine,
        tracker: &AssetTracker,
        id: patchflow_graph::NodeId,
    ) {
        for _ in 0..100 {
            tracker.update();
            engine.tick().unwrap();
            if engine.output(id, "loading") != Some(&Value::Bool(true)) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_polls_loading_then_ready() {
        let tracker = Arc::new(AssetTracker::new(Handle::current(), Arc::new(PrefixSource)));
        let (mut engine, id) = engine_with(&tracker, "ok-logo");

        engine.tick().unwrap();
        assert_eq!(engine.output(id, "loading"), Some(&Value::Bool(true)));
        assert_eq!(engine.output(id, "ready"), Some(&Value::Bool(false)));
        assert_eq!(engine.output(id, "media"), None);

        tick_until_settled(&mut engine, &tracker, id).await;
        assert_eq!(engine.output(id, "ready"), Some(&Value::Bool(true)));
        assert_eq!(engine.output(id, "media"), Some(&Value::Media(MediaHandle::new("ok-logo"))));
        assert!(engine.node_error(id).is_none());
    }

    #[tokio::test]
    async fn test_failed_load_is_soft_error() {
        let tracker = Arc::new(AssetTracker::new(Handle::current(), Arc::new(PrefixSource)));
        let (mut engine, id) = engine_with(&tracker, "missing.png");

        tick_until_settled(&mut engine, &tracker, id).await;
        assert_eq!(engine.output(id, "ready"), Some(&Value::Bool(false)));
        assert!(engine.node_error(id).is_some());
    }

    #[test]
    fn test_empty_source_is_idle() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let tracker = Arc::new(AssetTracker::new(runtime.handle().clone(), Arc::new(PrefixSource)));
        let outputs = patchflow_runtime::ContextBuilder::new("media.load")
            .run(&LoadMedia::new(Arc::clone(&tracker)))
            .unwrap();
        assert_eq!(outputs.get("loading"), Some(&Value::Bool(false)));
        assert!(tracker.is_empty());
    }
}
