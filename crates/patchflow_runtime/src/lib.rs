// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow execution engine for Patchflow.
//!
//! One [`Engine`] owns a graph, an explicit [`ExecutorRegistry`] and its own
//! [`MessageBus`]. Each call to [`Engine::tick`] is one evaluation pass:
//!
//! 1. Queued edits are applied (the only point the graph changes)
//! 2. The evaluation order is computed, or reused while the graph is unchanged
//! 3. Every node gets an [`ExecutionContext`] and its executor is invoked
//! 4. Outputs land in the value cache, failures are attached to the node
//!
//! Nothing here spawns threads. Asynchronous work (asset loads) lives in
//! [`assets`] and is polled between ticks.

pub mod bus;
pub mod executor;
pub mod context;
pub mod config;
pub mod error;
pub mod engine;
pub mod assets;

pub use bus::{ChannelInfo, MessageBus, Subscription};
pub use executor::{ExecutionError, ExecutorRegistry, NodeExecutor, Outputs, SOFT_ERROR_PORT};
pub use context::{ContextBuilder, ExecutionContext, Inputs};
pub use config::{ConfigError, CyclePolicy, EngineConfig, EvaluationScope};
pub use error::{EngineError, NodeError, NodeErrorKind};
pub use engine::{Engine, RejectedEdit, TickReport};
pub use assets::{
    AssetError, AssetFuture, AssetSource, AssetStatus, AssetTracker, MediaResource, ScopedUrl,
    UrlRegistry,
};
