//! # ModKit - Module System
//!
//! Building blocks for composing the server out of independent modules.
//!
//! ## Features
//!
//! - **Explicit registration**: each module crate exposes a registrator that
//!   feeds a [`registry::RegistryBuilder`]
//! - **Capabilities**: a module opts into `db`, `rest`, `rest_host` and `stateful` roles
//! - **Phase-based lifecycle**: init → DB → REST → start → stop
//!
//! ## Example
//!
//! ```rust,ignore
//! use modkit::registry::RegistryBuilder;
//!
//! pub fn register(b: &mut RegistryBuilder) {
//!     let m = std::sync::Arc::new(MyModule::default());
//!     b.register_core("my_module", m.clone());
//!     b.register_rest("my_module", m);
//! }
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Module system exports
pub use crate::contracts::*;
pub mod context;
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};

pub mod registry;
pub use registry::{ModuleRegistry, Phase, Registrator, RegistryBuilder, RegistryError};

// Core module contracts and traits
pub mod contracts;

// Problem details and the OpenAPI registry seam
pub mod api;
pub use api::problem::{Problem, ProblemResponse, ValidationError};
pub use api::OpenApiRegistry;

pub mod lifecycle;
pub mod runtime;

pub use lifecycle::{ReadySignal, Runnable, Status, WithLifecycle};
pub use runtime::{run, DbOptions, RunOptions, ShutdownOptions};
