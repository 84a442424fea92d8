//! # ModKit - Module System
//!
//! A small crate for building modular HTTP applications.
//!
//! ## Features
//!
//! - **Explicit registration**: each module crate exposes a `register` function
//!   that feeds a [`registry::RegistryBuilder`]
//! - **Dependency ordering**: modules are topo-sorted by their declared deps
//! - **Phase-based lifecycle**: init → REST → start → stop
//! - **Typed API operations**: routes and their OpenAPI metadata are declared together
//! - **Validated input**: extractors that turn bad input into RFC 9457 problems
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut builder = modkit::registry::RegistryBuilder::default();
//! api_ingress::register(&mut builder);
//! people::register(&mut builder);
//! let registry = builder.build_topo_sorted()?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Module system exports
pub use crate::contracts::*;
pub mod context;
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};

pub mod registry;
pub use registry::{ModuleRegistry, RegistryBuilder, RegistryError};

// Core module contracts and traits
pub mod contracts;

// Type-safe API operation builder, problems and validation
pub mod api;
pub use api::problem::{
    internal_error, not_found, unprocessable, Problem, ProblemResponse, ValidationError,
};
pub use api::validation::{ValidJson, ValidPath, ValidQuery};
pub use api::{OpenApiRegistry, OperationBuilder};

pub mod runtime;
pub use runtime::{run, RunOptions, ShutdownOptions};
