//! HTTP API building blocks shared by every REST module.

pub mod operation_builder;
pub mod problem;
pub mod validation;

pub use operation_builder::{
    ensure_schema, state, Missing, OpenApiRegistry, OperationBuilder, OperationSpec,
    ParamLocation, ParamSpec, Present, RequestBodySpec, ResponseSpec, SchemaCollection,
};
