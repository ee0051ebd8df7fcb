//! APIKit Scaffolder Core Library
//!
//! This library reconciles API specifications with existing Mule application
//! configuration and plans the APIKit flows, listener configs and router
//! configs that are still missing.

pub mod collect;
pub mod config;
pub mod diff;
pub mod error;
pub mod locator;
pub mod model;
pub mod naming;
pub mod openapi;
pub mod registry;
pub mod render;
pub mod scaffold;
pub mod spec;
pub mod xml;

pub use crate::{
    config::ScaffolderConfig,
    error::{Error, Result, ScaffoldError},
    naming::{FlowName, HttpMethod},
    openapi::OpenApiContext,
    registry::ApiRegistry,
    render::PlanRenderer,
    scaffold::{ScaffoldPlan, Scaffolder},
    spec::ApiSpecification,
    xml::ConfigDocument,
};
