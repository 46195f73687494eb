//! HVACDesk - multi-tenant contractor backend with the Atlas sales pipeline
//!
//! This library provides the storage, pipeline, provisioning and HTTP API
//! components used by the `hvacdesk` server binary.

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod gate;
pub mod import;
pub mod pipeline;
pub mod provisioning;
pub mod slug;
pub mod store;
