//! Client-side synchronization layer for the business console API.
//!
//! Each remote collection gets a [`store::Slice`] holding its last fetched page.
//! [`service::EntityService`] turns intents into HTTP calls through a
//! [`http::Transport`], and the controllers in [`controller`] drive it from view
//! state.
pub mod config;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod http;
pub mod model;
pub mod notify;
pub mod pagination;
pub mod schema;
pub mod service;
pub mod store;

pub use error::{Result, SyncError};
