pub mod admin;
pub mod agents;
pub mod auth;
pub mod collaboration;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod memory;
pub mod paths;
pub mod pipeline;
pub mod quick_action;
pub mod responder;
pub mod router;
pub mod special;
pub mod store;
pub mod transcribe;
pub mod types;
pub mod usage;
pub mod webhook;
pub mod whatsapp;

pub use error::{CockpitError, Result};
pub use pipeline::Pipeline;
