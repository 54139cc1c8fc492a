pub mod application;
pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod layout;
pub mod livecheck;
pub mod manifest;
pub mod resolver;
pub mod runtime;
pub mod state;
pub mod store;

pub use error::{CaskError, CaskResult};
