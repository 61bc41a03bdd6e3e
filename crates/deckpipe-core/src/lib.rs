pub mod action;
pub mod config;
pub mod dependency;
pub mod error;
pub mod io;
pub mod patch;
pub mod paths;
pub mod profile;
pub mod reify;
pub mod resolver;
pub mod saga;
pub mod selection;
pub mod service;
pub mod store;
pub mod teardown_db;
pub mod template;
pub mod types;

pub use error::{DeckError, Result};
