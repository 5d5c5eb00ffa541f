//! rules-api - category index synchronization for a rules content repository
//!
//! Rules declare the categories they belong to, and every category document
//! keeps an index of its rules. When an editor creates or updates a rule,
//! this service adds the rule to newly selected categories and removes it
//! from deselected ones, writing through the CMS GraphQL API.
//!
//! ## Services
//!
//! - **Update category**: `POST /api/update-category`
//! - **Category listing**: `GET /api/categories`, cached per branch
//! - **Health**: `/health` and `/version`

pub mod auth;
pub mod cache;
pub mod cms;
pub mod config;
pub mod content;
pub mod index;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, RulesError};
