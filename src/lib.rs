//! Recipe Service
//!
//! Minimal recipe-management HTTP service. Clients list, create, and delete
//! recipe records; a record may carry one uploaded image served back from the
//! local filesystem.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API                    PostgreSQL              Filesystem
//! ┌──────────────────┐       ┌──────────────┐        ┌──────────────┐
//! │ GET    /recipes  │──────▶│ recipes      │        │ uploads/     │
//! │ POST   /recipes  │       └──────────────┘        │   {ts}-{name}│
//! │ DELETE /recipes  │                ▲              └──────────────┘
//! │ GET    /uploads  │────────────────┘                     ▲
//! └──────────────────┘                                      │
//!        │                                                  │
//!        └──────────────────────────────────────────────────┘
//! ```
//!
//! The store and upload handler are constructed once at startup and shared
//! with the router through [`api::AppState`]; there is no global state.

pub mod api;
pub mod config;
pub mod store;
pub mod uploads;

pub use api::AppState;
pub use config::Config;
pub use store::{Recipe, RecipeStore};
pub use uploads::UploadStore;
