//! # Inkpress
//!
//! A Markdown blog backend: syncs GitBook-style post folders from a content
//! repository into SQLite and serves them over a JSON API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────┐
//! │ Post folders │──▶│ Normalization │──▶│  SQLite  │
//! │ README/SUMMARY│  │ slug/excerpt  │   │ blogs +  │
//! └──────────────┘   │ front-matter  │   │ pages    │
//!                    └───────────────┘   └────┬─────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                    ┌──────────┐       ┌──────────┐
//!                    │   CLI    │       │   HTTP   │
//!                    │(inkpress)│       │  (axum)  │
//!                    └──────────┘       └──────────┘
//! ```
//!
//! Content is stored with its original relative asset paths; the HTTP layer
//! rewrites them to absolute GitHub raw URLs on every read.
//!
//! ## Quick start
//!
//! ```bash
//! inkpress init                 # create database
//! inkpress sync                 # ingest post folders
//! inkpress serve                # start the JSON API
//! inkpress seed --count 20 --out seed.sql
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`markdown`] | Front-matter parsing and metadata normalization |
//! | [`rewrite`] | Read-time asset URL rewriting |
//! | [`store`] | `BlogStore` trait and SQLite implementation |
//! | [`sync`] | Folder sync pipeline |
//! | [`server`] | JSON HTTP API |
//! | [`seed`] | Seed-data SQL generator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod markdown;
pub mod migrate;
pub mod models;
pub mod rewrite;
pub mod seed;
pub mod server;
pub mod store;
pub mod sync;
