//! IIS provisioning engine.
//!
//! Creates and removes sites, application pools, virtual directories and
//! applications with one operation set over two configuration substrates:
//! the IIS 6 metabase and the IIS 7/8 applicationHost document.
//!
//! The public API is organised into four layers:
//!
//! - **[`store`]**: configuration documents and their load/commit stores
//! - **[`backends`]**: the [`Backend`](backends::Backend) trait and its two
//!   implementations
//! - **[`commands`]**: parameter validation and dispatch of a parsed verb
//! - **[`cli`]**: the `/key:value` command-line surface
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backends;
pub mod binding;
pub mod certificate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod platform;
pub mod store;
