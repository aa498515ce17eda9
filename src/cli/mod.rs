//! # CLI Module
//!
//! Command-line entry point of the `brrtmvc` demo binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! ```bash
//! brrtmvc serve --config config/app.yaml --addr 127.0.0.1:8080 --templates templates
//! ```
//!
//! Starts the demo service: `Home/index` (page), `Home/status` (payload),
//! `POST Home/echo` (structured body) and `Admin/index` (admin role), plus
//! `/health` and `/metrics`.
//!
//! ### `routes`
//!
//! Prints the routing table with access policy and response shape.

mod commands;


pub use commands::{demo_dispatcher, demo_routes, run_cli, Cli, Commands};
