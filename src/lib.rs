//! gluetun-gost - container entrypoint glue between a gost tunnel and a
//! gluetun VPN gateway.
//!
//! This library provides the core functionality, including:
//! - Literal `${NAME}` / `$NAME` substitution from an explicit variable list
//! - Route templates applied line by line as subprocesses
//! - A write trigger that re-applies routes whenever the tunnel client speaks
//! - Discovery of the tunnel interface address
//!
//! # Example
//!
//! ```no_run
//! use gluetun_gost::env::Substitutions;
//! use gluetun_gost::routes::{RouteOptions, SystemRunner, apply_routes};
//!
//! let subs = Substitutions::from_env(&["GOST_NET", "GOST_SERVER"]).unwrap();
//! let options = RouteOptions { debug: true, execute: false };
//!
//! apply_routes("ip route add ${GOST_NET} via ${GOST_SERVER}", &subs, options, &SystemRunner)
//! 	.unwrap();
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod env;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod trigger;

pub use error::{GluetunGostError, Result};
