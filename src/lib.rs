//! Dashboard over closed-loop glucose-control simulation results.
//!
//! `data` decodes a stored results container, `analysis` turns the glucose
//! series into control-quality metrics, and `server` exposes both over HTTP.

pub mod analysis;
pub mod config;
pub mod data;
pub mod logging;
pub mod series;
pub mod server;
