//! Library crate for nmos-port-explorer: discovery of NMOS HTTP APIs on a host.
pub mod config;
pub mod error;
pub mod explorer;
pub mod logging;
pub mod nmos;
pub mod ports;
pub mod probability;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod server;
pub mod target;
pub mod types;
