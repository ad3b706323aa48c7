pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod growth;
pub mod monitor;
pub mod notify;
pub mod predict;
pub mod prune;
pub mod report;
pub mod store;
pub mod util;
