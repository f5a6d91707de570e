pub use housekeep_cli::cli;
pub use housekeep_cli::commands;
pub use housekeep_cli::config;
pub use housekeep_cli::init_tracing;
pub use housekeep_cli::AppConfig;

pub use housekeep_core as core;
pub use housekeep_core::capture;
pub use housekeep_core::database as db;
pub use housekeep_core::model;
pub use housekeep_core::parser;
pub use housekeep_core::view;

pub use housekeep_mcp as mcp;
