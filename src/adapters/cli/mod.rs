//! CLI Adapter
//!
//! Command-line interface for the graduator.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    CliApp, Command, CreateLookupTableCmd, MigrateCmd, PoolStatusCmd, RegisterCmd, ServeCmd,
};
