//! Command-line interface components
//!
//! This module contains CLI-specific code for the AURN Fetcher application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, PeriodArgs, RangeArgs, RunArgs,
    StationsArgs,
};
pub use commands::{handle_config, handle_range, handle_run, handle_stations};
