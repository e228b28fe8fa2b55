//! Library half of the `coa` binary: argument definitions, commands,
//! logging setup and table rendering.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod summary;
