//! Shared clap argument groups and logging setup for the workspace binaries.

pub mod common;

pub use common::{init_tracing, DataDirArgs, ServeArgs, SetupArgs};
