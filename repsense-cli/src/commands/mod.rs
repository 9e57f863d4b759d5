//! CLI subcommands.

pub mod common;
pub mod init;
pub mod profiles;
pub mod replay;
