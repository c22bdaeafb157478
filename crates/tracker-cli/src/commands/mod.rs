//! Command implementations for the CLI.

mod export;
mod ingest;
mod init;

pub use export::cmd_export;
pub use ingest::cmd_ingest;
pub use init::cmd_init;
