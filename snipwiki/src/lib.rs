//! Library side of the `snipwiki` binary: configuration, the filesystem
//! provider and the page pipeline. Exposed so the integration tests and the
//! xtask runner can use it.
pub mod cli;
pub mod config;
pub mod error;
pub mod provider;
pub mod site;
