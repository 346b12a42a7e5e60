pub mod cli;
pub mod config;
pub mod errors;
pub mod git;
pub mod store;
pub mod sync;
pub mod utils;

pub use errors::VaultError;
