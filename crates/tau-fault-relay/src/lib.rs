//! Authenticated HTTP relay that forwards error text from front-end clients
//! to the operator roster as a report file.

pub mod relay_cli;
pub mod relay_server;

pub use relay_cli::*;
pub use relay_server::*;
