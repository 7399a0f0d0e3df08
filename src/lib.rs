//! Library crate for q3scan-rs: a concurrent Quake III server and QWFWD proxy port scanner.
pub mod dispatcher;
pub mod error;
pub mod ports;
pub mod probe;
pub mod reporter;
pub mod scanner;
pub mod transport;
pub mod types;
