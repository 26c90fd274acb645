pub mod client;
pub mod connection;
pub mod listener;
pub mod runtime;
pub mod server;
pub mod tls;
