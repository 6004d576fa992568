//! IPC module for client-daemon communication

mod protocol;
mod server;

pub use server::{Server, ServerContext};
