//! Client transport: wire protocol, per-client outbound handle and socket tasks

pub mod connection;
pub mod handler;
pub mod protocol;
