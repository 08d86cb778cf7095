pub mod config;
pub mod error;
pub mod ident;
pub mod storage;
pub mod server;
