//! Container engine: binary records, allocation, payload I/O and lifecycle

pub mod align;
pub mod allocator;
pub(crate) mod codec;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod header;
pub mod io;
pub mod owner;
pub mod table;
pub mod writer;

pub use container::{Container, CreateInfo, DeleteMode};
