//! # sif-rs - Single-file container images
//!
//! `sif-rs` builds and mutates single-file container images: one global
//! header, a fixed table of object descriptors, and a data region holding
//! the payload of every object at a page-aligned offset.
//!
//! - **Stable offsets**: payloads never move once written
//! - **Bounded metadata**: the descriptor table is sized at creation
//! - **Slot reuse**: deleted descriptors are handed out again, lowest first
//! - **Secure delete**: payloads can be zero-filled on removal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sif_rs::{ContainerBuilder, DataType, DeleteMode, DescriptorInput, Result};
//!
//! # fn main() -> Result<()> {
//! let mut image = ContainerBuilder::new("image.sif")
//!     .object(
//!         DescriptorInput::new(DataType::DEFFILE, "Singularity")
//!             .with_data(b"Bootstrap: docker".to_vec()),
//!     )
//!     .build()?;
//!
//! let id = image.add_object(
//!     DescriptorInput::new(DataType::LABELS, "labels.json").with_data(b"{}".to_vec()),
//! )?;
//! image.delete_object(id, DeleteMode::Zero)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## File Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ 0:      Header (128 bytes)                  │
//! │          - launch line, "SIF_MAGIC"         │
//! │          - free/total descriptor counts     │
//! │          - table and data offsets, lengths  │
//! ├─────────────────────────────────────────────┤
//! │ 4096:   Descriptor table (32 × 585 bytes)   │
//! ├─────────────────────────────────────────────┤
//! │ 32768:  Data region                         │
//! │          - one payload per used descriptor  │
//! │          - each start page-aligned          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Offsets and capacity are the [`Layout`] defaults and can be changed per
//! container.

pub mod core;

pub use crate::core::{
    align::{host_page_size, next_aligned},
    config::Layout,
    container::{Container, CreateInfo, DeleteMode, DEL_COMPACT, DEL_ZERO},
    descriptor::{
        DataType, Descriptor, DescriptorInput, DESCRIPTOR_SIZE, DESCR_DEFAULT_GROUP,
        DESCR_UNUSED_GROUP, DESCR_UNUSED_LINK,
    },
    error::{Result, SifError},
    header::{Arch, Header, HEADER_SIZE},
    owner::Owner,
    table::DescriptorTable,
};

use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Builder for creating container files
///
/// # Examples
///
/// ```rust,no_run
/// use sif_rs::{ContainerBuilder, DataType, DescriptorInput, Layout, Owner};
///
/// # fn main() -> sif_rs::Result<()> {
/// let image = ContainerBuilder::new("/tmp/app.sif")
///     .layout(Layout::load("layout.toml")?)
///     .owner(Owner::new(1000, 1000))
///     .object(DescriptorInput::new(DataType::GENERIC, "payload.bin").with_data(vec![0u8; 64]))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ContainerBuilder {
    info: CreateInfo,
}

impl ContainerBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ContainerBuilder {
            info: CreateInfo::new(path),
        }
    }

    /// Set the launch line written at the start of the file
    pub fn launch<S: Into<String>>(mut self, launch: S) -> Self {
        self.info.launch = launch.into();
        self
    }

    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        self.info.version = version.into();
        self
    }

    pub fn arch(mut self, arch: Arch) -> Self {
        self.info.arch = arch;
        self
    }

    /// Use a fixed container id instead of a random one
    pub fn id(mut self, id: Uuid) -> Self {
        self.info.id = id;
        self
    }

    pub fn owner(mut self, owner: Owner) -> Self {
        self.info.owner = owner;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.info.layout = layout;
        self
    }

    /// Append an object; objects are laid out in the order added
    pub fn object(mut self, input: DescriptorInput) -> Self {
        self.info.inputs.push(input);
        self
    }

    /// Create the file and return the open container
    pub fn build(self) -> Result<Container> {
        debug!(
            "Building container at {:?} ({} objects)",
            self.info.path,
            self.info.inputs.len()
        );
        Container::create(self.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_applies_settings() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::from_bytes([7u8; 16]);

        let image = ContainerBuilder::new(dir.path().join("b.sif"))
            .launch("#!/bin/true\n")
            .version("02")
            .arch(Arch::S390x)
            .id(id)
            .owner(Owner::new(42, 43))
            .layout(Layout {
                descriptor_capacity: 4,
                ..Layout::default()
            })
            .object(DescriptorInput::new(DataType::GENERIC, "x").with_data(vec![1u8; 3]))
            .build()
            .unwrap();

        let header = image.header();
        assert_eq!(&header.launch[..12], b"#!/bin/true\n");
        assert_eq!(&header.version[..2], b"02");
        assert_eq!(header.arch(), Arch::S390x);
        assert_eq!(header.id, [7u8; 16]);
        assert_eq!(header.total_descriptors, 4);
        assert_eq!(image.get_by_id(1).unwrap().uid, 42);
        assert_eq!(image.owner(), Owner::new(42, 43));
    }

    #[test]
    fn test_builder_without_objects() {
        let dir = TempDir::new().unwrap();
        let err = ContainerBuilder::new(dir.path().join("e.sif"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SifError::EmptyInputSet));
    }
}
