//! On-disk layout configuration
//!
//! A [`Layout`] fixes where the descriptor table and the data region start,
//! how many descriptor slots exist and the payload alignment. It is chosen
//! once at creation and never changes for the life of a container.
//!
//! Layouts can be loaded from TOML; missing keys take their defaults:
//!
//! ```toml
//! descriptor_capacity = 48
//! alignment = 4096
//! ```

use crate::core::align::host_page_size;
use crate::core::descriptor::DESCRIPTOR_SIZE;
use crate::core::error::{IoContext, Result, SifError};
use crate::core::header::HEADER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of descriptor slots
pub const DESCR_NUM_ENTRIES: usize = 32;
/// Where descriptors start after the global header
pub const DESCR_START_OFFSET: u64 = 4096;
/// Where data objects start after the descriptors
pub const DATA_START_OFFSET: u64 = 32768;
/// Chunk size used when zero-filling deleted objects
pub const ZERO_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Number of descriptor slots
    pub descriptor_capacity: usize,

    /// Byte offset of the descriptor table
    pub descriptor_offset: u64,

    /// Byte offset of the data region
    pub data_offset: u64,

    /// Payload alignment, a power of two
    pub alignment: u64,

    pub zero_chunk_size: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            descriptor_capacity: DESCR_NUM_ENTRIES,
            descriptor_offset: DESCR_START_OFFSET,
            data_offset: DATA_START_OFFSET,
            alignment: host_page_size(),
            zero_chunk_size: ZERO_CHUNK_SIZE,
        }
    }
}

impl Layout {
    /// End of the descriptor table
    pub fn table_end(&self) -> Result<u64> {
        (self.descriptor_capacity as u64)
            .checked_mul(DESCRIPTOR_SIZE as u64)
            .and_then(|len| len.checked_add(self.descriptor_offset))
            .ok_or_else(|| {
                SifError::InvalidLayout(format!(
                    "descriptor table of {} slots at offset {} overflows",
                    self.descriptor_capacity, self.descriptor_offset
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.descriptor_capacity == 0 {
            return Err(SifError::InvalidLayout(
                "descriptor capacity must be at least 1".into(),
            ));
        }

        if self.descriptor_offset < HEADER_SIZE as u64 {
            return Err(SifError::InvalidLayout(format!(
                "descriptor offset {} overlaps the {}-byte header",
                self.descriptor_offset, HEADER_SIZE
            )));
        }

        let table_end = self.table_end()?;
        if table_end > self.data_offset {
            return Err(SifError::InvalidLayout(format!(
                "descriptor table ends at {} past data offset {}",
                table_end, self.data_offset
            )));
        }

        if !self.alignment.is_power_of_two() {
            return Err(SifError::InvalidLayout(format!(
                "alignment {} is not a power of two",
                self.alignment
            )));
        }

        if self.data_offset.checked_add(self.alignment).is_none() {
            return Err(SifError::InvalidLayout(format!(
                "data offset {} leaves no room for aligned objects",
                self.data_offset
            )));
        }

        if self.zero_chunk_size == 0 {
            return Err(SifError::InvalidLayout(
                "zero chunk size must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a layout from TOML
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let layout: Layout = toml::from_str(s)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load and validate a layout from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path).context("reading layout file")?;
        Self::from_toml_str(&text)
    }
}
