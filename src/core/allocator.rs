//! Descriptor allocation
//!
//! Picks the lowest free slot and fills in a descriptor for the object about
//! to be written. Nothing here touches the file.

use crate::core::align::next_aligned;
use crate::core::codec::fill_fixed;
use crate::core::descriptor::{Descriptor, DescriptorInput, DESCR_EXTRA_LEN, DESCR_NAME_LEN};
use crate::core::error::{Result, SifError};
use crate::core::owner::Owner;
use crate::core::table::DescriptorTable;
use std::path::Path;
use tracing::{debug, warn};

/// Where and for whom the next object is placed
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// File position before any alignment padding
    pub cursor: u64,
    pub alignment: u64,
    pub owner: Owner,
    /// Unix seconds stamped into both descriptor timestamps
    pub now: i64,
}

/// A filled descriptor bound to a free slot, not yet committed to the table
#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub index: usize,
    pub descriptor: Descriptor,
}

/// Reserve the lowest free slot for `input`
///
/// Fails with `NoFreeSlot` without modifying anything when the table is full.
/// The table only changes once the caller commits the allocation after the
/// payload has been written.
pub fn allocate(
    table: &DescriptorTable,
    input: &DescriptorInput,
    placement: Placement,
) -> Result<Allocation> {
    let index = table.first_free().ok_or(SifError::NoFreeSlot)?;

    let file_offset = next_aligned(placement.cursor, placement.alignment);
    let payload_len = input.size();

    let base = base_name(&input.name);
    let (name, name_truncated) = fill_fixed::<DESCR_NAME_LEN>(base.as_bytes());
    if name_truncated {
        warn!("Descriptor name '{}' truncated to {} bytes", base, name.len());
    }

    let (extra, extra_truncated) = fill_fixed::<DESCR_EXTRA_LEN>(&input.extra);
    if extra_truncated {
        warn!(
            "Extra metadata for '{}' truncated from {} to {} bytes",
            base,
            input.extra.len(),
            extra.len()
        );
    }

    let descriptor = Descriptor {
        data_type: input.data_type,
        used: true,
        id: index as u32 + 1,
        group_id: input.group_id,
        link: input.link,
        file_offset,
        payload_len,
        stored_len: file_offset + payload_len - placement.cursor,
        created_at: placement.now,
        modified_at: placement.now,
        uid: placement.owner.uid,
        gid: placement.owner.gid,
        name,
        extra,
    };

    debug!(
        "Allocated slot {} (id {}) for '{}': offset {}, {} bytes",
        index, descriptor.id, base, file_offset, payload_len
    );

    Ok(Allocation { index, descriptor })
}

/// Last component of `name`; `"."` when there is none
fn base_name(name: &str) -> String {
    Path::new(name)
        .components()
        .next_back()
        .map_or_else(
            || ".".to_string(),
            |c| c.as_os_str().to_string_lossy().into_owned(),
        )
}
