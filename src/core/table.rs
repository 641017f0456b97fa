//! Fixed-capacity descriptor table
//!
//! The table owns the set of free slot indices. The header's free count is
//! copied from it, never maintained on its own, so the two cannot drift
//! apart inside a live handle.

use crate::core::descriptor::{Descriptor, DESCRIPTOR_SIZE};
use crate::core::error::{Result, SifError};
use crate::core::header::Header;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct DescriptorTable {
    slots: Vec<Descriptor>,

    /// Indices of slots with `used == false`
    free: BTreeSet<usize>,
}

impl DescriptorTable {
    /// Create a table of `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        DescriptorTable {
            slots: vec![Descriptor::EMPTY; capacity],
            free: (0..capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn used_count(&self) -> usize {
        self.capacity() - self.free_count()
    }

    /// Encoded size of the whole table
    pub fn byte_len(&self) -> u64 {
        (self.capacity() * DESCRIPTOR_SIZE) as u64
    }

    /// Lowest free slot index, without claiming it
    pub fn first_free(&self) -> Option<usize> {
        self.free.iter().next().copied()
    }

    /// Store a used descriptor into a free slot
    pub(crate) fn occupy(&mut self, index: usize, descr: Descriptor) {
        debug_assert!(descr.used);
        self.free.remove(&index);
        self.slots[index] = descr;
    }

    /// Reset a slot to the empty record and return what it held
    pub(crate) fn release(&mut self, index: usize) -> Descriptor {
        let old = std::mem::replace(&mut self.slots[index], Descriptor::EMPTY);
        self.free.insert(index);
        old
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.slots.get(index)
    }

    /// Slot index and record of the used descriptor carrying `id`
    pub fn find(&self, id: u32) -> Result<(usize, &Descriptor)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, d)| d.used && d.id == id)
            .ok_or(SifError::UnknownId(id))
    }

    /// Used descriptors in table order
    pub fn used(&self) -> impl Iterator<Item = &Descriptor> {
        self.slots.iter().filter(|d| d.used)
    }

    /// Sum of the stored lengths of all used descriptors
    pub fn stored_len(&self) -> u64 {
        self.used().map(|d| d.stored_len).sum()
    }

    /// Compare the header's free count with the table's free slots
    ///
    /// A crash between the table flush and the header flush leaves the
    /// two disagreeing; this is how a reader detects it.
    pub fn check_against(&self, header: &Header) -> Result<()> {
        let table_free = self.free_count() as u64;
        if header.free_descriptors != table_free {
            return Err(SifError::TableDesync {
                header_free: header.free_descriptors,
                table_free,
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len() as usize);
        for descr in &self.slots {
            bytes.extend_from_slice(&descr.to_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<Self> {
        let needed = capacity * DESCRIPTOR_SIZE;
        if bytes.len() < needed {
            return Err(SifError::Truncated {
                what: "descriptor table",
                needed,
                got: bytes.len(),
            });
        }

        let slots = bytes[..needed]
            .chunks_exact(DESCRIPTOR_SIZE)
            .map(Descriptor::from_bytes)
            .collect::<Result<Vec<_>>>()?;
        let free = slots
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.used)
            .map(|(i, _)| i)
            .collect();

        Ok(DescriptorTable { slots, free })
    }
}
