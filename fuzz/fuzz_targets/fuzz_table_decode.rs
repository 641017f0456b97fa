#![no_main]
use libfuzzer_sys::fuzz_target;
use sif_rs::{DescriptorTable, DESCRIPTOR_SIZE};

fuzz_target!(|data: &[u8]| {
    let capacity = data.len() / DESCRIPTOR_SIZE;
    if capacity == 0 {
        return;
    }

    let table = match DescriptorTable::from_bytes(data, capacity) {
        Ok(t) => t,
        Err(_) => return,
    };

    assert_eq!(table.free_count() + table.used().count(), capacity);
    assert_eq!(table.to_bytes().len(), capacity * DESCRIPTOR_SIZE);
});
