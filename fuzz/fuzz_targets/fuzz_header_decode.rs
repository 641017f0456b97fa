#![no_main]
use libfuzzer_sys::fuzz_target;
use sif_rs::Header;

// Decoding arbitrary bytes must never panic, and anything that decodes
// must encode back to the same prefix.
fuzz_target!(|data: &[u8]| {
    if let Ok(header) = Header::from_bytes(data) {
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..], &data[..bytes.len()]);
    }
});
