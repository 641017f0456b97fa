//! Payload writing and zero-fill

use crate::core::descriptor::{DescriptorInput, PayloadSource};
use crate::core::error::{IoContext, Result, SifError};
use std::io::{Seek, SeekFrom, Write};

/// Copy the payload of `input` to the current position of `out`
///
/// A buffer is written verbatim. A stream is copied until exhausted and must
/// yield exactly the declared size. Returns the number of bytes written.
pub fn write_payload<W: Write>(out: &mut W, input: &mut DescriptorInput) -> Result<u64> {
    let expected = input.size();
    match input.source() {
        PayloadSource::Buffer(data) => {
            out.write_all(data)
                .context("copying data object data to container file")?;
            Ok(data.len() as u64)
        }
        PayloadSource::Stream(reader) => {
            let written = std::io::copy(reader, out)
                .context("copying data object file to container file")?;
            if written != expected {
                return Err(SifError::ShortWrite { expected, written });
            }
            Ok(written)
        }
    }
}

/// Overwrite `len` bytes at `offset` with zeros, `chunk` bytes at a time
pub fn zero_fill<W: Write + Seek>(out: &mut W, offset: u64, len: u64, chunk: usize) -> Result<()> {
    out.seek(SeekFrom::Start(offset))
        .context("seeking to data object offset")?;

    let zeros = vec![0u8; chunk];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(chunk as u64) as usize;
        out.write_all(&zeros[..n])
            .context("writing zeros to data object")?;
        remaining -= n as u64;
    }

    Ok(())
}
