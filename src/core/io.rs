//! Disk I/O for container files
//!
//! Owns the backing file and implements the persistence protocol: the full
//! descriptor table is written before the header, and mutating operations
//! end with a sync.

use crate::core::descriptor::{Descriptor, DESCRIPTOR_SIZE};
use crate::core::error::{IoContext, Result};
use crate::core::header::Header;
use crate::core::table::DescriptorTable;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Disk-backed container storage
#[derive(Debug)]
pub struct ContainerFile {
    file: File,
    path: PathBuf,
}

impl ContainerFile {
    /// Create (or truncate) a container file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .context("container file creation failed")?;

        Ok(ContainerFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Move the write cursor to an absolute offset
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context("setting file offset pointer")?;
        Ok(())
    }

    /// Write the whole descriptor table and record its length in the header
    pub fn write_descriptors(
        &mut self,
        header: &mut Header,
        table: &DescriptorTable,
    ) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(header.descriptor_offset))
            .context("seeking to descriptor start offset")?;
        self.file
            .write_all(&table.to_bytes())
            .context("writing descriptor table")?;
        header.descriptor_len = table.byte_len();

        debug!(
            "Wrote {} descriptors ({} used) at offset {}",
            table.capacity(),
            table.used_count(),
            header.descriptor_offset
        );
        Ok(())
    }

    /// Overwrite a single slot record
    pub fn write_descriptor_at(
        &mut self,
        header: &Header,
        index: usize,
        descr: &Descriptor,
    ) -> Result<()> {
        let offset = header.descriptor_offset + (index * DESCRIPTOR_SIZE) as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .context("seeking to descriptor")?;
        self.file
            .write_all(&descr.to_bytes())
            .context("writing descriptor")?;
        Ok(())
    }

    /// Write the global header at offset 0
    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .context("seeking to beginning of the file")?;
        self.file
            .write_all(&header.to_bytes())
            .context("writing header")?;
        Ok(())
    }

    /// Force written bytes to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().context("syncing container file")?;
        Ok(())
    }

    /// Raw handle for payload writes
    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::HEADER_SIZE;
    use tempfile::NamedTempFile;

    #[test]
    fn test_create_truncates_existing() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), vec![0xffu8; 1000]).unwrap();

        ContainerFile::create(temp.path()).unwrap();
        assert_eq!(std::fs::metadata(temp.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_table_then_header() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = ContainerFile::create(temp.path()).unwrap();

        let mut header = Header::new();
        header.total_descriptors = 2;
        header.free_descriptors = 2;
        header.descriptor_offset = 4096;
        header.data_offset = 32768;
        let table = DescriptorTable::new(2);

        file.write_descriptors(&mut header, &table).unwrap();
        file.write_header(&header).unwrap();
        file.sync().unwrap();

        assert_eq!(header.descriptor_len, 2 * DESCRIPTOR_SIZE as u64);

        let bytes = std::fs::read(temp.path()).unwrap();
        assert_eq!(bytes.len(), 4096 + 2 * DESCRIPTOR_SIZE);
        assert_eq!(Header::from_bytes(&bytes[..HEADER_SIZE]).unwrap(), header);
        let decoded = DescriptorTable::from_bytes(&bytes[4096..], 2).unwrap();
        assert_eq!(decoded.free_count(), 2);
    }

    #[test]
    fn test_write_descriptor_at_slot() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = ContainerFile::create(temp.path()).unwrap();

        let mut header = Header::new();
        header.descriptor_offset = 4096;

        let mut descr = Descriptor::EMPTY;
        descr.used = true;
        descr.id = 2;
        file.write_descriptor_at(&header, 1, &descr).unwrap();

        let bytes = std::fs::read(temp.path()).unwrap();
        let start = 4096 + DESCRIPTOR_SIZE;
        let decoded = Descriptor::from_bytes(&bytes[start..]).unwrap();
        assert_eq!(decoded.id, 2);
        assert!(decoded.used);
    }

    #[test]
    fn test_seek_then_write() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = ContainerFile::create(temp.path()).unwrap();

        file.seek_to(32768).unwrap();
        file.file_mut().write_all(b"payload").unwrap();
        assert_eq!(file.path(), temp.path());

        let bytes = std::fs::read(temp.path()).unwrap();
        assert_eq!(bytes.len(), 32768 + 7);
        assert_eq!(&bytes[32768..], b"payload");
    }

    #[test]
    fn test_create_in_missing_directory() {
        let err = ContainerFile::create("/nonexistent/dir/image.sif").unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::SifError::Io {
                op: "container file creation failed",
                ..
            }
        ));
    }
}
