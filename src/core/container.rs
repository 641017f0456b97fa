//! Container lifecycle: create, add and delete
//!
//! A [`Container`] owns the open backing file together with in-memory
//! mirrors of the header and the descriptor table. Every mutation ends by
//! writing the mirrors back through the persistence protocol in
//! [`crate::core::io`], so the file and the handle agree whenever a call
//! returns `Ok`.
//!
//! Failures are not rolled back. A failed [`Container::create`] leaves a
//! partial file behind; removing it is up to the caller.

use crate::core::allocator::{allocate, Allocation, Placement};
use crate::core::codec::fill_fixed;
use crate::core::config::Layout;
use crate::core::descriptor::{DataType, Descriptor, DescriptorInput};
use crate::core::error::{Result, SifError};
use crate::core::header::{Arch, Header, HDR_LAUNCH, HDR_VERSION};
use crate::core::io::ContainerFile;
use crate::core::owner::Owner;
use crate::core::table::DescriptorTable;
use crate::core::writer::{write_payload, zero_fill};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Raw flag value selecting [`DeleteMode::Zero`]
pub const DEL_ZERO: u32 = 1;
/// Raw flag value selecting [`DeleteMode::Compact`]
pub const DEL_COMPACT: u32 = 2;

/// How the data region of a deleted object is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Overwrite the payload with zeros
    Zero,
    /// Reclaim the space by shrinking the file; not implemented
    Compact,
}

impl TryFrom<u32> for DeleteMode {
    type Error = SifError;

    fn try_from(flags: u32) -> Result<Self> {
        match flags {
            DEL_ZERO => Ok(DeleteMode::Zero),
            DEL_COMPACT => Ok(DeleteMode::Compact),
            other => Err(SifError::InvalidMode(other)),
        }
    }
}

/// Everything needed to create a new container file
#[derive(Debug)]
pub struct CreateInfo {
    pub path: PathBuf,
    pub launch: String,
    pub version: String,
    pub arch: Arch,
    pub id: Uuid,
    pub owner: Owner,
    pub layout: Layout,
    /// Objects laid out in this order
    pub inputs: Vec<DescriptorInput>,
}

impl CreateInfo {
    /// Creation info with host defaults and a random id
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CreateInfo {
            path: path.as_ref().to_path_buf(),
            launch: HDR_LAUNCH.to_string(),
            version: HDR_VERSION.to_string(),
            arch: Arch::host(),
            id: Uuid::new_v4(),
            owner: Owner::current(),
            layout: Layout::default(),
            inputs: Vec::new(),
        }
    }
}

/// An open container file
#[derive(Debug)]
pub struct Container {
    file: ContainerFile,
    header: Header,
    table: DescriptorTable,
    layout: Layout,
    owner: Owner,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Container {
    /// Create a new container file holding all of `info.inputs`
    ///
    /// The file is created or truncated. Objects are written in input order,
    /// then the descriptor table, then the header. The returned handle keeps
    /// the file open for further mutation.
    pub fn create(mut info: CreateInfo) -> Result<Self> {
        if info.inputs.is_empty() {
            return Err(SifError::EmptyInputSet);
        }
        info.layout.validate()?;

        let layout = info.layout;
        let ts = now();

        let mut header = Header::new();
        header.launch = fill_fixed(info.launch.as_bytes()).0;
        header.version = fill_fixed(info.version.as_bytes()).0;
        header.arch = fill_fixed(info.arch.code().as_bytes()).0;
        header.id = *info.id.as_bytes();
        header.created_at = ts;
        header.modified_at = ts;
        header.total_descriptors = layout.descriptor_capacity as u64;
        header.free_descriptors = layout.descriptor_capacity as u64;
        header.descriptor_offset = layout.descriptor_offset;
        header.data_offset = layout.data_offset;

        info!(
            "Creating container {:?} with {} objects",
            info.path,
            info.inputs.len()
        );

        let file = ContainerFile::create(&info.path)?;
        let mut container = Container {
            file,
            header,
            table: DescriptorTable::new(layout.descriptor_capacity),
            layout,
            owner: info.owner,
        };

        for mut input in info.inputs.drain(..) {
            container.place_object(&mut input, ts)?;
        }

        container.persist()?;
        container.file.sync()?;

        Ok(container)
    }

    /// Append a new data object and its descriptor
    ///
    /// Returns the id assigned to the object.
    pub fn add_object(&mut self, mut input: DescriptorInput) -> Result<u32> {
        let ts = now();
        let id = self.place_object(&mut input, ts)?;

        self.header.modified_at = ts;
        self.persist()?;
        self.file.sync()?;

        info!("Added object {} ('{}') to {:?}", id, input.name, self.path());
        Ok(id)
    }

    /// Remove the data object referred to by `id`
    ///
    /// The slot becomes free for reuse. The data region is never shrunk.
    pub fn delete_object(&mut self, id: u32, mode: DeleteMode) -> Result<()> {
        let (index, descr) = self.table.find(id)?;
        let descr = *descr;

        match mode {
            DeleteMode::Zero => {
                zero_fill(
                    self.file.file_mut(),
                    descr.file_offset,
                    descr.payload_len,
                    self.layout.zero_chunk_size,
                )?;
            }
            DeleteMode::Compact => return Err(SifError::NotImplemented("DelCompact")),
        }

        self.table.release(index);
        self.header.free_descriptors = self.table.free_count() as u64;
        self.header.modified_at = now();

        self.file
            .write_descriptor_at(&self.header, index, &Descriptor::EMPTY)?;
        self.file.write_header(&self.header)?;
        self.file.sync()?;

        info!("Deleted object {} from {:?}", id, self.path());
        Ok(())
    }

    /// Allocate, write and commit one object at the end of the data region
    ///
    /// Returns the id of the committed descriptor.
    fn place_object(&mut self, input: &mut DescriptorInput, ts: i64) -> Result<u32> {
        let placement = Placement {
            cursor: self.header.data_end(),
            alignment: self.layout.alignment,
            owner: self.owner,
            now: ts,
        };
        let Allocation { index, descriptor } = allocate(&self.table, input, placement)?;

        self.file.seek_to(descriptor.file_offset)?;
        write_payload(self.file.file_mut(), input)?;

        self.table.occupy(index, descriptor);
        self.header.free_descriptors = self.table.free_count() as u64;
        self.header.data_len += descriptor.stored_len;

        Ok(descriptor.id)
    }

    /// Flush the descriptor table, then the header
    fn persist(&mut self) -> Result<()> {
        self.file.write_descriptors(&mut self.header, &self.table)?;
        self.file.write_header(&self.header)?;
        debug!(
            "Persisted header: {} of {} descriptors free, {} data bytes",
            self.header.free_descriptors, self.header.total_descriptors, self.header.data_len
        );
        Ok(())
    }

    /// Look up the used descriptor carrying `id`
    pub fn get_by_id(&self, id: u32) -> Result<&Descriptor> {
        self.table.find(id).map(|(_, descr)| descr)
    }

    /// Used descriptors in table order
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.table.used()
    }

    pub fn objects_of_type(&self, data_type: DataType) -> impl Iterator<Item = &Descriptor> {
        self.table.used().filter(move |d| d.data_type == data_type)
    }

    pub fn objects_in_group(&self, group_id: u32) -> impl Iterator<Item = &Descriptor> {
        self.table.used().filter(move |d| d.group_id == group_id)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Change the owner stamped onto objects added from now on
    pub fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Sync and close the backing file
    pub fn close(mut self) -> Result<()> {
        self.file.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::HEADER_SIZE;
    use tempfile::TempDir;

    fn info_with(dir: &TempDir, inputs: Vec<DescriptorInput>) -> CreateInfo {
        let mut info = CreateInfo::new(dir.path().join("test.sif"));
        info.owner = Owner::new(1000, 100);
        info.layout.alignment = 4096;
        info.inputs = inputs;
        info
    }

    fn blob(name: &str, len: usize) -> DescriptorInput {
        DescriptorInput::new(DataType::GENERIC, name).with_data(vec![0x5a; len])
    }

    #[test]
    fn test_delete_mode_from_flags() {
        assert_eq!(DeleteMode::try_from(DEL_ZERO).unwrap(), DeleteMode::Zero);
        assert_eq!(
            DeleteMode::try_from(DEL_COMPACT).unwrap(),
            DeleteMode::Compact
        );
        assert!(matches!(
            DeleteMode::try_from(0),
            Err(SifError::InvalidMode(0))
        ));
        assert!(matches!(
            DeleteMode::try_from(7),
            Err(SifError::InvalidMode(7))
        ));
    }

    #[test]
    fn test_create_sets_header_tags() {
        let dir = TempDir::new().unwrap();
        let mut info = info_with(&dir, vec![blob("a", 10)]);
        info.arch = Arch::Aarch64;
        let id = info.id;

        let cont = Container::create(info).unwrap();
        let header = cont.header();

        assert_eq!(header.arch(), Arch::Aarch64);
        assert_eq!(header.id, *id.as_bytes());
        assert_eq!(header.total_descriptors, 32);
        assert_eq!(header.free_descriptors, 31);
        assert_eq!(header.descriptor_offset, 4096);
        assert_eq!(header.data_offset, 32768);
        assert_eq!(header.descriptor_len, 32 * 585);
    }

    #[test]
    fn test_empty_input_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let info = info_with(&dir, Vec::new());
        let path = info.path.clone();

        assert!(matches!(
            Container::create(info),
            Err(SifError::EmptyInputSet)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_layout_rejected_before_open() {
        let dir = TempDir::new().unwrap();
        let mut info = info_with(&dir, vec![blob("a", 1)]);
        info.layout.alignment = 1000;
        let path = info.path.clone();

        assert!(matches!(
            Container::create(info),
            Err(SifError::InvalidLayout(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_unalignable_data_offset_rejected_before_open() {
        let dir = TempDir::new().unwrap();
        let mut info = info_with(&dir, vec![blob("a", 1)]);
        info.layout.data_offset = u64::MAX - 10;
        let path = info.path.clone();

        assert!(matches!(
            Container::create(info),
            Err(SifError::InvalidLayout(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_add_returns_new_id() {
        let dir = TempDir::new().unwrap();
        let mut cont = Container::create(info_with(&dir, vec![blob("a", 10)])).unwrap();

        let id = cont.add_object(blob("b", 5)).unwrap();
        assert_eq!(id, 2);
        assert_eq!(cont.get_by_id(2).unwrap().name_str(), "b");
        assert_eq!(cont.header().free_descriptors, 30);
    }

    #[test]
    fn test_add_into_released_slot_returns_its_id() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![blob("a", 10), blob("b", 10), blob("c", 10)];
        let mut cont = Container::create(info_with(&dir, inputs)).unwrap();

        cont.delete_object(2, DeleteMode::Zero).unwrap();
        let id = cont.add_object(blob("d", 20)).unwrap();

        assert_eq!(id, 2);
        let descr = cont.get_by_id(id).unwrap();
        assert_eq!(descr.name_str(), "d");
        assert_eq!(descr.payload_len, 20);
    }

    #[test]
    fn test_zero_delete_clears_exact_payload() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![blob("a", 10), blob("b", 7)];
        let mut cont = Container::create(info_with(&dir, inputs)).unwrap();
        let range = cont.get_by_id(2).unwrap().payload_range();

        cont.delete_object(2, DeleteMode::Zero).unwrap();

        let bytes = std::fs::read(cont.path()).unwrap();
        let (start, end) = (range.start as usize, range.end as usize);
        assert!(bytes[start..end].iter().all(|&b| b == 0));
        let first = cont.get_by_id(1).unwrap().payload_range();
        assert!(bytes[first.start as usize..first.end as usize]
            .iter()
            .all(|&b| b == 0x5a));
    }

    #[test]
    fn test_compact_leaves_handle_untouched() {
        let dir = TempDir::new().unwrap();
        let mut cont = Container::create(info_with(&dir, vec![blob("a", 10)])).unwrap();
        let before = *cont.header();

        assert!(matches!(
            cont.delete_object(1, DeleteMode::Compact),
            Err(SifError::NotImplemented(_))
        ));
        assert_eq!(*cont.header(), before);
        assert!(cont.get_by_id(1).is_ok());
    }

    #[test]
    fn test_delete_unknown_id() {
        let dir = TempDir::new().unwrap();
        let mut cont = Container::create(info_with(&dir, vec![blob("a", 10)])).unwrap();

        assert!(matches!(
            cont.delete_object(9, DeleteMode::Zero),
            Err(SifError::UnknownId(9))
        ));
    }

    #[test]
    fn test_type_and_group_queries() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            DescriptorInput::new(DataType::DEFFILE, "def").with_data(b"Bootstrap".to_vec()),
            DescriptorInput::new(DataType::PARTITION, "rootfs")
                .with_data(vec![1u8; 64])
                .with_group(crate::core::descriptor::DESCR_DEFAULT_GROUP),
            DescriptorInput::new(DataType::LABELS, "labels")
                .with_data(b"{}".to_vec())
                .with_group(crate::core::descriptor::DESCR_DEFAULT_GROUP),
        ];
        let cont = Container::create(info_with(&dir, inputs)).unwrap();

        let parts: Vec<_> = cont.objects_of_type(DataType::PARTITION).collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name_str(), "rootfs");

        let grouped: Vec<u32> = cont
            .objects_in_group(crate::core::descriptor::DESCR_DEFAULT_GROUP)
            .map(|d| d.id)
            .collect();
        assert_eq!(grouped, vec![2, 3]);
    }

    #[test]
    fn test_close_flushes_header() {
        let dir = TempDir::new().unwrap();
        let cont = Container::create(info_with(&dir, vec![blob("a", 10)])).unwrap();
        let path = cont.path().to_path_buf();
        let header = *cont.header();
        cont.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(Header::from_bytes(&bytes[..HEADER_SIZE]).unwrap(), header);
    }
}
