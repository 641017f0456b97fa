//! Descriptor records and the caller-facing descriptor input
//!
//! A descriptor is a fixed 585-byte slot in the descriptor table. It records
//! where one data object lives in the file, how many bytes it spans and who
//! created it. Slots that are not `used` are all-zero on disk.

use crate::core::codec::{trim_nul, FieldReader};
use crate::core::error::{Result, SifError};
use std::fmt;
use std::io::Read;

pub const DESCR_NAME_LEN: usize = 128;
pub const DESCR_EXTRA_LEN: usize = 384;

/// Encoded descriptor size in bytes
pub const DESCRIPTOR_SIZE: usize = 4 + 1 + 4 * 3 + 8 * 7 + DESCR_NAME_LEN + DESCR_EXTRA_LEN;

/// Groups start at this bit pattern
pub const DESCR_GROUP_MASK: u32 = 0xf000_0000;
/// Descriptor without a group
pub const DESCR_UNUSED_GROUP: u32 = DESCR_GROUP_MASK;
/// First group id handed out
pub const DESCR_DEFAULT_GROUP: u32 = DESCR_GROUP_MASK | 1;
/// Descriptor without a link to another id or group
pub const DESCR_UNUSED_LINK: u32 = 0;

/// Classification tag of a data object
///
/// The engine never interprets it; the associated constants are the codes
/// container tooling agrees on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataType(pub i32);

impl DataType {
    pub const DEFFILE: DataType = DataType(0x4001);
    pub const ENV_VAR: DataType = DataType(0x4002);
    pub const LABELS: DataType = DataType(0x4003);
    pub const PARTITION: DataType = DataType(0x4004);
    pub const SIGNATURE: DataType = DataType(0x4005);
    pub const GENERIC_JSON: DataType = DataType(0x4006);
    pub const GENERIC: DataType = DataType(0x4007);
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            DataType::DEFFILE => "Def.FILE",
            DataType::ENV_VAR => "Env.Vars",
            DataType::LABELS => "JSON.Labels",
            DataType::PARTITION => "FS",
            DataType::SIGNATURE => "Signature",
            DataType::GENERIC_JSON => "JSON.Generic",
            DataType::GENERIC => "Generic/Raw",
            DataType(other) => return write!(f, "Unknown({:#x})", other),
        };
        f.write_str(name)
    }
}

/// One slot of the descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub data_type: DataType,

    /// Sole authority on slot liveness
    pub used: bool,

    /// 1-based id, equal to slot index + 1 while the slot is used
    pub id: u32,

    pub group_id: u32,

    pub link: u32,

    /// Absolute, page-aligned offset of the payload
    pub file_offset: u64,

    /// Exact payload length
    pub payload_len: u64,

    /// Payload length plus the alignment padding in front of it
    pub stored_len: u64,

    pub created_at: i64,
    pub modified_at: i64,
    pub uid: i64,
    pub gid: i64,

    pub name: [u8; DESCR_NAME_LEN],

    pub extra: [u8; DESCR_EXTRA_LEN],
}

impl Descriptor {
    /// The all-zero record of a never-used slot
    pub const EMPTY: Descriptor = Descriptor {
        data_type: DataType(0),
        used: false,
        id: 0,
        group_id: 0,
        link: 0,
        file_offset: 0,
        payload_len: 0,
        stored_len: 0,
        created_at: 0,
        modified_at: 0,
        uid: 0,
        gid: 0,
        name: [0; DESCR_NAME_LEN],
        extra: [0; DESCR_EXTRA_LEN],
    };

    /// Name without NUL padding
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(trim_nul(&self.name)).into_owned()
    }

    /// Extra metadata without trailing NUL padding
    ///
    /// The field does not record the caller's length, so zero bytes at the
    /// end of the metadata are trimmed along with the padding. Read `extra`
    /// for the full fixed-width field.
    pub fn extra_bytes(&self) -> &[u8] {
        let end = self
            .extra
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        &self.extra[..end]
    }

    /// Payload byte range `[file_offset, file_offset + payload_len)`
    pub fn payload_range(&self) -> std::ops::Range<u64> {
        self.file_offset..self.file_offset + self.payload_len
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DESCRIPTOR_SIZE);

        bytes.extend_from_slice(&self.data_type.0.to_le_bytes());
        bytes.push(self.used as u8);
        bytes.extend_from_slice(&self.id.to_le_bytes());
        bytes.extend_from_slice(&self.group_id.to_le_bytes());
        bytes.extend_from_slice(&self.link.to_le_bytes());
        bytes.extend_from_slice(&self.file_offset.to_le_bytes());
        bytes.extend_from_slice(&self.payload_len.to_le_bytes());
        bytes.extend_from_slice(&self.stored_len.to_le_bytes());
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes.extend_from_slice(&self.modified_at.to_le_bytes());
        bytes.extend_from_slice(&self.uid.to_le_bytes());
        bytes.extend_from_slice(&self.gid.to_le_bytes());
        bytes.extend_from_slice(&self.name);
        bytes.extend_from_slice(&self.extra);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DESCRIPTOR_SIZE {
            return Err(SifError::Truncated {
                what: "descriptor",
                needed: DESCRIPTOR_SIZE,
                got: bytes.len(),
            });
        }

        let mut r = FieldReader::new(bytes);
        Ok(Descriptor {
            data_type: DataType(r.i32()),
            used: r.u8() != 0,
            id: r.u32(),
            group_id: r.u32(),
            link: r.u32(),
            file_offset: r.u64(),
            payload_len: r.u64(),
            stored_len: r.u64(),
            created_at: r.i64(),
            modified_at: r.i64(),
            uid: r.i64(),
            gid: r.i64(),
            name: r.array(),
            extra: r.array(),
        })
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor::EMPTY
    }
}

/// Caller-supplied description of one data object to store
///
/// The payload comes from an in-memory buffer or from a reader with a
/// declared size. A buffer, when set, takes precedence over the reader.
pub struct DescriptorInput {
    pub data_type: DataType,
    pub group_id: u32,
    pub link: u32,
    /// Display name; only its basename is stored
    pub name: String,
    /// Opaque extra metadata, truncated to the slot capacity
    pub extra: Vec<u8>,
    data: Option<Vec<u8>>,
    reader: Option<Box<dyn Read>>,
    reader_size: u64,
}

impl DescriptorInput {
    pub fn new(data_type: DataType, name: impl Into<String>) -> Self {
        DescriptorInput {
            data_type,
            group_id: DESCR_UNUSED_GROUP,
            link: DESCR_UNUSED_LINK,
            name: name.into(),
            extra: Vec::new(),
            data: None,
            reader: None,
            reader_size: 0,
        }
    }

    /// Use an in-memory buffer as payload
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Stream the payload from `reader`, which must yield exactly `size` bytes
    pub fn with_reader<R: Read + 'static>(mut self, reader: R, size: u64) -> Self {
        self.reader = Some(Box::new(reader));
        self.reader_size = size;
        self
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_link(mut self, link: u32) -> Self {
        self.link = link;
        self
    }

    pub fn with_extra(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Declared payload size
    pub fn size(&self) -> u64 {
        match &self.data {
            Some(data) => data.len() as u64,
            None => self.reader_size,
        }
    }

    pub(crate) fn source(&mut self) -> PayloadSource<'_> {
        match (&self.data, &mut self.reader) {
            (Some(data), _) => PayloadSource::Buffer(data),
            (None, Some(reader)) => PayloadSource::Stream(&mut **reader),
            // No source at all: declared size is zero, nothing to copy.
            (None, None) => PayloadSource::Buffer(&[]),
        }
    }
}

impl fmt::Debug for DescriptorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorInput")
            .field("data_type", &self.data_type)
            .field("group_id", &self.group_id)
            .field("link", &self.link)
            .field("name", &self.name)
            .field("size", &self.size())
            .field("buffered", &self.data.is_some())
            .finish()
    }
}

/// Where the object writer pulls payload bytes from
pub(crate) enum PayloadSource<'a> {
    Buffer(&'a [u8]),
    Stream(&'a mut dyn Read),
}
