use crate::core::codec::{fill_fixed, trim_nul, FieldReader};
use crate::core::error::{Result, SifError};

pub const HDR_LAUNCH_LEN: usize = 32;
pub const HDR_MAGIC_LEN: usize = 10;
pub const HDR_VERSION_LEN: usize = 3;
pub const HDR_ARCH_LEN: usize = 3;
pub const HDR_ID_LEN: usize = 16;

/// Encoded header size in bytes
pub const HEADER_SIZE: usize =
    HDR_LAUNCH_LEN + HDR_MAGIC_LEN + HDR_VERSION_LEN + HDR_ARCH_LEN + HDR_ID_LEN + 8 * 8;

pub const HDR_LAUNCH: &str = "#!/usr/bin/env run-singularity\n";
pub const HDR_MAGIC: &str = "SIF_MAGIC";
pub const HDR_VERSION: &str = "01";

/// Architecture the primary partition was built for
///
/// Stored on disk as a two-digit code in a 3-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Unknown,
    X86,
    X86_64,
    Arm,
    Aarch64,
    Ppc64,
    Ppc64le,
    Mips,
    Mipsle,
    Mips64,
    Mips64le,
    S390x,
}

impl Arch {
    /// Architecture of the running host
    pub fn host() -> Self {
        let little = cfg!(target_endian = "little");
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "x86_64" => Arch::X86_64,
            "arm" => Arch::Arm,
            "aarch64" => Arch::Aarch64,
            "powerpc64" if little => Arch::Ppc64le,
            "powerpc64" => Arch::Ppc64,
            "mips" if little => Arch::Mipsle,
            "mips" => Arch::Mips,
            "mips64" if little => Arch::Mips64le,
            "mips64" => Arch::Mips64,
            "s390x" => Arch::S390x,
            _ => Arch::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Arch::Unknown => "00",
            Arch::X86 => "01",
            Arch::X86_64 => "02",
            Arch::Arm => "03",
            Arch::Aarch64 => "04",
            Arch::Ppc64 => "05",
            Arch::Ppc64le => "06",
            Arch::Mips => "07",
            Arch::Mipsle => "08",
            Arch::Mips64 => "09",
            Arch::Mips64le => "10",
            Arch::S390x => "11",
        }
    }

    /// Parse a two-digit code; unknown codes map to `Unknown`
    pub fn from_code(code: &str) -> Self {
        match code {
            "01" => Arch::X86,
            "02" => Arch::X86_64,
            "03" => Arch::Arm,
            "04" => Arch::Aarch64,
            "05" => Arch::Ppc64,
            "06" => Arch::Ppc64le,
            "07" => Arch::Mips,
            "08" => Arch::Mipsle,
            "09" => Arch::Mips64,
            "10" => Arch::Mips64le,
            "11" => Arch::S390x,
            _ => Arch::Unknown,
        }
    }
}

/// Global container header
///
/// Lives at offset 0. The descriptor and data offsets and the descriptor
/// capacity are fixed at creation; the length and free-count fields are
/// rewritten after every structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Shell execution line
    pub launch: [u8; HDR_LAUNCH_LEN],

    /// "SIF_MAGIC", NUL padded
    pub magic: [u8; HDR_MAGIC_LEN],

    pub version: [u8; HDR_VERSION_LEN],

    pub arch: [u8; HDR_ARCH_LEN],

    /// Container unique identifier
    pub id: [u8; HDR_ID_LEN],

    pub created_at: i64,
    pub modified_at: i64,

    /// Number of unused descriptor slots
    pub free_descriptors: u64,

    /// Number of descriptor slots in the table
    pub total_descriptors: u64,

    /// Byte offset of the descriptor table
    pub descriptor_offset: u64,

    /// Bytes used by the descriptor table
    pub descriptor_len: u64,

    /// Byte offset of the data region
    pub data_offset: u64,

    /// Bytes used by all data objects, alignment padding included
    pub data_len: u64,
}

impl Header {
    /// Create a header carrying the default tags and no layout
    pub fn new() -> Self {
        Header {
            launch: fill_fixed(HDR_LAUNCH.as_bytes()).0,
            magic: fill_fixed(HDR_MAGIC.as_bytes()).0,
            version: fill_fixed(HDR_VERSION.as_bytes()).0,
            arch: fill_fixed(Arch::host().code().as_bytes()).0,
            id: [0; HDR_ID_LEN],
            created_at: 0,
            modified_at: 0,
            free_descriptors: 0,
            total_descriptors: 0,
            descriptor_offset: 0,
            descriptor_len: 0,
            data_offset: 0,
            data_len: 0,
        }
    }

    /// Validate the magic and the descriptor counters
    pub fn validate(&self) -> Result<()> {
        if trim_nul(&self.magic) != HDR_MAGIC.as_bytes() {
            return Err(SifError::InvalidMagic);
        }

        if self.free_descriptors > self.total_descriptors {
            return Err(SifError::CorruptHeader(format!(
                "free descriptors ({}) exceeds total descriptors ({})",
                self.free_descriptors, self.total_descriptors
            )));
        }

        if self.data_offset < self.descriptor_offset {
            return Err(SifError::CorruptHeader(format!(
                "data offset ({}) precedes descriptor offset ({})",
                self.data_offset, self.descriptor_offset
            )));
        }

        Ok(())
    }

    /// Architecture tag decoded from the header
    pub fn arch(&self) -> Arch {
        Arch::from_code(&String::from_utf8_lossy(trim_nul(&self.arch)))
    }

    /// Offset one past the last data object
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.data_len
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);

        bytes.extend_from_slice(&self.launch);
        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&self.version);
        bytes.extend_from_slice(&self.arch);
        bytes.extend_from_slice(&self.id);
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes.extend_from_slice(&self.modified_at.to_le_bytes());
        bytes.extend_from_slice(&self.free_descriptors.to_le_bytes());
        bytes.extend_from_slice(&self.total_descriptors.to_le_bytes());
        bytes.extend_from_slice(&self.descriptor_offset.to_le_bytes());
        bytes.extend_from_slice(&self.descriptor_len.to_le_bytes());
        bytes.extend_from_slice(&self.data_offset.to_le_bytes());
        bytes.extend_from_slice(&self.data_len.to_le_bytes());

        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SifError::Truncated {
                what: "header",
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        let mut r = FieldReader::new(bytes);
        let header = Header {
            launch: r.array(),
            magic: r.array(),
            version: r.array(),
            arch: r.array(),
            id: r.array(),
            created_at: r.i64(),
            modified_at: r.i64(),
            free_descriptors: r.u64(),
            total_descriptors: r.u64(),
            descriptor_offset: r.u64(),
            descriptor_len: r.u64(),
            data_offset: r.u64(),
            data_len: r.u64(),
        };

        header.validate()?;

        Ok(header)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
