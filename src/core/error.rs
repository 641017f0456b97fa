use thiserror::Error;

#[derive(Error, Debug)]
pub enum SifError {
    #[error("Need at least one input descriptor to create a container")]
    EmptyInputSet,

    #[error("No descriptor table free entry")]
    NoFreeSlot,

    #[error("Descriptor table out of sync: header claims {header_free} free entries, table has {table_free}")]
    TableDesync { header_free: u64, table_free: u64 },

    #[error("Short write while copying data object: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: u64, written: u64 },

    #[error("Unknown descriptor ID: {0}")]
    UnknownId(u32),

    #[error("Invalid deletion mode: {0}")]
    InvalidMode(u32),

    #[error("Method ({0}) not implemented yet")]
    NotImplemented(&'static str),

    #[error("Invalid magic number in header")]
    InvalidMagic,

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("Insufficient bytes for {what}: need {needed}, got {got}")]
    Truncated {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SifError>;

/// Attach the failing storage operation to an I/O error
pub trait IoContext<T> {
    fn context(self, op: &'static str) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn context(self, op: &'static str) -> Result<T> {
        self.map_err(|source| SifError::Io { op, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_context_names_operation() {
        let res: std::io::Result<()> = Err(Error::new(ErrorKind::Other, "disk on fire"));
        let err = res.context("seeking to descriptor table").unwrap_err();

        assert!(matches!(err, SifError::Io { op: "seeking to descriptor table", .. }));
        assert_eq!(err.to_string(), "seeking to descriptor table: disk on fire");
    }

    #[test]
    fn test_short_write_message() {
        let err = SifError::ShortWrite {
            expected: 10,
            written: 3,
        };
        assert!(err.to_string().contains("expected 10 bytes, wrote 3"));
    }
}
