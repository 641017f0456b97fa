//! Ownership stamped onto new descriptors

use serde::{Deserialize, Serialize};

/// User and group owning the data objects a handle creates
///
/// The engine treats both values as opaque integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    pub uid: i64,
    pub gid: i64,
}

impl Owner {
    pub fn new(uid: i64, gid: i64) -> Self {
        Owner { uid, gid }
    }

    /// Real user and group of the current process
    #[cfg(unix)]
    pub fn current() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Owner {
            uid: uid as i64,
            gid: gid as i64,
        }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Owner::default()
    }
}
