//! Offset arithmetic for page-aligned data objects

/// Page size used when the host cannot report one
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Smallest offset `>= offset` that is a multiple of `align`
///
/// `align` must be a power of two; other values give meaningless results.
pub const fn next_aligned(offset: u64, align: u64) -> u64 {
    let mask = align - 1;
    if offset & mask == 0 {
        offset
    } else {
        (offset & !mask) + align
    }
}

/// Native page size of the running host
#[cfg(unix)]
pub fn host_page_size() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        DEFAULT_PAGE_SIZE
    }
}

#[cfg(not(unix))]
pub fn host_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_aligned_is_unchanged() {
        assert_eq!(next_aligned(0, 4096), 0);
        assert_eq!(next_aligned(4096, 4096), 4096);
        assert_eq!(next_aligned(32768, 4096), 32768);
    }

    #[test]
    fn test_rounds_up_to_next_block() {
        assert_eq!(next_aligned(1, 4096), 4096);
        assert_eq!(next_aligned(4097, 4096), 8192);
        assert_eq!(next_aligned(32778, 4096), 36864);
        assert_eq!(next_aligned(5, 8), 8);
    }

    #[test]
    fn test_alignment_of_one() {
        assert_eq!(next_aligned(12345, 1), 12345);
    }

    #[test]
    fn test_host_page_size_is_power_of_two() {
        let size = host_page_size();
        assert!(size > 0);
        assert!(size.is_power_of_two());
    }
}
