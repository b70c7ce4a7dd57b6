//! # KDB Configuration Constants
//!
//! This module centralizes the layout and tuning constants, grouping
//! interdependent values together. Constants that depend on each other are
//! co-located, and the derived ones are pinned by compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> LEAF_HEADER_SIZE (10 bytes, fixed by the file format)
//!       │     └─> leaf cell area: alloc_ptr starts at PAGE_SIZE and the
//!       │         cell-pointer array grows up from LEAF_HEADER_SIZE; a
//!       │         leaf is full when the two would meet
//!       │
//!       └─> INTERNAL_HEADER_SIZE (12 bytes) + INTERNAL_ENTRY_SIZE (12)
//!             └─> INTERNAL_MAX_KEYS (derived fanout)
//!
//! FILE_HEADER_SIZE (100 bytes)
//!       │
//!       └─> page n lives at file offset FILE_HEADER_SIZE + n * PAGE_SIZE
//!
//! DEFAULT_CACHE_PAGES (64)
//!       └─> pager LRU capacity; dirty victims are written before eviction
//! ```

// ============================================================================
// PAGE LAYOUT CONSTANTS
// These define the on-disk format and must not change between versions
// ============================================================================

/// Size of each database page in bytes (4KB).
/// This is the fundamental unit of I/O and caching.
pub const PAGE_SIZE: usize = 4096;

/// Size of the file header at the start of the file.
/// Page n begins at file offset `FILE_HEADER_SIZE + n * PAGE_SIZE`.
pub const FILE_HEADER_SIZE: usize = 100;

/// Size of the leaf node header: node_type, is_root, parent, num_cells,
/// alloc_ptr. The cell-pointer array starts immediately after it.
pub const LEAF_HEADER_SIZE: usize = 10;

/// Size of the internal node header: node_type, is_root, parent, num_keys,
/// right_child. Entries start immediately after it.
pub const INTERNAL_HEADER_SIZE: usize = 12;

/// Size of one internal entry: child PageNum (u32) + separator key (u64).
pub const INTERNAL_ENTRY_SIZE: usize = 12;

/// Size of one leaf cell-pointer array element.
pub const CELL_POINTER_SIZE: usize = 2;

/// Per-cell overhead in a leaf: key_size (u16) + data_size (u16).
pub const CELL_HEADER_SIZE: usize = 4;

/// Encoded width of a cell key (u64, little-endian).
pub const KEY_SIZE: usize = 8;

/// Maximum number of entries an internal node can hold.
pub const INTERNAL_MAX_KEYS: usize = (PAGE_SIZE - INTERNAL_HEADER_SIZE) / INTERNAL_ENTRY_SIZE;

const _: () = assert!(
    INTERNAL_MAX_KEYS >= 3,
    "internal nodes must hold enough entries to split meaningfully"
);

const _: () = assert!(
    PAGE_SIZE <= u16::MAX as usize,
    "alloc_ptr and cell pointers are u16 offsets into the page"
);

// ============================================================================
// PAGER CONFIGURATION
// ============================================================================

/// Number of page buffers the pager keeps resident.
/// Larger values trade memory for fewer disk round-trips.
pub const DEFAULT_CACHE_PAGES: usize = 64;

const _: () = assert!(
    DEFAULT_CACHE_PAGES >= 8,
    "splits touch several pages at once; keep a workable cache floor"
);
