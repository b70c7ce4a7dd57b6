//! # Storage Module
//!
//! The foundational storage layer: the on-disk file header, fixed-size page
//! buffers, and the pager that owns the backing file.
//!
//! ## File Layout
//!
//! A database is a single file. The first 100 bytes are the file header;
//! pages follow back to back, so page `n` occupies bytes
//! `100 + n * 4096 .. 100 + (n + 1) * 4096`:
//!
//! ```text
//! Offset 0      File header (100 bytes)
//! Offset 100    Page 0 (4096 bytes)  <- catalog tree's first root
//! Offset 4196   Page 1 (4096 bytes)
//! ...
//! ```
//!
//! Page 0 is created together with the file and holds the catalog tree's
//! root. When the catalog root later splits, the header's `catalog_root`
//! field names the new root page; page 0 itself is never relocated.
//!
//! ## The Pager
//!
//! The [`Pager`] is the sole component that touches the file. It serves
//! page buffers through a bounded LRU cache, allocates fresh PageNums from
//! the header's `next_free_page` counter, and writes every dirty buffer
//! plus the header back on [`Pager::flush_all`]. Pages are handed out as
//! plain byte slices; interpretation (node headers, cells) belongs to the
//! B-tree layer.
//!
//! ## Borrow Discipline
//!
//! `page()` and `page_mut()` both take `&mut self` because either may load
//! and evict. The borrow checker therefore guarantees at most one live page
//! reference at a time, which matches the engine's single-writer
//! discipline. Multi-page operations (splits) copy what they need out of
//! one page before borrowing the next.

mod header;
mod page;
mod pager;

pub use header::{FileHeader, MAGIC};
pub use page::PageBuf;
pub use pager::Pager;

pub use crate::config::{FILE_HEADER_SIZE, PAGE_SIZE};
