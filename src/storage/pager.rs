//! # Pager
//!
//! The pager owns the backing file and is the only component that reads or
//! writes bytes on disk. It materializes the file header on create,
//! validates it on open, serves page buffers through a bounded LRU cache,
//! and allocates fresh PageNums.
//!
//! ## Caching
//!
//! Up to `capacity` buffers stay resident. Every access stamps the buffer
//! with a monotonically increasing tick; when the cache is full the buffer
//! with the oldest stamp is evicted, and a dirty victim is written to disk
//! first. Eviction only runs inside `&mut self` methods, so no live borrow
//! can dangle.
//!
//! ## Allocation
//!
//! `new_page()` hands out `next_free_page` and increments it. The file is
//! not extended eagerly; a page past the current end of file reads back
//! zeroed and the file grows when the buffer is first flushed. Pages are
//! never freed in this engine (the header's free-list flag stays 0), so
//! `next_free_page` is strictly greater than every PageNum in use.
//!
//! ## Durability
//!
//! `flush_all()` writes every dirty buffer and the header, then calls
//! `File::sync_all`. There is no intra-operation durability: a crash in the
//! middle of an insert can leave the file inconsistent. Any I/O failure
//! during a flush is fatal to the session; in-memory state may no longer
//! match the disk.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use tracing::{debug, trace};
use zerocopy::IntoBytes;

use super::header::FileHeader;
use super::page::PageBuf;
use crate::config::{DEFAULT_CACHE_PAGES, FILE_HEADER_SIZE, PAGE_SIZE};
use crate::errors::Error;

#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    header: FileHeader,
    header_dirty: bool,
    cache: HashMap<u32, PageBuf>,
    capacity: usize,
    tick: u64,
    /// Pages currently materialized in the file (derived from its length).
    file_pages: u32,
    created: bool,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_cache(path, DEFAULT_CACHE_PAGES)
    }

    pub fn open_with_cache<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        ensure!(capacity >= 1, "page cache capacity must be at least 1");
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(Error::Io)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .map_err(Error::Io)
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        let (header, file_pages, created) = if file_size == 0 {
            let header = FileHeader::new();
            file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
            file.write_all(header.as_bytes()).map_err(Error::Io)?;
            debug!(path = %path.display(), "created database file");
            (header, 0, true)
        } else {
            if file_size < FILE_HEADER_SIZE as u64 {
                return Err(Error::ShortHeader(file_size).into());
            }

            let mut bytes = [0u8; FILE_HEADER_SIZE];
            file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
            file.read_exact(&mut bytes).map_err(Error::Io)?;
            let header = FileHeader::from_bytes(&bytes)?;

            let body = file_size - FILE_HEADER_SIZE as u64;
            ensure!(
                body % PAGE_SIZE as u64 == 0,
                "database file '{}' body size {} is not a multiple of page size {}",
                path.display(),
                body,
                PAGE_SIZE
            );

            let file_pages = (body / PAGE_SIZE as u64) as u32;
            debug!(
                path = %path.display(),
                pages = file_pages,
                next_free_page = header.next_free_page(),
                "opened database file"
            );
            (header, file_pages, false)
        };

        Ok(Self {
            file,
            path,
            header,
            header_dirty: created,
            cache: HashMap::with_capacity(capacity),
            capacity,
            tick: 0,
            file_pages,
            created,
        })
    }

    /// True when `open` created the file (the caller still has to
    /// initialize page 0 as the catalog root).
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_free_page(&self) -> u32 {
        self.header.next_free_page()
    }

    pub fn catalog_root(&self) -> u32 {
        self.header.catalog_root()
    }

    pub fn set_catalog_root(&mut self, page_no: u32) {
        self.header.set_catalog_root(page_no);
        self.header_dirty = true;
    }

    /// Borrows page `n` read-only, loading it into the cache if needed.
    pub fn page(&mut self, page_no: u32) -> Result<&[u8]> {
        self.load(page_no)?;
        Ok(self.touch_entry(page_no).data())
    }

    /// Borrows page `n` mutably and marks it dirty.
    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut [u8]> {
        self.load(page_no)?;
        let entry = self.touch_entry(page_no);
        entry.mark_dirty();
        Ok(entry.data_mut())
    }

    /// Allocates a fresh PageNum. The page's contents are undefined (zeroed
    /// on first access) until the caller initializes it as a node.
    pub fn new_page(&mut self) -> Result<u32> {
        let page_no = self.header.next_free_page();
        self.header.set_next_free_page(page_no + 1);
        self.header_dirty = true;
        trace!(page_no, "allocated page");
        Ok(page_no)
    }

    /// Writes every dirty buffer and the header, then fsyncs.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut dirty: Vec<u32> = self
            .cache
            .iter()
            .filter(|(_, buf)| buf.is_dirty())
            .map(|(&page_no, _)| page_no)
            .collect();
        dirty.sort_unstable();

        for page_no in &dirty {
            self.write_page(*page_no)?;
        }

        if self.header_dirty {
            self.write_header()?;
        }

        self.file.sync_all().map_err(Error::Io)?;
        debug!(pages = dirty.len(), "flushed database file");
        Ok(())
    }

    /// Flushes and consumes the pager.
    pub fn close(mut self) -> Result<()> {
        self.flush_all()
    }

    fn load(&mut self, page_no: u32) -> Result<()> {
        ensure!(
            page_no < self.header.next_free_page(),
            "page {} was never allocated (next_free_page={})",
            page_no,
            self.header.next_free_page()
        );

        if self.cache.contains_key(&page_no) {
            return Ok(());
        }

        if self.cache.len() >= self.capacity {
            self.evict_one()?;
        }

        let mut buf = PageBuf::zeroed(page_no);
        if page_no < self.file_pages {
            self.file
                .seek(SeekFrom::Start(Self::page_offset(page_no)))
                .map_err(Error::Io)?;
            self.file
                .read_exact(buf.data_mut())
                .map_err(Error::Io)
                .wrap_err_with(|| format!("failed to read page {}", page_no))?;
        }

        self.cache.insert(page_no, buf);
        Ok(())
    }

    fn touch_entry(&mut self, page_no: u32) -> &mut PageBuf {
        self.tick += 1;
        let tick = self.tick;
        let entry = self
            .cache
            .get_mut(&page_no)
            .unwrap_or_else(|| unreachable!("page {} loaded above", page_no));
        entry.touch(tick);
        entry
    }

    fn evict_one(&mut self) -> Result<()> {
        let victim = self
            .cache
            .values()
            .min_by_key(|buf| buf.last_used())
            .map(|buf| buf.page_no())
            .unwrap_or_else(|| unreachable!("evict_one called on an empty cache"));

        if self.cache[&victim].is_dirty() {
            self.write_page(victim)?;
        }

        trace!(page_no = victim, "evicted page");
        self.cache.remove(&victim);
        Ok(())
    }

    fn write_page(&mut self, page_no: u32) -> Result<()> {
        let buf = self
            .cache
            .get(&page_no)
            .ok_or_else(|| eyre::eyre!("page {} is not resident", page_no))?;

        self.file
            .seek(SeekFrom::Start(Self::page_offset(page_no)))
            .map_err(Error::Io)?;
        self.file
            .write_all(buf.data())
            .map_err(Error::Io)
            .wrap_err_with(|| format!("failed to write page {}", page_no))?;

        if page_no >= self.file_pages {
            self.file_pages = page_no + 1;
        }

        let buf = self
            .cache
            .get_mut(&page_no)
            .unwrap_or_else(|| unreachable!("page {} checked above", page_no));
        buf.clear_dirty();
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
        self.file
            .write_all(self.header.as_bytes())
            .map_err(Error::Io)
            .wrap_err("failed to write file header")?;
        self.header_dirty = false;
        Ok(())
    }

    fn page_offset(page_no: u32) -> u64 {
        FILE_HEADER_SIZE as u64 + page_no as u64 * PAGE_SIZE as u64
    }
}
