//! The pager owns the database file and the in-memory page cache.
//!
//! Pages are materialized lazily on first access and written back only by
//! an explicit [`Pager::flush`]; in between, the cached buffer is the
//! canonical copy of the page. Page numbers are allocated monotonically
//! and never reused. Eventually after we implement deletion, some pages
//! may become empty and their page numbers unused; to be more efficient,
//! we could re-allocate those free pages.

use super::node::{Page, PAGE_SIZE};
use crate::errors::Error;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

/// Hard cap on page numbers. Fetching past it is fatal.
pub const TABLE_MAX_PAGES: usize = 400;

#[derive(Debug)]
pub struct Pager {
    file: File,
    num_pages: u32,
    cache: heapless::Vec<Option<Box<Page>>, { TABLE_MAX_PAGES + 1 }>,
}

impl Pager {
    /// Opens the database file at `path`, creating it if missing.
    ///
    /// # Errors
    /// Returns an `Error::Storage` if the file length is not a whole
    /// multiple of the page size.
    pub fn open(path: &Path) -> Result<Pager, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Storage,
                "Db file is not a whole number of pages. Corrupt file."
            ));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(path = %path.display(), num_pages, "Opened database file");

        Ok(Pager {
            file,
            num_pages,
            cache: heapless::Vec::new(),
        })
    }

    /// Number of pages the file logically contains, counting pages
    /// materialized in cache but not yet flushed.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Page number to use for the next allocation. The page only comes
    /// into existence on the first `get_page` for that number.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Returns the cached buffer for `page_num`, loading it from disk on
    /// the first access. A fresh page past the end of the file starts
    /// zeroed, and `num_pages` grows to cover it.
    pub fn get_page(&mut self, page_num: u32) -> Result<&mut Page, Error> {
        if page_num as usize > TABLE_MAX_PAGES {
            return Err(err!(
                Storage,
                "Tried to fetch page number out of bounds. {} > {}",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        while self.cache.len() <= page_num as usize {
            if self.cache.push(None).is_err() {
                return Err(err!(Storage, "Page cache capacity exceeded."));
            }
        }

        if self.cache[page_num as usize].is_none() {
            // Cache miss. Start from a zeroed buffer and fill whatever
            // the file holds for this page; a short read leaves the tail
            // zeroed.
            let mut page = Box::new(Page::new());
            if page_num < self.num_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                let mut filled = 0;
                while filled < PAGE_SIZE {
                    let n = self.file.read(&mut page.data[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
            }
            self.cache[page_num as usize] = Some(page);

            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        // Safe to unwrap: the slot was just filled if it was empty.
        Ok(self.cache[page_num as usize].as_mut().unwrap())
    }

    /// Writes the cached page back to its slot in the file.
    ///
    /// # Errors
    /// Returns an `Error::Storage` if the page was never cached.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let page = match self.cache.get(page_num as usize) {
            Some(Some(page)) => page,
            _ => return Err(err!(Storage, "Tried to flush null page")),
        };
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&page.data)?;
        debug!(page_num, "Flushed page");
        Ok(())
    }

    /// Flushes every cached page in page order and drops the cache.
    pub fn close(&mut self) -> Result<(), Error> {
        let mut flushed = 0;
        for page_num in 0..self.num_pages {
            let cached = self
                .cache
                .get(page_num as usize)
                .map_or(false, Option::is_some);
            if cached {
                self.flush(page_num)?;
                self.cache[page_num as usize] = None;
                flushed += 1;
            }
        }
        self.file.flush()?;
        info!("Flushed {} pages.", flushed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        (dir, path)
    }

    #[test]
    fn open_creates_missing_file() {
        let (_dir, path) = scratch();
        let pager = Pager::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(pager.num_pages(), 0);
    }

    #[test]
    fn open_rejects_torn_file() {
        let (_dir, path) = scratch();
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        let err = Pager::open(&path).unwrap_err();
        assert!(err.to_string().contains("Corrupt file"));
    }

    #[test]
    fn get_page_materializes_and_extends() {
        let (_dir, path) = scratch();
        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.get_unused_page_num(), 0);

        pager.get_page(0).unwrap();
        assert_eq!(pager.num_pages(), 1);
        assert_eq!(pager.get_unused_page_num(), 1);
    }

    #[test]
    fn get_page_past_cap_is_fatal() {
        let (_dir, path) = scratch();
        let mut pager = Pager::open(&path).unwrap();
        assert!(pager.get_page(TABLE_MAX_PAGES as u32).is_ok());
        let err = pager.get_page(TABLE_MAX_PAGES as u32 + 1).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn flush_uncached_page_is_fatal() {
        let (_dir, path) = scratch();
        let mut pager = Pager::open(&path).unwrap();
        let err = pager.flush(0).unwrap_err();
        assert!(err.to_string().contains("null page"));
    }

    #[test]
    fn flushed_bytes_survive_reopen() {
        let (_dir, path) = scratch();
        {
            let mut pager = Pager::open(&path).unwrap();
            pager.get_page(0).unwrap().data[123] = 0xCD;
            pager.flush(0).unwrap();
        }
        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages(), 1);
        assert_eq!(pager.get_page(0).unwrap().data[123], 0xCD);
    }

    #[test]
    fn close_flushes_every_cached_page() {
        let (_dir, path) = scratch();
        {
            let mut pager = Pager::open(&path).unwrap();
            pager.get_page(0).unwrap().data[0] = 1;
            pager.get_page(1).unwrap().data[0] = 2;
            pager.close().unwrap();
        }
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 2 * PAGE_SIZE as u64);

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.get_page(0).unwrap().data[0], 1);
        assert_eq!(pager.get_page(1).unwrap().data[0], 2);
    }
}
