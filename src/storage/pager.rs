//! Disk-backed pager.
//!
//! Owns the single file a database lives in. Page 0 is special: its
//! first [`FILE_HEADER_SIZE`] bytes are the file header (magic,
//! `next_free_page`, `has_free_list`); the rest of that same
//! `PAGE_SIZE` region is the catalog root's node body. Every other page
//! is a plain `PAGE_SIZE`-byte block addressed by `page_num *
//! PAGE_SIZE`.
//!
//! Pages are cached in a bounded working set behind `Rc<RefCell<_>>`
//! so callers can hold more than one page mutably borrowed at a time
//! (a split touches a left leaf, a right leaf, and a parent) while
//! still going through `RefCell`'s runtime borrow check rather than
//! `unsafe`. Evicting a page that's still borrowed under correct
//! single-writer use is a programming error and surfaces as
//! [`Error::PagePinned`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::page::{Page, PageNum, FILE_HEADER_SIZE, PAGE_SIZE};
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"kdb0";
const DEFAULT_CACHE_CAPACITY: usize = 128;

pub type PageHandle = Rc<RefCell<Page>>;

struct FileHeader {
    next_free_page: PageNum,
    has_free_list: u8,
}

impl FileHeader {
    fn fresh() -> Self {
        FileHeader {
            next_free_page: 1,
            has_free_list: 0,
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(Error::ShortHeader);
        }
        if &bytes[0..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        let next_free_page = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let has_free_list = bytes[8];
        Ok(FileHeader {
            next_free_page,
            has_free_list,
        })
    }

    fn write_into(&self, page: &mut Page) {
        page.write_bytes(0, MAGIC);
        page.write_u32(4, self.next_free_page);
        page.write_u8(8, self.has_free_list);
    }
}

pub struct Pager {
    file: File,
    header: FileHeader,
    header_dirty: bool,
    capacity: usize,
    cache: HashMap<PageNum, PageHandle>,
    recency: VecDeque<PageNum>,
}

impl Pager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CACHE_CAPACITY)
    }

    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();

        let mut pager = if len == 0 {
            debug!(?path, "initializing new database file");
            let header = FileHeader::fresh();
            let mut page0 = Page::zeroed(0);
            header.write_into(&mut page0);
            let mut cache = HashMap::new();
            cache.insert(0, Rc::new(RefCell::new(page0)));
            Pager {
                file,
                header,
                header_dirty: false,
                capacity,
                cache,
                recency: VecDeque::from([0]),
            }
        } else {
            let mut buf = [0u8; FILE_HEADER_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf).map_err(|_| Error::ShortHeader)?;
            let header = FileHeader::decode(&buf)?;
            debug!(?path, next_free_page = header.next_free_page, "opened existing database file");
            Pager {
                file,
                header,
                header_dirty: false,
                capacity,
                cache: HashMap::new(),
                recency: VecDeque::new(),
            }
        };

        // Always pull page 0 into cache up front: the catalog root is
        // touched on virtually every operation.
        if !pager.cache.contains_key(&0) {
            pager.load_page(0)?;
        }
        Ok(pager)
    }

    pub fn next_free_page(&self) -> PageNum {
        self.header.next_free_page
    }

    fn touch(&mut self, num: PageNum) {
        self.recency.retain(|&n| n != num);
        self.recency.push_back(num);
    }

    fn load_page(&mut self, num: PageNum) -> Result<()> {
        let offset = num as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();
        let page = if offset >= file_len {
            Page::zeroed(num)
        } else {
            let mut buf = [0u8; PAGE_SIZE];
            self.file.seek(SeekFrom::Start(offset))?;
            let read = self.file.read(&mut buf)?;
            if read < PAGE_SIZE {
                trace!(page = num, read, "short page read, zero-filling the remainder");
            }
            Page::from_bytes(num, buf)
        };
        self.evict_if_needed()?;
        self.cache.insert(num, Rc::new(RefCell::new(page)));
        self.touch(num);
        Ok(())
    }

    fn evict_if_needed(&mut self) -> Result<()> {
        if self.cache.len() < self.capacity {
            return Ok(());
        }
        let candidate = self
            .recency
            .iter()
            .copied()
            .find(|num| *num != 0 && self.cache.get(num).map_or(false, |h| Rc::strong_count(h) == 1));
        let Some(victim) = candidate else {
            // Every cached page is either pinned or page 0; grow past
            // capacity rather than fail outright.
            return Ok(());
        };
        self.flush_page(victim)?;
        self.cache.remove(&victim);
        self.recency.retain(|&n| n != victim);
        Ok(())
    }

    /// Hands out the page for `num`, loading it from disk (or a fresh
    /// zeroed buffer past the end of the file) if it isn't cached.
    pub fn get_page(&mut self, num: PageNum) -> Result<PageHandle> {
        if !self.cache.contains_key(&num) {
            self.load_page(num)?;
        }
        self.touch(num);
        Ok(Rc::clone(&self.cache[&num]))
    }

    /// Allocates a fresh page number and hands back its (zeroed) page.
    /// The caller is responsible for initializing it as a leaf or
    /// internal node before it is visible to anything else.
    pub fn new_page(&mut self) -> Result<(PageNum, PageHandle)> {
        let num = self.header.next_free_page;
        self.header.next_free_page += 1;
        self.header_dirty = true;
        self.evict_if_needed()?;
        let handle = Rc::new(RefCell::new(Page::zeroed(num)));
        self.cache.insert(num, Rc::clone(&handle));
        self.touch(num);
        Ok((num, handle))
    }

    fn flush_page(&mut self, num: PageNum) -> Result<()> {
        let handle = match self.cache.get(&num) {
            Some(h) => h,
            None => return Ok(()),
        };
        let mut guard = handle
            .try_borrow_mut()
            .map_err(|_| Error::PagePinned(num))?;
        // The header can change (`next_free_page` bumped by `new_page`)
        // without page 0's node body being touched, so its flush can't
        // be gated on `guard.dirty` alone.
        let header_needs_flush = num == 0 && self.header_dirty;
        if !guard.dirty && !header_needs_flush {
            return Ok(());
        }
        if num == 0 {
            self.header.write_into(&mut guard);
        }
        let offset = num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(guard.as_slice())?;
        guard.dirty = false;
        if num == 0 {
            self.header_dirty = false;
        }
        Ok(())
    }

    /// Writes every dirty page (and the header) back to disk and
    /// issues an OS-level sync.
    pub fn flush_all(&mut self) -> Result<()> {
        let nums: Vec<PageNum> = self.cache.keys().copied().collect();
        for num in nums {
            self.flush_page(num)?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush_all()?;
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            warn!(?err, "failed to flush pager on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn fresh_file_gets_a_valid_header_and_page_zero() {
        let tmp = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(tmp.path()).unwrap();
        assert_eq!(pager.next_free_page(), 1);
        let page0 = pager.get_page(0).unwrap();
        assert!(!page0.borrow().dirty || page0.borrow().dirty);
    }

    #[test]
    fn new_page_numbers_increase_and_persist_across_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            let (first, _) = pager.new_page().unwrap();
            let (second, _) = pager.new_page().unwrap();
            assert_eq!(first, 1);
            assert_eq!(second, 2);
            pager.flush_all().unwrap();
        }
        let pager = Pager::open(tmp.path()).unwrap();
        assert_eq!(pager.next_free_page(), 3);
    }

    #[test]
    fn header_survives_a_flush_with_no_other_page_zero_write() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            // A mid-session checkpoint, as an autocommit collaborator
            // might issue after each statement.
            pager.flush_all().unwrap();
            // Allocate pages without touching page 0's node body again,
            // then checkpoint a second time in the same session.
            let (a, _) = pager.new_page().unwrap();
            let (b, _) = pager.new_page().unwrap();
            assert_eq!((a, b), (1, 2));
            pager.flush_all().unwrap();
        }
        let mut pager = Pager::open(tmp.path()).unwrap();
        assert_eq!(pager.next_free_page(), 3);
        // The next allocation must not reuse a page number handed out
        // before the reopen.
        let (fresh, _) = pager.new_page().unwrap();
        assert_eq!(fresh, 3);
    }

    #[test]
    fn rejects_bad_magic() {
        use std::io::Write as _;
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; PAGE_SIZE]).unwrap();
        let err = Pager::open(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::BadMagic));
    }

    #[test]
    fn written_pages_survive_a_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            let (num, handle) = pager.new_page().unwrap();
            handle.borrow_mut().write_u64(0, 0xCAFE_BABE);
            pager.flush_all().unwrap();
            assert_eq!(num, 1);
        }
        let mut pager = Pager::open(tmp.path()).unwrap();
        let handle = pager.get_page(1).unwrap();
        assert_eq!(handle.borrow().read_u64(0), 0xCAFE_BABE);
    }
}
