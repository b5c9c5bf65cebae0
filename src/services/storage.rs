//! Storage stream backends.
//!
//! The engine talks to external files only through [`Storage`] and
//! [`StreamHandle`]: open a named stream, move bytes in chunks, seek, close.
//! [`LocalStorage`] maps names to paths on the local filesystem;
//! [`MemoryStorage`] keeps files in memory and can inject failures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::rc::Rc;

/// How a stream is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate
    Write,
    /// Create or append
    Append,
}

/// An open stream
pub trait StreamHandle {
    /// Read up to `buf.len()` bytes; 0 means end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write bytes, returning how many were accepted.
    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize>;

    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Flush and release the stream.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// A namespace of streams
pub trait Storage {
    /// Open a stream; a missing file opened for reading fails with
    /// `io::ErrorKind::NotFound`.
    fn open(&self, name: &str, mode: OpenMode) -> io::Result<Box<dyn StreamHandle>>;

    fn exists(&self, name: &str) -> bool;
}

/// Local filesystem storage; names are paths, relative ones resolved against
/// an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    base: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        match &self.base {
            Some(base) => base.join(name),
            None => PathBuf::from(name),
        }
    }
}

struct LocalStream {
    file: File,
}

impl StreamHandle for LocalStream {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.file.write(bytes)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut file = self.file;
        file.flush()?;
        file.sync_all()
    }
}

impl Storage for LocalStorage {
    fn open(&self, name: &str, mode: OpenMode) -> io::Result<Box<dyn StreamHandle>> {
        let path = self.resolve(name);
        let file = match mode {
            OpenMode::Read => File::open(&path)?,
            OpenMode::Write => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?,
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(&path)?,
        };
        tracing::trace!("opened {} ({:?})", path.display(), mode);
        Ok(Box::new(LocalStream { file }))
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).exists()
    }
}

#[derive(Debug, Default)]
struct MemFiles {
    files: HashMap<String, Vec<u8>>,
    /// Remaining successful `write_chunk` calls before writes fail.
    writes_left: Option<usize>,
    /// Remaining successful `read_chunk` calls before reads fail.
    reads_left: Option<usize>,
    /// Largest number of bytes a single write accepts.
    write_limit: Option<usize>,
}

/// In-memory storage, cheap to clone; clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemFiles>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.inner
            .borrow_mut()
            .files
            .insert(name.to_string(), bytes.into());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.borrow().files.get(name).cloned()
    }

    /// Let `n` more chunk writes succeed, then fail every write.
    pub fn fail_writes_after(&self, n: usize) {
        self.inner.borrow_mut().writes_left = Some(n);
    }

    /// Let `n` more chunk reads succeed, then fail every read.
    pub fn fail_reads_after(&self, n: usize) {
        self.inner.borrow_mut().reads_left = Some(n);
    }

    /// Accept at most `limit` bytes per write, producing short writes.
    pub fn limit_writes_to(&self, limit: usize) {
        self.inner.borrow_mut().write_limit = Some(limit);
    }
}

struct MemStream {
    name: String,
    pos: usize,
    files: Rc<RefCell<MemFiles>>,
}

fn take_budget(budget: &mut Option<usize>) -> io::Result<()> {
    match budget {
        Some(0) => Err(io::Error::new(io::ErrorKind::Other, "injected failure")),
        Some(n) => {
            *n -= 1;
            Ok(())
        }
        None => Ok(()),
    }
}

impl StreamHandle for MemStream {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut files = self.files.borrow_mut();
        take_budget(&mut files.reads_left)?;
        let data = files.files.get(&self.name).map(Vec::as_slice).unwrap_or(&[]);
        let start = self.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n;
        Ok(n)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut files = self.files.borrow_mut();
        take_budget(&mut files.writes_left)?;
        let n = files.write_limit.map_or(bytes.len(), |l| l.min(bytes.len()));
        let data = files.files.entry(self.name.clone()).or_default();
        if data.len() < self.pos + n {
            data.resize(self.pos + n, 0);
        }
        data[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset as usize;
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn open(&self, name: &str, mode: OpenMode) -> io::Result<Box<dyn StreamHandle>> {
        let mut files = self.inner.borrow_mut();
        let pos = match mode {
            OpenMode::Read => {
                if !files.files.contains_key(name) {
                    return Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()));
                }
                0
            }
            OpenMode::Write => {
                files.files.insert(name.to_string(), Vec::new());
                0
            }
            OpenMode::Append => files.files.entry(name.to_string()).or_default().len(),
        };
        Ok(Box::new(MemStream {
            name: name.to_string(),
            pos,
            files: Rc::clone(&self.inner),
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.borrow().files.contains_key(name)
    }
}
