//! Byte sources and sinks for the coders.
//!
//! A coder reads its main stream (and any partition blobs) through a
//! [`BlobStore`] and writes through a [`BlobSink`]. Both address blobs by
//! name, so partition interlace can reach `<filename>R`, `<filename>G`, ...
//! next to the main stream.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::trace;

use crate::error::RawError;

/// Forward-only cursor over an in-memory blob.
#[derive(Clone, Debug)]
pub struct BlobReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BlobReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Up to `length` bytes from the current position, borrowed from the
    /// blob. Shorter only at end of blob.
    pub fn read_stream(&mut self, length: usize) -> &'a [u8] {
        let end = self.position.saturating_add(length).min(self.data.len());
        let bytes = &self.data[self.position..end];
        self.position = end;
        bytes
    }

    /// Skip `count` bytes. `false` (with the cursor at end of blob) if fewer
    /// remain.
    pub fn discard(&mut self, count: usize) -> bool {
        let available = self.remaining();
        self.position += count.min(available);
        count <= available
    }

    /// Current offset from the start of the blob.
    pub fn tell(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Named blobs a decoder may open.
pub trait BlobStore {
    /// The whole contents of blob `name`.
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>, RawError>;
}

/// Named blobs an encoder writes. Writing a name again replaces it.
pub trait BlobSink {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), RawError>;
}

/// Blobs are files; names are paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStore;

impl BlobStore for FileStore {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>, RawError> {
        trace!("reading file `{name}'");
        fs::read(Path::new(name))
            .map(Cow::Owned)
            .map_err(|e| RawError::FileOpen {
                filename: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl BlobSink for FileStore {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), RawError> {
        trace!("writing {} bytes to `{name}'", data.len());
        fs::write(Path::new(name), data).map_err(|e| RawError::FileOpen {
            filename: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-memory blobs by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.blobs.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.blobs
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>, RawError> {
        self.get(name)
            .map(Cow::Borrowed)
            .ok_or_else(|| RawError::FileOpen {
                filename: name.to_string(),
                reason: "no such blob".to_string(),
            })
    }
}

impl BlobSink for MemoryStore {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), RawError> {
        self.blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }
}

/// One anonymous in-memory blob, returned for every name.
#[derive(Clone, Copy, Debug)]
pub struct SliceStore<'a>(pub &'a [u8]);

impl BlobStore for SliceStore<'_> {
    fn read(&self, _name: &str) -> Result<Cow<'_, [u8]>, RawError> {
        Ok(Cow::Borrowed(self.0))
    }
}

/// Collects everything written under any name into one buffer, in order.
#[derive(Clone, Debug, Default)]
pub(crate) struct VecSink(pub Vec<u8>);

impl BlobSink for VecSink {
    fn write(&mut self, _name: &str, data: &[u8]) -> Result<(), RawError> {
        self.0.extend_from_slice(data);
        Ok(())
    }
}
