//! Format registry and the read/write entry points.
//!
//! A [`CoderRegistry`] is an ordinary value: build one (usually with
//! [`CoderRegistry::with_defaults`]) and pass it to whatever opens images.
//! Nothing is registered globally.

use std::sync::Arc;

use enough::Stop;
use log::{debug, trace};

use crate::blob::{BlobSink, BlobStore, SliceStore, VecSink};
use crate::coders::farbfeld::FarbfeldCoder;
use crate::coders::raw::{RawCoder, RawVariant};
use crate::error::{DecodeError, RawError};
use crate::image::ImageList;
use crate::info::ImageInfo;
use crate::interlace::Interlace;

/// Registration record for one format tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoderInfo {
    /// Upper-case tag, e.g. `BGRA`.
    pub name: String,
    pub description: String,
    /// Several frames may share one blob.
    pub adjoin: bool,
    /// No embedded header: geometry must come from [`ImageInfo::size`].
    pub raw: bool,
    /// Honours [`ImageInfo::endian`].
    pub endian_support: bool,
    /// Works on in-memory blobs.
    pub blob_support: bool,
    pub seekable_stream: bool,
    pub decoder: bool,
    pub encoder: bool,
}

impl CoderInfo {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            description: description.to_string(),
            adjoin: true,
            raw: false,
            endian_support: false,
            blob_support: true,
            seekable_stream: false,
            decoder: true,
            encoder: true,
        }
    }
}

/// One image format.
pub trait Codec: Send + Sync {
    fn info(&self) -> &CoderInfo;

    /// Decode every selected frame of `info.filename` from `store`.
    fn decode(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
        stop: &dyn Stop,
    ) -> Result<ImageList, DecodeError>;

    /// Encode `images` into `sink` under `info.filename`.
    fn encode(
        &self,
        info: &ImageInfo,
        images: &ImageList,
        sink: &mut dyn BlobSink,
        stop: &dyn Stop,
    ) -> Result<(), RawError>;

    /// Whether `header` (the first bytes of a blob) is in this format.
    fn sniff(&self, header: &[u8]) -> bool {
        let _ = header;
        false
    }
}

/// Format tag to codec.
#[derive(Clone, Default)]
pub struct CoderRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl core::fmt::Debug for CoderRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|c| &c.info().name))
            .finish()
    }
}

impl CoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every raw variant plus farbfeld.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for variant in RawVariant::ALL {
            registry.register(RawCoder::new(variant));
        }
        registry.register(FarbfeldCoder::new());
        registry
    }

    /// Add `codec`, replacing any codec already registered under its tag.
    pub fn register(&mut self, codec: impl Codec + 'static) {
        let name = codec.info().name.clone();
        self.codecs.retain(|c| c.info().name != name);
        debug!("registering format {name}");
        self.codecs.push(Arc::new(codec));
    }

    /// Codec for `tag`, case-insensitively.
    pub fn get(&self, tag: &str) -> Option<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.info().name.eq_ignore_ascii_case(tag))
            .map(|c| c.as_ref())
    }

    /// First codec whose sniffer accepts `header`.
    pub fn detect(&self, header: &[u8]) -> Option<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.sniff(header))
            .map(|c| c.as_ref())
    }

    /// Registration records, in registration order.
    pub fn formats(&self) -> impl Iterator<Item = &CoderInfo> {
        self.codecs.iter().map(|c| c.info())
    }

    fn decoder_for(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
    ) -> Result<&dyn Codec, RawError> {
        let codec = if info.magick.is_empty() {
            let data = store.read(&info.filename)?;
            self.detect(&data)
                .ok_or_else(|| RawError::NoDecoder(info.filename.clone()))?
        } else {
            self.get(&info.magick)
                .ok_or_else(|| RawError::NoDecoder(info.magick.clone()))?
        };
        if !codec.info().decoder {
            return Err(RawError::NoDecoder(codec.info().name.clone()));
        }
        Ok(codec)
    }

    fn encoder_for(&self, info: &ImageInfo) -> Result<&dyn Codec, RawError> {
        self.get(&info.magick)
            .filter(|c| c.info().encoder)
            .ok_or_else(|| RawError::NoEncoder(info.magick.clone()))
    }

    /// Decode `info.filename` from `store`. The format comes from
    /// `info.magick`, or from sniffing the blob when that is empty.
    pub fn read_image(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
        stop: &dyn Stop,
    ) -> Result<ImageList, DecodeError> {
        trace!("read_image `{}' as {:?}", info.filename, info.magick);
        let codec = self.decoder_for(info, store)?;
        codec.decode(info, store, stop)
    }

    /// Decode an in-memory blob. Partition interlace needs named blobs and
    /// is refused.
    pub fn read_blob(
        &self,
        info: &ImageInfo,
        data: &[u8],
        stop: &dyn Stop,
    ) -> Result<ImageList, DecodeError> {
        if info.interlace == Interlace::Partition {
            return Err(RawError::InvalidOption(
                "partition interlace needs named blobs".into(),
            )
            .into());
        }
        let store = SliceStore(data);
        let codec = self.decoder_for(info, &store)?;
        if !codec.info().blob_support {
            return Err(RawError::NoDecoder(codec.info().name.clone()).into());
        }
        codec.decode(info, &store, stop)
    }

    /// Encode `images` into `sink`. The format comes from `info.magick`.
    pub fn write_image(
        &self,
        info: &ImageInfo,
        images: &ImageList,
        sink: &mut dyn BlobSink,
        stop: &dyn Stop,
    ) -> Result<(), RawError> {
        trace!("write_image `{}' as {}", info.filename, info.magick);
        self.encoder_for(info)?.encode(info, images, sink, stop)
    }

    /// Encode `images` into one in-memory blob. Refuses partition interlace.
    pub fn write_blob(
        &self,
        info: &ImageInfo,
        images: &ImageList,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, RawError> {
        if info.interlace == Interlace::Partition {
            return Err(RawError::InvalidOption(
                "partition interlace needs named blobs".into(),
            ));
        }
        let codec = self.encoder_for(info)?;
        if !codec.info().blob_support {
            return Err(RawError::NoEncoder(codec.info().name.clone()));
        }
        let mut sink = VecSink::default();
        codec.encode(info, images, &mut sink, stop)?;
        Ok(sink.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use enough::Unstoppable;

    #[test]
    fn defaults_cover_the_raw_family() {
        let registry = CoderRegistry::with_defaults();
        for tag in ["BGR", "bgra", "Bgro", "RGB", "RGBA", "RGBO", "GRAY", "CMYK", "CMYKA", "FARBFELD"] {
            assert!(registry.get(tag).is_some(), "{tag}");
        }
        assert!(registry.get("PNG").is_none());
        let bgr = registry.get("BGR").unwrap().info();
        assert!(bgr.raw && bgr.endian_support && bgr.adjoin && bgr.blob_support);
    }

    #[test]
    fn register_replaces_same_tag() {
        let mut registry = CoderRegistry::with_defaults();
        let before = registry.formats().count();
        registry.register(RawCoder::new(RawVariant::Bgr));
        assert_eq!(registry.formats().count(), before);
    }

    #[test]
    fn detect_only_self_describing_formats() {
        let registry = CoderRegistry::with_defaults();
        let header = b"farbfeld\0\0\0\x01\0\0\0\x01";
        assert_eq!(registry.detect(header).unwrap().info().name, "FARBFELD");
        assert!(registry.detect(&[0u8; 16]).is_none());
    }

    #[test]
    fn unknown_format_is_missing_delegate() {
        let registry = CoderRegistry::with_defaults();
        let info = ImageInfo::new("XYZ").with_filename("a.xyz");
        let err = registry.read_blob(&info, &[0u8; 4], &Unstoppable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDelegate);
        let err = registry
            .write_blob(&info, &ImageList::new(), &Unstoppable)
            .unwrap_err();
        assert!(matches!(err, RawError::NoEncoder(_)));
    }

    #[test]
    fn blob_entry_points_refuse_partition() {
        let registry = CoderRegistry::with_defaults();
        let info = ImageInfo::new("BGR").with_interlace(Interlace::Partition);
        let err = registry.read_blob(&info, &[0u8; 3], &Unstoppable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Option);
    }
}
