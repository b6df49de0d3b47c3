//! Raster format codecs
//!
//! Every format implements [`ImageCodec`]. The trait carries default
//! answers for the capabilities most formats share (single overview, stream
//! reading, no writing) so a codec only provides its file check, its header
//! parser and its region transfer.

pub mod header;
pub mod bsq;
pub mod lum;
pub mod mstar;
pub mod onera;
pub mod rad;

use std::path::{Path, PathBuf};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::types::{RasterMetadata, Region};

pub use bsq::BsqCodec;
pub use lum::LumCodec;
pub use mstar::MstarCodec;
pub use onera::OneraCodec;
pub use rad::RadCodec;

/// State every codec keeps for its open file session
#[derive(Debug, Clone, Default)]
pub struct CodecState {
    /// Path of the main file; empty until set
    pub file_name: PathBuf,
    /// Image description, filled by the header parser or by the caller
    pub metadata: RasterMetadata,
    /// Region transferred by the next read or write
    pub region: Region,
    /// Options the codec was created with
    pub options: CodecOptions,
}

impl CodecState {
    /// Empty state carrying `options`
    pub fn new(options: CodecOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Validates the current region against the image and a caller buffer
    ///
    /// Returns the region and the number of buffer bytes it covers.
    pub fn checked_region(&self, buffer_len: usize) -> Result<(Region, usize)> {
        let region = self.region;
        region.validate(self.metadata.dimensions)?;
        let expected = self.metadata.region_size_in_bytes(&region).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "region of {} x {} pixels is too large",
                region.width(),
                region.height()
            ))
        })?;
        if buffer_len < expected {
            return Err(Error::BufferSize {
                expected,
                actual: buffer_len,
            });
        }
        Ok((region, expected))
    }

    /// Fails unless a file name has been set
    pub fn require_file_name(&self, format: &str) -> Result<&Path> {
        if self.file_name.as_os_str().is_empty() {
            return Err(Error::InvalidFormat(format!(
                "{}: a file name must be specified",
                format
            )));
        }
        Ok(&self.file_name)
    }
}

/// Capability interface of a raster format codec
pub trait ImageCodec: Send {
    /// Short format name, e.g. "LUM"
    fn name(&self) -> &'static str;

    /// Shared session state
    fn state(&self) -> &CodecState;

    /// Mutable shared session state
    fn state_mut(&mut self) -> &mut CodecState;

    /// Whether this codec can read `path`; never fails
    fn can_read(&self, path: &Path) -> bool;

    /// Whether this codec can create `path`; never fails
    fn can_write(&self, _path: &Path) -> bool {
        false
    }

    /// Whether regions can be read without loading the whole image
    fn can_stream_read(&self) -> bool {
        true
    }

    /// Whether regions can be written one at a time
    fn can_stream_write(&self) -> bool {
        false
    }

    /// Parses the header of the current file into the metadata
    fn read_image_information(&mut self) -> Result<()>;

    /// Reads the current region into `buffer` as host-order interleaved pixels
    fn read(&mut self, buffer: &mut [u8]) -> Result<()>;

    /// Creates the file(s) described by the metadata
    fn write_image_information(&mut self) -> Result<()> {
        Err(Error::NotImplemented("write_image_information"))
    }

    /// Writes `buffer` (host-order interleaved pixels) at the current region
    fn write(&mut self, _buffer: &[u8]) -> Result<()> {
        Err(Error::NotImplemented("write"))
    }

    /// Number of resolution levels, the full image included
    fn overviews_count(&self) -> usize {
        1
    }

    /// Descriptions of the reduced resolution levels
    fn overviews_info(&self) -> Vec<String> {
        Vec::new()
    }

    fn file_name(&self) -> &Path {
        &self.state().file_name
    }

    fn set_file_name(&mut self, path: &Path) {
        self.state_mut().file_name = path.to_path_buf();
    }

    fn metadata(&self) -> &RasterMetadata {
        &self.state().metadata
    }

    /// Mutable metadata, used to describe an image before writing it
    fn metadata_mut(&mut self) -> &mut RasterMetadata {
        &mut self.state_mut().metadata
    }

    fn region(&self) -> Region {
        self.state().region
    }

    fn set_region(&mut self, region: Region) {
        self.state_mut().region = region;
    }
}

/// Case-insensitive check of the last extension of `path`
pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// File stem of `path` as a string
pub(crate) fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixture helpers shared by the codec tests

    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Installs a test subscriber once; later calls are no-ops
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    pub fn temp_dir() -> TempDir {
        init_logging();
        tempfile::tempdir().unwrap()
    }

    pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn f32s(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn u16s(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    struct NullCodec {
        state: CodecState,
    }

    impl ImageCodec for NullCodec {
        fn name(&self) -> &'static str {
            "NULL"
        }

        fn state(&self) -> &CodecState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut CodecState {
            &mut self.state
        }

        fn can_read(&self, _path: &Path) -> bool {
            false
        }

        fn read_image_information(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, _buffer: &mut [u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_capabilities() {
        let mut codec = NullCodec {
            state: CodecState::default(),
        };
        assert!(!codec.can_write(Path::new("x")));
        assert!(codec.can_stream_read());
        assert!(!codec.can_stream_write());
        assert_eq!(codec.overviews_count(), 1);
        assert!(codec.overviews_info().is_empty());
        assert!(matches!(codec.write(&[]), Err(Error::NotImplemented(_))));
        assert!(matches!(
            codec.write_image_information(),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_state_accessors() {
        let mut codec = NullCodec {
            state: CodecState::default(),
        };
        codec.set_file_name(Path::new("/data/a.lum"));
        codec.set_region(Region::new(1, 2, 3, 4));
        codec.metadata_mut().dimensions = Dimensions::new(10, 10);
        assert_eq!(codec.file_name(), Path::new("/data/a.lum"));
        assert_eq!(codec.region(), Region::new(1, 2, 3, 4));
        assert_eq!(codec.metadata().dimensions.width, 10);
    }

    #[test]
    fn test_checked_region() {
        let mut state = CodecState::default();
        state.metadata.dimensions = Dimensions::new(4, 4);
        state.region = Region::new(0, 0, 2, 2);
        assert_eq!(state.checked_region(4).unwrap().1, 4);
        assert!(matches!(
            state.checked_region(3),
            Err(Error::BufferSize { expected: 4, actual: 3 })
        ));

        state.region = Region::new(3, 0, 2, 1);
        assert!(matches!(state.checked_region(100), Err(Error::OutOfBounds(_))));
    }

    #[test]
    fn test_checked_region_too_large() {
        let mut state = CodecState::default();
        state.metadata.dimensions = Dimensions::new(1 << 32, 1 << 32);
        state.region = Region::full(state.metadata.dimensions);
        assert!(matches!(state.checked_region(usize::MAX), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_require_file_name() {
        let state = CodecState::default();
        assert!(state.require_file_name("LUM").is_err());
    }

    #[test]
    fn test_path_helpers() {
        assert!(has_extension(Path::new("a/b.LUM"), "lum"));
        assert!(!has_extension(Path::new("a/b.lumx"), "lum"));
        assert!(!has_extension(Path::new("a/b"), "lum"));
        assert_eq!(stem(Path::new("a/scene.rad")), "scene");
    }
}
