//! Codec registry
//!
//! Built-in codecs are registered once, in a fixed order, the first time a
//! registry is used. Lookups ask codecs in registration order and hand
//! back the first one that accepts the path.

use std::path::Path;
use std::sync::{Once, OnceLock, PoisonError, RwLock};
use tracing::{debug, info};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::formats::{BsqCodec, ImageCodec, LumCodec, MstarCodec, OneraCodec, RadCodec};
use crate::types::Region;

/// Builds a fresh codec instance
pub type CodecFactory = fn(CodecOptions) -> Box<dyn ImageCodec>;

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    factory: CodecFactory,
}

/// Ordered set of codec factories
pub struct CodecRegistry {
    entries: RwLock<Vec<Entry>>,
    builtins: Once,
    options: CodecOptions,
}

static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();

impl CodecRegistry {
    /// Registry whose codecs use default options
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    /// Registry whose codecs are created with `options`
    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            builtins: Once::new(),
            options,
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static CodecRegistry {
        let registry = GLOBAL.get_or_init(CodecRegistry::new);
        registry.ensure_initialized();
        registry
    }

    /// Registers the built-in codecs exactly once
    pub fn ensure_initialized(&self) {
        self.builtins.call_once(|| {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let builtins: [Entry; 5] = [
                Entry { name: "ONERA", factory: |o| Box::new(OneraCodec::with_options(o)) },
                Entry { name: "MSTAR", factory: |o| Box::new(MstarCodec::with_options(o)) },
                Entry { name: "LUM", factory: |o| Box::new(LumCodec::with_options(o)) },
                Entry { name: "BSQ", factory: |o| Box::new(BsqCodec::with_options(o)) },
                Entry { name: "RAD", factory: |o| Box::new(RadCodec::with_options(o)) },
            ];
            entries.extend(builtins);
            info!(count = builtins.len(), "registered built-in codecs");
        });
    }

    /// Appends a codec after those already registered
    pub fn register(&self, name: &'static str, factory: CodecFactory) {
        self.ensure_initialized();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(Entry { name, factory });
        debug!(name, "registered codec");
    }

    /// Names of the registered codecs, in lookup order
    pub fn names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|e| e.name).collect()
    }

    fn snapshot(&self) -> Vec<Entry> {
        self.ensure_initialized();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find(&self, path: &Path, accepts: impl Fn(&dyn ImageCodec, &Path) -> bool) -> Option<Box<dyn ImageCodec>> {
        for entry in self.snapshot() {
            let mut codec = (entry.factory)(self.options);
            if accepts(codec.as_ref(), path) {
                debug!(codec = entry.name, path = %path.display(), "codec selected");
                codec.set_file_name(path);
                return Some(codec);
            }
        }
        debug!(path = %path.display(), "no codec accepted path");
        None
    }

    /// First codec able to read `path`, with its file name set
    pub fn create_for_read(&self, path: &Path) -> Option<Box<dyn ImageCodec>> {
        self.find(path, |codec, path| codec.can_read(path))
    }

    /// First codec able to write `path`, with its file name set
    pub fn create_for_write(&self, path: &Path) -> Option<Box<dyn ImageCodec>> {
        self.find(path, |codec, path| codec.can_write(path))
    }

    /// Opens `path` for reading
    ///
    /// The header is parsed and the region is set to the whole image.
    pub fn open(&self, path: &Path) -> Result<Box<dyn ImageCodec>> {
        let mut codec = self
            .create_for_read(path)
            .ok_or_else(|| Error::NoCodec(path.to_path_buf()))?;
        codec.read_image_information()?;
        let full = Region::full(codec.metadata().dimensions);
        codec.set_region(full);
        Ok(codec)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::test_support::{temp_dir, write_file};
    use crate::formats::CodecState;
    use crate::types::{ComponentType, Dimensions};

    struct AnyCodec {
        state: CodecState,
    }

    impl ImageCodec for AnyCodec {
        fn name(&self) -> &'static str {
            "ANY"
        }

        fn state(&self) -> &CodecState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut CodecState {
            &mut self.state
        }

        fn can_read(&self, _path: &Path) -> bool {
            true
        }

        fn read_image_information(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, _buffer: &mut [u8]) -> Result<()> {
            Ok(())
        }
    }

    fn any_codec(options: CodecOptions) -> Box<dyn ImageCodec> {
        Box::new(AnyCodec {
            state: CodecState::new(options),
        })
    }

    #[test]
    fn test_builtin_order() {
        let registry = CodecRegistry::new();
        assert_eq!(registry.names(), vec!["ONERA", "MSTAR", "LUM", "BSQ", "RAD"]);
        registry.ensure_initialized();
        assert_eq!(registry.names().len(), 5);
    }

    #[test]
    fn test_global_is_shared() {
        let a = CodecRegistry::global() as *const CodecRegistry;
        let b = CodecRegistry::global() as *const CodecRegistry;
        assert_eq!(a, b);
        assert_eq!(&CodecRegistry::global().names()[..5], &["ONERA", "MSTAR", "LUM", "BSQ", "RAD"]);
    }

    #[test]
    fn test_concurrent_first_use_registers_once() {
        let registry = CodecRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| registry.ensure_initialized());
            }
        });
        assert_eq!(registry.names().len(), 5);
    }

    #[test]
    fn test_register_appends_after_builtins() {
        let registry = CodecRegistry::new();
        registry.register("ANY", any_codec);
        assert_eq!(registry.names().last(), Some(&"ANY"));

        let dir = temp_dir();
        let path = write_file(dir.path(), "unknown.bin", b"nothing");
        let codec = registry.create_for_read(&path).unwrap();
        assert_eq!(codec.name(), "ANY");
        assert_eq!(codec.file_name(), path.as_path());
    }

    #[test]
    fn test_open_unknown_is_no_codec() {
        let dir = temp_dir();
        let path = write_file(dir.path(), "unknown.bin", b"nothing");
        let registry = CodecRegistry::new();
        assert!(matches!(registry.open(&path), Err(Error::NoCodec(_))));
    }

    #[test]
    fn test_open_lum() {
        let dir = temp_dir();
        let mut bytes = vec![0u8; 12];
        bytes[0..4].copy_from_slice(&2i32.to_be_bytes());
        bytes[4..8].copy_from_slice(&3i32.to_be_bytes());
        bytes[8..12].copy_from_slice(b"08BU");
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let path = write_file(dir.path(), "small.lum", &bytes);

        let mut codec = CodecRegistry::new().open(&path).unwrap();
        assert_eq!(codec.name(), "LUM");
        assert_eq!(codec.metadata().dimensions, Dimensions::new(2, 3));
        assert_eq!(codec.region(), Region::new(0, 0, 2, 3));
        let mut buffer = vec![0u8; 6];
        codec.read(&mut buffer).unwrap();
        assert_eq!(buffer, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_create_for_write_picks_by_extension() {
        let dir = temp_dir();
        let registry = CodecRegistry::new();
        let cases = [("a.ent", "ONERA"), ("a.lum", "LUM"), ("a.hd", "BSQ"), ("a.rad", "RAD")];
        for (name, expected) in cases {
            let codec = registry.create_for_write(&dir.path().join(name)).unwrap();
            assert_eq!(codec.name(), expected);
        }
        assert!(registry.create_for_write(&dir.path().join("a.tif")).is_none());
    }

    #[test]
    fn test_options_reach_codecs() {
        let dir = temp_dir();
        let options = CodecOptions::new().parallel_swap_threshold(0);
        let registry = CodecRegistry::with_options(options);
        let mut codec = registry.create_for_write(&dir.path().join("x.lum")).unwrap();
        assert_eq!(codec.state().options, options);

        codec.metadata_mut().dimensions = Dimensions::new(2, 1);
        codec.metadata_mut().component_type = ComponentType::UShort;
        codec.set_region(Region::new(0, 0, 2, 1));
        codec.write(&[1, 0, 2, 0]).unwrap();
    }
}
