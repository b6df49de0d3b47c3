//! skyforest-codecs - Raster codecs for SAR and satellite imagery formats
//!
//! skyforest-codecs reads and writes the ad-hoc binary raster formats found
//! in satellite and SAR archives: ONERA, MSTAR, LUM, BSQ and RAD. Every
//! format sits behind the [`ImageCodec`] trait and is discovered through a
//! [`CodecRegistry`], which tries formats in a fixed order.
//!
//! # Examples
//!
//! ## Reading a region
//!
//! ```no_run
//! use std::path::Path;
//! use skyforest_codecs::{CodecRegistry, Region};
//!
//! let mut codec = CodecRegistry::global().open(Path::new("scene.lum"))?;
//! let meta = codec.metadata().clone();
//! println!("{} x {} {}", meta.dimensions.width, meta.dimensions.height, meta.component_type.name());
//!
//! let region = Region::new(0, 0, 64, 64);
//! codec.set_region(region);
//! let len = meta
//!     .region_size_in_bytes(&region)
//!     .ok_or_else(|| skyforest_codecs::Error::InvalidFormat("region too large".into()))?;
//! let mut buffer = vec![0u8; len];
//! codec.read(&mut buffer)?;
//! # Ok::<(), skyforest_codecs::Error>(())
//! ```
//!
//! ## Writing a file
//!
//! ```no_run
//! use std::path::Path;
//! use skyforest_codecs::{CodecRegistry, ComponentType, Dimensions, Error, Region};
//!
//! let path = Path::new("out.hd");
//! let mut codec = CodecRegistry::global()
//!     .create_for_write(path)
//!     .ok_or_else(|| Error::NoCodec(path.to_path_buf()))?;
//! let meta = codec.metadata_mut();
//! meta.dimensions = Dimensions::new(256, 256);
//! meta.component_type = ComponentType::Float;
//! meta.number_of_components = 3;
//! codec.write_image_information()?;
//!
//! let pixels = vec![0u8; 256 * 256 * 3 * 4];
//! codec.set_region(Region::new(0, 0, 256, 256));
//! codec.write(&pixels)?;
//! # Ok::<(), skyforest_codecs::Error>(())
//! ```

pub mod io;
pub mod error;
pub mod types;
pub mod config;
pub mod formats;
pub mod registry;

pub use error::{Error, Result};
pub use types::{ComponentType, Dimensions, PixelType, RasterMetadata, Region};
pub use config::CodecOptions;
pub use formats::{BsqCodec, CodecState, ImageCodec, LumCodec, MstarCodec, OneraCodec, RadCodec};
pub use io::ByteOrder;
pub use registry::{CodecFactory, CodecRegistry};
