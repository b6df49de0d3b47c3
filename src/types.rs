//! Core raster description types

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::io::ByteOrder;

/// Scalar storage type of one pixel component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// Unsigned 8-bit integer
    UChar,
    /// Signed 8-bit integer
    Char,
    /// Unsigned 16-bit integer
    UShort,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 32-bit integer
    UInt,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 64-bit integer
    ULong,
    /// Signed 64-bit integer
    Long,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
}

impl ComponentType {
    /// Returns the size in bytes for this component type
    pub fn size(&self) -> usize {
        match self {
            ComponentType::UChar | ComponentType::Char => 1,
            ComponentType::UShort | ComponentType::Short => 2,
            ComponentType::UInt | ComponentType::Int | ComponentType::Float => 4,
            ComponentType::ULong | ComponentType::Long | ComponentType::Double => 8,
        }
    }

    /// Returns the name of this component type
    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::UChar => "UCHAR",
            ComponentType::Char => "CHAR",
            ComponentType::UShort => "USHORT",
            ComponentType::Short => "SHORT",
            ComponentType::UInt => "UINT",
            ComponentType::Int => "INT",
            ComponentType::ULong => "ULONG",
            ComponentType::Long => "LONG",
            ComponentType::Float => "FLOAT",
            ComponentType::Double => "DOUBLE",
        }
    }
}

/// Semantic grouping of components into one logical pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    /// One component per pixel
    Scalar,
    /// Several independent components per pixel
    Vector,
    /// Interleaved (real, imaginary) component pairs
    Complex,
}

/// Represents image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (axis 0, columns)
    pub width: u64,
    /// Height in pixels (axis 1, rows)
    pub height: u64,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(width: u64, height: u64) -> Self {
        Self { width, height }
    }

    /// Returns the total number of pixels, `None` on overflow
    pub fn pixel_count(&self) -> Option<u64> {
        self.width.checked_mul(self.height)
    }

    /// Total bytes of an image with `bytes_per_pixel` bytes per pixel
    ///
    /// Fails when the size does not fit in memory addressing on this host.
    pub fn byte_size(&self, bytes_per_pixel: u64) -> Result<u64> {
        self.pixel_count()
            .and_then(|n| n.checked_mul(bytes_per_pixel))
            .filter(|&n| usize::try_from(n).is_ok())
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "image of {} x {} pixels with {} bytes per pixel is too large",
                    self.width, self.height, bytes_per_pixel
                ))
            })
    }
}

/// Index-space sub-rectangle addressed by one read or write call
///
/// `index` is the first pixel per axis and `size` the extent per axis,
/// axis 0 being columns and axis 1 rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    /// First column and first row
    pub index: [u64; 2],
    /// Width and height
    pub size: [u64; 2],
}

impl Region {
    /// Creates a region from its first column/row and its width/height
    pub fn new(x: u64, y: u64, width: u64, height: u64) -> Self {
        Self {
            index: [x, y],
            size: [width, height],
        }
    }

    /// Region covering the whole image
    pub fn full(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.width, dims.height)
    }

    /// Index of the first column
    pub fn first_column(&self) -> u64 {
        self.index[0]
    }

    /// Index of the first row
    pub fn first_row(&self) -> u64 {
        self.index[1]
    }

    /// Number of columns
    pub fn width(&self) -> u64 {
        self.size[0]
    }

    /// Number of rows
    pub fn height(&self) -> u64 {
        self.size[1]
    }

    /// Number of pixels in the region, `None` on overflow
    pub fn pixel_count(&self) -> Option<u64> {
        self.width().checked_mul(self.height())
    }

    /// Row indices covered by the region, in file order
    pub fn rows(&self) -> std::ops::Range<u64> {
        self.first_row()..self.first_row().saturating_add(self.height())
    }

    /// Rejects regions reaching past the image on either axis
    pub fn validate(&self, dims: Dimensions) -> Result<()> {
        let extent = [dims.width, dims.height];
        for axis in 0..2 {
            let end = self.index[axis].checked_add(self.size[axis]);
            if end.map_or(true, |end| end > extent[axis]) {
                return Err(Error::OutOfBounds(format!(
                    "Region index {:?} size {:?} outside image bounds ({}, {})",
                    self.index, self.size, dims.width, dims.height
                )));
            }
        }
        Ok(())
    }
}

/// In-memory description of an opened raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    /// Image size in pixels
    pub dimensions: Dimensions,
    /// Pixel spacing per axis
    pub spacing: [f64; 2],
    /// Coordinates of the first pixel
    pub origin: [f64; 2],
    /// How components group into a pixel
    pub pixel_type: PixelType,
    /// Storage type of each component
    pub component_type: ComponentType,
    /// Components per pixel
    pub number_of_components: usize,
    /// Byte order of the file, not of the host
    pub byte_order: ByteOrder,
}

impl Default for RasterMetadata {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            spacing: [1.0, 1.0],
            origin: [0.5, 0.5],
            pixel_type: PixelType::Scalar,
            component_type: ComponentType::UChar,
            number_of_components: 1,
            byte_order: ByteOrder::host(),
        }
    }
}

impl RasterMetadata {
    /// Bytes of one component
    pub fn bytes_per_component(&self) -> usize {
        self.component_type.size()
    }

    /// Bytes of one pixel, all components interleaved
    ///
    /// Saturates; [`RasterMetadata::check_size`] rejects such metadata.
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_component().saturating_mul(self.number_of_components)
    }

    /// Bytes of one full image row, `None` on overflow
    pub fn row_stride(&self) -> Option<u64> {
        (self.bytes_per_pixel() as u64).checked_mul(self.dimensions.width)
    }

    /// Pixels in the whole image, `None` on overflow
    pub fn image_size_in_pixels(&self) -> Option<u64> {
        self.dimensions.pixel_count()
    }

    /// Bytes of the whole image, `None` on overflow
    pub fn image_size_in_bytes(&self) -> Option<u64> {
        self.image_size_in_pixels()?.checked_mul(self.bytes_per_pixel() as u64)
    }

    /// Buffer length needed to hold `region`, `None` on overflow
    pub fn region_size_in_bytes(&self, region: &Region) -> Option<usize> {
        let pixels = usize::try_from(region.pixel_count()?).ok()?;
        pixels.checked_mul(self.bytes_per_pixel())
    }

    /// Fails unless the whole image is addressable in bytes
    pub fn check_size(&self) -> Result<u64> {
        let pixel = self
            .bytes_per_component()
            .checked_mul(self.number_of_components)
            .ok_or_else(|| {
                Error::InvalidFormat(format!("{} components per pixel", self.number_of_components))
            })?;
        self.dimensions.byte_size(pixel as u64)
    }

    /// Serializes the metadata as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
