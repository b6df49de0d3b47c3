//! LUM format support
//!
//! A LUM file is a single band of fixed-stride rows. The first bytes of the
//! file hold `(columns: i32, rows: i32)` followed by a 4-character type code
//! (`"08BU"`, `"16LI"`, `"FLOA"`, `"R8L "`...). The code is matched against
//! [`TYPE_CODES`]; an even table position means a big-endian file, an odd
//! one little-endian. The header is padded to whole rows and pixel data
//! starts on the next row boundary.
//!
//! A row at least 12 bytes wide holds the whole header, so data starts one
//! row in. Narrower rows need `ceil(12 / row_stride)` header rows: a
//! 5-column UCHAR file starts its data at byte 15, not byte 5, and a
//! 2-column one at byte 12.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, trace};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::formats::{has_extension, CodecState, ImageCodec};
use crate::io::rows::{self, RowLayout};
use crate::io::{reconcile, ByteOrder};
use crate::types::{ComponentType, Dimensions, PixelType};

/// Known type-code fragments, in lookup order
pub const TYPE_CODES: [&str; 8] = ["BI", "LI", "BU", "LU", "FLOA", "FLOL", "R8B", "R8L"];

/// Bytes of `(columns, rows, type code)`
pub const HEADER_BYTES: usize = 12;

/// Decoded LUM type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCode {
    pub byte_order: ByteOrder,
    pub component_type: ComponentType,
    pub bits_per_pixel: u32,
}

impl TypeCode {
    /// Decodes a 4-character type code
    pub fn decode(code: &[u8; 4]) -> Result<Self> {
        let text = String::from_utf8_lossy(code);
        let index = TYPE_CODES
            .iter()
            .position(|known| text.contains(known))
            .ok_or_else(|| Error::Unsupported(format!("LUM type code '{}'", text)))?;

        let byte_order = if index % 2 == 0 {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };

        let (component_type, bits_per_pixel) = match index {
            0..=3 => {
                let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
                let bits: u32 = digits.parse().map_err(|_| {
                    Error::InvalidFormat(format!("LUM type code '{}' has no bit count", text))
                })?;
                let unsigned = text.contains('U');
                let component = match (bits.div_ceil(8), unsigned) {
                    (1, true) => ComponentType::UChar,
                    (1, false) => ComponentType::Char,
                    (2, true) => ComponentType::UShort,
                    (2, false) => ComponentType::Short,
                    (4, true) => ComponentType::UInt,
                    (4, false) => ComponentType::Int,
                    _ => {
                        return Err(Error::Unsupported(format!(
                            "LUM type code '{}' with {} bits",
                            text, bits
                        )))
                    }
                };
                (component, bits)
            }
            4 | 5 => (ComponentType::Float, 32),
            _ => (ComponentType::Double, 64),
        };

        Ok(Self {
            byte_order,
            component_type,
            bits_per_pixel,
        })
    }

    /// Type code written for `component` in a file of byte order `order`
    pub fn encode(order: ByteOrder, component: ComponentType) -> Result<[u8; 4]> {
        let big = order == ByteOrder::BigEndian;
        let code: &[u8; 4] = match (component, big) {
            (ComponentType::Char, true) => b"08BI",
            (ComponentType::Char, false) => b"08LI",
            (ComponentType::UChar, true) => b"08BU",
            (ComponentType::UChar, false) => b"08LU",
            (ComponentType::Short, true) => b"16BI",
            (ComponentType::Short, false) => b"16LI",
            (ComponentType::UShort, true) => b"16BU",
            (ComponentType::UShort, false) => b"16LU",
            (ComponentType::Int, true) => b"32BI",
            (ComponentType::Int, false) => b"32LI",
            (ComponentType::UInt, true) => b"32BU",
            (ComponentType::UInt, false) => b"32LU",
            (ComponentType::Float, true) => b"FLOA",
            (ComponentType::Float, false) => b"FLOL",
            (ComponentType::Double, true) => b"R8B ",
            (ComponentType::Double, false) => b"R8L ",
            (ComponentType::Long | ComponentType::ULong, _) => {
                return Err(Error::Unsupported(format!(
                    "LUM cannot store {} components",
                    component.name()
                )))
            }
        };
        Ok(*code)
    }
}

/// Parsed LUM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LumHeader {
    pub columns: u64,
    pub rows: u64,
    pub code: TypeCode,
}

impl LumHeader {
    pub fn parse(raw: &[u8; HEADER_BYTES]) -> Result<Self> {
        let code = TypeCode::decode(&[raw[8], raw[9], raw[10], raw[11]])?;
        let order = code.byte_order;
        let columns = order.i32_from_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let rows = order.i32_from_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if columns <= 0 || rows <= 0 {
            return Err(Error::InvalidFormat(format!(
                "LUM dimensions {} x {}",
                columns, rows
            )));
        }
        Dimensions::new(columns as u64, rows as u64).byte_size(code.component_type.size() as u64)?;
        Ok(Self {
            columns: columns as u64,
            rows: rows as u64,
            code,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut raw = [0u8; HEADER_BYTES];
        rows::read_exact_at(&mut file, 0, &mut raw)?;
        Self::parse(&raw)
    }

    /// Row layout of the pixel data
    pub fn layout(&self) -> RowLayout {
        layout_for(self.columns, self.code.component_type)
    }
}

/// Row layout of a LUM file with `columns` values of type `component`
///
/// Rows are `size * columns` bytes; the header fills as many leading rows
/// as it needs, one whenever a row can hold the 12 header bytes. Callers
/// check the image size first; oversized geometry saturates.
pub fn layout_for(columns: u64, component: ComponentType) -> RowLayout {
    let size = component.size() as u64;
    let row_stride = size.saturating_mul(columns);
    let header_rows = (HEADER_BYTES as u64).div_ceil(row_stride.max(1));
    RowLayout::new(header_rows.saturating_mul(row_stride), row_stride, size)
}

/// LUM single-band reader/writer
pub struct LumCodec {
    state: CodecState,
    header_written: bool,
}

impl LumCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        let mut state = CodecState::new(options);
        state.metadata.origin = [0.0, 0.0];
        Self {
            state,
            header_written: false,
        }
    }

    fn layout(&self) -> RowLayout {
        let meta = &self.state.metadata;
        layout_for(meta.dimensions.width, meta.component_type)
    }

    fn accepts_path(path: &Path) -> bool {
        has_extension(path, "lum") && !path.is_dir()
    }
}

impl Default for LumCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for LumCodec {
    fn name(&self) -> &'static str {
        "LUM"
    }

    fn state(&self) -> &CodecState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CodecState {
        &mut self.state
    }

    fn can_read(&self, path: &Path) -> bool {
        if !Self::accepts_path(path) {
            return false;
        }
        match LumHeader::read_from(path) {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "LUM rejected file");
                false
            }
        }
    }

    fn can_write(&self, path: &Path) -> bool {
        Self::accepts_path(path)
    }

    fn can_stream_write(&self) -> bool {
        true
    }

    fn read_image_information(&mut self) -> Result<()> {
        let path = self.state.require_file_name("LUM")?;
        let header = LumHeader::read_from(path)?;

        let meta = &mut self.state.metadata;
        meta.dimensions = Dimensions::new(header.columns, header.rows);
        meta.component_type = header.code.component_type;
        meta.byte_order = header.code.byte_order;
        meta.number_of_components = 1;
        meta.pixel_type = PixelType::Scalar;
        meta.check_size()?;

        debug!(
            columns = header.columns,
            rows = header.rows,
            component = meta.component_type.name(),
            byte_order = ?meta.byte_order,
            bits = header.code.bits_per_pixel,
            "LUM header parsed"
        );
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (region, len) = self.state.checked_region(buffer.len())?;
        let layout = self.layout();
        let mut file = File::open(&self.state.file_name)?;
        debug!(?region, "LUM read");

        let out = &mut buffer[..len];
        layout.read_region(&mut file, &region, out)?;

        let meta = &self.state.metadata;
        if reconcile(out, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold) {
            trace!("LUM data swapped to host order");
        }
        Ok(())
    }

    fn write_image_information(&mut self) -> Result<()> {
        let path = self.state.require_file_name("LUM")?.to_path_buf();
        if !self.can_write(&path) {
            return Err(Error::InvalidFormat(format!(
                "{} is not a LUM file name",
                path.display()
            )));
        }

        let order = self.state.options.write_byte_order;
        let meta = &mut self.state.metadata;
        if meta.number_of_components != 1 {
            return Err(Error::Unsupported(format!(
                "LUM stores a single band, got {} components",
                meta.number_of_components
            )));
        }
        let code = TypeCode::encode(order, meta.component_type)?;
        let columns = i32::try_from(meta.dimensions.width)
            .map_err(|_| Error::Unsupported("LUM column count exceeds i32".to_string()))?;
        let rows = i32::try_from(meta.dimensions.height)
            .map_err(|_| Error::Unsupported("LUM row count exceeds i32".to_string()))?;
        if columns == 0 || rows == 0 {
            return Err(Error::InvalidFormat("LUM dimensions are not defined".to_string()));
        }
        meta.check_size()?;
        meta.byte_order = order;

        let layout = layout_for(meta.dimensions.width, meta.component_type);
        let file_len = layout.file_len(meta.dimensions.height)?;
        let mut file = File::create(&path)?;
        rows::fill_zeros(&mut file, file_len)?;

        let mut header = [0u8; HEADER_BYTES];
        header[0..4].copy_from_slice(&order.i32_to_bytes(columns));
        header[4..8].copy_from_slice(&order.i32_to_bytes(rows));
        header[8..12].copy_from_slice(&code);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.flush()?;

        self.header_written = true;
        debug!(
            path = %path.display(),
            code = %String::from_utf8_lossy(&code),
            columns,
            rows,
            "LUM file created"
        );
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if !self.header_written {
            self.write_image_information()?;
        }
        let (region, len) = self.state.checked_region(buffer.len())?;
        let meta = &self.state.metadata;

        let mut data = rows::scratch(len)?;
        data.copy_from_slice(&buffer[..len]);
        reconcile(&mut data, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold);

        let mut file = OpenOptions::new().write(true).open(&self.state.file_name)?;
        debug!(?region, "LUM write");
        self.layout().write_region(&mut file, &region, &data)?;
        file.flush()?;
        Ok(())
    }
}
