//! ONERA complex raster format
//!
//! An ONERA image is a pair of files sharing a root name:
//!
//! - `<root>.ent`: text header whose third line is the pixel label.
//!   Only `cmplx_real_4` (complex of two 4-byte floats) exists.
//! - `<root>.dat`: little-endian data. A 4-byte magic number, then one
//!   header line of `cols` complex pixels (column count as u16 at byte 6),
//!   then `rows` lines of `cols` complex pixels.
//!
//! The row count is never stored; it follows from the data file length.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::formats::{has_extension, stem, CodecState, ImageCodec};
use crate::io::rows::{self, RowLayout};
use crate::io::{reconcile, ByteOrder};
use crate::types::{ComponentType, Dimensions, PixelType};

/// Magic number at the start of every `.dat` file
pub const MAGIC: u32 = 33_554_433;

/// Only pixel label understood by this format
pub const PIXEL_LABEL: &str = "cmplx_real_4";

/// Bytes of one complex pixel (two little-endian f32)
const PIXEL_BYTES: u64 = 8;

/// Offset of the u16 column count in the data file
const COLUMNS_OFFSET: u64 = 6;

/// Data-file byte order
const FILE_ORDER: ByteOrder = ByteOrder::LittleEndian;

/// Header and data file paths for `path`
///
/// `path` may name either file of the pair or their common root.
pub fn file_pair(path: &Path) -> (PathBuf, PathBuf) {
    if has_extension(path, "ent") || has_extension(path, "dat") {
        (path.with_extension("ent"), path.with_extension("dat"))
    } else {
        let with = |ext: &str| {
            let mut name = OsString::from(path.as_os_str());
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        };
        (with("ent"), with("dat"))
    }
}

/// Data layout of an image with `columns` complex pixels per row
pub fn layout_for(columns: u64) -> RowLayout {
    let row_stride = PIXEL_BYTES.saturating_mul(columns);
    RowLayout::new(row_stride.saturating_add(4), row_stride, PIXEL_BYTES)
}

/// Reads the magic number and column count of a data file
fn read_data_header(file: &mut File) -> Result<(u32, u16)> {
    file.seek(SeekFrom::Start(0))?;
    let magic = FILE_ORDER.read_u32(file)?;
    file.seek(SeekFrom::Start(COLUMNS_OFFSET))?;
    let columns = FILE_ORDER.read_u16(file)?;
    Ok((magic, columns))
}

fn check_magic(file: &mut File) -> Result<u16> {
    let (magic, columns) = read_data_header(file)?;
    if magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }
    Ok(columns)
}

/// Third line of the `.ent` header
fn read_pixel_label(path: &Path) -> Result<String> {
    let reader = BufReader::new(File::open(path)?);
    let line = reader
        .lines()
        .nth(2)
        .transpose()?
        .ok_or_else(|| Error::MissingToken("ONERA pixel label".to_string()))?;
    Ok(line.trim().to_string())
}

/// ONERA complex float reader/writer
pub struct OneraCodec {
    state: CodecState,
    header_written: bool,
}

impl OneraCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            state: CodecState::new(options),
            header_written: false,
        }
    }

    fn check_files(path: &Path) -> Result<()> {
        let (header, data) = file_pair(path);
        File::open(&header)?;
        let mut file = File::open(&data)?;
        check_magic(&mut file)?;
        Ok(())
    }

    fn layout(&self) -> RowLayout {
        layout_for(self.state.metadata.dimensions.width)
    }
}

impl Default for OneraCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for OneraCodec {
    fn name(&self) -> &'static str {
        "ONERA"
    }

    fn state(&self) -> &CodecState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CodecState {
        &mut self.state
    }

    fn can_read(&self, path: &Path) -> bool {
        match Self::check_files(path) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ONERA rejected file");
                false
            }
        }
    }

    fn can_write(&self, path: &Path) -> bool {
        has_extension(path, "ent") && !path.is_dir()
    }

    fn can_stream_write(&self) -> bool {
        true
    }

    fn read_image_information(&mut self) -> Result<()> {
        let (header, data) = file_pair(self.state.require_file_name("ONERA")?);

        let label = read_pixel_label(&header)?;
        if label != PIXEL_LABEL {
            return Err(Error::Unsupported(format!("ONERA pixel label '{}'", label)));
        }

        let mut file = File::open(&data)?;
        let columns = u64::from(check_magic(&mut file)?);
        if columns == 0 {
            return Err(Error::InvalidFormat("ONERA column count is zero".to_string()));
        }
        let layout = layout_for(columns);
        let len = file.metadata()?.len();
        let body = len.checked_sub(layout.data_offset).ok_or_else(|| {
            Error::InvalidFormat(format!("ONERA data file is only {} bytes", len))
        })?;
        if body % layout.row_stride != 0 {
            warn!(trailing = body % layout.row_stride, "ONERA data file ends with a partial row");
        }
        let rows = body / layout.row_stride;

        let meta = &mut self.state.metadata;
        meta.dimensions = Dimensions::new(columns, rows);
        meta.number_of_components = 2;
        meta.component_type = ComponentType::Float;
        meta.pixel_type = PixelType::Complex;
        meta.byte_order = FILE_ORDER;
        meta.check_size()?;

        debug!(columns, rows, "ONERA header parsed");
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (region, len) = self.state.checked_region(buffer.len())?;
        let (_, data) = file_pair(&self.state.file_name);
        let mut file = File::open(&data)?;
        debug!(?region, "ONERA read");

        let out = &mut buffer[..len];
        self.layout().read_region(&mut file, &region, out)?;
        reconcile(out, ComponentType::Float, FILE_ORDER, self.state.options.parallel_swap_threshold);
        Ok(())
    }

    fn write_image_information(&mut self) -> Result<()> {
        let path = self.state.require_file_name("ONERA")?.to_path_buf();
        if !self.can_write(&path) {
            return Err(Error::InvalidFormat(format!(
                "{} is not an ONERA header file name",
                path.display()
            )));
        }
        let (header, data) = file_pair(&path);

        let meta = &mut self.state.metadata;
        let columns = u16::try_from(meta.dimensions.width)
            .map_err(|_| Error::Unsupported("ONERA column count exceeds u16".to_string()))?;
        let rows = meta.dimensions.height;
        if columns == 0 || rows == 0 {
            return Err(Error::InvalidFormat("ONERA dimensions are not defined".to_string()));
        }
        meta.number_of_components = 2;
        meta.component_type = ComponentType::Float;
        meta.pixel_type = PixelType::Complex;
        meta.byte_order = FILE_ORDER;
        meta.check_size()?;

        fs::write(
            &header,
            format!("{}\n{} {}\n{}\n", stem(&path), columns, rows, PIXEL_LABEL),
        )?;

        let file_len = layout_for(u64::from(columns)).file_len(rows)?;
        let mut file = File::create(&data)?;
        rows::fill_zeros(&mut file, file_len)?;
        file.seek(SeekFrom::Start(0))?;
        FILE_ORDER.write_u32(&mut file, MAGIC)?;
        file.seek(SeekFrom::Start(COLUMNS_OFFSET))?;
        FILE_ORDER.write_u16(&mut file, columns)?;
        file.flush()?;

        self.header_written = true;
        debug!(header = %header.display(), columns, rows, "ONERA files created");
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if !self.header_written {
            self.write_image_information()?;
        }
        let (region, len) = self.state.checked_region(buffer.len())?;

        let mut data = rows::scratch(len)?;
        data.copy_from_slice(&buffer[..len]);
        reconcile(&mut data, ComponentType::Float, FILE_ORDER, self.state.options.parallel_swap_threshold);

        let (_, data_path) = file_pair(&self.state.file_name);
        let mut file = OpenOptions::new().write(true).open(&data_path)?;
        debug!(?region, "ONERA write");
        self.layout().write_region(&mut file, &region, &data)?;
        file.flush()?;
        Ok(())
    }
}
