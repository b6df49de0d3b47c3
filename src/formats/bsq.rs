//! BSQ (band sequential) format
//!
//! `<root>.hd` is an ASCII header; each band lives in its own raw file
//! `<root>.c1`, `<root>.c2`, ... with no header bytes. Readers also accept
//! upper-case `<root>.C1` band files.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::formats::header::Tokens;
use crate::formats::{has_extension, CodecState, ImageCodec};
use crate::io::rows::{self, RowLayout};
use crate::io::{reconcile, ByteOrder};
use crate::types::{ComponentType, Dimensions, PixelType};

/// Largest band count a BSQ or RAD header may declare
pub const MAX_CHANNELS: usize = 250;

/// Maps a BSQ `TYPE` code to its component type
pub fn component_for_code(code: &str) -> Option<ComponentType> {
    Some(match code.to_ascii_uppercase().as_str() {
        "OCT" => ComponentType::Char,
        "UOCT" => ComponentType::UChar,
        "I2" => ComponentType::Short,
        "UI2" => ComponentType::UShort,
        "I4" => ComponentType::Int,
        "UI4" => ComponentType::UInt,
        "R4" => ComponentType::Float,
        "R8" => ComponentType::Double,
        _ => return None,
    })
}

/// BSQ `TYPE` code of a component type
pub fn code_for_component(component: ComponentType) -> Option<&'static str> {
    Some(match component {
        ComponentType::Char => "OCT",
        ComponentType::UChar => "UOCT",
        ComponentType::Short => "I2",
        ComponentType::UShort => "UI2",
        ComponentType::Int => "I4",
        ComponentType::UInt => "UI4",
        ComponentType::Float => "R4",
        ComponentType::Double => "R8",
        ComponentType::Long | ComponentType::ULong => return None,
    })
}

/// Contents of a `.hd` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsqHeader {
    pub component_type: ComponentType,
    pub channels: usize,
    pub lines: u64,
    pub columns: u64,
    pub bits_per_pixel: u32,
    pub byte_order: ByteOrder,
}

impl BsqHeader {
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);

        tokens.expect(&["TYPE"])?;
        let code = tokens
            .next_token()
            .ok_or_else(|| Error::MissingToken("TYPE value".to_string()))?;
        let component_type = component_for_code(code)
            .ok_or_else(|| Error::Unsupported(format!("BSQ type '{}'", code)))?;

        tokens.expect(&["LABEL"])?;
        tokens.skip_past("CHANNELS")?;
        let channels: usize = tokens.value("CHANNELS")?;
        if channels > MAX_CHANNELS {
            return Err(Error::InvalidFormat(format!(
                "BSQ header declares {} channels, at most {} are supported",
                channels, MAX_CHANNELS
            )));
        }
        tokens.expect(&["LINES"])?;
        let lines: u64 = tokens.value("LINES")?;
        tokens.expect(&["COLUMNS"])?;
        let columns: u64 = tokens.value("COLUMNS")?;
        tokens.expect_phrase("BITS PER PIXEL")?;
        let bits_per_pixel: u32 = tokens.value("BITS PER PIXEL")?;

        let byte_order = if tokens.peek_is(&["SENSCODAGE"]) {
            tokens.expect(&["SENSCODAGE"])?;
            let value = tokens
                .next_token()
                .ok_or_else(|| Error::MissingToken("SENSCODAGE value".to_string()))?;
            ByteOrder::from_senscodage(value)
                .ok_or_else(|| Error::InvalidFormat(format!("SENSCODAGE '{}'", value)))?
        } else {
            ByteOrder::host()
        };

        if channels == 0 || lines == 0 || columns == 0 {
            return Err(Error::InvalidFormat(format!(
                "BSQ header declares {} channels of {} x {}",
                channels, columns, lines
            )));
        }
        Dimensions::new(columns, lines).byte_size(component_type.size() as u64)?;
        if bits_per_pixel as usize != component_type.size() * 8 {
            warn!(bits_per_pixel, code, "BSQ bits per pixel disagrees with TYPE");
        }

        Ok(Self {
            component_type,
            channels,
            lines,
            columns,
            bits_per_pixel,
            byte_order,
        })
    }

    /// Header text in the layout this crate writes
    pub fn render(&self) -> Result<String> {
        let code = code_for_component(self.component_type).ok_or_else(|| {
            Error::Unsupported(format!("BSQ cannot store {} components", self.component_type.name()))
        })?;
        Ok(format!(
            "TYPE\n{code}\nLABEL\n{code} - written by skyforest-codecs\nCHANNELS\n{}\nLINES\n{}\n\
             COLUMNS\n{}\nBITS PER PIXEL\n{}\nSENSCODAGE\n{}\n",
            self.channels,
            self.lines,
            self.columns,
            self.bits_per_pixel,
            self.byte_order.senscodage(),
        ))
    }
}

/// Band file names `<root>.c1 .. <root>.cN` for header `path`
pub fn band_files(path: &Path, channels: usize) -> Vec<PathBuf> {
    (1..=channels)
        .map(|i| path.with_extension(format!("c{}", i)))
        .collect()
}

/// Existing band files of header `path`
///
/// Band `i` is `<root>.ci`, or `<root>.Ci` when only the upper-case name
/// exists. Stops at the first missing band.
pub fn find_band_files(path: &Path, channels: usize) -> Result<Vec<PathBuf>> {
    let mut bands = Vec::with_capacity(channels.min(MAX_CHANNELS));
    for index in 1..=channels {
        let band = [format!("c{}", index), format!("C{}", index)]
            .into_iter()
            .map(|ext| path.with_extension(ext))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "BSQ band file {} not found",
                    path.with_extension(format!("c{}", index)).display()
                ))
            })?;
        bands.push(band);
    }
    Ok(bands)
}

/// BSQ multi-file reader/writer
pub struct BsqCodec {
    state: CodecState,
    band_files: Vec<PathBuf>,
    header_written: bool,
}

impl BsqCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            state: CodecState::new(options),
            band_files: Vec::new(),
            header_written: false,
        }
    }

    /// Band files of the current image
    pub fn band_files(&self) -> &[PathBuf] {
        &self.band_files
    }

    fn accepts_path(path: &Path) -> bool {
        has_extension(path, "hd") && !path.is_dir()
    }

    fn check_files(path: &Path) -> Result<()> {
        let header = BsqHeader::parse(&fs::read_to_string(path)?)?;
        for band in find_band_files(path, header.channels)? {
            File::open(&band)?;
        }
        Ok(())
    }

    fn layout(&self) -> Result<RowLayout> {
        let meta = &self.state.metadata;
        RowLayout::packed(0, meta.dimensions.width, meta.bytes_per_component() as u64)
    }
}

impl Default for BsqCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for BsqCodec {
    fn name(&self) -> &'static str {
        "BSQ"
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
        match Self::check_files(path) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "BSQ rejected file");
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
        let path = self.state.require_file_name("BSQ")?.to_path_buf();
        let header = BsqHeader::parse(&fs::read_to_string(&path)?)?;

        let bands = find_band_files(&path, header.channels)?;

        let meta = &mut self.state.metadata;
        meta.dimensions = Dimensions::new(header.columns, header.lines);
        meta.component_type = header.component_type;
        meta.number_of_components = header.channels;
        meta.byte_order = header.byte_order;
        meta.pixel_type = if header.channels == 1 {
            PixelType::Scalar
        } else {
            PixelType::Vector
        };
        meta.check_size()?;
        self.band_files = bands;

        debug!(
            columns = header.columns,
            lines = header.lines,
            channels = header.channels,
            component = header.component_type.name(),
            byte_order = ?header.byte_order,
            "BSQ header parsed"
        );
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (region, len) = self.state.checked_region(buffer.len())?;
        let layout = self.layout()?;
        let meta = &self.state.metadata;
        let size = meta.bytes_per_component();
        let pixel_bytes = meta.bytes_per_pixel();
        debug!(?region, bands = self.band_files.len(), "BSQ read");

        let out = &mut buffer[..len];
        let mut band = rows::scratch(layout.region_bytes(&region)?)?;
        for (index, path) in self.band_files.iter().enumerate() {
            let mut file = File::open(path)?;
            layout.read_region(&mut file, &region, &mut band)?;
            rows::scatter_band(&band, out, index * size, size, pixel_bytes);
        }

        reconcile(out, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold);
        Ok(())
    }

    fn write_image_information(&mut self) -> Result<()> {
        let path = self.state.require_file_name("BSQ")?.to_path_buf();
        if !self.can_write(&path) {
            return Err(Error::InvalidFormat(format!(
                "{} is not a BSQ header file name",
                path.display()
            )));
        }

        let order = self.state.options.write_byte_order;
        let meta = &mut self.state.metadata;
        let header = BsqHeader {
            component_type: meta.component_type,
            channels: meta.number_of_components,
            lines: meta.dimensions.height,
            columns: meta.dimensions.width,
            bits_per_pixel: (meta.component_type.size() * 8) as u32,
            byte_order: order,
        };
        if header.channels == 0 || header.lines == 0 || header.columns == 0 {
            return Err(Error::InvalidFormat("BSQ dimensions are not defined".to_string()));
        }
        if header.channels > MAX_CHANNELS {
            return Err(Error::InvalidFormat(format!(
                "BSQ cannot store {} channels",
                header.channels
            )));
        }
        meta.check_size()?;
        fs::write(&path, header.render()?)?;
        meta.byte_order = order;

        let layout = self.layout()?;
        let band_len = layout.file_len(header.lines)?;
        let bands = band_files(&path, header.channels);
        for band in &bands {
            let mut file = File::create(band)?;
            rows::fill_zeros(&mut file, band_len)?;
            file.flush()?;
        }
        self.band_files = bands;
        self.header_written = true;

        debug!(path = %path.display(), channels = header.channels, "BSQ files created");
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if !self.header_written {
            self.write_image_information()?;
        }
        let (region, len) = self.state.checked_region(buffer.len())?;
        let layout = self.layout()?;
        let meta = &self.state.metadata;
        let size = meta.bytes_per_component();
        let pixel_bytes = meta.bytes_per_pixel();
        debug!(?region, "BSQ write");

        let mut band = rows::scratch(layout.region_bytes(&region)?)?;
        for (index, path) in self.band_files.iter().enumerate() {
            rows::gather_band(&buffer[..len], &mut band, index * size, size, pixel_bytes);
            reconcile(&mut band, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold);
            let mut file = OpenOptions::new().write(true).open(path)?;
            layout.write_region(&mut file, &region, &band)?;
            file.flush()?;
        }
        Ok(())
    }
}
