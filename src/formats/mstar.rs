//! MSTAR SAR target/scene reader
//!
//! MSTAR files open with a Phoenix text header whose first 1024 bytes
//! carry `Key= value` tokens. Two variants share the container:
//!
//! - chip (`native_header_length == 0`): a magnitude block then a phase
//!   block, each `rows * cols` big-endian f32, starting right after the
//!   Phoenix header;
//! - fullscene: the same two blocks as big-endian u16, after the Phoenix
//!   header and the native header.
//!
//! Both decode to 2-component float pixels `(magnitude, phase)`.

use std::fs::File;
use std::path::Path;
use tracing::debug;
use crate::error::{Error, Result};
use crate::config::CodecOptions;
use crate::formats::header::find_int_after;
use crate::formats::{CodecState, ImageCodec};
use crate::io::rows;
use crate::io::{reinterpret_swapped, ByteOrder};
use crate::types::{ComponentType, Dimensions, PixelType, Region};

/// Bytes of the text block scanned for header tokens
pub const HEADER_SCAN_BYTES: usize = 1024;

/// MSTAR data is always big-endian
const FILE_ORDER: ByteOrder = ByteOrder::BigEndian;

const PHOENIX_LENGTH: &str = "PhoenixHeaderLength=";
const NATIVE_LENGTH: &str = "native_header_length=";
const COLUMNS: &str = "NumberOfColumns=";
const ROWS: &str = "NumberOfRows=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MstarKind {
    Chip,
    Fullscene,
}

impl MstarKind {
    /// Bytes of one stored magnitude or phase value
    fn sample_bytes(&self) -> usize {
        match self {
            MstarKind::Chip => 4,
            MstarKind::Fullscene => 2,
        }
    }
}

/// Fields of the Phoenix header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MstarHeader {
    pub phoenix_header_length: u64,
    pub native_header_length: u64,
    pub columns: u64,
    pub rows: u64,
}

impl MstarHeader {
    /// Parses the four required tokens out of the scanned header text
    pub fn parse(text: &str) -> Result<Self> {
        let field = |token: &str| -> Result<u64> {
            let value = find_int_after(text, token)
                .ok_or_else(|| Error::MissingToken(token.trim_end_matches('=').to_string()))?;
            u64::try_from(value).map_err(|_| {
                Error::InvalidFormat(format!("negative value {} for {}", value, token))
            })
        };
        let header = Self {
            phoenix_header_length: field(PHOENIX_LENGTH)?,
            native_header_length: field(NATIVE_LENGTH)?,
            columns: field(COLUMNS)?,
            rows: field(ROWS)?,
        };
        header.block_bytes()?;
        Ok(header)
    }

    pub fn read_from(file: &mut File) -> Result<Self> {
        let mut raw = [0u8; HEADER_SCAN_BYTES];
        rows::read_exact_at(file, 0, &mut raw)?;
        Self::parse(&String::from_utf8_lossy(&raw))
    }

    pub fn kind(&self) -> MstarKind {
        if self.native_header_length == 0 {
            MstarKind::Chip
        } else {
            MstarKind::Fullscene
        }
    }

    /// File offset of the magnitude block
    pub fn magnitude_offset(&self) -> u64 {
        match self.kind() {
            MstarKind::Chip => self.phoenix_header_length,
            MstarKind::Fullscene => self.phoenix_header_length + self.native_header_length,
        }
    }

    /// Bytes of one magnitude (or phase) block
    pub fn block_bytes(&self) -> Result<usize> {
        usize::try_from(self.columns)
            .ok()
            .and_then(|c| c.checked_mul(usize::try_from(self.rows).ok()?))
            .and_then(|n| n.checked_mul(self.kind().sample_bytes()))
            .ok_or_else(|| {
                Error::InvalidFormat(format!("MSTAR scene {} x {} is too large", self.columns, self.rows))
            })
    }
}

/// Decodes one stored sample to a host f32
fn sample(kind: MstarKind, raw: &[u8]) -> f32 {
    let swap = FILE_ORDER.needs_swap();
    match kind {
        MstarKind::Chip => {
            let bytes = [raw[0], raw[1], raw[2], raw[3]];
            if swap {
                reinterpret_swapped::<f32>(bytes)
            } else {
                f32::from_ne_bytes(bytes)
            }
        }
        MstarKind::Fullscene => {
            let bytes = [raw[0], raw[1]];
            let value = if swap {
                reinterpret_swapped::<u16>(bytes)
            } else {
                u16::from_ne_bytes(bytes)
            };
            f32::from(value)
        }
    }
}

/// Writes the `(magnitude, phase)` pairs of `region` into `out`
///
/// `blocks` holds the magnitude block followed by the phase block.
fn decode_region(header: &MstarHeader, blocks: &[u8], region: &Region, out: &mut [u8]) {
    let kind = header.kind();
    let size = kind.sample_bytes();
    let (magnitude, phase) = blocks.split_at(blocks.len() / 2);
    let columns = region.first_column()..region.first_column() + region.width();

    let indices = region
        .rows()
        .flat_map(|row| columns.clone().map(move |column| (row * header.columns + column) as usize));
    for (index, pixel) in indices.zip(out.chunks_exact_mut(8)) {
        let at = index * size;
        let m = sample(kind, &magnitude[at..at + size]);
        let p = sample(kind, &phase[at..at + size]);
        pixel[..4].copy_from_slice(&m.to_ne_bytes());
        pixel[4..].copy_from_slice(&p.to_ne_bytes());
    }
}

/// MSTAR chip and fullscene reader
pub struct MstarCodec {
    state: CodecState,
    header: Option<MstarHeader>,
}

impl MstarCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            state: CodecState::new(options),
            header: None,
        }
    }

    /// Variant of the current file, once its header has been read
    pub fn kind(&self) -> Option<MstarKind> {
        self.header.map(|h| h.kind())
    }
}

impl Default for MstarCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for MstarCodec {
    fn name(&self) -> &'static str {
        "MSTAR"
    }

    fn state(&self) -> &CodecState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CodecState {
        &mut self.state
    }

    fn can_read(&self, path: &Path) -> bool {
        let header = File::open(path)
            .map_err(Error::from)
            .and_then(|mut file| MstarHeader::read_from(&mut file));
        match header {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "MSTAR rejected file");
                false
            }
        }
    }

    fn can_stream_read(&self) -> bool {
        false
    }

    fn read_image_information(&mut self) -> Result<()> {
        let mut file = File::open(self.state.require_file_name("MSTAR")?)?;
        let header = MstarHeader::read_from(&mut file)?;

        let meta = &mut self.state.metadata;
        meta.dimensions = Dimensions::new(header.columns, header.rows);
        meta.number_of_components = 2;
        meta.component_type = ComponentType::Float;
        meta.pixel_type = PixelType::Vector;
        meta.byte_order = FILE_ORDER;
        meta.check_size()?;

        debug!(
            kind = ?header.kind(),
            columns = header.columns,
            rows = header.rows,
            offset = header.magnitude_offset(),
            "MSTAR header parsed"
        );
        self.header = Some(header);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (region, len) = self.state.checked_region(buffer.len())?;
        if len == 0 {
            return Ok(());
        }

        let mut file = File::open(&self.state.file_name)?;
        let header = MstarHeader::read_from(&mut file)?;
        if Dimensions::new(header.columns, header.rows) != self.state.metadata.dimensions {
            return Err(Error::InvalidFormat(
                "MSTAR header changed since it was read".to_string(),
            ));
        }

        let block = header.block_bytes()?;
        let mut blocks = rows::scratch(block * 2)?;
        rows::read_exact_at(&mut file, header.magnitude_offset(), &mut blocks)?;
        debug!(?region, kind = ?header.kind(), swapped = FILE_ORDER.needs_swap(), "MSTAR read");

        decode_region(&header, &blocks, &region, &mut buffer[..len]);
        Ok(())
    }
}
