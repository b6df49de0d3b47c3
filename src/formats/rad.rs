//! RAD format
//!
//! A `.rad` header lists the image geometry, a pixel code and one raw band
//! file per channel. Complex codes store each channel as interleaved
//! (real, imaginary) pairs, so one channel contributes two components.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::formats::bsq::MAX_CHANNELS;
use crate::formats::header::Tokens;
use crate::formats::{has_extension, stem, CodecState, ImageCodec};
use crate::io::rows::{self, RowLayout};
use crate::io::{reconcile, ByteOrder};
use crate::types::{ComponentType, Dimensions, PixelType};

/// RAD pixel codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadCode {
    Oct,
    Pha,
    I2,
    I4,
    R4,
    Ci2,
    Cr4,
    Coct,
    Ci4,
    Cr8,
}

impl RadCode {
    pub fn parse(code: &str) -> Option<Self> {
        Some(match code.to_ascii_uppercase().as_str() {
            "OCT" => RadCode::Oct,
            "PHA" => RadCode::Pha,
            "I2" => RadCode::I2,
            "I4" => RadCode::I4,
            "R4" => RadCode::R4,
            "CI2" => RadCode::Ci2,
            "CR4" => RadCode::Cr4,
            "COCT" => RadCode::Coct,
            "CI4" => RadCode::Ci4,
            "CR8" => RadCode::Cr8,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RadCode::Oct => "OCT",
            RadCode::Pha => "PHA",
            RadCode::I2 => "I2",
            RadCode::I4 => "I4",
            RadCode::R4 => "R4",
            RadCode::Ci2 => "CI2",
            RadCode::Cr4 => "CR4",
            RadCode::Coct => "COCT",
            RadCode::Ci4 => "CI4",
            RadCode::Cr8 => "CR8",
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            RadCode::Oct | RadCode::Coct => ComponentType::UChar,
            RadCode::Pha => ComponentType::Char,
            RadCode::I2 | RadCode::Ci2 => ComponentType::Short,
            RadCode::I4 | RadCode::Ci4 => ComponentType::Int,
            RadCode::R4 | RadCode::Cr4 => ComponentType::Float,
            RadCode::Cr8 => ComponentType::Double,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            RadCode::Ci2 | RadCode::Cr4 | RadCode::Coct | RadCode::Ci4 | RadCode::Cr8
        )
    }

    /// Components stored per channel
    pub fn components_per_channel(&self) -> usize {
        if self.is_complex() {
            2
        } else {
            1
        }
    }

    /// Code able to store `component` values, complex or not
    pub fn for_component(component: ComponentType, complex: bool) -> Option<Self> {
        let code = match (component, complex) {
            (ComponentType::UChar, false) => RadCode::Oct,
            (ComponentType::Char, false) => RadCode::Pha,
            (ComponentType::Short, false) => RadCode::I2,
            (ComponentType::Int, false) => RadCode::I4,
            (ComponentType::Float, false) => RadCode::R4,
            (ComponentType::Short, true) => RadCode::Ci2,
            (ComponentType::Float, true) => RadCode::Cr4,
            (ComponentType::UChar, true) => RadCode::Coct,
            (ComponentType::Int, true) => RadCode::Ci4,
            (ComponentType::Double, true) => RadCode::Cr8,
            _ => return None,
        };
        Some(code)
    }
}

/// Contents of a `.rad` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadHeader {
    pub columns: u64,
    pub lines: u64,
    pub channels: usize,
    pub code: RadCode,
    pub byte_order: ByteOrder,
    /// Band file names as written in the header
    pub band_names: Vec<String>,
}

impl RadHeader {
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);

        tokens.expect(&["NBCOLONNES", "NBCOLUMNS"])?;
        let columns: u64 = tokens.value("NBCOLUMNS")?;
        tokens.expect(&["NBLIGNES", "NBLINES"])?;
        let lines: u64 = tokens.value("NBLINES")?;
        tokens.expect(&["NBPLANS", "NBBANDS"])?;
        let channels: usize = tokens.value("NBBANDS")?;
        if channels > MAX_CHANNELS {
            return Err(Error::InvalidFormat(format!(
                "RAD header declares {} bands, at most {} are supported",
                channels, MAX_CHANNELS
            )));
        }
        tokens.expect(&["TYPECODAGE", "TYPE"])?;
        let raw = tokens
            .next_token()
            .ok_or_else(|| Error::MissingToken("TYPECODAGE value".to_string()))?;
        let code = RadCode::parse(raw)
            .ok_or_else(|| Error::Unsupported(format!("RAD type '{}'", raw)))?;

        let byte_order = if tokens.peek_is(&["SENSCODAGE", "ORDER"]) {
            tokens.expect(&["SENSCODAGE", "ORDER"])?;
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
                "RAD header declares {} bands of {} x {}",
                channels, columns, lines
            )));
        }
        let channel_bytes = code.component_type().size() * code.components_per_channel();
        Dimensions::new(columns, lines).byte_size(channel_bytes as u64)?;

        let band_names = (1..=channels)
            .map(|i| {
                tokens
                    .next_token()
                    .map(str::to_string)
                    .ok_or_else(|| Error::MissingToken(format!("band file {}", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            columns,
            lines,
            channels,
            code,
            byte_order,
            band_names,
        })
    }

    /// Header text in the layout this crate writes
    pub fn render(&self) -> String {
        let mut text = format!(
            "NBCOLUMNS {}\nNBLINES {}\nNBBANDS {}\nTYPECODAGE {}\nSENSCODAGE {}\n",
            self.columns,
            self.lines,
            self.channels,
            self.code.as_str(),
            self.byte_order.senscodage()
        );
        for name in &self.band_names {
            text.push_str(name);
            text.push('\n');
        }
        text
    }

    /// Band file paths, resolved next to the header at `path`
    pub fn band_paths(&self, path: &Path) -> Vec<PathBuf> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.band_names.iter().map(|name| dir.join(name)).collect()
    }
}

/// RAD multi-file reader/writer
pub struct RadCodec {
    state: CodecState,
    code: Option<RadCode>,
    band_files: Vec<PathBuf>,
    header_written: bool,
}

impl RadCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            state: CodecState::new(options),
            code: None,
            band_files: Vec::new(),
            header_written: false,
        }
    }

    pub fn band_files(&self) -> &[PathBuf] {
        &self.band_files
    }

    fn accepts_path(path: &Path) -> bool {
        has_extension(path, "rad") && !path.is_dir()
    }

    fn check_files(path: &Path) -> Result<()> {
        let header = RadHeader::parse(&fs::read_to_string(path)?)?;
        for band in header.band_paths(path) {
            File::open(&band)?;
        }
        Ok(())
    }

    /// Layout of one band file, whose pixels hold `components_per_channel` values
    fn layout(&self, code: RadCode) -> Result<RowLayout> {
        let meta = &self.state.metadata;
        let pixel = (meta.bytes_per_component() * code.components_per_channel()) as u64;
        RowLayout::packed(0, meta.dimensions.width, pixel)
    }

    fn current_code(&self) -> Result<RadCode> {
        self.code
            .ok_or_else(|| Error::InvalidFormat("RAD header has not been read".to_string()))
    }
}

impl Default for RadCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for RadCodec {
    fn name(&self) -> &'static str {
        "RAD"
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
                debug!(path = %path.display(), error = %e, "RAD rejected file");
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
        let path = self.state.require_file_name("RAD")?.to_path_buf();
        let header = RadHeader::parse(&fs::read_to_string(&path)?)?;
        let bands = header.band_paths(&path);
        for band in &bands {
            if !band.is_file() {
                return Err(Error::InvalidFormat(format!(
                    "RAD band file {} not found",
                    band.display()
                )));
            }
        }

        let meta = &mut self.state.metadata;
        meta.dimensions = Dimensions::new(header.columns, header.lines);
        meta.component_type = header.code.component_type();
        meta.number_of_components = header.channels * header.code.components_per_channel();
        meta.byte_order = header.byte_order;
        meta.pixel_type = if header.code.is_complex() {
            PixelType::Complex
        } else if header.channels == 1 {
            PixelType::Scalar
        } else {
            PixelType::Vector
        };
        meta.check_size()?;
        self.code = Some(header.code);
        self.band_files = bands;

        debug!(
            columns = header.columns,
            lines = header.lines,
            channels = header.channels,
            code = header.code.as_str(),
            byte_order = ?header.byte_order,
            "RAD header parsed"
        );
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (region, len) = self.state.checked_region(buffer.len())?;
        let code = self.current_code()?;
        let layout = self.layout(code)?;
        let meta = &self.state.metadata;
        let channel_bytes = layout.pixel_bytes as usize;
        debug!(?region, code = code.as_str(), "RAD read");

        let out = &mut buffer[..len];
        let mut band = rows::scratch(layout.region_bytes(&region)?)?;
        for (index, path) in self.band_files.iter().enumerate() {
            let mut file = File::open(path)?;
            layout.read_region(&mut file, &region, &mut band)?;
            rows::scatter_band(&band, out, index * channel_bytes, channel_bytes, meta.bytes_per_pixel());
        }

        reconcile(out, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold);
        Ok(())
    }

    fn write_image_information(&mut self) -> Result<()> {
        let path = self.state.require_file_name("RAD")?.to_path_buf();
        if !self.can_write(&path) {
            return Err(Error::InvalidFormat(format!(
                "{} is not a RAD file name",
                path.display()
            )));
        }

        let order = self.state.options.write_byte_order;
        let meta = &mut self.state.metadata;
        let complex = meta.pixel_type == PixelType::Complex;
        let code = RadCode::for_component(meta.component_type, complex).ok_or_else(|| {
            Error::Unsupported(format!(
                "RAD cannot store {:?} {} pixels",
                meta.pixel_type,
                meta.component_type.name()
            ))
        })?;
        let per_channel = code.components_per_channel();
        if meta.number_of_components == 0 || meta.number_of_components % per_channel != 0 {
            return Err(Error::InvalidFormat(format!(
                "{} components do not form whole RAD channels",
                meta.number_of_components
            )));
        }
        if meta.dimensions.width == 0 || meta.dimensions.height == 0 {
            return Err(Error::InvalidFormat("RAD dimensions are not defined".to_string()));
        }
        let channels = meta.number_of_components / per_channel;
        if channels > MAX_CHANNELS {
            return Err(Error::InvalidFormat(format!("RAD cannot store {} bands", channels)));
        }
        meta.check_size()?;
        meta.byte_order = order;

        let root = stem(&path);
        let extension = code.as_str().to_ascii_lowercase();
        let header = RadHeader {
            columns: meta.dimensions.width,
            lines: meta.dimensions.height,
            channels,
            code,
            byte_order: order,
            band_names: (1..=channels)
                .map(|i| format!("{}_{}.{}", root, i, extension))
                .collect(),
        };
        fs::write(&path, header.render())?;
        self.code = Some(code);

        let layout = self.layout(code)?;
        let band_len = layout.file_len(header.lines)?;
        let bands = header.band_paths(&path);
        for band in &bands {
            let mut file = File::create(band)?;
            rows::fill_zeros(&mut file, band_len)?;
            file.flush()?;
        }
        self.band_files = bands;
        self.header_written = true;

        debug!(path = %path.display(), channels, code = code.as_str(), "RAD files created");
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if !self.header_written {
            self.write_image_information()?;
        }
        let (region, len) = self.state.checked_region(buffer.len())?;
        let code = self.current_code()?;
        let layout = self.layout(code)?;
        let meta = &self.state.metadata;
        let channel_bytes = layout.pixel_bytes as usize;
        debug!(?region, "RAD write");

        let mut band = rows::scratch(layout.region_bytes(&region)?)?;
        for (index, path) in self.band_files.iter().enumerate() {
            rows::gather_band(&buffer[..len], &mut band, index * channel_bytes, channel_bytes, meta.bytes_per_pixel());
            reconcile(&mut band, meta.component_type, meta.byte_order, self.state.options.parallel_swap_threshold);
            let mut file = OpenOptions::new().write(true).open(path)?;
            layout.write_region(&mut file, &region, &band)?;
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::test_support::{f32s, temp_dir, write_file};
    use crate::types::Region;

    #[test]
    fn test_parse_header() {
        let header = RadHeader::parse(
            "NBCOLONNES 4\nNBLIGNES 3\nNBPLANS 2\nTYPECODAGE cr4\nSENSCODAGE INTEL\na.cr4\nb.cr4\n",
        )
        .unwrap();
        assert_eq!((header.columns, header.lines, header.channels), (4, 3, 2));
        assert_eq!(header.code, RadCode::Cr4);
        assert_eq!(header.byte_order, ByteOrder::LittleEndian);
        assert_eq!(header.band_names, vec!["a.cr4", "b.cr4"]);
    }

    #[test]
    fn test_parse_without_order_keeps_first_band() {
        let header = RadHeader::parse("NBCOLUMNS 1 NBLINES 1 NBBANDS 1 TYPE OCT band.oct").unwrap();
        assert_eq!(header.byte_order, ByteOrder::host());
        assert_eq!(header.band_names, vec!["band.oct"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RadHeader::parse("NBCOLUMNS 1 NBLINES 1 NBBANDS 1 TYPE C3B x"),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            RadHeader::parse("NBCOLUMNS 1 NBLINES 1 NBBANDS 2 TYPE I2 ORDER IEEE one"),
            Err(Error::MissingToken(_))
        ));
        assert!(matches!(
            RadHeader::parse("NBLINES 1"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_rejects_huge_headers() {
        assert!(matches!(
            RadHeader::parse("NBCOLUMNS 1 NBLINES 1 NBBANDS 1000000000000 TYPE OCT a.oct"),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            RadHeader::parse("NBCOLUMNS 4294967296 NBLINES 4294967296 NBBANDS 1 TYPE CR8 a.cr8"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_render_lists_band_names() {
        let header = RadHeader {
            columns: 2,
            lines: 1,
            channels: 2,
            code: RadCode::I2,
            byte_order: ByteOrder::BigEndian,
            band_names: vec!["x_1.i2".to_string(), "x_2.i2".to_string()],
        };
        let text = header.render();
        assert!(text.ends_with("x_1.i2\nx_2.i2\n"));
        assert_eq!(RadHeader::parse(&text).unwrap(), header);
    }

    #[test]
    fn test_code_table() {
        for raw in ["OCT", "PHA", "I2", "I4", "R4", "CI2", "CR4", "COCT", "CI4", "CR8"] {
            let code = RadCode::parse(raw).unwrap();
            assert_eq!(code.as_str(), raw);
            assert_eq!(
                RadCode::for_component(code.component_type(), code.is_complex()),
                Some(code)
            );
        }
        assert_eq!(RadCode::for_component(ComponentType::UShort, false), None);
    }

    #[test]
    fn test_read_complex_two_channels() {
        let dir = temp_dir();
        let header = "NBCOLUMNS 2\nNBLINES 1\nNBBANDS 2\nTYPECODAGE CR4\nSENSCODAGE IEEE\nre.cr4\nim.cr4\n";
        let path = write_file(dir.path(), "img.rad", header.as_bytes());
        let band = |base: f32| -> Vec<u8> {
            [base, base + 0.5, base + 1.0, base + 1.5]
                .iter()
                .flat_map(|v| v.to_be_bytes())
                .collect()
        };
        write_file(dir.path(), "re.cr4", &band(1.0));
        write_file(dir.path(), "im.cr4", &band(10.0));

        let mut codec = RadCodec::new();
        assert!(codec.can_read(&path));
        codec.set_file_name(&path);
        codec.read_image_information().unwrap();
        let meta = codec.metadata();
        assert_eq!(meta.number_of_components, 4);
        assert_eq!(meta.pixel_type, PixelType::Complex);

        codec.set_region(Region::new(1, 0, 1, 1));
        let mut buffer = vec![0u8; 16];
        codec.read(&mut buffer).unwrap();
        assert_eq!(f32s(&buffer), vec![2.0, 2.5, 11.0, 11.5]);
    }

    #[test]
    fn test_can_read_rejects_missing_band() {
        let dir = temp_dir();
        let path = write_file(
            dir.path(),
            "img.rad",
            b"NBCOLUMNS 1 NBLINES 1 NBBANDS 1 TYPE OCT gone.oct",
        );
        assert!(!RadCodec::new().can_read(&path));
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = temp_dir();
        let path = dir.path().join("out.rad");
        let options = CodecOptions::new().write_byte_order(ByteOrder::BigEndian);

        let mut writer = RadCodec::with_options(options);
        writer.set_file_name(&path);
        {
            let meta = writer.metadata_mut();
            meta.dimensions = Dimensions::new(2, 2);
            meta.component_type = ComponentType::Short;
            meta.number_of_components = 2;
            meta.pixel_type = PixelType::Vector;
        }
        writer.write_image_information().unwrap();
        assert!(dir.path().join("out_1.i2").is_file());
        assert!(dir.path().join("out_2.i2").is_file());

        let pixels: Vec<u8> = [1i16, -1, 2, -2, 3, -3, 4, -4].iter().flat_map(|v| v.to_ne_bytes()).collect();
        writer.set_region(Region::new(0, 0, 2, 2));
        writer.write(&pixels).unwrap();
        assert_eq!(
            fs::read(dir.path().join("out_1.i2")).unwrap(),
            vec![0, 1, 0, 2, 0, 3, 0, 4]
        );

        let mut reader = RadCodec::new();
        assert!(reader.can_read(&path));
        reader.set_file_name(&path);
        reader.read_image_information().unwrap();
        assert_eq!(reader.metadata().pixel_type, PixelType::Vector);
        reader.set_region(Region::new(0, 0, 2, 2));
        let mut buffer = vec![0u8; pixels.len()];
        reader.read(&mut buffer).unwrap();
        assert_eq!(buffer, pixels);
    }

    #[test]
    fn test_write_rejects_unmapped_type() {
        let dir = temp_dir();
        let mut codec = RadCodec::new();
        codec.set_file_name(&dir.path().join("u.rad"));
        codec.metadata_mut().dimensions = Dimensions::new(1, 1);
        codec.metadata_mut().component_type = ComponentType::UShort;
        assert!(matches!(codec.write_image_information(), Err(Error::Unsupported(_))));
    }
}
