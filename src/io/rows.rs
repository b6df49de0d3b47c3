//! Row-addressed region I/O
//!
//! Every raw format here stores a file as `data_offset` bytes of header
//! followed by fixed-stride rows. A region is read or written one row at a
//! time: seek to `data_offset + row_stride * row + pixel_bytes * column`,
//! then transfer `pixel_bytes * width` bytes.

use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::trace;
use crate::error::{Error, Result};
use crate::types::Region;

/// Size of the zero block used when pre-filling files
const FILL_CHUNK: usize = 64 * 1024;

/// On-disk row geometry of one data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Offset of the first pixel of row 0
    pub data_offset: u64,
    /// Bytes between consecutive rows
    pub row_stride: u64,
    /// Bytes of one pixel as stored in this file
    pub pixel_bytes: u64,
}

impl RowLayout {
    /// Layout with explicit geometry
    pub fn new(data_offset: u64, row_stride: u64, pixel_bytes: u64) -> Self {
        Self {
            data_offset,
            row_stride,
            pixel_bytes,
        }
    }

    /// Rows of `columns` pixels stored back to back after `data_offset`
    pub fn packed(data_offset: u64, columns: u64, pixel_bytes: u64) -> Result<Self> {
        let row_stride = columns
            .checked_mul(pixel_bytes)
            .ok_or_else(|| overflow("row stride"))?;
        Ok(Self::new(data_offset, row_stride, pixel_bytes))
    }

    /// File offset of pixel (`column`, `row`)
    pub fn offset(&self, row: u64, column: u64) -> Result<u64> {
        self.row_stride
            .checked_mul(row)
            .and_then(|o| o.checked_add(self.data_offset))
            .and_then(|o| o.checked_add(self.pixel_bytes.checked_mul(column)?))
            .ok_or_else(|| overflow("pixel offset"))
    }

    /// Bytes transferred for one row of `region`
    pub fn region_row_bytes(&self, region: &Region) -> Result<usize> {
        self.pixel_bytes
            .checked_mul(region.width())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| overflow("region row size"))
    }

    /// Bytes needed for all rows of `region` in this file
    pub fn region_bytes(&self, region: &Region) -> Result<usize> {
        usize::try_from(region.height())
            .ok()
            .and_then(|rows| self.region_row_bytes(region).ok()?.checked_mul(rows))
            .ok_or_else(|| overflow("region size"))
    }

    /// Total file length for `rows` rows
    pub fn file_len(&self, rows: u64) -> Result<u64> {
        self.row_stride
            .checked_mul(rows)
            .and_then(|n| n.checked_add(self.data_offset))
            .ok_or_else(|| overflow("file length"))
    }

    /// Reads `region` into `out`, rows packed back to back
    pub fn read_region<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        region: &Region,
        out: &mut [u8],
    ) -> Result<()> {
        let row_bytes = self.region_row_bytes(region)?;
        if row_bytes == 0 {
            return Ok(());
        }
        for (row, chunk) in region.rows().zip(out.chunks_exact_mut(row_bytes)) {
            let offset = self.offset(row, region.first_column())?;
            trace!(row, offset, row_bytes, "reading row");
            read_exact_at(reader, offset, chunk)?;
        }
        Ok(())
    }

    /// Writes `data` (rows packed back to back) at the location of `region`
    pub fn write_region<W: Write + Seek + ?Sized>(
        &self,
        writer: &mut W,
        region: &Region,
        data: &[u8],
    ) -> Result<()> {
        let row_bytes = self.region_row_bytes(region)?;
        if row_bytes == 0 {
            return Ok(());
        }
        for (row, chunk) in region.rows().zip(data.chunks_exact(row_bytes)) {
            let offset = self.offset(row, region.first_column())?;
            trace!(row, offset, row_bytes, "writing row");
            writer.seek(SeekFrom::Start(offset))?;
            writer.write_all(chunk)?;
        }
        Ok(())
    }
}

fn overflow(what: &str) -> Error {
    Error::InvalidFormat(format!("{} overflows", what))
}

/// Reads exactly `buf.len()` bytes at `offset`
///
/// An early end of file surfaces as [`Error::ShortRead`].
pub fn read_exact_at<R: Read + Seek + ?Sized>(
    reader: &mut R,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::ShortRead {
            offset,
            expected: buf.len(),
        },
        _ => Error::Io(e),
    })
}

/// Allocates a zeroed scratch buffer, reporting allocation failure
pub fn scratch(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Allocation(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Writes `len` zero bytes at the current position
pub fn fill_zeros<W: Write + ?Sized>(writer: &mut W, mut len: u64) -> Result<()> {
    let block = [0u8; FILL_CHUNK];
    while len > 0 {
        let n = len.min(FILL_CHUNK as u64) as usize;
        writer.write_all(&block[..n])?;
        len -= n as u64;
    }
    Ok(())
}

/// Copies one band into an interleaved pixel buffer
///
/// `band` holds `band_bytes`-sized values back to back. Value `i` lands at
/// `out[i * pixel_bytes + band_offset ..]`.
pub fn scatter_band(band: &[u8], out: &mut [u8], band_offset: usize, band_bytes: usize, pixel_bytes: usize) {
    for (value, pixel) in band.chunks_exact(band_bytes).zip(out.chunks_exact_mut(pixel_bytes)) {
        pixel[band_offset..band_offset + band_bytes].copy_from_slice(value);
    }
}

/// Extracts one band out of an interleaved pixel buffer
pub fn gather_band(data: &[u8], band: &mut [u8], band_offset: usize, band_bytes: usize, pixel_bytes: usize) {
    for (value, pixel) in band.chunks_exact_mut(band_bytes).zip(data.chunks_exact(pixel_bytes)) {
        value.copy_from_slice(&pixel[band_offset..band_offset + band_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn grid(cols: u8, rows: u8) -> Vec<u8> {
        (0..rows).flat_map(|r| (0..cols).map(move |c| r * 16 + c)).collect()
    }

    #[test]
    fn test_offset() {
        let layout = RowLayout::new(12, 8, 2);
        assert_eq!(layout.offset(0, 0).unwrap(), 12);
        assert_eq!(layout.offset(2, 3).unwrap(), 12 + 16 + 6);
        assert_eq!(layout.file_len(5).unwrap(), 52);
    }

    #[test]
    fn test_geometry_overflow_is_error() {
        assert!(RowLayout::packed(0, u64::MAX, 2).is_err());
        assert_eq!(RowLayout::packed(4, 3, 2).unwrap(), RowLayout::new(4, 6, 2));

        let layout = RowLayout::new(0, 1 << 40, 8);
        assert!(matches!(layout.offset(1 << 30, 0), Err(Error::InvalidFormat(_))));
        assert!(layout.file_len(1 << 30).is_err());

        let wide = Region::new(0, 0, u64::MAX / 4, 1);
        assert!(layout.region_row_bytes(&wide).is_err());
        assert!(layout.region_bytes(&Region::new(0, 0, 1 << 31, 1 << 31)).is_err());
    }

    #[test]
    fn test_read_sub_region() {
        let mut data = vec![0xFFu8; 3];
        data.extend(grid(4, 3));
        let layout = RowLayout::new(3, 4, 1);
        let region = Region::new(1, 1, 2, 2);

        let mut out = vec![0u8; layout.region_bytes(&region).unwrap()];
        layout.read_region(&mut Cursor::new(data), &region, &mut out).unwrap();
        assert_eq!(out, vec![0x11, 0x12, 0x21, 0x22]);
    }

    #[test]
    fn test_read_past_end_is_short_read() {
        let layout = RowLayout::new(0, 4, 1);
        let region = Region::new(0, 0, 4, 3);
        let mut out = vec![0u8; 12];
        let err = layout
            .read_region(&mut Cursor::new(grid(4, 2)), &region, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::ShortRead { offset: 8, expected: 4 }));
    }

    #[test]
    fn test_write_sub_region() {
        let layout = RowLayout::new(2, 3, 1);
        let mut cursor = Cursor::new(vec![0u8; 2 + 9]);
        let region = Region::new(1, 1, 2, 2);
        layout.write_region(&mut cursor, &region, &[1, 2, 3, 4]).unwrap();
        assert_eq!(cursor.into_inner(), vec![0, 0, 0, 0, 0, 0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn test_empty_region_is_noop() {
        let layout = RowLayout::new(0, 4, 1);
        let mut out = [];
        let region = Region::new(0, 0, 0, 5);
        layout.read_region(&mut Cursor::new(Vec::new()), &region, &mut out).unwrap();
    }

    #[test]
    fn test_scatter_and_gather_bands() {
        let mut pixels = vec![0u8; 6];
        scatter_band(&[1, 2, 3], &mut pixels, 0, 1, 2);
        scatter_band(&[7, 8, 9], &mut pixels, 1, 1, 2);
        assert_eq!(pixels, vec![1, 7, 2, 8, 3, 9]);

        let mut band = vec![0u8; 3];
        gather_band(&pixels, &mut band, 1, 1, 2);
        assert_eq!(band, vec![7, 8, 9]);
    }

    #[test]
    fn test_fill_zeros_spans_chunks() {
        let mut out = Vec::new();
        fill_zeros(&mut out, FILL_CHUNK as u64 + 5).unwrap();
        assert_eq!(out.len(), FILL_CHUNK + 5);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_scratch_is_zeroed() {
        let buf = scratch(16).unwrap();
        assert_eq!(buf, vec![0u8; 16]);
    }
}
