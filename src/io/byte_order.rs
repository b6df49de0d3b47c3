//! Byte order (endianness) handling
//!
//! Host detection, fixed-width byte swaps and whole-buffer reconciliation
//! between the byte order a file declares and the byte order of the host.

use std::io::{Read, Result, Write};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::types::ComponentType;

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the running host
    ///
    /// Inspects the in-memory layout of the 2-byte value 1.
    pub const fn host() -> Self {
        if 1u16.to_ne_bytes()[0] == 1 {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    /// Whether values stored in this order must be swapped on this host
    pub fn needs_swap(&self) -> bool {
        *self != Self::host()
    }

    /// Parses the `SENSCODAGE` keyword value of BSQ/RAD headers
    pub fn from_senscodage(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INTEL" => Some(ByteOrder::LittleEndian),
            "IEEE" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// `SENSCODAGE` keyword value for this order
    pub fn senscodage(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "INTEL",
            ByteOrder::BigEndian => "IEEE",
        }
    }

    /// Reads an unsigned 16-bit integer stored in this order
    pub fn read_u16<R: Read + ?Sized>(&self, reader: &mut R) -> Result<u16> {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf)?;
        Ok(match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(buf),
            ByteOrder::BigEndian => u16::from_be_bytes(buf),
        })
    }

    /// Reads an unsigned 32-bit integer stored in this order
    pub fn read_u32<R: Read + ?Sized>(&self, reader: &mut R) -> Result<u32> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(buf),
            ByteOrder::BigEndian => u32::from_be_bytes(buf),
        })
    }

    /// Decodes a signed 32-bit integer stored in this order
    pub fn i32_from_bytes(&self, bytes: [u8; 4]) -> i32 {
        match self {
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
        }
    }

    /// Encodes a signed 32-bit integer in this order
    pub fn i32_to_bytes(&self, value: i32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Writes an unsigned 16-bit integer in this order
    pub fn write_u16<W: Write + ?Sized>(&self, writer: &mut W, value: u16) -> Result<()> {
        let bytes = match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        };
        writer.write_all(&bytes)
    }

    /// Writes an unsigned 32-bit integer in this order
    pub fn write_u32<W: Write + ?Sized>(&self, writer: &mut W, value: u32) -> Result<()> {
        let bytes = match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        };
        writer.write_all(&bytes)
    }
}

/// Reverses a 2-byte value
pub fn swap_bytes2(raw: [u8; 2]) -> [u8; 2] {
    [raw[1], raw[0]]
}

/// Reverses a 4-byte value
pub fn swap_bytes4(raw: [u8; 4]) -> [u8; 4] {
    [raw[3], raw[2], raw[1], raw[0]]
}

/// Fixed-width scalar that can be rebuilt from byte-swapped storage
pub trait SwappedScalar: Sized {
    /// Raw storage of the scalar
    type Bytes;

    /// Swaps `bytes` and reinterprets them as a host-order value
    fn from_swapped(bytes: Self::Bytes) -> Self;
}

impl SwappedScalar for u16 {
    type Bytes = [u8; 2];

    fn from_swapped(bytes: [u8; 2]) -> Self {
        u16::from_ne_bytes(swap_bytes2(bytes))
    }
}

impl SwappedScalar for i16 {
    type Bytes = [u8; 2];

    fn from_swapped(bytes: [u8; 2]) -> Self {
        i16::from_ne_bytes(swap_bytes2(bytes))
    }
}

impl SwappedScalar for u32 {
    type Bytes = [u8; 4];

    fn from_swapped(bytes: [u8; 4]) -> Self {
        u32::from_ne_bytes(swap_bytes4(bytes))
    }
}

impl SwappedScalar for f32 {
    type Bytes = [u8; 4];

    fn from_swapped(bytes: [u8; 4]) -> Self {
        f32::from_ne_bytes(swap_bytes4(bytes))
    }
}

/// Swaps `bytes` then reinterprets them as `T`
pub fn reinterpret_swapped<T: SwappedScalar>(bytes: T::Bytes) -> T {
    T::from_swapped(bytes)
}

/// Reverses every `component_size`-byte value of `buffer` in place
///
/// Buffers longer than `parallel_threshold` bytes are split across the
/// rayon pool. One-byte components are left untouched.
pub fn swap_buffer(buffer: &mut [u8], component_size: usize, parallel_threshold: usize) {
    if component_size <= 1 {
        return;
    }
    if buffer.len() > parallel_threshold {
        buffer
            .par_chunks_exact_mut(component_size)
            .for_each(|value| value.reverse());
    } else {
        buffer
            .chunks_exact_mut(component_size)
            .for_each(|value| value.reverse());
    }
}

/// Converts `buffer` between `file_order` and host order when they differ
///
/// Returns whether a swap happened. The conversion is symmetric, so the
/// same call serves file-to-host after a read and host-to-file before a write.
pub fn reconcile(
    buffer: &mut [u8],
    component: ComponentType,
    file_order: ByteOrder,
    parallel_threshold: usize,
) -> bool {
    if !file_order.needs_swap() || component.size() == 1 {
        return false;
    }
    swap_buffer(buffer, component.size(), parallel_threshold);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_host_matches_target_endian() {
        if cfg!(target_endian = "little") {
            assert_eq!(ByteOrder::host(), ByteOrder::LittleEndian);
        } else {
            assert_eq!(ByteOrder::host(), ByteOrder::BigEndian);
        }
        assert!(!ByteOrder::host().needs_swap());
    }

    #[test]
    fn test_senscodage() {
        assert_eq!(ByteOrder::from_senscodage("intel"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_senscodage("IEEE"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_senscodage("MOTOROLA"), None);
        assert_eq!(ByteOrder::BigEndian.senscodage(), "IEEE");
    }

    #[test]
    fn test_little_endian_read_u16() {
        let mut cursor = Cursor::new(vec![0x34u8, 0x12]);
        assert_eq!(ByteOrder::LittleEndian.read_u16(&mut cursor).unwrap(), 0x1234);
    }

    #[test]
    fn test_big_endian_read_u32() {
        let mut cursor = Cursor::new(vec![0x12u8, 0x34, 0x56, 0x78]);
        assert_eq!(ByteOrder::BigEndian.read_u32(&mut cursor).unwrap(), 0x12345678);
    }

    #[test]
    fn test_read_short_input_fails() {
        let mut cursor = Cursor::new(vec![0x12u8, 0x34]);
        assert!(ByteOrder::BigEndian.read_u32(&mut cursor).is_err());
    }

    #[test]
    fn test_i32_bytes_both_orders() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let bytes = order.i32_to_bytes(-123456);
            assert_eq!(order.i32_from_bytes(bytes), -123456);
        }
        assert_eq!(ByteOrder::BigEndian.i32_to_bytes(2), [0, 0, 0, 2]);
    }

    #[test]
    fn test_write_u16_little_endian() {
        let mut out = Vec::new();
        ByteOrder::LittleEndian.write_u16(&mut out, 0x0102).unwrap();
        ByteOrder::BigEndian.write_u32(&mut out, 0x0A0B0C0D).unwrap();
        assert_eq!(out, vec![0x02, 0x01, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_swap_bytes() {
        assert_eq!(swap_bytes2([1, 2]), [2, 1]);
        assert_eq!(swap_bytes4([1, 2, 3, 4]), [4, 3, 2, 1]);
    }

    #[test]
    fn test_swap_bytes4_twice_is_identity() {
        for value in [0u32, 1, 0xDEADBEEF, u32::MAX, 0x7F800001] {
            let raw = value.to_ne_bytes();
            assert_eq!(swap_bytes4(swap_bytes4(raw)), raw);
        }
    }

    #[test]
    fn test_reinterpret_swapped_u16() {
        let stored = swap_bytes2(0xBEEFu16.to_ne_bytes());
        assert_eq!(reinterpret_swapped::<u16>(stored), 0xBEEF);
    }

    #[test]
    fn test_reinterpret_swapped_f32() {
        let big = 1.5f32.to_be_bytes();
        let decoded: f32 = if ByteOrder::BigEndian.needs_swap() {
            reinterpret_swapped(big)
        } else {
            f32::from_ne_bytes(big)
        };
        assert_eq!(decoded, 1.5);
    }

    #[test]
    fn test_swap_buffer_sequential_and_parallel() {
        let mut small = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_buffer(&mut small, 4, usize::MAX);
        assert_eq!(small, vec![4, 3, 2, 1, 8, 7, 6, 5]);

        let mut large: Vec<u8> = (0..64).collect();
        swap_buffer(&mut large, 2, 0);
        assert_eq!(&large[..4], &[1, 0, 3, 2]);
    }

    #[test]
    fn test_swap_buffer_ignores_single_bytes() {
        let mut data = vec![1u8, 2, 3];
        swap_buffer(&mut data, 1, 0);
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn test_reconcile_foreign_order() {
        let foreign = if ByteOrder::host() == ByteOrder::LittleEndian {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let mut data = 0x0102u16.to_ne_bytes().to_vec();
        assert!(reconcile(&mut data, ComponentType::UShort, foreign, usize::MAX));
        assert_eq!(u16::from_ne_bytes([data[0], data[1]]), 0x0201);

        assert!(!reconcile(&mut data, ComponentType::UShort, ByteOrder::host(), usize::MAX));
        assert!(!reconcile(&mut data, ComponentType::UChar, foreign, usize::MAX));
    }
}
