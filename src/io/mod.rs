//! I/O utilities for skyforest-codecs
//!
//! Byte-order reconciliation and row-addressed region transfer shared by
//! every format codec.

pub mod byte_order;
pub mod rows;

pub use byte_order::{ByteOrder, reconcile, reinterpret_swapped, swap_bytes2, swap_bytes4};
pub use rows::RowLayout;
