//! Endian-aware write support
//!
//! `ByteOrderHandler` (see `byte_order.rs`) only reads. Writers need the
//! mirror image: encode values in a chosen byte order. This keeps the same
//! Strategy-pattern shape so writer code can hold a `Box<dyn EndianWriter>`
//! exactly the way the reader holds a `Box<dyn ByteOrderHandler>`.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::{Result, Write};

use crate::io::byte_order::ByteOrder;

/// Trait for byte-order-aware writing, the write-side counterpart of
/// `ByteOrderHandler`.
pub trait EndianWriter: Send + Sync {
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()>;
    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()>;
    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()>;
    fn write_f32(&self, writer: &mut dyn Write, value: f32) -> Result<()>;
    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()>;
    fn write_rational(&self, writer: &mut dyn Write, numerator: u32, denominator: u32) -> Result<()>;
    fn write_srational(&self, writer: &mut dyn Write, numerator: i32, denominator: i32) -> Result<()>;
}

impl ByteOrder {
    /// Creates the write-side handler matching this byte order.
    pub fn create_writer(&self) -> Box<dyn EndianWriter> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianWriter),
            ByteOrder::BigEndian => Box::new(BigEndianWriter),
        }
    }
}

/// Little-endian encoder
pub struct LittleEndianWriter;

impl EndianWriter for LittleEndianWriter {
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_u16::<LittleEndian>(value)
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_u32::<LittleEndian>(value)
    }

    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()> {
        writer.write_u64::<LittleEndian>(value)
    }

    fn write_f32(&self, writer: &mut dyn Write, value: f32) -> Result<()> {
        writer.write_f32::<LittleEndian>(value)
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_f64::<LittleEndian>(value)
    }

    fn write_rational(&self, writer: &mut dyn Write, numerator: u32, denominator: u32) -> Result<()> {
        writer.write_u32::<LittleEndian>(numerator)?;
        writer.write_u32::<LittleEndian>(denominator)
    }

    fn write_srational(&self, writer: &mut dyn Write, numerator: i32, denominator: i32) -> Result<()> {
        writer.write_i32::<LittleEndian>(numerator)?;
        writer.write_i32::<LittleEndian>(denominator)
    }
}

/// Big-endian encoder
pub struct BigEndianWriter;

impl EndianWriter for BigEndianWriter {
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_u16::<BigEndian>(value)
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_u32::<BigEndian>(value)
    }

    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()> {
        writer.write_u64::<BigEndian>(value)
    }

    fn write_f32(&self, writer: &mut dyn Write, value: f32) -> Result<()> {
        writer.write_f32::<BigEndian>(value)
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_f64::<BigEndian>(value)
    }

    fn write_rational(&self, writer: &mut dyn Write, numerator: u32, denominator: u32) -> Result<()> {
        writer.write_u32::<BigEndian>(numerator)?;
        writer.write_u32::<BigEndian>(denominator)
    }

    fn write_srational(&self, writer: &mut dyn Write, numerator: i32, denominator: i32) -> Result<()> {
        writer.write_i32::<BigEndian>(numerator)?;
        writer.write_i32::<BigEndian>(denominator)
    }
}
