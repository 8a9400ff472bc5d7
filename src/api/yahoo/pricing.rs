//! Decoding of the streamer's tick frames.
//!
//! Every text frame carries a base64 string wrapping one protobuf
//! `PricingData` record. Only the identifier, price and timestamp are
//! read; the remaining fields are skipped by wire type.

use crate::error::DecodeError;
use base64::prelude::*;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

const FIELD_ID: u32 = 1;
const FIELD_PRICE: u32 = 2;
const FIELD_TIME: u32 = 3;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub id: String,
    pub price: Decimal,
    pub timestamp_millis: i64,
}

impl PriceTick {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }
}

/// Decodes one inbound text frame into a tick.
pub fn decode_frame(text: &str) -> Result<PriceTick, DecodeError> {
    let bytes = BASE64_STANDARD.decode(text.trim())?;
    decode_record(&bytes)
}

pub fn decode_record(bytes: &[u8]) -> Result<PriceTick, DecodeError> {
    let mut reader = WireReader::new(bytes);
    let mut id = String::new();
    let mut price: Option<Decimal> = None;
    let mut timestamp_millis = 0i64;

    while !reader.is_empty() {
        let key = reader.read_varint("field key")?;
        let field = (key >> 3) as u32;
        let wire_type = (key & 0x07) as u8;

        match (field, wire_type) {
            (FIELD_ID, WIRE_LEN) => {
                let raw = reader.read_len_delimited("id")?;
                id = std::str::from_utf8(raw)
                    .map_err(|_| DecodeError::InvalidIdentifier)?
                    .to_string();
            }
            (FIELD_PRICE, WIRE_FIXED32) => {
                let raw = reader.read_f32("price")?;
                price = Some(to_decimal(raw, f64::from(raw))?);
            }
            (FIELD_PRICE, WIRE_FIXED64) => {
                let raw = reader.read_f64("price")?;
                price = Some(to_decimal(raw, raw)?);
            }
            (FIELD_TIME, WIRE_VARINT) => {
                timestamp_millis = zigzag_decode(reader.read_varint("time")?);
            }
            _ => reader.skip(field, wire_type)?,
        }
    }

    let price = price.ok_or(DecodeError::MissingField("price"))?;
    Ok(PriceTick {
        id,
        price,
        timestamp_millis,
    })
}

// Goes through the shortest decimal rendering so that 36.85f32 stays 36.85.
fn to_decimal(raw: impl std::fmt::Display, widened: f64) -> Result<Decimal, DecodeError> {
    if !widened.is_finite() {
        return Err(DecodeError::InvalidPrice(widened));
    }
    Decimal::from_str(&raw.to_string()).map_err(|_| DecodeError::InvalidPrice(widened))
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::Truncated(what))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_varint(&mut self, what: &'static str) -> Result<u64, DecodeError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or(DecodeError::Truncated(what))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        // More than ten bytes is never a valid varint.
        Err(DecodeError::Truncated(what))
    }

    fn read_f32(&mut self, what: &'static str) -> Result<f32, DecodeError> {
        Ok(LittleEndian::read_f32(self.take(4, what)?))
    }

    fn read_f64(&mut self, what: &'static str) -> Result<f64, DecodeError> {
        Ok(LittleEndian::read_f64(self.take(8, what)?))
    }

    fn read_len_delimited(&mut self, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint(what)?;
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated(what))?;
        self.take(len, what)
    }

    fn skip(&mut self, field: u32, wire_type: u8) -> Result<(), DecodeError> {
        match wire_type {
            WIRE_VARINT => self.read_varint("skipped field").map(|_| ()),
            WIRE_FIXED64 => self.take(8, "skipped field").map(|_| ()),
            WIRE_LEN => self.read_len_delimited("skipped field").map(|_| ()),
            WIRE_FIXED32 => self.take(4, "skipped field").map(|_| ()),
            _ => Err(DecodeError::UnsupportedWireType { field, wire_type }),
        }
    }
}
