use crate::define::{OscBundle, OscMessage, OscPacket, OscTag, OscTimeTag, OscValue};
use crate::error::OscReadError;

/// Bundles nested deeper than this are rejected.
pub const MAX_BUNDLE_DEPTH: usize = 16;

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// An OSC packet decoder.
///
/// Works on one datagram at a time. Positions are 4-byte aligned relative to
/// the start of the slice, so nested bundle elements are decoded with their
/// own decoder over the element slice.
pub struct OscDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> OscDecoder<'a> {
    /// Create a new OSC decoder.
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    const fn nested(data: &'a [u8], depth: usize) -> Self {
        Self {
            data,
            pos: 0,
            depth,
        }
    }

    /// Check if the decoder has consumed all of its input.
    pub const fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read `len` bytes from the buffer, advancing the position.
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], OscReadError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(OscReadError::UnexpectedEof)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], OscReadError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_u32_be(&mut self) -> Result<u32, OscReadError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_i32_be(&mut self) -> Result<i32, OscReadError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_i64_be(&mut self) -> Result<i64, OscReadError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_f32_be(&mut self) -> Result<f32, OscReadError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    fn read_f64_be(&mut self) -> Result<f64, OscReadError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Skip padding up to the next 4-byte boundary.
    fn align(&mut self) -> Result<(), OscReadError> {
        let padding = (4 - self.pos % 4) % 4;
        self.read_bytes(padding).map(|_| ())
    }

    /// Read a null-terminated, 4-byte padded OSC-string.
    fn read_string(&mut self) -> Result<&'a str, OscReadError> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(OscReadError::UnterminatedString)?;
        let bytes = self.read_bytes(len)?;
        // terminator
        self.read_bytes(1)?;
        self.align()?;
        Ok(std::str::from_utf8(bytes)?)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, OscReadError> {
        let len = self.read_i32_be()?;
        let len = usize::try_from(len).map_err(|_| OscReadError::InvalidSize(len))?;
        let bytes = self.read_bytes(len)?.to_vec();
        self.align()?;
        Ok(bytes)
    }

    fn read_timetag(&mut self) -> Result<OscTimeTag, OscReadError> {
        Ok(OscTimeTag {
            seconds: self.read_u32_be()?,
            fraction: self.read_u32_be()?,
        })
    }

    /// Decode the whole input as one packet.
    pub fn decode(&mut self) -> Result<OscPacket, OscReadError> {
        match self.data.first() {
            Some(b'/') => Ok(OscPacket::Message(self.decode_message()?)),
            Some(b'#') if self.data.starts_with(BUNDLE_TAG) => {
                Ok(OscPacket::Bundle(self.decode_bundle()?))
            }
            Some(_) => Err(OscReadError::InvalidPacket(
                "packet must start with '/' or '#bundle'",
            )),
            None => Err(OscReadError::UnexpectedEof),
        }
    }

    fn decode_message(&mut self) -> Result<OscMessage, OscReadError> {
        let addr = self.read_string()?.to_string();

        // Very old senders omit the type tag string entirely.
        if self.is_empty() {
            return Ok(OscMessage::new(addr, Vec::new()));
        }

        let tags = self.read_string()?;
        let tags = tags.strip_prefix(',').ok_or(OscReadError::InvalidPacket(
            "type tag string must start with ','",
        ))?;

        let mut args = Vec::with_capacity(tags.len());
        for byte in tags.bytes() {
            let tag = OscTag::try_from(byte).map_err(|b| OscReadError::UnknownTypeTag(b as char))?;
            args.push(self.read_value(tag)?);
        }

        Ok(OscMessage::new(addr, args))
    }

    fn read_value(&mut self, tag: OscTag) -> Result<OscValue, OscReadError> {
        let value = match tag {
            OscTag::Int => OscValue::Int(self.read_i32_be()?),
            OscTag::Float => OscValue::Float(self.read_f32_be()?),
            OscTag::String | OscTag::Symbol => OscValue::String(self.read_string()?.to_string()),
            OscTag::Blob => OscValue::Blob(self.read_blob()?),
            OscTag::Long => OscValue::Long(self.read_i64_be()?),
            OscTag::Double => OscValue::Double(self.read_f64_be()?),
            OscTag::TimeTag => OscValue::TimeTag(self.read_timetag()?),
            OscTag::Char => {
                let raw = self.read_u32_be()?;
                OscValue::Char(char::from_u32(raw).unwrap_or(char::REPLACEMENT_CHARACTER))
            }
            OscTag::Color => OscValue::Color(self.read_u32_be()?),
            OscTag::Midi => OscValue::Midi(self.read_array()?),
            OscTag::True => OscValue::Bool(true),
            OscTag::False => OscValue::Bool(false),
            OscTag::Nil => OscValue::Nil,
            OscTag::Inf => OscValue::Inf,
        };
        Ok(value)
    }

    fn decode_bundle(&mut self) -> Result<OscBundle, OscReadError> {
        if self.depth >= MAX_BUNDLE_DEPTH {
            return Err(OscReadError::TooDeep(MAX_BUNDLE_DEPTH));
        }

        self.read_bytes(BUNDLE_TAG.len())?;
        let timetag = self.read_timetag()?;

        let mut content = Vec::new();
        while !self.is_empty() {
            let size = self.read_i32_be()?;
            let len = usize::try_from(size)
                .ok()
                .filter(|len| len % 4 == 0)
                .ok_or(OscReadError::InvalidSize(size))?;
            let element = self.read_bytes(len)?;
            content.push(OscDecoder::nested(element, self.depth + 1).decode()?);
        }

        Ok(OscBundle { timetag, content })
    }
}

/// Decode one datagram.
pub fn decode_packet(data: &[u8]) -> Result<OscPacket, OscReadError> {
    OscDecoder::new(data).decode()
}
