use crate::error::{Error, Result};
use crate::uapi::{NLA_F_NESTED, NLA_F_NET_BYTEORDER, NLA_TYPE_MASK};
use byteorder::{BigEndian, ByteOrder, NativeEndian};
use log::warn;

const HEADER_SIZE: usize = 4;

/// Payload of an attribute: raw value bytes, or a list of child attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Raw(Vec<u8>),
    Nested(Vec<Attribute>),
}

/// Attribute is the length-type-value node every ipset message is built from.
///
/// The nested flag is not stored separately; it follows from the payload
/// variant. `net_byte_order` marks fixed-width numbers stored big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    typ: u16,
    pub net_byte_order: bool,
    pub payload: Payload,
}

impl Attribute {
    pub fn new(typ: u16, data: Vec<u8>) -> Attribute {
        Attribute {
            typ,
            net_byte_order: false,
            payload: Payload::Raw(data),
        }
    }

    pub fn nested(typ: u16, children: Vec<Attribute>) -> Attribute {
        Attribute {
            typ,
            net_byte_order: false,
            payload: Payload::Nested(children),
        }
    }

    /// A raw payload that is already in network byte order.
    pub fn net_order(typ: u16, data: Vec<u8>) -> Attribute {
        Attribute {
            typ,
            net_byte_order: true,
            payload: Payload::Raw(data),
        }
    }

    pub fn from_u8(typ: u16, v: u8) -> Attribute {
        Attribute::new(typ, vec![v])
    }

    pub fn from_u16(typ: u16, v: u16, net_byte_order: bool) -> Attribute {
        let mut d = [0; 2];
        if net_byte_order {
            BigEndian::write_u16(&mut d, v);
        } else {
            NativeEndian::write_u16(&mut d, v);
        }
        Attribute {
            typ,
            net_byte_order,
            payload: Payload::Raw(d.to_vec()),
        }
    }

    pub fn from_u32(typ: u16, v: u32, net_byte_order: bool) -> Attribute {
        let mut d = [0; 4];
        if net_byte_order {
            BigEndian::write_u32(&mut d, v);
        } else {
            NativeEndian::write_u32(&mut d, v);
        }
        Attribute {
            typ,
            net_byte_order,
            payload: Payload::Raw(d.to_vec()),
        }
    }

    pub fn from_u64(typ: u16, v: u64, net_byte_order: bool) -> Attribute {
        let mut d = [0; 8];
        if net_byte_order {
            BigEndian::write_u64(&mut d, v);
        } else {
            NativeEndian::write_u64(&mut d, v);
        }
        Attribute {
            typ,
            net_byte_order,
            payload: Payload::Raw(d.to_vec()),
        }
    }

    /// A NUL-terminated string attribute.
    pub fn from_string(typ: u16, s: &str) -> Attribute {
        let mut d = Vec::with_capacity(s.len() + 1);
        d.extend_from_slice(s.as_bytes());
        d.push(0);
        Attribute::new(typ, d)
    }

    /// The attribute type, without the nested and byte order flags.
    pub fn typ(&self) -> u16 {
        self.typ
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.payload, Payload::Nested(_))
    }

    /// The raw value bytes; fails on a nested attribute.
    pub fn data(&self) -> Result<&[u8]> {
        match &self.payload {
            Payload::Raw(d) => Ok(d),
            Payload::Nested(_) => Err(Error::Decoding(format!(
                "attribute {} is nested, expected a value",
                self.typ
            ))),
        }
    }

    /// The child attributes; fails on a value attribute.
    pub fn children(&self) -> Result<&[Attribute]> {
        match &self.payload {
            Payload::Nested(c) => Ok(c),
            Payload::Raw(_) => Err(Error::Decoding(format!(
                "attribute {} is not nested",
                self.typ
            ))),
        }
    }

    /// Appends a child to a nested attribute.
    pub fn push(&mut self, child: Attribute) -> Result<()> {
        match &mut self.payload {
            Payload::Nested(c) => {
                c.push(child);
                Ok(())
            }
            Payload::Raw(_) => Err(Error::Encoding(format!(
                "attribute {} is not nested",
                self.typ
            ))),
        }
    }

    fn fixed(&self, width: usize) -> Result<&[u8]> {
        let d = self.data()?;
        if d.len() != width {
            return Err(Error::Decoding(format!(
                "attribute {}: expected {} bytes, got {}",
                self.typ,
                width,
                d.len()
            )));
        }
        Ok(d)
    }

    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.fixed(1)?[0])
    }

    pub fn as_u16(&self) -> Result<u16> {
        let d = self.fixed(2)?;
        Ok(if self.net_byte_order {
            BigEndian::read_u16(d)
        } else {
            NativeEndian::read_u16(d)
        })
    }

    pub fn as_u32(&self) -> Result<u32> {
        let d = self.fixed(4)?;
        Ok(if self.net_byte_order {
            BigEndian::read_u32(d)
        } else {
            NativeEndian::read_u32(d)
        })
    }

    pub fn as_u64(&self) -> Result<u64> {
        let d = self.fixed(8)?;
        Ok(if self.net_byte_order {
            BigEndian::read_u64(d)
        } else {
            NativeEndian::read_u64(d)
        })
    }

    /// Decodes a NUL-terminated string, dropping the terminator and any
    /// trailing zero padding.
    pub fn as_string(&self) -> Result<String> {
        let d = self.data()?;
        let end = d.iter().position(|&b| b == 0).unwrap_or(d.len());
        if d[end..].iter().any(|&b| b != 0) {
            return Err(Error::Decoding(format!(
                "attribute {}: data after string terminator",
                self.typ
            )));
        }
        String::from_utf8(d[..end].to_vec()).map_err(|e| {
            Error::Decoding(format!("attribute {}: invalid string: {}", self.typ, e))
        })
    }

    /// Length of the payload as declared on the wire. Children are counted
    /// with their padding, the attribute's own padding is not.
    pub fn payload_len(&self) -> usize {
        match &self.payload {
            Payload::Raw(d) => d.len(),
            Payload::Nested(c) => c.iter().map(Attribute::size).sum(),
        }
    }

    /// Total on-wire size including header and padding.
    pub fn size(&self) -> usize {
        crate::util::align(HEADER_SIZE + self.payload_len())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Serializes the attribute, its children and padding onto `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.typ & !NLA_TYPE_MASK != 0 {
            return Err(Error::Encoding(format!(
                "attribute type {:#x} does not fit in 14 bits",
                self.typ
            )));
        }
        let len = HEADER_SIZE + self.payload_len();
        if len > u16::MAX as usize {
            return Err(Error::Encoding(format!(
                "attribute {} payload of {} bytes is too long",
                self.typ,
                len - HEADER_SIZE
            )));
        }

        let mut typ = self.typ;
        if self.is_nested() {
            typ |= NLA_F_NESTED;
        }
        if self.net_byte_order {
            typ |= NLA_F_NET_BYTEORDER;
        }

        let mut hdr = [0; HEADER_SIZE];
        NativeEndian::write_u16(&mut hdr[0..2], len as u16);
        NativeEndian::write_u16(&mut hdr[2..4], typ);
        out.extend_from_slice(&hdr);

        match &self.payload {
            Payload::Raw(d) => out.extend_from_slice(d),
            Payload::Nested(children) => {
                for c in children {
                    c.write_to(out)?;
                }
            }
        }

        out.resize(out.len() + crate::util::align(len) - len, 0);
        Ok(())
    }

    /// Parses one attribute at `idx`, returning it with the offset of the next.
    pub fn one_from_bytes(v: &[u8], idx: usize) -> Result<(Attribute, usize)> {
        if v.len() < idx + HEADER_SIZE {
            return Err(Error::Decoding(
                "message too short for attribute header".into(),
            ));
        }

        let len = NativeEndian::read_u16(&v[idx..idx + 2]) as usize;
        let raw_typ = NativeEndian::read_u16(&v[idx + 2..idx + 4]);
        if len < HEADER_SIZE {
            return Err(Error::Decoding(format!(
                "attribute length {} below header size",
                len
            )));
        }
        if v.len() < idx + len {
            return Err(Error::Decoding(format!(
                "attribute length {} exceeds remaining {} bytes",
                len,
                v.len() - idx
            )));
        }

        let data = &v[idx + HEADER_SIZE..idx + len];
        let typ = raw_typ & NLA_TYPE_MASK;
        let payload = if raw_typ & NLA_F_NESTED != 0 {
            Payload::Nested(Attribute::from_bytes(data)?)
        } else {
            Payload::Raw(data.to_vec())
        };

        // The last attribute of a buffer may come without its padding.
        let next = crate::util::align(idx + len).min(v.len());
        if v[idx + len..next].iter().any(|&b| b != 0) {
            warn!("attribute {}: non-zero padding", typ);
        }

        Ok((
            Attribute {
                typ,
                net_byte_order: raw_typ & NLA_F_NET_BYTEORDER != 0,
                payload,
            },
            next,
        ))
    }

    pub fn from_bytes(v: &[u8]) -> Result<Vec<Attribute>> {
        let mut idx = 0;
        let mut res = Vec::new();

        while idx < v.len() {
            let (attr, next) = Attribute::one_from_bytes(v, idx)?;
            idx = next;
            res.push(attr);
        }

        Ok(res)
    }
}

/// Finds the first attribute of the given type.
pub fn find(attrs: &[Attribute], typ: u16) -> Option<&Attribute> {
    attrs.iter().find(|a| a.typ() == typ)
}
