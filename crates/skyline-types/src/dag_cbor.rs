//! Strict DAG-CBOR reading and writing on top of `minicbor`.
//!
//! DAG-CBOR forbids indefinite-length items, requires text map keys, and
//! encodes links as tag 42 wrapping a byte string of `0x00 || cid-bytes`.
//! Decoders in the workspace walk maps field by field with these helpers and
//! skip everything they do not know.

use std::convert::Infallible;

use minicbor::data::{Tag, Type};
use minicbor::encode::Write;
use minicbor::{Decoder, Encoder};

use crate::error::{CborError, CborResult};
use crate::link::Cid;

/// CBOR tag marking a CID link.
pub const CID_LINK_TAG: u64 = 42;

/// Nesting limit used by [`skip`].
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Encoding into a `Vec<u8>` cannot fail at the writer level.
pub type EncodeError = minicbor::encode::Error<Infallible>;

pub fn map_len(dec: &mut Decoder<'_>) -> CborResult<u64> {
    dec.map()?.ok_or(CborError::IndefiniteLength)
}

pub fn array_len(dec: &mut Decoder<'_>) -> CborResult<u64> {
    dec.array()?.ok_or(CborError::IndefiniteLength)
}

pub fn text<'b>(dec: &mut Decoder<'b>) -> CborResult<&'b str> {
    if matches!(dec.datatype()?, Type::StringIndef) {
        return Err(CborError::IndefiniteLength);
    }
    Ok(dec.str()?)
}

pub fn bytes<'b>(dec: &mut Decoder<'b>) -> CborResult<&'b [u8]> {
    if matches!(dec.datatype()?, Type::BytesIndef) {
        return Err(CborError::IndefiniteLength);
    }
    Ok(dec.bytes()?)
}

pub fn is_null(dec: &Decoder<'_>) -> CborResult<bool> {
    Ok(matches!(dec.datatype()?, Type::Null))
}

/// Decode a tag-42 CID link.
pub fn link(dec: &mut Decoder<'_>) -> CborResult<Cid> {
    let tag = dec.tag()?;
    if tag.as_u64() != CID_LINK_TAG {
        return Err(CborError::InvalidLink(format!(
            "expected tag {CID_LINK_TAG}, found {}",
            tag.as_u64()
        )));
    }
    let raw = bytes(dec)?;
    match raw.split_first() {
        Some((0x00, cid)) => Cid::try_from(cid).map_err(|e| CborError::InvalidLink(e.to_string())),
        _ => Err(CborError::InvalidLink("missing identity multibase prefix".into())),
    }
}

/// Decode a link that may be `null`.
pub fn optional_link(dec: &mut Decoder<'_>) -> CborResult<Option<Cid>> {
    if is_null(dec)? {
        dec.null()?;
        return Ok(None);
    }
    link(dec).map(Some)
}

/// Decode a text value that may be `null`.
pub fn optional_text<'b>(dec: &mut Decoder<'b>) -> CborResult<Option<&'b str>> {
    if is_null(dec)? {
        dec.null()?;
        return Ok(None);
    }
    text(dec).map(Some)
}

/// Decode an integer that must fit in `i64`.
pub fn int(dec: &mut Decoder<'_>, field: &'static str) -> CborResult<i64> {
    match dec.datatype()? {
        Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::I8 | Type::I16 | Type::I32
        | Type::I64 | Type::Int => dec.i64().map_err(|e| CborError::InvalidField {
            field,
            reason: e.to_string(),
        }),
        other => Err(CborError::InvalidField {
            field,
            reason: format!("expected integer, found {other}"),
        }),
    }
}

/// Skip one value of any shape, enforcing DAG-CBOR rules along the way.
pub fn skip(dec: &mut Decoder<'_>) -> CborResult<()> {
    skip_nested(dec, 0, DEFAULT_MAX_DEPTH)
}

pub fn skip_nested(dec: &mut Decoder<'_>, depth: usize, max_depth: usize) -> CborResult<()> {
    if depth > max_depth {
        return Err(CborError::TooDeep(max_depth));
    }
    match dec.datatype()? {
        Type::Array => {
            for _ in 0..array_len(dec)? {
                skip_nested(dec, depth + 1, max_depth)?;
            }
        }
        Type::Map => {
            for _ in 0..map_len(dec)? {
                text(dec)?;
                skip_nested(dec, depth + 1, max_depth)?;
            }
        }
        Type::Tag => {
            dec.tag()?;
            skip_nested(dec, depth + 1, max_depth)?;
        }
        Type::BytesIndef | Type::StringIndef | Type::ArrayIndef | Type::MapIndef => {
            return Err(CborError::IndefiniteLength);
        }
        _ => dec.skip()?,
    }
    Ok(())
}

/// Fail if the decoder has not consumed its whole input.
pub fn finish(dec: &Decoder<'_>) -> CborResult<()> {
    if dec.position() != dec.input().len() {
        return Err(CborError::TrailingBytes);
    }
    Ok(())
}

/// Encode a tag-42 CID link.
pub fn encode_link<W: Write>(
    enc: &mut Encoder<W>,
    cid: &Cid,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    let mut raw = Vec::with_capacity(1 + cid.encoded_len());
    raw.push(0x00);
    raw.extend_from_slice(&cid.to_bytes());
    enc.tag(Tag::new(CID_LINK_TAG))?.bytes(&raw)?;
    Ok(())
}

/// Encode a link or `null`.
pub fn encode_optional_link<W: Write>(
    enc: &mut Encoder<W>,
    cid: Option<&Cid>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    match cid {
        Some(cid) => encode_link(enc, cid),
        None => {
            enc.null()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::dag_cbor_cid;

    fn encode(f: impl FnOnce(&mut Encoder<Vec<u8>>) -> Result<(), EncodeError>) -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new());
        f(&mut enc).unwrap();
        enc.into_writer()
    }

    #[test]
    fn link_roundtrip() {
        let cid = dag_cbor_cid(b"node");
        let buf = encode(|e| encode_link(e, &cid));
        // tag 42 is encoded as 0xd8 0x2a
        assert_eq!(&buf[..2], &[0xd8, 0x2a]);
        let mut dec = Decoder::new(&buf);
        assert_eq!(link(&mut dec).unwrap(), cid);
        finish(&dec).unwrap();
    }

    #[test]
    fn optional_link_accepts_null() {
        let buf = encode(|e| encode_optional_link(e, None));
        let mut dec = Decoder::new(&buf);
        assert_eq!(optional_link(&mut dec).unwrap(), None);
    }

    #[test]
    fn link_rejects_wrong_tag_and_prefix() {
        let buf = encode(|e| {
            e.tag(Tag::new(43))?.bytes(&[0, 1, 2])?;
            Ok(())
        });
        assert!(matches!(link(&mut Decoder::new(&buf)), Err(CborError::InvalidLink(_))));

        let cid = dag_cbor_cid(b"x");
        let buf = encode(|e| {
            e.tag(Tag::new(CID_LINK_TAG))?.bytes(&cid.to_bytes())?;
            Ok(())
        });
        assert!(matches!(link(&mut Decoder::new(&buf)), Err(CborError::InvalidLink(_))));
    }

    #[test]
    fn skip_walks_nested_values() {
        let cid = dag_cbor_cid(b"x");
        let buf = encode(|e| {
            e.map(2)?.str("a")?.array(2)?.u8(1)?.str("two")?.str("b")?;
            encode_link(e, &cid)?;
            e.u8(7)?;
            Ok(())
        });
        let mut dec = Decoder::new(&buf);
        skip(&mut dec).unwrap();
        assert_eq!(dec.u8().unwrap(), 7);
    }

    #[test]
    fn skip_rejects_indefinite_and_deep() {
        let buf = encode(|e| {
            e.begin_array()?.u8(1)?.end()?;
            Ok(())
        });
        assert!(matches!(skip(&mut Decoder::new(&buf)), Err(CborError::IndefiniteLength)));

        let buf = encode(|e| {
            for _ in 0..5 {
                e.array(1)?;
            }
            e.u8(0)?;
            Ok(())
        });
        assert!(matches!(
            skip_nested(&mut Decoder::new(&buf), 0, 3),
            Err(CborError::TooDeep(3))
        ));
    }

    #[test]
    fn int_accepts_signed_and_rejects_text() {
        let buf = encode(|e| {
            e.i64(-1)?.u64(42)?.str("no")?;
            Ok(())
        });
        let mut dec = Decoder::new(&buf);
        assert_eq!(int(&mut dec, "op").unwrap(), -1);
        assert_eq!(int(&mut dec, "op").unwrap(), 42);
        assert!(matches!(int(&mut dec, "op"), Err(CborError::InvalidField { field: "op", .. })));
    }

    #[test]
    fn finish_detects_trailing_bytes() {
        let buf = encode(|e| {
            e.u8(1)?.u8(2)?;
            Ok(())
        });
        let mut dec = Decoder::new(&buf);
        dec.u8().unwrap();
        assert!(matches!(finish(&dec), Err(CborError::TrailingBytes)));
    }
}
