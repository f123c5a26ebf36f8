//! IM4P envelope decoding.
//!
//! Firmware payloads ship wrapped in a loose ASN.1/DER-style envelope: a
//! constructed SEQUENCE containing the literal `IM4P` marker, a
//! four-character codetag naming the payload kind, a free-text
//! description, and finally an octet string holding the compressed
//! payload bytes. Only that leading run of fields is understood; signing
//! and manifest material that may follow the payload is ignored.

use crate::error::{Error, Result};
use crate::reader::Cursor;

/// ASN.1 tag of a constructed SEQUENCE.
const TAG_SEQUENCE: u8 = 0x30;
/// ASN.1 tag of an IA5 (ASCII) string.
const TAG_IA5_STRING: u8 = 0x16;
/// ASN.1 tag of an octet string.
const TAG_OCTET_STRING: u8 = 0x04;

/// Marker string every payload envelope carries.
const IM4P_MARKER: &str = "IM4P";

/// Codetag of a flattened device tree payload.
pub const TAG_DEVICE_TREE: &str = "dtre";
/// Codetag of a kernel cache payload.
pub const TAG_KERNEL: &str = "krnl";

/// A decoded payload envelope.
///
/// The payload borrows from the input buffer; callers typically hand it
/// straight to decompression.
#[derive(Debug)]
pub struct Envelope<'a> {
    /// Four-character ASCII payload kind, e.g. `dtre` or `krnl`.
    pub codetag: String,
    /// Free-text description of the payload. Decoded but never
    /// interpreted.
    pub description: String,
    /// Compressed payload bytes.
    pub payload: &'a [u8],
}

/// Decodes an envelope, insisting that its codetag equals `expected_tag`.
///
/// The outer sequence length is read and discarded: the inner fields are
/// self-delimiting, and trusting the outer length would reject envelopes
/// with trailing signing data.
pub fn decode<'a>(data: &'a [u8], expected_tag: &str) -> Result<Envelope<'a>> {
    let mut cur = Cursor::new(data);

    expect_tag(&mut cur, TAG_SEQUENCE, "sequence")?;
    cur.read_der_length()?;

    let marker_at = cur.position();
    let marker = read_string(&mut cur)?;
    if marker != IM4P_MARKER {
        return Err(Error::format(
            marker_at,
            format!("expected {IM4P_MARKER:?} marker, found {marker:?}"),
        ));
    }

    let codetag_at = cur.position();
    let codetag = read_string(&mut cur)?;
    if codetag != expected_tag {
        return Err(Error::format(
            codetag_at,
            format!("payload codetag {codetag:?} does not match expected {expected_tag:?}"),
        ));
    }

    let description = read_string(&mut cur)?;
    let payload = read_octet_string(&mut cur)?;

    Ok(Envelope {
        codetag,
        description,
        payload,
    })
}

/// Consumes one tag byte, failing with the offset when it differs.
fn expect_tag(cur: &mut Cursor<'_>, tag: u8, what: &str) -> Result<()> {
    let at = cur.position();
    let found = cur.read_u8()?;
    if found != tag {
        return Err(Error::format(
            at,
            format!("expected {what} tag {tag:#04x}, found {found:#04x}"),
        ));
    }
    Ok(())
}

/// Reads a length-prefixed ASCII string field.
fn read_string(cur: &mut Cursor<'_>) -> Result<String> {
    expect_tag(cur, TAG_IA5_STRING, "string")?;
    let len = cur.read_der_length()?;
    let bytes = cur.take(len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Reads a length-prefixed octet string, borrowing the content.
fn read_octet_string<'a>(cur: &mut Cursor<'a>) -> Result<&'a [u8]> {
    expect_tag(cur, TAG_OCTET_STRING, "octet string")?;
    let len = cur.read_der_length()?;
    cur.take(len)
}
