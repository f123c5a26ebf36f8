//! Utility functions for fixed-width binary fields.
//!
//! Firmware structures carry names and text in fixed-size byte arrays
//! padded with NUL bytes. These helpers convert between those fields and
//! Rust strings without allocating on the read path.

// =============================================================================
// NUL-Padded String Fields
// =============================================================================

/// Returns the printable content of a NUL-padded fixed-width field.
///
/// Trailing zero bytes are stripped; any byte before the last non-zero
/// byte is kept as-is. Fields holding non-UTF-8 content yield an empty
/// string rather than an error.
#[inline]
pub fn trimmed_str(field: &[u8]) -> &str {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&field[..end]).unwrap_or("")
}

/// Writes `value` into a fixed-width field, zero-filling the remainder.
///
/// Values longer than the field are truncated to the field width.
#[inline]
pub fn write_padded(field: &mut [u8], value: &str) {
    field.fill(0);
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

// =============================================================================
// Byte Classification
// =============================================================================

/// Returns true if every byte is printable ASCII (0x20..=0x7E).
///
/// Used by value renderers to decide between text and hex output; an
/// empty slice counts as printable.
#[inline]
pub fn is_printable_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x20..=0x7E).contains(&b))
}
