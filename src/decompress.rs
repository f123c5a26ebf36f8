//! Payload decompression.
//!
//! Envelopes do not declare the decompressed size of their payload, so
//! the output buffer cannot be sized up front. [`decompress_to_vec`]
//! grows the buffer by doubling: it starts at twice the compressed size
//! and retries whenever the engine fills the buffer exactly, because an
//! exact fill cannot be told apart from truncation. A payload whose true
//! size lands precisely on a capacity boundary costs one extra round and
//! nothing else.

use tracing::debug;

use crate::error::{Error, Result};

/// A one-shot decompression engine.
///
/// Implementations fill `output` from `input` and report how many bytes
/// they wrote. Engines are opaque to the retry loop; any engine failure
/// surfaces as [`Error::Decompression`].
pub trait Decompressor {
    /// Decompresses `input` into `output`, returning the bytes written.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

/// LZFSE engine, the compression used by firmware payload envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LzfseEngine;

impl Decompressor for LzfseEngine {
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match lzfse::decode_buffer(input, output) {
            Ok(0) => Err(Error::decompression("lzfse produced no output")),
            Ok(written) => Ok(written),
            Err(e) => Err(Error::decompression(format!("lzfse: {e:?}"))),
        }
    }
}

/// Decompresses a payload whose decompressed size is not declared.
///
/// Empty input is rejected outright; a zero-byte payload has no valid
/// encoding and would otherwise never grow past a zero-capacity buffer.
pub fn decompress_to_vec(engine: &dyn Decompressor, input: &[u8]) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Err(Error::decompression("empty compressed payload"));
    }

    let mut capacity = input.len().saturating_mul(2);
    loop {
        let mut output = vec![0u8; capacity];
        let written = engine.decompress(input, &mut output)?;
        if written == capacity {
            // A full buffer is ambiguous: the output may have been cut
            // short. Retry with more room until the engine leaves slack.
            capacity = capacity
                .checked_mul(2)
                .ok_or_else(|| Error::decompression("output capacity overflow"))?;
            debug!(
                "decompressed output filled the buffer, retrying with {} bytes",
                capacity
            );
            continue;
        }
        output.truncate(written);
        return Ok(output);
    }
}
