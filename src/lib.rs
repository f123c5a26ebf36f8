//! ipswex - An Apple firmware bundle (IPSW) extractor.
//!
//! This library pulls the two boot-critical payloads out of a firmware
//! bundle and decodes them: the flattened device tree the boot loader
//! hands to the kernel, and the kernel cache itself. Payloads ship
//! wrapped in an IM4P envelope and LZFSE-compressed; extraction
//! unwraps, decompresses and parses them into typed structures.
//!
//! # Features
//!
//! - ZIP entry resolution by well-known path prefix
//! - IM4P envelope decoding with codetag enforcement
//! - Size-unaware LZFSE decompression (capacity doubling)
//! - Flattened device tree parsing into a property tree
//! - Mach-O load-command walking for segments and entry point
//! - Boot arguments block decoding
//!
//! # Example
//!
//! ```no_run
//! use ipswex::{IpswArchive, LzfseEngine};
//!
//! fn main() -> ipswex::Result<()> {
//!     let mut ipsw = IpswArchive::open("firmware.ipsw")?;
//!
//!     let tree = ipsw.device_tree(&LzfseEngine)?;
//!     println!("device tree root: {:?}", tree.name());
//!
//!     let kernel = ipsw.kernel_cache(&LzfseEngine)?;
//!     println!("kernel entry point: {:#x}", kernel.entry_point);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootargs;
pub mod decompress;
pub mod devicetree;
pub mod error;
pub mod im4p;
pub mod ipsw;
pub mod macho;
pub mod reader;
pub mod util;

// Re-export main types
pub use decompress::{decompress_to_vec, Decompressor, LzfseEngine};
pub use devicetree::DeviceTreeNode;
pub use error::{Error, Result};
pub use im4p::Envelope;
pub use ipsw::IpswArchive;
pub use macho::MachImage;

use tracing::info;

/// Unwraps an envelope and decompresses its payload.
///
/// `data` is an entry as stored in the firmware bundle; its codetag must
/// equal `expected_tag` or decoding fails before any decompression.
pub fn extract_payload(
    data: &[u8],
    expected_tag: &str,
    engine: &dyn Decompressor,
) -> Result<Vec<u8>> {
    let envelope = im4p::decode(data, expected_tag)?;
    info!(
        "{} payload: {} bytes compressed ({:?})",
        envelope.codetag,
        envelope.payload.len(),
        envelope.description
    );
    let raw = decompress_to_vec(engine, envelope.payload)?;
    info!("{} payload: {} bytes decompressed", envelope.codetag, raw.len());
    Ok(raw)
}

/// Decodes a device tree from an enveloped, compressed entry.
pub fn extract_device_tree(data: &[u8], engine: &dyn Decompressor) -> Result<DeviceTreeNode> {
    let raw = extract_payload(data, im4p::TAG_DEVICE_TREE, engine)?;
    DeviceTreeNode::parse(&raw)
}

/// Decodes a kernel image from an enveloped, compressed entry.
pub fn extract_kernel_cache(data: &[u8], engine: &dyn Decompressor) -> Result<MachImage> {
    let raw = extract_payload(data, im4p::TAG_KERNEL, engine)?;
    MachImage::parse(&raw)
}
