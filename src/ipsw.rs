//! IPSW archive entry resolution.
//!
//! A firmware bundle is a ZIP archive. The entries this crate cares
//! about live at well-known path prefixes rather than fixed names, since
//! device and build identifiers are baked into the file names
//! (`kernelcache.release.iphone12`, `Firmware/all_flash/DeviceTree.d421ap.im4p`
//! and friends). Entries are therefore resolved by prefix match, and the
//! archive layer never interprets entry contents.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use tracing::{debug, info};
use zip::ZipArchive;

use crate::decompress::Decompressor;
use crate::devicetree::DeviceTreeNode;
use crate::error::{Error, Result};
use crate::macho::MachImage;

/// Path prefix of the kernel cache entry.
pub const KERNEL_CACHE_PREFIX: &str = "kernelcache";
/// Path prefix of the device tree entry.
pub const DEVICE_TREE_PREFIX: &str = "Firmware/all_flash/DeviceTree";

/// An opened firmware bundle.
pub struct IpswArchive<R> {
    archive: ZipArchive<R>,
}

impl IpswArchive<File> {
    /// Opens a firmware bundle from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> IpswArchive<R> {
    /// Wraps an already-open archive reader.
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        debug!("opened archive with {} entries", archive.len());
        Ok(Self { archive })
    }

    /// Reads the first entry whose path starts with `prefix`.
    pub fn entry_by_prefix(&mut self, prefix: &str) -> Result<Vec<u8>> {
        let name = self
            .archive
            .file_names()
            .find(|n| n.starts_with(prefix))
            .map(String::from)
            .ok_or_else(|| Error::EntryNotFound {
                prefix: prefix.to_string(),
            })?;

        let mut entry = self.archive.by_name(&name)?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        info!("read {} ({} bytes)", name, data.len());
        Ok(data)
    }

    /// Returns the kernel cache entry, still enveloped and compressed.
    pub fn kernel_cache_payload(&mut self) -> Result<Vec<u8>> {
        self.entry_by_prefix(KERNEL_CACHE_PREFIX)
    }

    /// Returns the device tree entry, still enveloped and compressed.
    pub fn device_tree_payload(&mut self) -> Result<Vec<u8>> {
        self.entry_by_prefix(DEVICE_TREE_PREFIX)
    }

    /// Extracts and fully decodes the device tree.
    pub fn device_tree(&mut self, engine: &dyn Decompressor) -> Result<DeviceTreeNode> {
        let raw = self.device_tree_payload()?;
        crate::extract_device_tree(&raw, engine)
    }

    /// Extracts and fully decodes the kernel image.
    pub fn kernel_cache(&mut self, engine: &dyn Decompressor) -> Result<MachImage> {
        let raw = self.kernel_cache_payload()?;
        crate::extract_kernel_cache(&raw, engine)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zerocopy::IntoBytes;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use crate::devicetree::PROP_NAME_LEN;
    use crate::im4p::{TAG_DEVICE_TREE, TAG_KERNEL};
    use crate::macho::{LoadCommand, MachHeader64, ThreadState64, LC_UNIXTHREAD};

    use super::*;

    /// Builds an in-memory bundle from (path, content) pairs.
    fn build_archive(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap()
    }

    /// Engine for fixtures stored without compression: copies the input
    /// through unchanged.
    struct IdentityEngine;

    impl Decompressor for IdentityEngine {
        fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
            output[..input.len()].copy_from_slice(input);
            Ok(input.len())
        }
    }

    /// Encodes a DER length, choosing short or long form as needed.
    fn der_len(len: usize) -> Vec<u8> {
        if len < 0x80 {
            return vec![len as u8];
        }
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|&b| b == 0)
            .collect();
        let mut out = vec![0x80 | bytes.len() as u8];
        out.extend_from_slice(&bytes);
        out
    }

    /// Wraps a payload in the envelope the extraction pipeline expects.
    fn envelope(codetag: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for text in ["IM4P", codetag, "fixture"] {
            body.push(0x16);
            body.extend_from_slice(&der_len(text.len()));
            body.extend_from_slice(text.as_bytes());
        }
        body.push(0x04);
        body.extend_from_slice(&der_len(payload.len()));
        body.extend_from_slice(payload);

        let mut out = vec![0x30];
        out.extend_from_slice(&der_len(body.len()));
        out.extend_from_slice(&body);
        out
    }

    /// Flattened single-node device tree named `root`.
    fn tree_payload() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes()); // properties
        data.extend_from_slice(&0u32.to_le_bytes()); // children
        let mut name_field = [0u8; PROP_NAME_LEN];
        name_field[..4].copy_from_slice(b"name");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"root");
        data
    }

    /// Segment-free kernel image whose entry point comes from a thread
    /// state command.
    fn kernel_payload() -> Vec<u8> {
        let cmdsize = (LoadCommand::SIZE + ThreadState64::SIZE) as u32;
        let mut data = MachHeader64 {
            ncmds: 1,
            sizeofcmds: cmdsize,
            ..Default::default()
        }
        .as_bytes()
        .to_vec();
        data.extend_from_slice(
            LoadCommand {
                cmd: LC_UNIXTHREAD,
                cmdsize,
            }
            .as_bytes(),
        );
        data.extend_from_slice(
            ThreadState64 {
                pc: 0xFFFF_FFF0_0709_4000,
                ..Default::default()
            }
            .as_bytes(),
        );
        data
    }

    #[test]
    fn test_entry_resolved_by_prefix() {
        let cursor = build_archive(&[
            ("BuildManifest.plist", b"<plist/>"),
            ("kernelcache.release.iphone12", b"kernel bytes"),
            ("Firmware/all_flash/DeviceTree.d421ap.im4p", b"tree bytes"),
        ]);
        let mut ipsw = IpswArchive::from_reader(cursor).unwrap();

        assert_eq!(ipsw.kernel_cache_payload().unwrap(), b"kernel bytes");
        assert_eq!(ipsw.device_tree_payload().unwrap(), b"tree bytes");
    }

    #[test]
    fn test_missing_entry_reports_prefix() {
        let cursor = build_archive(&[("Restore.plist", b"<plist/>")]);
        let mut ipsw = IpswArchive::from_reader(cursor).unwrap();

        let err = ipsw.kernel_cache_payload().unwrap_err();
        match err {
            Error::EntryNotFound { prefix } => assert_eq!(prefix, KERNEL_CACHE_PREFIX),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let cursor = build_archive(&[
            ("kernelcache.release.iphone12", b"first"),
            ("kernelcache.release.iphone12b", b"second"),
        ]);
        let mut ipsw = IpswArchive::from_reader(cursor).unwrap();
        assert_eq!(ipsw.kernel_cache_payload().unwrap(), b"first");
    }

    #[test]
    fn test_garbage_is_not_an_archive() {
        let cursor = Cursor::new(b"not a zip file at all".to_vec());
        assert!(matches!(
            IpswArchive::from_reader(cursor),
            Err(Error::Zip(_))
        ));
    }

    #[test]
    fn test_decodes_enveloped_payloads_end_to_end() {
        let tree = envelope(TAG_DEVICE_TREE, &tree_payload());
        let kernel = envelope(TAG_KERNEL, &kernel_payload());
        let cursor = build_archive(&[
            ("Firmware/all_flash/DeviceTree.d421ap.im4p", tree.as_slice()),
            ("kernelcache.release.iphone12", kernel.as_slice()),
        ]);
        let mut ipsw = IpswArchive::from_reader(cursor).unwrap();

        let node = ipsw.device_tree(&IdentityEngine).unwrap();
        assert_eq!(node.name(), Some("root"));
        assert_eq!(node.node_count(), 1);

        let image = ipsw.kernel_cache(&IdentityEngine).unwrap();
        assert_eq!(image.entry_point, 0xFFFF_FFF0_0709_4000);
        assert!(image.segments.is_empty());
    }
}
