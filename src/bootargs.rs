//! Boot arguments handed from the boot loader to the kernel.
//!
//! The loader materializes this fixed-layout structure in memory and
//! passes its address in x0 at kernel entry. Decoding it from a memory
//! dump recovers the physical memory layout, the device tree location
//! and the kernel command line; the command line is also settable for
//! patched-boot workflows.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::util::trimmed_str;

/// Width of the embedded command line field.
pub const COMMAND_LINE_LEN: usize = 1024;

/// Boot arguments block, 1140 bytes, packed little-endian.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct BootArgs {
    /// Structure revision
    pub revision: u16,
    /// Structure version
    pub version: u16,
    /// Virtual base of memory
    pub virt_base: u64,
    /// Physical base of memory
    pub phys_base: u64,
    /// Size of physical memory
    pub mem_size: u64,
    /// Highest physical address used by kernel data
    pub top_of_kernel_data: u64,
    /// Video frame buffer base address
    pub video_base: u64,
    /// Video display mode
    pub video_display: u64,
    /// Bytes per video row
    pub video_row_bytes: u64,
    /// Display width in pixels
    pub video_width: u64,
    /// Display height in pixels
    pub video_height: u64,
    /// Pixel depth
    pub video_depth: u64,
    /// Machine type
    pub machine_type: u32,
    /// Base address of the flattened device tree
    pub device_tree_ptr: u64,
    /// Length of the flattened device tree
    pub device_tree_length: u32,
    /// NUL-padded kernel command line
    pub command_line: [u8; COMMAND_LINE_LEN],
    /// Additional boot loader flags
    pub boot_flags: u64,
    /// Actual size of physical memory
    pub mem_size_actual: u64,
}

impl BootArgs {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 1140;

    /// Decodes a boot arguments block from the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(args, _)| args)
            .map_err(|_| Error::underrun(0, Self::SIZE, data.len()))
    }

    /// Returns the command line with trailing NUL padding removed.
    pub fn command_line(&self) -> &str {
        trimmed_str(&self.command_line)
    }

    /// Replaces the command line.
    ///
    /// The value is truncated to the field width less one so the final
    /// byte stays NUL, and the rest of the field is zero-filled.
    pub fn set_command_line(&mut self, value: &str) {
        self.command_line.fill(0);
        let len = value.len().min(COMMAND_LINE_LEN - 1);
        self.command_line[..len].copy_from_slice(&value.as_bytes()[..len]);
    }
}

impl fmt::Display for BootArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Copy packed fields to locals before formatting; references
        // into a packed struct would be unaligned.
        let Self {
            revision,
            version,
            virt_base,
            phys_base,
            mem_size,
            top_of_kernel_data,
            video_width,
            video_height,
            machine_type,
            device_tree_ptr,
            device_tree_length,
            boot_flags,
            mem_size_actual,
            ..
        } = *self;

        writeln!(f, "BootArgs rev {revision} version {version}")?;
        writeln!(f, "  virtual base:    {virt_base:#x}")?;
        writeln!(f, "  physical base:   {phys_base:#x}")?;
        writeln!(f, "  memory size:     {mem_size:#x} (actual {mem_size_actual:#x})")?;
        writeln!(f, "  kernel data top: {top_of_kernel_data:#x}")?;
        writeln!(f, "  display:         {video_width}x{video_height}")?;
        writeln!(f, "  machine type:    {machine_type:#x}")?;
        writeln!(
            f,
            "  device tree:     {device_tree_ptr:#x} ({device_tree_length} bytes)"
        )?;
        writeln!(f, "  boot flags:      {boot_flags:#x}")?;
        write!(f, "  command line:    {:?}", self.command_line())
    }
}
