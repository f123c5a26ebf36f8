//! Mach-O constants and flags.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 64-bit Mach-O magic (little-endian)
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;

// =============================================================================
// File Types
// =============================================================================

/// Executable
pub const MH_EXECUTE: u32 = 0x2;
/// File set (kernel cache)
pub const MH_FILESET: u32 = 0xC;

/// Returns a human-readable name for a Mach-O file type.
pub fn file_type_name(filetype: u32) -> &'static str {
    match filetype {
        MH_EXECUTE => "executable",
        MH_FILESET => "fileset",
        _ => "unknown",
    }
}

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag
pub const CPU_ARCH_ABI64: i32 = 0x0100_0000;

/// ARM CPU type
pub const CPU_TYPE_ARM: i32 = 12;
/// ARM64 CPU type
pub const CPU_TYPE_ARM64: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;

/// x86 CPU type
pub const CPU_TYPE_X86: i32 = 7;
/// x86_64 CPU type
pub const CPU_TYPE_X86_64: i32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;

// =============================================================================
// Load Commands
// =============================================================================

/// Unix thread (initial register state)
pub const LC_UNIXTHREAD: u32 = 0x5;
/// 64-bit segment of this file
pub const LC_SEGMENT_64: u32 = 0x19;

// =============================================================================
// Thread State
// =============================================================================

/// 64-bit ARM thread state flavor
pub const ARM_THREAD_STATE64: u32 = 6;

/// Number of 32-bit words in a 64-bit ARM thread state: 29 general
/// registers plus fp, lr, sp and pc as u64 pairs, then cpsr and padding.
pub const THREAD_STATE64_COUNT: u32 = 68;

// =============================================================================
// VM Protection
// =============================================================================

bitflags! {
    /// Memory protection bits carried by segments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmProt: u32 {
        /// Readable
        const READ = 0x1;
        /// Writable
        const WRITE = 0x2;
        /// Executable
        const EXECUTE = 0x4;
    }
}

impl VmProt {
    /// Renders the protection as an `rwx` triple.
    pub fn render(self) -> String {
        let mut out = String::with_capacity(3);
        out.push(if self.contains(VmProt::READ) { 'r' } else { '-' });
        out.push(if self.contains(VmProt::WRITE) { 'w' } else { '-' });
        out.push(if self.contains(VmProt::EXECUTE) {
            'x'
        } else {
            '-'
        });
        out
    }
}
