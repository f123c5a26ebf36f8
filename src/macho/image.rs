//! Kernel image load-command decoding.
//!
//! Walks the load-command table of a decompressed 64-bit kernel cache
//! and keeps the two things extraction cares about: the segment map and
//! the boot entry point from the initial thread state. Every command is
//! position-checked against its declared size, so a single mis-sized
//! command fails the whole decode instead of desynchronizing the walk.

use crate::error::{Error, Result};
use crate::reader::Cursor;

use super::constants::*;
use super::structs::*;

/// A decoded segment together with its section table.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The segment command body.
    pub command: SegmentCommand64,
    /// Section entries in declaration order.
    pub sections: Vec<Section64>,
}

impl Segment {
    /// Returns the segment name.
    pub fn name(&self) -> &str {
        self.command.name()
    }
}

/// A decoded 64-bit kernel image.
///
/// Built once from a fully decompressed buffer; read-only afterwards.
#[derive(Debug, Clone)]
pub struct MachImage {
    /// The image header.
    pub header: MachHeader64,
    /// Initial program counter from the unix-thread command, or zero
    /// when the image carries none.
    pub entry_point: u64,
    /// Segments in declaration order.
    pub segments: Vec<Segment>,
}

impl MachImage {
    /// Decodes the header and load-command table of a 64-bit image.
    ///
    /// Unknown command types are skipped over by their declared size.
    /// Section data beyond the load-command table is never touched.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);

        let header: MachHeader64 = cur.read_struct()?;
        if !header.is_valid() {
            return Err(Error::format(
                0,
                format!("not a 64-bit Mach-O image (magic {:#010x})", header.magic),
            ));
        }

        let mut entry_point = 0u64;
        let mut segments = Vec::new();

        for index in 0..header.ncmds as usize {
            let cmd_start = cur.position();
            let lc: LoadCommand = cur.read_struct()?;
            let cmd_end = cmd_start + lc.cmdsize as usize;

            match lc.cmd {
                LC_SEGMENT_64 => {
                    let command: SegmentCommand64 = cur.read_struct()?;
                    let mut sections = Vec::with_capacity(command.nsects as usize);
                    for _ in 0..command.nsects {
                        sections.push(cur.read_struct::<Section64>()?);
                    }
                    segments.push(Segment { command, sections });
                }
                LC_UNIXTHREAD => {
                    let state: ThreadState64 = cur.read_struct()?;
                    if state.count != THREAD_STATE64_COUNT {
                        return Err(Error::unsupported(
                            cmd_start,
                            format!(
                                "thread state count {} (expected {})",
                                state.count, THREAD_STATE64_COUNT
                            ),
                        ));
                    }
                    // A later unix-thread command overwrites an earlier
                    // one.
                    entry_point = state.pc;
                }
                _ => {
                    cur.seek(cmd_end)?;
                }
            }

            if cur.position() != cmd_end {
                return Err(Error::Consistency {
                    index,
                    actual: cur.position(),
                    expected: cmd_end,
                });
            }
        }

        Ok(Self {
            header,
            entry_point,
            segments,
        })
    }

    /// Returns a segment by name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name() == name)
    }
}
