//! Fixed, versioned, little-endian wire types for the frontal exchanges.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Copy a byte payload into an owned, properly aligned vector of `T`.
///
/// Received buffers carry no alignment guarantee, so records are read unaligned.
pub fn read_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// The collective phase a message belongs to. Carried in every [`WireHdr`] so
/// that ranks which took different control-flow branches are detected.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    MapRequestCounts = 1,
    MapRequests = 2,
    MapReplies = 3,
    PullRowCounts = 10,
    PullRows = 11,
    PullRowLengths = 12,
    PullValues = 13,
    PullTargets = 14,
    PullUpdateRowCounts = 20,
    PullUpdateRows = 21,
    PullUpdateRowLengths = 22,
    PullUpdateValues = 23,
    PullUpdateTargets = 24,
    UnpackEntries = 30,
    ChildUpdate = 40,
}

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub kind_le: u16,    // Phase discriminant
    pub count_le: u32,   // number of records that follow
}

impl WireHdr {
    pub const SIZE: usize = 8;

    pub fn new(phase: Phase, count: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: (phase as u16).to_le(),
            count_le: (count as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A global index (row, column or reordered target) carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireIndex {
    pub i_le: u64,
}
impl WireIndex {
    pub fn of(i: usize) -> Self {
        Self {
            i_le: (i as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.i_le) as usize
    }
}

/// Coordinates of one factor entry; the value travels right behind it.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCoord {
    pub row_le: u64,
    pub col_le: u64,
}
impl WireCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row_le: (row as u64).to_le(),
            col_le: (col as u64).to_le(),
        }
    }
    pub fn row(&self) -> usize {
        u64::from_le(self.row_le) as usize
    }
    pub fn col(&self) -> usize {
        u64::from_le(self.col_le) as usize
    }
}

/// Append one `(row, col, value)` record to a byte buffer.
pub fn push_entry<F: Pod>(buf: &mut Vec<u8>, row: usize, col: usize, value: F) {
    buf.extend_from_slice(bytemuck::bytes_of(&WireCoord::new(row, col)));
    buf.extend_from_slice(bytemuck::bytes_of(&value));
}

/// Size in bytes of one `(row, col, value)` record.
pub const fn entry_size<F>() -> usize {
    size_of::<WireCoord>() + size_of::<F>()
}

/// Decode a buffer produced by [`push_entry`].
pub fn read_entries<F: Pod>(bytes: &[u8]) -> impl Iterator<Item = (usize, usize, F)> + '_ {
    let coord = size_of::<WireCoord>();
    bytes.chunks_exact(entry_size::<F>()).map(move |chunk| {
        let c: WireCoord = bytemuck::pod_read_unaligned(&chunk[..coord]);
        let v: F = bytemuck::pod_read_unaligned(&chunk[coord..]);
        (c.row(), c.col(), v)
    })
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireHdr>(), WireHdr::SIZE);
const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireIndex>(), 8);
const_assert_eq!(size_of::<WireCoord>(), 16);
