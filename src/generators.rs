pub mod matrix_storage;
pub mod simdgroup_event;

use std::fmt::{Display, Formatter};

/// Metal address space of a pointer argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpace {
    /// Main memory. Offsets may exceed 16 bits, so they are 32-bit.
    Device,
    /// On-chip memory shared within a threadgroup. Every offset fits in 16 bits.
    Threadgroup,
}

impl AddressSpace {
    pub const ALL: [Self; 2] = [Self::Device, Self::Threadgroup];

    pub fn keyword(self) -> &'static str {
        match self {
            AddressSpace::Device => "device",
            AddressSpace::Threadgroup => "threadgroup",
        }
    }

    /// Integer type holding an element offset in this address space.
    pub fn offset_type(self) -> &'static str {
        match self {
            AddressSpace::Device => "uint",
            AddressSpace::Threadgroup => "ushort",
        }
    }

    /// Truncates `offset` the way assigning it to [`Self::offset_type`] does.
    pub fn wrap_offset(self, offset: u64) -> u32 {
        match self {
            AddressSpace::Device => offset as u32,
            AddressSpace::Threadgroup => u32::from(offset as u16),
        }
    }
}

impl Display for AddressSpace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One of the generated header documents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Header {
    /// Synchronous tiled copies behind the `simdgroup_event` interface.
    SimdgroupEvent,
    /// Per-lane storage of an 8x8 SIMD matrix.
    SimdgroupMatrixStorage,
}

impl Header {
    pub const ALL: [Self; 2] = [Self::SimdgroupEvent, Self::SimdgroupMatrixStorage];

    pub fn name(self) -> &'static str {
        match self {
            Header::SimdgroupEvent => "metal_simdgroup_event",
            Header::SimdgroupMatrixStorage => "metal_simdgroup_matrix_storage",
        }
    }

    pub fn generate(self) -> String {
        match self {
            Header::SimdgroupEvent => simdgroup_event::create_metal_simdgroup_event(),
            Header::SimdgroupMatrixStorage => {
                matrix_storage::create_metal_simdgroup_matrix_storage()
            }
        }
    }
}
