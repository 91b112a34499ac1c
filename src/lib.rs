//! Generators for the Metal headers shared by the GEMM kernels:
//! `metal_simdgroup_event` (synchronous tiled copies between device and
//! threadgroup memory) and `metal_simdgroup_matrix_storage` (the per-lane
//! view of an 8x8 SIMD matrix with typed load/store functions).
//!
//! Generation is pure: every function here maps its inputs to source text
//! and keeps no state between calls. The [`reference`] module mirrors the
//! emitted primitives on the host so their contracts can be tested without
//! a GPU.

mod builder;
pub mod error;
pub mod generators;
pub mod morton;
pub mod reference;

#[doc(inline)]
pub use self::{
    error::{Error, Result},
    generators::{
        AddressSpace, Header,
        matrix_storage::{
            AccessPath, Action, MemoryAccessDescriptor, MemoryAccessDescriptorBuilder,
            create_memory_access, create_metal_simdgroup_matrix_storage, resolve_access_path,
        },
        simdgroup_event::{ClampMode, create_metal_simdgroup_event},
    },
    morton::morton_order,
};
/// Re-export of the 16-bit brain float type used by the
/// `*_bfloat` accessors.
pub use half::bf16;
