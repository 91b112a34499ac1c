//! Generator for `metal_simdgroup_matrix_storage`, the register-level view
//! of an 8x8 SIMD matrix used by the GEMM kernels.
//!
//! Besides the storage type itself, the header carries the lane layout
//! (`morton_order`), two `apply_offset` helpers and eight load/store
//! variants: {load, store} x {device, threadgroup} x {native, bfloat}.

mod access;
pub mod address;

pub use access::{
    AccessPath, Action, MemoryAccessDescriptor, MemoryAccessDescriptorBuilder,
    create_memory_access, resolve_access_path,
};

use crate::{builder::HeaderBuilder, generators::AddressSpace, morton::emit_morton_order};
use address::emit_apply_offset;
use indoc::indoc;
use itertools::iproduct;

/// Indentation of member functions inside `simdgroup_matrix_storage`.
const MEMBER_INDENTATION: usize = 4;

/// All eight access variants in emission order: action outermost,
/// then address space, then bfloat decoding.
pub fn access_variants() -> impl Iterator<Item = MemoryAccessDescriptor> {
    iproduct!(Action::ALL, AddressSpace::ALL, [false, true]).map(
        |(action, address_space, decoding_bf16)| {
            MemoryAccessDescriptor::new(action, address_space, decoding_bf16, MEMBER_INDENTATION)
        },
    )
}

/// Generates the full `metal_simdgroup_matrix_storage` header.
pub fn create_metal_simdgroup_matrix_storage() -> String {
    let mut header = HeaderBuilder::new("metal_simdgroup_matrix_storage");
    header.add_section("layout").emit(emit_morton_order());
    header.add_section("storage").emit(indoc! {"
        #pragma METAL internals : enable
        namespace metal
        {
          template <typename T>
          struct simdgroup_matrix_storage {
            typedef vec<T, 64> storage_type;

            storage_type t;

            METAL_FUNC thread vec<T, 2>* thread_elements() thread {
              return reinterpret_cast<thread vec<T, 2>*>(&t);
            }

            METAL_FUNC simdgroup_matrix_storage() thread = default;

            METAL_FUNC simdgroup_matrix_storage(vec<T, 2> thread_elements) thread {
              *(this->thread_elements()) = thread_elements;
            }
    "});
    for address_space in AddressSpace::ALL {
        header
            .section("storage")
            .emit("\n")
            .emit_indented(emit_apply_offset(address_space), MEMBER_INDENTATION);
    }

    header.add_section("access");
    for descriptor in access_variants() {
        header
            .section("access")
            .emit(create_memory_access(descriptor))
            .emit("\n");
    }

    header.add_section("multiply").emit(indoc! {"
            template <typename U, typename V>
            METAL_FUNC void multiply(simdgroup_matrix_storage<U> a, simdgroup_matrix_storage<V> b, bool accumulate = true) {
              if (!accumulate) {
                *(thread_elements()) = vec<T, 2>(0);
              }
              t = __metal_simdgroup_matrix_8x8_multiply_accumulate(a.t, b.t, t, typename simdgroup_matrix_storage<T>::storage_type());
            }
          };
        } // namespace metal
        #pragma METAL internals : disable
    "});

    let source = header.build_source();
    tracing::debug!(header = header.name(), bytes = source.len(), "generated header");
    source
}
