//! Generator for `metal_simdgroup_event`.
//!
//! The kernels were written against an asynchronous copy interface: start
//! a `simdgroup_event::async_copy`, compute, then `wait`. This header keeps
//! that interface but performs every copy synchronously, and `wait` does
//! nothing. Copies therefore never overlap with compute.

use crate::{
    builder::{HeaderBuilder, indent},
    generators::AddressSpace,
};
use indoc::{formatdoc, indoc};
use std::fmt::Write;

/// Indentation of member functions inside `simdgroup_event`.
const MEMBER_INDENTATION: usize = 2;

/// What a tiled copy writes to destination cells that have no
/// in-bounds source cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClampMode {
    /// Write zero.
    #[default]
    ClampToZero,
    /// Repeat the nearest source cell on the tile's edge.
    ClampToEdge,
}

impl ClampMode {
    pub const ALL: [Self; 2] = [Self::ClampToZero, Self::ClampToEdge];

    pub fn metal_name(self) -> &'static str {
        match self {
            ClampMode::ClampToZero => "clamp_to_zero",
            ClampMode::ClampToEdge => "clamp_to_edge",
        }
    }

    /// Value of the enumerator in the emitted `enum class`.
    pub fn value(self) -> u32 {
        match self {
            ClampMode::ClampToZero => 0,
            ClampMode::ClampToEdge => 1,
        }
    }
}

/// Direction of a copy between the two address spaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CopyDirection {
    /// Device memory into threadgroup memory.
    DeviceToThreadgroup,
    /// Threadgroup memory back out to device memory.
    ThreadgroupToDevice,
}

impl CopyDirection {
    pub const ALL: [Self; 2] = [Self::DeviceToThreadgroup, Self::ThreadgroupToDevice];

    pub fn destination(self) -> AddressSpace {
        match self {
            CopyDirection::DeviceToThreadgroup => AddressSpace::Threadgroup,
            CopyDirection::ThreadgroupToDevice => AddressSpace::Device,
        }
    }

    pub fn source(self) -> AddressSpace {
        match self {
            CopyDirection::DeviceToThreadgroup => AddressSpace::Device,
            CopyDirection::ThreadgroupToDevice => AddressSpace::Threadgroup,
        }
    }
}

fn emit_clamp_mode() -> String {
    let mut s = String::from("enum class simdgroup_async_copy_clamp_mode {\n");
    let enumerators: Vec<_> = ClampMode::ALL
        .iter()
        .map(|mode| format!("  {} = {}", mode.metal_name(), mode.value()))
        .collect();
    writeln!(s, "{}", enumerators.join(",\n")).unwrap();
    s.push_str("};\n");
    s
}

/// Copies `n_elements` scalars one by one.
fn emit_elementwise_copy(direction: CopyDirection) -> String {
    let dst = direction.destination().keyword();
    let src = direction.source().keyword();
    formatdoc! {"
        template <typename T>
        METAL_FUNC void async_copy(
          {dst} T *dst,
          const {src} T *src,
          ulong n_elements
        ) thread {{
          for (ulong i = 0; i < n_elements; ++i) {{
            dst[i] = src[i];
          }}
        }}
    "}
}

/// Extra parameters after the transpose flag.
fn tile_copy_options(direction: CopyDirection) -> &'static str {
    match direction {
        CopyDirection::DeviceToThreadgroup => indoc! {"
            bool transpose_matrix = false,
            simdgroup_async_copy_clamp_mode clamp_mode =
              simdgroup_async_copy_clamp_mode::clamp_to_zero"},
        CopyDirection::ThreadgroupToDevice => "bool transpose_matrix = false",
    }
}

/// Loop nest of a tiled copy, after tile dimensions have been swapped
/// for a transpose.
fn tile_copy_loop(direction: CopyDirection) -> &'static str {
    match direction {
        // Every destination cell is written. Cells outside the source tile
        // are clamped to its edge or zeroed.
        CopyDirection::DeviceToThreadgroup => indoc! {"
            for (ushort y = 0; y < dst_tile_dimensions.y; ++y) {
              for (ushort x = 0; x < dst_tile_dimensions.x; ++x) {
                bool in_bounds = (x < src_tile_dimensions.x) && (y < src_tile_dimensions.y);

                ulong dst_index = ulong(y) * ulong(dst_elements_per_row) + ulong(x);

                if (in_bounds) {
                  ulong src_index = ulong(y) * ulong(src_elements_per_row) + ulong(x);
                  dst[dst_index] = src[src_index];
                } else if (clamp_mode == simdgroup_async_copy_clamp_mode::clamp_to_edge &&
                           src_tile_dimensions.x > 0 && src_tile_dimensions.y > 0) {
                  ushort sx = min(x, ushort(src_tile_dimensions.x - 1));
                  ushort sy = min(y, ushort(src_tile_dimensions.y - 1));
                  ulong src_index = ulong(sy) * ulong(src_elements_per_row) + ulong(sx);
                  dst[dst_index] = src[src_index];
                } else {
                  dst[dst_index] = T(0);
                }
              }
            }
        "},
        // Only the overlap of both tiles is written; the rest of the
        // destination is left as it was.
        CopyDirection::ThreadgroupToDevice => indoc! {"
            ushort tile_x = min(dst_tile_dimensions.x, src_tile_dimensions.x);
            ushort tile_y = min(dst_tile_dimensions.y, src_tile_dimensions.y);

            for (ushort y = 0; y < tile_y; ++y) {
              for (ushort x = 0; x < tile_x; ++x) {
                ulong dst_index = ulong(y) * ulong(dst_elements_per_row) + ulong(x);
                ulong src_index = ulong(y) * ulong(src_elements_per_row) + ulong(x);
                dst[dst_index] = src[src_index];
              }
            }
        "},
    }
}

/// Copies a 2D tile between address spaces with independent strides.
///
/// A transpose swaps the tile dimensions of both sides but does not
/// reorder elements; the matrix loads apply the transpose when reading.
fn emit_tile_copy(direction: CopyDirection) -> String {
    let dst = direction.destination();
    let src = direction.source();
    let dst_space = dst.keyword();
    let src_space = src.keyword();
    let dst_stride = dst.offset_type();
    let src_stride = src.offset_type();
    let options = indent(tile_copy_options(direction), 2);
    let body = indent(tile_copy_loop(direction), 2);

    formatdoc! {"
        template <typename T>
        METAL_FUNC void async_copy(
          // Destination
          {dst_space} T *dst,
          {dst_stride} dst_elements_per_row,
          ushort2 dst_tile_dimensions,

          // Source
          const {src_space} T *src,
          {src_stride} src_elements_per_row,
          ushort2 src_tile_dimensions,

          // Other
        {options}
        ) thread {{
          if (transpose_matrix) {{
            src_tile_dimensions = src_tile_dimensions.yx;
            dst_tile_dimensions = dst_tile_dimensions.yx;
          }}

        {body}}}
    "}
}

fn emit_wait() -> &'static str {
    indoc! {"
        METAL_FUNC static void wait(int /*count*/, thread simdgroup_event* /*events*/) {
          // Copies complete before async_copy returns.
        }
    "}
}

/// Generates the full `metal_simdgroup_event` header.
pub fn create_metal_simdgroup_event() -> String {
    let mut header = HeaderBuilder::new("metal_simdgroup_event");
    header
        .add_section("prelude")
        .emit("using namespace metal;\n\n")
        .emit(emit_clamp_mode());

    let mut event = header.add_section("event");
    event.emit(indoc! {"
        // Synchronous stand-in for the asynchronous copy engine. The interface
        // matches what the kernels call, but copies do not overlap with compute.
        struct simdgroup_event {
          METAL_FUNC simdgroup_event() thread {}
    "});
    for direction in CopyDirection::ALL {
        event
            .emit("\n")
            .emit_indented(emit_elementwise_copy(direction), MEMBER_INDENTATION);
    }
    for direction in CopyDirection::ALL {
        event
            .emit("\n")
            .emit_indented(emit_tile_copy(direction), MEMBER_INDENTATION);
    }
    event
        .emit("\n")
        .emit_indented(emit_wait(), MEMBER_INDENTATION)
        .emit("};\n");

    let source = header.build_source();
    tracing::debug!(header = header.name(), bytes = source.len(), "generated header");
    source
}
