//! Assignment of SIMD lanes to the elements of an 8x8 matrix.
//!
//! Each of the 32 lanes owns two horizontally adjacent elements. Lanes are
//! laid out in Morton order: four 4x4 quadrants, each quadrant walked as
//! pairs of lanes per row. The same layout is assumed by every load, store
//! and multiply in the generated `simdgroup_matrix_storage`.

use indoc::indoc;
use std::fmt::Write;

/// Number of lanes in a SIMD group.
pub const SIMD_WIDTH: u16 = 32;
/// Side length of the matrix fragment shared by a SIMD group.
pub const FRAGMENT_SIZE: u16 = 8;
/// Number of adjacent elements owned by each lane.
pub const ELEMENTS_PER_LANE: u16 = 2;

/// Returns the `[column, row]` of the first of the two elements
/// owned by `lane`. Lane indices wrap modulo [`SIMD_WIDTH`].
pub fn morton_order(lane: u16) -> [u16; 2] {
    let lane = lane % SIMD_WIDTH;
    let quad = lane / 4;

    let row_floor = (quad / 4) * 4;
    let row_in_quadrant = (lane / 2) % 4;

    let column_floor = (quad & 2) * 2;
    let column_in_quadrant = (lane % 2) * 2;

    [column_floor + column_in_quadrant, row_floor + row_in_quadrant]
}

/// Owning lane of every element, indexed as `[row][column]`.
pub fn lane_table() -> [[u16; FRAGMENT_SIZE as usize]; FRAGMENT_SIZE as usize] {
    let mut table = [[0; FRAGMENT_SIZE as usize]; FRAGMENT_SIZE as usize];
    for lane in 0..SIMD_WIDTH {
        let [column, row] = morton_order(lane);
        for element in 0..ELEMENTS_PER_LANE {
            table[row as usize][(column + element) as usize] = lane;
        }
    }
    table
}

/// Emits the layout diagram and the Metal definition of `morton_order`.
pub(crate) fn emit_morton_order() -> String {
    let mut s = String::new();
    writeln!(s, "// The layout of threads within a SIMD matrix.").unwrap();
    writeln!(s, "//").unwrap();
    for row in lane_table() {
        write!(s, "//").unwrap();
        for lane in row {
            write!(s, " {lane:>2}").unwrap();
        }
        writeln!(s).unwrap();
    }
    s.push_str(indoc! {"
        //
        // This is Morton order, which keeps the elements touched by
        // neighboring lanes close together in memory.
        METAL_FUNC static ushort2 morton_order(ushort thread_index_in_simdgroup) {
          ushort lane_id = thread_index_in_simdgroup;
          ushort quad_id = lane_id / 4;

          constexpr ushort QUADRANT_SPAN_M = 4;
          constexpr ushort THREADS_PER_QUADRANT = 8;
          ushort M_floor_of_quadrant = (quad_id / 4) * QUADRANT_SPAN_M;
          ushort M_in_quadrant = (lane_id / 2) % (THREADS_PER_QUADRANT / 2);
          ushort M_in_simd = M_floor_of_quadrant + M_in_quadrant;

          ushort N_floor_of_quadrant = (quad_id & 2) * 2; // 0 or 4
          ushort N_in_quadrant = (lane_id % 2) * 2; // 0 or 2
          ushort N_in_simd = N_floor_of_quadrant + N_in_quadrant;

          return ushort2(N_in_simd, M_in_simd);
        }
    "});
    s
}
