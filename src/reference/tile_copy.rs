use crate::generators::simdgroup_event::ClampMode;

/// A 2D tile inside a row-major buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub elements_per_row: u32,
    /// `[width, height]` in elements.
    pub dimensions: [u16; 2],
}

impl Tile {
    pub fn new(elements_per_row: u32, dimensions: [u16; 2]) -> Self {
        Self {
            elements_per_row,
            dimensions,
        }
    }

    fn transposed(self, transpose_matrix: bool) -> Self {
        if transpose_matrix {
            let [x, y] = self.dimensions;
            Self {
                dimensions: [y, x],
                ..self
            }
        } else {
            self
        }
    }

    fn index(&self, x: u16, y: u16) -> usize {
        (u64::from(y) * u64::from(self.elements_per_row) + u64::from(x)) as usize
    }
}

/// Copies `n_elements` scalars from `src` to `dst`.
///
/// # Panics
/// Panics if either slice is shorter than `n_elements`.
pub fn copy_elements<T: Copy>(dst: &mut [T], src: &[T], n_elements: usize) {
    dst[..n_elements].copy_from_slice(&src[..n_elements]);
}

/// Device-to-threadgroup tiled copy.
///
/// Writes every cell of the destination tile. Cells without an in-bounds
/// source cell are filled according to `clamp_mode`; clamping to the edge
/// needs a non-empty source tile and falls back to zero otherwise.
///
/// # Panics
/// Panics if a tile addresses memory beyond the end of its slice.
pub fn copy_to_threadgroup<T: Copy + Default>(
    dst: &mut [T],
    dst_tile: Tile,
    src: &[T],
    src_tile: Tile,
    transpose_matrix: bool,
    clamp_mode: ClampMode,
) {
    let dst_tile = dst_tile.transposed(transpose_matrix);
    let src_tile = src_tile.transposed(transpose_matrix);
    let [src_width, src_height] = src_tile.dimensions;

    for y in 0..dst_tile.dimensions[1] {
        for x in 0..dst_tile.dimensions[0] {
            let value = if x < src_width && y < src_height {
                src[src_tile.index(x, y)]
            } else if clamp_mode == ClampMode::ClampToEdge && src_width > 0 && src_height > 0 {
                src[src_tile.index(x.min(src_width - 1), y.min(src_height - 1))]
            } else {
                T::default()
            };
            dst[dst_tile.index(x, y)] = value;
        }
    }
}

/// Threadgroup-to-device tiled copy.
///
/// Only the overlap of the two tiles is copied. Destination cells outside
/// it are not written.
///
/// # Panics
/// Panics if a tile addresses memory beyond the end of its slice.
pub fn copy_to_device<T: Copy>(
    dst: &mut [T],
    dst_tile: Tile,
    src: &[T],
    src_tile: Tile,
    transpose_matrix: bool,
) {
    let dst_tile = dst_tile.transposed(transpose_matrix);
    let src_tile = src_tile.transposed(transpose_matrix);
    let width = dst_tile.dimensions[0].min(src_tile.dimensions[0]);
    let height = dst_tile.dimensions[1].min(src_tile.dimensions[1]);

    for y in 0..height {
        for x in 0..width {
            dst[dst_tile.index(x, y)] = src[src_tile.index(x, y)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// `width` x `height` buffer holding `1 + y * width + x` in each cell.
    fn numbered(width: u16, height: u16) -> Vec<f32> {
        (0..u32::from(width) * u32::from(height))
            .map(|i| (i + 1) as f32)
            .collect()
    }

    #[test]
    fn elementwise_copy() {
        let src = [1, 2, 3, 4];
        let mut dst = [0; 4];
        copy_elements(&mut dst, &src, 3);
        assert_eq!(dst, [1, 2, 3, 0]);
    }

    #[test]
    fn clamp_to_edge_repeats_border() {
        let src = numbered(2, 2);
        let mut dst = vec![-1.0; 16];
        copy_to_threadgroup(
            &mut dst,
            Tile::new(4, [4, 4]),
            &src,
            Tile::new(2, [2, 2]),
            false,
            ClampMode::ClampToEdge,
        );

        for y in 0..4u16 {
            for x in 0..4u16 {
                let expected = src[Tile::new(2, [2, 2]).index(x.min(1), y.min(1))];
                assert_eq!(dst[usize::from(y * 4 + x)], expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn clamp_to_zero_fills_outside() {
        let src = numbered(2, 2);
        let mut dst = vec![-1.0; 16];
        copy_to_threadgroup(
            &mut dst,
            Tile::new(4, [4, 4]),
            &src,
            Tile::new(2, [2, 2]),
            false,
            ClampMode::ClampToZero,
        );

        for y in 0..4u16 {
            for x in 0..4u16 {
                let cell = dst[usize::from(y * 4 + x)];
                if x >= 2 || y >= 2 {
                    assert_eq!(cell, 0.0, "({x}, {y})");
                } else {
                    assert_eq!(cell, src[usize::from(y * 2 + x)]);
                }
            }
        }
    }

    #[rstest]
    fn empty_source_zero_fills(
        #[values(ClampMode::ClampToZero, ClampMode::ClampToEdge)] clamp_mode: ClampMode,
        #[values([0, 2], [2, 0], [0, 0])] src_dimensions: [u16; 2],
    ) {
        let src = numbered(2, 2);
        let mut dst = vec![-1.0; 9];
        copy_to_threadgroup(
            &mut dst,
            Tile::new(3, [3, 3]),
            &src,
            Tile::new(2, src_dimensions),
            false,
            clamp_mode,
        );
        assert!(dst.iter().all(|&cell| cell == 0.0));
    }

    #[test]
    fn transpose_swaps_extents_only() {
        // 3 wide, 2 tall source read as a 2x3 tile
        let src = numbered(4, 4);
        let mut dst = vec![-1.0; 16];
        copy_to_threadgroup(
            &mut dst,
            Tile::new(4, [3, 2]),
            &src,
            Tile::new(4, [3, 2]),
            true,
            ClampMode::ClampToZero,
        );
        for y in 0..4u16 {
            for x in 0..4u16 {
                let i = usize::from(y * 4 + x);
                if x < 2 && y < 3 {
                    assert_eq!(dst[i], src[i], "({x}, {y})");
                } else {
                    assert_eq!(dst[i], -1.0, "({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn reverse_copy_truncates_to_overlap() {
        let src = numbered(4, 4);
        let mut dst = vec![-1.0; 16];
        copy_to_device(
            &mut dst,
            Tile::new(4, [2, 2]),
            &src,
            Tile::new(4, [4, 4]),
            false,
        );
        for y in 0..4u16 {
            for x in 0..4u16 {
                let i = usize::from(y * 4 + x);
                if x < 2 && y < 2 {
                    assert_eq!(dst[i], src[i]);
                } else {
                    assert_eq!(dst[i], -1.0, "({x}, {y}) was written");
                }
            }
        }
    }

    #[test]
    fn forward_then_reverse_restores_tile() {
        let src = numbered(6, 5);
        let mut scratch = vec![0.0; 8 * 8];
        copy_to_threadgroup(
            &mut scratch,
            Tile::new(8, [8, 8]),
            &src,
            Tile::new(6, [6, 5]),
            false,
            ClampMode::ClampToZero,
        );

        let mut out = vec![0.0; 6 * 5];
        copy_to_device(
            &mut out,
            Tile::new(6, [6, 5]),
            &scratch,
            Tile::new(8, [8, 8]),
            false,
        );
        assert_eq!(out, src);
    }
}
