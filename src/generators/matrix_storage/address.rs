//! Address arithmetic for matrix loads and stores.
//!
//! A matrix is addressed as `row * elements_per_row + column`. With
//! `transpose_matrix` the roles of the origin's components flip, so the
//! x coordinate selects the row instead of the column.

use crate::generators::AddressSpace;
use indoc::formatdoc;
use std::fmt::{Display, Formatter};

/// Offset of one of the two elements owned by a lane, relative to the
/// pointer passed to a load or store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementAddress {
    pub address_space: AddressSpace,
    pub transposed: bool,
    /// Which of the lane's elements (0 or 1); added to `matrix_origin.x`.
    pub element: u16,
}

impl ElementAddress {
    pub fn new(address_space: AddressSpace, transposed: bool, element: u16) -> Self {
        Self {
            address_space,
            transposed,
            element,
        }
    }

    /// Both element addresses of a lane.
    pub fn pair(address_space: AddressSpace, transposed: bool) -> [Self; 2] {
        [0, 1].map(|element| Self::new(address_space, transposed, element))
    }

    /// Value of the generated expression before it is assigned anywhere.
    ///
    /// Every operand is cast to the offset type. `uint` arithmetic wraps at
    /// 32 bits, while `ushort` operands are promoted to `int`, so a
    /// threadgroup offset is not narrowed here. Values past `i32::MAX`
    /// would overflow `int` on the GPU and are not modeled.
    pub fn offset(&self, matrix_origin: [u16; 2], elements_per_row: u32) -> u64 {
        let cast = |value: u64| match self.address_space {
            AddressSpace::Device => value & u64::from(u32::MAX),
            AddressSpace::Threadgroup => value & u64::from(u16::MAX),
        };
        let x = cast(u64::from(matrix_origin[0]) + u64::from(self.element));
        let y = cast(u64::from(matrix_origin[1]));
        let stride = cast(u64::from(elements_per_row));
        let (major, minor) = if self.transposed { (x, y) } else { (y, x) };
        match self.address_space {
            AddressSpace::Device => (major * stride + minor) & u64::from(u32::MAX),
            AddressSpace::Threadgroup => major * stride + minor,
        }
    }

    /// Evaluates the address once it is stored in a variable of the
    /// address space's offset type, like `address0` and `address1`.
    pub fn evaluate(&self, matrix_origin: [u16; 2], elements_per_row: u32) -> u32 {
        self.address_space.wrap_offset(self.offset(matrix_origin, elements_per_row))
    }
}

impl Display for ElementAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ty = self.address_space.offset_type();
        let x = format!("{ty}(matrix_origin.x + {})", self.element);
        let y = format!("{ty}(matrix_origin.y)");
        if self.transposed {
            write!(f, "{x} * elements_per_row + {y}")
        } else {
            write!(f, "{y} * elements_per_row + {x}")
        }
    }
}

/// Emits the static `apply_offset` helper for one address space.
///
/// It moves a base pointer to a full 32-bit matrix origin so that the
/// load and store functions only deal with 16-bit origins. Device memory
/// widens the row product to `ulong` before it reaches the pointer.
pub(crate) fn emit_apply_offset(address_space: AddressSpace) -> String {
    let space = address_space.keyword();
    let ty = address_space.offset_type();
    let (origin, transposed, regular) = match address_space {
        AddressSpace::Device => (
            "uint2",
            "ulong(matrix_origin.x * elements_per_row)",
            "ulong(matrix_origin.y * elements_per_row)",
        ),
        AddressSpace::Threadgroup => (
            "ushort2",
            "matrix_origin.x * elements_per_row",
            "matrix_origin.y * elements_per_row",
        ),
    };

    formatdoc! {"
        METAL_FUNC static {space} T* apply_offset({space} T *src, {ty} elements_per_row, {origin} matrix_origin, bool transpose_matrix = false) {{
          if (transpose_matrix) {{
            return src + {transposed} + matrix_origin.y;
          }} else {{
            return src + {regular} + matrix_origin.x;
          }}
        }}
    "}
}

/// Host evaluation of `apply_offset`: the element offset it adds to `src`.
pub fn apply_offset(
    address_space: AddressSpace,
    elements_per_row: u32,
    matrix_origin: [u32; 2],
    transpose_matrix: bool,
) -> u64 {
    let [x, y] = matrix_origin;
    let (major, minor) = if transpose_matrix { (x, y) } else { (y, x) };
    match address_space {
        AddressSpace::Device => {
            u64::from(major.wrapping_mul(elements_per_row)) + u64::from(minor)
        }
        AddressSpace::Threadgroup => {
            // ushort operands are promoted to int, so only the inputs narrow
            let product = u64::from(major as u16) * u64::from(elements_per_row as u16);
            product + u64::from(minor as u16)
        }
    }
}
