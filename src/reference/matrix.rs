//! Lane-level execution of the generated `load`/`store` functions.
//!
//! Each function resolves the same [`AccessPath`] as the generated body for
//! the given arguments, evaluates the same addresses and returns the path
//! it took, so callers can check both the data and the branch.

use crate::{
    generators::{
        AddressSpace,
        matrix_storage::{
            AccessPath, Action, MemoryAccessDescriptor, address::ElementAddress,
            resolve_access_path,
        },
    },
    reference::register::ThreadElements,
};
use half::bf16;

/// Arguments shared by every generated load and store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatrixAccess {
    pub address_space: AddressSpace,
    pub elements_per_row: u32,
    pub matrix_origin: [u16; 2],
    pub transpose_matrix: bool,
}

impl MatrixAccess {
    fn path(&self, action: Action, decoding_bf16: bool) -> AccessPath {
        let descriptor = MemoryAccessDescriptor::new(action, self.address_space, decoding_bf16, 0);
        resolve_access_path(&descriptor, self.transpose_matrix, self.elements_per_row)
    }

    fn addresses(&self, transposed: bool) -> [usize; 2] {
        ElementAddress::pair(self.address_space, transposed)
            .map(|address| address.evaluate(self.matrix_origin, self.elements_per_row) as usize)
    }

    /// Addresses of the two elements for a given path. A packed access
    /// covers two consecutive elements starting at `combinedAddress`, which
    /// keeps the full width of the expression.
    fn path_addresses(&self, path: AccessPath) -> [usize; 2] {
        match path {
            AccessPath::TwoPart { transposed } => self.addresses(transposed),
            AccessPath::OnePart => {
                let combined = ElementAddress::new(self.address_space, false, 0)
                    .offset(self.matrix_origin, self.elements_per_row);
                let first = combined as usize;
                [first, first + 1]
            }
        }
    }
}

/// `load`: reads two `f32` values into the lane's registers.
pub fn load(access: MatrixAccess, src: &[f32], elements: &mut ThreadElements) -> AccessPath {
    let path = access.path(Action::Load, false);
    let [a0, a1] = access.path_addresses(path);
    *elements = ThreadElements::from_f32([src[a0], src[a1]]);
    path
}

/// `store`: writes the lane's two registers as `f32`.
pub fn store(access: MatrixAccess, dst: &mut [f32], elements: &ThreadElements) -> AccessPath {
    let path = access.path(Action::Store, false);
    let [a0, a1] = access.path_addresses(path);
    let [v0, v1] = elements.to_f32();
    dst[a0] = v0;
    dst[a1] = v1;
    path
}

/// `load_bfloat`: reads two bfloats and widens them into `float` registers.
pub fn load_bfloat(
    access: MatrixAccess,
    src: &[bf16],
    elements: &mut ThreadElements,
) -> AccessPath {
    let path = access.path(Action::Load, true);
    let [a0, a1] = access.path_addresses(path);
    let memory = [src[a0], src[a1]];
    match path {
        AccessPath::TwoPart { .. } => elements.decode_bf16_pair(memory),
        AccessPath::OnePart => elements.decode_packed_bf16(memory),
    }
    path
}

/// `store_bfloat`: narrows the lane's `float` registers into two bfloats.
pub fn store_bfloat(
    access: MatrixAccess,
    dst: &mut [bf16],
    elements: &ThreadElements,
) -> AccessPath {
    let path = access.path(Action::Store, true);
    let [a0, a1] = access.path_addresses(path);
    let [v0, v1] = elements.encode_bf16_pair();
    dst[a0] = v0;
    dst[a1] = v1;
    path
}
