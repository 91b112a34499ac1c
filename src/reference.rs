//! Host-side model of the primitives the generated headers define.
//!
//! Nothing here runs on a GPU. Each function performs the same element
//! movement and bit manipulation as the corresponding generated Metal code,
//! so the contracts of the emitted text can be checked by ordinary tests.

pub mod matrix;
pub mod register;
pub mod tile_copy;
