//! Generation of the `load`/`store` member functions of
//! `simdgroup_matrix_storage`.
//!
//! Every variant shares the same skeleton:
//! - device memory takes a `uint` elements_per_row, threadgroup memory a `ushort`
//! - both take a `ushort2` matrix_origin; the 32-bit part of the address
//!   has already been folded into the pointer by `apply_offset`
//! - a transposed access always goes through two scalar accesses, one per
//!   element, adding 0 or 1 to `matrix_origin.x`
//!
//! When decoding bfloat, registers hold `float` and memory holds `bfloat`.
//! A float whose low half-word is ignored is a bfloat, so conversion is a
//! matter of placing each 16-bit value in the upper half of a 32-bit lane.

use super::address::ElementAddress;
use crate::{
    builder::Block,
    error::{Error, Result},
    generators::AddressSpace,
};
use std::fmt::Write;

/// Direction of a memory access.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Load,
    Store,
}

impl Action {
    pub const ALL: [Self; 2] = [Self::Load, Self::Store];

    fn function_name(self) -> &'static str {
        match self {
            Action::Load => "load",
            Action::Store => "store",
        }
    }
}

/// Complete description of one generated load or store function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoryAccessDescriptor {
    pub action: Action,
    pub address_space: AddressSpace,
    /// Memory holds `bfloat` while registers hold `float`.
    pub decoding_bf16: bool,
    /// Number of spaces every emitted line is prefixed with.
    pub indentation: usize,
}

impl MemoryAccessDescriptor {
    pub fn new(
        action: Action,
        address_space: AddressSpace,
        decoding_bf16: bool,
        indentation: usize,
    ) -> Self {
        Self {
            action,
            address_space,
            decoding_bf16,
            indentation,
        }
    }

    pub fn builder() -> MemoryAccessDescriptorBuilder {
        MemoryAccessDescriptorBuilder::default()
    }

    /// Name of the generated member function, e.g. `load_bfloat`.
    pub fn function_name(&self) -> String {
        let mut name = self.action.function_name().to_string();
        if self.decoding_bf16 {
            name.push_str("_bfloat");
        }
        name
    }

    /// Element type of the pointer argument.
    fn memory_type(&self) -> &'static str {
        if self.decoding_bf16 { "bfloat" } else { "U" }
    }

    fn pointer_argument(&self) -> String {
        let space = self.address_space.keyword();
        let ty = self.memory_type();
        match self.action {
            Action::Load => format!("const {space} {ty} *src"),
            Action::Store => format!("{space} {ty} *dst"),
        }
    }

    fn arguments(&self) -> [String; 4] {
        [
            self.pointer_argument(),
            format!("{} elements_per_row", self.address_space.offset_type()),
            "ushort2 matrix_origin".to_string(),
            "bool transpose_matrix = false".to_string(),
        ]
    }
}

/// Builder for a [`MemoryAccessDescriptor`] whose fields may be set in any
/// order. Every field is required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryAccessDescriptorBuilder {
    action: Option<Action>,
    address_space: Option<AddressSpace>,
    decoding_bf16: Option<bool>,
    indentation: Option<usize>,
}

impl MemoryAccessDescriptorBuilder {
    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn address_space(mut self, address_space: AddressSpace) -> Self {
        self.address_space = Some(address_space);
        self
    }

    pub fn decoding_bf16(mut self, decoding_bf16: bool) -> Self {
        self.decoding_bf16 = Some(decoding_bf16);
        self
    }

    pub fn indentation(mut self, indentation: usize) -> Self {
        self.indentation = Some(indentation);
        self
    }

    /// Fails with [`Error::InvalidDescriptor`] naming the first unset field.
    pub fn build(&self) -> Result<MemoryAccessDescriptor> {
        let missing = |field| Error::InvalidDescriptor { field };
        Ok(MemoryAccessDescriptor {
            action: self.action.ok_or_else(|| missing("action"))?,
            address_space: self.address_space.ok_or_else(|| missing("address_space"))?,
            decoding_bf16: self.decoding_bf16.ok_or_else(|| missing("decoding_bf16"))?,
            indentation: self.indentation.ok_or_else(|| missing("indentation"))?,
        })
    }

    /// Generates the function, or fails without output if a field is unset.
    pub fn generate(&self) -> Result<String> {
        self.build().map(create_memory_access)
    }
}

/// How the two elements owned by a lane travel to or from memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessPath {
    /// Two independent scalar accesses, one per element.
    TwoPart { transposed: bool },
    /// One packed 2-wide access at the first element's address.
    OnePart,
}

/// Runtime condition in front of a branch of the generated body.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Guard {
    Transposed,
    OddStride,
}

impl Guard {
    fn condition(self) -> &'static str {
        match self {
            Guard::Transposed => "transpose_matrix",
            Guard::OddStride => "elements_per_row % 2 != 0",
        }
    }

    fn holds(self, transpose_matrix: bool, elements_per_row: u32) -> bool {
        match self {
            Guard::Transposed => transpose_matrix,
            Guard::OddStride => elements_per_row % 2 != 0,
        }
    }
}

/// The branch structure of a generated body: guarded paths tried in
/// order, then a fallback.
#[derive(Debug, Clone)]
struct Branches {
    guarded: Vec<(Guard, AccessPath)>,
    fallback: AccessPath,
}

impl Branches {
    fn new(descriptor: &MemoryAccessDescriptor) -> Self {
        let mut guarded = vec![(Guard::Transposed, AccessPath::TwoPart { transposed: true })];
        let fallback = if descriptor.decoding_bf16 {
            // A packed bfloat store would need the lanes reordered before
            // a single write, so only loads get the one-part path.
            match descriptor.action {
                Action::Load => AccessPath::OnePart,
                Action::Store => AccessPath::TwoPart { transposed: false },
            }
        } else {
            // Packed vectors need an even stride to stay aligned.
            guarded.push((Guard::OddStride, AccessPath::TwoPart { transposed: false }));
            AccessPath::OnePart
        };
        Self { guarded, fallback }
    }

    fn resolve(&self, transpose_matrix: bool, elements_per_row: u32) -> AccessPath {
        self.guarded
            .iter()
            .find(|(guard, _)| guard.holds(transpose_matrix, elements_per_row))
            .map_or(self.fallback, |&(_, path)| path)
    }
}

/// Path the generated function takes at runtime for the given arguments.
pub fn resolve_access_path(
    descriptor: &MemoryAccessDescriptor,
    transpose_matrix: bool,
    elements_per_row: u32,
) -> AccessPath {
    Branches::new(descriptor).resolve(transpose_matrix, elements_per_row)
}

fn two_part_access(descriptor: &MemoryAccessDescriptor, transposed: bool) -> Block {
    let ty = descriptor.address_space.offset_type();
    let mut block = Block::new();
    for (lane, address) in ElementAddress::pair(descriptor.address_space, transposed)
        .iter()
        .enumerate()
    {
        block.push(format!("{ty} address{lane} = {address}"));
    }

    match (descriptor.action, descriptor.decoding_bf16) {
        (Action::Load, true) => {
            block
                .push("bfloat memoryForm0 = src[address0]")
                .push("bfloat memoryForm1 = src[address1]")
                .blank()
                .push("bfloat4 registerForm = *(thread bfloat4*)(thread_elements())")
                .push("registerForm[1] = memoryForm0")
                .push("registerForm[3] = memoryForm1")
                .push("((thread bfloat4*)thread_elements())[0] = registerForm");
        }
        (Action::Load, false) => {
            block
                .push("U memoryForm0 = src[address0]")
                .push("U memoryForm1 = src[address1]")
                .push("((thread T*)thread_elements())[0] = T(memoryForm0)")
                .push("((thread T*)thread_elements())[1] = T(memoryForm1)");
        }
        (Action::Store, true) => {
            block
                .push("bfloat4 registerForm = *(thread bfloat4*)(thread_elements())")
                .push("registerForm[2] = registerForm[1]")
                .push("dst[address0] = registerForm[2]")
                .push("dst[address1] = registerForm[3]");
        }
        (Action::Store, false) => {
            block
                .push("T registerForm0 = ((thread T*)thread_elements())[0]")
                .push("T registerForm1 = ((thread T*)thread_elements())[1]")
                .push("dst[address0] = U(registerForm0)")
                .push("dst[address1] = U(registerForm1)");
        }
    }
    block
}

fn one_part_access(descriptor: &MemoryAccessDescriptor) -> Block {
    let space = descriptor.address_space.keyword();
    let address = ElementAddress::new(descriptor.address_space, false, 0);
    let mut block = Block::new();
    block.push(format!("auto combinedAddress = {address}"));

    match (descriptor.action, descriptor.decoding_bf16) {
        (Action::Load, true) => {
            // The packed pair becomes the second float wholesale, which puts
            // element 1 in its upper half. Element 0 is then written to the
            // upper half of the first float.
            block
                .push(format!(
                    "bfloat2 memoryForm = *(const {space} packed_bfloat2*)(src + combinedAddress)"
                ))
                .blank()
                .push("bfloat4 registerForm = *(thread bfloat4*)(thread_elements())")
                .push("((thread float*)&registerForm)[1] = *(thread float*)(&memoryForm)")
                .push("((thread bfloat*)&registerForm)[1] = memoryForm[0]")
                .push("((thread bfloat4*)thread_elements())[0] = registerForm");
        }
        (Action::Load, false) => {
            block
                .push(format!(
                    "vec<U, 2> memoryForm = *(const {space} vec<U, 2>*)(src + combinedAddress)"
                ))
                .push("*(thread_elements()) = vec<T, 2>(memoryForm)");
        }
        (Action::Store, false) => {
            block
                .push("vec<T, 2> registerForm = *(thread_elements())")
                .push(format!(
                    "*({space} vec<U, 2>*)(dst + combinedAddress) = vec<U, 2>(registerForm)"
                ));
        }
        (Action::Store, true) => unreachable!("bfloat stores have no packed path"),
    }
    block
}

fn access_block(descriptor: &MemoryAccessDescriptor, path: AccessPath) -> Block {
    match path {
        AccessPath::TwoPart { transposed } => two_part_access(descriptor, transposed),
        AccessPath::OnePart => one_part_access(descriptor),
    }
}

/// Emits one complete member function implementing `descriptor`.
pub fn create_memory_access(descriptor: MemoryAccessDescriptor) -> String {
    let indentation = " ".repeat(descriptor.indentation);
    let mut s = String::new();

    if descriptor.decoding_bf16 {
        writeln!(s, "{indentation}// WARNING: 'T' must be 'float'.").unwrap();
    } else {
        writeln!(s, "{indentation}template <typename U>").unwrap();
    }
    writeln!(
        s,
        "{indentation}METAL_FUNC void {}({}) {{",
        descriptor.function_name(),
        descriptor.arguments().join(", ")
    )
    .unwrap();

    let body_prefix = format!("{indentation}  ");
    let branches = Branches::new(&descriptor);
    for (i, (guard, path)) in branches.guarded.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "} else if" };
        writeln!(s, "{body_prefix}{keyword} ({}) {{", guard.condition()).unwrap();
        s.push_str(&access_block(&descriptor, *path).render(&body_prefix));
    }
    writeln!(s, "{body_prefix}}} else {{").unwrap();
    s.push_str(&access_block(&descriptor, branches.fallback).render(&body_prefix));
    writeln!(s, "{body_prefix}}}").unwrap();
    writeln!(s, "{indentation}}}").unwrap();

    tracing::trace!(
        function = %descriptor.function_name(),
        address_space = %descriptor.address_space,
        bytes = s.len(),
        "generated matrix access"
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use rstest::rstest;

    fn descriptor(
        action: Action,
        address_space: AddressSpace,
        decoding_bf16: bool,
    ) -> MemoryAccessDescriptor {
        MemoryAccessDescriptor::new(action, address_space, decoding_bf16, 4)
    }

    #[test]
    fn builder_requires_every_field() {
        let complete = MemoryAccessDescriptor::builder()
            .action(Action::Load)
            .address_space(AddressSpace::Device)
            .decoding_bf16(false)
            .indentation(4);
        assert_eq!(
            complete.build(),
            Ok(descriptor(Action::Load, AddressSpace::Device, false))
        );

        let cases = [
            (
                MemoryAccessDescriptor::builder()
                    .address_space(AddressSpace::Device)
                    .decoding_bf16(false)
                    .indentation(4),
                "action",
            ),
            (
                MemoryAccessDescriptor::builder()
                    .action(Action::Store)
                    .decoding_bf16(true)
                    .indentation(0),
                "address_space",
            ),
            (
                MemoryAccessDescriptor::builder()
                    .action(Action::Store)
                    .address_space(AddressSpace::Threadgroup)
                    .indentation(2),
                "decoding_bf16",
            ),
            (
                MemoryAccessDescriptor::builder()
                    .action(Action::Load)
                    .address_space(AddressSpace::Threadgroup)
                    .decoding_bf16(true),
                "indentation",
            ),
        ];
        for (builder, field) in cases {
            assert_eq!(builder.generate(), Err(Error::InvalidDescriptor { field }));
        }
    }

    #[test]
    fn device_load_matches_expected_source() {
        let source = create_memory_access(descriptor(Action::Load, AddressSpace::Device, false));
        assert_eq!(
            source,
            indoc! {"
                template <typename U>
                METAL_FUNC void load(const device U *src, uint elements_per_row, ushort2 matrix_origin, bool transpose_matrix = false) {
                  if (transpose_matrix) {
                    uint address0 = uint(matrix_origin.x + 0) * elements_per_row + uint(matrix_origin.y);
                    uint address1 = uint(matrix_origin.x + 1) * elements_per_row + uint(matrix_origin.y);
                    U memoryForm0 = src[address0];
                    U memoryForm1 = src[address1];
                    ((thread T*)thread_elements())[0] = T(memoryForm0);
                    ((thread T*)thread_elements())[1] = T(memoryForm1);
                  } else if (elements_per_row % 2 != 0) {
                    uint address0 = uint(matrix_origin.y) * elements_per_row + uint(matrix_origin.x + 0);
                    uint address1 = uint(matrix_origin.y) * elements_per_row + uint(matrix_origin.x + 1);
                    U memoryForm0 = src[address0];
                    U memoryForm1 = src[address1];
                    ((thread T*)thread_elements())[0] = T(memoryForm0);
                    ((thread T*)thread_elements())[1] = T(memoryForm1);
                  } else {
                    auto combinedAddress = uint(matrix_origin.y) * elements_per_row + uint(matrix_origin.x + 0);
                    vec<U, 2> memoryForm = *(const device vec<U, 2>*)(src + combinedAddress);
                    *(thread_elements()) = vec<T, 2>(memoryForm);
                  }
                }
            "}
            .lines()
            .map(|line| format!("    {line}\n"))
            .collect::<String>()
        );
    }

    #[test]
    fn device_bfloat_store_matches_expected_source() {
        let source = create_memory_access(descriptor(Action::Store, AddressSpace::Device, true));
        assert_eq!(
            source,
            indoc! {"
                // WARNING: 'T' must be 'float'.
                METAL_FUNC void store_bfloat(device bfloat *dst, uint elements_per_row, ushort2 matrix_origin, bool transpose_matrix = false) {
                  if (transpose_matrix) {
                    uint address0 = uint(matrix_origin.x + 0) * elements_per_row + uint(matrix_origin.y);
                    uint address1 = uint(matrix_origin.x + 1) * elements_per_row + uint(matrix_origin.y);
                    bfloat4 registerForm = *(thread bfloat4*)(thread_elements());
                    registerForm[2] = registerForm[1];
                    dst[address0] = registerForm[2];
                    dst[address1] = registerForm[3];
                  } else {
                    uint address0 = uint(matrix_origin.y) * elements_per_row + uint(matrix_origin.x + 0);
                    uint address1 = uint(matrix_origin.y) * elements_per_row + uint(matrix_origin.x + 1);
                    bfloat4 registerForm = *(thread bfloat4*)(thread_elements());
                    registerForm[2] = registerForm[1];
                    dst[address0] = registerForm[2];
                    dst[address1] = registerForm[3];
                  }
                }
            "}
            .lines()
            .map(|line| format!("    {line}\n"))
            .collect::<String>()
        );
    }

    #[test]
    fn packed_bfloat_load_splices_first_element() {
        let load = descriptor(Action::Load, AddressSpace::Threadgroup, true);
        let block = access_block(&load, AccessPath::OnePart);
        let expected = [
            "  auto combinedAddress = ushort(matrix_origin.y) * elements_per_row + ushort(matrix_origin.x + 0);",
            "  bfloat2 memoryForm = *(const threadgroup packed_bfloat2*)(src + combinedAddress);",
            "  ",
            "  bfloat4 registerForm = *(thread bfloat4*)(thread_elements());",
            "  ((thread float*)&registerForm)[1] = *(thread float*)(&memoryForm);",
            "  ((thread bfloat*)&registerForm)[1] = memoryForm[0];",
            "  ((thread bfloat4*)thread_elements())[0] = registerForm;",
        ];
        assert_eq!(
            block.render(""),
            expected.map(|line| format!("{line}\n")).concat()
        );
    }

    #[test]
    fn threadgroup_bfloat_store_signature() {
        let source =
            create_memory_access(descriptor(Action::Store, AddressSpace::Threadgroup, true));
        let mut lines = source.lines();
        assert_eq!(lines.next(), Some("    // WARNING: 'T' must be 'float'."));
        assert_eq!(
            lines.next(),
            Some(
                "    METAL_FUNC void store_bfloat(threadgroup bfloat *dst, ushort elements_per_row, ushort2 matrix_origin, bool transpose_matrix = false) {"
            )
        );
        assert_eq!(source.matches("} else {").count(), 1);
        assert!(!source.contains("elements_per_row % 2"));
        assert!(!source.contains("combinedAddress"));
    }

    #[test]
    fn bfloat_load_separates_decoding_with_blank_line() {
        let source = create_memory_access(descriptor(Action::Load, AddressSpace::Device, true));
        // one blank line per branch, indentation plus two levels, no terminator
        assert_eq!(source.lines().filter(|line| line.trim().is_empty()).count(), 2);
        assert!(source.lines().any(|line| line == "        "));
        assert!(source.contains(
            "      bfloat2 memoryForm = *(const device packed_bfloat2*)(src + combinedAddress);\n"
        ));
    }

    #[test]
    fn one_part_device_load_for_even_stride() {
        let load = descriptor(Action::Load, AddressSpace::Device, false);
        assert_eq!(resolve_access_path(&load, false, 4), AccessPath::OnePart);

        let block = access_block(&load, AccessPath::OnePart);
        let statements: Vec<_> = block.statements().collect();
        assert_eq!(
            statements
                .iter()
                .filter(|s| s.contains("*(const device vec<U, 2>*)"))
                .count(),
            1
        );
        assert!(statements.iter().all(|s| !s.contains("src[")));
    }

    #[rstest]
    fn bfloat_store_is_always_two_part(
        #[values(false, true)] transpose: bool,
        #[values(1, 2, 7, 64)] elements_per_row: u32,
    ) {
        let store = descriptor(Action::Store, AddressSpace::Threadgroup, true);
        let path = resolve_access_path(&store, transpose, elements_per_row);
        assert_eq!(path, AccessPath::TwoPart { transposed: transpose });

        let block = access_block(&store, path);
        assert_eq!(block.statements().filter(|s| s.starts_with("dst[")).count(), 2);
    }

    #[rstest]
    #[case(true, false, Action::Load, 4, AccessPath::TwoPart { transposed: true })]
    #[case(true, true, Action::Store, 3, AccessPath::TwoPart { transposed: true })]
    #[case(false, false, Action::Load, 3, AccessPath::TwoPart { transposed: false })]
    #[case(false, false, Action::Store, 5, AccessPath::TwoPart { transposed: false })]
    #[case(false, false, Action::Store, 8, AccessPath::OnePart)]
    #[case(false, true, Action::Load, 3, AccessPath::OnePart)]
    #[case(false, true, Action::Load, 8, AccessPath::OnePart)]
    #[case(false, true, Action::Store, 8, AccessPath::TwoPart { transposed: false })]
    fn branch_table(
        #[case] transpose: bool,
        #[case] decoding_bf16: bool,
        #[case] action: Action,
        #[case] elements_per_row: u32,
        #[case] expected: AccessPath,
    ) {
        for address_space in AddressSpace::ALL {
            let descriptor = descriptor(action, address_space, decoding_bf16);
            assert_eq!(
                resolve_access_path(&descriptor, transpose, elements_per_row),
                expected
            );
        }
    }

    #[test]
    fn generation_is_deterministic() {
        for action in Action::ALL {
            for space in AddressSpace::ALL {
                for bf16 in [false, true] {
                    let descriptor = MemoryAccessDescriptor::new(action, space, bf16, 2);
                    assert_eq!(create_memory_access(descriptor), create_memory_access(descriptor));
                }
            }
        }
    }
}
