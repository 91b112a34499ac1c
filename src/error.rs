pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A memory access descriptor was used before all of its fields were set.
    #[error("invalid memory access descriptor: `{field}` is not set")]
    InvalidDescriptor { field: &'static str },
}
