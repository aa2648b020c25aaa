//! The `PackStream` codec: a typed, tagged binary serialization format (spec.md §3, §4.1).

mod decode;
mod encode;
mod marker;
mod registry;
mod value;

pub use decode::{decode, PackStreamError};
pub use encode::encode;
pub use registry::Registry;
pub use value::{Dict, Structure, Value};
