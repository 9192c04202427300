#[macro_use]
pub mod macros;
pub mod buffer2;
pub mod file_format;
pub mod float_ext;
pub mod log_setup;
pub mod shared;

pub use buffer2::Buffer2;
pub use file_format::{FileExtensionError, FileFormat, FileFormatResult};
pub use float_ext::FloatExt;
pub use shared::Shared;

pub const EPSILON: f64 = 1e-6;
