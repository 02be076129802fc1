pub mod binding;
pub mod code;
pub mod definition;
#[allow(clippy::module_inception)]
pub mod error;

pub use binding::BindingError;
pub use code::ErrorCode;
pub use definition::DefinitionError;
pub use error::CliError;
