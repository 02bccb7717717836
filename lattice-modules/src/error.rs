//! Module system error types

use lattice_ioc::DiError;
use thiserror::Error;

/// Type alias for module system results
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that can occur in the module system
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Module could not be found by the loader
    #[error("Module not found: {name}")]
    ModuleNotFound {
        /// Requested module specifier
        name: String,
    },

    /// Circular dependency was detected between modules
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the dependency cycle
        cycle: String,
    },

    /// Requested export was not found in the module
    #[error("Export not found: {name} in module {module}")]
    ExportNotFound {
        /// Name of the missing export
        name: String,
        /// Module that was expected to contain the export
        module: String,
    },

    /// Module name is invalid
    #[error("Invalid module name: {name}")]
    InvalidModuleName {
        /// The invalid module name
        name: String,
    },

    /// Loader failed while materializing a module
    #[error("Load error in module {module}: {message}")]
    LoadError {
        /// Module the loader was working on
        module: String,
        /// Error message
        message: String,
    },

    /// Error raised by the underlying container
    #[error("Container error: {0}")]
    Ioc(#[from] DiError),
}
