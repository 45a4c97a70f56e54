use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the LPM binding.
///
/// Native codes are kept as the engine returned them. Use
/// [`Engine::error_message`](crate::loader::Engine::error_message) to turn a
/// code into text.
#[derive(Error, Debug)]
pub enum LpmError {
    /// The engine library or one of its support libraries is missing or could
    /// not be opened, or a symbol is missing from it.
    #[error("failed to load {}: {source}", path.display())]
    Load {
        /// Library that failed.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// Another engine library is already loaded in this process.
    #[error("engine already loaded from {}, refusing to load {}", loaded.display(), requested.display())]
    AlreadyLoaded {
        /// Library loaded first.
        loaded: PathBuf,
        /// Library asked for now.
        requested: PathBuf,
    },

    /// `lpmInit` failed or returned a null state.
    #[error("engine initialization failed with code {code}")]
    Init {
        /// Native return code.
        code: i32,
    },

    /// The session was already closed.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// A module lookup returned the -1 sentinel.
    #[error("{function}: module not found")]
    NotFound {
        /// Native function name.
        function: &'static str,
        /// Native return value.
        code: i32,
    },

    /// `lpmLoadModule` returned non-zero.
    #[error("loading module {index} failed with code {code}")]
    ModuleLoad {
        /// Module index.
        index: i32,
        /// Native return code.
        code: i32,
    },

    /// The module is already loaded in this session.
    #[error("module {0} is already loaded")]
    ModuleAlreadyLoaded(i32),

    /// A detection or OCR call returned a null result.
    #[error("{function} returned no result (last error {code})")]
    Run {
        /// Native function name.
        function: &'static str,
        /// Engine's last error code at the time of failure.
        code: i32,
    },

    /// Any other native call that reported failure.
    #[error("{function} failed with code {code}")]
    NativeCall {
        /// Native function name.
        function: &'static str,
        /// Native return code.
        code: i32,
    },

    /// An argument cannot be passed to the engine as is.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error while looking up libraries or files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error occurred while decoding or encoding an image.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings file is not valid TOML or has unexpected fields.
    #[error("settings error: {0}")]
    Settings(#[from] toml::de::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LpmError>;
