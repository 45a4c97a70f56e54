use std::ffi::CStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use libloading::Library;
use lpm_sys::*;
use parking_lot::{Mutex, const_mutex};

use crate::error::{LpmError, Result};
use crate::marshal;
use crate::types::{CameraViewParams, Version};

/// The engine library, opened at most once per process.
static LOADED: Mutex<Option<(PathBuf, Weak<Engine>)>> = const_mutex(None);

/// Shared library extension of the current platform.
pub fn library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// File name of the engine library for a major version.
pub fn library_file_name(version: u32) -> String {
    if cfg!(target_os = "windows") {
        format!("lpm-v{version}.dll")
    } else if cfg!(target_os = "macos") {
        format!("liblpm-v{version}.dylib")
    } else {
        format!("liblpm-v{version}.so")
    }
}

/// Architecture directory used by the SDK layout.
pub fn arch_dir() -> &'static str {
    if cfg!(target_pointer_width = "32") {
        "win32"
    } else if cfg!(target_os = "windows") {
        "x64"
    } else {
        "x86_64"
    }
}

/// `<sdk>/LPM/lib/<arch>/<engine library>`.
pub fn default_library_path(sdk_dir: &Path, version: u32) -> PathBuf {
    sdk_dir
        .join("LPM")
        .join("lib")
        .join(arch_dir())
        .join(library_file_name(version))
}

/// `<sdk>/modules-v<version>/<arch>`.
pub fn default_modules_dir(sdk_dir: &Path, version: u32) -> PathBuf {
    sdk_dir.join(format!("modules-v{version}")).join(arch_dir())
}

/// Shared libraries next to `engine_path` that must be opened before it.
///
/// Sorted by file name; the engine library itself is excluded.
pub fn support_libraries(engine_path: &Path) -> Result<Vec<PathBuf>> {
    let Some(dir) = engine_path.parent() else {
        return Ok(Vec::new());
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let engine_name = engine_path.file_name();

    let mut libraries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.file_name() == engine_name {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == library_extension()) {
            libraries.push(path);
        }
    }
    libraries.sort();
    Ok(libraries)
}

/// Resolves every engine entry point.
///
/// # Safety
/// `lib` must export the symbols with exactly the signatures declared in
/// `lpm_sys`.
unsafe fn resolve(lib: &Library) -> std::result::Result<LpmApi, libloading::Error> {
    macro_rules! symbol {
        ($ty:ty, $name:literal) => {
            // SAFETY: signature guaranteed by the caller.
            *unsafe { lib.get::<$ty>($name)? }
        };
    }

    Ok(LpmApi {
        init: symbol!(FnLpmInit, b"lpmInit"),
        free: symbol!(FnLpmFree, b"lpmFree"),
        version: symbol!(FnLpmVersion, b"lpmVersion"),
        compilation_date: symbol!(FnLpmCompilationDate, b"lpmCompilationDate"),
        load_view_config: symbol!(FnLpmLoadViewConfig, b"lpmLoadViewConfig"),
        write_view_config: symbol!(FnLpmWriteViewConfig, b"lpmWriteViewConfig"),
        load_module: symbol!(FnLpmLoadModule, b"lpmLoadModule"),
        free_module: symbol!(FnLpmFreeModule, b"lpmFreeModule"),
        run_det: symbol!(FnLpmRunDet, b"lpmRunDet"),
        free_det_result: symbol!(FnLpmFreeDetResult, b"lpmFreeDetResult"),
        run_ocr: symbol!(FnLpmRunOcr, b"lpmRunOcr"),
        free_ocr_result: symbol!(FnLpmFreeOcrResult, b"lpmFreeOcrResult"),
        get_num_avlb_modules: symbol!(FnLpmGetNumAvlbModules, b"lpmGetNumAvlbModules"),
        get_module_index: symbol!(FnLpmGetModuleIndex, b"lpmGetModuleIndex"),
        get_module_index_by_name: symbol!(FnLpmGetModuleIndexByName, b"lpmGetModuleIndexByName"),
        get_module_info: symbol!(FnLpmGetModuleInfo, b"lpmGetModuleInfo"),
        get_last_error: symbol!(FnLpmGetLastError, b"lpmGetLastError"),
        get_error_msg: symbol!(FnLpmGetErrorMsg, b"lpmGetErrorMsg"),
        open_error_log: symbol!(FnLpmOpenErrorLog, b"lpmOpenErrorLog"),
        close_error_log: symbol!(FnLpmCloseErrorLog, b"lpmCloseErrorLog"),
    })
}

fn open_library(path: &Path) -> Result<Library> {
    // SAFETY: running library initializers is inherent to loading the engine.
    unsafe { Library::new(path) }.map_err(|source| LpmError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// The loaded engine: its entry points plus the libraries keeping them valid.
pub struct Engine {
    api: LpmApi,
    path: Option<PathBuf>,
    // Declared before `support` so the engine closes first.
    library: Option<Library>,
    support: Vec<Library>,
}

impl Engine {
    /// Opens the engine library at `path` together with its support libraries.
    ///
    /// Loading the same library again while an `Engine` for it is alive
    /// returns that engine. Loading a different one is rejected until every
    /// handle to the first is dropped.
    ///
    /// # Safety
    /// The library at `path` must be an LPM engine whose exports match the
    /// declarations in `lpm_sys`; calling through mismatched signatures is
    /// undefined behaviour.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Arc<Engine>> {
        let path = path.as_ref();
        // A path that does not resolve is handed to the loader as is, which
        // reports it as a load failure.
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut loaded = LOADED.lock();
        if let Some((loaded_path, weak)) = loaded.as_ref() {
            if let Some(engine) = weak.upgrade() {
                if *loaded_path == canonical {
                    tracing::debug!(path = %canonical.display(), "engine already loaded");
                    return Ok(engine);
                }
                return Err(LpmError::AlreadyLoaded {
                    loaded: loaded_path.clone(),
                    requested: canonical,
                });
            }
        }

        let mut support = Vec::new();
        let support_paths = if canonical.is_file() {
            support_libraries(&canonical)?
        } else {
            Vec::new()
        };
        for lib_path in support_paths {
            tracing::debug!(path = %lib_path.display(), "opening support library");
            support.push(open_library(&lib_path)?);
        }

        let library = open_library(&canonical)?;
        // SAFETY: guaranteed by the caller.
        let api = unsafe { resolve(&library) }.map_err(|source| LpmError::Load {
            path: canonical.clone(),
            source,
        })?;

        let engine = Arc::new(Engine {
            api,
            path: Some(canonical.clone()),
            library: Some(library),
            support,
        });
        tracing::info!(
            path = %canonical.display(),
            support_libraries = engine.support.len(),
            version = %engine.version(),
            "engine loaded"
        );
        *loaded = Some((canonical, Arc::downgrade(&engine)));
        Ok(engine)
    }

    /// Wraps entry points that are already resolved, e.g. a statically linked
    /// engine. Such an engine is not tracked by the process-wide guard.
    pub fn from_api(api: LpmApi) -> Arc<Engine> {
        Arc::new(Engine {
            api,
            path: None,
            library: None,
            support: Vec::new(),
        })
    }

    /// The resolved entry points.
    pub fn api(&self) -> &LpmApi {
        &self.api
    }

    /// Path of the engine library, `None` for [`from_api`](Self::from_api) engines.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Engine version.
    pub fn version(&self) -> Version {
        // SAFETY: no arguments, no state.
        Version::from_raw(unsafe { (self.api.version)() })
    }

    /// Compilation date, `Mmm dd yyyy`.
    pub fn compilation_date(&self) -> String {
        // SAFETY: the engine returns a static string or null.
        unsafe { marshal::opt_c_str((self.api.compilation_date)()) }.unwrap_or_default()
    }

    /// Code of the last error raised by the engine.
    pub fn last_error(&self) -> i32 {
        // SAFETY: no arguments.
        unsafe { (self.api.get_last_error)() }
    }

    /// Engine's description of an error code.
    pub fn error_message(&self, code: i32) -> String {
        // SAFETY: the engine returns a static string or null for any code.
        let message = unsafe { (self.api.get_error_msg)(code) };
        if message.is_null() {
            return String::new();
        }
        // SAFETY: non-null messages are NUL-terminated.
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    }

    /// Starts writing the engine's own error log to `path`.
    pub fn open_error_log(&self, path: impl AsRef<Path>) -> Result<()> {
        let filename = marshal::path_to_c_string(path.as_ref())?;
        // SAFETY: `filename` outlives the call.
        let code = unsafe { (self.api.open_error_log)(filename.as_ptr()) };
        if code != 0 {
            return Err(LpmError::NativeCall {
                function: "lpmOpenErrorLog",
                code,
            });
        }
        Ok(())
    }

    /// Stops the engine's error log.
    pub fn close_error_log(&self) {
        // SAFETY: no arguments; closing a closed log is a no-op in the engine.
        unsafe { (self.api.close_error_log)() }
    }

    /// Reads camera view parameters from a file, or the engine defaults for `None`.
    pub fn load_view_config(&self, path: Option<&Path>) -> Result<CameraViewParams> {
        let filename = path.map(marshal::path_to_c_string).transpose()?;
        let mut raw = LpmCameraViewParams::default();
        let filename_ptr = filename.as_ref().map_or(std::ptr::null(), |f| f.as_ptr());
        // SAFETY: `filename` and `raw` outlive the call.
        let code = unsafe { (self.api.load_view_config)(filename_ptr, &mut raw) };
        if code != 0 {
            return Err(LpmError::NativeCall {
                function: "lpmLoadViewConfig",
                code,
            });
        }
        CameraViewParams::try_from(raw)
    }

    /// Writes camera view parameters to a file.
    pub fn write_view_config(&self, path: impl AsRef<Path>, params: &CameraViewParams) -> Result<()> {
        let filename = marshal::path_to_c_string(path.as_ref())?;
        // SAFETY: `filename` outlives the call; the params are passed by value.
        let code = unsafe { (self.api.write_view_config)(filename.as_ptr(), params.into()) };
        if code != 0 {
            return Err(LpmError::NativeCall {
                function: "lpmWriteViewConfig",
                code,
            });
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            tracing::debug!(path = %path.display(), "closing engine library");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("support_libraries", &self.support.len())
            .finish()
    }
}
