use std::path::Path;
use std::ptr;
use std::sync::Arc;

use lpm_sys::*;
use parking_lot::Mutex;

use crate::error::{LpmError, Result};
use crate::loader::Engine;
use crate::marshal;
use crate::native_image::Image;
use crate::types::*;

struct Inner {
    state: LPMState,
    /// Loaded module indices, in load order.
    loaded: Vec<i32>,
    closed: bool,
}

// SAFETY: the state handle is only used while the session mutex is held.
unsafe impl Send for Inner {}

/// Releases a native result when dropped, so it is freed even if copying it
/// panics.
struct NativeResult<T> {
    state: LPMState,
    ptr: *mut T,
    free: unsafe extern "C" fn(LPMState, *mut T),
}

impl<T> Drop for NativeResult<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from the paired run call on `state` and is freed once.
        unsafe { (self.free)(self.state, self.ptr) }
    }
}

/// An engine session (`LPMState`) and the modules loaded into it.
///
/// All engine calls of a session are serialized. Dropping the session
/// unloads its modules in load order and then frees the state.
pub struct Session {
    engine: Arc<Engine>,
    inner: Mutex<Inner>,
}

impl Session {
    /// Initializes the engine over a modules directory.
    pub fn init(engine: Arc<Engine>, directory: impl AsRef<Path>) -> Result<Session> {
        let directory = directory.as_ref();
        let c_directory = marshal::path_to_c_string(directory)?;
        let mut state: LPMState = ptr::null_mut();

        // SAFETY: `c_directory` and `state` outlive the call.
        let code = unsafe { (engine.api().init)(c_directory.as_ptr(), &mut state) };
        if code != 0 || state.is_null() {
            return Err(LpmError::Init { code });
        }

        tracing::info!(directory = %directory.display(), "session initialized");
        Ok(Session {
            engine,
            inner: Mutex::new(Inner {
                state,
                loaded: Vec::new(),
                closed: false,
            }),
        })
    }

    /// The engine this session runs on.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// True once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Unloads every loaded module, in load order, then frees the state.
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        let api = self.engine.api();
        let mut state = inner.state;
        for index in std::mem::take(&mut inner.loaded) {
            tracing::debug!(index, "unloading module");
            // SAFETY: `index` was loaded into this live state.
            unsafe { (api.free_module)(state, index) };
        }
        // SAFETY: the state is live and freed exactly once.
        unsafe { (api.free)(&mut state) };
        inner.state = ptr::null_mut();
        inner.closed = true;
        tracing::info!("session closed");
    }

    fn with_state<T>(&self, f: impl FnOnce(&LpmApi, LPMState, &mut Vec<i32>) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(LpmError::InvalidState("session is closed"));
        }
        let state = inner.state;
        f(self.engine.api(), state, &mut inner.loaded)
    }

    /// Number of modules installed in the modules directory.
    pub fn module_count(&self) -> Result<i32> {
        self.with_state(|api, state, _| {
            // SAFETY: live state.
            let count = unsafe { (api.get_num_avlb_modules)(state) };
            if count < 0 {
                return Err(LpmError::NativeCall {
                    function: "lpmGetNumAvlbModules",
                    code: count,
                });
            }
            Ok(count)
        })
    }

    /// Index of the module with the given id and version.
    pub fn module_index(&self, id: i32, version: i32, subversion: i32) -> Result<i32> {
        self.with_state(|api, state, _| {
            // SAFETY: live state.
            let index = unsafe { (api.get_module_index)(state, id, version, subversion) };
            if index == -1 {
                return Err(LpmError::NotFound {
                    function: "lpmGetModuleIndex",
                    code: index,
                });
            }
            Ok(index)
        })
    }

    /// Index of the module with the given name.
    pub fn module_index_by_name(&self, name: &str) -> Result<i32> {
        let c_name = marshal::to_c_string(name)?;
        self.with_state(|api, state, _| {
            // SAFETY: live state, `c_name` outlives the call.
            let index = unsafe { (api.get_module_index_by_name)(state, c_name.as_ptr()) };
            if index == -1 {
                return Err(LpmError::NotFound {
                    function: "lpmGetModuleIndexByName",
                    code: index,
                });
            }
            Ok(index)
        })
    }

    /// Description of the module at `index`.
    ///
    /// What the engine does for an index out of range is up to the engine;
    /// a null answer is reported as an error.
    pub fn module_info(&self, index: i32) -> Result<ModuleInfo> {
        self.with_state(|api, state, _| {
            // SAFETY: live state.
            let raw = unsafe { (api.get_module_info)(state, index) };
            // SAFETY: null or a structure owned by the state.
            match unsafe { raw.as_ref() } {
                // SAFETY: the license pointer is null or owned by the state.
                Some(info) => Ok(unsafe { marshal::copy_module_info(info) }),
                None => Err(LpmError::NativeCall {
                    function: "lpmGetModuleInfo",
                    // SAFETY: no arguments.
                    code: unsafe { (api.get_last_error)() },
                }),
            }
        })
    }

    /// Descriptions of every installed module.
    pub fn modules(&self) -> Result<Vec<ModuleInfo>> {
        (0..self.module_count()?).map(|i| self.module_info(i)).collect()
    }

    /// Indices of the loaded modules, in load order.
    pub fn loaded_modules(&self) -> Vec<i32> {
        self.inner.lock().loaded.clone()
    }

    /// Loads a module. `None` lets the engine use its defaults and config files.
    pub fn load_module(
        &self,
        index: i32,
        view: Option<&CameraViewParams>,
        config: Option<&ModuleConfig>,
    ) -> Result<()> {
        let native_config = config.map(ModuleConfig::to_native).transpose()?;
        let mut native_view = view.map(LpmCameraViewParams::from);

        self.with_state(|api, state, loaded| {
            if loaded.contains(&index) {
                return Err(LpmError::ModuleAlreadyLoaded(index));
            }
            let view_ptr = native_view
                .as_mut()
                .map_or(ptr::null_mut(), |v| v as *mut LpmCameraViewParams);
            let config_ptr = native_config
                .as_ref()
                .map_or(ptr::null(), |c| c.as_ptr());

            // SAFETY: live state; both structures outlive the call.
            let code = unsafe { (api.load_module)(state, index, view_ptr, config_ptr) };
            if code != 0 {
                return Err(LpmError::ModuleLoad { index, code });
            }
            loaded.push(index);
            tracing::debug!(index, "module loaded");
            Ok(())
        })
    }

    /// Unloads a module. Unloading a module that is not loaded does nothing.
    pub fn unload_module(&self, index: i32) -> Result<()> {
        self.with_state(|api, state, loaded| {
            let Some(pos) = loaded.iter().position(|&i| i == index) else {
                return Ok(());
            };
            // SAFETY: live state, the module is loaded.
            unsafe { (api.free_module)(state, index) };
            loaded.remove(pos);
            tracing::debug!(index, "module unloaded");
            Ok(())
        })
    }

    /// Runs detection on `image`.
    ///
    /// Without a bounding box, or with an all-zero one, the whole image is
    /// searched.
    pub fn run_detection(
        &self,
        index: i32,
        image: &Image,
        bounding_box: Option<&BoundingBox>,
    ) -> Result<DetectionResult> {
        let area = search_area(image, bounding_box);

        self.with_state(|api, state, _| {
            // SAFETY: live state; `image` and `area` outlive the call.
            let raw = unsafe { (api.run_det)(state, index, image.as_raw(), &area) };
            if raw.is_null() {
                return Err(LpmError::Run {
                    function: "lpmRunDet",
                    // SAFETY: no arguments.
                    code: unsafe { (api.get_last_error)() },
                });
            }
            let native = NativeResult {
                state,
                ptr: raw,
                free: api.free_det_result,
            };
            // SAFETY: the result is live until `native` drops.
            let result = unsafe { marshal::copy_det_result(&*native.ptr) };
            drop(native);

            tracing::debug!(index, detections = result.detections.len(), "detection done");
            Ok(result)
        })
    }

    /// Runs OCR on the area of `image` given by `bounding_box`.
    ///
    /// Without a bounding box, or with an all-zero one, the whole image is
    /// read.
    pub fn run_ocr(
        &self,
        index: i32,
        image: &Image,
        bounding_box: Option<&BoundingBox>,
        label: DetectionLabel,
    ) -> Result<OcrResult> {
        let area = search_area(image, bounding_box);

        self.with_state(|api, state, _| {
            // SAFETY: live state; `image` and `area` outlive the call.
            let raw = unsafe { (api.run_ocr)(state, index, image.as_raw(), &area, label.to_raw()) };
            if raw.is_null() {
                return Err(LpmError::Run {
                    function: "lpmRunOcr",
                    // SAFETY: no arguments.
                    code: unsafe { (api.get_last_error)() },
                });
            }
            let native = NativeResult {
                state,
                ptr: raw,
                free: api.free_ocr_result,
            };
            // SAFETY: the result is live until `native` drops.
            let result = unsafe { marshal::copy_ocr_result(&*native.ptr) };
            drop(native);

            tracing::debug!(index, hypotheses = result.hypotheses.len(), "ocr done");
            Ok(result)
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("loaded", &inner.loaded)
            .field("closed", &inner.closed)
            .finish()
    }
}

fn search_area(image: &Image, bounding_box: Option<&BoundingBox>) -> LpmBoundingBox {
    match bounding_box {
        Some(bbox) if !bbox.is_empty() => bbox.into(),
        _ => (&image.full_box()).into(),
    }
}
