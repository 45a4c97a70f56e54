#![allow(non_snake_case)]

//! Stand-in for the LPM engine library.
//!
//! Exports the engine's C entry points with deterministic behaviour, so the
//! binding can be driven without the proprietary build. Built as a `cdylib`
//! it can be loaded like the real engine; as an `rlib` its table is handed
//! to the binding directly through [`api`].
//!
//! Every state records the calls made on it in a [`Journal`], looked up by
//! the directory the state was initialized with.

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::Write;
use std::os::raw::{c_char, c_double, c_int, c_uint, c_ulong};
use std::ptr;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, LazyLock};

use lpm_sys::*;
use parking_lot::{Mutex, const_mutex};
use serde::{Deserialize, Serialize};

/// Version reported by `lpmVersion`, 7.6.
pub const ENGINE_VERSION: c_ulong = 0x0706;
pub const COMPILATION_DATE: &CStr = c"Mar 14 2025";

pub const LPM_OK: c_int = 0;
pub const ERR_INVALID_ARGUMENT: c_int = 1;
pub const ERR_DIRECTORY: c_int = 2;
pub const ERR_MODULE_INDEX: c_int = 3;
pub const ERR_NOT_LOADED: c_int = 4;
pub const ERR_FILE: c_int = 5;
pub const ERR_DISABLED: c_int = 6;

/// Directories containing this marker fail to initialize with `ERR_DIRECTORY`.
pub const MISSING_DIRECTORY_MARKER: &str = "missing";

/// Camera view returned by `lpmLoadViewConfig` without a file.
pub const DEFAULT_VIEW: LpmCameraViewParams = LpmCameraViewParams {
    view_type: LPM_VIEW_GENERIC,
    min_horizontal_resolution: 90,
    max_horizontal_resolution: 500,
    density_ratio: 1.0,
};

/// Lines of the best OCR hypothesis.
pub const PLATE_LINES: [&str; 2] = ["1AB 2345", "PRAHA Ř🚚"];
/// Line of the second OCR hypothesis.
pub const ALTERNATIVE_LINE: &str = "IAB 2345";
pub const BEST_CONFIDENCE: f64 = 0.93;
pub const ALTERNATIVE_CONFIDENCE: f64 = 0.41;
/// Appended to the first line when OCR runs with the trash label.
pub const INVALID_SCALAR: c_int = 0xD800;

pub const DETECTION_CONFIDENCE: f64 = 0.9;
pub const CLUSTER_ID: c_int = 1;
pub const CLUSTER_CONFIDENCE: f64 = 0.75;
pub const UNREADABLE: f64 = 0.1;
pub const OBSTRUCTED: f64 = 0.05;

/// An installed module of the stand-in engine.
#[derive(Debug)]
pub struct MockModule {
    pub name: &'static str,
    pub id: c_int,
    pub version: c_int,
    pub subversion: c_int,
    pub det_type: &'static str,
    pub countries: &'static str,
    pub prop: LpmPropertyFlags,
    /// Reports license information.
    pub licensed: bool,
    /// Attaches extension blocks to its results.
    pub extensions: bool,
}

/// Modules every state exposes, at their index.
pub static MODULES: [MockModule; 3] = [
    MockModule {
        name: "LPM_EU_GENERIC",
        id: 800,
        version: 0,
        subversion: 0,
        det_type: "generic",
        countries: "CZ,SK,DE,AT,PL",
        prop: LPM_DET_GENERIC | LPM_OBJ_LP | LPM_OCR_EU,
        licensed: true,
        extensions: true,
    },
    MockModule {
        name: "LPM_EU_FRONTAL",
        id: 801,
        version: 1,
        subversion: 2,
        det_type: "frontal",
        countries: "CZ,SK",
        prop: LPM_DET_FRONTAL | LPM_OBJ_LP | LPM_OCR_CZ,
        licensed: false,
        extensions: true,
    },
    MockModule {
        name: "LPM_LEGACY",
        id: 900,
        version: 3,
        subversion: 1,
        det_type: "generic",
        countries: "CZ",
        prop: LPM_DET_GENERIC | LPM_OBJ_LP | LPM_OCR_CZ,
        licensed: true,
        extensions: false,
    },
];

impl MockModule {
    fn info(&self, directory: &str) -> LpmModuleInfo {
        let license = self.licensed.then(|| {
            Box::into_raw(Box::new(LpmLicenseInfo {
                is_valid: 1,
                expiration_date: LpmDateTime::default(),
                is_using_counter: 1,
                executions_left: 1000,
            }))
        });

        let mut info = LpmModuleInfo {
            name: [0; LPM_MAX_STR_LEN],
            id: self.id,
            date: [0; LPM_MAX_STR_LEN],
            path: [0; LPM_MAX_PATH_LEN],
            version: self.version,
            subversion: self.subversion,
            det_type: [0; LPM_MAX_STR_LEN],
            obj_type: [0; LPM_MAX_STR_LEN],
            rcg_type: [0; LPM_MAX_STR_LEN],
            input_img_type: [0; LPM_MAX_STR_LEN],
            pxl_aspect_ratio: 1.0,
            lp_countries: [0; LPM_MAX_STR_LEN],
            lp_min_mean_max_width: [60, 120, 300],
            lp_min_mean_max_height: [12, 25, 60],
            lp_min_mean_max_rotation: [-20.0, 0.0, 20.0],
            is_active: 1,
            prop: self.prop,
            license_info: license.unwrap_or(ptr::null_mut()),
        };
        fill(&mut info.name, self.name);
        fill(&mut info.date, "2025-03-14");
        fill(&mut info.path, &format!("{directory}/{}", self.name));
        fill(&mut info.det_type, self.det_type);
        fill(&mut info.obj_type, "license plates");
        fill(&mut info.rcg_type, "ceu3");
        fill(&mut info.input_img_type, "ERImage");
        fill(&mut info.lp_countries, self.countries);
        info
    }
}

fn fill<const N: usize>(dst: &mut [c_char; N], src: &str) {
    for (d, s) in dst.iter_mut().zip(src.bytes().take(N - 1)) {
        *d = s as c_char;
    }
}

/// Module configuration as the engine received it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleSettings {
    pub compute_on_gpu: bool,
    pub gpu_device_id: c_int,
    /// The extension block was present.
    pub extended: bool,
    pub lpm_config_filename: Option<String>,
    pub ocr_num_threads: c_int,
    pub disable_ocr: bool,
    pub det_config_filename: Option<String>,
    pub det_num_threads: c_int,
    pub disable_det: bool,
}

impl ModuleSettings {
    unsafe fn read(raw: &LpmModuleConfig) -> Self {
        let mut settings = Self {
            compute_on_gpu: raw.compute_on_gpu != 0,
            gpu_device_id: raw.gpu_device_id,
            ..Self::default()
        };
        // SAFETY: the caller passes a null or valid extension.
        if let Some(ext) = unsafe { raw.extras.as_ref() } {
            settings.extended = true;
            // SAFETY: filenames are null or NUL-terminated.
            unsafe {
                settings.lpm_config_filename = c_string(ext.lpm_config_filename);
                settings.det_config_filename = c_string(ext.det_config_filename);
            }
            settings.ocr_num_threads = ext.ocr_num_threads;
            settings.disable_ocr = ext.disable_ocr != 0;
            settings.det_num_threads = ext.det_num_threads;
            settings.disable_det = ext.disable_det != 0;
        }
        settings
    }
}

unsafe fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointers are NUL-terminated.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// A call made on a state.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    LoadModule {
        index: c_int,
        view: Option<LpmCameraViewParams>,
        config: Option<ModuleSettings>,
    },
    FreeModule(c_int),
    RunDet {
        index: c_int,
        area: LpmBoundingBox,
    },
    FreeDetResult,
    RunOcr {
        index: c_int,
        area: LpmBoundingBox,
        label: LpmDetectionLabel,
    },
    FreeOcrResult,
    /// The state was freed with these modules still loaded, in load order.
    Free { loaded: Vec<c_int> },
}

/// Calls made on one state, and the results it has not got back yet.
#[derive(Debug, Default)]
pub struct Journal {
    calls: Mutex<Vec<Call>>,
    live_results: AtomicIsize,
}

impl Journal {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Results handed out minus results freed.
    pub fn live_results(&self) -> isize {
        self.live_results.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

static JOURNALS: LazyLock<Mutex<HashMap<String, Arc<Journal>>>> = LazyLock::new(Default::default);

/// Journal of the latest state initialized over `directory`.
pub fn journal(directory: &str) -> Option<Arc<Journal>> {
    JOURNALS.lock().get(directory).cloned()
}

struct EngineState {
    journal: Arc<Journal>,
    modules: Vec<*mut LpmModuleInfo>,
    loaded: Mutex<Vec<(c_int, ModuleSettings)>>,
}

impl EngineState {
    fn loaded_module(
        &self,
        index: c_int,
        disabled: impl Fn(&ModuleSettings) -> bool,
    ) -> Result<&'static MockModule, c_int> {
        let Some(module) = usize::try_from(index).ok().and_then(|i| MODULES.get(i)) else {
            return Err(ERR_MODULE_INDEX);
        };
        match self.loaded.lock().iter().find(|(i, _)| *i == index) {
            None => Err(ERR_NOT_LOADED),
            Some((_, settings)) if disabled(settings) => Err(ERR_DISABLED),
            Some(_) => Ok(module),
        }
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        for info in self.modules.drain(..) {
            // SAFETY: produced by `Box::into_raw` in `lpmInit`, released once.
            let info = unsafe { Box::from_raw(info) };
            if !info.license_info.is_null() {
                // SAFETY: produced by `Box::into_raw` in `MockModule::info`.
                drop(unsafe { Box::from_raw(info.license_info) });
            }
        }
    }
}

unsafe fn engine<'a>(state: LPMState) -> Option<&'a EngineState> {
    // SAFETY: states are null or produced by `lpmInit`.
    unsafe { state.cast::<EngineState>().as_ref() }
}

thread_local! {
    static LAST_ERROR: Cell<c_int> = const { Cell::new(LPM_OK) };
}

static ERROR_LOG: Mutex<Option<File>> = const_mutex(None);

fn fail(code: c_int) -> c_int {
    LAST_ERROR.with(|last| last.set(code));
    if let Some(log) = ERROR_LOG.lock().as_mut() {
        let _ = writeln!(log, "error {code}: {}", message(code).to_string_lossy());
    }
    code
}

fn message(code: c_int) -> &'static CStr {
    match code {
        LPM_OK => c"no error",
        ERR_INVALID_ARGUMENT => c"invalid argument",
        ERR_DIRECTORY => c"module directory not found",
        ERR_MODULE_INDEX => c"module index out of range",
        ERR_NOT_LOADED => c"module is not loaded",
        ERR_FILE => c"cannot read or write file",
        ERR_DISABLED => c"submodule is disabled",
        _ => c"unknown error",
    }
}

fn into_raw_array<T>(items: Vec<T>) -> *mut T {
    if items.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(items.into_boxed_slice()).cast()
}

unsafe fn take_array<T>(items: *mut T, len: usize) -> Vec<T> {
    if items.is_null() {
        return Vec::new();
    }
    // SAFETY: produced by `into_raw_array` with `len` items.
    unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(items, len)) }.into_vec()
}

/// Overwrites memory about to be released, so reads after a free show garbage.
fn poison<T: Copy>(items: &mut [T], value: T) {
    for item in items {
        // SAFETY: `item` is a valid exclusive reference.
        unsafe { ptr::write_volatile(item, value) };
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewConfigFile {
    view_type: c_int,
    min_horizontal_resolution: c_uint,
    max_horizontal_resolution: c_uint,
    density_ratio: f32,
}

impl From<LpmCameraViewParams> for ViewConfigFile {
    fn from(params: LpmCameraViewParams) -> Self {
        Self {
            view_type: params.view_type,
            min_horizontal_resolution: params.min_horizontal_resolution,
            max_horizontal_resolution: params.max_horizontal_resolution,
            density_ratio: params.density_ratio,
        }
    }
}

impl From<ViewConfigFile> for LpmCameraViewParams {
    fn from(file: ViewConfigFile) -> Self {
        Self {
            view_type: file.view_type,
            min_horizontal_resolution: file.min_horizontal_resolution,
            max_horizontal_resolution: file.max_horizontal_resolution,
            density_ratio: file.density_ratio,
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmInit(directory: *const c_char, state: *mut LPMState) -> c_int {
    if state.is_null() {
        return fail(ERR_INVALID_ARGUMENT);
    }
    // SAFETY: null or NUL-terminated per the engine contract.
    let Some(directory) = (unsafe { c_string(directory) }) else {
        return fail(ERR_INVALID_ARGUMENT);
    };
    if directory.contains(MISSING_DIRECTORY_MARKER) {
        return fail(ERR_DIRECTORY);
    }

    let journal = Arc::new(Journal::default());
    JOURNALS.lock().insert(directory.clone(), journal.clone());
    let modules = MODULES
        .iter()
        .map(|module| Box::into_raw(Box::new(module.info(&directory))))
        .collect();
    let engine = Box::new(EngineState {
        journal,
        modules,
        loaded: Mutex::new(Vec::new()),
    });

    // SAFETY: checked for null above.
    unsafe { *state = Box::into_raw(engine).cast() };
    LPM_OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmFree(state: *mut LPMState) {
    if state.is_null() {
        return;
    }
    // SAFETY: checked for null above.
    let raw = unsafe { *state };
    if raw.is_null() {
        return;
    }
    // SAFETY: produced by `lpmInit` and nulled below, so released once.
    let engine = unsafe { Box::from_raw(raw.cast::<EngineState>()) };
    let loaded = engine.loaded.lock().iter().map(|(index, _)| *index).collect();
    engine.journal.record(Call::Free { loaded });
    // SAFETY: checked for null above.
    unsafe { *state = ptr::null_mut() };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmVersion() -> c_ulong {
    ENGINE_VERSION
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmCompilationDate() -> *const c_char {
    COMPILATION_DATE.as_ptr()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmLoadViewConfig(
    filename: *const c_char,
    params: *mut LpmCameraViewParams,
) -> c_int {
    // SAFETY: null or valid per the engine contract.
    let Some(out) = (unsafe { params.as_mut() }) else {
        return fail(ERR_INVALID_ARGUMENT);
    };
    // SAFETY: null or NUL-terminated.
    let Some(path) = (unsafe { c_string(filename) }) else {
        *out = DEFAULT_VIEW;
        return LPM_OK;
    };
    let Ok(text) = std::fs::read_to_string(&path) else {
        return fail(ERR_FILE);
    };
    match toml::from_str::<ViewConfigFile>(&text) {
        Ok(file) => {
            *out = file.into();
            LPM_OK
        }
        Err(_) => fail(ERR_FILE),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmWriteViewConfig(
    filename: *const c_char,
    params: LpmCameraViewParams,
) -> c_int {
    // SAFETY: null or NUL-terminated.
    let Some(path) = (unsafe { c_string(filename) }) else {
        return fail(ERR_INVALID_ARGUMENT);
    };
    let Ok(text) = toml::to_string(&ViewConfigFile::from(params)) else {
        return fail(ERR_FILE);
    };
    if std::fs::write(path, text).is_err() {
        return fail(ERR_FILE);
    }
    LPM_OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmLoadModule(
    state: LPMState,
    index: c_int,
    view: *mut LpmCameraViewParams,
    config: *const LpmModuleConfig,
) -> c_int {
    // SAFETY: null or produced by `lpmInit`.
    let Some(engine) = (unsafe { engine(state) }) else {
        return fail(ERR_INVALID_ARGUMENT);
    };
    if usize::try_from(index).map_or(true, |i| i >= engine.modules.len()) {
        return fail(ERR_MODULE_INDEX);
    }

    // SAFETY: both are null or valid for the duration of the call.
    let (view, settings) = unsafe {
        (
            view.as_ref().copied(),
            config.as_ref().map(|c| ModuleSettings::read(c)),
        )
    };
    engine.journal.record(Call::LoadModule {
        index,
        view,
        config: settings.clone(),
    });

    let mut loaded = engine.loaded.lock();
    loaded.retain(|(i, _)| *i != index);
    loaded.push((index, settings.unwrap_or_default()));
    LPM_OK
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmFreeModule(state: LPMState, index: c_int) {
    // SAFETY: null or produced by `lpmInit`.
    let Some(engine) = (unsafe { engine(state) }) else {
        return;
    };
    engine.journal.record(Call::FreeModule(index));
    engine.loaded.lock().retain(|(i, _)| *i != index);
}

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy)]
struct Region {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

/// Bounding rectangle of the non-zero pixels of `image` inside `area`.
unsafe fn bright_region(image: &ERImage, area: &LpmBoundingBox) -> Option<Region> {
    if image.data.is_null() || image.width == 0 || image.height == 0 {
        return None;
    }
    let left = area.top_left_col.min(area.bot_left_col).max(0.0) as u32;
    let top = area.top_left_row.min(area.top_right_row).max(0.0) as u32;
    let right = (area.top_right_col.max(area.bot_right_col) as u32).min(image.width - 1);
    let bottom = (area.bot_left_row.max(area.bot_right_row) as u32).min(image.height - 1);
    let channels = image.num_channels.max(1) as usize;

    let mut found: Option<Region> = None;
    for y in top..=bottom {
        // SAFETY: `y` is below the image height.
        let row = unsafe { image.data.add(y as usize * image.step as usize) };
        for x in left..=right {
            // SAFETY: `x` is below the image width.
            let pixel = unsafe { std::slice::from_raw_parts(row.add(x as usize * channels), channels) };
            if pixel.iter().all(|&v| v == 0) {
                continue;
            }
            found = Some(match found {
                None => Region {
                    left: x,
                    top: y,
                    right: x,
                    bottom: y,
                },
                Some(r) => Region {
                    left: r.left.min(x),
                    top: r.top.min(y),
                    right: r.right.max(x),
                    bottom: r.bottom.max(y),
                },
            });
        }
    }
    found
}

unsafe fn crop(image: &ERImage, region: Region) -> ERImage {
    let channels = image.num_channels.max(1) as usize;
    let width = (region.right - region.left + 1) as usize;
    let height = (region.bottom - region.top + 1) as usize;
    let step = width * channels;

    let mut data = Vec::with_capacity(step * height);
    for y in region.top..=region.bottom {
        let start = y as usize * image.step as usize + region.left as usize * channels;
        // SAFETY: the region lies inside the image.
        data.extend_from_slice(unsafe { std::slice::from_raw_parts(image.data.add(start), step) });
    }

    ERImage {
        color_model: image.color_model,
        data_type: image.data_type,
        size: data.len() as c_uint,
        width: width as c_uint,
        height: height as c_uint,
        step: step as c_uint,
        depth: 8,
        num_channels: channels as c_uint,
        data_allocated: 1,
        data: into_raw_array(data),
        row_data: ptr::null_mut(),
    }
}

unsafe fn detection(image: &ERImage, region: Region) -> LpmDetection {
    let (left, top) = (region.left as f32, region.top as f32);
    let (right, bottom) = (region.right as f32, region.bottom as f32);
    LpmDetection {
        confidence: DETECTION_CONFIDENCE,
        position: LpmBoundingBox {
            top_left_col: left,
            top_left_row: top,
            top_right_col: right,
            top_right_row: top,
            bot_left_col: left,
            bot_left_row: bottom,
            bot_right_col: right,
            bot_right_row: bottom,
        },
        label: LPM_LABEL_LP_EU_ONE_LINE,
        // SAFETY: the region was found inside the image.
        image: unsafe { crop(image, region) },
        affine_mapping: [1.0, 0.0, 0.0, 1.0, left as f64, top as f64],
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmRunDet(
    state: LPMState,
    index: c_int,
    image: ERImage,
    bbox: *const LpmBoundingBox,
) -> *mut LpmDetResult {
    // SAFETY: null or produced by `lpmInit`.
    let Some(engine) = (unsafe { engine(state) }) else {
        fail(ERR_INVALID_ARGUMENT);
        return ptr::null_mut();
    };
    // SAFETY: null or valid for the duration of the call.
    let area = unsafe { bbox.as_ref() }.copied().unwrap_or_default();
    engine.journal.record(Call::RunDet { index, area });

    let module = match engine.loaded_module(index, |s| s.disable_det) {
        Ok(module) => module,
        Err(code) => {
            fail(code);
            return ptr::null_mut();
        }
    };

    // SAFETY: the image is valid for the duration of the call.
    let detections: Vec<LpmDetection> = unsafe { bright_region(&image, &area) }
        .map(|region| unsafe { detection(&image, region) })
        .into_iter()
        .collect();
    let count = detections.len();

    let extras = if module.extensions {
        let extension: Vec<LpmDetection_extension1> = (0..count)
            .map(|_| LpmDetection_extension1 {
                occlusion: 0.0,
                truncated: 0,
                cluster_id: CLUSTER_ID,
                cluster_confidence: CLUSTER_CONFIDENCE,
                extras: ptr::null_mut(),
            })
            .collect();
        Box::into_raw(Box::new(LpmDetResult_extension1 {
            detections: into_raw_array(extension),
            extras: ptr::null_mut(),
        }))
    } else {
        ptr::null_mut()
    };

    engine.journal.live_results.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(LpmDetResult {
        lpm_id: module.id,
        lpm_idx: index,
        num_detections: count as c_int,
        detections: into_raw_array(detections),
        extras,
    }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmFreeDetResult(state: LPMState, result: *mut LpmDetResult) {
    if result.is_null() {
        return;
    }
    // SAFETY: produced by `lpmRunDet`, released once.
    let result = unsafe { Box::from_raw(result) };
    let count = result.num_detections.max(0) as usize;

    // SAFETY: every array below was produced by `into_raw_array` with these lengths.
    unsafe {
        let mut detections = take_array(result.detections, count);
        for det in &mut detections {
            let mut pixels = take_array(det.image.data, det.image.size as usize);
            poison(&mut pixels, 0xA5);
        }
        poison(&mut detections, LpmDetection {
            confidence: -1.0,
            position: LpmBoundingBox::default(),
            label: -1,
            image: ERImage::empty(),
            affine_mapping: [0.0; 6],
        });
        if !result.extras.is_null() {
            let extension = Box::from_raw(result.extras);
            take_array(extension.detections, count);
        }
    }

    // SAFETY: null or produced by `lpmInit`.
    if let Some(engine) = unsafe { engine(state) } {
        engine.journal.live_results.fetch_sub(1, Ordering::SeqCst);
        engine.journal.record(Call::FreeDetResult);
    }
}

fn text_line(text: &str, confidence: c_double, tail: Option<c_int>) -> LpmTextLine {
    let mut characters: Vec<c_int> = text.chars().map(|c| c as c_int).collect();
    characters.extend(tail);
    let confidences: Vec<c_double> = (0..characters.len())
        .map(|i| 0.99 - 0.01 * i as c_double)
        .collect();
    LpmTextLine {
        line_confidence: confidence,
        length: characters.len() as c_uint,
        characters: into_raw_array(characters),
        characters_confidences: into_raw_array(confidences),
    }
}

fn hypothesis(
    module: &MockModule,
    confidence: c_double,
    lines: &[&str],
    plate_type: &CStr,
    tail: Option<c_int>,
) -> LpmOcrHypothesis {
    let text_lines: Vec<LpmTextLine> = lines
        .iter()
        .enumerate()
        .map(|(n, line)| text_line(line, confidence, if n == 0 { tail } else { None }))
        .collect();
    let extras = if module.extensions {
        Box::into_raw(Box::new(LpmOcrHypothesis_extension1 {
            unreadable: UNREADABLE,
            obstructed: OBSTRUCTED,
            extras: ptr::null_mut(),
        }))
    } else {
        ptr::null_mut()
    };
    LpmOcrHypothesis {
        confidence,
        num_lines: text_lines.len() as c_uint,
        text_lines: into_raw_array(text_lines),
        plate_type: CString::from(plate_type).into_raw(),
        plate_type_confidence: 0.8,
        lp_dimensions: LpmLpDimensions {
            physical_width: 520,
            physical_height: 110,
        },
        lp_dimensions_confidence: 0.7,
        extras,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmRunOcr(
    state: LPMState,
    index: c_int,
    image: ERImage,
    bbox: *const LpmBoundingBox,
    label: LpmDetectionLabel,
) -> *mut LpmOcrResult {
    // SAFETY: null or produced by `lpmInit`.
    let Some(engine) = (unsafe { engine(state) }) else {
        fail(ERR_INVALID_ARGUMENT);
        return ptr::null_mut();
    };
    // SAFETY: null or valid for the duration of the call.
    let area = unsafe { bbox.as_ref() }.copied().unwrap_or_default();
    engine.journal.record(Call::RunOcr { index, area, label });

    let module = match engine.loaded_module(index, |s| s.disable_ocr) {
        Ok(module) => module,
        Err(code) => {
            fail(code);
            return ptr::null_mut();
        }
    };
    if image.data.is_null() {
        fail(ERR_INVALID_ARGUMENT);
        return ptr::null_mut();
    }

    let tail = (label == LPM_LABEL_TRASH).then_some(INVALID_SCALAR);
    let hypotheses = vec![
        hypothesis(module, BEST_CONFIDENCE, &PLATE_LINES, c"CZ", tail),
        hypothesis(module, ALTERNATIVE_CONFIDENCE, &[ALTERNATIVE_LINE], c"SK", None),
    ];

    engine.journal.live_results.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(LpmOcrResult {
        lpm_id: module.id,
        lpm_idx: index,
        num_hypotheses: hypotheses.len() as c_uint,
        hypotheses: into_raw_array(hypotheses),
    }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmFreeOcrResult(state: LPMState, result: *mut LpmOcrResult) {
    if result.is_null() {
        return;
    }
    // SAFETY: produced by `lpmRunOcr`, released once.
    let result = unsafe { Box::from_raw(result) };

    // SAFETY: every pointer below was produced by `lpmRunOcr` with these lengths.
    unsafe {
        for hyp in take_array(result.hypotheses, result.num_hypotheses as usize) {
            for line in take_array(hyp.text_lines, hyp.num_lines as usize) {
                let len = line.length as usize;
                let mut characters = take_array(line.characters, len);
                poison(&mut characters, 'X' as c_int);
                take_array(line.characters_confidences, len);
            }
            if !hyp.plate_type.is_null() {
                drop(CString::from_raw(hyp.plate_type));
            }
            if !hyp.extras.is_null() {
                drop(Box::from_raw(hyp.extras));
            }
        }
    }

    // SAFETY: null or produced by `lpmInit`.
    if let Some(engine) = unsafe { engine(state) } {
        engine.journal.live_results.fetch_sub(1, Ordering::SeqCst);
        engine.journal.record(Call::FreeOcrResult);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetNumAvlbModules(state: LPMState) -> c_int {
    // SAFETY: null or produced by `lpmInit`.
    match unsafe { engine(state) } {
        Some(engine) => engine.modules.len() as c_int,
        None => {
            fail(ERR_INVALID_ARGUMENT);
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetModuleIndex(
    state: LPMState,
    id: c_int,
    version: c_int,
    subversion: c_int,
) -> c_int {
    // SAFETY: null or produced by `lpmInit`.
    if unsafe { engine(state) }.is_none() {
        fail(ERR_INVALID_ARGUMENT);
        return -1;
    }
    match MODULES
        .iter()
        .position(|m| m.id == id && m.version == version && m.subversion == subversion)
    {
        Some(index) => index as c_int,
        None => {
            fail(ERR_MODULE_INDEX);
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetModuleIndexByName(state: LPMState, name: *const c_char) -> c_int {
    // SAFETY: null or produced by `lpmInit`; the name is null or NUL-terminated.
    let (engine, name) = unsafe { (engine(state), c_string(name)) };
    let (Some(_), Some(name)) = (engine, name) else {
        fail(ERR_INVALID_ARGUMENT);
        return -1;
    };
    match MODULES.iter().position(|m| m.name == name) {
        Some(index) => index as c_int,
        None => {
            fail(ERR_MODULE_INDEX);
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetModuleInfo(state: LPMState, index: c_int) -> *mut LpmModuleInfo {
    // SAFETY: null or produced by `lpmInit`.
    let Some(engine) = (unsafe { engine(state) }) else {
        fail(ERR_INVALID_ARGUMENT);
        return ptr::null_mut();
    };
    match usize::try_from(index).ok().and_then(|i| engine.modules.get(i)) {
        Some(info) => *info,
        None => {
            fail(ERR_MODULE_INDEX);
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetLastError() -> c_int {
    LAST_ERROR.with(Cell::get)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmGetErrorMsg(code: c_int) -> *const c_char {
    message(code).as_ptr()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmOpenErrorLog(filename: *const c_char) -> c_int {
    // SAFETY: null or NUL-terminated.
    let Some(path) = (unsafe { c_string(filename) }) else {
        return fail(ERR_INVALID_ARGUMENT);
    };
    match File::create(path) {
        Ok(file) => {
            *ERROR_LOG.lock() = Some(file);
            LPM_OK
        }
        Err(_) => fail(ERR_FILE),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn lpmCloseErrorLog() {
    ERROR_LOG.lock().take();
}

/// Entry point table of this engine.
pub fn api() -> LpmApi {
    LpmApi {
        init: lpmInit,
        free: lpmFree,
        version: lpmVersion,
        compilation_date: lpmCompilationDate,
        load_view_config: lpmLoadViewConfig,
        write_view_config: lpmWriteViewConfig,
        load_module: lpmLoadModule,
        free_module: lpmFreeModule,
        run_det: lpmRunDet,
        free_det_result: lpmFreeDetResult,
        run_ocr: lpmRunOcr,
        free_ocr_result: lpmFreeOcrResult,
        get_num_avlb_modules: lpmGetNumAvlbModules,
        get_module_index: lpmGetModuleIndex,
        get_module_index_by_name: lpmGetModuleIndexByName,
        get_module_info: lpmGetModuleInfo,
        get_last_error: lpmGetLastError,
        get_error_msg: lpmGetErrorMsg,
        open_error_log: lpmOpenErrorLog,
        close_error_log: lpmCloseErrorLog,
    }
}
