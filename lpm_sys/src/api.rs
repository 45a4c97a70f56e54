use std::os::raw::{c_char, c_int, c_ulong};

use crate::er_image::ERImage;
use crate::types::*;

pub type FnLpmInit = unsafe extern "C" fn(*const c_char, *mut LPMState) -> c_int;
pub type FnLpmFree = unsafe extern "C" fn(*mut LPMState);
pub type FnLpmVersion = unsafe extern "C" fn() -> c_ulong;
pub type FnLpmCompilationDate = unsafe extern "C" fn() -> *const c_char;
pub type FnLpmLoadViewConfig = unsafe extern "C" fn(*const c_char, *mut LpmCameraViewParams) -> c_int;
pub type FnLpmWriteViewConfig = unsafe extern "C" fn(*const c_char, LpmCameraViewParams) -> c_int;
pub type FnLpmLoadModule =
    unsafe extern "C" fn(LPMState, c_int, *mut LpmCameraViewParams, *const LpmModuleConfig) -> c_int;
pub type FnLpmFreeModule = unsafe extern "C" fn(LPMState, c_int);
pub type FnLpmRunDet =
    unsafe extern "C" fn(LPMState, c_int, ERImage, *const LpmBoundingBox) -> *mut LpmDetResult;
pub type FnLpmFreeDetResult = unsafe extern "C" fn(LPMState, *mut LpmDetResult);
pub type FnLpmRunOcr = unsafe extern "C" fn(
    LPMState,
    c_int,
    ERImage,
    *const LpmBoundingBox,
    LpmDetectionLabel,
) -> *mut LpmOcrResult;
pub type FnLpmFreeOcrResult = unsafe extern "C" fn(LPMState, *mut LpmOcrResult);
pub type FnLpmGetNumAvlbModules = unsafe extern "C" fn(LPMState) -> c_int;
pub type FnLpmGetModuleIndex = unsafe extern "C" fn(LPMState, c_int, c_int, c_int) -> c_int;
pub type FnLpmGetModuleIndexByName = unsafe extern "C" fn(LPMState, *const c_char) -> c_int;
pub type FnLpmGetModuleInfo = unsafe extern "C" fn(LPMState, c_int) -> *mut LpmModuleInfo;
pub type FnLpmGetLastError = unsafe extern "C" fn() -> c_int;
pub type FnLpmGetErrorMsg = unsafe extern "C" fn(c_int) -> *const c_char;
pub type FnLpmOpenErrorLog = unsafe extern "C" fn(*const c_char) -> c_int;
pub type FnLpmCloseErrorLog = unsafe extern "C" fn();

/// Exported symbol names, in the order of the `LpmApi` fields.
pub const SYMBOLS: [&str; 20] = [
    "lpmInit",
    "lpmFree",
    "lpmVersion",
    "lpmCompilationDate",
    "lpmLoadViewConfig",
    "lpmWriteViewConfig",
    "lpmLoadModule",
    "lpmFreeModule",
    "lpmRunDet",
    "lpmFreeDetResult",
    "lpmRunOcr",
    "lpmFreeOcrResult",
    "lpmGetNumAvlbModules",
    "lpmGetModuleIndex",
    "lpmGetModuleIndexByName",
    "lpmGetModuleInfo",
    "lpmGetLastError",
    "lpmGetErrorMsg",
    "lpmOpenErrorLog",
    "lpmCloseErrorLog",
];

/// Every entry point of the engine, resolved.
///
/// The pointers are only valid while the library they were resolved from
/// stays loaded.
#[derive(Debug, Clone, Copy)]
pub struct LpmApi {
    pub init: FnLpmInit,
    pub free: FnLpmFree,
    pub version: FnLpmVersion,
    pub compilation_date: FnLpmCompilationDate,
    pub load_view_config: FnLpmLoadViewConfig,
    pub write_view_config: FnLpmWriteViewConfig,
    pub load_module: FnLpmLoadModule,
    pub free_module: FnLpmFreeModule,
    pub run_det: FnLpmRunDet,
    pub free_det_result: FnLpmFreeDetResult,
    pub run_ocr: FnLpmRunOcr,
    pub free_ocr_result: FnLpmFreeOcrResult,
    pub get_num_avlb_modules: FnLpmGetNumAvlbModules,
    pub get_module_index: FnLpmGetModuleIndex,
    pub get_module_index_by_name: FnLpmGetModuleIndexByName,
    pub get_module_info: FnLpmGetModuleInfo,
    pub get_last_error: FnLpmGetLastError,
    pub get_error_msg: FnLpmGetErrorMsg,
    pub open_error_log: FnLpmOpenErrorLog,
    pub close_error_log: FnLpmCloseErrorLog,
}
