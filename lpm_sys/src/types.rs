use std::os::raw::{c_char, c_double, c_float, c_int, c_uchar, c_uint, c_ulong, c_void};

use crate::er_image::ERImage;

/// Opaque engine context created by `lpmInit`.
pub type LPMState = *mut c_void;

pub const LPM_MAX_PATH_LEN: usize = 4096;
pub const LPM_MAX_STR_LEN: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LpmDateTime {
    pub year: c_uint,
    pub month: c_uchar,
    pub day_of_month: c_uchar,
    pub hour: c_uchar,
    pub minute: c_uchar,
    pub second: c_uchar,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LpmLicenseInfo {
    pub is_valid: c_int,
    /// All zeroes means the license never expires.
    pub expiration_date: LpmDateTime,
    pub is_using_counter: c_int,
    pub executions_left: c_ulong,
}

/// Module property bit set.
pub type LpmPropertyFlags = i64;

pub const LPM_EMPTY: LpmPropertyFlags = 0x0000;

pub const LPM_DET_ENABLED: LpmPropertyFlags = 0xFFFF;
pub const LPM_DET_FRONTAL: LpmPropertyFlags = 0x0001;
pub const LPM_DET_GENERIC: LpmPropertyFlags = 0x0002;
pub const LPM_DET_LFRONTAL: LpmPropertyFlags = 0x0004;
pub const LPM_DET_RGB_FRONTAL: LpmPropertyFlags = 0x0008;
pub const LPM_DET_RGB_GENERIC: LpmPropertyFlags = 0x0010;
pub const LPM_DET_WFRONTAL: LpmPropertyFlags = 0x0020;

pub const LPM_OBJ_LP: LpmPropertyFlags = 0x0000000100;
pub const LPM_OBJ_ADR: LpmPropertyFlags = 0x0000000200;
pub const LPM_OBJ_LP2: LpmPropertyFlags = 0x0000000400;
pub const LPM_OBJ_WIN: LpmPropertyFlags = 0x0000000800;
pub const LPM_OBJ_FACE: LpmPropertyFlags = 0x0000001000;
pub const LPM_OBJ_LCD: LpmPropertyFlags = 0x0000002000;
pub const LPM_OBJ_CAR: LpmPropertyFlags = 0x0000004000;

pub const LPM_OCR_ENABLED: LpmPropertyFlags = 0xFFFFFF0000;
pub const LPM_OCR_CZ: LpmPropertyFlags = 0x0000010000;
pub const LPM_OCR_EU: LpmPropertyFlags = 0x0000020000;
pub const LPM_OCR_AS: LpmPropertyFlags = 0x0000040000;
pub const LPM_OCR_AF: LpmPropertyFlags = 0x0000080000;
pub const LPM_OCR_ADR: LpmPropertyFlags = 0x0000100000;
pub const LPM_OCR_OC: LpmPropertyFlags = 0x0000200000;
pub const LPM_OCR_LCD: LpmPropertyFlags = 0x0000400000;
pub const LPM_OCR_GEN: LpmPropertyFlags = 0x0000800000;
pub const LPM_OCR_NA: LpmPropertyFlags = 0x0008000000;
pub const LPM_OCR_DISABLED: LpmPropertyFlags = 0x0000000000;

// Windows builds of the header use a narrower mask for this group.
#[cfg(windows)]
pub const LPM_RCG_ENABLED: LpmPropertyFlags = 0x0F0000000000;
#[cfg(not(windows))]
pub const LPM_RCG_ENABLED: LpmPropertyFlags = 0xFF0000000000;
pub const LPM_RCG_VCL: LpmPropertyFlags = 0x010000000000;

pub type LpmViewType = c_int;

/// Frontal images of cars, e.g. overhead gantry installations.
pub const LPM_VIEW_FRONTAL: LpmViewType = 0;
/// Generic images of cars, e.g. a camera in a moving vehicle.
pub const LPM_VIEW_GENERIC: LpmViewType = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LpmCameraViewParams {
    pub view_type: LpmViewType,
    /// Pixels per meter.
    pub min_horizontal_resolution: c_uint,
    /// Pixels per meter.
    pub max_horizontal_resolution: c_uint,
    /// Vertical pixel density / horizontal pixel density.
    pub density_ratio: c_float,
}

/// Module configuration addendum, used by engine 7.3 and newer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct LpmModuleConfig_extension1 {
    /// `config.ini` when null.
    pub lpm_config_filename: *const c_char,
    pub ocr_compute_on_gpu: c_int,
    pub ocr_gpu_device_id: c_int,
    /// Zero or negative uses roughly 90% of the logical processors.
    pub ocr_num_threads: c_int,
    pub disable_ocr: c_int,
    /// `config-det.ini` when null.
    pub det_config_filename: *const c_char,
    pub det_compute_on_gpu: c_int,
    pub det_gpu_device_id: c_int,
    pub det_num_threads: c_int,
    pub disable_det: c_int,
    /// Must be null.
    pub extras: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmModuleConfig {
    /// Deprecated in favour of the per-submodule fields of the extension.
    pub compute_on_gpu: c_int,
    /// Deprecated in favour of the per-submodule fields of the extension.
    pub gpu_device_id: c_int,
    pub extras: *mut LpmModuleConfig_extension1,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmModuleInfo {
    pub name: [c_char; LPM_MAX_STR_LEN],
    pub id: c_int,
    /// `YYYY-mm-dd`.
    pub date: [c_char; LPM_MAX_STR_LEN],
    pub path: [c_char; LPM_MAX_PATH_LEN],
    pub version: c_int,
    pub subversion: c_int,
    pub det_type: [c_char; LPM_MAX_STR_LEN],
    pub obj_type: [c_char; LPM_MAX_STR_LEN],
    pub rcg_type: [c_char; LPM_MAX_STR_LEN],
    pub input_img_type: [c_char; LPM_MAX_STR_LEN],
    pub pxl_aspect_ratio: c_double,
    /// Comma separated country codes, e.g. `CZ,SK,A`.
    pub lp_countries: [c_char; LPM_MAX_STR_LEN],
    pub lp_min_mean_max_width: [c_int; 3],
    pub lp_min_mean_max_height: [c_int; 3],
    pub lp_min_mean_max_rotation: [c_double; 3],
    pub is_active: c_int,
    pub prop: LpmPropertyFlags,
    pub license_info: *mut LpmLicenseInfo,
}

pub type LpmDetectionLabel = c_int;

pub const LPM_LABEL_DEFAULT: LpmDetectionLabel = 0;
pub const LPM_LABEL_PERSON: LpmDetectionLabel = 200;
pub const LPM_LABEL_LP: LpmDetectionLabel = 1000;
pub const LPM_LABEL_LP_EU_ONE_LINE: LpmDetectionLabel = 1001;
pub const LPM_LABEL_LP_EU_MULTI_LINE: LpmDetectionLabel = 1002;
pub const LPM_LABEL_LP_I_FRONTAL_ONE_LINE: LpmDetectionLabel = 1010;
pub const LPM_LABEL_LP_KZ_ONE_LINE: LpmDetectionLabel = 1101;
pub const LPM_LABEL_LP_KZ_MULTI_LINE: LpmDetectionLabel = 1102;
pub const LPM_LABEL_LP_NORTH_AMERICA: LpmDetectionLabel = 1200;
pub const LPM_LABEL_LP_ASIA_PACIFIC: LpmDetectionLabel = 1300;
pub const LPM_LABEL_LP_MIDDLE_EAST: LpmDetectionLabel = 1400;
pub const LPM_LABEL_ADR: LpmDetectionLabel = 2000;
pub const LPM_LABEL_ADR_STRING: LpmDetectionLabel = 2001;
pub const LPM_LABEL_ADR_EMPTY: LpmDetectionLabel = 2002;
pub const LPM_LABEL_TRASH: LpmDetectionLabel = 2100;
pub const LPM_LABEL_SPEED_LIMIT: LpmDetectionLabel = 2200;
pub const LPM_LABEL_OVERSIZE_LOAD: LpmDetectionLabel = 2210;
pub const LPM_LABEL_VIGNETTE: LpmDetectionLabel = 2300;
pub const LPM_LABEL_VEHICLE: LpmDetectionLabel = 3000;
pub const LPM_LABEL_VEHICLE_FRONT: LpmDetectionLabel = 3001;
pub const LPM_LABEL_VEHICLE_REAR: LpmDetectionLabel = 3002;
pub const LPM_LABEL_VEHICLE_WINDSHIELD: LpmDetectionLabel = 3010;
pub const LPM_LABEL_VEHICLE_WHEEL: LpmDetectionLabel = 3020;

/// Four corner points of a detection area, in pixels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LpmBoundingBox {
    pub top_left_col: c_float,
    pub top_left_row: c_float,
    pub top_right_col: c_float,
    pub top_right_row: c_float,
    pub bot_left_col: c_float,
    pub bot_left_row: c_float,
    pub bot_right_col: c_float,
    pub bot_right_row: c_float,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmDetection {
    pub confidence: c_double,
    pub position: LpmBoundingBox,
    pub label: LpmDetectionLabel,
    /// Crop of the detection. Owned by the result, empty when crops are disabled.
    pub image: ERImage,
    /// First two columns of the 3x3 crop-to-source affine matrix, row-wise.
    pub affine_mapping: [c_double; 6],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct LpmDetection_extension1 {
    /// Negative when unknown, 0.0 not occluded, 1.0 fully occluded.
    pub occlusion: c_float,
    /// -1 unknown, 0 whole object, 1 truncated.
    pub truncated: c_int,
    /// -1 unknown, 0 undefined, ids start at 1.
    pub cluster_id: c_int,
    pub cluster_confidence: c_double,
    pub extras: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct LpmDetResult_extension1 {
    /// Parallel to `LpmDetResult::detections`.
    pub detections: *mut LpmDetection_extension1,
    pub extras: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmDetResult {
    pub lpm_id: c_int,
    pub lpm_idx: c_int,
    pub num_detections: c_int,
    pub detections: *mut LpmDetection,
    /// Null on engines older than 7.3.
    pub extras: *mut LpmDetResult_extension1,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmTextLine {
    pub line_confidence: c_double,
    pub length: c_uint,
    /// `length` UTF-32 code points.
    pub characters: *mut c_int,
    /// `length` confidences.
    pub characters_confidences: *mut c_double,
}

/// Physical plate size in millimetres.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LpmLpDimensions {
    pub physical_width: c_uint,
    pub physical_height: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct LpmOcrHypothesis_extension1 {
    /// 0 readable to 1 unreadable, negative when not predicted.
    pub unreadable: c_double,
    /// 0 clear to 1 fully obstructed, negative when not predicted.
    pub obstructed: c_double,
    pub extras: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmOcrHypothesis {
    pub confidence: c_double,
    pub num_lines: c_uint,
    pub text_lines: *mut LpmTextLine,
    /// International plate code, `ADR`/`TRASH` for ADR plates, `UNK` for false positives.
    pub plate_type: *mut c_char,
    pub plate_type_confidence: c_double,
    pub lp_dimensions: LpmLpDimensions,
    pub lp_dimensions_confidence: c_double,
    /// Null on engines older than 7.6.
    pub extras: *mut LpmOcrHypothesis_extension1,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LpmOcrResult {
    pub lpm_id: c_int,
    pub lpm_idx: c_int,
    pub num_hypotheses: c_uint,
    pub hypotheses: *mut LpmOcrHypothesis,
}

#[cfg(all(test, target_os = "linux", target_pointer_width = "64"))]
mod layout {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn common_structs() {
        assert_eq!(size_of::<LpmDateTime>(), 12);
        assert_eq!(size_of::<LpmLicenseInfo>(), 32);
        assert_eq!(offset_of!(LpmLicenseInfo, executions_left), 24);
        assert_eq!(size_of::<LpmCameraViewParams>(), 16);
        assert_eq!(size_of::<LpmModuleConfig_extension1>(), 56);
        assert_eq!(offset_of!(LpmModuleConfig_extension1, det_config_filename), 24);
        assert_eq!(offset_of!(LpmModuleConfig_extension1, extras), 48);
        assert_eq!(size_of::<LpmModuleConfig>(), 16);
    }

    #[test]
    fn module_info() {
        assert_eq!(offset_of!(LpmModuleInfo, id), 256);
        assert_eq!(offset_of!(LpmModuleInfo, path), 516);
        assert_eq!(offset_of!(LpmModuleInfo, pxl_aspect_ratio), 5648);
        assert_eq!(offset_of!(LpmModuleInfo, lp_min_mean_max_rotation), 5936);
        assert_eq!(offset_of!(LpmModuleInfo, prop), 5968);
        assert_eq!(offset_of!(LpmModuleInfo, license_info), 5976);
        assert_eq!(size_of::<LpmModuleInfo>(), 5984);
    }

    #[test]
    fn detection_structs() {
        assert_eq!(size_of::<LpmBoundingBox>(), 32);
        assert_eq!(size_of::<ERImage>(), 56);
        assert_eq!(offset_of!(ERImage, data), 40);
        assert_eq!(offset_of!(LpmDetection, label), 40);
        assert_eq!(offset_of!(LpmDetection, image), 48);
        assert_eq!(offset_of!(LpmDetection, affine_mapping), 104);
        assert_eq!(size_of::<LpmDetection>(), 152);
        assert_eq!(size_of::<LpmDetection_extension1>(), 32);
        assert_eq!(offset_of!(LpmDetection_extension1, cluster_confidence), 16);
        assert_eq!(size_of::<LpmDetResult>(), 32);
        assert_eq!(offset_of!(LpmDetResult, detections), 16);
    }

    #[test]
    fn ocr_structs() {
        assert_eq!(size_of::<LpmTextLine>(), 32);
        assert_eq!(offset_of!(LpmTextLine, characters), 16);
        assert_eq!(size_of::<LpmOcrHypothesis_extension1>(), 24);
        assert_eq!(offset_of!(LpmOcrHypothesis, plate_type), 24);
        assert_eq!(offset_of!(LpmOcrHypothesis, lp_dimensions), 40);
        assert_eq!(offset_of!(LpmOcrHypothesis, extras), 56);
        assert_eq!(size_of::<LpmOcrHypothesis>(), 64);
        assert_eq!(size_of::<LpmOcrResult>(), 24);
        assert_eq!(align_of::<LpmOcrResult>(), 8);
    }
}
