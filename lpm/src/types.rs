use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_int, c_ulong};
use std::path::PathBuf;
use std::ptr;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use lpm_sys::*;
use serde::Deserialize;

use crate::error::{LpmError, Result};
use crate::marshal;

/// Engine version decoded from `lpmVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version, the high byte of the lower 16 bits.
    pub major: u8,
    /// Minor version, the low byte.
    pub minor: u8,
}

impl Version {
    /// Decodes the packed value returned by `lpmVersion`.
    pub fn from_raw(raw: c_ulong) -> Self {
        Self {
            major: (raw >> 8) as u8,
            minor: raw as u8,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Four corner points of an image area, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    /// Top left column.
    pub top_left_col: f32,
    /// Top left row.
    pub top_left_row: f32,
    /// Top right column.
    pub top_right_col: f32,
    /// Top right row.
    pub top_right_row: f32,
    /// Bottom left column.
    pub bot_left_col: f32,
    /// Bottom left row.
    pub bot_left_row: f32,
    /// Bottom right column.
    pub bot_right_col: f32,
    /// Bottom right row.
    pub bot_right_row: f32,
}

impl BoundingBox {
    /// Axis aligned box with the given inclusive corners.
    pub fn from_rect(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            top_left_col: left,
            top_left_row: top,
            top_right_col: right,
            top_right_row: top,
            bot_left_col: left,
            bot_left_row: bottom,
            bot_right_col: right,
            bot_right_row: bottom,
        }
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full_image(width: u32, height: u32) -> Self {
        Self::from_rect(
            0.0,
            0.0,
            width.saturating_sub(1) as f32,
            height.saturating_sub(1) as f32,
        )
    }

    /// True when every corner is at the origin.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<LpmBoundingBox> for BoundingBox {
    fn from(raw: LpmBoundingBox) -> Self {
        Self {
            top_left_col: raw.top_left_col,
            top_left_row: raw.top_left_row,
            top_right_col: raw.top_right_col,
            top_right_row: raw.top_right_row,
            bot_left_col: raw.bot_left_col,
            bot_left_row: raw.bot_left_row,
            bot_right_col: raw.bot_right_col,
            bot_right_row: raw.bot_right_row,
        }
    }
}

impl From<&BoundingBox> for LpmBoundingBox {
    fn from(bbox: &BoundingBox) -> Self {
        Self {
            top_left_col: bbox.top_left_col,
            top_left_row: bbox.top_left_row,
            top_right_col: bbox.top_right_col,
            top_right_row: bbox.top_right_row,
            bot_left_col: bbox.bot_left_col,
            bot_left_row: bbox.bot_left_row,
            bot_right_col: bbox.bot_right_col,
            bot_right_row: bbox.bot_right_row,
        }
    }
}

/// Camera installation type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    /// Frontal images of cars, e.g. overhead gantries.
    Frontal,
    /// Generic images of cars, e.g. a camera in a moving vehicle.
    #[default]
    Generic,
}

impl ViewType {
    /// Native enum value.
    pub fn to_raw(self) -> LpmViewType {
        match self {
            ViewType::Frontal => LPM_VIEW_FRONTAL,
            ViewType::Generic => LPM_VIEW_GENERIC,
        }
    }
}

impl TryFrom<LpmViewType> for ViewType {
    type Error = LpmError;

    fn try_from(raw: LpmViewType) -> Result<Self> {
        match raw {
            LPM_VIEW_FRONTAL => Ok(ViewType::Frontal),
            LPM_VIEW_GENERIC => Ok(ViewType::Generic),
            other => Err(LpmError::InvalidArgument(format!("unknown view type {other}"))),
        }
    }
}

/// Camera geometry the detector is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraViewParams {
    /// Installation type.
    pub view_type: ViewType,
    /// Minimal horizontal resolution in pixels per meter.
    pub min_horizontal_resolution: u32,
    /// Maximal horizontal resolution in pixels per meter.
    pub max_horizontal_resolution: u32,
    /// Vertical pixel density divided by horizontal pixel density.
    pub density_ratio: f32,
}

impl Default for CameraViewParams {
    fn default() -> Self {
        Self {
            view_type: ViewType::Generic,
            min_horizontal_resolution: 0,
            max_horizontal_resolution: 0,
            density_ratio: 1.0,
        }
    }
}

impl From<&CameraViewParams> for LpmCameraViewParams {
    fn from(params: &CameraViewParams) -> Self {
        Self {
            view_type: params.view_type.to_raw(),
            min_horizontal_resolution: params.min_horizontal_resolution,
            max_horizontal_resolution: params.max_horizontal_resolution,
            density_ratio: params.density_ratio,
        }
    }
}

impl TryFrom<LpmCameraViewParams> for CameraViewParams {
    type Error = LpmError;

    fn try_from(raw: LpmCameraViewParams) -> Result<Self> {
        Ok(Self {
            view_type: ViewType::try_from(raw.view_type)?,
            min_horizontal_resolution: raw.min_horizontal_resolution,
            max_horizontal_resolution: raw.max_horizontal_resolution,
            density_ratio: raw.density_ratio,
        })
    }
}

/// Module runtime configuration, the base structure merged with its extension.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    /// Deprecated global GPU switch.
    pub compute_on_gpu: bool,
    /// Deprecated global GPU device.
    pub gpu_device_id: i32,
    /// Module configuration file, `config.ini` when unset.
    pub lpm_config_filename: Option<PathBuf>,
    /// Run OCR on a GPU.
    pub ocr_compute_on_gpu: bool,
    /// GPU device used by OCR.
    pub ocr_gpu_device_id: i32,
    /// CPU threads for OCR, zero or negative lets the engine decide.
    pub ocr_num_threads: i32,
    /// Do not load the OCR submodule.
    pub disable_ocr: bool,
    /// Detector configuration file, `config-det.ini` when unset.
    pub det_config_filename: Option<PathBuf>,
    /// Run detection on a GPU.
    pub det_compute_on_gpu: bool,
    /// GPU device used by the detector.
    pub det_gpu_device_id: i32,
    /// CPU threads for the detector, zero or negative lets the engine decide.
    pub det_num_threads: i32,
    /// Do not load the detection submodule.
    pub disable_det: bool,
}

impl ModuleConfig {
    /// Builds the native structure together with everything it points to.
    pub fn to_native(&self) -> Result<NativeModuleConfig> {
        NativeModuleConfig::new(self)
    }

    /// Reads a native configuration back into a host value.
    ///
    /// # Safety
    /// `raw.extras` must be null or point to a valid extension whose filename
    /// pointers are null or valid NUL-terminated strings.
    pub unsafe fn from_native(raw: &LpmModuleConfig) -> Self {
        let mut config = Self {
            compute_on_gpu: raw.compute_on_gpu != 0,
            gpu_device_id: raw.gpu_device_id,
            ..Self::default()
        };
        // SAFETY: guaranteed by the caller.
        let Some(ext) = (unsafe { raw.extras.as_ref() }) else {
            return config;
        };
        // SAFETY: guaranteed by the caller.
        unsafe {
            config.lpm_config_filename = marshal::opt_c_str(ext.lpm_config_filename).map(PathBuf::from);
            config.det_config_filename = marshal::opt_c_str(ext.det_config_filename).map(PathBuf::from);
        }
        config.ocr_compute_on_gpu = ext.ocr_compute_on_gpu != 0;
        config.ocr_gpu_device_id = ext.ocr_gpu_device_id;
        config.ocr_num_threads = ext.ocr_num_threads;
        config.disable_ocr = ext.disable_ocr != 0;
        config.det_compute_on_gpu = ext.det_compute_on_gpu != 0;
        config.det_gpu_device_id = ext.det_gpu_device_id;
        config.det_num_threads = ext.det_num_threads;
        config.disable_det = ext.disable_det != 0;
        config
    }
}

/// A native `LpmModuleConfig` that owns its extension and filename buffers.
///
/// Everything the structure points to is released together with it, so the
/// pointer from [`as_ptr`](Self::as_ptr) is valid exactly as long as this
/// value is alive.
pub struct NativeModuleConfig {
    raw: LpmModuleConfig,
}

impl NativeModuleConfig {
    fn new(config: &ModuleConfig) -> Result<Self> {
        let lpm_config_filename = optional_c_path(config.lpm_config_filename.as_ref())?;
        let det_config_filename = optional_c_path(config.det_config_filename.as_ref())?;

        let extension = Box::new(LpmModuleConfig_extension1 {
            lpm_config_filename: lpm_config_filename.map_or(ptr::null(), |s| s.into_raw().cast_const()),
            ocr_compute_on_gpu: config.ocr_compute_on_gpu as c_int,
            ocr_gpu_device_id: config.ocr_gpu_device_id,
            ocr_num_threads: config.ocr_num_threads,
            disable_ocr: config.disable_ocr as c_int,
            det_config_filename: det_config_filename.map_or(ptr::null(), |s| s.into_raw().cast_const()),
            det_compute_on_gpu: config.det_compute_on_gpu as c_int,
            det_gpu_device_id: config.det_gpu_device_id,
            det_num_threads: config.det_num_threads,
            disable_det: config.disable_det as c_int,
            extras: ptr::null_mut(),
        });

        Ok(Self {
            raw: LpmModuleConfig {
                compute_on_gpu: config.compute_on_gpu as c_int,
                gpu_device_id: config.gpu_device_id,
                extras: Box::into_raw(extension),
            },
        })
    }

    /// The structure as the engine expects it.
    pub fn as_raw(&self) -> &LpmModuleConfig {
        &self.raw
    }

    /// Pointer for `lpmLoadModule`.
    pub fn as_ptr(&self) -> *const LpmModuleConfig {
        &self.raw
    }
}

impl Drop for NativeModuleConfig {
    fn drop(&mut self) {
        // SAFETY: `extras` and both filenames were produced by `Box::into_raw`
        // and `CString::into_raw` in `new` and are released only here.
        unsafe {
            let extension = Box::from_raw(self.raw.extras);
            for name in [extension.lpm_config_filename, extension.det_config_filename] {
                if !name.is_null() {
                    drop(CString::from_raw(name.cast_mut()));
                }
            }
        }
    }
}

fn optional_c_path(path: Option<&PathBuf>) -> Result<Option<CString>> {
    path.map(|p| marshal::path_to_c_string(p)).transpose()
}

macro_rules! detection_labels {
    ($($(#[$doc:meta])* $name:ident = $raw:ident,)*) => {
        /// Type of a detection, as reported by the detector.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub enum DetectionLabel {
            $($(#[$doc])* $name,)*
            /// A value this binding does not know, e.g. from a newer engine.
            Other(i32),
        }

        impl DetectionLabel {
            /// Maps a native label value.
            pub fn from_raw(raw: LpmDetectionLabel) -> Self {
                match raw {
                    $($raw => DetectionLabel::$name,)*
                    other => DetectionLabel::Other(other),
                }
            }

            /// Native label value.
            pub fn to_raw(self) -> LpmDetectionLabel {
                match self {
                    $(DetectionLabel::$name => $raw,)*
                    DetectionLabel::Other(raw) => raw,
                }
            }
        }
    };
}

detection_labels! {
    /// Generic label, what OCR uses when nothing better is known.
    #[default]
    Default = LPM_LABEL_DEFAULT,
    /// Person.
    Person = LPM_LABEL_PERSON,
    /// Generic license plate.
    LicensePlate = LPM_LABEL_LP,
    /// European one line plate.
    LicensePlateEuOneLine = LPM_LABEL_LP_EU_ONE_LINE,
    /// European multi line plate.
    LicensePlateEuMultiLine = LPM_LABEL_LP_EU_MULTI_LINE,
    /// Frontal one line plate.
    LicensePlateFrontalOneLine = LPM_LABEL_LP_I_FRONTAL_ONE_LINE,
    /// Kazakh one line plate.
    LicensePlateKzOneLine = LPM_LABEL_LP_KZ_ONE_LINE,
    /// Kazakh multi line plate.
    LicensePlateKzMultiLine = LPM_LABEL_LP_KZ_MULTI_LINE,
    /// North American plate.
    LicensePlateNorthAmerica = LPM_LABEL_LP_NORTH_AMERICA,
    /// Asia Pacific plate.
    LicensePlateAsiaPacific = LPM_LABEL_LP_ASIA_PACIFIC,
    /// Middle Eastern plate.
    LicensePlateMiddleEast = LPM_LABEL_LP_MIDDLE_EAST,
    /// ADR dangerous goods plate.
    Adr = LPM_LABEL_ADR,
    /// ADR plate with text.
    AdrString = LPM_LABEL_ADR_STRING,
    /// Empty ADR plate.
    AdrEmpty = LPM_LABEL_ADR_EMPTY,
    /// Trash load plate.
    Trash = LPM_LABEL_TRASH,
    /// Speed limit sticker.
    SpeedLimit = LPM_LABEL_SPEED_LIMIT,
    /// Oversize load sign.
    OversizeLoad = LPM_LABEL_OVERSIZE_LOAD,
    /// Vignette sticker.
    Vignette = LPM_LABEL_VIGNETTE,
    /// Vehicle.
    Vehicle = LPM_LABEL_VEHICLE,
    /// Vehicle front.
    VehicleFront = LPM_LABEL_VEHICLE_FRONT,
    /// Vehicle rear.
    VehicleRear = LPM_LABEL_VEHICLE_REAR,
    /// Windshield.
    VehicleWindshield = LPM_LABEL_VEHICLE_WINDSHIELD,
    /// Wheel.
    VehicleWheel = LPM_LABEL_VEHICLE_WHEEL,
}

/// Pixels of a detection crop, copied out of the engine's result.
#[derive(Debug, Clone, PartialEq)]
pub struct Crop {
    /// Native colour model (`ER_IMAGE_COLORMODEL_*`).
    pub color_model: ERImageColorModel,
    /// Native element type (`ER_IMAGE_DATATYPE_*`).
    pub data_type: ERImageDataType,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row length in bytes.
    pub step: u32,
    /// Channels per pixel.
    pub num_channels: u32,
    /// Raw bytes, `step` per row.
    pub data: Vec<u8>,
}

impl Crop {
    /// Converts 8-bit BGR or gray crops to an RGB image.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.data_type != ER_IMAGE_DATATYPE_UCHAR {
            return None;
        }
        let needed = self.step as usize * self.height as usize;
        if self.data.len() < needed {
            return None;
        }
        if (self.step as usize) < self.width as usize * self.num_channels as usize {
            return None;
        }
        let step = self.step as usize;
        match (self.color_model, self.num_channels) {
            (ER_IMAGE_COLORMODEL_BGR, 3) => Some(ImageBuffer::from_fn(self.width, self.height, |x, y| {
                let i = y as usize * step + x as usize * 3;
                Rgb([self.data[i + 2], self.data[i + 1], self.data[i]])
            })),
            (ER_IMAGE_COLORMODEL_GRAY, 1) => {
                let gray: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_fn(self.width, self.height, |x, y| {
                        Luma([self.data[y as usize * step + x as usize]])
                    });
                Some(image::DynamicImage::ImageLuma8(gray).to_rgb8())
            }
            _ => None,
        }
    }
}

/// Extra per-detection data of engines 7.3 and newer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionExtension {
    /// Negative when unknown, 0.0 not occluded, 1.0 fully occluded.
    pub occlusion: f32,
    /// -1 unknown, 0 whole object, 1 truncated.
    pub truncated: i32,
    /// -1 unknown, 0 undefined, ids start at 1.
    pub cluster_id: i32,
    /// Confidence of `cluster_id`.
    pub cluster_confidence: f64,
}

/// A single detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Detection confidence.
    pub confidence: f64,
    /// Position in the source image.
    pub position: BoundingBox,
    /// Detection type.
    pub label: DetectionLabel,
    /// Crop pixels, `None` when the engine produced no crop.
    pub crop: Option<Crop>,
    /// Crop-to-source affine mapping, row-wise 3x2.
    pub affine_mapping: [f64; 6],
    /// Present when the engine reports the extension.
    pub extension: Option<DetectionExtension>,
}

impl Detection {
    /// Occlusion, -1 when not reported.
    pub fn occlusion(&self) -> f32 {
        self.extension.map_or(-1.0, |e| e.occlusion)
    }

    /// Truncation flag, -1 when not reported.
    pub fn truncated(&self) -> i32 {
        self.extension.map_or(-1, |e| e.truncated)
    }

    /// Cluster id, -1 when not reported.
    pub fn cluster_id(&self) -> i32 {
        self.extension.map_or(-1, |e| e.cluster_id)
    }

    /// Cluster confidence, 0 when not reported.
    pub fn cluster_confidence(&self) -> f64 {
        self.extension.map_or(0.0, |e| e.cluster_confidence)
    }

    /// Maps a point from crop coordinates to source image coordinates.
    pub fn crop_to_source(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.affine_mapping;
        (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
    }
}

/// Host copy of one `lpmRunDet` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    /// Id of the module that produced the result.
    pub lpm_id: i32,
    /// Index of the module that produced the result.
    pub lpm_idx: i32,
    /// Number of detections as reported by the engine.
    pub num_detections: i32,
    /// Detections.
    pub detections: Vec<Detection>,
}

/// One recognized text line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    /// Confidence of the whole line.
    pub confidence: f64,
    /// Number of characters reported by the engine.
    pub length: u32,
    /// Decoded text.
    pub characters: String,
    /// One confidence per character.
    pub character_confidences: Vec<f64>,
}

/// Physical plate size in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LpDimensions {
    /// Width in millimetres.
    pub physical_width: u32,
    /// Height in millimetres.
    pub physical_height: u32,
}

/// Extra per-hypothesis data of engines 7.6 and newer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrHypothesisExtension {
    /// 0 readable to 1 unreadable, negative when not predicted.
    pub unreadable: f64,
    /// 0 clear to 1 fully obstructed, negative when not predicted.
    pub obstructed: f64,
}

/// One OCR hypothesis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrHypothesis {
    /// Hypothesis confidence.
    pub confidence: f64,
    /// Number of lines reported by the engine.
    pub num_lines: u32,
    /// Text lines, top to bottom.
    pub text_lines: Vec<TextLine>,
    /// International plate code, `ADR`/`TRASH` for ADR plates, `UNK` for false positives.
    pub plate_type: String,
    /// Confidence of `plate_type`.
    pub plate_type_confidence: f64,
    /// Predicted physical size.
    pub lp_dimensions: LpDimensions,
    /// Confidence of `lp_dimensions`.
    pub lp_dimensions_confidence: f64,
    /// Present when the engine reports the extension.
    pub extension: Option<OcrHypothesisExtension>,
}

impl OcrHypothesis {
    /// Unreadability score, -1 when not reported.
    pub fn unreadable(&self) -> f64 {
        self.extension.map_or(-1.0, |e| e.unreadable)
    }

    /// Obstruction score, -1 when not reported.
    pub fn obstructed(&self) -> f64 {
        self.extension.map_or(-1.0, |e| e.obstructed)
    }

    /// All lines joined with a newline.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for (n, line) in self.text_lines.iter().enumerate() {
            if n > 0 {
                text.push('\n');
            }
            text.push_str(&line.characters);
        }
        text
    }
}

/// Host copy of one `lpmRunOcr` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrResult {
    /// Id of the module that produced the result.
    pub lpm_id: i32,
    /// Index of the module that produced the result.
    pub lpm_idx: i32,
    /// Number of hypotheses reported by the engine.
    pub num_hypotheses: u32,
    /// Hypotheses, best first.
    pub hypotheses: Vec<OcrHypothesis>,
}

impl OcrResult {
    /// The first, most confident hypothesis.
    pub fn best(&self) -> Option<&OcrHypothesis> {
        self.hypotheses.first()
    }
}

/// Calendar date and time as reported by the license.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    /// Four digit year.
    pub year: u32,
    /// 1-12.
    pub month: u8,
    /// 1-31.
    pub day_of_month: u8,
    /// 0-23.
    pub hour: u8,
    /// 0-59.
    pub minute: u8,
    /// 0-59.
    pub second: u8,
}

impl From<LpmDateTime> for DateTime {
    fn from(raw: LpmDateTime) -> Self {
        Self {
            year: raw.year,
            month: raw.month,
            day_of_month: raw.day_of_month,
            hour: raw.hour,
            minute: raw.minute,
            second: raw.second,
        }
    }
}

/// License state of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LicenseInfo {
    /// License is valid.
    pub is_valid: bool,
    /// Expiration date, all zeroes for time-unlimited licenses.
    pub expiration_date: DateTime,
    /// Execution counter is active.
    pub is_using_counter: bool,
    /// Executions left, meaningful only with the counter active.
    pub executions_left: u64,
}

impl LicenseInfo {
    /// True when the license never expires.
    pub fn is_time_unlimited(&self) -> bool {
        self.expiration_date == DateTime::default()
    }
}

impl From<&LpmLicenseInfo> for LicenseInfo {
    fn from(raw: &LpmLicenseInfo) -> Self {
        Self {
            is_valid: raw.is_valid != 0,
            expiration_date: raw.expiration_date.into(),
            is_using_counter: raw.is_using_counter != 0,
            executions_left: raw.executions_left as u64,
        }
    }
}

/// Static description of an installed module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleInfo {
    /// Full name.
    pub name: String,
    /// Module id, not to be confused with the module index.
    pub id: i32,
    /// Release date, `YYYY-mm-dd`.
    pub date: String,
    /// Full path to the module.
    pub path: String,
    /// Version.
    pub version: i32,
    /// Subversion.
    pub subversion: i32,
    /// Detector type, e.g. `frontal`, `generic`.
    pub det_type: String,
    /// Detected object type, e.g. `license plates`.
    pub obj_type: String,
    /// Recognition type, e.g. `ceu3`, `adr`.
    pub rcg_type: String,
    /// Input image type, e.g. `ERImage`.
    pub input_img_type: String,
    /// Desired pixel aspect ratio of input images.
    pub pxl_aspect_ratio: f64,
    /// Comma separated country codes.
    pub lp_countries: String,
    /// Plate width range.
    pub lp_min_mean_max_width: [i32; 3],
    /// Plate height range.
    pub lp_min_mean_max_height: [i32; 3],
    /// In-plane rotation range.
    pub lp_min_mean_max_rotation: [f64; 3],
    /// Module is active.
    pub is_active: bool,
    /// Property bits (`LPM_DET_*`, `LPM_OBJ_*`, `LPM_OCR_*`, `LPM_RCG_*`).
    pub prop: LpmPropertyFlags,
    /// License state, when the engine reports it.
    pub license: Option<LicenseInfo>,
}

impl ModuleInfo {
    /// Supported countries as a list.
    pub fn countries(&self) -> Vec<&str> {
        self.lp_countries
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// True when any bit of `flags` is set in `prop`.
    pub fn has_property(&self, flags: LpmPropertyFlags) -> bool {
        self.prop & flags != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_split_into_bytes() {
        let version = Version::from_raw(0x0706);
        assert_eq!(version, Version { major: 7, minor: 6 });
        assert_eq!(version.to_string(), "7.6");
        assert_eq!(Version::from_raw(0xFF_0302).to_string(), "3.2");
    }

    #[test]
    fn bounding_box_native_round_trip() {
        let bbox = BoundingBox {
            top_left_col: 1.5,
            top_left_row: 2.0,
            top_right_col: 101.0,
            top_right_row: 3.25,
            bot_left_col: 0.5,
            bot_left_row: 40.0,
            bot_right_col: 99.0,
            bot_right_row: 41.75,
        };
        let raw = LpmBoundingBox::from(&bbox);
        assert_eq!(BoundingBox::from(raw), bbox);
    }

    #[test]
    fn full_image_box_covers_last_pixel() {
        let bbox = BoundingBox::full_image(100, 50);
        assert_eq!(bbox.top_left_col, 0.0);
        assert_eq!(bbox.top_right_col, 99.0);
        assert_eq!(bbox.bot_left_row, 49.0);
        assert_eq!(bbox.bot_right_col, 99.0);
        assert_eq!(bbox.bot_right_row, 49.0);
        assert!(!bbox.is_empty());
        assert!(BoundingBox::default().is_empty());
    }

    #[test]
    fn camera_view_native_round_trip() {
        let params = CameraViewParams {
            view_type: ViewType::Frontal,
            min_horizontal_resolution: 120,
            max_horizontal_resolution: 480,
            density_ratio: 1.25,
        };
        let raw = LpmCameraViewParams::from(&params);
        assert_eq!(raw.view_type, LPM_VIEW_FRONTAL);
        assert_eq!(CameraViewParams::try_from(raw).unwrap(), params);
    }

    #[test]
    fn unknown_view_type_is_rejected() {
        let raw = LpmCameraViewParams {
            view_type: 7,
            ..Default::default()
        };
        assert!(matches!(
            CameraViewParams::try_from(raw),
            Err(LpmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn module_config_native_round_trip() {
        let config = ModuleConfig {
            compute_on_gpu: true,
            gpu_device_id: 1,
            lpm_config_filename: Some(PathBuf::from("config/lpm.ini")),
            ocr_compute_on_gpu: false,
            ocr_gpu_device_id: 2,
            ocr_num_threads: 4,
            disable_ocr: true,
            det_config_filename: None,
            det_compute_on_gpu: true,
            det_gpu_device_id: 3,
            det_num_threads: -1,
            disable_det: false,
        };
        let native = config.to_native().unwrap();
        let raw = native.as_raw();
        assert_eq!(raw.compute_on_gpu, 1);
        assert!(!raw.extras.is_null());
        let back = unsafe { ModuleConfig::from_native(raw) };
        assert_eq!(back, config);
    }

    #[test]
    fn module_config_without_extension_keeps_defaults() {
        let raw = LpmModuleConfig {
            compute_on_gpu: 1,
            gpu_device_id: 5,
            extras: ptr::null_mut(),
        };
        let config = unsafe { ModuleConfig::from_native(&raw) };
        assert!(config.compute_on_gpu);
        assert_eq!(config.gpu_device_id, 5);
        assert_eq!(config.lpm_config_filename, None);
        assert_eq!(config.ocr_num_threads, 0);
    }

    #[test]
    fn module_config_rejects_nul_in_filename() {
        let config = ModuleConfig {
            det_config_filename: Some(PathBuf::from("bad\0name.ini")),
            ..Default::default()
        };
        assert!(matches!(config.to_native(), Err(LpmError::InvalidArgument(_))));
    }

    #[test]
    fn labels_map_both_ways() {
        assert_eq!(DetectionLabel::from_raw(1001), DetectionLabel::LicensePlateEuOneLine);
        assert_eq!(DetectionLabel::VehicleWheel.to_raw(), 3020);
        assert_eq!(DetectionLabel::from_raw(4242), DetectionLabel::Other(4242));
        assert_eq!(DetectionLabel::Other(4242).to_raw(), 4242);
        assert_eq!(DetectionLabel::default().to_raw(), LPM_LABEL_DEFAULT);
    }

    #[test]
    fn detection_sentinels_without_extension() {
        let detection = Detection {
            confidence: 0.5,
            position: BoundingBox::default(),
            label: DetectionLabel::LicensePlate,
            crop: None,
            affine_mapping: [1.0, 0.0, 0.0, 1.0, 10.0, 20.0],
            extension: None,
        };
        assert_eq!(detection.occlusion(), -1.0);
        assert_eq!(detection.truncated(), -1);
        assert_eq!(detection.cluster_id(), -1);
        assert_eq!(detection.crop_to_source(2.0, 3.0), (12.0, 23.0));
    }

    #[test]
    fn bgr_crop_converts_to_rgb() {
        let crop = Crop {
            color_model: ER_IMAGE_COLORMODEL_BGR,
            data_type: ER_IMAGE_DATATYPE_UCHAR,
            width: 2,
            height: 1,
            step: 8,
            num_channels: 3,
            data: vec![1, 2, 3, 4, 5, 6, 0, 0],
        };
        let rgb = crop.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([3, 2, 1]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([6, 5, 4]));
    }

    #[test]
    fn crop_with_short_rows_is_rejected() {
        let crop = Crop {
            color_model: ER_IMAGE_COLORMODEL_BGR,
            data_type: ER_IMAGE_DATATYPE_UCHAR,
            width: 3,
            height: 1,
            step: 3,
            num_channels: 3,
            data: vec![1, 2, 3],
        };
        assert!(crop.to_rgb_image().is_none());

        let gray = Crop {
            color_model: ER_IMAGE_COLORMODEL_GRAY,
            num_channels: 1,
            width: 4,
            ..crop
        };
        assert!(gray.to_rgb_image().is_none());
    }

    #[test]
    fn hypothesis_text_joins_lines() {
        let line = |text: &str| TextLine {
            characters: text.to_string(),
            ..Default::default()
        };
        let mut hypothesis = OcrHypothesis::default();
        assert_eq!(hypothesis.text(), "");
        hypothesis.text_lines = vec![line("1AB 2345")];
        assert_eq!(hypothesis.text(), "1AB 2345");
        hypothesis.text_lines.push(line("PRAHA"));
        assert_eq!(hypothesis.text(), "1AB 2345\nPRAHA");
    }

    #[test]
    fn module_info_helpers() {
        let info = ModuleInfo {
            lp_countries: "CZ, SK,A,".to_string(),
            prop: LPM_DET_GENERIC | LPM_OBJ_LP,
            ..Default::default()
        };
        assert_eq!(info.countries(), vec!["CZ", "SK", "A"]);
        assert!(info.has_property(LPM_OBJ_LP));
        assert!(!info.has_property(LPM_OBJ_ADR));
    }
}
