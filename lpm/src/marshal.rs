//! Copies native engine structures into host-owned values.
//!
//! Every function here reads native memory and returns data that no longer
//! references it, so the native result may be released right after.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::slice;

use lpm_sys::*;

use crate::error::{LpmError, Result};
use crate::types::*;

/// Converts a string for the engine, rejecting interior NUL bytes.
pub fn to_c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| LpmError::InvalidArgument(format!("{value:?} contains a NUL byte")))
}

/// Converts a path for the engine.
pub fn path_to_c_string(path: &Path) -> Result<CString> {
    let value = path
        .to_str()
        .ok_or_else(|| LpmError::InvalidArgument(format!("{} is not valid UTF-8", path.display())))?;
    to_c_string(value)
}

/// Reads a NUL-terminated string, `None` for null pointers.
///
/// # Safety
/// `ptr` must be null or point to a valid NUL-terminated string.
pub unsafe fn opt_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let value = unsafe { CStr::from_ptr(ptr) };
    Some(value.to_string_lossy().into_owned())
}

/// Reads a fixed size `char` array up to its first NUL byte.
pub fn fixed_str(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Decodes UTF-32 code points. Invalid scalars become U+FFFD.
pub fn decode_utf32(code_points: &[c_int]) -> String {
    let mut invalid = 0usize;
    let text = code_points
        .iter()
        .map(|&cp| {
            char::from_u32(cp as u32).unwrap_or_else(|| {
                invalid += 1;
                char::REPLACEMENT_CHARACTER
            })
        })
        .collect();
    if invalid > 0 {
        tracing::warn!(invalid, "text line contains invalid code points");
    }
    text
}

/// Views a native array, treating null or empty as an empty slice.
///
/// # Safety
/// A non-null `ptr` must point to `len` initialized values that stay valid
/// for the returned lifetime.
unsafe fn native_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { slice::from_raw_parts(ptr, len) }
    }
}

/// Copies the pixel data of a crop, `None` when the engine produced none.
///
/// # Safety
/// A non-null `image.data` must cover `size` bytes (or `step * height` when
/// `size` is zero).
pub unsafe fn copy_crop(image: &ERImage) -> Option<Crop> {
    if image.data.is_null() {
        return None;
    }
    let len = if image.size > 0 {
        image.size as usize
    } else {
        image.step as usize * image.height as usize
    };
    if len == 0 {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let data = unsafe { native_slice(image.data.cast_const(), len) }.to_vec();
    Some(Crop {
        color_model: image.color_model,
        data_type: image.data_type,
        width: image.width,
        height: image.height,
        step: image.step,
        num_channels: image.num_channels,
        data,
    })
}

/// Deep copy of a detection result.
///
/// # Safety
/// `raw` must be a result returned by `lpmRunDet` that was not freed yet.
pub unsafe fn copy_det_result(raw: &LpmDetResult) -> DetectionResult {
    let count = raw.num_detections.max(0) as usize;
    // SAFETY: the engine allocates `num_detections` items.
    let detections = unsafe { native_slice(raw.detections.cast_const(), count) };

    // SAFETY: null or a valid extension block.
    let extensions = match unsafe { raw.extras.as_ref() } {
        // SAFETY: the extension array is parallel to `detections`.
        Some(ext) => Some(unsafe { native_slice(ext.detections.cast_const(), count) }),
        None => None,
    };

    let detections = detections
        .iter()
        .enumerate()
        .map(|(i, det)| {
            let extension = extensions
                .and_then(|ext| ext.get(i))
                .map(|ext| DetectionExtension {
                    occlusion: ext.occlusion,
                    truncated: ext.truncated,
                    cluster_id: ext.cluster_id,
                    cluster_confidence: ext.cluster_confidence,
                });
            let label = DetectionLabel::from_raw(det.label);
            if let DetectionLabel::Other(raw_label) = label {
                tracing::warn!(label = raw_label, "unknown detection label");
            }
            Detection {
                confidence: det.confidence,
                position: det.position.into(),
                label,
                // SAFETY: the crop belongs to the live result.
                crop: unsafe { copy_crop(&det.image) },
                affine_mapping: det.affine_mapping,
                extension,
            }
        })
        .collect();

    DetectionResult {
        lpm_id: raw.lpm_id,
        lpm_idx: raw.lpm_idx,
        num_detections: raw.num_detections,
        detections,
    }
}

unsafe fn copy_text_line(raw: &LpmTextLine) -> TextLine {
    let len = raw.length as usize;
    // SAFETY: both arrays hold `length` items.
    let (characters, confidences) = unsafe {
        (
            native_slice(raw.characters.cast_const(), len),
            native_slice(raw.characters_confidences.cast_const(), len),
        )
    };
    TextLine {
        confidence: raw.line_confidence,
        length: raw.length,
        characters: decode_utf32(characters),
        character_confidences: confidences.to_vec(),
    }
}

unsafe fn copy_hypothesis(raw: &LpmOcrHypothesis) -> OcrHypothesis {
    // SAFETY: the engine allocates `num_lines` lines.
    let lines = unsafe { native_slice(raw.text_lines.cast_const(), raw.num_lines as usize) };
    // SAFETY: null or a valid extension block.
    let extension = unsafe { raw.extras.as_ref() }.map(|ext| OcrHypothesisExtension {
        unreadable: ext.unreadable,
        obstructed: ext.obstructed,
    });
    OcrHypothesis {
        confidence: raw.confidence,
        num_lines: raw.num_lines,
        // SAFETY: every line belongs to the live result.
        text_lines: lines.iter().map(|line| unsafe { copy_text_line(line) }).collect(),
        // SAFETY: null or a NUL-terminated string.
        plate_type: unsafe { opt_c_str(raw.plate_type.cast_const()) }.unwrap_or_default(),
        plate_type_confidence: raw.plate_type_confidence,
        lp_dimensions: LpDimensions {
            physical_width: raw.lp_dimensions.physical_width,
            physical_height: raw.lp_dimensions.physical_height,
        },
        lp_dimensions_confidence: raw.lp_dimensions_confidence,
        extension,
    }
}

/// Deep copy of an OCR result.
///
/// # Safety
/// `raw` must be a result returned by `lpmRunOcr` that was not freed yet.
pub unsafe fn copy_ocr_result(raw: &LpmOcrResult) -> OcrResult {
    // SAFETY: the engine allocates `num_hypotheses` items.
    let hypotheses = unsafe { native_slice(raw.hypotheses.cast_const(), raw.num_hypotheses as usize) };
    OcrResult {
        lpm_id: raw.lpm_id,
        lpm_idx: raw.lpm_idx,
        num_hypotheses: raw.num_hypotheses,
        // SAFETY: every hypothesis belongs to the live result.
        hypotheses: hypotheses.iter().map(|h| unsafe { copy_hypothesis(h) }).collect(),
    }
}

/// Copy of the engine's module description.
///
/// # Safety
/// `raw.license_info` must be null or valid.
pub unsafe fn copy_module_info(raw: &LpmModuleInfo) -> ModuleInfo {
    ModuleInfo {
        name: fixed_str(&raw.name),
        id: raw.id,
        date: fixed_str(&raw.date),
        path: fixed_str(&raw.path),
        version: raw.version,
        subversion: raw.subversion,
        det_type: fixed_str(&raw.det_type),
        obj_type: fixed_str(&raw.obj_type),
        rcg_type: fixed_str(&raw.rcg_type),
        input_img_type: fixed_str(&raw.input_img_type),
        pxl_aspect_ratio: raw.pxl_aspect_ratio,
        lp_countries: fixed_str(&raw.lp_countries),
        lp_min_mean_max_width: raw.lp_min_mean_max_width,
        lp_min_mean_max_height: raw.lp_min_mean_max_height,
        lp_min_mean_max_rotation: raw.lp_min_mean_max_rotation,
        is_active: raw.is_active != 0,
        prop: raw.prop,
        // SAFETY: guaranteed by the caller.
        license: unsafe { raw.license_info.as_ref() }.map(LicenseInfo::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn fixed_str_stops_at_nul() {
        let mut chars = [0 as c_char; 16];
        for (dst, src) in chars.iter_mut().zip(b"LPM-800\0junk") {
            *dst = *src as c_char;
        }
        assert_eq!(fixed_str(&chars), "LPM-800");
        assert_eq!(fixed_str(&[0; 4]), "");
    }

    #[test]
    fn utf32_decodes_full_scalars() {
        let text: Vec<c_int> = "1AB Ř🚚".chars().map(|c| c as c_int).collect();
        assert_eq!(decode_utf32(&text), "1AB Ř🚚");
    }

    #[test]
    fn utf32_replaces_invalid_scalars() {
        assert_eq!(decode_utf32(&[0x41, 0xD800, -5, 0x42]), "A\u{FFFD}\u{FFFD}B");
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(to_c_string("ok").is_ok());
        assert!(matches!(to_c_string("a\0b"), Err(LpmError::InvalidArgument(_))));
    }

    #[test]
    fn empty_detection_result() {
        let raw = LpmDetResult {
            lpm_id: 800,
            lpm_idx: 0,
            num_detections: 0,
            detections: ptr::null_mut(),
            extras: ptr::null_mut(),
        };
        let result = unsafe { copy_det_result(&raw) };
        assert_eq!(result.lpm_id, 800);
        assert_eq!(result.num_detections, 0);
        assert!(result.detections.is_empty());
    }

    #[test]
    fn text_line_is_copied() {
        let mut characters: Vec<c_int> = "CZ".chars().map(|c| c as c_int).collect();
        let mut confidences = vec![0.9, 0.8];
        let raw = LpmTextLine {
            line_confidence: 0.85,
            length: 2,
            characters: characters.as_mut_ptr(),
            characters_confidences: confidences.as_mut_ptr(),
        };
        let line = unsafe { copy_text_line(&raw) };
        characters.fill(0);
        confidences.fill(0.0);
        assert_eq!(line.characters, "CZ");
        assert_eq!(line.character_confidences, vec![0.9, 0.8]);
        assert_eq!(line.length, 2);
    }

    #[test]
    fn missing_crop_is_none() {
        assert!(unsafe { copy_crop(&ERImage::empty()) }.is_none());
    }
}
