use std::os::raw::{c_uchar, c_uint};

/// Colour model of an `ERImage`.
pub type ERImageColorModel = c_uint;

pub const ER_IMAGE_COLORMODEL_UNK: ERImageColorModel = 0;
pub const ER_IMAGE_COLORMODEL_GRAY: ERImageColorModel = 1;
pub const ER_IMAGE_COLORMODEL_YCBCR420: ERImageColorModel = 2;
pub const ER_IMAGE_COLORMODEL_BGR: ERImageColorModel = 3;

/// Element type of an `ERImage`.
pub type ERImageDataType = c_uint;

pub const ER_IMAGE_DATATYPE_UNK: ERImageDataType = 0;
pub const ER_IMAGE_DATATYPE_UCHAR: ERImageDataType = 1;
pub const ER_IMAGE_DATATYPE_FLOAT: ERImageDataType = 2;

/// Image structure of the auxiliary Eyedea image library (`er_image.h`).
///
/// The engine takes it by value, so every pointer inside must stay valid for
/// the whole call it is passed to.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ERImage {
    pub color_model: ERImageColorModel,
    pub data_type: ERImageDataType,
    /// Size of `data` in bytes.
    pub size: c_uint,
    pub width: c_uint,
    pub height: c_uint,
    /// Row length in bytes.
    pub step: c_uint,
    /// Bits per channel element.
    pub depth: c_uint,
    pub num_channels: c_uint,
    /// Non-zero when `data` was allocated by the image library itself.
    pub data_allocated: c_uchar,
    pub data: *mut c_uchar,
    /// `height` pointers to the start of every row inside `data`.
    pub row_data: *mut *mut c_uchar,
}

impl ERImage {
    /// An image with no pixel data (the engine reports disabled crops this way).
    pub const fn empty() -> Self {
        Self {
            color_model: ER_IMAGE_COLORMODEL_UNK,
            data_type: ER_IMAGE_DATATYPE_UNK,
            size: 0,
            width: 0,
            height: 0,
            step: 0,
            depth: 0,
            num_channels: 0,
            data_allocated: 0,
            data: std::ptr::null_mut(),
            row_data: std::ptr::null_mut(),
        }
    }
}
