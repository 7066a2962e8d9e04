use ndarray::ArrayView3;

use crate::shared::encode_error::EncodeError;
use crate::shared::frame::RGB_CHANNELS;

/// Semi-planar YUV 4:2:0 picture: a full-resolution luma plane followed by
/// interleaved U,V pairs, one pair per 2x2 pixel block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YuvBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl YuvBuffer {
    /// Total byte length of a `width` x `height` 4:2:0 picture.
    pub fn byte_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 3 / 2
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.luma_len()]
    }

    pub fn chroma(&self) -> &[u8] {
        &self.data[self.luma_len()..]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn luma_len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Converts packed RGB24 to semi-planar YUV 4:2:0 using BT.601 limited-range
/// integer coefficients.
///
/// Chroma for each 2x2 block comes from its top-left pixel, selected by row and
/// column parity. Both dimensions must be even so the chroma plane is exactly
/// `width * height / 2` bytes.
pub fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Result<YuvBuffer, EncodeError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(EncodeError::configuration(format!(
            "cannot subsample {width}x{height} to 4:2:0, dimensions must be even and non-zero"
        )));
    }
    let w = width as usize;
    let h = height as usize;
    let pixels = ArrayView3::from_shape((h, w, RGB_CHANNELS), rgb).map_err(|_| {
        EncodeError::configuration(format!(
            "pixel buffer of {} bytes does not match {width}x{height} RGB",
            rgb.len()
        ))
    })?;

    let luma_len = w * h;
    let mut data = vec![0u8; YuvBuffer::byte_len(width, height)];
    let (luma, chroma) = data.split_at_mut(luma_len);
    let mut chroma_pos = 0;

    for row in 0..h {
        for col in 0..w {
            let r = pixels[[row, col, 0]] as i32;
            let g = pixels[[row, col, 1]] as i32;
            let b = pixels[[row, col, 2]] as i32;

            luma[row * w + col] = clamp_u8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16);

            if row % 2 == 0 && col % 2 == 0 {
                chroma[chroma_pos] = clamp_u8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128);
                chroma[chroma_pos + 1] = clamp_u8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128);
                chroma_pos += 2;
            }
        }
    }
    debug_assert_eq!(chroma_pos, chroma.len());

    Ok(YuvBuffer {
        data,
        width,
        height,
    })
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
