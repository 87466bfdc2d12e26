//! Cover image generation.
//!
//! The cover is the largest centered square of a color frame, sampled down
//! to at most [`COVER_SIZE`] pixels per side and stored as an RGB PNG.

use rgbd_core::YuvFrame;

use crate::codec::CodecError;
use crate::error::{RecordError, Result};

pub const COVER_SIZE: usize = 600;

/// Centered square crop, nearest-sampled to `min(side, COVER_SIZE)`
pub fn cover_sized(frame: &YuvFrame) -> Result<YuvFrame> {
    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
        return Err(RecordError::Encode(CodecError::InvalidInput(
            "cannot build a cover from an empty frame".to_string(),
        )));
    }
    let side = width.min(height);
    let col_start = (width - side) / 2;
    let row_start = (height - side) / 2;
    let size = side.min(COVER_SIZE);

    let mut y = vec![0u8; size * size];
    for row in 0..size {
        let src_row = row_start + row * side / size;
        for col in 0..size {
            let src_col = col_start + col * side / size;
            y[row * size + col] = frame.y_channel()[src_row * width + src_col];
        }
    }

    let uv_size = size / 2;
    let (uv_width, uv_height) = (width / 2, height / 2);
    let mut u = vec![128u8; uv_size * uv_size];
    let mut v = vec![128u8; uv_size * uv_size];
    if uv_width > 0 && uv_height > 0 {
        for row in 0..uv_size {
            let src_row = ((row_start + 2 * row * side / size) / 2).min(uv_height - 1);
            for col in 0..uv_size {
                let src_col = ((col_start + 2 * col * side / size) / 2).min(uv_width - 1);
                u[row * uv_size + col] = frame.u_channel()[src_row * uv_width + src_col];
                v[row * uv_size + col] = frame.v_channel()[src_row * uv_width + src_col];
            }
        }
    }

    Ok(YuvFrame::new(size, size, y, u, v)?)
}

/// Interleaved 8-bit RGB using the integer BT.601 approximation
pub fn yuv_to_rgb(frame: &YuvFrame) -> Vec<u8> {
    let (width, height) = (frame.width(), frame.height());
    let uv_width = width / 2;
    let uv_last = frame.u_channel().len().saturating_sub(1);
    let mut rgb = Vec::with_capacity(width * height * 3);

    for row in 0..height {
        for col in 0..width {
            let y = frame.y_channel()[row * width + col] as i32;
            let uv_index = ((row / 2) * uv_width + col / 2).min(uv_last);
            let u = frame.u_channel().get(uv_index).copied().unwrap_or(128) as i32 - 128;
            let v = frame.v_channel().get(uv_index).copied().unwrap_or(128) as i32 - 128;

            let r = y + ((351 * v) >> 8);
            let g = y - ((179 * v + 86 * u) >> 8);
            let b = y + ((443 * u) >> 8);
            rgb.push(r.clamp(0, 255) as u8);
            rgb.push(g.clamp(0, 255) as u8);
            rgb.push(b.clamp(0, 255) as u8);
        }
    }
    rgb
}

fn png_error(e: png::EncodingError) -> RecordError {
    RecordError::Encode(CodecError::Backend(format!("PNG encode error: {}", e)))
}

/// Encode `frame` as a cover PNG
pub fn create_cover_png_bytes(frame: &YuvFrame) -> Result<Vec<u8>> {
    let cover = cover_sized(frame)?;
    let rgb = yuv_to_rgb(&cover);

    let mut bytes = Vec::new();
    {
        let (width, height) = (cover.width() as u32, cover.height() as u32);
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(png_error)?;
        writer.write_image_data(&rgb).map_err(png_error)?;
        writer.finish().map_err(png_error)?;
    }
    Ok(bytes)
}
