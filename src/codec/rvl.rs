//! RVL depth compression (run-length of zeros plus variable-length deltas).
//!
//! Values are coded as 3-bit nibble groups with a continuation bit, packed
//! eight nibbles to a little-endian 32-bit word. Each run is
//! `zeros, nonzeros, delta...` where deltas are zig-zag coded against the
//! previous nonzero value.

use rgbd_core::{DepthCodecType, Int32Frame};

use super::{read_i32_header, CodecError, DepthDecoder, DepthEncoder};

struct NibbleWriter {
    bytes: Vec<u8>,
    word: u32,
    nibbles: u32,
}

impl NibbleWriter {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            word: 0,
            nibbles: 0,
        }
    }

    fn push(&mut self, mut value: u32) {
        loop {
            let mut nibble = value & 0x7;
            value >>= 3;
            if value != 0 {
                nibble |= 0x8;
            }
            self.word = (self.word << 4) | nibble;
            self.nibbles += 1;
            if self.nibbles == 8 {
                self.bytes.extend_from_slice(&self.word.to_le_bytes());
                self.nibbles = 0;
                self.word = 0;
            }
            if value == 0 {
                break;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nibbles > 0 {
            let word = self.word << (4 * (8 - self.nibbles));
            self.bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.bytes
    }
}

struct NibbleReader<'a> {
    bytes: &'a [u8],
    position: usize,
    word: u32,
    nibbles: u32,
}

impl<'a> NibbleReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            word: 0,
            nibbles: 0,
        }
    }

    fn next(&mut self) -> Result<u32, CodecError> {
        let mut value = 0u32;
        let mut shift = 0u32;
        loop {
            if self.nibbles == 0 {
                let chunk = self
                    .bytes
                    .get(self.position..self.position + 4)
                    .ok_or_else(|| CodecError::Truncated("RVL stream ended early".to_string()))?;
                self.word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                self.position += 4;
                self.nibbles = 8;
            }
            let nibble = self.word >> 28;
            value |= (nibble & 0x7) << shift;
            self.word <<= 4;
            self.nibbles -= 1;
            shift += 3;
            if nibble & 0x8 == 0 {
                return Ok(value);
            }
            if shift > 30 {
                return Err(CodecError::InvalidInput(
                    "RVL value exceeds 32 bits".to_string(),
                ));
            }
        }
    }
}

pub fn compress(values: &[i32]) -> Vec<u8> {
    let mut writer = NibbleWriter::new(values.len());
    let mut previous = 0i32;
    let mut i = 0;

    while i < values.len() {
        let zeros = values[i..].iter().take_while(|v| **v == 0).count();
        writer.push(zeros as u32);
        i += zeros;

        let nonzeros = values[i..].iter().take_while(|v| **v != 0).count();
        writer.push(nonzeros as u32);
        for &current in &values[i..i + nonzeros] {
            let delta = current.wrapping_sub(previous);
            writer.push(((delta << 1) ^ (delta >> 31)) as u32);
            previous = current;
        }
        i += nonzeros;
    }

    writer.finish()
}

pub fn decompress(bytes: &[u8], pixel_count: usize) -> Result<Vec<i32>, CodecError> {
    let mut reader = NibbleReader::new(bytes);
    // Each stored nibble yields at most one nonzero value; zero runs grow on demand.
    let mut values = Vec::with_capacity(pixel_count.min(bytes.len() * 2));
    let mut previous = 0i32;

    while values.len() < pixel_count {
        let remaining = pixel_count - values.len();
        let zeros = reader.next()? as usize;
        if zeros > remaining {
            return Err(CodecError::InvalidInput(format!(
                "RVL zero run of {} exceeds remaining {} pixels",
                zeros, remaining
            )));
        }
        values.resize(values.len() + zeros, 0);

        let remaining = pixel_count - values.len();
        let nonzeros = reader.next()? as usize;
        if nonzeros > remaining {
            return Err(CodecError::InvalidInput(format!(
                "RVL value run of {} exceeds remaining {} pixels",
                nonzeros, remaining
            )));
        }
        for _ in 0..nonzeros {
            let positive = reader.next()?;
            let delta = ((positive >> 1) as i32) ^ -((positive & 1) as i32);
            let current = previous.wrapping_add(delta);
            values.push(current);
            previous = current;
        }
    }

    Ok(values)
}

/// Intra-only RVL depth encoder
pub struct RvlEncoder {
    width: usize,
    height: usize,
}

impl RvlEncoder {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl DepthEncoder for RvlEncoder {
    fn codec_type(&self) -> DepthCodecType {
        DepthCodecType::Rvl
    }

    fn encode(&mut self, depth_values: &[i32], _keyframe: bool) -> Result<Vec<u8>, CodecError> {
        super::check_pixel_count(depth_values, self.width, self.height)?;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.width as i32).to_le_bytes());
        bytes.extend_from_slice(&(self.height as i32).to_le_bytes());
        bytes.extend_from_slice(&compress(depth_values));
        Ok(bytes)
    }
}

#[derive(Default)]
pub struct RvlDecoder;

impl DepthDecoder for RvlDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<Int32Frame, CodecError> {
        let (header, payload) = read_i32_header::<2>(bytes)?;
        let (width, height) = super::frame_size(header[0], header[1])?;
        let values = decompress(payload, width * height)?;
        Int32Frame::new(width, height, values).map_err(|e| CodecError::InvalidInput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let values = vec![0, 0, 0, 1200, 1201, 1199, 0, 0, 5000, 65535, 70000, 0, 1];
        let bytes = compress(&values);
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(decompress(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn test_all_zero_frame_is_small() {
        let values = vec![0; 640 * 576];
        let bytes = compress(&values);
        assert!(bytes.len() <= 16);
        assert_eq!(decompress(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn test_negative_deltas() {
        let values = vec![3000, 10, 2999, -5, 7];
        let bytes = compress(&values);
        assert_eq!(decompress(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let values: Vec<i32> = (1..200).collect();
        let bytes = compress(&values);
        assert!(matches!(
            decompress(&bytes[..bytes.len() / 2], values.len()),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_encoder_decoder() {
        let values: Vec<i32> = (0..12).map(|i| if i % 4 == 0 { 0 } else { 800 + i }).collect();
        let mut encoder = RvlEncoder::new(4, 3);
        let bytes = encoder.encode(&values, false).unwrap();

        let frame = RvlDecoder.decode(&bytes).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.values(), values.as_slice());

        assert!(encoder.encode(&values[..5], true).is_err());
    }

    #[test]
    fn test_decoder_rejects_oversized_header() {
        let mut bytes = i32::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        assert!(matches!(RvlDecoder.decode(&bytes), Err(CodecError::InvalidInput(_))));

        let mut bytes = 0i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&4i32.to_le_bytes());
        assert!(matches!(RvlDecoder.decode(&bytes), Err(CodecError::InvalidInput(_))));
    }

    #[test]
    fn test_decoder_rejects_short_payload_for_header() {
        let mut bytes = 1024i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1024i32.to_le_bytes());
        bytes.extend_from_slice(&compress(&[7, 8, 9]));
        assert!(RvlDecoder.decode(&bytes).is_err());
    }
}
