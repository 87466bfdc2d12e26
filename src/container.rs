//! RGBD container file format.
//!
//! Binary, little-endian layout written in a single forward pass, with the
//! header rewritten once the frames are done. Readers walk the frames front
//! to back:
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Header (64 bytes)        │  magic "RGBD", version, timecode scale, offsets
//! ├──────────────────────────┤
//! │ Metadata (bincode)       │  writing app, device type, track entries
//! ├──────────────────────────┤
//! │ Attachments (bincode)    │  named blobs (calibration.json, cover.png)
//! ├──────────────────────────┤
//! │ Frame 0                  │  track, flags, timestamp, length, payload
//! │ Frame 1                  │
//! │ ...                      │
//! ├──────────────────────────┤
//! │ Footer (32 bytes)        │  magic "RGBF", frame count, duration
//! └──────────────────────────┘
//! ```

use std::io::{self, Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

/// Magic bytes for the file header
pub const RGBD_MAGIC: [u8; 4] = *b"RGBD";

/// Magic bytes for the file footer
pub const RGBD_FOOTER_MAGIC: [u8; 4] = *b"RGBF";

/// Current format version
pub const RGBD_VERSION: u16 = 1;

/// Header size in bytes (fixed)
pub const HEADER_SIZE: usize = 64;

/// Footer size in bytes (fixed)
pub const FOOTER_SIZE: usize = 32;

/// Fixed part of a frame before its payload
pub const FRAME_HEADER_SIZE: usize = 4 + 1 + 8 + 4;

/// Frame flags
pub const FRAME_FLAG_KEYFRAME: u8 = 0x01;

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn bincode_error(e: bincode::Error) -> io::Error {
    invalid_data(format!("Invalid container block: {}", e))
}

/// Read a length-prefixed block without trusting the length for allocation
fn read_block<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(len).read_to_end(&mut data)?;
    if data.len() as u64 != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Block truncated: {} of {} bytes", data.len(), len),
        ));
    }
    Ok(data)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    read_u64(buf, at) as i64
}

/// File header (64 bytes fixed size)
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    pub version: u16,
    pub flags: u16,
    /// Nanoseconds per timestamp tick
    pub timecode_scale_ns: u64,
    pub metadata_offset: u64,
    pub metadata_len: u32,
    pub attachments_offset: u64,
    pub attachments_len: u32,
    pub frames_offset: u64,
}

impl ContainerHeader {
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&RGBD_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timecode_scale_ns.to_le_bytes());
        buf[16..24].copy_from_slice(&self.metadata_offset.to_le_bytes());
        buf[24..28].copy_from_slice(&self.metadata_len.to_le_bytes());
        buf[28..36].copy_from_slice(&self.attachments_offset.to_le_bytes());
        buf[36..40].copy_from_slice(&self.attachments_len.to_le_bytes());
        buf[40..48].copy_from_slice(&self.frames_offset.to_le_bytes());
        // Remaining 16 bytes are reserved (already zeroed)

        writer.write_all(&buf)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        if buf[0..4] != RGBD_MAGIC {
            return Err(invalid_data("Invalid RGBD file: bad magic bytes"));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > RGBD_VERSION {
            return Err(invalid_data(format!(
                "Unsupported RGBD version: {}",
                version
            )));
        }

        Ok(Self {
            version,
            flags: u16::from_le_bytes([buf[6], buf[7]]),
            timecode_scale_ns: read_u64(&buf, 8),
            metadata_offset: read_u64(&buf, 16),
            metadata_len: read_u32(&buf, 24),
            attachments_offset: read_u64(&buf, 28),
            attachments_len: read_u32(&buf, 36),
            frames_offset: read_u64(&buf, 40),
        })
    }
}

/// File footer (32 bytes fixed size)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerFooter {
    pub frame_count: u32,
    /// Timestamp of the last frame
    pub duration: i64,
}

impl ContainerFooter {
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; FOOTER_SIZE];

        buf[0..4].copy_from_slice(&RGBD_FOOTER_MAGIC);
        buf[4..8].copy_from_slice(&self.frame_count.to_le_bytes());
        buf[8..16].copy_from_slice(&self.duration.to_le_bytes());
        // Remaining 16 bytes are reserved

        writer.write_all(&buf)
    }

    /// Read footer (assumes reader is positioned at footer start)
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;

        if buf[0..4] != RGBD_FOOTER_MAGIC {
            return Err(invalid_data("Invalid RGBD footer: bad magic bytes"));
        }

        Ok(Self {
            frame_count: read_u32(&buf, 4),
            duration: read_i64(&buf, 8),
        })
    }
}

/// How a track's payloads are to be interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackKind {
    Video { width: u32, height: u32 },
    Audio { sampling_frequency: f64, channels: u32 },
    /// Fixed-layout sensor samples
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub number: u32,
    pub name: String,
    pub codec_id: String,
    pub kind: TrackKind,
    /// Nanoseconds between frames, 0 when irregular
    pub default_duration_ns: u64,
    pub codec_private: Option<Vec<u8>>,
}

/// Segment-level metadata stored after the header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub writing_app: String,
    /// Integer camera device tag of the calibration attachment
    pub camera_device_type: i32,
    pub tracks: Vec<TrackEntry>,
}

impl ContainerInfo {
    pub fn track(&self, number: u32) -> Option<&TrackEntry> {
        self.tracks.iter().find(|t| t.number == number)
    }

    pub fn track_by_name(&self, name: &str) -> Option<&TrackEntry> {
        self.tracks.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Frame data (variable size)
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerFrame {
    pub track_number: u32,
    pub flags: u8,
    pub timestamp: i64,
    pub data: Vec<u8>,
}

impl ContainerFrame {
    pub fn new(track_number: u32, timestamp: i64, keyframe: bool, data: Vec<u8>) -> Self {
        Self {
            track_number,
            flags: if keyframe { FRAME_FLAG_KEYFRAME } else { 0 },
            timestamp,
            data,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & FRAME_FLAG_KEYFRAME != 0
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let len = u32::try_from(self.data.len())
            .map_err(|_| invalid_data(format!("Frame too large: {} bytes", self.data.len())))?;
        writer.write_all(&self.track_number.to_le_bytes())?;
        writer.write_all(&[self.flags])?;
        writer.write_all(&self.timestamp.to_le_bytes())?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&self.data)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let track_number = read_u32(&buf, 0);
        let flags = buf[4];
        let timestamp = read_i64(&buf, 5);
        let data = read_block(reader, read_u32(&buf, 13) as u64)?;

        Ok(Self {
            track_number,
            flags,
            timestamp,
            data,
        })
    }
}

/// Writer for RGBD containers
pub struct ContainerWriter<W: Write + Seek> {
    writer: W,
    header: ContainerHeader,
    frame_count: u32,
    last_timestamp: i64,
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Write the header, metadata and attachments; frames follow
    pub fn new(
        mut writer: W,
        timecode_scale_ns: u64,
        info: &ContainerInfo,
        attachments: &[Attachment],
    ) -> io::Result<Self> {
        let metadata = bincode::serialize(info).map_err(bincode_error)?;
        let attachment_block = bincode::serialize(attachments).map_err(bincode_error)?;

        let metadata_offset = HEADER_SIZE as u64;
        let attachments_offset = metadata_offset + metadata.len() as u64;
        let frames_offset = attachments_offset + attachment_block.len() as u64;

        let header = ContainerHeader {
            version: RGBD_VERSION,
            flags: 0,
            timecode_scale_ns,
            metadata_offset,
            metadata_len: metadata.len() as u32,
            attachments_offset,
            attachments_len: attachment_block.len() as u32,
            frames_offset,
        };

        header.write(&mut writer)?;
        writer.write_all(&metadata)?;
        writer.write_all(&attachment_block)?;

        Ok(Self {
            writer,
            header,
            frame_count: 0,
            last_timestamp: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &ContainerFrame) -> io::Result<()> {
        frame.write(&mut self.writer)?;
        self.frame_count += 1;
        self.last_timestamp = frame.timestamp;

        Ok(())
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Write the footer, rewrite the header, and hand back the sink
    pub fn finish(mut self) -> io::Result<W> {
        let footer = ContainerFooter {
            frame_count: self.frame_count,
            duration: self.last_timestamp,
        };
        footer.write(&mut self.writer)?;

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;

        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reader for RGBD containers
pub struct ContainerReader<R: Read + Seek> {
    reader: R,
    header: ContainerHeader,
    footer: ContainerFooter,
    info: ContainerInfo,
    attachments: Vec<Attachment>,
    current_frame: u32,
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn open(mut reader: R) -> io::Result<Self> {
        let header = ContainerHeader::read(&mut reader)?;

        reader.seek(SeekFrom::Start(header.metadata_offset))?;
        let metadata = read_block(&mut reader, header.metadata_len as u64)?;
        let info: ContainerInfo = bincode::deserialize(&metadata).map_err(bincode_error)?;

        reader.seek(SeekFrom::Start(header.attachments_offset))?;
        let attachment_block = read_block(&mut reader, header.attachments_len as u64)?;
        let attachments: Vec<Attachment> =
            bincode::deserialize(&attachment_block).map_err(bincode_error)?;

        reader.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let footer = ContainerFooter::read(&mut reader)?;

        reader.seek(SeekFrom::Start(header.frames_offset))?;

        Ok(Self {
            reader,
            header,
            footer,
            info,
            attachments,
            current_frame: 0,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn footer(&self) -> &ContainerFooter {
        &self.footer
    }

    pub fn info(&self) -> &ContainerInfo {
        &self.info
    }

    pub fn attachment(&self, file_name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.file_name == file_name)
    }

    /// Read the next frame, returns None after the last one
    pub fn read_frame(&mut self) -> io::Result<Option<ContainerFrame>> {
        if self.current_frame >= self.footer.frame_count {
            return Ok(None);
        }

        let frame = ContainerFrame::read(&mut self.reader)?;
        self.current_frame += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn info() -> ContainerInfo {
        ContainerInfo {
            writing_app: "test".to_string(),
            camera_device_type: 2,
            tracks: vec![
                TrackEntry {
                    number: 1,
                    name: "COLOR".to_string(),
                    codec_id: "V_VP8".to_string(),
                    kind: TrackKind::Video {
                        width: 640,
                        height: 480,
                    },
                    default_duration_ns: 33_333_333,
                    codec_private: None,
                },
                TrackEntry {
                    number: 4,
                    name: "ACCELERATION".to_string(),
                    codec_id: "S_VEC3".to_string(),
                    kind: TrackKind::Data,
                    default_duration_ns: 0,
                    codec_private: Some(vec![1, 2]),
                },
            ],
        }
    }

    fn attachments() -> Vec<Attachment> {
        vec![Attachment {
            file_name: "calibration.json".to_string(),
            mime_type: "application/json".to_string(),
            data: br#"{"calibrationType":"undistorted"}"#.to_vec(),
        }]
    }

    fn write_sample(frame_count: i64) -> Vec<u8> {
        let mut writer =
            ContainerWriter::new(Cursor::new(Vec::new()), 1000, &info(), &attachments()).unwrap();
        for i in 0..frame_count {
            let keyframe = i % 3 == 0;
            writer
                .write_frame(&ContainerFrame::new(1, i * 100, keyframe, vec![i as u8; 10]))
                .unwrap();
            writer
                .write_frame(&ContainerFrame::new(4, i * 100 + 50, false, vec![0xAA; 12]))
                .unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = ContainerHeader {
            version: 1,
            flags: 0,
            timecode_scale_ns: 1000,
            metadata_offset: 64,
            metadata_len: 100,
            attachments_offset: 164,
            attachments_len: 50,
            frames_offset: 214,
        };

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let read_header = ContainerHeader::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_header, header);
    }

    #[test]
    fn test_footer_roundtrip() {
        let footer = ContainerFooter {
            frame_count: 10000,
            duration: 60_000_000,
        };

        let mut buf = Vec::new();
        footer.write(&mut buf).unwrap();
        assert_eq!(buf.len(), FOOTER_SIZE);

        let read_footer = ContainerFooter::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_footer, footer);
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = ContainerFrame::new(2, 1000, true, vec![1, 2, 3, 4, 5]);

        let mut buf = Vec::new();
        frame.write(&mut buf).unwrap();
        assert_eq!(buf.len(), FRAME_HEADER_SIZE + 5);

        let read_frame = ContainerFrame::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_frame, frame);
        assert!(read_frame.is_keyframe());
    }

    #[test]
    fn test_writer_reader_roundtrip() {
        let bytes = write_sample(10);
        let mut reader = ContainerReader::open(Cursor::new(bytes)).unwrap();

        assert_eq!(reader.info(), &info());
        assert_eq!(reader.attachment("calibration.json"), attachments().first());
        assert!(reader.attachment("cover.png").is_none());
        assert_eq!(reader.header().timecode_scale_ns, 1000);
        assert_eq!(reader.footer().frame_count, 20);
        assert_eq!(reader.footer().duration, 950);

        let mut count = 0;
        while let Some(frame) = reader.read_frame().unwrap() {
            if frame.track_number == 1 {
                assert_eq!(frame.data, vec![(count / 2) as u8; 10]);
            }
            count += 1;
        }
        assert_eq!(count, 20);
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut bytes = write_sample(1);
        bytes[0] = b'X';
        let err = ContainerReader::open(Cursor::new(bytes)).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let mut bytes = write_sample(3);
        bytes.truncate(bytes.len() - 5);
        assert!(ContainerReader::open(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_oversized_frame_length_is_rejected() {
        let mut buf = Vec::new();
        ContainerFrame::new(1, 0, true, vec![1, 2, 3]).write(&mut buf).unwrap();
        // Claim a 4 GiB payload behind a 3-byte body.
        buf[13..17].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = ContainerFrame::read(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
