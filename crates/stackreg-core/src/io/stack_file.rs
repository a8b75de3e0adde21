//! `.stk` stack files: a fixed 128-byte header followed by little-endian
//! `f32` samples, frame after frame, row-major.
//!
//! | offset | size | field               |
//! |--------|------|---------------------|
//! | 0      | 8    | magic `STACKREG`    |
//! | 8      | 4    | format version       |
//! | 12     | 4    | frame count          |
//! | 16     | 4    | height               |
//! | 20     | 4    | width                |
//! | 24     | 32   | channel name         |
//! | 56     | 32   | unit label           |
//! | 88     | 32   | reference channel    |
//! | 120    | 8    | reserved (zero)      |

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::consts::{STACK_FORMAT_VERSION, STACK_HEADER_SIZE, STACK_MAGIC, STACK_STRING_FIELD};
use crate::error::{RegistrationError, Result};
use crate::frame::{Frame, Stack};

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackHeader {
    pub version: u32,
    pub frame_count: u32,
    pub height: u32,
    pub width: u32,
    pub channel: String,
    pub units: String,
    pub reference_channel: String,
}

impl StackHeader {
    /// Header describing `stack` with the given provenance labels.
    pub fn for_stack(stack: &Stack, channel: &str, units: &str, reference_channel: &str) -> Self {
        let (h, w) = stack.dim();
        Self {
            version: STACK_FORMAT_VERSION,
            frame_count: stack.len() as u32,
            height: h as u32,
            width: w as u32,
            channel: channel.to_string(),
            units: units.to_string(),
            reference_channel: reference_channel.to_string(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count as usize
    }

    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }

    pub fn frame_byte_size(&self) -> usize {
        self.height as usize * self.width as usize * SAMPLE_BYTES
    }

    fn data_byte_size(&self) -> Option<usize> {
        (self.height as usize)
            .checked_mul(self.width as usize)?
            .checked_mul(self.frame_count as usize)?
            .checked_mul(SAMPLE_BYTES)
    }
}

/// Memory-mapped `.stk` reader.
pub struct StackFileReader {
    mmap: Mmap,
    pub header: StackHeader,
}

impl StackFileReader {
    /// Open a stack file, validating its header and length.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if (file.metadata()?.len() as usize) < STACK_HEADER_SIZE {
            return Err(RegistrationError::InvalidStackFile(
                "File too small for stack header".into(),
            ));
        }
        let mmap = unsafe { Mmap::map(&file)? };

        if &mmap[0..STACK_MAGIC.len()] != STACK_MAGIC {
            return Err(RegistrationError::InvalidStackFile(
                "Missing STACKREG magic".into(),
            ));
        }

        let header = parse_header(&mmap[..STACK_HEADER_SIZE])?;
        if header.version != STACK_FORMAT_VERSION {
            return Err(RegistrationError::InvalidStackFile(format!(
                "Unsupported format version {}",
                header.version
            )));
        }
        if header.frame_count == 0 || header.height == 0 || header.width == 0 {
            return Err(RegistrationError::InvalidStackFile(format!(
                "Empty stack: {} frames of {}x{}",
                header.frame_count, header.width, header.height
            )));
        }

        let expected = header
            .data_byte_size()
            .and_then(|n| n.checked_add(STACK_HEADER_SIZE))
            .ok_or_else(|| RegistrationError::InvalidStackFile("Stack dimensions too large".into()))?;
        if mmap.len() < expected {
            return Err(RegistrationError::InvalidStackFile(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected,
                mmap.len()
            )));
        }

        debug!(
            path = %path.display(),
            frames = header.frame_count,
            height = header.height,
            width = header.width,
            "Opened stack file"
        );
        Ok(Self { mmap, header })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count()
    }

    pub fn read_frame(&self, index: usize) -> Result<Frame> {
        let count = self.frame_count();
        if index >= count {
            return Err(RegistrationError::InvalidInput(format!(
                "frame index {index} out of range ({count} frames)"
            )));
        }
        let size = self.header.frame_byte_size();
        let offset = STACK_HEADER_SIZE + index * size;
        let raw = &self.mmap[offset..offset + size];

        let mut samples = vec![0.0f32; size / SAMPLE_BYTES];
        LittleEndian::read_f32_into(raw, &mut samples);
        let data = Array2::from_shape_vec(self.header.dim(), samples)
            .map_err(|e| RegistrationError::InvalidStackFile(e.to_string()))?;
        Ok(Frame::new(data, index))
    }

    pub fn frames(&self) -> impl Iterator<Item = Result<Frame>> + '_ {
        (0..self.frame_count()).map(move |i| self.read_frame(i))
    }

    pub fn read_stack(&self) -> Result<Stack> {
        Stack::new(self.frames().collect::<Result<Vec<_>>>()?)
    }
}

fn parse_header(buf: &[u8]) -> Result<StackHeader> {
    let mut cursor = std::io::Cursor::new(&buf[STACK_MAGIC.len()..]);

    let version = cursor.read_u32::<LittleEndian>()?;
    let frame_count = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_u32::<LittleEndian>()?;
    let width = cursor.read_u32::<LittleEndian>()?;

    let strings = 24;
    let field = |i: usize| {
        let start = strings + i * STACK_STRING_FIELD;
        read_fixed_string(&buf[start..start + STACK_STRING_FIELD])
    };

    Ok(StackHeader {
        version,
        frame_count,
        height,
        width,
        channel: field(0),
        units: field(1),
        reference_channel: field(2),
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).trim().to_string()
}

/// Buffered `.stk` writer. An existing file at the target path is replaced.
pub struct StackFileWriter {
    writer: BufWriter<File>,
    header: StackHeader,
    frames_written: u32,
}

impl StackFileWriter {
    /// Create the file and write the header.
    pub fn create(path: &Path, header: &StackHeader) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        Ok(Self {
            writer,
            header: header.clone(),
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dim() != self.header.dim() {
            return Err(RegistrationError::ShapeMismatch {
                expected: self.header.dim(),
                found: frame.dim(),
            });
        }
        if self.frames_written >= self.header.frame_count {
            return Err(RegistrationError::InvalidStackFile(format!(
                "header declares {} frames",
                self.header.frame_count
            )));
        }
        for &v in frame.data.iter() {
            self.writer.write_f32::<LittleEndian>(v)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush, checking every declared frame was written.
    pub fn finalize(mut self) -> Result<()> {
        if self.frames_written != self.header.frame_count {
            return Err(RegistrationError::InvalidStackFile(format!(
                "wrote {} of {} frames",
                self.frames_written, self.header.frame_count
            )));
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn write_header(w: &mut impl Write, header: &StackHeader) -> Result<()> {
    w.write_all(STACK_MAGIC)?;
    w.write_u32::<LittleEndian>(header.version)?;
    w.write_u32::<LittleEndian>(header.frame_count)?;
    w.write_u32::<LittleEndian>(header.height)?;
    w.write_u32::<LittleEndian>(header.width)?;
    write_fixed_string(w, &header.channel, STACK_STRING_FIELD)?;
    write_fixed_string(w, &header.units, STACK_STRING_FIELD)?;
    write_fixed_string(w, &header.reference_channel, STACK_STRING_FIELD)?;
    // Reserved
    w.write_all(&[0u8; 8])?;

    debug_assert_eq!(8 + 4 * 4 + 3 * STACK_STRING_FIELD + 8, STACK_HEADER_SIZE);
    Ok(())
}

/// Write at most `len` bytes of `s`, cut on a character boundary, NUL padded.
fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let mut end = s.len().min(len);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    w.write_all(&s.as_bytes()[..end])?;
    for _ in end..len {
        w.write_all(&[0u8])?;
    }
    Ok(())
}

/// Write a whole stack in one call.
pub fn write_stack_file(path: &Path, stack: &Stack, header: &StackHeader) -> Result<()> {
    let mut writer = StackFileWriter::create(path, header)?;
    for frame in stack.iter() {
        writer.write_frame(frame)?;
    }
    writer.finalize()
}
