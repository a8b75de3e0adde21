use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat};
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::debug;

use crate::consts::DEFAULT_SIGMA_CLIP;
use crate::error::{RegistrationError, Result};
use crate::frame::{Frame, Stack};
use crate::preprocess::to_u8;

/// Extensions recognised as single-frame images.
pub const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff", "png"];

/// Load a grayscale image file into a Frame.
///
/// TIFF samples keep their stored values, including NaN, whatever the
/// sample type. Other formats go through `image` and integer formats map
/// to [0, 1].
pub fn load_frame(path: &Path, index: usize) -> Result<Frame> {
    if is_tiff(path) {
        return load_tiff_frame(path, index);
    }
    let img = image::open(path)?;
    let gray = img.to_luma32f();
    let (w, h) = gray.dimensions();
    let data = Array2::from_shape_vec((h as usize, w as usize), gray.into_raw())
        .map_err(|e| RegistrationError::InvalidInput(e.to_string()))?;
    Ok(Frame::new(data, index))
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "tif" | "tiff"))
        .unwrap_or(false)
}

/// First page of a single-sample TIFF as `f32`.
fn load_tiff_frame(path: &Path, index: usize) -> Result<Frame> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (w, h) = decoder.dimensions()?;
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(RegistrationError::InvalidInput(format!(
                "{}: expected a grayscale TIFF, found {other:?}",
                path.display()
            )))
        }
    }

    let samples: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F16(v) => v.into_iter().map(|x| x.to_f32()).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    };
    debug!(path = %path.display(), width = w, height = h, "Decoded TIFF frame");

    let data = Array2::from_shape_vec((h as usize, w as usize), samples)
        .map_err(|e| RegistrationError::InvalidInput(format!("{}: {e}", path.display())))?;
    Ok(Frame::new(data, index))
}

pub fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files of a directory, sorted so that `frame2` comes before
/// `frame10`.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_frame_file(p))
        .collect();
    files.sort_by(|a, b| {
        let an = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let bn = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        natural_cmp(&an, &bn)
    });
    Ok(files)
}

/// Every image in `dir`, in natural filename order, as one stack.
pub fn load_frame_dir(dir: &Path) -> Result<Stack> {
    let files = list_frame_files(dir)?;
    debug!(dir = %dir.display(), frames = files.len(), "Loading frame directory");
    let frames = files
        .iter()
        .enumerate()
        .map(|(i, path)| load_frame(path, i))
        .collect::<Result<Vec<_>>>()?;
    Stack::new(frames)
}

/// 8-bit PNG preview, contrast-stretched the same way frames are quantized
/// for feature detection. Missing samples render black.
pub fn save_preview_png(frame: &Frame, path: &Path) -> Result<()> {
    let (h, w) = frame.dim();
    let quantized = to_u8(&frame.data, None, DEFAULT_SIGMA_CLIP);
    let pixels: Vec<u8> = quantized.iter().copied().collect();
    let img = GrayImage::from_raw(w as u32, h as u32, pixels).ok_or_else(|| {
        RegistrationError::InvalidInput("preview buffer does not match frame size".into())
    })?;
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Compare strings treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_number(&mut a);
                let nb = take_number(&mut b);
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
