use ndarray::{Array2, Array3, Axis};

use crate::error::{RegistrationError, Result};

/// A single 2-D intensity map.
/// Missing samples are stored as `f32::NAN`.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Position of this frame in its acquisition sequence
    pub index: usize,
}

impl Frame {
    pub fn new(data: Array2<f32>, index: usize) -> Self {
        Self { data, index }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn has_missing(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

/// An ordered, non-empty sequence of frames sharing one geometry.
#[derive(Clone, Debug)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    /// Build a stack, checking it is non-empty and every frame has the
    /// dimensions of the first one.
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        let first = frames.first().ok_or(RegistrationError::EmptySequence)?;
        let expected = first.dim();
        if let Some(bad) = frames.iter().find(|f| f.dim() != expected) {
            return Err(RegistrationError::ShapeMismatch {
                expected,
                found: bad.dim(),
            });
        }
        Ok(Self { frames })
    }

    /// Build a stack from a (frames, rows, cols) cube.
    pub fn from_array3(cube: Array3<f32>) -> Result<Self> {
        let frames = cube
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, plane)| Frame::new(plane.to_owned(), i))
            .collect();
        Self::new(frames)
    }

    pub fn to_array3(&self) -> Array3<f32> {
        let (h, w) = self.dim();
        let mut cube = Array3::<f32>::zeros((self.len(), h, w));
        for (mut plane, frame) in cube.axis_iter_mut(Axis(0)).zip(&self.frames) {
            plane.assign(&frame.data);
        }
        cube
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// (height, width) shared by every frame.
    pub fn dim(&self) -> (usize, usize) {
        self.frames[0].dim()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn has_missing(&self) -> bool {
        self.frames.iter().any(Frame::has_missing)
    }
}

/// A named stack, e.g. one element's intensity maps.
#[derive(Clone, Debug)]
pub struct Channel {
    pub name: String,
    pub stack: Stack,
}

impl Channel {
    pub fn new(name: impl Into<String>, stack: Stack) -> Self {
        Self {
            name: name.into(),
            stack,
        }
    }
}

/// Channels of one registration job, in source order.
#[derive(Clone, Debug, Default)]
pub struct ChannelSet {
    channels: Vec<Channel>,
}

impl ChannelSet {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn push(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// The channel that drives transform estimation.
    pub fn reference(&self, name: &str) -> Result<&Channel> {
        self.get(name)
            .ok_or_else(|| RegistrationError::UnknownChannel(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
