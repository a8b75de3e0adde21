//! Stack sources and sinks.

pub mod image_io;
pub mod stack_file;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RegistrationError, Result};
use crate::frame::{Channel, ChannelSet, Stack};
use crate::pipeline::RegisteredChannels;

use self::image_io::{list_frame_files, load_frame_dir};
use self::stack_file::{write_stack_file, StackFileReader, StackHeader};

pub const STACK_FILE_EXTENSION: &str = "stk";

/// Supplies the stacks of one registration job.
pub trait StackSource {
    /// Channel names available in this job, in a stable order.
    fn channel_names(&self) -> Vec<String>;

    fn channel_stack(&self, name: &str) -> Result<Stack>;

    /// Stack of the channel that drives estimation.
    fn reference_stack(&self, name: &str) -> Result<Stack> {
        self.channel_stack(name)
    }

    /// Load every channel.
    fn load_channels(&self) -> Result<ChannelSet> {
        let mut set = ChannelSet::default();
        for name in self.channel_names() {
            let stack = self.channel_stack(&name)?;
            set.push(Channel::new(name, stack));
        }
        Ok(set)
    }
}

/// Stores registered stacks, replacing anything stored before for the same
/// channel.
pub trait StackSink {
    fn write_registered(
        &self,
        channel: &str,
        stack: &Stack,
        units: &str,
        reference_channel: &str,
    ) -> Result<()>;

    fn write_all(&self, registered: &RegisteredChannels) -> Result<()> {
        for channel in registered.channels.iter() {
            self.write_registered(
                &channel.name,
                &channel.stack,
                &registered.units,
                &registered.reference_channel,
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum ChannelLocation {
    FrameDir(PathBuf),
    StackFile(PathBuf),
}

/// A job directory holding one entry per channel: either a sub-directory of
/// image frames or a `.stk` file. The entry name is the channel name.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
    channels: Vec<(String, ChannelLocation)>,
}

impl DirectorySource {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(RegistrationError::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut channels = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            if path.is_dir() {
                if !list_frame_files(&path)?.is_empty() {
                    channels.push((stem, ChannelLocation::FrameDir(path)));
                }
            } else if path.extension().and_then(|e| e.to_str()) == Some(STACK_FILE_EXTENSION) {
                channels.push((stem, ChannelLocation::StackFile(path)));
            }
        }
        channels.sort_by(|a, b| a.0.cmp(&b.0));

        if channels.is_empty() {
            return Err(RegistrationError::InvalidInput(format!(
                "no channels found in {}",
                root.display()
            )));
        }
        debug!(root = %root.display(), channels = channels.len(), "Opened job directory");
        Ok(Self {
            root: root.to_path_buf(),
            channels,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StackSource for DirectorySource {
    fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|(n, _)| n.clone()).collect()
    }

    fn channel_stack(&self, name: &str) -> Result<Stack> {
        let (_, location) = self
            .channels
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| RegistrationError::UnknownChannel(name.to_string()))?;
        match location {
            ChannelLocation::FrameDir(dir) => load_frame_dir(dir),
            ChannelLocation::StackFile(path) => StackFileReader::open(path)?.read_stack(),
        }
    }
}

/// Writes `<dir>/<channel>.stk` per channel.
#[derive(Clone, Debug)]
pub struct StackFileSink {
    dir: PathBuf,
}

impl StackFileSink {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{channel}.{STACK_FILE_EXTENSION}"))
    }
}

impl StackSink for StackFileSink {
    fn write_registered(
        &self,
        channel: &str,
        stack: &Stack,
        units: &str,
        reference_channel: &str,
    ) -> Result<()> {
        let path = self.path_for(channel);
        let header = StackHeader::for_stack(stack, channel, units, reference_channel);
        write_stack_file(&path, stack, &header)?;
        info!(channel, path = %path.display(), frames = stack.len(), "Wrote registered stack");
        Ok(())
    }
}
