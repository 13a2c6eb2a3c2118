use chrono::Local;
use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::writer::{output_path, FrameWriter, WriterError, WriterFactory};
use crate::app::CaptureConfig;
use crate::capture::{Frame, FrameSize, GrabError, Region};

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot {slot}: frame is {actual} but the recording is {expected}, frame skipped")]
    DimensionMismatch {
        slot: usize,
        expected: FrameSize,
        actual: FrameSize,
    },

    #[error("slot {0} has no recording yet")]
    Unbound(usize),

    #[error("slot {0} is closed")]
    Closed(usize),

    #[error(transparent)]
    Grab(#[from] GrabError),

    #[error(transparent)]
    Writer(#[from] WriterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Active,
    Closed,
}

enum Binding {
    Empty,
    Active(Box<dyn FrameWriter>),
    Closed { path: PathBuf, size: FrameSize },
}

/// A recorder bound to one ordinal position of the ordered region list.
pub struct RecorderSlot {
    index: usize,
    binding: Binding,
}

impl RecorderSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            binding: Binding::Empty,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SlotState {
        match self.binding {
            Binding::Empty => SlotState::Empty,
            Binding::Active(_) => SlotState::Active,
            Binding::Closed { .. } => SlotState::Closed,
        }
    }

    /// Dimensions the slot's writer was created with, if it ever was.
    pub fn size(&self) -> Option<FrameSize> {
        match &self.binding {
            Binding::Empty => None,
            Binding::Active(writer) => Some(writer.size()),
            Binding::Closed { size, .. } => Some(*size),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.binding {
            Binding::Empty => None,
            Binding::Active(writer) => Some(writer.path()),
            Binding::Closed { path, .. } => Some(path),
        }
    }

    /// Creates the writer on first use, sized from `region`.
    ///
    /// Later calls keep the original writer whatever the region's size.
    pub fn bind(
        &mut self,
        region: &Region,
        config: &CaptureConfig,
        factory: &mut dyn WriterFactory,
    ) -> Result<(), SlotError> {
        match self.binding {
            Binding::Active(_) => Ok(()),
            Binding::Closed { .. } => Err(SlotError::Closed(self.index)),
            Binding::Empty => {
                let size = region.size().scaled(config.scale_factor);
                let path = output_path(&config.output_prefix, self.index, Local::now());
                let writer = factory.create(&path, size, config.fps)?;
                info!(
                    "Recording to {} ({} @ {} FPS)",
                    path.display(),
                    size,
                    config.fps
                );
                self.binding = Binding::Active(writer);
                Ok(())
            }
        }
    }

    /// Appends a frame; frames not matching the bound size are rejected.
    pub fn write(&mut self, frame: &Frame) -> Result<(), SlotError> {
        let writer = match &mut self.binding {
            Binding::Active(writer) => writer,
            Binding::Empty => return Err(SlotError::Unbound(self.index)),
            Binding::Closed { .. } => return Err(SlotError::Closed(self.index)),
        };

        let expected = writer.size();
        if frame.size != expected {
            return Err(SlotError::DimensionMismatch {
                slot: self.index,
                expected,
                actual: frame.size,
            });
        }

        writer.append(frame)?;
        Ok(())
    }

    /// Finishes the recording. No-op for empty or already closed slots.
    ///
    /// The slot is closed even if the writer fails to finish.
    pub fn close(&mut self) -> Result<bool, SlotError> {
        let Binding::Active(writer) = &mut self.binding else {
            return Ok(false);
        };

        let result = writer.finish();
        let path = writer.path().to_path_buf();
        let size = writer.size();
        self.binding = Binding::Closed { path, size };
        result?;
        Ok(true)
    }
}

impl Drop for RecorderSlot {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a fake writer has seen, shared with the test.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct WriterLog {
        pub path: PathBuf,
        pub size: FrameSize,
        pub fps: u32,
        pub frames: Vec<Frame>,
        pub finished: u32,
    }

    pub(crate) type Logs = Arc<Mutex<Vec<WriterLog>>>;

    pub(crate) struct FakeWriter {
        logs: Logs,
        index: usize,
        path: PathBuf,
        size: FrameSize,
        fail_finish: bool,
        on_append: Option<Arc<dyn Fn() + Send + Sync>>,
    }

    impl FrameWriter for FakeWriter {
        fn path(&self) -> &Path {
            &self.path
        }

        fn size(&self) -> FrameSize {
            self.size
        }

        fn append(&mut self, frame: &Frame) -> Result<(), WriterError> {
            self.logs.lock().unwrap()[self.index].frames.push(frame.clone());
            if let Some(hook) = &self.on_append {
                hook();
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<(), WriterError> {
            self.logs.lock().unwrap()[self.index].finished += 1;
            if self.fail_finish {
                return Err(WriterError::EncoderFailed {
                    path: self.path.clone(),
                    status: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeFactory {
        pub logs: Logs,
        pub fail_finish_for: Vec<usize>,
        pub fail_create: bool,
        pub on_append: Option<Arc<dyn Fn() + Send + Sync>>,
    }

    impl WriterFactory for FakeFactory {
        fn create(
            &mut self,
            path: &Path,
            size: FrameSize,
            fps: u32,
        ) -> Result<Box<dyn FrameWriter>, WriterError> {
            if self.fail_create {
                return Err(WriterError::Spawn {
                    program: "ffmpeg".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }

            let mut logs = self.logs.lock().unwrap();
            let index = logs.len();
            logs.push(WriterLog {
                path: path.to_path_buf(),
                size,
                fps,
                ..WriterLog::default()
            });

            Ok(Box::new(FakeWriter {
                logs: self.logs.clone(),
                index,
                path: path.to_path_buf(),
                size,
                fail_finish: self.fail_finish_for.contains(&index),
                on_append: self.on_append.clone(),
            }))
        }
    }

    pub(crate) fn frame(size: FrameSize, tag: u8) -> Frame {
        Frame {
            size,
            data: vec![tag; size.pixel_count() * 3],
        }
    }

    #[test]
    fn test_slot_lifecycle() {
        let mut factory = FakeFactory::default();
        let config = CaptureConfig {
            output_prefix: "out_".to_string(),
            fps: 15,
            ..CaptureConfig::default()
        };
        let region = Region::new(10, 10, 200, 300);
        let mut slot = RecorderSlot::new(2);

        assert_eq!(slot.state(), SlotState::Empty);
        slot.bind(&region, &config, &mut factory).unwrap();
        assert_eq!(slot.state(), SlotState::Active);
        slot.write(&frame(region.size(), 1)).unwrap();
        assert!(slot.close().unwrap());
        assert_eq!(slot.state(), SlotState::Closed);

        let logs = factory.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].fps, 15);
        assert_eq!(logs[0].frames.len(), 1);
        assert_eq!(logs[0].finished, 1);
        let name = logs[0].path.display().to_string();
        assert!(name.starts_with("out_capture_2_"), "{}", name);
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_bound_size_survives_resize() {
        let mut factory = FakeFactory::default();
        let config = CaptureConfig::default();
        let mut slot = RecorderSlot::new(0);

        slot.bind(&Region::new(10, 10, 200, 300), &config, &mut factory)
            .unwrap();
        slot.bind(&Region::new(10, 10, 250, 320), &config, &mut factory)
            .unwrap();

        let result = slot.write(&frame(FrameSize::new(250, 320), 1));

        assert!(matches!(result, Err(SlotError::DimensionMismatch { .. })));
        assert_eq!(slot.size(), Some(FrameSize::new(200, 300)));
        assert_eq!(factory.logs.lock().unwrap().len(), 1);
        assert!(factory.logs.lock().unwrap()[0].frames.is_empty());
    }

    #[test]
    fn test_scale_factor_applies_to_writer_size() {
        let mut factory = FakeFactory::default();
        let config = CaptureConfig {
            scale_factor: 2.0,
            ..CaptureConfig::default()
        };
        let mut slot = RecorderSlot::new(0);

        slot.bind(&Region::new(10, 10, 464, 838), &config, &mut factory)
            .unwrap();

        assert_eq!(slot.size(), Some(FrameSize::new(928, 1676)));
        slot.write(&frame(FrameSize::new(928, 1676), 0)).unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut factory = FakeFactory::default();
        let mut slot = RecorderSlot::new(0);
        slot.bind(&Region::new(10, 10, 4, 4), &CaptureConfig::default(), &mut factory)
            .unwrap();

        assert!(slot.close().unwrap());
        assert!(!slot.close().unwrap());
        drop(slot);

        assert_eq!(factory.logs.lock().unwrap()[0].finished, 1);
    }

    #[test]
    fn test_close_empty_slot_is_noop() {
        let mut slot = RecorderSlot::new(4);

        assert!(!slot.close().unwrap());
        assert_eq!(slot.state(), SlotState::Empty);
    }

    #[test]
    fn test_failed_finish_still_closes() {
        let mut factory = FakeFactory {
            fail_finish_for: vec![0],
            ..FakeFactory::default()
        };
        let mut slot = RecorderSlot::new(0);
        slot.bind(&Region::new(10, 10, 4, 4), &CaptureConfig::default(), &mut factory)
            .unwrap();

        assert!(slot.close().is_err());
        assert_eq!(slot.state(), SlotState::Closed);
        assert!(!slot.close().unwrap());
    }

    #[test]
    fn test_write_to_unbound_or_closed_slot() {
        let mut factory = FakeFactory::default();
        let mut slot = RecorderSlot::new(1);
        let f = frame(FrameSize::new(4, 4), 0);

        assert!(matches!(slot.write(&f), Err(SlotError::Unbound(1))));

        slot.bind(&Region::new(10, 10, 4, 4), &CaptureConfig::default(), &mut factory)
            .unwrap();
        slot.close().unwrap();

        assert!(matches!(slot.write(&f), Err(SlotError::Closed(1))));
        assert!(matches!(
            slot.bind(&Region::new(10, 10, 4, 4), &CaptureConfig::default(), &mut factory),
            Err(SlotError::Closed(1))
        ));
    }

    #[test]
    fn test_drop_closes_active_slot() {
        let mut factory = FakeFactory::default();
        let mut slot = RecorderSlot::new(0);
        slot.bind(&Region::new(10, 10, 4, 4), &CaptureConfig::default(), &mut factory)
            .unwrap();

        drop(slot);

        assert_eq!(factory.logs.lock().unwrap()[0].finished, 1);
    }
}
