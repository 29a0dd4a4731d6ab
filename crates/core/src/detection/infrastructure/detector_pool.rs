use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::detection::domain::detection::DetectionSet;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::frame::Frame;

#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
    #[error("no detector became available within {0:?}")]
    Exhausted(Duration),
    #[error("detector pool is empty")]
    Empty,
}

/// Fixed set of detectors shared by concurrent requests.
///
/// Each checkout gets exclusive use of one detector; it returns to the pool
/// when the [`PooledDetector`] is dropped, on success and failure alike.
pub struct DetectorPool {
    tx: Sender<Box<dyn ObjectDetector>>,
    rx: Receiver<Box<dyn ObjectDetector>>,
    size: usize,
}

impl DetectorPool {
    pub fn new(detectors: Vec<Box<dyn ObjectDetector>>) -> Result<Self, PoolError> {
        if detectors.is_empty() {
            return Err(PoolError::Empty);
        }
        let size = detectors.len();
        let (tx, rx) = crossbeam_channel::bounded(size);
        for detector in detectors {
            // Capacity equals the detector count, so this never blocks
            let _ = tx.send(detector);
        }
        Ok(Self { tx, rx, size })
    }

    /// Build `size` detectors with `factory`, failing on the first error.
    pub fn build<F>(size: usize, mut factory: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: FnMut() -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>>,
    {
        let detectors = (0..size.max(1))
            .map(|_| factory())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(detectors)?)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Wait up to `timeout` for a free detector.
    pub fn checkout(&self, timeout: Duration) -> Result<PooledDetector, PoolError> {
        match self.rx.recv_timeout(timeout) {
            Ok(detector) => Ok(PooledDetector {
                detector: Some(detector),
                home: self.tx.clone(),
            }),
            // The pool owns a sender, so the channel cannot disconnect while it lives
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(PoolError::Exhausted(timeout))
            }
        }
    }
}

/// A detector on loan from a [`DetectorPool`].
pub struct PooledDetector {
    detector: Option<Box<dyn ObjectDetector>>,
    home: Sender<Box<dyn ObjectDetector>>,
}

impl ObjectDetector for PooledDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, Box<dyn std::error::Error>> {
        match self.detector.as_mut() {
            Some(detector) => detector.detect(frame),
            None => Err("pooled detector already returned".into()),
        }
    }
}

impl Drop for PooledDetector {
    fn drop(&mut self) {
        if let Some(detector) = self.detector.take() {
            let _ = self.home.send(detector);
        }
    }
}
