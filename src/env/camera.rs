use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array3;

use crate::common::errors::{EnvError, EnvResult};

/// A resized RGB camera frame, `(height, width, 3)`.
pub type Observation = Array3<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Rgb8,
    Bgr8,
    Mono8,
}

impl Encoding {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Encoding::Rgb8 | Encoding::Bgr8 => 3,
            Encoding::Mono8 => 1,
        }
    }
}

/// A frame as it comes off the camera topic.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
    pub data: Vec<u8>,
}

/// Decodes a raw frame and resizes it to `width` x `height`.
pub fn to_observation(raw: &RawImage, width: usize, height: usize) -> EnvResult<Observation> {
    let expected = raw.width as usize * raw.height as usize * raw.encoding.bytes_per_pixel();
    if raw.width == 0 || raw.height == 0 || raw.data.len() != expected {
        return Err(EnvError::ImageDecode(format!(
            "{}x{} {:?} frame carries {} bytes, expected {}",
            raw.width,
            raw.height,
            raw.encoding,
            raw.data.len(),
            expected
        )));
    }

    let rgb: Vec<u8> = match raw.encoding {
        Encoding::Rgb8 => raw.data.clone(),
        Encoding::Bgr8 => raw
            .data
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        Encoding::Mono8 => raw.data.iter().flat_map(|&v| [v, v, v]).collect(),
    };

    let img = RgbImage::from_raw(raw.width, raw.height, rgb)
        .ok_or_else(|| EnvError::ImageDecode("buffer does not match dimensions".to_string()))?;

    let resized = if img.width() as usize == width && img.height() as usize == height {
        img
    } else {
        imageops::resize(&img, width as u32, height as u32, FilterType::Lanczos3)
    };

    Array3::from_shape_vec((height, width, 3), resized.into_raw())
        .map_err(|e| EnvError::ImageDecode(e.to_string()))
}

/// Single-slot hand-off between the camera callback and the env.
///
/// A frame offered while the slot is occupied is dropped, so the
/// consumer may skip frames but never reads one older than the slot.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    tx: Sender<RawImage>,
    rx: Receiver<RawImage>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }
}

impl FrameBuffer {
    /// Returns false when the frame was dropped.
    pub fn offer(&self, frame: RawImage) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // both ends live in self
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn take(&self, timeout: Duration) -> Option<RawImage> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Throws away whatever frame is waiting, returning whether there was one.
    pub fn drain(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{to_observation, Encoding, FrameBuffer, RawImage};

    fn solid(width: u32, height: u32, encoding: Encoding, px: &[u8]) -> RawImage {
        RawImage {
            width,
            height,
            encoding,
            data: px
                .iter()
                .copied()
                .cycle()
                .take((width * height) as usize * px.len())
                .collect(),
        }
    }

    #[test]
    fn test_resize_to_observation() {
        let raw = solid(320, 240, Encoding::Rgb8, &[10, 20, 30]);
        let obs = to_observation(&raw, 160, 120).unwrap();

        assert_eq!(obs.dim(), (120, 160, 3));
        // lanczos on a flat image may be off by one after rounding
        for (c, want) in [10i32, 20, 30].into_iter().enumerate() {
            assert!((obs[[60, 80, c]] as i32 - want).abs() <= 1);
        }
    }

    #[test]
    fn test_bgr_and_mono_are_converted() {
        let bgr = solid(4, 4, Encoding::Bgr8, &[1, 2, 3]);
        let obs = to_observation(&bgr, 4, 4).unwrap();
        assert_eq!(obs[[0, 0, 0]], 3);
        assert_eq!(obs[[0, 0, 2]], 1);

        let mono = solid(4, 4, Encoding::Mono8, &[7]);
        let obs = to_observation(&mono, 4, 4).unwrap();
        assert_eq!(obs[[3, 3, 1]], 7);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let mut raw = solid(8, 8, Encoding::Rgb8, &[0, 0, 0]);
        raw.data.pop();

        assert!(to_observation(&raw, 4, 4).is_err());
    }

    #[test]
    fn test_single_slot_drops_when_full() {
        let buffer = FrameBuffer::default();

        assert!(buffer.offer(solid(1, 1, Encoding::Mono8, &[1])));
        assert!(!buffer.offer(solid(1, 1, Encoding::Mono8, &[2])));

        let frame = buffer.take(Duration::from_millis(10)).unwrap();
        assert_eq!(frame.data, vec![1]);
        assert!(buffer.take(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_drain() {
        let buffer = FrameBuffer::default();
        assert!(!buffer.drain());

        buffer.offer(solid(1, 1, Encoding::Mono8, &[1]));
        assert!(buffer.drain());
        assert!(buffer.is_empty());
    }
}
