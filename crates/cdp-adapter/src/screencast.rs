//! Screencast frames collected while a recording is active.

use serde::Deserialize;

pub const MJPEG_MIME: &str = "video/x-motion-jpeg";

#[derive(Clone, Debug, PartialEq)]
pub struct ScreencastFrame {
    /// Decoded JPEG bytes.
    pub data: Vec<u8>,
    /// Seconds since epoch as reported by the browser.
    pub timestamp: Option<f64>,
    pub width: u32,
    pub height: u32,
}

/// Payload of `Page.screencastFrame`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScreencastFrameParams {
    pub data: String,
    pub session_id: i64,
    pub metadata: FrameMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FrameMetadata {
    #[serde(default)]
    pub device_width: f64,
    #[serde(default)]
    pub device_height: f64,
    pub timestamp: Option<f64>,
}

/// Frames of one screencast, in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreencastRecording {
    pub frames: Vec<ScreencastFrame>,
}

impl ScreencastRecording {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Motion JPEG stream: the frames concatenated back to back.
    pub fn to_mjpeg(&self) -> Vec<u8> {
        let total = self.frames.iter().map(|frame| frame.data.len()).sum();
        let mut out = Vec::with_capacity(total);
        for frame in &self.frames {
            out.extend_from_slice(&frame.data);
        }
        out
    }

    /// `WIDTHxHEIGHT` of the last frame.
    pub fn resolution(&self) -> Option<String> {
        self.frames
            .last()
            .filter(|frame| frame.width > 0 && frame.height > 0)
            .map(|frame| format!("{}x{}", frame.width, frame.height))
    }

    /// Wall-clock span between the first and last frame, in milliseconds.
    pub fn span_ms(&self) -> u64 {
        let first = self.frames.first().and_then(|frame| frame.timestamp);
        let last = self.frames.last().and_then(|frame| frame.timestamp);
        match (first, last) {
            (Some(start), Some(end)) if end > start => ((end - start) * 1000.0) as u64,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8], ts: f64) -> ScreencastFrame {
        ScreencastFrame {
            data: bytes.to_vec(),
            timestamp: Some(ts),
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn concatenates_frames() {
        let recording = ScreencastRecording {
            frames: vec![frame(&[0xff, 0xd8, 1], 10.0), frame(&[0xff, 0xd8, 2], 11.5)],
        };
        assert_eq!(recording.to_mjpeg(), vec![0xff, 0xd8, 1, 0xff, 0xd8, 2]);
        assert_eq!(recording.resolution().as_deref(), Some("800x600"));
        assert_eq!(recording.span_ms(), 1500);
    }

    #[test]
    fn empty_recording_has_no_resolution() {
        let recording = ScreencastRecording::default();
        assert!(recording.is_empty());
        assert!(recording.resolution().is_none());
        assert_eq!(recording.span_ms(), 0);
    }
}
