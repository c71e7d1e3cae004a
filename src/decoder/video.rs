use std::path::{Path, PathBuf};

use opencv::{core::Mat, prelude::*, videoio};

use super::frame_data::{Frame, FrameSource};

/// Sequential OpenCV decoder over a video file.
///
/// A file that cannot be opened behaves as an empty stream; callers see zero
/// frames instead of an error.
pub struct VideoDecoder {
    capture: Option<videoio::VideoCapture>,
    path: PathBuf,
    next_index: u64,
    fps: f64,
}

impl VideoDecoder {
    pub fn open(path: &Path) -> Self {
        let capture = match videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY) {
            Ok(capture) => match capture.is_opened() {
                Ok(true) => Some(capture),
                Ok(false) => {
                    tracing::warn!(video = %path.display(), "video could not be opened, treating as empty");
                    None
                }
                Err(e) => {
                    tracing::warn!(video = %path.display(), error = %e, "video open check failed, treating as empty");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(video = %path.display(), error = %e, "video could not be opened, treating as empty");
                None
            }
        };

        let fps = capture
            .as_ref()
            .and_then(|c| c.get(videoio::CAP_PROP_FPS).ok())
            .unwrap_or(0.0);

        if let Some(c) = capture.as_ref() {
            let width = c.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
            let height = c.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
            let frames = c.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0) as i64;
            tracing::debug!(
                video = %path.display(),
                width,
                height,
                fps,
                frame_count_hint = frames,
                "opened video"
            );
        }

        Self {
            capture,
            path: path.to_path_buf(),
            next_index: 0,
            fps,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.capture.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of frames handed out so far.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }

    pub fn read_frame(&mut self) -> opencv::Result<Option<Frame>> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(None);
        };

        let mut image = Mat::default();
        if !capture.read(&mut image)? {
            return Ok(None); // EOF
        }
        if image.empty() {
            return Ok(None);
        }

        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> opencv::Result<Option<Frame>> {
        self.read_frame()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_decodes_every_frame_in_order() {
        let tmp = scratch_dir("decoder_order");
        let dir = tmp.path();
        let video = dir.join("clip.avi");
        write_solid_video(&video, &[10, 60, 110, 160, 210]);

        let mut decoder = VideoDecoder::open(&video);
        assert!(decoder.is_opened());

        let mut indices = Vec::new();
        while let Some(frame) = decoder.read_frame().unwrap() {
            assert_eq!(frame.image.cols(), TEST_WIDTH);
            assert_eq!(frame.image.rows(), TEST_HEIGHT);
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(decoder.frames_read(), 5);

        // EOF is sticky
        assert!(decoder.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_empty_stream() {
        let tmp = scratch_dir("decoder_missing");
        let dir = tmp.path();
        let mut decoder = VideoDecoder::open(&dir.join("does_not_exist.mp4"));
        assert!(!decoder.is_opened());
        assert!(decoder.read_frame().unwrap().is_none());
        assert_eq!(decoder.frames_read(), 0);
    }

    #[test]
    fn test_garbage_file_is_empty_stream() {
        let tmp = scratch_dir("decoder_garbage");
        let dir = tmp.path();
        let video = dir.join("corrupt.mp4");
        std::fs::write(&video, b"this is not a video container").unwrap();

        let mut decoder = VideoDecoder::open(&video);
        let mut count = 0;
        while let Ok(Some(_)) = decoder.read_frame() {
            count += 1;
        }
        assert_eq!(count, 0);
    }
}
