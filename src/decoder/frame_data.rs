use opencv::core::Mat;

/// A decoded frame and its 0-based presentation index
pub struct Frame {
    pub index: u64,
    pub image: Mat,
}

impl Frame {
    pub fn new(index: u64, image: Mat) -> Self {
        Self { index, image }
    }
}

/// Sequential producer of frames in presentation order.
///
/// `Ok(None)` is a clean end of stream; `Err` means decoding broke off early.
pub trait FrameSource {
    fn next_frame(&mut self) -> opencv::Result<Option<Frame>>;
}
