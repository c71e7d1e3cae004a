pub mod frame_data;
pub mod video;

pub use frame_data::FrameSource;
pub use video::VideoDecoder;
