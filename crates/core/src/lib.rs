pub mod conversion;
pub mod encoding;
pub mod frames;
pub mod muxing;
pub mod pipeline;
pub mod shared;
