pub mod image_file_source;
pub mod memory_frame_source;
