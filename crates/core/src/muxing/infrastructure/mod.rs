pub mod ffmpeg_mp4_muxer;
pub mod output_location;
