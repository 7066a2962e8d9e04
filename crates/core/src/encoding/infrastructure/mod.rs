pub mod ffmpeg_h264_encoder;
