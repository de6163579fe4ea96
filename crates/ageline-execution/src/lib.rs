//! Local process execution for Ageline: the ffmpeg-based transcoder used for
//! final video assembly.

pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;
