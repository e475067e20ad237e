//! `converter.get(codec)` (spec.md §1: out-of-scope external collaborator),
//! concretized per SPEC_FULL.md §6.1 as a `Converter` trait with one
//! `ffmpeg` subprocess implementation, the same `tokio::process::Command`
//! shape `ffspot`'s `download.rs` uses to pipe audio through `ffmpeg`.
//! Unlike ffspot (which pipes a live stream into ffmpeg's stdin) this
//! converter runs on an already-downloaded file, so `-i <src>` is used
//! directly instead of stdin piping.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{AppError, Result, TransportError};

#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    /// Transcodes `src` to this converter's codec at the given sample
    /// rate / bit depth and returns the new path. Does not remove `src`;
    /// `Track::postprocess` does that once conversion succeeds, matching
    /// spec.md §4.4's ordering ("run the converter... remove the source
    /// file... update `download_path`").
    async fn convert(&self, src: &Path, sampling_rate: u32, bit_depth: u8) -> Result<PathBuf>;
}

pub struct FfmpegConverter {
    codec_arg: &'static str,
    sample_fmt: Option<&'static str>,
    extension: &'static str,
}

/// Looks up the converter for a configured codec name, failing loudly on
/// an unknown one (spec.md §7: "unknown codec in converter... programmer
/// error; fail loudly").
pub fn get(codec: &str) -> Result<Box<dyn Converter>> {
    match codec.to_ascii_lowercase().as_str() {
        "flac" => Ok(Box::new(FfmpegConverter {
            codec_arg: "flac",
            sample_fmt: Some("s16"),
            extension: ".flac",
        })),
        "alac" => Ok(Box::new(FfmpegConverter {
            codec_arg: "alac",
            sample_fmt: None,
            extension: ".m4a",
        })),
        "mp3" => Ok(Box::new(FfmpegConverter {
            codec_arg: "libmp3lame",
            sample_fmt: None,
            extension: ".mp3",
        })),
        "aac" | "m4a" => Ok(Box::new(FfmpegConverter {
            codec_arg: "aac",
            sample_fmt: None,
            extension: ".m4a",
        })),
        "opus" => Ok(Box::new(FfmpegConverter {
            codec_arg: "libopus",
            sample_fmt: None,
            extension: ".opus",
        })),
        other => Err(AppError::UnknownCodec(other.to_string())),
    }
}

fn bit_depth_sample_fmt(bit_depth: u8) -> &'static str {
    match bit_depth {
        0..=16 => "s16",
        17..=24 => "s32",
        _ => "s32",
    }
}

#[async_trait::async_trait]
impl Converter for FfmpegConverter {
    async fn convert(&self, src: &Path, sampling_rate: u32, bit_depth: u8) -> Result<PathBuf> {
        let dest = src.with_extension(&self.extension[1..]);

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-i")
            .arg(src)
            .arg("-c:a")
            .arg(self.codec_arg)
            .arg("-ar")
            .arg(sampling_rate.to_string());
        if let Some(fmt) = self.sample_fmt {
            cmd.arg("-sample_fmt").arg(fmt);
        } else {
            cmd.arg("-sample_fmt").arg(bit_depth_sample_fmt(bit_depth));
        }
        cmd.arg(&dest).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        let status = cmd.status().await.map_err(|e| io_err(src, e))?;
        if !status.success() {
            return Err(AppError::Transport(TransportError::Io {
                path: dest.clone(),
                source: std::io::Error::other(format!("ffmpeg exited with {status}")),
            }));
        }

        Ok(dest)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AppError {
    AppError::Transport(TransportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_resolves_known_codecs() {
        assert!(get("flac").is_ok());
        assert!(get("MP3").is_ok());
        assert!(get("alac").is_ok());
        assert!(get("opus").is_ok());
    }

    #[test]
    fn get_rejects_unknown_codec() {
        assert!(matches!(get("wma"), Err(AppError::UnknownCodec(_))));
    }

    #[test]
    fn sample_fmt_widens_above_16_bit() {
        assert_eq!(bit_depth_sample_fmt(16), "s16");
        assert_eq!(bit_depth_sample_fmt(24), "s32");
    }
}
