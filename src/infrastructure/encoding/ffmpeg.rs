//! Lossy containers through an ffmpeg subprocess
//!
//! Raw s16le mono PCM is piped into ffmpeg's stdin; ffmpeg encodes and
//! writes the destination file itself.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::application::ports::{EncoderError, EncoderSink};
use crate::domain::recording::{ContainerFormat, EncodingParams};

/// Codec and muxer arguments for a lossy container
fn codec_args(format: ContainerFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ContainerFormat::AacAdts => Some(("aac", "adts")),
        ContainerFormat::M4a => Some(("aac", "mp4")),
        ContainerFormat::Mp3 => Some(("libmp3lame", "mp3")),
        ContainerFormat::Opus => Some(("libopus", "ogg")),
        ContainerFormat::Flac | ContainerFormat::Wav => None,
    }
}

/// Build FFmpeg args reading PCM from stdin and writing `output_path`
pub fn build_ffmpeg_args(
    output_path: &Path,
    format: ContainerFormat,
    params: &EncodingParams,
) -> Result<Vec<String>, EncoderError> {
    let (codec, muxer) = codec_args(format).ok_or_else(|| {
        EncoderError::CreateFailed(format!("{} is not encoded through ffmpeg", format))
    })?;

    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "s16le",
        "-ar",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        params.sample_rate.to_string(),
        "-ac".to_string(),
        params.channels.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-c:a".to_string(),
        codec.to_string(),
        "-b:a".to_string(),
        format!("{}k", params.bitrate / 1000),
        "-ar".to_string(),
        params.sample_rate.to_string(),
        "-ac".to_string(),
        params.channels.to_string(),
    ]);
    if format == ContainerFormat::M4a {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }
    args.extend([
        "-f".to_string(),
        muxer.to_string(),
        "-y".to_string(),
        output_path.to_string_lossy().to_string(),
    ]);
    Ok(args)
}

/// Read ffmpeg's stderr to the end on its own thread, logging each line.
///
/// Yields the last non-empty line.
fn drain_stderr(stderr: ChildStderr) -> std::io::Result<JoinHandle<Option<String>>> {
    thread::Builder::new()
        .name("ffmpeg-stderr".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut raw = Vec::new();
            let mut last = None;
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim();
                if !line.is_empty() {
                    debug!(target: "micpulse::ffmpeg", "{}", line);
                    last = Some(line.to_string());
                }
            }
            last
        })
}

/// Running ffmpeg encoder process
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Option<String>>>,
    output: std::path::PathBuf,
    scratch: Vec<u8>,
}

impl FfmpegSink {
    /// Spawn ffmpeg for `output_path`
    pub fn spawn(
        ffmpeg: &str,
        output_path: &Path,
        format: ContainerFormat,
        params: &EncodingParams,
    ) -> Result<Self, EncoderError> {
        // Surface an unwritable destination now rather than from ffmpeg later
        std::fs::File::create(output_path)
            .map_err(|e| EncoderError::CreateFailed(format!("{}: {}", output_path.display(), e)))?;

        let args = build_ffmpeg_args(output_path, format, params)?;
        debug!(ffmpeg, ?args, "Spawning encoder");

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let _ = std::fs::remove_file(output_path);
                if e.kind() == ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound(ffmpeg.to_string())
                } else {
                    EncoderError::CreateFailed(e.to_string())
                }
            })?;

        let stderr = match child.stderr.take().map(drain_stderr).transpose() {
            Ok(stderr) => stderr,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EncoderError::CreateFailed(e.to_string()));
            }
        };
        let stdin = child.stdin.take();
        Ok(Self {
            child,
            stdin,
            stderr,
            output: output_path.to_path_buf(),
            scratch: Vec::new(),
        })
    }

    /// Last line ffmpeg printed to stderr; call once ffmpeg has exited
    fn stderr_tail(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|reader| reader.join().ok().flatten())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

impl EncoderSink for FfmpegSink {
    fn write(&mut self, samples: &[i16]) -> Result<(), EncoderError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EncoderError::WriteFailed("encoder input closed".into()))?;

        self.scratch.clear();
        self.scratch.reserve(samples.len() * 2);
        for sample in samples {
            self.scratch.extend_from_slice(&sample.to_le_bytes());
        }
        stdin
            .write_all(&self.scratch)
            .map_err(|e| EncoderError::WriteFailed(format!("ffmpeg stopped accepting audio: {}", e)))
    }

    fn finish(mut self: Box<Self>) -> Result<u64, EncoderError> {
        // Closing stdin is ffmpeg's end-of-stream
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .map_err(|e| EncoderError::FinalizeFailed(format!("FFmpeg failed: {}", e)))?;
        let message = self.stderr_tail();
        if !status.success() {
            return Err(EncoderError::FinalizeFailed(format!(
                "FFmpeg exited with error: {}",
                message
            )));
        }

        std::fs::metadata(&self.output)
            .map(|m| m.len())
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Unfinished sink: let ffmpeg flush what it has
        if self.stdin.take().is_some() {
            if let Err(e) = self.child.wait() {
                warn!("FFmpeg did not exit cleanly: {}", e);
            }
        }
        if let Some(reader) = self.stderr.take() {
            let _ = reader.join();
        }
    }
}
