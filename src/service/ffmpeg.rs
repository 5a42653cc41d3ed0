//! ffmpeg invocations of the edit pipeline.

use crate::error::CompyleError;
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;
use tokio::process::Command;
use tracing::debug;

pub const WIDTH: u32 = 1920;
pub const HEIGHT: u32 = 1080;

/// The broadcaster banner slides in at this offset.
const BANNER_START: f64 = 1.42;
const BANNER_MAX_DURATION: f64 = 6.0;
/// Twitch purple.
const BANNER_COLOR: &str = "0x9146FF";
const FADE_DURATION: f64 = 1.0;

/// Keep only the end of stderr in errors.
const STDERR_TAIL: usize = 2000;

/// Encoding parameters of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub fps: u32,
    pub preset: &'static str,
    pub threads: usize,
}

impl Encoding {
    /// Debug runs trade quality for speed.
    pub fn new(debug: bool) -> Self {
        let threads = available_parallelism().map(|n| n.get()).unwrap_or(1);
        if debug {
            Self {
                fps: 15,
                preset: "ultrafast",
                threads,
            }
        } else {
            Self {
                fps: 60,
                preset: "slow",
                threads,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
    encoding: Encoding,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            program: program.into(),
            encoding,
        }
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Arguments turning a downloaded clip into a uniform segment.
    pub fn normalize_args(
        &self,
        input: &Path,
        output: &Path,
        duration: f64,
        broadcaster: &str,
        fade_in: bool,
    ) -> Vec<String> {
        let mut video = format!(
            "scale={WIDTH}:{HEIGHT}:force_original_aspect_ratio=decrease,\
             pad={WIDTH}:{HEIGHT}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},{banner}",
            fps = self.encoding.fps,
            banner = banner_filter(broadcaster, duration),
        );
        let mut audio = "loudnorm=I=-16:TP=-1.5:LRA=11,aresample=44100".to_string();
        if fade_in {
            video.push_str(&format!(",fade=t=in:st=0:d={FADE_DURATION}"));
            audio.push_str(&format!(",afade=t=in:st=0:d={FADE_DURATION}"));
        }

        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(input.display().to_string());
        args.extend([
            "-t".to_string(),
            format!("{duration:.3}"),
            "-vf".to_string(),
            video,
            "-af".to_string(),
            audio,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.encoding.preset.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-threads".to_string(),
            self.encoding.threads.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.display().to_string(),
        ]);
        args
    }

    /// Arguments joining segments listed in a concat demuxer file.
    pub fn concat_args(&self, list: &Path, output: &Path) -> Vec<String> {
        [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .into_iter()
        .map(String::from)
        .chain([
            list.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.display().to_string(),
        ])
        .collect()
    }

    pub async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        duration: f64,
        broadcaster: &str,
        fade_in: bool,
    ) -> Result<(), CompyleError> {
        self.run(&self.normalize_args(input, output, duration, broadcaster, fade_in))
            .await
    }

    /// Concatenate `segments` into `output` without re-encoding.
    pub async fn concat(&self, segments: &[PathBuf], output: &Path) -> Result<(), CompyleError> {
        // Relative entries would be resolved against the list directory.
        let segments = segments
            .iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?;
        let list = output.with_extension("txt");
        tokio::fs::write(&list, concat_list(&segments)).await?;
        let outcome = self.run(&self.concat_args(&list, output)).await;
        let _ = tokio::fs::remove_file(&list).await;
        outcome
    }

    async fn run(&self, args: &[String]) -> Result<(), CompyleError> {
        debug!(program = %self.program, ?args, "running ffmpeg");
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.stdout.is_empty() {
            debug!("ffmpeg stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Err(CompyleError::Ffmpeg {
            status: output.status.to_string(),
            stderr: stderr[start..].trim().to_string(),
        })
    }
}

/// drawtext filter showing the broadcaster name in a banner that slides in
/// from the left and back out.
fn banner_filter(broadcaster: &str, duration: f64) -> String {
    let end = BANNER_START + duration.clamp(0.0, BANNER_MAX_DURATION);
    let t = format!("(t-{BANNER_START})");
    let slide_in = format!("-exp(-{t}*5)*500");
    let slide_out = format!("-exp(({t}-5)*5)*500");
    format!(
        "drawtext=text='{text}':fontsize=60:fontcolor=white:box=1:boxcolor={BANNER_COLOR}:\
         boxborderw=12:x='if(lt({t},1),{slide_in},if(gt({t},4),{slide_out},0))':y=50:\
         enable='between(t,{BANNER_START},{end:.2})'",
        text = escape_drawtext(&format!("  {broadcaster:<18}")),
    )
}

/// Escape `text` for a single-quoted drawtext value.
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            '\'' => escaped.push('\u{2019}'),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Concat demuxer list of `segments`.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|path| {
            format!(
                "file '{}'\n",
                path.display().to_string().replace('\'', "'\\''")
            )
        })
        .collect()
}
