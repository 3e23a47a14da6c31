use crate::media::Resolution;
use image::ImageReader;
use serde::Deserialize;
use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::Instant,
};
use thiserror::Error;
use time::Duration;
use tracing::debug;

/// Longest duration accepted from a probe before it is considered garbage.
const MAX_PROBED_SECONDS: f64 = 1.0e9;

pub const DEFAULT_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

const PROBE_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Reading the file failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decoding the image failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("ffprobe exited unsuccessfully: {0}")]
    ProbeFailed(String),
    #[error("ffprobe did not finish within {0:?}")]
    ProbeTimedOut(std::time::Duration),
    #[error("ffprobe produced unexpected output: {0}")]
    ProbeOutput(#[from] serde_json::Error),
    #[error("The file contains no video stream")]
    NoVideoStream,
    #[error("The video duration is missing or invalid")]
    InvalidDuration,
}

/// Decoded view of a video, held open only while its checks run.
pub trait VideoClip {
    fn resolution(&self) -> Resolution;
    fn duration(&self) -> Duration;
}

/// Reads just enough of a media file to learn its dimensions and length.
pub trait MediaInspector: Send + Sync {
    type Clip: VideoClip + 'static;

    fn image_resolution(&self, path: &Path) -> Result<Resolution, InspectError>;

    fn open_clip(&self, path: &Path) -> Result<Self::Clip, InspectError>;
}

/// Images are decoded with the `image` crate, videos are probed with an
/// external `ffprobe` binary that is killed once `timeout` has passed.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
    timeout: std::time::Duration,
}

impl FfprobeInspector {
    #[must_use]
    pub fn new(ffprobe_path: PathBuf, timeout: std::time::Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    fn run_probe(&self, path: &Path) -> Result<Vec<u8>, InspectError> {
        let mut child = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration:stream_tags=rotate:\
                 stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // The selected entries fit in the pipe buffer, so polling cannot
        // deadlock on a child blocked writing.
        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                child.kill()?;
                child.wait()?;
                return Err(InspectError::ProbeTimedOut(self.timeout));
            }
            thread::sleep(PROBE_POLL_INTERVAL);
        };

        let mut stdout = Vec::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_end(&mut stdout)?;
        }

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr)?;
            }
            return Err(InspectError::ProbeFailed(stderr.trim().to_owned()));
        }

        Ok(stdout)
    }
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new(PathBuf::from("ffprobe"), DEFAULT_PROBE_TIMEOUT)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ProbedClip {
    resolution: Resolution,
    duration: Duration,
}

impl VideoClip for ProbedClip {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

impl MediaInspector for FfprobeInspector {
    type Clip = ProbedClip;

    fn image_resolution(&self, path: &Path) -> Result<Resolution, InspectError> {
        // Uploads are stored without extension, so sniff the format.
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;

        Ok(Resolution::new(width, height))
    }

    fn open_clip(&self, path: &Path) -> Result<ProbedClip, InspectError> {
        let stdout = self.run_probe(path)?;

        let clip = parse_probe_output(&stdout)?;
        debug!(path = %path.display(), resolution = %clip.resolution, "Probed video");

        Ok(clip)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<i32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeStream {
    fn rotation(&self) -> i32 {
        self.side_data_list
            .iter()
            .find_map(|side_data| side_data.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|tags| tags.rotate.as_deref())
                    .and_then(|rotate| rotate.parse().ok())
            })
            .unwrap_or(0)
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && (0.0..MAX_PROBED_SECONDS).contains(&seconds))
        .then(|| Duration::seconds_f64(seconds))
}

/// Rotated streams report their stored dimensions; the returned resolution
/// is the displayed one.
pub(crate) fn parse_probe_output(json: &[u8]) -> Result<ProbedClip, InspectError> {
    let output: ProbeOutput = serde_json::from_slice(json)?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or(InspectError::NoVideoStream)?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(InspectError::NoVideoStream);
    };

    let resolution = if stream.rotation().rem_euclid(180) == 90 {
        Resolution::new(height, width)
    } else {
        Resolution::new(width, height)
    };

    // Some containers only report "N/A" per stream.
    let duration = stream
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .or_else(|| {
            output
                .format
                .as_ref()
                .and_then(|format| format.duration.as_deref())
                .and_then(parse_seconds)
        })
        .ok_or(InspectError::InvalidDuration)?;

    Ok(ProbedClip {
        resolution,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use crate::media::{
        Resolution,
        inspect::{
            FfprobeInspector, InspectError, MediaInspector, VideoClip, parse_probe_output,
        },
    };
    use image::RgbImage;
    use std::io::Write;
    use time::Duration;

    #[test]
    fn parses_stream_dimensions_and_duration() {
        let json = br#"{
            "programs": [],
            "streams": [{ "width": 1920, "height": 1080, "duration": "12.500000" }],
            "format": { "duration": "12.533000" }
        }"#;

        let clip = parse_probe_output(json).unwrap();

        assert_eq!(clip.resolution(), Resolution::new(1920, 1080));
        assert_eq!(clip.duration(), Duration::milliseconds(12_500));
    }

    #[test]
    fn falls_back_to_container_duration() {
        let json = br#"{
            "streams": [{ "width": 640, "height": 360 }],
            "format": { "duration": "3.0" }
        }"#;

        assert_eq!(
            parse_probe_output(json).unwrap().duration(),
            Duration::seconds(3)
        );
    }

    #[test]
    fn rotated_stream_reports_display_resolution() {
        let side_data = br#"{
            "streams": [{
                "width": 1920, "height": 1080, "duration": "1.0",
                "side_data_list": [{ "rotation": -90 }]
            }]
        }"#;
        let tagged = br#"{
            "streams": [{
                "width": 1920, "height": 1080, "duration": "1.0",
                "tags": { "rotate": "270" }
            }]
        }"#;

        for json in [&side_data[..], &tagged[..]] {
            assert_eq!(
                parse_probe_output(json).unwrap().resolution(),
                Resolution::new(1080, 1920)
            );
        }
    }

    #[test]
    fn rejects_streamless_and_durationless_output() {
        assert!(matches!(
            parse_probe_output(br#"{ "streams": [] }"#),
            Err(InspectError::NoVideoStream)
        ));
        assert!(matches!(
            parse_probe_output(br#"{ "streams": [{ "width": 1, "height": 1, "duration": "N/A" }] }"#),
            Err(InspectError::InvalidDuration)
        ));
    }

    #[test]
    fn reads_image_dimensions_without_extension() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut png = Vec::new();
        RgbImage::new(48, 32)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        file.write_all(&png).unwrap();

        let resolution = FfprobeInspector::default()
            .image_resolution(file.path())
            .unwrap();

        assert_eq!(resolution, Resolution::new(48, 32));
    }

    #[test]
    fn garbage_is_not_an_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not pixels").unwrap();

        assert!(
            FfprobeInspector::default()
                .image_resolution(file.path())
                .is_err()
        );
    }

    /// Held while a script is written and run, so no concurrent fork keeps
    /// it open for writing (`ETXTBSY`).
    #[cfg(unix)]
    static SCRIPT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[cfg(unix)]
    fn fake_ffprobe(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffprobe");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn ffprobe_json_is_parsed() {
        let _lock = SCRIPT_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = fake_ffprobe(
            dir.path(),
            r#"echo '{ "streams": [{ "width": 1280, "height": 720, "duration": "4.5" }] }'"#,
        );
        let inspector = FfprobeInspector::new(ffprobe, std::time::Duration::from_secs(10));

        let clip = inspector.open_clip(dir.path()).unwrap();

        assert_eq!(clip.resolution(), Resolution::new(1280, 720));
        assert_eq!(clip.duration(), Duration::seconds_f64(4.5));
    }

    #[cfg(unix)]
    #[test]
    fn failing_ffprobe_reports_stderr() {
        let _lock = SCRIPT_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = fake_ffprobe(dir.path(), "echo 'moov atom not found' >&2; exit 1");
        let inspector = FfprobeInspector::new(ffprobe, std::time::Duration::from_secs(10));

        let err = inspector.open_clip(dir.path()).unwrap_err();

        assert!(
            matches!(&err, InspectError::ProbeFailed(stderr) if stderr == "moov atom not found"),
            "{err}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn hanging_ffprobe_is_killed() {
        let _lock = SCRIPT_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = fake_ffprobe(dir.path(), "exec sleep 30");
        let timeout = std::time::Duration::from_millis(200);
        let inspector = FfprobeInspector::new(ffprobe, timeout);

        let started = std::time::Instant::now();
        let err = inspector.open_clip(dir.path()).unwrap_err();

        assert!(matches!(err, InspectError::ProbeTimedOut(limit) if limit == timeout));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
