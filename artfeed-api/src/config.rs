use artfeed_common::{
    media::{MediaRules, Resolution, ResolutionRange, inspect::DEFAULT_PROBE_TIMEOUT},
    snowflake::NodeId,
};
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    net::IpAddr,
    path::{Path, PathBuf},
};
use time::Duration;

const DEFAULT_MAX_REQUEST_BYTES: usize = 600 * 1024 * 1024;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub snowflake_node_id: NodeId,
    pub media_root: PathBuf,
    pub upload_temp_dir: Option<PathBuf>,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
    /// A probe still running after this long is killed and the upload
    /// rejected as unreadable.
    #[serde(default = "default_ffprobe_timeout_seconds")]
    pub ffprobe_timeout_seconds: u64,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

fn default_ffprobe_path() -> PathBuf {
    Path::new("ffprobe").to_owned()
}

fn default_ffprobe_timeout_seconds() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_secs()
}

/// Upload limits, read from `MEDIA_`-prefixed variables. Anything unset
/// keeps the value of [`MediaRules::default`].
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub image_allowed_formats: Vec<String>,
    pub video_allowed_formats: Vec<String>,
    pub image_max_size: u64,
    pub image_min_width: u32,
    pub image_min_height: u32,
    pub video_max_size: u64,
    pub video_horizontal_min_width: u32,
    pub video_horizontal_min_height: u32,
    pub video_horizontal_max_width: u32,
    pub video_horizontal_max_height: u32,
    pub video_vertical_min_width: u32,
    pub video_vertical_min_height: u32,
    pub video_vertical_max_width: u32,
    pub video_vertical_max_height: u32,
    pub video_max_duration_seconds: u32,
    pub max_content_items: usize,
}

impl MediaSettings {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("MEDIA_").from_env()
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        let rules = MediaRules::default();

        Self {
            image_allowed_formats: rules.image_extensions.into_iter().collect(),
            video_allowed_formats: rules.video_extensions.into_iter().collect(),
            image_max_size: rules.image_max_size,
            image_min_width: rules.image_min_resolution.width,
            image_min_height: rules.image_min_resolution.height,
            video_max_size: rules.video_max_size,
            video_horizontal_min_width: rules.video_horizontal.min.width,
            video_horizontal_min_height: rules.video_horizontal.min.height,
            video_horizontal_max_width: rules.video_horizontal.max.width,
            video_horizontal_max_height: rules.video_horizontal.max.height,
            video_vertical_min_width: rules.video_vertical.min.width,
            video_vertical_min_height: rules.video_vertical.min.height,
            video_vertical_max_width: rules.video_vertical.max.width,
            video_vertical_max_height: rules.video_vertical.max.height,
            video_max_duration_seconds: u32::try_from(rules.video_max_duration.whole_seconds())
                .unwrap_or(u32::MAX),
            max_content_items: rules.max_content_items,
        }
    }
}

impl From<MediaSettings> for MediaRules {
    fn from(value: MediaSettings) -> Self {
        Self {
            image_extensions: extension_set(&value.image_allowed_formats),
            video_extensions: extension_set(&value.video_allowed_formats),
            image_max_size: value.image_max_size,
            image_min_resolution: Resolution::new(value.image_min_width, value.image_min_height),
            video_max_size: value.video_max_size,
            video_horizontal: ResolutionRange {
                min: Resolution::new(
                    value.video_horizontal_min_width,
                    value.video_horizontal_min_height,
                ),
                max: Resolution::new(
                    value.video_horizontal_max_width,
                    value.video_horizontal_max_height,
                ),
            },
            video_vertical: ResolutionRange {
                min: Resolution::new(
                    value.video_vertical_min_width,
                    value.video_vertical_min_height,
                ),
                max: Resolution::new(
                    value.video_vertical_max_width,
                    value.video_vertical_max_height,
                ),
            },
            video_max_duration: Duration::seconds(i64::from(value.video_max_duration_seconds)),
            max_content_items: value.max_content_items,
        }
    }
}

/// `png, .TIFF` lists the extensions `png` and `tiff`.
fn extension_set(formats: &[String]) -> BTreeSet<String> {
    formats
        .iter()
        .map(|format| format.trim().trim_start_matches('.').to_lowercase())
        .filter(|format| !format.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::config::{Env, MediaSettings};
    use artfeed_common::{
        media::{MediaRules, Resolution, classify::ContentClassifier},
        model::media::ContentKind,
    };
    use time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn unset_media_settings_keep_defaults() {
        let settings: MediaSettings = envy::prefixed("MEDIA_").from_iter(vars(&[])).unwrap();

        assert_eq!(MediaRules::from(settings), MediaRules::default());
    }

    #[test]
    fn media_settings_override_rules() {
        let settings: MediaSettings = envy::prefixed("MEDIA_")
            .from_iter(vars(&[
                ("MEDIA_IMAGE_ALLOWED_FORMATS", "png,tiff"),
                ("MEDIA_IMAGE_MIN_WIDTH", "1024"),
                ("MEDIA_VIDEO_MAX_DURATION_SECONDS", "15"),
                ("MEDIA_MAX_CONTENT_ITEMS", "4"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();

        let rules = MediaRules::from(settings);

        assert!(rules.image_extensions.contains("tiff"));
        assert!(!rules.image_extensions.contains("jpg"));
        assert_eq!(rules.image_min_resolution, Resolution::new(1024, 320));
        assert_eq!(rules.video_max_duration, Duration::seconds(15));
        assert_eq!(rules.max_content_items, 4);
    }

    #[test]
    fn spaced_format_lists_are_normalized() {
        let settings: MediaSettings = envy::prefixed("MEDIA_")
            .from_iter(vars(&[
                ("MEDIA_IMAGE_ALLOWED_FORMATS", "png, tiff"),
                ("MEDIA_VIDEO_ALLOWED_FORMATS", " MP4 ,.mov,"),
            ]))
            .unwrap();

        let rules = MediaRules::from(settings);

        assert_eq!(
            rules.image_extensions.iter().collect::<Vec<_>>(),
            ["png", "tiff"]
        );
        assert_eq!(
            rules.video_extensions.iter().collect::<Vec<_>>(),
            ["mov", "mp4"]
        );

        let classifier = ContentClassifier::new(&rules.image_extensions, &rules.video_extensions);
        assert_eq!(classifier.classify("scan.tiff"), Ok(ContentKind::Image));
        assert_eq!(classifier.classify("clip.MP4"), Ok(ContentKind::Video));
    }

    #[test]
    fn server_env_defaults() {
        let env: Env = envy::from_iter(vars(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/artfeed"),
            ("SNOWFLAKE_NODE_ID", "3"),
            ("MEDIA_ROOT", "/srv/media"),
        ]))
        .unwrap();

        assert_eq!(env.database_max_connections, 10);
        assert_eq!(env.max_request_bytes, 600 * 1024 * 1024);
        assert_eq!(env.ffprobe_path.to_str(), Some("ffprobe"));
        assert_eq!(env.ffprobe_timeout_seconds, 30);
        assert_eq!(env.snowflake_node_id.get(), 3);
        assert_eq!(env.upload_temp_dir, None);
    }

    #[test]
    fn out_of_range_node_id_is_rejected() {
        let result = envy::from_iter::<_, Env>(vars(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/artfeed"),
            ("SNOWFLAKE_NODE_ID", "5000"),
            ("MEDIA_ROOT", "/srv/media"),
        ]));

        assert!(result.is_err());
    }
}
