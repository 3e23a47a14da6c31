//! Validation of uploaded media before it becomes part of a post.
//!
//! Every file is first classified by extension, then run through the
//! validator chain of its kind ([`validation::MediaContentValidation`]).
//! Files that pass are checked together against the cross-item
//! [`policy::PostContentPolicy`].

pub mod classify;
pub mod inspect;
pub mod policy;
pub mod validation;
pub mod validator;

use crate::model::media::ContentKind;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    path::PathBuf,
};
use thiserror::Error;
use time::Duration;

/// An upload that has been written to disk, not yet classified.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UploadedFile {
    /// The name the client sent, used for classification only.
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// An upload that passed validation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ContentItem {
    pub file: UploadedFile,
    pub kind: ContentKind,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square frames count as horizontal.
    #[must_use]
    pub fn orientation(self) -> Orientation {
        if self.width >= self.height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    #[must_use]
    pub fn is_at_least(self, min: Resolution) -> bool {
        self.width >= min.width && self.height >= min.height
    }

    #[must_use]
    pub fn is_at_most(self, max: Resolution) -> bool {
        self.width <= max.width && self.height <= max.height
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        })
    }
}

/// Inclusive bounds on both dimensions.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ResolutionRange {
    pub min: Resolution,
    pub max: Resolution,
}

impl ResolutionRange {
    #[must_use]
    pub fn contains(&self, resolution: Resolution) -> bool {
        resolution.is_at_least(self.min) && resolution.is_at_most(self.max)
    }
}

/// Limits applied to uploads, built once from configuration.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MediaRules {
    /// Lowercase, without the leading dot.
    pub image_extensions: BTreeSet<String>,
    pub video_extensions: BTreeSet<String>,
    pub image_max_size: u64,
    pub image_min_resolution: Resolution,
    pub video_max_size: u64,
    pub video_horizontal: ResolutionRange,
    pub video_vertical: ResolutionRange,
    pub video_max_duration: Duration,
    pub max_content_items: usize,
}

impl Default for MediaRules {
    fn default() -> Self {
        let extensions = |list: &[&str]| list.iter().map(|ext| (*ext).to_owned()).collect();

        Self {
            image_extensions: extensions(&["jpg", "jpeg", "png", "webp", "gif"]),
            video_extensions: extensions(&["mp4", "mov", "webm"]),
            image_max_size: 20 * 1024 * 1024,
            image_min_resolution: Resolution::new(320, 320),
            video_max_size: 500 * 1024 * 1024,
            video_horizontal: ResolutionRange {
                min: Resolution::new(640, 360),
                max: Resolution::new(3840, 2160),
            },
            video_vertical: ResolutionRange {
                min: Resolution::new(360, 640),
                max: Resolution::new(2160, 3840),
            },
            video_max_duration: Duration::seconds(60),
            max_content_items: 10,
        }
    }
}

/// One reason a single file was rejected. A file can have several.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum MediaViolation {
    #[error("Unsupported extension format: {0:?}.")]
    UnsupportedExtension(String),
    #[error("File size {size} bytes exceeds the maximum of {max} bytes.")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Resolution {actual} is below the minimum of {min}.")]
    ResolutionTooLow { actual: Resolution, min: Resolution },
    #[error(
        "Resolution {actual} of {orientation} video is outside the allowed range {} to {}.",
        .range.min,
        .range.max
    )]
    ResolutionOutOfRange {
        actual: Resolution,
        orientation: Orientation,
        range: ResolutionRange,
    },
    #[error(
        "Duration of {:.1} seconds exceeds the maximum of {} seconds.",
        .actual.as_seconds_f64(),
        .max.whole_seconds()
    )]
    DurationTooLong { actual: Duration, max: Duration },
    #[error("The file could not be read as {kind}: {reason}")]
    Unreadable { kind: ContentKind, reason: String },
}

#[cfg(test)]
mod tests {
    use crate::media::{MediaViolation, Orientation, Resolution, ResolutionRange};
    use time::Duration;

    #[test]
    fn orientation_by_aspect() {
        assert_eq!(Resolution::new(1920, 1080).orientation(), Orientation::Horizontal);
        assert_eq!(Resolution::new(1080, 1080).orientation(), Orientation::Horizontal);
        assert_eq!(Resolution::new(1080, 1920).orientation(), Orientation::Vertical);
    }

    #[test]
    fn range_is_inclusive() {
        let range = ResolutionRange {
            min: Resolution::new(640, 360),
            max: Resolution::new(1920, 1080),
        };

        assert!(range.contains(Resolution::new(640, 360)));
        assert!(range.contains(Resolution::new(1920, 1080)));
        assert!(!range.contains(Resolution::new(1921, 1080)));
        assert!(!range.contains(Resolution::new(640, 359)));
    }

    #[test]
    fn messages_are_readable() {
        let violation = MediaViolation::DurationTooLong {
            actual: Duration::milliseconds(61_500),
            max: Duration::seconds(60),
        };

        assert_eq!(
            violation.to_string(),
            "Duration of 61.5 seconds exceeds the maximum of 60 seconds."
        );
    }
}
