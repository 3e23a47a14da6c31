use crate::media::{
    MediaViolation, Orientation, Resolution, ResolutionRange, UploadedFile, inspect::VideoClip,
};
use time::Duration;

/// A single check in a validation chain. Returns every violation found, or
/// nothing if the input passes.
pub trait Validator<Input: ?Sized>: Send + Sync {
    fn evaluate(&self, input: &Input) -> Vec<MediaViolation>;
}

pub type FileValidators = Vec<Box<dyn Validator<UploadedFile>>>;
pub type ImageValidators = Vec<Box<dyn Validator<Resolution>>>;
pub type ClipValidators = Vec<Box<dyn Validator<dyn VideoClip>>>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct FileSizeValidator {
    max: u64,
}

impl FileSizeValidator {
    #[must_use]
    pub fn new(max: u64) -> Self {
        Self { max }
    }
}

impl Validator<UploadedFile> for FileSizeValidator {
    fn evaluate(&self, file: &UploadedFile) -> Vec<MediaViolation> {
        if file.size > self.max {
            vec![MediaViolation::FileTooLarge {
                size: file.size,
                max: self.max,
            }]
        } else {
            Vec::new()
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ImageResolutionValidator {
    min: Resolution,
}

impl ImageResolutionValidator {
    #[must_use]
    pub fn new(min: Resolution) -> Self {
        Self { min }
    }
}

impl Validator<Resolution> for ImageResolutionValidator {
    fn evaluate(&self, resolution: &Resolution) -> Vec<MediaViolation> {
        if resolution.is_at_least(self.min) {
            Vec::new()
        } else {
            vec![MediaViolation::ResolutionTooLow {
                actual: *resolution,
                min: self.min,
            }]
        }
    }
}

/// Picks the horizontal or vertical range by comparing width to height.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct VideoResolutionValidator {
    horizontal: ResolutionRange,
    vertical: ResolutionRange,
}

impl VideoResolutionValidator {
    #[must_use]
    pub fn new(horizontal: ResolutionRange, vertical: ResolutionRange) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

impl Validator<dyn VideoClip> for VideoResolutionValidator {
    fn evaluate(&self, clip: &dyn VideoClip) -> Vec<MediaViolation> {
        let actual = clip.resolution();
        let orientation = actual.orientation();
        let range = match orientation {
            Orientation::Horizontal => self.horizontal,
            Orientation::Vertical => self.vertical,
        };

        if range.contains(actual) {
            Vec::new()
        } else {
            vec![MediaViolation::ResolutionOutOfRange {
                actual,
                orientation,
                range,
            }]
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct VideoDurationValidator {
    max: Duration,
}

impl VideoDurationValidator {
    #[must_use]
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

impl Validator<dyn VideoClip> for VideoDurationValidator {
    fn evaluate(&self, clip: &dyn VideoClip) -> Vec<MediaViolation> {
        let actual = clip.duration();
        if actual > self.max {
            vec![MediaViolation::DurationTooLong {
                actual,
                max: self.max,
            }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::media::{
        MediaViolation, Orientation, Resolution, ResolutionRange, UploadedFile,
        inspect::VideoClip,
        validator::{
            FileSizeValidator, ImageResolutionValidator, Validator, VideoDurationValidator,
            VideoResolutionValidator,
        },
    };
    use std::path::PathBuf;
    use time::Duration;

    struct Clip(Resolution, Duration);

    fn clip(resolution: Resolution, duration: Duration) -> Box<dyn VideoClip> {
        Box::new(Clip(resolution, duration))
    }

    impl VideoClip for Clip {
        fn resolution(&self) -> Resolution {
            self.0
        }

        fn duration(&self) -> Duration {
            self.1
        }
    }

    fn file(size: u64) -> UploadedFile {
        UploadedFile {
            file_name: "upload.png".to_owned(),
            path: PathBuf::from("/tmp/upload"),
            size,
        }
    }

    #[test]
    fn file_size_limit_is_inclusive() {
        let validator = FileSizeValidator::new(100);

        assert!(validator.evaluate(&file(100)).is_empty());
        assert_eq!(
            validator.evaluate(&file(101)),
            [MediaViolation::FileTooLarge {
                size: 101,
                max: 100
            }]
        );
    }

    #[test]
    fn image_needs_both_dimensions() {
        let validator = ImageResolutionValidator::new(Resolution::new(600, 400));

        assert!(validator.evaluate(&Resolution::new(600, 400)).is_empty());
        assert_eq!(validator.evaluate(&Resolution::new(599, 4000)).len(), 1);
        assert_eq!(validator.evaluate(&Resolution::new(6000, 399)).len(), 1);
    }

    #[test]
    fn video_range_follows_orientation() {
        let validator = VideoResolutionValidator::new(
            ResolutionRange {
                min: Resolution::new(1280, 720),
                max: Resolution::new(1920, 1080),
            },
            ResolutionRange {
                min: Resolution::new(720, 1280),
                max: Resolution::new(1080, 1920),
            },
        );
        let second = Duration::SECOND;

        assert!(validator.evaluate(&*clip(Resolution::new(1920, 1080), second)).is_empty());
        assert!(validator.evaluate(&*clip(Resolution::new(1080, 1920), second)).is_empty());

        let violations = validator.evaluate(&*clip(Resolution::new(720, 1000), second));
        assert!(matches!(
            violations.as_slice(),
            [MediaViolation::ResolutionOutOfRange {
                orientation: Orientation::Vertical,
                ..
            }]
        ));

        let violations = validator.evaluate(&*clip(Resolution::new(3840, 2160), second));
        assert!(matches!(
            violations.as_slice(),
            [MediaViolation::ResolutionOutOfRange {
                orientation: Orientation::Horizontal,
                ..
            }]
        ));
    }

    #[test]
    fn duration_limit_is_inclusive() {
        let validator = VideoDurationValidator::new(Duration::seconds(60));
        let resolution = Resolution::new(1280, 720);

        assert!(validator.evaluate(&*clip(resolution, Duration::seconds(60))).is_empty());
        assert_eq!(
            validator
                .evaluate(&*clip(resolution, Duration::milliseconds(60_001)))
                .len(),
            1
        );
    }
}
