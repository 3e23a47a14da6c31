use crate::{
    media::{
        ContentItem, MediaRules, MediaViolation, UploadedFile,
        classify::ContentClassifier,
        inspect::MediaInspector,
        validator::{
            ClipValidators, FileSizeValidator, FileValidators, ImageResolutionValidator,
            ImageValidators, VideoDurationValidator, VideoResolutionValidator,
        },
    },
    model::media::ContentKind,
};
use thiserror::Error;
use tracing::debug;

/// Every violation found for one file.
#[derive(Clone, PartialEq, Debug, Error)]
#[error("{file_name} was rejected with {} violation(s)", .violations.len())]
pub struct FileRejection {
    pub file_name: String,
    pub violations: Vec<MediaViolation>,
}

impl FileRejection {
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Classifies an upload and runs the validator chain for its kind.
pub struct MediaContentValidation<I> {
    classifier: ContentClassifier,
    inspector: I,
    image_file_validators: FileValidators,
    image_validators: ImageValidators,
    video_file_validators: FileValidators,
    clip_validators: ClipValidators,
}

impl<I: MediaInspector> MediaContentValidation<I> {
    #[must_use]
    pub fn new(rules: &MediaRules, inspector: I) -> Self {
        Self {
            classifier: ContentClassifier::new(&rules.image_extensions, &rules.video_extensions),
            inspector,
            image_file_validators: vec![Box::new(FileSizeValidator::new(rules.image_max_size))],
            image_validators: vec![Box::new(ImageResolutionValidator::new(
                rules.image_min_resolution,
            ))],
            video_file_validators: vec![Box::new(FileSizeValidator::new(rules.video_max_size))],
            clip_validators: vec![
                Box::new(VideoResolutionValidator::new(
                    rules.video_horizontal,
                    rules.video_vertical,
                )),
                Box::new(VideoDurationValidator::new(rules.video_max_duration)),
            ],
        }
    }

    /// Blocks on file I/O and, for videos, on the inspector.
    pub fn validate(&self, file: UploadedFile) -> Result<ContentItem, FileRejection> {
        let kind = match self.classifier.classify(&file.file_name) {
            Ok(kind) => kind,
            Err(violation) => {
                return Err(FileRejection {
                    file_name: file.file_name,
                    violations: vec![violation],
                });
            }
        };

        let violations = match kind {
            ContentKind::Image => self.image_violations(&file),
            ContentKind::Video => self.video_violations(&file),
        };

        if violations.is_empty() {
            debug!(file_name = %file.file_name, %kind, "Upload passed validation");
            Ok(ContentItem { file, kind })
        } else {
            debug!(file_name = %file.file_name, %kind, ?violations, "Upload rejected");
            Err(FileRejection {
                file_name: file.file_name,
                violations,
            })
        }
    }

    fn image_violations(&self, file: &UploadedFile) -> Vec<MediaViolation> {
        let mut violations: Vec<MediaViolation> = self
            .image_file_validators
            .iter()
            .flat_map(|validator| validator.evaluate(file))
            .collect();

        match self.inspector.image_resolution(&file.path) {
            Ok(resolution) => violations.extend(
                self.image_validators
                    .iter()
                    .flat_map(|validator| validator.evaluate(&resolution)),
            ),
            Err(err) => violations.push(MediaViolation::Unreadable {
                kind: ContentKind::Image,
                reason: err.to_string(),
            }),
        }

        violations
    }

    fn video_violations(&self, file: &UploadedFile) -> Vec<MediaViolation> {
        let mut violations: Vec<MediaViolation> = self
            .video_file_validators
            .iter()
            .flat_map(|validator| validator.evaluate(file))
            .collect();

        match self.inspector.open_clip(&file.path) {
            Ok(clip) => {
                violations.extend(
                    self.clip_validators
                        .iter()
                        .flat_map(|validator| validator.evaluate(&clip)),
                );
            }
            Err(err) => violations.push(MediaViolation::Unreadable {
                kind: ContentKind::Video,
                reason: err.to_string(),
            }),
        }

        violations
    }
}
