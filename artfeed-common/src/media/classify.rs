use crate::{media::MediaViolation, model::media::ContentKind};
use std::{collections::BTreeSet, path::Path};

/// Decides the kind of an upload from its file name alone.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ContentClassifier {
    image_extensions: BTreeSet<String>,
    video_extensions: BTreeSet<String>,
}

impl ContentClassifier {
    /// Extensions are matched case-insensitively; surrounding whitespace and
    /// a leading dot are ignored.
    #[must_use]
    pub fn new(
        image_extensions: impl IntoIterator<Item = impl AsRef<str>>,
        video_extensions: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        fn normalize(extensions: impl IntoIterator<Item = impl AsRef<str>>) -> BTreeSet<String> {
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        }

        Self {
            image_extensions: normalize(image_extensions),
            video_extensions: normalize(video_extensions),
        }
    }

    pub fn classify(&self, file_name: &str) -> Result<ContentKind, MediaViolation> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if self.image_extensions.contains(&extension) {
            Ok(ContentKind::Image)
        } else if self.video_extensions.contains(&extension) {
            Ok(ContentKind::Video)
        } else {
            Err(MediaViolation::UnsupportedExtension(extension))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        media::{MediaViolation, classify::ContentClassifier},
        model::media::ContentKind,
    };

    fn classifier() -> ContentClassifier {
        ContentClassifier::new(["jpg", "png"], [".MP4", "mov"])
    }

    #[test]
    fn extension_decides_kind() {
        let classifier = classifier();

        assert_eq!(classifier.classify("sunset.jpg"), Ok(ContentKind::Image));
        assert_eq!(classifier.classify("clip.mp4"), Ok(ContentKind::Video));
        assert_eq!(classifier.classify("archive.tar.mov"), Ok(ContentKind::Video));
    }

    #[test]
    fn case_insensitive() {
        let classifier = classifier();

        assert_eq!(classifier.classify("SUNSET.JPG"), Ok(ContentKind::Image));
        assert_eq!(classifier.classify("Clip.Mp4"), Ok(ContentKind::Video));
    }

    #[test]
    fn listed_extensions_are_trimmed() {
        let classifier = ContentClassifier::new(["png", " tiff", " .webp "], ["  "]);

        assert_eq!(classifier.classify("scan.tiff"), Ok(ContentKind::Image));
        assert_eq!(classifier.classify("sticker.webp"), Ok(ContentKind::Image));
        assert_eq!(
            classifier.classify("blank."),
            Err(MediaViolation::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn unlisted_extension_is_rejected() {
        let classifier = classifier();

        assert_eq!(
            classifier.classify("notes.TXT"),
            Err(MediaViolation::UnsupportedExtension("txt".to_owned()))
        );
        assert_eq!(
            classifier.classify("no_extension"),
            Err(MediaViolation::UnsupportedExtension(String::new()))
        );
        assert_eq!(
            classifier.classify(".png"),
            Err(MediaViolation::UnsupportedExtension(String::new()))
        );
    }
}
