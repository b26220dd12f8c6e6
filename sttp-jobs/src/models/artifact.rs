//! Artifact naming convention
//!
//! Audio artifacts are named `<convoId>_<ambientVariant>_<processedVolume>.<ext>`,
//! e.g. `C7_forest_40.wav`: conversation C7, layered with the "forest"
//! ambient at volume 40.

use serde::Serialize;
use std::path::Path;

use crate::error::JobError;

/// Metadata carried by an artifact's file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactName {
    /// Base file name including extension
    pub file_name: String,
    pub convo_id: String,
    pub ambient_variant: String,
    pub processed_volume: String,
}

impl ArtifactName {
    /// Parse a base file name
    pub fn parse(file_name: &str) -> Result<Self, JobError> {
        let (stem, extension) = file_name.rsplit_once('.').ok_or_else(|| {
            JobError::NamingConvention(format!("{}: missing extension", file_name))
        })?;

        if extension.is_empty() {
            return Err(JobError::NamingConvention(format!(
                "{}: empty extension",
                file_name
            )));
        }

        let segments: Vec<&str> = stem.split('_').collect();
        match segments.as_slice() {
            [convo_id, ambient_variant, processed_volume]
                if !convo_id.is_empty()
                    && !ambient_variant.is_empty()
                    && !processed_volume.is_empty() =>
            {
                Ok(Self {
                    file_name: file_name.to_string(),
                    convo_id: convo_id.to_string(),
                    ambient_variant: ambient_variant.to_string(),
                    processed_volume: processed_volume.to_string(),
                })
            }
            _ => Err(JobError::NamingConvention(format!(
                "{}: expected <convoId>_<ambientVariant>_<processedVolume>.<ext>, found {} segment(s)",
                file_name,
                segments.iter().filter(|s| !s.is_empty()).count()
            ))),
        }
    }

    /// Parse the base name of a path
    pub fn from_path(path: &Path) -> Result<Self, JobError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                JobError::NamingConvention(format!("{}: no usable file name", path.display()))
            })?;
        Self::parse(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_conforming_name() {
        let name = ArtifactName::parse("C7_forest_40.wav").unwrap();
        assert_eq!(name.file_name, "C7_forest_40.wav");
        assert_eq!(name.convo_id, "C7");
        assert_eq!(name.ambient_variant, "forest");
        assert_eq!(name.processed_volume, "40");
    }

    #[test]
    fn test_parse_from_nested_path() {
        let path = PathBuf::from("/data/dialogs/C12_cafe_15.mp3");
        let name = ArtifactName::from_path(&path).unwrap();
        assert_eq!(name.file_name, "C12_cafe_15.mp3");
        assert_eq!(name.convo_id, "C12");
        assert_eq!(name.ambient_variant, "cafe");
        assert_eq!(name.processed_volume, "15");
    }

    #[test]
    fn test_rejects_wrong_segment_counts() {
        for bad in [
            "C7_forest.wav",
            "C7.wav",
            "C7_forest_40_extra.wav",
            "C7__40.wav",
            "_forest_40.wav",
            "C7_forest_.wav",
        ] {
            let err = ArtifactName::parse(bad).unwrap_err();
            assert!(
                matches!(err, JobError::NamingConvention(_)),
                "{} should be a naming error",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_missing_extension() {
        assert!(matches!(
            ArtifactName::parse("C7_forest_40"),
            Err(JobError::NamingConvention(_))
        ));
        assert!(matches!(
            ArtifactName::parse("C7_forest_40."),
            Err(JobError::NamingConvention(_))
        ));
    }

    #[test]
    fn test_volume_keeps_inner_dots_out_of_extension() {
        // Only the last dot separates the extension
        let name = ArtifactName::parse("C7_forest_40.5.wav").unwrap();
        assert_eq!(name.processed_volume, "40.5");
    }
}
