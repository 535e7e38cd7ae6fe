//! Canned upload policies per attachment purpose.
//!
//! Route handlers pass a purpose name and receive the (resource kind, tag,
//! options) triple, so cardinality policy lives here instead of being
//! scattered across route code.

use gradnet_common::{MediaTag, ResourceKind};

use super::upload::UploadOptions;

const MB: usize = 1024 * 1024;

/// MIME types accepted for image uploads across all purposes.
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Known attachment purposes, the stable contract consumed by route
/// handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPurpose {
    ProfilePicture,
    ProfileBanner,
    BusinessLogo,
    BusinessBanner,
    PostGalleryImage,
}

/// Policy bundle for one purpose.
#[derive(Debug, Clone)]
pub struct UploadPreset {
    pub resource_kind: ResourceKind,
    pub tag: MediaTag,
    pub options: UploadOptions,
}

impl UploadPurpose {
    /// The canned policy for this purpose.
    ///
    /// Note the asymmetry: a business logo upload does not pre-delete the
    /// existing logo; callers are expected to delete explicitly before
    /// re-uploading. Every other singular purpose replaces in place.
    pub fn preset(&self) -> UploadPreset {
        match self {
            Self::ProfilePicture => UploadPreset {
                resource_kind: ResourceKind::UserProfile,
                tag: MediaTag::ProfilePic,
                options: UploadOptions {
                    max_file_size: 5 * MB,
                    replace_existing: true,
                    ..UploadOptions::default()
                },
            },
            Self::ProfileBanner => UploadPreset {
                resource_kind: ResourceKind::UserProfile,
                tag: MediaTag::Banner,
                options: UploadOptions {
                    max_file_size: 8 * MB,
                    replace_existing: true,
                    ..UploadOptions::default()
                },
            },
            Self::BusinessLogo => UploadPreset {
                resource_kind: ResourceKind::Business,
                tag: MediaTag::Logo,
                options: UploadOptions {
                    max_file_size: 3 * MB,
                    replace_existing: false,
                    ..UploadOptions::default()
                },
            },
            Self::BusinessBanner => UploadPreset {
                resource_kind: ResourceKind::Business,
                tag: MediaTag::Banner,
                options: UploadOptions {
                    max_file_size: 10 * MB,
                    replace_existing: true,
                    ..UploadOptions::default()
                },
            },
            Self::PostGalleryImage => UploadPreset {
                resource_kind: ResourceKind::Post,
                tag: MediaTag::Gallery,
                options: UploadOptions {
                    max_file_size: 10 * MB,
                    replace_existing: false,
                    global_positioning: true,
                    ..UploadOptions::default()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_use_allowed_tags() {
        for purpose in [
            UploadPurpose::ProfilePicture,
            UploadPurpose::ProfileBanner,
            UploadPurpose::BusinessLogo,
            UploadPurpose::BusinessBanner,
            UploadPurpose::PostGalleryImage,
        ] {
            let preset = purpose.preset();
            assert!(
                preset.resource_kind.allows(preset.tag),
                "{purpose:?} pairs {:?} with disallowed tag {:?}",
                preset.resource_kind,
                preset.tag
            );
        }
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(UploadPurpose::ProfilePicture.preset().options.max_file_size, 5 * MB);
        assert_eq!(UploadPurpose::BusinessLogo.preset().options.max_file_size, 3 * MB);
        assert_eq!(
            UploadPurpose::PostGalleryImage.preset().options.max_file_size,
            10 * MB
        );
    }

    #[test]
    fn test_logo_does_not_replace() {
        assert!(!UploadPurpose::BusinessLogo.preset().options.replace_existing);
        assert!(UploadPurpose::BusinessBanner.preset().options.replace_existing);
    }

    #[test]
    fn test_gallery_positions_globally() {
        let preset = UploadPurpose::PostGalleryImage.preset();
        assert!(preset.options.global_positioning);
        assert!(!UploadPurpose::ProfilePicture.preset().options.global_positioning);
    }
}
