//! Core type definitions for media attachments.
//!
//! This module defines the closed set of resource kinds that can own media,
//! the semantic tags an image can carry, and the cardinality class of each
//! tag. All enums are serialized in snake_case, matching the ledger's text
//! columns and the metadata embedded in external store objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of domain resource that can own media attachments.
///
/// Closed enum: each kind carries its own valid tag set, checked where an
/// upload context is constructed rather than at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A member's profile.
    UserProfile,
    /// A business listed in the directory.
    Business,
    /// A feed post.
    Post,
    /// A news article.
    News,
}

impl ResourceKind {
    /// The tags that may be attached to resources of this kind.
    pub fn allowed_tags(&self) -> &'static [MediaTag] {
        match self {
            Self::UserProfile => &[MediaTag::ProfilePic, MediaTag::Banner],
            Self::Business => &[MediaTag::Logo, MediaTag::Banner, MediaTag::Gallery],
            Self::Post => &[MediaTag::FeaturedImage, MediaTag::Gallery],
            Self::News => &[MediaTag::FeaturedImage, MediaTag::Gallery],
        }
    }

    /// Whether `tag` is valid for resources of this kind.
    pub fn allows(&self, tag: MediaTag) -> bool {
        self.allowed_tags().contains(&tag)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserProfile => write!(f, "user_profile"),
            Self::Business => write!(f, "business"),
            Self::Post => write!(f, "post"),
            Self::News => write!(f, "news"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_profile" => Ok(Self::UserProfile),
            "business" => Ok(Self::Business),
            "post" => Ok(Self::Post),
            "news" => Ok(Self::News),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Cardinality class of a media tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// At most one attachment per resource.
    Singular,
    /// Ordered, multi-valued attachment set per resource.
    Collection,
}

/// Semantic role an image plays for its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaTag {
    /// A member's profile picture.
    ProfilePic,
    /// Wide header image for a profile or business page.
    Banner,
    /// A business logo.
    Logo,
    /// Lead image of a post or news article.
    FeaturedImage,
    /// Ordered image gallery.
    Gallery,
}

impl MediaTag {
    /// Cardinality class of this tag.
    pub fn kind(&self) -> TagKind {
        match self {
            Self::ProfilePic | Self::Banner | Self::Logo | Self::FeaturedImage => TagKind::Singular,
            Self::Gallery => TagKind::Collection,
        }
    }

    /// Whether this tag admits at most one attachment per resource.
    pub fn is_singular(&self) -> bool {
        self.kind() == TagKind::Singular
    }

    /// All tags classified as singular. Mirrors the partial unique index in
    /// the ledger schema; keep the two in sync.
    pub fn singular_tags() -> &'static [MediaTag] {
        &[
            Self::ProfilePic,
            Self::Banner,
            Self::Logo,
            Self::FeaturedImage,
        ]
    }
}

impl fmt::Display for MediaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfilePic => write!(f, "profile_pic"),
            Self::Banner => write!(f, "banner"),
            Self::Logo => write!(f, "logo"),
            Self::FeaturedImage => write!(f, "featured_image"),
            Self::Gallery => write!(f, "gallery"),
        }
    }
}

impl FromStr for MediaTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile_pic" => Ok(Self::ProfilePic),
            "banner" => Ok(Self::Banner),
            "logo" => Ok(Self::Logo),
            "featured_image" => Ok(Self::FeaturedImage),
            "gallery" => Ok(Self::Gallery),
            other => Err(format!("unknown media tag: {other}")),
        }
    }
}
