//! Lazy element kinds.

/// Kind of element the pipeline handles, decided by tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyKind {
    /// `<img>` - relies on a missing `src` while hidden
    Image,
    /// `<video>` - placeholder `src` and poster while hidden
    Video,
    /// `<audio>` - placeholder `src` while hidden
    Audio,
    /// `<div>` - candidate for a deferred `background-image`
    Container,
    /// `<script>` - deferred until after page load
    Script,
}

impl LazyKind {
    /// Classify a lowercase tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "img" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "div" => Some(Self::Container),
            "script" => Some(Self::Script),
            _ => None,
        }
    }

    /// Media elements that get the placeholder URI instead of an empty `src`.
    #[inline]
    pub fn is_media(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// Kinds routed through placement (everything but scripts).
    #[inline]
    pub fn is_placeable(self) -> bool {
        !matches!(self, Self::Script)
    }

    /// Display name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Container => "container",
            Self::Script => "script",
        }
    }
}
