//! Metadata tags
//!
//! A [`Tag`] names one kind of metadata (title, artist, artwork, ...).
//! Tags are handed out by a [`TagRegistry`] and compare by identity: two
//! registries never produce equal tags, even for the same name.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

struct TagInfo {
    id: u32,
    name: &'static str,
    full_name: String,
}

/// Identity-compared metadata tag
#[derive(Clone)]
pub struct Tag(Arc<TagInfo>);

impl Tag {
    fn new(id: u32, group: &str, name: &'static str) -> Self {
        Self(Arc::new(TagInfo {
            id,
            name,
            full_name: format!("{group}.{name}"),
        }))
    }

    /// Numeric identifier used on the wire by JSON catalogs
    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        self.0.name
    }

    /// Qualified name, e.g. `audio.artist`
    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag({})", self.0.full_name)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.full_name)
    }
}

// ============================================================================
// TagRegistry
// ============================================================================

/// Tags describing containers
#[derive(Debug, Clone)]
pub struct ContainerTags {
    pub title: Tag,
    pub artwork: Tag,
}

/// Tags describing audio items
#[derive(Debug, Clone)]
pub struct AudioTags {
    pub title: Tag,
    pub artist: Tag,
    pub album: Tag,
    pub album_artist: Tag,
    pub genre: Tag,
    pub artwork: Tag,
    pub uri: Tag,
    pub track_number: Tag,
    pub duration: Tag,
    pub composer: Tag,
}

/// The set of well-known tags
///
/// | id  | full name            |
/// |-----|----------------------|
/// | 1   | `container.title`    |
/// | 2   | `container.artwork`  |
/// | 101 | `audio.title`        |
/// | 102 | `audio.artist`       |
/// | 103 | `audio.album`        |
/// | 104 | `audio.album_artist` |
/// | 105 | `audio.genre`        |
/// | 106 | `audio.artwork`      |
/// | 107 | `audio.uri`          |
/// | 108 | `audio.track_number` |
/// | 109 | `audio.duration`     |
/// | 110 | `audio.composer`     |
#[derive(Debug, Clone)]
pub struct TagRegistry {
    pub container: ContainerTags,
    pub audio: AudioTags,
    by_id: HashMap<u32, Tag>,
}

impl TagRegistry {
    pub fn new() -> Self {
        let container = ContainerTags {
            title: Tag::new(1, "container", "title"),
            artwork: Tag::new(2, "container", "artwork"),
        };
        let audio = AudioTags {
            title: Tag::new(101, "audio", "title"),
            artist: Tag::new(102, "audio", "artist"),
            album: Tag::new(103, "audio", "album"),
            album_artist: Tag::new(104, "audio", "album_artist"),
            genre: Tag::new(105, "audio", "genre"),
            artwork: Tag::new(106, "audio", "artwork"),
            uri: Tag::new(107, "audio", "uri"),
            track_number: Tag::new(108, "audio", "track_number"),
            duration: Tag::new(109, "audio", "duration"),
            composer: Tag::new(110, "audio", "composer"),
        };

        let by_id = [
            &container.title,
            &container.artwork,
            &audio.title,
            &audio.artist,
            &audio.album,
            &audio.album_artist,
            &audio.genre,
            &audio.artwork,
            &audio.uri,
            &audio.track_number,
            &audio.duration,
            &audio.composer,
        ]
        .into_iter()
        .map(|tag| (tag.id(), tag.clone()))
        .collect();

        Self {
            container,
            audio,
            by_id,
        }
    }

    pub fn by_id(&self, id: u32) -> Option<&Tag> {
        self.by_id.get(&id)
    }

    pub fn by_full_name(&self, full_name: &str) -> Option<&Tag> {
        self.by_id.values().find(|tag| tag.full_name() == full_name)
    }

    /// Every registered tag, in id order
    pub fn tags(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.by_id.values().collect();
        tags.sort_by_key(|tag| tag.id());
        tags
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
