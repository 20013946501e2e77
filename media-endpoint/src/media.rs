//! Catalog items and pages

use crate::tag::Tag;

/// One or more values for a tag
///
/// Never empty. Single-valued tags hold one entry; multi-valued tags
/// (artist, genre, artwork) keep every value in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaValue {
    values: Vec<String>,
}

impl MediaValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    /// Build from a list of values; `None` when the list is empty
    pub fn from_values<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            None
        } else {
            Some(Self { values })
        }
    }

    /// Primary value
    pub fn value(&self) -> &str {
        &self.values[0]
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn merge(&mut self, other: MediaValue) {
        self.values.extend(other.values);
    }
}

/// A catalog item: optional id, type tags and ordered metadata
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDatum {
    id: Option<String>,
    types: Vec<Tag>,
    metadata: Vec<(Tag, MediaValue)>,
}

impl MediaDatum {
    pub fn builder(id: Option<String>, types: Vec<Tag>) -> MediaDatumBuilder {
        MediaDatumBuilder {
            datum: MediaDatum {
                id,
                types,
                metadata: Vec::new(),
            },
        }
    }

    /// Catalog identifier used to browse into this item
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn types(&self) -> &[Tag] {
        &self.types
    }

    pub fn has_type(&self, tag: &Tag) -> bool {
        self.types.contains(tag)
    }

    pub fn get(&self, tag: &Tag) -> Option<&MediaValue> {
        self.metadata
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, value)| value)
    }

    /// Primary value for a tag
    pub fn value(&self, tag: &Tag) -> Option<&str> {
        self.get(tag).map(MediaValue::value)
    }

    /// Metadata in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &MediaValue)> {
        self.metadata.iter().map(|(tag, value)| (tag, value))
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

/// Accumulates metadata for a [`MediaDatum`]
#[derive(Debug)]
pub struct MediaDatumBuilder {
    datum: MediaDatum,
}

impl MediaDatumBuilder {
    /// Add a value; a tag seen before gets the new values appended
    pub fn add(&mut self, tag: &Tag, value: MediaValue) -> &mut Self {
        match self.datum.metadata.iter_mut().find(|(t, _)| t == tag) {
            Some((_, existing)) => existing.merge(value),
            None => self.datum.metadata.push((tag.clone(), value)),
        }
        self
    }

    pub fn build(self) -> MediaDatum {
        self.datum
    }
}

/// One page of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<T> {
    index: u32,
    items: Vec<T>,
}

impl<T> Fragment<T> {
    pub fn new(index: u32, items: Vec<T>) -> Self {
        Self { index, items }
    }

    /// Zero-based offset of the first item within the snapshot
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
