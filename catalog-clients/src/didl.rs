//! DIDL-Lite result parsing
//!
//! Turns the `Result` document of a ContentDirectory `Browse` into catalog
//! items. Containers become browsable items typed by their UPnP class;
//! `<item>` elements become tracks.

use media_endpoint::{MediaDatum, MediaDatumBuilder, MediaValue, Tag, TagRegistry};
use xmltree::{Element, XMLNode};

const NS_DIDL: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_UPNP: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";

const CLASS_ARTIST: &str = "object.container.person.musicArtist";
const CLASS_ALBUM: &str = "object.container.album.musicAlbum";
const CLASS_GENRE: &str = "object.container.genre.musicGenre";

/// Parse a DIDL-Lite document into items, in document order
///
/// A document that does not parse yields no items.
pub fn parse(didl: &str, tags: &TagRegistry) -> Vec<MediaDatum> {
    let root = match Element::parse(didl.as_bytes()) {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(error = %e, "discarding unparsable DIDL-Lite");
            return Vec::new();
        }
    };

    let mut elements = Vec::new();
    collect_descendants(&root, &mut elements);

    elements
        .into_iter()
        .filter_map(|element| match element.name.as_str() {
            "item" if is_in(element, NS_DIDL) => Some(parse_item(element, tags)),
            "container" if is_in(element, NS_DIDL) => parse_container(element, tags),
            _ => None,
        })
        .collect()
}

fn parse_item(element: &Element, tags: &TagRegistry) -> MediaDatum {
    let id = element.attributes.get("id").cloned();
    let mut builder = MediaDatum::builder(id, Vec::new());

    convert(element, NS_DC, "title", &mut builder, &tags.audio.title);
    convert(element, NS_UPNP, "album", &mut builder, &tags.audio.album);
    convert(element, NS_UPNP, "artist", &mut builder, &tags.audio.artist);
    convert(element, NS_DIDL, "res", &mut builder, &tags.audio.uri);
    convert(element, NS_UPNP, "albumArtURI", &mut builder, &tags.audio.artwork);

    builder.build()
}

fn parse_container(element: &Element, tags: &TagRegistry) -> Option<MediaDatum> {
    let id = element.attributes.get("id")?.clone();

    let class = first_text(element, NS_UPNP, "class");
    let (kind, title_tag): (&Tag, Option<&Tag>) = match class.as_deref() {
        Some(CLASS_ARTIST) => (&tags.audio.artist, Some(&tags.audio.artist)),
        Some(CLASS_ALBUM) => (&tags.audio.album, Some(&tags.audio.album)),
        Some(CLASS_GENRE) => (&tags.audio.genre, Some(&tags.audio.genre)),
        _ => (&tags.container.title, None),
    };

    let mut builder = MediaDatum::builder(Some(id), vec![kind.clone()]);
    convert(element, NS_DC, "title", &mut builder, &tags.container.title);
    convert(element, NS_UPNP, "albumArtURI", &mut builder, &tags.container.artwork);

    if let Some(title_tag) = title_tag {
        convert(element, NS_DC, "title", &mut builder, title_tag);
        if class.as_deref() == Some(CLASS_ALBUM) {
            convert(element, NS_UPNP, "artist", &mut builder, &tags.audio.album_artist);
        }
        convert(element, NS_UPNP, "albumArtURI", &mut builder, &tags.audio.artwork);
    }

    Some(builder.build())
}

/// Add the text of every non-empty matching descendant under `tag`
fn convert(
    element: &Element,
    namespace: &str,
    name: &str,
    builder: &mut MediaDatumBuilder,
    tag: &Tag,
) {
    let mut descendants = Vec::new();
    collect_descendants(element, &mut descendants);

    let values: Vec<String> = descendants
        .into_iter()
        .filter(|child| child.name == name && is_in(child, namespace))
        .filter_map(|child| child.get_text())
        .map(|text| text.into_owned())
        .filter(|text| !text.is_empty())
        .collect();

    if let Some(value) = MediaValue::from_values(values) {
        builder.add(tag, value);
    }
}

fn first_text(element: &Element, namespace: &str, name: &str) -> Option<String> {
    let mut descendants = Vec::new();
    collect_descendants(element, &mut descendants);
    descendants
        .into_iter()
        .find(|child| child.name == name && is_in(child, namespace))
        .map(|child| child.get_text().map(|t| t.into_owned()).unwrap_or_default())
}

fn is_in(element: &Element, namespace: &str) -> bool {
    element.namespace.as_deref() == Some(namespace)
}

/// Pre-order walk of every element below `element`
fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for node in &element.children {
        if let XMLNode::Element(child) = node {
            out.push(child);
            collect_descendants(child, out);
        }
    }
}
