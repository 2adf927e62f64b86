use crate::node::{Attributes, Node, NodeKind};

/// Image block type with its owned vocabulary.
pub struct Image;

impl Image {
    /// Extensions that make a bare keyword an image file name.
    pub const EXTENSIONS: &'static [&'static str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
    /// Prefix for image sources written as a bare file name.
    pub const SOURCE_PREFIX: &'static str = "images/";
}

/// True for a single token ending in a recognised image extension.
pub fn is_image_filename(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((stem, ext)) = s.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && Image::EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Source path for a file name, prefixed unless it already is.
pub fn source_for(file: &str) -> String {
    if file.starts_with(Image::SOURCE_PREFIX) {
        file.to_string()
    } else {
        format!("{}{file}", Image::SOURCE_PREFIX)
    }
}

/// Builds an image node.
///
/// `alt` falls back to the file name. Other caller attributes (`id`,
/// `class`) are kept.
pub fn image_node(file: &str, alt: Option<&str>, attributes: &Attributes) -> Node {
    let alt = alt
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(file);
    let mut node = Node::new(NodeKind::Image, "")
        .with_attr("src", source_for(file))
        .with_attr("alt", alt);
    for (key, value) in attributes {
        if key != "alt" {
            node = node.with_attr(key.clone(), value.clone());
        }
    }
    node
}
