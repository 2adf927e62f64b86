use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::node::NodeKind;

use super::suggest;

/// Reserved keyword producing a table-of-contents marker.
pub const TOC_KEYWORD: &str = "目次";
/// Reserved keyword producing an image.
pub const IMAGE_KEYWORD: &str = "画像";

/// How many nearest keywords an unknown-keyword diagnostic offers.
pub const SUGGESTION_COUNT: usize = 3;

/// Tag semantics a block keyword maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTag {
    Details,
    Box,
    Highlight,
    Heading(u8),
    Strong,
    Emphasis,
    /// Any other HTML tag, from a registry override.
    Element(String),
}

impl BlockTag {
    /// Position in the fixed outer-to-inner nesting order. Lower is outer.
    pub fn rank(&self) -> u8 {
        match self {
            BlockTag::Details => 0,
            BlockTag::Box | BlockTag::Highlight => 1,
            BlockTag::Heading(_) => 2,
            BlockTag::Strong => 3,
            BlockTag::Emphasis => 4,
            BlockTag::Element(_) => 5,
        }
    }

    pub fn node_kind(&self) -> NodeKind {
        match self {
            BlockTag::Details => NodeKind::Details,
            BlockTag::Box => NodeKind::Box,
            BlockTag::Highlight => NodeKind::Highlight,
            BlockTag::Heading(level) => NodeKind::Heading(*level),
            BlockTag::Strong => NodeKind::Strong,
            BlockTag::Emphasis => NodeKind::Emphasis,
            BlockTag::Element(tag) => NodeKind::Element(tag.clone()),
        }
    }

    /// Maps an HTML tag name (plus class, for `div`) onto a tag.
    pub fn from_html(tag: &str, class: Option<&str>) -> Self {
        match (tag, class) {
            ("details", _) => BlockTag::Details,
            ("div", Some("box")) => BlockTag::Box,
            ("div", Some("highlight")) => BlockTag::Highlight,
            ("strong", _) => BlockTag::Strong,
            ("em", _) => BlockTag::Emphasis,
            ("h1", _) => BlockTag::Heading(1),
            ("h2", _) => BlockTag::Heading(2),
            ("h3", _) => BlockTag::Heading(3),
            ("h4", _) => BlockTag::Heading(4),
            ("h5", _) => BlockTag::Heading(5),
            (other, _) => BlockTag::Element(other.to_string()),
        }
    }
}

/// A registry entry: the tag plus its fixed defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub tag: BlockTag,
    pub class: Option<String>,
    pub summary: Option<String>,
}

impl TagSpec {
    fn plain(tag: BlockTag) -> Self {
        Self {
            tag,
            class: None,
            summary: None,
        }
    }

    fn classed(tag: BlockTag, class: &str) -> Self {
        Self {
            tag,
            class: Some(class.to_string()),
            summary: None,
        }
    }

    fn details(summary: &str) -> Self {
        Self {
            tag: BlockTag::Details,
            class: None,
            summary: Some(summary.to_string()),
        }
    }
}

/// A keyword defined in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomKeyword {
    pub tag: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Registry override source: extra aliases and keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordOverrides {
    /// alias -> canonical keyword
    pub aliases: BTreeMap<String, String>,
    /// keyword -> tag definition
    pub custom: BTreeMap<String, CustomKeyword>,
}

/// Keyword -> tag mapping used by the block parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRegistry {
    entries: IndexMap<String, TagSpec>,
    aliases: IndexMap<String, String>,
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        let mut entries = IndexMap::new();
        entries.insert("太字".into(), TagSpec::plain(BlockTag::Strong));
        entries.insert("イタリック".into(), TagSpec::plain(BlockTag::Emphasis));
        entries.insert("枠線".into(), TagSpec::classed(BlockTag::Box, "box"));
        entries.insert(
            "ハイライト".into(),
            TagSpec::classed(BlockTag::Highlight, "highlight"),
        );
        for level in 1..=5u8 {
            entries.insert(
                format!("見出し{level}"),
                TagSpec::plain(BlockTag::Heading(level)),
            );
        }
        entries.insert("折りたたみ".into(), TagSpec::details("詳細を表示"));
        entries.insert("ネタバレ".into(), TagSpec::details("ネタバレを表示"));

        Self {
            entries,
            aliases: IndexMap::new(),
        }
    }
}

impl KeywordRegistry {
    pub fn with_overrides(overrides: &KeywordOverrides) -> Self {
        let mut registry = Self::default();
        registry.apply_overrides(overrides);
        registry
    }

    /// Adds custom keywords first, then aliases (which may point at them).
    pub fn apply_overrides(&mut self, overrides: &KeywordOverrides) {
        for (keyword, custom) in &overrides.custom {
            let tag = BlockTag::from_html(&custom.tag, custom.class.as_deref());
            self.entries.insert(
                keyword.clone(),
                TagSpec {
                    tag,
                    class: custom.class.clone(),
                    summary: custom.summary.clone(),
                },
            );
        }
        for (alias, canonical) in &overrides.aliases {
            if self.entries.contains_key(canonical) || is_reserved(canonical) {
                self.aliases.insert(alias.clone(), canonical.clone());
            } else {
                log::warn!("ignoring alias {alias:?}: unknown keyword {canonical:?}");
            }
        }
    }

    /// Resolves aliases to the canonical keyword.
    pub fn canonical<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.aliases
            .get(keyword)
            .map(String::as_str)
            .unwrap_or(keyword)
    }

    pub fn lookup(&self, keyword: &str) -> Option<&TagSpec> {
        self.entries.get(self.canonical(keyword))
    }

    pub fn is_toc(&self, keyword: &str) -> bool {
        self.canonical(keyword) == TOC_KEYWORD
    }

    pub fn is_image(&self, keyword: &str) -> bool {
        self.canonical(keyword) == IMAGE_KEYWORD
    }

    /// Known tag keywords, aliases and reserved keywords.
    pub fn is_known(&self, keyword: &str) -> bool {
        self.lookup(keyword).is_some() || is_reserved(self.canonical(keyword))
    }

    /// Every keyword an author may write, in registry order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .chain([TOC_KEYWORD, IMAGE_KEYWORD])
            .chain(self.aliases.keys().map(String::as_str))
    }

    /// Nearest known keywords for an unknown one.
    pub fn suggest(&self, keyword: &str) -> Vec<String> {
        suggest::nearest(keyword, self.keywords(), SUGGESTION_COUNT)
    }
}

fn is_reserved(keyword: &str) -> bool {
    keyword == TOC_KEYWORD || keyword == IMAGE_KEYWORD
}
