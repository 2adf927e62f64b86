use crate::node::NodeKind;

/// Keywords allowed in the `#kw#content##` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKeyword {
    Strong,
    Emphasis,
    Mark,
    Underline,
    Code,
    Strikethrough,
    Ruby,
}

impl InlineKeyword {
    const TABLE: &'static [(&'static str, InlineKeyword)] = &[
        ("太字", InlineKeyword::Strong),
        ("イタリック", InlineKeyword::Emphasis),
        ("ハイライト", InlineKeyword::Mark),
        ("下線", InlineKeyword::Underline),
        ("コード", InlineKeyword::Code),
        ("取り消し線", InlineKeyword::Strikethrough),
        ("ルビ", InlineKeyword::Ruby),
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(kw, _)| *kw == keyword)
            .map(|(_, k)| *k)
    }

    pub fn keywords() -> impl Iterator<Item = &'static str> {
        Self::TABLE.iter().map(|(kw, _)| *kw)
    }

    /// Node kind for the simple wrappers. Ruby needs its reading, so it has none.
    pub fn node_kind(self) -> Option<NodeKind> {
        match self {
            InlineKeyword::Strong => Some(NodeKind::Strong),
            InlineKeyword::Emphasis => Some(NodeKind::Emphasis),
            InlineKeyword::Mark => Some(NodeKind::Mark),
            InlineKeyword::Underline => Some(NodeKind::Underline),
            InlineKeyword::Code => Some(NodeKind::Code),
            InlineKeyword::Strikethrough => Some(NodeKind::Strikethrough),
            InlineKeyword::Ruby => None,
        }
    }

    /// Code and ruby content is never scanned for nested markers.
    pub fn is_raw(self) -> bool {
        matches!(self, InlineKeyword::Code | InlineKeyword::Ruby)
    }
}
