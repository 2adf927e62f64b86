use crate::{node::Attributes, parsing::blocks::image};

use super::{normalize::normalize, registry::KeywordRegistry};

/// The attribute whose value greedily takes the rest of the phrase.
pub const DESCRIPTION_ATTRIBUTE: &str = "alt";

/// The keyword-list separator in a compound phrase.
pub const COMPOUND_SEPARATOR: char = '+';

/// A problem found in a keyword phrase. Never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhraseError {
    #[error("empty keyword")]
    EmptyKeyword,

    #[error("unknown keyword `{keyword}`")]
    UnknownKeyword {
        keyword: String,
        suggestions: Vec<String>,
    },

    #[error("`{keyword}` cannot be combined with other keywords")]
    ReservedInCompound { keyword: String },

    #[error("unexpected token `{token}` among attributes")]
    InvalidAttribute { token: String },
}

impl PhraseError {
    /// Whether the marker carrying this error cannot be turned into a node.
    pub fn invalidates_marker(&self) -> bool {
        !matches!(self, PhraseError::InvalidAttribute { .. })
    }

    /// A human-readable fix, when one can be offered.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            PhraseError::UnknownKeyword { suggestions, .. } if !suggestions.is_empty() => {
                Some(format!("did you mean: {}", suggestions.join(", ")))
            }
            PhraseError::ReservedInCompound { keyword } => {
                Some(format!("use `{keyword}` on its own"))
            }
            PhraseError::InvalidAttribute { .. } => Some("write attributes as key=value".into()),
            _ => None,
        }
    }
}

/// A parsed keyword phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phrase {
    pub keywords: Vec<String>,
    pub attributes: Attributes,
    pub errors: Vec<PhraseError>,
}

impl Phrase {
    pub fn is_valid(&self) -> bool {
        !self.errors.iter().any(PhraseError::invalidates_marker)
    }
}

/// Splits a normalized phrase into its keyword part and attributes without
/// validating keywords. Stray tokens among attributes are returned separately.
pub fn split_phrase(normalized: &str) -> (&str, Attributes, Vec<String>) {
    let tokens: Vec<(usize, &str)> = token_offsets(normalized);
    let first_attr = tokens
        .iter()
        .position(|(_, t)| attribute_token(t).is_some())
        .unwrap_or(tokens.len());

    let keyword_part = match tokens.get(first_attr) {
        Some((offset, _)) => normalized[..*offset].trim(),
        None => normalized,
    };

    let mut attributes = Attributes::new();
    let mut stray = vec![];
    let mut i = first_attr;
    while i < tokens.len() {
        let (offset, token) = tokens[i];
        match attribute_token(token) {
            Some((key, _)) if key == DESCRIPTION_ATTRIBUTE => {
                let value_start = offset + key.len() + 1;
                attributes.insert(key.to_string(), normalized[value_start..].to_string());
                break;
            }
            Some((key, value)) => {
                attributes.insert(key.to_string(), value.to_string());
            }
            None => stray.push(token.to_string()),
        }
        i += 1;
    }

    (keyword_part, attributes, stray)
}

/// Parses a keyword phrase into keywords, attributes and errors.
///
/// Unknown keywords never abort: they are reported with the nearest known
/// keywords. A bare image file name counts as a known keyword.
pub fn parse(text: &str, registry: &KeywordRegistry) -> Phrase {
    let normalized = normalize(text);
    let (keyword_part, attributes, stray) = split_phrase(&normalized);

    let mut errors = vec![];
    let mut keywords = vec![];
    if !keyword_part.is_empty() {
        for segment in keyword_part.split(COMPOUND_SEPARATOR) {
            let segment = segment.trim();
            if segment.is_empty() {
                errors.push(PhraseError::EmptyKeyword);
            } else {
                keywords.push(segment.to_string());
            }
        }
    }

    for keyword in &keywords {
        if registry.is_known(keyword) || image::is_image_filename(keyword) {
            let reserved = registry.is_toc(keyword)
                || registry.is_image(keyword)
                || image::is_image_filename(keyword);
            if keywords.len() > 1 && reserved {
                errors.push(PhraseError::ReservedInCompound {
                    keyword: keyword.clone(),
                });
            }
            continue;
        }
        errors.push(PhraseError::UnknownKeyword {
            keyword: keyword.clone(),
            suggestions: registry.suggest(keyword),
        });
    }

    errors.extend(
        stray
            .into_iter()
            .map(|token| PhraseError::InvalidAttribute { token }),
    );

    Phrase {
        keywords,
        attributes,
        errors,
    }
}

/// `key=value` with an identifier-like key.
fn attribute_token(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let mut chars = key.chars();
    let first = chars.next()?;
    let is_ident = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    is_ident.then_some((key, value))
}

fn token_offsets(s: &str) -> Vec<(usize, &str)> {
    let mut out = vec![];
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c == ' ', start) {
            (true, Some(st)) => {
                out.push((st, &s[st..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, &s[st..]));
    }
    out
}
