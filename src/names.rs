//! Name normalization. Every title, artist and album string that takes part in matching passes
//! through here first: the raw form is kept for display, a folded canonical form is used for
//! comparison, and alternate names found in trailing brackets become extra variants.
//!
//! Catalog titles are frequently written as `Native (Romanized)` or `English (Native)`, so a name
//! is treated as a small set of equally valid spellings rather than a single string.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::common::uniq;

/// Bracket pairs that may enclose an alternate name or a qualifier at the end of a name.
const ENCLOSURES: &[(char, char)] = &[
    ('(', ')'),
    ('[', ']'),
    ('{', '}'),
    ('（', '）'),
    ('［', '］'),
    ('【', '】'),
    ('「', '」'),
    ('『', '』'),
    ('〈', '〉'),
    ('《', '》'),
];

const APOSTROPHES: &[char] = &['\'', '’', '‘', '`', 'ʼ'];

static FEATURING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(feat\.?|ft\.?|featuring|with)\s").unwrap());
static DASH_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*\S)\s+[-–—~]\s+(.+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedName {
    raw: String,
    canonical: String,
    variants: Vec<String>,
}

impl NormalizedName {
    pub fn new(raw: &str) -> Self {
        normalize(raw)
    }

    /// Builds one name out of several spellings supplied separately, e.g. a catalog that lists the
    /// native title and the English title as distinct fields. The first non-blank spelling is the
    /// primary one.
    pub fn from_alternates<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut primary: Option<NormalizedName> = None;
        let mut extra = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            let parsed = normalize(name);
            if primary.is_none() {
                primary = Some(parsed);
                continue;
            }
            extra.extend(parsed.variants);
        }
        let mut primary = primary.unwrap_or_else(|| normalize(""));
        primary.variants.extend(extra);
        primary.variants = uniq(std::mem::take(&mut primary.variants));
        primary
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// All comparable spellings. The canonical form comes first when it is non-empty.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn is_equivalent(&self, other: &NormalizedName) -> bool {
        !self.is_empty() && self.canonical == other.canonical
    }

    pub fn is_related(&self, other: &NormalizedName) -> bool {
        self.variants.iter().any(|v| other.variants.contains(v))
    }
}

impl std::fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Normalizes a raw name. Total: any input, including the empty string, produces a name.
pub fn normalize(raw: &str) -> NormalizedName {
    let parsed = parse_name(raw);
    let mut canonical = fold(&parsed.base);
    if canonical.is_empty() {
        canonical = fold(raw);
    }

    let mut variants = vec![canonical.clone()];
    variants.extend(parsed.alternates.iter().map(|a| fold(a)));
    if let Some(stripped) = strip_ost(&canonical) {
        variants.push(stripped);
    }
    variants.retain(|v| !v.is_empty());

    NormalizedName {
        raw: raw.to_string(),
        canonical,
        variants: uniq(variants),
    }
}

/// Qualifier labels (live, remix, language version, ...) that distinguish recordings sharing a
/// base title.
pub fn disambiguators(raw: &str) -> BTreeSet<String> {
    parse_name(raw).qualifiers
}

/// Folds text into its comparison form: compatibility-folded, lowercased, Latin diacritics
/// removed, punctuation turned into whitespace and whitespace collapsed.
pub fn fold(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    let stripped: String = lowered.nfd().filter(|c| !is_latin_diacritic(*c)).nfc().collect();

    let mut spaced = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            c if APOSTROPHES.contains(&c) => {}
            '&' => spaced.push_str(" and "),
            c if c.is_alphanumeric() || is_combining_mark(c) => spaced.push(c),
            _ => spaced.push(' '),
        }
    }

    let folded = collapse_whitespace(&spaced);
    if folded.is_empty() {
        // Names made purely of symbols are still told apart by their symbols.
        return collapse_whitespace(&stripped);
    }
    folded
}

/// Display-preserving comparison form: NFC with surrounding and repeated whitespace removed. Case
/// and punctuation are kept, since those are what a retag would change.
pub fn display_form(text: &str) -> String {
    collapse_whitespace(&text.nfc().collect::<String>())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_latin_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn strip_ost(canonical: &str) -> Option<String> {
    canonical
        .strip_suffix(" ost")
        .map(str::trim_end)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

struct ParsedName {
    base: String,
    alternates: Vec<String>,
    qualifiers: BTreeSet<String>,
}

fn parse_name(raw: &str) -> ParsedName {
    let mut rest = raw.trim().to_string();
    let mut groups = Vec::new();
    while let Some((head, group)) = peel_enclosed(&rest) {
        if head.trim().is_empty() {
            break;
        }
        let head = head.trim_end().to_string();
        groups.insert(0, group);
        rest = head;
    }

    let mut qualifiers = BTreeSet::new();
    let dash_suffix = DASH_SUFFIX_REGEX.captures(&rest).and_then(|caps| {
        let labels = qualifier_group(&caps[2])?;
        Some((caps[1].to_string(), labels))
    });
    if let Some((base, labels)) = dash_suffix {
        qualifiers.extend(labels);
        rest = base;
    }

    let mut alternates = Vec::new();
    for group in groups {
        if FEATURING_REGEX.is_match(&group) {
            continue;
        }
        match qualifier_group(&group) {
            Some(labels) => qualifiers.extend(labels),
            None => alternates.push(group),
        }
    }

    ParsedName {
        base: rest,
        alternates,
        qualifiers,
    }
}

/// Splits a trailing bracketed group off `text`, returning the text before it and the group's
/// contents.
fn peel_enclosed(text: &str) -> Option<(&str, String)> {
    let trimmed = text.trim_end();
    let close = trimmed.chars().last()?;
    let &(open, _) = ENCLOSURES.iter().find(|(_, c)| *c == close)?;

    let mut depth = 0usize;
    for (idx, c) in trimmed.char_indices().rev() {
        if c == close {
            depth += 1;
        } else if c == open {
            depth -= 1;
            if depth == 0 {
                let inner = &trimmed[idx + open.len_utf8()..trimmed.len() - close.len_utf8()];
                return Some((&trimmed[..idx], inner.trim().to_string()));
            }
        }
    }
    None
}

fn qualifier_word(token: &str) -> Option<&'static str> {
    match token {
        "live" => Some("live"),
        "remix" | "rmx" | "mix" => Some("remix"),
        "inst" | "instrumental" => Some("instrumental"),
        "acoustic" | "unplugged" => Some("acoustic"),
        "remaster" | "remastered" => Some("remaster"),
        "edit" => Some("edit"),
        "demo" => Some("demo"),
        "karaoke" => Some("karaoke"),
        "acapella" | "acappella" => Some("acapella"),
        _ => None,
    }
}

/// Words that only ever appear beside a qualifier, as in "Radio Edit" or "Single Version".
fn filler_word(token: &str) -> bool {
    matches!(token, "radio" | "extended" | "original" | "club" | "single" | "album" | "short" | "full")
}

fn version_word(token: &str) -> bool {
    token == "ver" || token == "version"
}

/// Labels for a whole bracketed group or dash suffix found in a title. A group only counts when
/// every word in it belongs to a qualifier, so `(Live Forever)` stays an alternate title.
fn qualifier_group(text: &str) -> Option<BTreeSet<String>> {
    let folded = fold(text);
    let tokens: Vec<&str> = folded.split(' ').collect();
    if tokens.len() > 2 && tokens[0] == "live" && matches!(tokens[1], "at" | "from" | "in" | "on") {
        return Some(BTreeSet::from(["live".to_string()]));
    }
    let accounted = tokens.iter().enumerate().all(|(i, token)| {
        qualifier_word(token).is_some()
            || version_word(token)
            || filler_word(token)
            || token.chars().all(|c| c.is_ascii_digit())
            || (tokens.get(i + 1).is_some_and(|next| version_word(next)) && token.chars().all(char::is_alphabetic))
    });
    let labels = qualifier_labels(text);
    (accounted && !labels.is_empty()).then_some(labels)
}

/// Every qualifier mentioned anywhere in `text`. Used as is for labels a catalog supplies
/// explicitly; titles go through [`qualifier_group`].
pub(crate) fn qualifier_labels(text: &str) -> BTreeSet<String> {
    let folded = fold(text);
    let tokens: Vec<&str> = folded.split(' ').collect();
    let mut labels = BTreeSet::new();
    for (i, token) in tokens.iter().enumerate() {
        if let Some(label) = qualifier_word(token) {
            labels.insert(label.to_string());
            continue;
        }
        if version_word(token) {
            // "Japanese Ver." names the language the recording is sung in.
            let language = i
                .checked_sub(1)
                .map(|j| tokens[j])
                .filter(|t| qualifier_word(t).is_none() && !filler_word(t) && t.chars().all(char::is_alphabetic));
            match language {
                Some(lang) => labels.insert(format!("version:{lang}")),
                None => labels.insert("version".to_string()),
            };
        }
    }
    labels
}
