//! URL-safe tenant slugs.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_SLUG_LEN: usize = 80;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid")
});

/// Lowercase ASCII letters and digits separated by single hyphens.
pub fn is_valid_slug(s: &str) -> bool {
    s.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(s)
}

/// Derive a slug from a business name: `"Bob's Heating & Air, LLC"` →
/// `"bobs-heating-and-air-llc"`. Returns an empty string when the name has no
/// ASCII letters or digits.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars() {
        match ch {
            '\'' | '\u{2019}' => {}
            '&' => {
                push_word(&mut out, &mut pending_hyphen, "and");
            }
            c if c.is_ascii_alphanumeric() => {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            }
            _ => pending_hyphen = true,
        }
    }

    truncate_at_boundary(out)
}

fn push_word(out: &mut String, pending_hyphen: &mut bool, word: &str) {
    if !out.is_empty() {
        out.push('-');
    }
    out.push_str(word);
    *pending_hyphen = true;
}

fn truncate_at_boundary(mut slug: String) -> String {
    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// `base` for the first attempt, then `base-2`, `base-3`, ...
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    let suffix = format!("-{attempt}");
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", base[..keep].trim_end_matches('-'), suffix)
}
