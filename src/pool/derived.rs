//! Generator functions backing the derived pools (CSS class, URL slug,
//! emoji). Cheap enough that caching their output costs more than
//! recomputing it, so pool refill calls these directly as the generator
//! for `pool::refill::run_derived_refill` instead of fetching rows from
//! Postgres.

use rand::seq::SliceRandom;
use rand::Rng;

const EMOJI: &[char] = &['🔥', '✨', '📈', '🚀', '💡', '🎯', '⭐', '🧩'];

/// Generates one emoji pool entry.
pub fn random_emoji() -> String {
    let mut rng = rand::thread_rng();
    EMOJI.choose(&mut rng).expect("EMOJI is non-empty").to_string()
}

/// Generates a deterministic-looking but content-addressed CSS class
/// name from a seed, so repeated renders vary their markup fingerprint.
pub fn derive_css_class(seed: &str) -> String {
    let hash = blake3::hash(seed.as_bytes());
    format!("pf-{}", &hash.to_hex()[..8])
}

/// Generator entry point for the CSS-class pool: each call derives a
/// fresh class from a random seed.
pub fn generate_css_class() -> String {
    derive_css_class(&uuid::Uuid::new_v4().to_string())
}

/// Builds a URL-safe slug from an arbitrary string.
pub fn derive_slug(value: &str) -> String {
    value
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Generator entry point for the URL pool: each call derives a fresh
/// slug from a random seed.
pub fn generate_url_slug() -> String {
    derive_slug(&format!("page {}", uuid::Uuid::new_v4()))
}

/// Picks how many emoji to append to a keyword for the "keyword with
/// emoji" primitive, bounded by `seo.emoji_count_min`/`emoji_count_max`.
pub fn emoji_count(min: usize, max: usize) -> usize {
    let mut rng = rand::thread_rng();
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

/// Joins a keyword with already-drawn emoji, per the "random keyword
/// with emoji" primitive.
pub fn join_keyword_with_emojis(keyword: &str, emojis: &[String]) -> String {
    if emojis.is_empty() {
        return keyword.to_string();
    }
    let mut out = String::with_capacity(keyword.len() + emojis.iter().map(|e| e.len() + 1).sum::<usize>());
    out.push_str(keyword);
    for emoji in emojis {
        out.push(' ');
        out.push_str(emoji);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emoji_count_respects_bounds() {
        for _ in 0..20 {
            let count = emoji_count(1, 3);
            assert!((1..=3).contains(&count));
        }
    }

    #[test]
    fn zero_max_emits_zero_count() {
        assert_eq!(emoji_count(0, 0), 0);
    }

    #[test]
    fn join_with_no_emoji_returns_bare_keyword() {
        assert_eq!(join_keyword_with_emojis("rust", &[]), "rust");
    }

    #[test]
    fn join_appends_each_emoji_space_separated() {
        let emojis = vec!["🔥".to_string(), "✨".to_string()];
        assert_eq!(join_keyword_with_emojis("rust", &emojis), "rust 🔥 ✨");
    }

    #[test]
    fn css_class_is_stable_for_same_seed() {
        assert_eq!(derive_css_class("rust"), derive_css_class("rust"));
    }

    #[test]
    fn generated_css_class_has_pf_prefix() {
        assert!(generate_css_class().starts_with("pf-"));
    }

    #[test]
    fn slug_strips_punctuation_and_lowercases() {
        assert_eq!(derive_slug("Rust & Async!"), "rust--async");
    }

    #[test]
    fn generated_url_slug_is_non_empty() {
        assert!(!generate_url_slug().is_empty());
    }
}
