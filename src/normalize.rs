//! Free-text name canonicalization. Two names are considered the same
//! identity only through equality, containment, or fuzzy similarity of their
//! normalized forms, never of the raw text.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Administrative-unit nouns that carry no identity and differ between the
/// two datasets ("Southern Province" vs "Southern").
pub const STOPWORDS: &[&str] = &[
    "province",
    "region",
    "county",
    "state",
    "district",
    "republic",
    "oblast",
    "voivodeship",
    "governorate",
    "gouvernorate",
    "prefecture",
    "department",
    "autonomous",
    "federal",
    "territory",
    "municipality",
];

/// Canonicalize a free-text name into a comparable key.
///
/// Decomposes to NFKD and strips combining marks, lowercases, drops quote
/// characters, collapses every run of non-alphanumeric characters to a single
/// space, removes the stop words and trims. Idempotent; empty or non-name
/// input yields the empty string, which never matches anything.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut cleaned = String::with_capacity(folded.len());
    let mut pending_space = false;
    for ch in folded.chars() {
        if matches!(ch, '`' | '\'' | '"') {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            if pending_space && !cleaned.is_empty() {
                cleaned.push(' ');
            }
            pending_space = false;
            cleaned.push(ch);
        } else {
            pending_space = true;
        }
    }

    cleaned
        .split(' ')
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalize an ISO 3166-2 subdivision code: uppercase and strip
/// whitespace, nothing else. ISO codes are compared for exact equality only.
pub fn normalize_iso(code: &str) -> String {
    code.trim().to_uppercase().replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_and_lowercases() {
        assert_eq!(normalize("Île-de-France"), "ile de france");
        assert_eq!(normalize("Münster"), "munster");
        assert_eq!(normalize("São Paulo"), "sao paulo");
    }

    #[test]
    fn removes_quotes_without_splitting() {
        assert_eq!(normalize("Côte d'Azur"), "cote dazur");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(normalize("North -- East / Zone 5"), "north east zone 5");
    }

    #[test]
    fn drops_stop_words() {
        assert_eq!(normalize("Southern Province"), "southern");
        assert_eq!(normalize("Federal District of Columbia"), "of columbia");
        assert_eq!(normalize("Leningrad Oblast"), "leningrad");
    }

    #[test]
    fn idempotent() {
        for s in ["Région Île-de-France", "Midtjylland", "  ", "Łódź"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn empty_and_nonalpha_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   --- "), "");
    }

    #[test]
    fn iso_codes_kept_structurally_intact() {
        assert_eq!(normalize_iso(" fr-75 "), "FR-75");
        assert_eq!(normalize_iso("DK 85"), "DK85");
        assert_eq!(normalize_iso(""), "");
    }
}
