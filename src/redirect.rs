//! Redirect directive detection.
//!
//! A redirect article's entire content is an alias like `#REDIRECT`
//! followed by a `[[target]]` link. Aliases come from the site's locale
//! (see [`crate::siteinfo::SiteInfo::redirect_aliases`]) and are tried in
//! order until the first match.

use crate::error::BadRedirect;

/// Returns the redirect target if `text` is a redirect directive,
/// `Ok(None)` if it is not one, and [`BadRedirect`] when an alias matched
/// but the link brackets are missing.
pub fn parse_redirect<S: AsRef<str>>(
    text: &str,
    aliases: &[S],
) -> Result<Option<String>, BadRedirect> {
    for alias in aliases {
        let alias = alias.as_ref();
        let rest = if let Some(rest) = text.strip_prefix(alias) {
            rest
        } else if text.to_uppercase().starts_with(alias) {
            // Upper-casing can change byte lengths, so strip by chars.
            let skip = alias.chars().count();
            let offset = text
                .char_indices()
                .nth(skip)
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            &text[offset..]
        } else {
            continue;
        };

        let rest = rest.trim_start();
        let begin = rest.find("[[").ok_or_else(|| BadRedirect(rest.to_string()))?;
        let end = rest.find("]]").ok_or_else(|| BadRedirect(rest.to_string()))?;
        return Ok(Some(rest[begin + 2..end].to_string()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> Vec<&'static str> {
        vec!["#PATRZ", "#PRZEKIERUJ", "#TAM", "#REDIRECT"]
    }

    #[test]
    fn simple_redirect() {
        let target = parse_redirect("#PATRZ [[Zmora]]", &aliases()).unwrap();
        assert_eq!(target.as_deref(), Some("Zmora"));
    }

    #[test]
    fn no_space_after_alias() {
        let target = parse_redirect("#PATRZ[[Zmora]]", &aliases()).unwrap();
        assert_eq!(target.as_deref(), Some("Zmora"));
    }

    #[test]
    fn second_alias_matches() {
        let target = parse_redirect("#PRZEKIERUJ [[Uwierzytelnianie]]", &aliases()).unwrap();
        assert_eq!(target.as_deref(), Some("Uwierzytelnianie"));
    }

    #[test]
    fn non_ascii_target() {
        let target = parse_redirect("#TAM[[Żuraw samochodowy]]", &aliases()).unwrap();
        assert_eq!(target.as_deref(), Some("Żuraw samochodowy"));
    }

    #[test]
    fn cyrillic_alias_and_target() {
        let target = parse_redirect("#перенапр[[абв]]", &["#перенапр"]).unwrap();
        assert_eq!(target.as_deref(), Some("абв"));
    }

    #[test]
    fn mixed_case_matches_uppercased_alias() {
        let target = parse_redirect("#Перенапр[[абв]]", &["#перенапр", "#ПЕРЕНАПР"]).unwrap();
        assert_eq!(target.as_deref(), Some("абв"));
    }

    #[test]
    fn plain_text_is_not_a_redirect() {
        let target = parse_redirect("abc", &aliases()).unwrap();
        assert_eq!(target, None);
    }

    #[test]
    fn missing_closing_brackets() {
        let err = parse_redirect("#REDIRECT [[abc", &aliases()).unwrap_err();
        assert_eq!(err, BadRedirect("[[abc".to_string()));
    }

    #[test]
    fn missing_brackets_entirely() {
        let err = parse_redirect("#REDIRECT abc", &aliases()).unwrap_err();
        assert_eq!(err, BadRedirect("abc".to_string()));
    }

    #[test]
    fn non_ascii_bad_redirect() {
        let err = parse_redirect("#REDIRECT абв", &aliases()).unwrap_err();
        assert_eq!(err, BadRedirect("абв".to_string()));
    }

    #[test]
    fn first_match_wins_not_longest() {
        // "#TAM" matches before "#TAMTEN" would even be tried.
        let target = parse_redirect("#TAM [[A]]", &["#TAM", "#TAMTEN"]).unwrap();
        assert_eq!(target.as_deref(), Some("A"));
    }
}
