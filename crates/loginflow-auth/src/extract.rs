//! Authorization code recovery from a redirect URL.
//!
//! The opener usually cannot read a cross-origin popup, so the redirect URL
//! often arrives as text pasted by the user. Input is parsed as a URL first;
//! anything that does not parse (relative paths, bare query strings, stray
//! text around the URL) falls back to a pattern scan.

use std::borrow::Cow;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

/// `code=<value>` at the start of the input or after `?`, `&` or `#`.
static CODE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[?&#])code=([^&]+)").expect("code regex compiles"));

static STATE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[?&#])state=([^&#]+)").expect("state regex compiles"));

/// Values recovered from a provider redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    /// The decoded authorization code.
    pub code: String,
    /// The decoded `state` parameter, if the redirect carried one.
    pub state: Option<String>,
}

/// Extract just the authorization code.
pub fn extract_code(input: &str) -> Option<String> {
    extract_redirect(input).map(|params| params.code)
}

/// Extract the code and, when present, the `state` parameter.
///
/// Returns `None` when neither strategy finds a non-empty code or when the
/// code is not valid percent-encoded UTF-8.
pub fn extract_redirect(input: &str) -> Option<RedirectParams> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(params) = from_parsed_url(input) {
        return Some(params);
    }

    tracing::debug!("redirect input has no parsable code parameter, scanning text");
    from_pattern_scan(input)
}

fn from_parsed_url(input: &str) -> Option<RedirectParams> {
    let url = Url::parse(input).ok()?;

    let mut code = None;
    let mut state = None;
    // `query_pairs` already percent-decodes.
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code.filter(|c| !c.is_empty())?;
    Some(RedirectParams {
        code,
        state: state.filter(|s| !s.is_empty()),
    })
}

fn from_pattern_scan(input: &str) -> Option<RedirectParams> {
    let raw = CODE_PARAM.captures(input)?.get(1)?.as_str();
    let code = decode(raw)?;
    if code.is_empty() {
        return None;
    }

    let state = STATE_PARAM
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| decode(m.as_str()))
        .map(Cow::into_owned);

    Some(RedirectParams {
        code: code.into_owned(),
        state,
    })
}

fn decode(raw: &str) -> Option<Cow<'_, str>> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::debug!(error = %e, "percent-decoded value is not UTF-8");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_parse_decodes_code() {
        assert_eq!(
            extract_code("https://localhost:8400/?code=ABC123%3D&state=x").as_deref(),
            Some("ABC123=")
        );
    }

    #[test]
    fn structured_parse_reads_state() {
        let params = extract_redirect("http://localhost:8400/?code=abc&state=ab12cd34").unwrap();
        assert_eq!(params.code, "abc");
        assert_eq!(params.state.as_deref(), Some("ab12cd34"));
    }

    #[test]
    fn code_after_other_params() {
        assert_eq!(
            extract_code("http://localhost:8400/?session_state=s1&code=0.AX4&state=x").as_deref(),
            Some("0.AX4")
        );
    }

    #[test]
    fn missing_code_is_none() {
        assert_eq!(extract_code("http://localhost:8400/?state=ab12cd34"), None);
        assert_eq!(extract_code("http://localhost:8400/"), None);
    }

    #[test]
    fn empty_code_is_none() {
        assert_eq!(extract_code("http://localhost:8400/?code=&state=1"), None);
        assert_eq!(extract_code("code=&state=1"), None);
    }

    #[test]
    fn bare_query_falls_back_to_scan() {
        assert_eq!(extract_code("code=XYZ&state=1").as_deref(), Some("XYZ"));
    }

    #[test]
    fn relative_url_falls_back_to_scan() {
        let params = extract_redirect("/?code=rel%2Fcode&state=s%20t").unwrap();
        assert_eq!(params.code, "rel/code");
        assert_eq!(params.state.as_deref(), Some("s t"));
    }

    #[test]
    fn scan_ignores_params_that_merely_end_in_code() {
        assert_eq!(extract_code("?session_code=nope"), None);
        assert_eq!(extract_code("?session_code=nope&code=yes").as_deref(), Some("yes"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(
            extract_code("  http://localhost:8400/?code=abc \n").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn invalid_utf8_escape_is_none() {
        assert_eq!(extract_code("code=%FF%FE"), None);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(extract_code(""), None);
        assert_eq!(extract_code("   "), None);
        assert_eq!(extract_code("definitely not a url"), None);
        assert_eq!(extract_code("%%%"), None);
    }
}
