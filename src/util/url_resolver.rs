use thiserror::Error;
use url::Url;

/// Errors produced while establishing the page origin.
#[derive(Error, Debug)]
pub enum OriginError {
    #[error("Invalid origin URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Origins must be http(s); anything else cannot anchor relative paths.
    #[error("Unsupported origin scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Parses and normalizes the page origin used for absolute-URL construction.
///
/// Any path, query or fragment is discarded so that relative paths are always
/// resolved against the site root.
///
/// ```
/// use followgrid::util::parse_origin;
///
/// let origin = parse_origin("https://forum.example.com/latest?x=1").unwrap();
/// assert_eq!(origin.as_str(), "https://forum.example.com/");
/// assert!(parse_origin("ftp://forum.example.com").is_err());
/// ```
pub fn parse_origin(origin: &str) -> Result<Url, OriginError> {
    let url = Url::parse(origin)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(OriginError::UnsupportedScheme(scheme.to_owned())),
    }
    let mut root = url;
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    Ok(root)
}

/// True when `candidate` already carries a URL scheme.
pub fn has_scheme(candidate: &str) -> bool {
    Url::parse(candidate).is_ok()
}

/// Rewrites a scheme-less URL into an absolute one under `origin`.
///
/// Scheme-qualified URLs pass through untouched. Protocol-relative paths
/// (`//cdn.example.com/a.png`) take the origin's scheme.
pub fn absolutize(candidate: &str, origin: &Url) -> String {
    if candidate.is_empty() || has_scheme(candidate) {
        return candidate.to_owned();
    }
    match origin.join(candidate) {
        Ok(joined) => joined.into(),
        Err(e) => {
            tracing::debug!(url = %candidate, error = %e, "Could not join URL onto origin, prefixing");
            let base = origin.as_str().trim_end_matches('/');
            if candidate.starts_with('/') {
                format!("{}{}", base, candidate)
            } else {
                format!("{}/{}", base, candidate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        parse_origin("https://forum.example.com").unwrap()
    }

    #[test]
    fn test_relative_path_gets_origin() {
        assert_eq!(
            absolutize("/user_avatar/forum/alice/200/1.png", &origin()),
            "https://forum.example.com/user_avatar/forum/alice/200/1.png"
        );
    }

    #[test]
    fn test_bare_path_gets_origin() {
        assert_eq!(
            absolutize("uploads/a.png", &origin()),
            "https://forum.example.com/uploads/a.png"
        );
    }

    #[test]
    fn test_absolute_url_unchanged() {
        let url = "http://cdn.example.net/a.png?v=2";
        assert_eq!(absolutize(url, &origin()), url);
    }

    #[test]
    fn test_protocol_relative_takes_origin_scheme() {
        assert_eq!(
            absolutize("//cdn.example.net/a.png", &origin()),
            "https://cdn.example.net/a.png"
        );
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(absolutize("", &origin()), "");
    }

    #[test]
    fn test_origin_rejects_non_http() {
        assert!(matches!(
            parse_origin("file:///etc"),
            Err(OriginError::UnsupportedScheme(_))
        ));
        assert!(parse_origin("not a url").is_err());
    }
}
