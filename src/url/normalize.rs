use url::{form_urlencoded, ParseError, Url};

/// Query keys dropped during normalization (compared case-insensitively)
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "yclid"];

/// Query key prefixes dropped during normalization
const TRACKING_PREFIXES: &[&str] = &["utm_"];

/// Normalizes a URL into the key used for deduplication
///
/// # Normalization Steps
///
/// 1. Trim whitespace; default a missing scheme to `http`
/// 2. Lowercase the scheme and host (done by the parser)
/// 3. Drop the default port (`:80` for http, `:443` for https)
/// 4. Empty path becomes `/`
/// 5. Remove the fragment
/// 6. Remove tracking query parameters (`gclid`, `fbclid`, `yclid`, `utm_*`)
/// 7. Sort the remaining parameters by key, then value, and re-encode them
/// 8. Remove an empty query string
///
/// Normalization never fails. Input that cannot be read as an http(s) URL with
/// a host normalizes to the empty string, which the frontier refuses to enqueue.
/// The result is stable: normalizing a normalized URL returns it unchanged.
///
/// # Examples
///
/// ```
/// use recrawl_robot::url::normalize_url;
///
/// let key = normalize_url("HTTP://Example.COM:80/a?b=1&utm_source=x&a=2#top");
/// assert_eq!(key, "http://example.com/a?a=2&b=1");
/// ```
pub fn normalize_url(raw: &str) -> String {
    let input = raw.trim();
    if input.is_empty() {
        return String::new();
    }

    let mut url = match parse_with_default_scheme(input) {
        Some(url) => url,
        None => return String::new(),
    };

    if !is_web_scheme(url.scheme()) || url.host_str().map_or(true, str::is_empty) {
        return String::new();
    }

    url.set_fragment(None);

    let params = filter_and_sort_query_params(&url);
    if params.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        url.set_query(Some(&query));
    }

    url.into()
}

/// Checks if a query parameter is a tracking parameter
pub fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();

    if TRACKING_PARAMS.contains(&key.as_str()) {
        return true;
    }

    TRACKING_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}

/// Parses the input, prepending `http://` when it carries no scheme
fn parse_with_default_scheme(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if is_web_scheme(url.scheme()) => Some(url),
        // "example.com:8080/page" parses as scheme "example.com"
        Ok(url) if url.cannot_be_a_base() && looks_like_host_and_port(&url) => {
            Url::parse(&format!("http://{}", input)).ok()
        }
        Ok(_) => None,
        Err(ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = match input.strip_prefix("//") {
                Some(rest) => format!("http://{}", rest),
                None => format!("http://{}", input),
            };
            Url::parse(&with_scheme).ok()
        }
        Err(_) => None,
    }
}

fn looks_like_host_and_port(url: &Url) -> bool {
    url.scheme().contains('.') || url.path().starts_with(|c: char| c.is_ascii_digit())
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();

    params
}
