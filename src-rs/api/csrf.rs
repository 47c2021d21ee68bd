use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

/// Looks up `name` in a `Cookie` header value (`a=1; b=2`).
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Reads the anti-forgery token the backend left in the jar for `url`.
pub fn csrf_token(jar: &Jar, url: &Url, cookie_name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let raw = header.to_str().ok()?;
    find_cookie(raw, cookie_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_cookie_among_others() {
        let header = "sessionid=xyz; csrftoken=abc123; theme=dark";
        assert_eq!(find_cookie(header, "csrftoken").as_deref(), Some("abc123"));
        assert_eq!(find_cookie(header, "missing"), None);
    }

    #[test]
    fn prefix_names_do_not_match() {
        assert_eq!(find_cookie("csrftoken2=nope", "csrftoken"), None);
        assert_eq!(find_cookie("csrftoken=", "csrftoken"), None);
    }

    #[test]
    fn reads_token_from_jar() {
        let jar = Jar::default();
        let url: Url = "http://localhost:8000/api/".parse().unwrap();
        assert_eq!(csrf_token(&jar, &url, "csrftoken"), None);
        jar.add_cookie_str("csrftoken=tok42; Path=/", &url);
        assert_eq!(csrf_token(&jar, &url, "csrftoken").as_deref(), Some("tok42"));
    }
}
