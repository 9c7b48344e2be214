//! Browser and operating-system detection from a `User-Agent` header.
//!
//! Rules are ordered: several browsers embed each other's tokens (Edge and
//! Opera claim to be Chrome, Chrome claims to be Safari), so the more
//! specific pattern must be tried first.

use std::sync::LazyLock;

use regex::Regex;

use crate::session::UNKNOWN;

/// Browser and OS names extracted from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: String,
    pub operating_system: String,
}

static BROWSER_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r"Edg(e|A|iOS)?/", "Edge"),
        (r"OPR/|Opera", "Opera"),
        (r"SamsungBrowser/", "Samsung Internet"),
        (r"Firefox/|FxiOS/", "Firefox"),
        (r"Chrome/|CriOS/", "Chrome"),
        (r"Version/[\d.]+.*Safari/", "Safari"),
        (r"MSIE |Trident/", "Internet Explorer"),
    ])
});

static OS_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r"Windows NT", "Windows"),
        (r"iPhone|iPad|iPod", "iOS"),
        (r"Mac OS X|Macintosh", "macOS"),
        (r"Android", "Android"),
        (r"CrOS", "ChromeOS"),
        (r"Linux", "Linux"),
    ])
});

fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|(pattern, name)| {
            (
                Regex::new(pattern).expect("user-agent patterns are valid regexes"),
                *name,
            )
        })
        .collect()
}

fn first_match(rules: &[(Regex, &'static str)], user_agent: &str) -> String {
    rules
        .iter()
        .find(|(re, _)| re.is_match(user_agent))
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Parse a user-agent string. Missing or unrecognised values map to `"Unknown"`.
pub fn parse_user_agent(user_agent: &str) -> UserAgentInfo {
    UserAgentInfo {
        browser: first_match(&BROWSER_RULES, user_agent),
        operating_system: first_match(&OS_RULES, user_agent),
    }
}
