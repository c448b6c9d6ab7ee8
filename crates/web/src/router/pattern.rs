//! Compiled route patterns.

use crate::router::RouteError;
use regex::Regex;
use sluice_http::protocol::Entries;
use std::fmt;

/// A compiled path pattern.
pub(crate) enum Pattern {
    /// Matches one path exactly.
    Literal(String),
    /// `:name` segments, compiled into a single-route matcher.
    Params { source: String, router: matchit::Router<()> },
    /// A regular expression that must match the whole path.
    Regex(Regex),
}

impl Pattern {
    /// Compiles `pattern`. A segment starting with `:` binds a parameter of that name.
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.split('/').any(|segment| segment.starts_with(':')) {
            return Ok(Self::Literal(pattern.to_owned()));
        }

        let mut names: Vec<&str> = Vec::new();
        let mut route = String::with_capacity(pattern.len() + 8);

        for (i, segment) in pattern.split('/').enumerate() {
            if i > 0 {
                route.push('/');
            }

            match segment.strip_prefix(':') {
                Some(name) => {
                    if !is_param_name(name) {
                        return Err(RouteError::invalid_pattern(pattern, format!("invalid parameter name '{name}'")));
                    }
                    if names.contains(&name) {
                        return Err(RouteError::invalid_pattern(pattern, format!("duplicate parameter name '{name}'")));
                    }
                    names.push(name);
                    route.push('{');
                    route.push_str(name);
                    route.push('}');
                }
                None => route.push_str(&segment.replace('{', "{{").replace('}', "}}")),
            }
        }

        let mut router = matchit::Router::new();
        router.insert(route, ()).map_err(|e| RouteError::invalid_pattern(pattern, e))?;
        Ok(Self::Params { source: pattern.to_owned(), router })
    }

    /// Compiles `pattern` as a regular expression anchored at both ends.
    pub(crate) fn regex(pattern: &str) -> Result<Self, RouteError> {
        Regex::new(&format!("^(?:{pattern})$")).map(Self::Regex).map_err(|e| RouteError::invalid_regex(pattern, e))
    }

    /// Matches `path`, returning the bound parameters in pattern order.
    ///
    /// Named regex groups are bound by name, unnamed ones as `param0`, `param1`, ... by group
    /// position. Groups that did not take part in the match are not bound.
    pub(crate) fn matches(&self, path: &str) -> Option<Entries> {
        match self {
            Self::Literal(literal) => (literal == path).then(Vec::new),
            Self::Params { router, .. } => {
                let matched = router.at(path).ok()?;
                if matched.params.iter().any(|(_, value)| value.is_empty()) {
                    return None;
                }
                Some(matched.params.iter().map(|(name, value)| (name.to_owned(), value.to_owned())).collect())
            }
            Self::Regex(regex) => {
                let captures = regex.captures(path)?;
                let params = regex
                    .capture_names()
                    .enumerate()
                    .skip(1)
                    .filter_map(|(i, name)| {
                        let value = captures.get(i)?.as_str().to_owned();
                        let name = name.map_or_else(|| format!("param{}", i - 1), str::to_owned);
                        Some((name, value))
                    })
                    .collect();
                Some(params)
            }
        }
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => f.debug_tuple("Literal").field(literal).finish(),
            Self::Params { source, .. } => f.debug_tuple("Params").field(source).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Option<Entries> {
        Some(pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect())
    }

    #[test]
    fn literal_matches_exactly() {
        let pattern = Pattern::parse("/static/index.html").unwrap();
        assert!(matches!(pattern, Pattern::Literal(_)));

        assert_eq!(pattern.matches("/static/index.html"), params(&[]));
        assert_eq!(pattern.matches("/static/index.html/"), None);
        assert_eq!(pattern.matches("/static"), None);
    }

    #[test]
    fn parameters_bind_whole_segments() {
        let pattern = Pattern::parse("/animals/:kind/:name").unwrap();

        assert_eq!(pattern.matches("/animals/dogs/fido"), params(&[("kind", "dogs"), ("name", "fido")]));
        assert_eq!(pattern.matches("/animals/dogs"), None);
        assert_eq!(pattern.matches("/animals/dogs/fido/extra"), None);
        assert_eq!(pattern.matches("/animals//fido"), None);
        assert_eq!(pattern.matches("/plants/dogs/fido"), None);
    }

    #[test]
    fn braces_in_literal_segments_are_plain_text() {
        let pattern = Pattern::parse("/{raw}/:id").unwrap();

        assert_eq!(pattern.matches("/{raw}/7"), params(&[("id", "7")]));
        assert_eq!(pattern.matches("/other/7"), None);
    }

    #[test]
    fn bad_parameter_names_are_rejected() {
        assert!(matches!(Pattern::parse("/a/:"), Err(RouteError::InvalidPattern { .. })));
        assert!(matches!(Pattern::parse("/a/:na-me"), Err(RouteError::InvalidPattern { .. })));
        assert!(matches!(Pattern::parse("/:id/:id"), Err(RouteError::InvalidPattern { .. })));
    }

    #[test]
    fn regex_must_match_the_whole_path() {
        let pattern = Pattern::regex(r"/files/[a-z]+").unwrap();

        assert_eq!(pattern.matches("/files/abc"), params(&[]));
        assert_eq!(pattern.matches("/files/abc/def"), None);
        assert_eq!(pattern.matches("/x/files/abc"), None);
    }

    #[test]
    fn regex_groups_bind_by_name_or_position() {
        let pattern = Pattern::regex(r"/(?P<session>[^/]+)/(\d+)/(xhr|jsonp)").unwrap();

        assert_eq!(
            pattern.matches("/abc/12/xhr"),
            params(&[("session", "abc"), ("param1", "12"), ("param2", "xhr")])
        );
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let pattern = Pattern::regex("/a|/b").unwrap();

        assert_eq!(pattern.matches("/a"), params(&[]));
        assert_eq!(pattern.matches("/b"), params(&[]));
        assert_eq!(pattern.matches("/ab"), None);
    }

    #[test]
    fn optional_groups_that_did_not_match_are_skipped() {
        let pattern = Pattern::regex(r"/items(/(\d+))?").unwrap();

        assert_eq!(pattern.matches("/items"), params(&[]));
        assert_eq!(pattern.matches("/items/5"), params(&[("param0", "/5"), ("param1", "5")]));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(matches!(Pattern::regex("/(unclosed"), Err(RouteError::InvalidRegex { .. })));
    }
}
