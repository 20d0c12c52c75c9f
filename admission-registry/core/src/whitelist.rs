use std::{convert::Infallible, fmt, str::FromStr, sync::Arc};

/// An ordered set of registry prefixes from which container images may be
/// pulled.
///
/// Built once at startup and shared read-only by every request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist(Arc<[String]>);

// === impl Whitelist ===

impl Whitelist {
    /// Builds a whitelist from `prefixes`, trimming each entry and dropping
    /// empty ones.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            prefixes
                .into_iter()
                .filter_map(|p| {
                    let p = p.as_ref().trim();
                    (!p.is_empty()).then(|| p.to_string())
                })
                .collect(),
        )
    }

    /// Returns the first prefix that `image` starts with.
    pub fn matching(&self, image: &str) -> Option<&str> {
        self.0
            .iter()
            .map(String::as_str)
            .find(|prefix| image.starts_with(prefix))
    }

    pub fn allows(&self, image: &str) -> bool {
        self.matching(image).is_some()
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parses a comma-separated list, e.g. the `WHITELIST_REGISTRIES` environment
/// variable.
impl FromStr for Whitelist {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split(',')))
    }
}

/// Renders as `[a b c]`.
impl fmt::Display for Whitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, prefix) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(prefix)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated() {
        let wl = "docker.io/library/, gcr.io/,,".parse::<Whitelist>().unwrap();
        assert_eq!(wl.iter().collect::<Vec<_>>(), ["docker.io/library/", "gcr.io/"]);
        assert_eq!(wl.to_string(), "[docker.io/library/ gcr.io/]");
    }

    #[test]
    fn empty_string_is_empty() {
        let wl = "".parse::<Whitelist>().unwrap();
        assert!(wl.is_empty());
        assert!(!wl.allows("docker.io/library/nginx"));
        assert_eq!(wl.to_string(), "[]");
    }

    #[test]
    fn first_match_wins() {
        let wl = Whitelist::new(["docker.io/", "docker.io/library/"]);
        assert_eq!(
            wl.matching("docker.io/library/nginx:1.18"),
            Some("docker.io/")
        );
        assert_eq!(wl.matching("quay.io/coreos/etcd"), None);
    }
}
