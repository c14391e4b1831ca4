//! Maps a package name to a concrete version, server and URL.
//!
//! Servers are consulted in manifest order and the first server that
//! catalogs the name wins. Within one server the entry with the highest
//! revision is chosen. Versions are never compared across servers.

use ship_schema::{IndexEntry, PackageName, ServerEntry, Version};

use crate::error::PackageError;
use crate::store::Indices;

/// Where a package will come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Name of the server whose index matched.
    pub server: String,
    /// Version recorded in the manifest.
    pub version: Version,
    /// Archive URL, if the index entry declares one.
    pub url: Option<String>,
    /// Index key of the chosen entry, e.g. `foo.3`.
    pub key: String,
}

impl Resolution {
    fn from_entry(server: &str, entry: &IndexEntry) -> Self {
        Self {
            server: server.to_string(),
            version: entry.version.clone(),
            url: entry.url.clone(),
            key: entry.key.clone(),
        }
    }
}

/// Resolve `name` against every configured server.
///
/// # Errors
///
/// Returns [`PackageError::PackageNotFound`] if no cached index catalogs the
/// name.
pub fn resolve(
    name: &PackageName,
    servers: &[ServerEntry],
    indices: &Indices,
) -> Result<Resolution, PackageError> {
    servers
        .iter()
        .find_map(|server| {
            resolve_on_server(name, &server.name, indices)
                .map(|entry| Resolution::from_entry(&server.name, entry))
        })
        .ok_or_else(|| PackageError::PackageNotFound(name.clone()))
}

/// Newest entry for `name` on one server.
pub fn resolve_on_server<'a>(
    name: &str,
    server: &str,
    indices: &'a Indices,
) -> Option<&'a IndexEntry> {
    indices.get(server)?.latest(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_schema::PackageIndex;

    fn servers(names: &[&str]) -> Vec<ServerEntry> {
        names
            .iter()
            .map(|n| ServerEntry {
                name: (*n).to_string(),
                url: format!("http://{n}"),
            })
            .collect()
    }

    fn indices(entries: &[(&str, &str)]) -> Indices {
        entries
            .iter()
            .map(|(server, text)| ((*server).to_string(), PackageIndex::parse(text).unwrap()))
            .collect()
    }

    #[test]
    fn test_highest_revision_on_server() {
        let idx = indices(&[(
            "official",
            "[pkg.1]\nVersion=1\nURL=u1\n[pkg.3]\nVersion=3\nURL=u3\n[pkg.2]\nVersion=2\nURL=u2\n",
        )]);

        let res = resolve(&"pkg".into(), &servers(&["official"]), &idx).unwrap();
        assert_eq!(res.server, "official");
        assert_eq!(res.version, "3");
        assert_eq!(res.url.as_deref(), Some("u3"));
        assert_eq!(res.key, "pkg.3");
    }

    #[test]
    fn test_first_server_wins() {
        let idx = indices(&[
            ("a", "[pkg.1]\nVersion=old\nURL=ua\n"),
            ("b", "[pkg.9]\nVersion=new\nURL=ub\n"),
        ]);

        let res = resolve(&"pkg".into(), &servers(&["a", "b"]), &idx).unwrap();
        assert_eq!(res.server, "a");
        assert_eq!(res.version, "old");

        let res = resolve(&"pkg".into(), &servers(&["b", "a"]), &idx).unwrap();
        assert_eq!(res.server, "b");
    }

    #[test]
    fn test_server_without_cache_is_skipped() {
        let idx = indices(&[("b", "[pkg.1]\nVersion=1\n")]);
        let res = resolve(&"pkg".into(), &servers(&["a", "b"]), &idx).unwrap();
        assert_eq!(res.server, "b");
        assert!(res.url.is_none());
    }

    #[test]
    fn test_not_found() {
        let idx = indices(&[("a", "[other.1]\nVersion=1\n")]);
        let err = resolve(&"pkg".into(), &servers(&["a"]), &idx).unwrap_err();
        assert!(matches!(err, PackageError::PackageNotFound(name) if name == "pkg"));
    }

    #[test]
    fn test_resolve_on_server_is_scoped() {
        let idx = indices(&[("a", "[pkg.1]\nVersion=1\n"), ("b", "[pkg.2]\nVersion=2\n")]);
        assert_eq!(resolve_on_server("pkg", "b", &idx).unwrap().key, "pkg.2");
        assert!(resolve_on_server("pkg", "c", &idx).is_none());
    }
}
