//! Remote path helpers.
//!
//! Remote SFTP paths always use `/` regardless of either side's OS; local
//! paths go through `std::path` and need no help here.

/// Join remote path components with a single `/`.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Last path component of a remote path, ignoring trailing slashes.
/// Returns an empty string for `/` and for empty input.
pub fn remote_basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Every ancestor of a remote path, shortest first, ending with the path
/// itself. `/` and the empty string have no prefixes.
pub fn path_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut built = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !built.is_empty() && !built.ends_with('/') {
            built.push('/');
        }
        built.push_str(component);
        prefixes.push(built.clone());
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_trailing_slash() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
    }

    #[test]
    fn prefixes_cover_every_ancestor_shortest_first() {
        assert_eq!(
            path_prefixes("/home/u/dst"),
            ["/home", "/home/u", "/home/u/dst"]
        );
        assert_eq!(path_prefixes("rel/dir"), ["rel", "rel/dir"]);
        assert_eq!(path_prefixes("/single"), ["/single"]);
        assert_eq!(path_prefixes("/home//u/"), ["/home", "/home/u"]);
        assert!(path_prefixes("/").is_empty());
        assert!(path_prefixes("").is_empty());
    }

    #[test]
    fn basename_strips_directories_and_trailing_slashes() {
        assert_eq!(remote_basename("/home/u/src"), "src");
        assert_eq!(remote_basename("/home/u/src/"), "src");
        assert_eq!(remote_basename("file.txt"), "file.txt");
        assert_eq!(remote_basename("/"), "");
        assert_eq!(remote_basename(""), "");
    }
}
