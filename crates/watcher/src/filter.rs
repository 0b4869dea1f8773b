//! Event filtering: temporary files, directory events, and the engine's
//! own snapshot bookkeeping directory.

use std::path::Path;

/// Decides which raw notifications never become [`arca_core::FileEvent`]s.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Name of the reserved snapshot directory inside each watch root
    reserved_dir: String,
    /// Additional temporary-file name patterns from configuration.
    /// A pattern starting with `*` matches as a suffix, a pattern ending
    /// with `*` as a prefix, anything else as an exact file name.
    blacklist: Vec<String>,
    /// Drop events whose subject is a directory
    ignore_directories: bool,
}

impl EventFilter {
    pub fn new(reserved_dir: impl Into<String>) -> Self {
        Self {
            reserved_dir: reserved_dir.into(),
            blacklist: Vec::new(),
            ignore_directories: true,
        }
    }

    pub fn with_blacklist(mut self, patterns: Vec<String>) -> Self {
        self.blacklist = patterns;
        self
    }

    pub fn with_directories(mut self, report_directories: bool) -> Self {
        self.ignore_directories = !report_directories;
        self
    }

    /// True when the event for `path` under `root` must be dropped.
    pub fn should_drop(&self, root: &Path, path: &Path, is_dir: bool) -> bool {
        if self.in_reserved_dir(root, path) {
            return true;
        }
        if is_dir && self.ignore_directories {
            return true;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return true,
        };
        is_temporary(name) || self.matches_blacklist(name)
    }

    /// Component-exact containment check against `<root>/<reserved_dir>`.
    /// A file whose name merely contains the reserved string elsewhere in
    /// the tree is not excluded.
    pub fn in_reserved_dir(&self, root: &Path, path: &Path) -> bool {
        path.starts_with(root.join(&self.reserved_dir))
    }

    fn matches_blacklist(&self, name: &str) -> bool {
        self.blacklist.iter().any(|pat| {
            if let Some(suffix) = pat.strip_prefix('*') {
                name.ends_with(suffix)
            } else if let Some(prefix) = pat.strip_suffix('*') {
                name.starts_with(prefix)
            } else {
                name == pat
            }
        })
    }
}

/// Built-in temporary-file detection, always active.
///
/// Covers editor swap/backup files, OS metadata droppings, and in-flight
/// browser downloads.
fn is_temporary(name: &str) -> bool {
    // Vim swap files
    if name.ends_with(".swp") || name.ends_with(".swo") || name.ends_with(".swn") {
        return true;
    }
    // Vim/Emacs backups and Emacs auto-save/lock files
    if name.ends_with('~') || (name.starts_with('#') && name.ends_with('#')) {
        return true;
    }
    if name.starts_with(".#") {
        return true;
    }
    // macOS metadata
    if name == ".DS_Store" || name.starts_with("._") {
        return true;
    }
    // Windows metadata
    if name == "Thumbs.db" || name == "desktop.ini" {
        return true;
    }
    // Generic temp and in-flight downloads
    if name.ends_with(".tmp") || name.ends_with(".part") || name.ends_with(".crdownload") {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> EventFilter {
        EventFilter::new(".snapshot")
    }

    #[test]
    fn snapshot_dir_is_always_dropped() {
        let f = filter();
        let root = Path::new("/data");
        assert!(f.should_drop(root, Path::new("/data/.snapshot/db"), false));
        assert!(f.should_drop(root, Path::new("/data/.snapshot/conf"), false));
    }

    #[test]
    fn snapshot_substring_elsewhere_is_kept() {
        let f = filter();
        let root = Path::new("/data");
        assert!(!f.should_drop(root, Path::new("/data/report.snapshot.txt"), false));
        assert!(!f.should_drop(root, Path::new("/data/sub/.snapshot2/x"), false));
    }

    #[test]
    fn editor_temp_files_are_dropped() {
        let f = filter();
        let root = Path::new("/data");
        for name in [".a.txt.swp", "notes.txt~", "#scratch#", ".#lock", ".DS_Store", "dl.part"] {
            assert!(
                f.should_drop(root, &root.join(name), false),
                "expected [{name}] to be dropped"
            );
        }
        assert!(!f.should_drop(root, Path::new("/data/a.txt"), false));
    }

    #[test]
    fn directory_events_are_dropped_by_default() {
        let f = filter();
        let root = Path::new("/data");
        assert!(f.should_drop(root, Path::new("/data/sub"), true));

        let f = filter().with_directories(true);
        assert!(!f.should_drop(root, Path::new("/data/sub"), true));
    }

    #[test]
    fn configured_blacklist_patterns() {
        let f = filter().with_blacklist(vec![
            "*.bak".to_string(),
            "cache-*".to_string(),
            "ignore.me".to_string(),
        ]);
        let root = Path::new("/data");
        assert!(f.should_drop(root, Path::new("/data/old.bak"), false));
        assert!(f.should_drop(root, Path::new("/data/cache-01"), false));
        assert!(f.should_drop(root, Path::new("/data/ignore.me"), false));
        assert!(!f.should_drop(root, Path::new("/data/keep.me"), false));
    }
}
