use std::fmt::Write as _;
use std::path::{Path, PathBuf};

// @module: ffmpeg concat demuxer manifests

/// Ordered list of inputs for `-f concat`.
///
/// Entries without a duration are played in full (encoded clips). Entries with
/// a duration hold their single frame for that long (stills). Nothing is
/// inserted between entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcatManifest {
    entries: Vec<(PathBuf, Option<f64>)>,
}

impl ConcatManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file played in full
    pub fn push_file<P: AsRef<Path>>(&mut self, path: P) {
        self.entries.push((path.as_ref().to_path_buf(), None));
    }

    /// Append a file held for `duration_secs`
    pub fn push_timed<P: AsRef<Path>>(&mut self, path: P, duration_secs: f64) {
        self.entries.push((path.as_ref().to_path_buf(), Some(duration_secs)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Manifest text.
    ///
    /// When the last entry is timed it is listed once more without a duration,
    /// otherwise the demuxer ignores the final `duration` directive.
    pub fn render(&self) -> String {
        let mut out = String::from("ffconcat version 1.0\n");
        for (path, duration) in &self.entries {
            let _ = writeln!(out, "file '{}'", quote_path(path));
            if let Some(duration) = duration {
                let _ = writeln!(out, "duration {:.6}", duration);
            }
        }
        if let Some((path, Some(_))) = self.entries.last() {
            let _ = writeln!(out, "file '{}'", quote_path(path));
        }
        out
    }
}

/// Escape a path for a single-quoted manifest string: `'` becomes `'\''`
fn quote_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
