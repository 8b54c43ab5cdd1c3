use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// Cache of executable name to full path, built by scanning `$PATH` once.
/// Earlier `$PATH` directories win. `rehash` rebuilds it.
pub struct SearchCache {
    entries: HashMap<OsString, PathBuf>,
}

impl SearchCache {
    pub fn new() -> SearchCache {
        let mut this = SearchCache { entries: HashMap::new() };
        this.rehash();
        this
    }

    fn add_entry(&mut self, entry: io::Result<fs::DirEntry>) -> io::Result<()> {
        let e = entry?;
        self.entries.entry(e.file_name()).or_insert_with(|| e.path());
        Ok(())
    }

    pub fn rehash(&mut self) {
        self.entries.clear();
        let Some(path) = env::var_os("PATH") else {
            return;
        };
        for dir in env::split_paths(&path) {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries {
                    let _ = self.add_entry(entry);
                }
            }
        }
    }

    pub fn lookup(&self, name: &OsStr) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }
}

impl Default for SearchCache {
    fn default() -> SearchCache {
        SearchCache::new()
    }
}
