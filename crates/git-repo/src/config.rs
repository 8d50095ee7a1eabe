//! The on-disk `config` file: a small hand-rolled `[section "subsection"]
//! key = value` parser (spec.md §4.14, ambient stack §1). The format is
//! simple and line-oriented enough that a generic INI crate would add
//! nothing this core doesn't already do in fewer lines, and this core
//! never depends on `gix` for any concern, config included.

use std::fs;
use std::path::Path;

use crate::error::GitError;

/// One `[name]` or `[name "subsection"]` block and its `key = value`
/// entries, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    /// The section name (`"core"`, `"remote"`, …).
    pub name: String,
    /// The quoted subsection, if any (`"origin"` in `[remote "origin"]`).
    pub subsection: Option<String>,
    /// `key = value` entries, in file order. A repeated key keeps every
    /// occurrence; [`Config::get`] returns the last one, matching git's
    /// own last-wins config semantics.
    pub entries: Vec<(String, String)>,
}

/// A parsed `config` file: an ordered list of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Every section, in file order.
    pub sections: Vec<ConfigSection>,
}

impl Config {
    /// Parse `text` into sections. Blank lines and `#`/`;`-prefixed
    /// comment lines are skipped; a malformed (non-`[...]`,
    /// non-`key = value`) line is ignored rather than rejected — this
    /// core only needs to round-trip what it itself writes, not validate
    /// an arbitrary hand-edited config.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut sections = Vec::new();
        let mut current: Option<ConfigSection> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(parse_header(header));
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if let Some(section) = current.as_mut() {
                    section.entries.push((key.trim().to_owned(), value.trim().to_owned()));
                }
            }
        }
        if let Some(section) = current.take() {
            sections.push(section);
        }
        Self { sections }
    }

    /// Read and parse `path`; a missing file is an empty config.
    ///
    /// # Errors
    /// Propagates I/O errors other than not-found.
    pub fn read(path: &Path) -> Result<Self, GitError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize and write `self` to `path`, replacing it whole.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write(&self, path: &Path) -> Result<(), GitError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(())
    }

    /// Render back to `[section "subsection"]` text, tab-indented entries.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match &section.subsection {
                Some(sub) => out.push_str(&format!("[{} \"{sub}\"]\n", section.name)),
                None => out.push_str(&format!("[{}]\n", section.name)),
            }
            for (key, value) in &section.entries {
                out.push_str(&format!("\t{key} = {value}\n"));
            }
        }
        out
    }

    /// The last value for `key` in the matching `[name]`/`[name
    /// "subsection"]` section, if any.
    #[must_use]
    pub fn get(&self, name: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .filter(|s| s.name == name && s.subsection.as_deref() == subsection)
            .flat_map(|s| s.entries.iter())
            .filter(|(k, _)| k == key)
            .last()
            .map(|(_, v)| v.as_str())
    }

    /// Set `key = value` in `[name]`/`[name "subsection"]`, creating the
    /// section if absent and overwriting the key's first occurrence if
    /// present (rather than appending a duplicate).
    pub fn set(&mut self, name: &str, subsection: Option<&str>, key: &str, value: &str) {
        let section = self.section_mut(name, subsection);
        if let Some(entry) = section.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_owned();
        } else {
            section.entries.push((key.to_owned(), value.to_owned()));
        }
    }

    fn section_mut(&mut self, name: &str, subsection: Option<&str>) -> &mut ConfigSection {
        if let Some(pos) = self
            .sections
            .iter()
            .position(|s| s.name == name && s.subsection.as_deref() == subsection)
        {
            return &mut self.sections[pos];
        }
        self.sections.push(ConfigSection {
            name: name.to_owned(),
            subsection: subsection.map(str::to_owned),
            entries: Vec::new(),
        });
        self.sections.last_mut().expect("just pushed")
    }
}

fn parse_header(header: &str) -> ConfigSection {
    if let Some(quote) = header.find('"') {
        let name = header[..quote].trim().to_owned();
        let rest = &header[quote + 1..];
        let sub = rest.strip_suffix('"').unwrap_or(rest).to_owned();
        ConfigSection {
            name,
            subsection: Some(sub),
            entries: Vec::new(),
        }
    } else {
        ConfigSection {
            name: header.trim().to_owned(),
            subsection: None,
            entries: Vec::new(),
        }
    }
}

/// Build the `config` file contents [`crate::repo::Repo::init`] writes for
/// a freshly initialized repository: `repositoryformatversion=1` plus
/// `extensions.objectformat=sha256` for a SHA-256 repository, or
/// `repositoryformatversion=0` with no extensions block for SHA-1
/// (spec.md §4.14).
#[must_use]
pub fn default_config(algo: git_hash::HashAlgo) -> Config {
    let mut config = Config::default();
    match algo {
        git_hash::HashAlgo::Sha1 => {
            config.set("core", None, "repositoryformatversion", "0");
            config.set("core", None, "filemode", "true");
            config.set("core", None, "bare", "false");
        }
        git_hash::HashAlgo::Sha256 => {
            config.set("core", None, "repositoryformatversion", "1");
            config.set("core", None, "filemode", "true");
            config.set("core", None, "bare", "false");
            config.set("extensions", None, "objectformat", "sha256");
        }
    }
    config
}

/// Patch (or insert) `[remote "origin"]` with `url`, the standard
/// fetch refspec, and — when `filter` is given — `promisor=true` plus
/// `partialclonefilter=<filter>` (spec.md §4.14 step 10).
pub fn set_remote_origin(config: &mut Config, url: &str, filter: Option<&str>) {
    config.set("remote", Some("origin"), "url", url);
    config.set(
        "remote",
        Some("origin"),
        "fetch",
        "+refs/heads/*:refs/remotes/origin/*",
    );
    if let Some(filter) = filter {
        config.set("remote", Some("origin"), "promisor", "true");
        config.set("remote", Some("origin"), "partialclonefilter", filter);
    }
}

/// Read `core.repositoryformatversion`/`extensions.objectformat` out of an
/// already-parsed config to recover a repository's hash algorithm
/// (spec.md §4.14 `open`): `extensions.objectformat = sha256` selects
/// SHA-256; anything else (including their absence) selects SHA-1.
#[must_use]
pub fn hash_algorithm(config: &Config) -> git_hash::HashAlgo {
    match config.get("extensions", None, "objectformat") {
        Some("sha256") => git_hash::HashAlgo::Sha256,
        _ => git_hash::HashAlgo::Sha1,
    }
}
