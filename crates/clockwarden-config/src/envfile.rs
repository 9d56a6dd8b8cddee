//! `.env` file support for secrets kept out of the TOML config
//!
//! Lines are `KEY=VALUE`; blank lines and `#` comments are ignored and a value
//! may be wrapped in single or double quotes. The parsed map is only consulted
//! for keys missing from the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_FILE_NAME: &str = ".env";

/// Key/value pairs loaded from a `.env` file
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    source: Option<PathBuf>,
    values: HashMap<String, String>,
}

impl EnvFile {
    /// Parse `.env` content
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }

            values.insert(key.to_string(), unquote(value.trim()).to_string());
        }

        Self {
            source: None,
            values,
        }
    }

    /// Load the first `.env` found in `dirs`, in order
    pub fn search(dirs: &[PathBuf]) -> Self {
        for dir in dirs {
            let path = dir.join(ENV_FILE_NAME);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    debug!(path = %path.display(), "Loaded env file");
                    let mut env = Self::parse(&content);
                    env.source = Some(path);
                    return env;
                }
                Err(_) => continue,
            }
        }
        Self::default()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Process environment first, then this file. Empty values count as unset.
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.get(key).filter(|v| !v.is_empty()).map(str::to_string))
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_quotes() {
        let env = EnvFile::parse(
            "# api access\n\
             SAASHR_API_KEY=\"abc123\"\n\
             \n\
             OTHER = 'two words'\n\
             BARE=value\n\
             not a pair\n",
        );

        assert_eq!(env.get("SAASHR_API_KEY"), Some("abc123"));
        assert_eq!(env.get("OTHER"), Some("two words"));
        assert_eq!(env.get("BARE"), Some("value"));
        assert_eq!(env.get("not a pair"), None);
    }

    #[test]
    fn search_uses_first_existing_file() {
        let empty = tempfile::tempdir().unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join(".env"), "KEY=first\n").unwrap();
        std::fs::write(second.path().join(".env"), "KEY=second\n").unwrap();

        let env = EnvFile::search(&[
            empty.path().to_path_buf(),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(env.get("KEY"), Some("first"));
        assert_eq!(env.source(), Some(first.path().join(".env").as_path()));
    }

    #[test]
    fn lookup_falls_back_to_file() {
        let env = EnvFile::parse("CLOCKWARDEN_TEST_ONLY_IN_FILE=from-file\n");
        assert_eq!(
            env.lookup("CLOCKWARDEN_TEST_ONLY_IN_FILE").as_deref(),
            Some("from-file")
        );
        assert_eq!(env.lookup("CLOCKWARDEN_TEST_MISSING_KEY"), None);
    }
}
