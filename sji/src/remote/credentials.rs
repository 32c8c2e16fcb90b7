//! Credential pairs and per-task random selection

use std::fmt;
use std::path::Path;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("No credentials configured")]
    Empty,

    #[error("Malformed credentials on line {line}: expected 'username password'")]
    Malformed { line: usize },

    #[error("Failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),
}

/// Username and API key or password for basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Non-empty set of credential pairs
///
/// With more than one pair, [`CredentialPool::pick`] spreads write load across
/// principals. There is no session affinity between picks.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    entries: Vec<Credentials>,
}

impl CredentialPool {
    pub fn new(entries: Vec<Credentials>) -> Result<Self, CredentialsError> {
        if entries.is_empty() {
            return Err(CredentialsError::Empty);
        }
        Ok(Self { entries })
    }

    pub fn single(credentials: Credentials) -> Self {
        Self {
            entries: vec![credentials],
        }
    }

    /// Parse one `username password` pair per line, blank lines ignored
    pub fn parse(content: &str) -> Result<Self, CredentialsError> {
        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(username), Some(password), None) => entries.push(Credentials::new(username, password)),
                _ => return Err(CredentialsError::Malformed { line: idx + 1 }),
            }
        }
        Self::new(entries)
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        debug!(path = %path.display(), "CredentialPool::from_file: called");
        let content = std::fs::read_to_string(path)?;
        let pool = Self::parse(&content)?;
        debug!(count = pool.count(), "CredentialPool::from_file: loaded");
        Ok(pool)
    }

    /// The pair used for startup checks
    pub fn first(&self) -> &Credentials {
        &self.entries[0]
    }

    /// Uniformly random pair
    pub fn pick(&self) -> &Credentials {
        if self.entries.len() == 1 {
            return &self.entries[0];
        }
        let idx = rand::rng().random_range(0..self.entries.len());
        &self.entries[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credentials> {
        self.entries.iter()
    }

    /// Number of pairs; never zero
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    #[test]
    fn test_parse_pairs_and_blank_lines() {
        let pool = CredentialPool::parse("alice key1\n\n  bob   key2  \n").unwrap();
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.first(), &Credentials::new("alice", "key1"));
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let err = CredentialPool::parse("alice key1\nbob\n").unwrap_err();
        assert!(matches!(err, CredentialsError::Malformed { line: 2 }));

        let err = CredentialPool::parse("alice key1 extra\n").unwrap_err();
        assert!(matches!(err, CredentialsError::Malformed { line: 1 }));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(CredentialPool::parse("\n\n"), Err(CredentialsError::Empty)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "svc-a pass-a").unwrap();
        writeln!(file, "svc-b pass-b").unwrap();
        let pool = CredentialPool::from_file(file.path()).unwrap();
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_pick_covers_all_entries() {
        let pool = CredentialPool::new(vec![
            Credentials::new("a", "1"),
            Credentials::new("b", "2"),
            Credentials::new("c", "3"),
        ])
        .unwrap();
        let seen: HashSet<_> = (0..500).map(|_| pool.pick().username.clone()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }
}
