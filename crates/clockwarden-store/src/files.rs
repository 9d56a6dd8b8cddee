//! Line-oriented punch log and credential cache
//!
//! Punch log line: `local_user,LOGIN|CLOCKOUT,timestamp`
//! Credential line: `local_user,timestamp,remote_user,remote_password`
//!
//! Both files are append-only. Each append is one `write_all` of a complete
//! line under the store mutex; readers re-scan the whole file.

use clockwarden_api::{CredentialRecord, Credentials, PunchEvent, PunchKind};
use clockwarden_util::{LocalUser, format_timestamp, parse_timestamp};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::{PunchStore, StoreError, StoreResult};

pub const PUNCH_LOG_FILE: &str = "user_logins.txt";
pub const CREDENTIAL_FILE: &str = "user_credentials.txt";

/// Text-file backed [`PunchStore`]
pub struct FileStore {
    punch_log: PathBuf,
    credential_cache: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store whose files live in `data_dir`. Files are created on first append.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            punch_log: data_dir.join(PUNCH_LOG_FILE),
            credential_cache: data_dir.join(CREDENTIAL_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn punch_log_path(&self) -> &Path {
        &self.punch_log
    }

    pub fn credential_cache_path(&self) -> &Path {
        &self.credential_cache
    }

    fn append_line(&self, path: &Path, line: String) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(format!("{}\n", line).as_bytes())?;
        Ok(())
    }

    /// File content, or empty if the file does not exist yet
    fn read_lines(path: &Path) -> StoreResult<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PunchStore for FileStore {
    fn append_punch(&self, event: &PunchEvent) -> StoreResult<()> {
        self.append_line(
            &self.punch_log,
            format!(
                "{},{},{}",
                event.local_user,
                event.kind,
                format_timestamp(&event.timestamp)
            ),
        )
    }

    fn punches_for(&self, local_user: &LocalUser) -> StoreResult<Vec<PunchEvent>> {
        let content = Self::read_lines(&self.punch_log)?;
        Ok(content
            .lines()
            .filter_map(parse_punch_line)
            .filter(|event| &event.local_user == local_user)
            .collect())
    }

    fn append_credentials(&self, record: &CredentialRecord) -> StoreResult<()> {
        self.append_line(
            &self.credential_cache,
            format!(
                "{},{},{},{}",
                record.local_user,
                format_timestamp(&record.timestamp),
                record.credentials.remote_user,
                record.credentials.remote_password
            ),
        )
    }

    fn last_credentials(&self, local_user: &LocalUser) -> StoreResult<Option<CredentialRecord>> {
        let content = Self::read_lines(&self.credential_cache)?;
        Ok(content
            .lines()
            .filter_map(parse_credential_line)
            .filter(|record| &record.local_user == local_user)
            .last())
    }
}

fn parse_punch_line(line: &str) -> Option<PunchEvent> {
    let parsed = (|| {
        let mut fields = line.splitn(3, ',');
        let local_user = fields.next()?.trim();
        let kind: PunchKind = fields.next()?.parse().ok()?;
        let timestamp = parse_timestamp(fields.next()?)?;
        if local_user.is_empty() {
            return None;
        }
        Some(PunchEvent {
            local_user: LocalUser::new(local_user),
            kind,
            timestamp,
        })
    })();

    if parsed.is_none() && !line.trim().is_empty() {
        debug!(line, "Skipping unparseable punch log line");
    }
    parsed
}

fn parse_credential_line(line: &str) -> Option<CredentialRecord> {
    // The password is the last field and may itself contain commas
    let mut fields = line.splitn(4, ',');
    let local_user = fields.next()?.trim();
    let timestamp = parse_timestamp(fields.next()?)?;
    let remote_user = fields.next()?.trim();
    let remote_password = fields.next()?;

    if local_user.is_empty() {
        debug!("Skipping credential line without a local user");
        return None;
    }

    Some(CredentialRecord {
        local_user: LocalUser::new(local_user),
        timestamp,
        credentials: Credentials::new(remote_user, remote_password),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn at(h: u32, m: u32) -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let user = LocalUser::new("dana");

        assert!(store.punches_for(&user).unwrap().is_empty());
        assert!(store.last_credentials(&user).unwrap().is_none());
    }

    #[test]
    fn punches_are_filtered_by_user_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let dana = LocalUser::new("dana");
        let lee = LocalUser::new("lee");

        for (user, kind, time) in [
            (&dana, PunchKind::Login, at(9, 0)),
            (&lee, PunchKind::Login, at(9, 5)),
            (&dana, PunchKind::ClockOut, at(12, 0)),
        ] {
            store
                .append_punch(&PunchEvent {
                    local_user: user.clone(),
                    kind,
                    timestamp: time,
                })
                .unwrap();
        }

        let punches = store.punches_for(&dana).unwrap();
        assert_eq!(punches.len(), 2);
        assert_eq!(punches[0].kind, PunchKind::Login);
        assert_eq!(punches[1].kind, PunchKind::ClockOut);
        assert_eq!(punches[1].timestamp, at(12, 0));

        let raw = std::fs::read_to_string(store.punch_log_path()).unwrap();
        assert_eq!(raw.lines().next(), Some("dana,LOGIN,2025-06-02 09:00:00"));
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PUNCH_LOG_FILE),
            "dana,LOGIN,2025-06-02 09:00:00\n\
             this is not a punch\n\
             dana,LOGOUT,2025-06-02 10:00:00\n\
             dana,CLOCKOUT,not-a-time\n\
             dana,CLOCKOUT,2025-06-02T12:00:00+00:00\n",
        )
        .unwrap();

        let store = FileStore::new(dir.path());
        let punches = store.punches_for(&LocalUser::new("dana")).unwrap();
        assert_eq!(punches.len(), 2);
        assert_eq!(punches[1].kind, PunchKind::ClockOut);
    }

    #[test]
    fn last_credentials_wins_and_keeps_commas_in_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let dana = LocalUser::new("dana");

        store
            .append_credentials(&CredentialRecord {
                local_user: dana.clone(),
                timestamp: at(9, 0),
                credentials: Credentials::new("dperez", "old"),
            })
            .unwrap();
        store
            .append_credentials(&CredentialRecord {
                local_user: dana.clone(),
                timestamp: at(9, 0),
                credentials: Credentials::new("dperez", "new,with,commas"),
            })
            .unwrap();

        let record = store.last_credentials(&dana).unwrap().unwrap();
        assert_eq!(record.credentials.remote_user, "dperez");
        assert_eq!(record.credentials.remote_password, "new,with,commas");
        assert!(store.last_credentials(&LocalUser::new("lee")).unwrap().is_none());
    }

    #[test]
    fn concurrent_appends_keep_lines_whole() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 50;

        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path()));

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let user = LocalUser::new(format!("user{w}"));
                    for i in 0..PER_WRITER {
                        let kind = if i % 2 == 0 {
                            PunchKind::Login
                        } else {
                            PunchKind::ClockOut
                        };
                        store
                            .append_punch(&PunchEvent {
                                local_user: user.clone(),
                                kind,
                                timestamp: at(9, (i % 60) as u32),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let raw = std::fs::read_to_string(store.punch_log_path()).unwrap();
        assert_eq!(raw.lines().count(), WRITERS * PER_WRITER);
        assert!(raw.lines().all(|line| parse_punch_line(line).is_some()));

        for w in 0..WRITERS {
            let punches = store.punches_for(&LocalUser::new(format!("user{w}"))).unwrap();
            assert_eq!(punches.len(), PER_WRITER);
        }
    }
}
