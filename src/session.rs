use crate::config::{self, ViewerConfig};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

/// User preferences that outlive a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAttribute {
    ShowExtraWhitespace,
}

/// Fire-and-forget store for session attributes
pub trait SessionStore: Send + Sync {
    fn set(&self, attribute: SessionAttribute, value: bool);
}

type Update = (SessionAttribute, bool);

/// Session backed by a config file. One writer thread applies updates in
/// the order they were set; a burst of updates is written once.
/// Failures are only logged.
pub struct ConfigSession {
    updates: Mutex<Option<mpsc::Sender<Update>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigSession {
    /// Start the writer for `path`. A file that exists but does not parse
    /// is left alone: updates are then kept for this run only.
    pub fn new(path: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel::<Update>();
        let writer = thread::spawn(move || {
            let target = path.and_then(|path| match config::read_config_file(&path) {
                Ok(config) => Some((path, config)),
                Err(e) => {
                    log::warn!("Not saving session preferences: {:#}", e);
                    None
                }
            });
            write_updates(rx, target);
        });
        ConfigSession {
            updates: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }
}

fn apply(config: &mut ViewerConfig, (attribute, value): Update) {
    match attribute {
        SessionAttribute::ShowExtraWhitespace => config.display.show_extra_whitespace = value,
    }
}

/// Writer loop: block for an update, fold in whatever else is already
/// queued, save once.
fn write_updates(rx: mpsc::Receiver<Update>, mut target: Option<(PathBuf, ViewerConfig)>) {
    while let Ok(first) = rx.recv() {
        let Some((path, config)) = target.as_mut() else {
            continue;
        };
        apply(config, first);
        for update in rx.try_iter() {
            apply(config, update);
        }
        if let Err(e) = config::save_config(config, path) {
            log::warn!("Failed to save session preferences: {:#}", e);
        }
    }
}

impl SessionStore for ConfigSession {
    fn set(&self, attribute: SessionAttribute, value: bool) {
        let sent = self
            .updates
            .lock()
            .ok()
            .and_then(|tx| tx.as_ref().map(|tx| tx.send((attribute, value)).is_ok()))
            .unwrap_or(false);
        if !sent {
            log::warn!("session writer gone; {:?} not saved", attribute);
        }
    }
}

impl Drop for ConfigSession {
    /// Let the writer finish pending saves before the process exits
    fn drop(&mut self) {
        if let Ok(mut tx) = self.updates.lock() {
            tx.take();
        }
        let writer = self.writer.lock().ok().and_then(|mut w| w.take());
        if let Some(writer) = writer {
            if writer.join().is_err() {
                log::warn!("session writer panicked");
            }
        }
    }
}

/// Session that keeps attributes in memory only
#[cfg(test)]
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<Vec<(SessionAttribute, bool)>>,
}

#[cfg(test)]
impl MemorySession {
    pub fn get(&self, attribute: SessionAttribute) -> Option<bool> {
        self.values
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(a, _)| *a == attribute)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
impl SessionStore for MemorySession {
    fn set(&self, attribute: SessionAttribute, value: bool) {
        if let Ok(mut values) = self.values.lock() {
            values.push((attribute, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::read_config_file;

    #[test]
    fn rapid_writes_persist_the_last_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rbd").join("config.toml");
        let session = ConfigSession::new(Some(path.clone()));
        for i in 0..20 {
            session.set(SessionAttribute::ShowExtraWhitespace, i % 2 == 0);
        }
        session.set(SessionAttribute::ShowExtraWhitespace, false);
        drop(session);

        let saved = read_config_file(&path).unwrap();
        assert!(!saved.display.show_extra_whitespace);
    }

    #[test]
    fn unparsable_config_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let broken = "[display\nanchor_offset = 9\n";
        std::fs::write(&path, broken).unwrap();

        let session = ConfigSession::new(Some(path.clone()));
        session.set(SessionAttribute::ShowExtraWhitespace, false);
        drop(session);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    }

    #[test]
    fn other_settings_in_the_file_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nurl = \"https://reviews.example.com\"\n").unwrap();

        let session = ConfigSession::new(Some(path.clone()));
        session.set(SessionAttribute::ShowExtraWhitespace, false);
        drop(session);

        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.server.url.as_deref(), Some("https://reviews.example.com"));
        assert!(!saved.display.show_extra_whitespace);
    }

    #[test]
    fn memory_session_returns_latest_value() {
        let session = MemorySession::default();
        assert_eq!(session.get(SessionAttribute::ShowExtraWhitespace), None);
        session.set(SessionAttribute::ShowExtraWhitespace, false);
        session.set(SessionAttribute::ShowExtraWhitespace, true);
        assert_eq!(session.get(SessionAttribute::ShowExtraWhitespace), Some(true));
    }
}
