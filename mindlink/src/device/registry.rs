use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type DeviceId = String;

/// Returned by `resolve_device` when no device owns a session id.
pub const UNKNOWN_DEVICE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Connecting,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub session_id: Option<String>,
    pub status: SessionStatus,
}

/// Device id to session mapping, shared between the headset workflow
/// (writer) and the demultiplexer (reader, once per frame). Holds at most
/// one session per device. The lock is never held across I/O.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<RwLock<HashMap<DeviceId, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DeviceId, SessionEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DeviceId, SessionEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the session of `device`, replacing any previous one, and
    /// marks it ready.
    pub fn put(&self, device: &str, session_id: &str) {
        self.write().insert(
            device.to_string(),
            SessionEntry {
                session_id: Some(session_id.to_string()),
                status: SessionStatus::Ready,
            },
        );
    }

    /// Updates the status of `device`, creating a session-less entry if the
    /// device is not known yet.
    pub fn set_status(&self, device: &str, status: SessionStatus) {
        self.write()
            .entry(device.to_string())
            .and_modify(|e| e.status = status)
            .or_insert(SessionEntry {
                session_id: None,
                status,
            });
    }

    pub fn remove(&self, device: &str) -> Option<SessionEntry> {
        self.write().remove(device)
    }

    /// Reverse lookup from session id to device. Returns `UNKNOWN_DEVICE` if
    /// no device owns `session_id`.
    pub fn resolve_device(&self, session_id: &str) -> DeviceId {
        self.read()
            .iter()
            .find(|(_, e)| e.session_id.as_deref() == Some(session_id))
            .map(|(d, _)| d.clone())
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
    }

    pub fn session(&self, device: &str) -> Option<String> {
        self.read().get(device).and_then(|e| e.session_id.clone())
    }

    pub fn status(&self, device: &str) -> Option<SessionStatus> {
        self.read().get(device).map(|e| e.status)
    }

    pub fn entry(&self, device: &str) -> Option<SessionEntry> {
        self.read().get(device).cloned()
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.read().keys().cloned().collect();
        devices.sort();
        devices
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn put_overwrites() {
        let reg = SessionRegistry::new();
        reg.put("A", "s1");
        reg.put("A", "s2");
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.session("A").as_deref(), Some("s2"));
        assert_eq!(reg.resolve_device("s2"), "A");
        assert_eq!(reg.resolve_device("s1"), UNKNOWN_DEVICE);
    }

    #[test]
    fn status_lifecycle() {
        let reg = SessionRegistry::new();
        reg.set_status("A", SessionStatus::Connecting);
        assert_eq!(reg.status("A"), Some(SessionStatus::Connecting));
        assert_eq!(reg.session("A"), None);
        reg.put("A", "s1");
        assert_eq!(reg.status("A"), Some(SessionStatus::Ready));
        reg.set_status("A", SessionStatus::Error);
        assert_eq!(
            reg.entry("A"),
            Some(SessionEntry {
                session_id: Some("s1".into()),
                status: SessionStatus::Error
            })
        );
        assert!(reg.remove("A").is_some());
        assert!(reg.is_empty());
    }

    #[test]
    fn removing_one_device_leaves_the_others() {
        let reg = SessionRegistry::new();
        reg.put("A", "s1");
        reg.put("B", "s2");
        reg.remove("A");
        assert_eq!(reg.resolve_device("s2"), "B");
        assert_eq!(reg.devices(), vec!["B".to_string()]);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let reg = SessionRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                thread::spawn(move || {
                    let dev = format!("D{}", i);
                    for n in 0..100 {
                        reg.put(&dev, &format!("{}-{}", dev, n));
                        assert_eq!(reg.resolve_device(&format!("{}-{}", dev, n)), dev);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 8);
        assert_eq!(reg.session("D3").as_deref(), Some("D3-99"));
    }
}
