use std::collections::VecDeque;
use vega_common::types::{Report, TriggeredAlert};

/// Anything stored in a capped log must expose a stable id.
pub trait LogEntry {
    fn entry_id(&self) -> &str;
}

impl LogEntry for TriggeredAlert {
    fn entry_id(&self) -> &str {
        &self.id
    }
}

impl LogEntry for Report {
    fn entry_id(&self) -> &str {
        &self.id
    }
}

/// Newest-first collection that never holds more than `capacity` entries.
///
/// # Examples
///
/// ```
/// use vega_storage::{BoundedLog, LogEntry};
///
/// struct E(&'static str);
/// impl LogEntry for E {
///     fn entry_id(&self) -> &str { self.0 }
/// }
///
/// let mut log = BoundedLog::new(2);
/// assert_eq!(log.append(E("a")), None);
/// assert_eq!(log.append(E("b")), None);
/// assert_eq!(log.append(E("c")).as_deref(), Some("a"));
/// assert_eq!(log.iter().map(|e| e.0).collect::<Vec<_>>(), vec!["c", "b"]);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T: LogEntry> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.saturating_add(1)),
        }
    }

    /// Inserts `entry` as the newest element and returns the id of the
    /// oldest element if the insert overflowed the capacity.
    pub fn append(&mut self, entry: T) -> Option<String> {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries
                .pop_back()
                .map(|evicted| evicted.entry_id().to_string())
        } else {
            None
        }
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.iter_mut().find(|e| e.entry_id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
