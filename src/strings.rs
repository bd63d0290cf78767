use crate::error::{Error, Result};
use log::*;

/// Deduplicating string table; index 0 means "no string"
#[derive(Clone, Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
    locked: bool,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `s`, appending it if new, and return its 1-based index
    pub fn add(&mut self, s: &str) -> Result<usize> {
        if self.locked {
            return Err(Error::LockedState);
        }
        if let Some(pos) = self.strings.iter().position(|x| x == s) {
            return Ok(pos + 1);
        }
        self.strings.push(s.to_string());
        let index = self.strings.len();
        if index > u8::MAX as usize {
            warn!("String {s:?} gets index {index}, which does not fit a descriptor");
        }
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.strings.get(index - 1).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_and_round_trip() {
        let mut pool = StringPool::new();
        let a = pool.add("Serial").unwrap();
        let b = pool.add("Audio").unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(pool.add("Serial").unwrap(), a);
        assert_eq!(pool.get(a), Some("Serial"));
        assert_eq!(pool.get(b), Some("Audio"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn zero_and_out_of_range_are_none() {
        let mut pool = StringPool::new();
        pool.add("x").unwrap();
        assert_eq!(pool.get(0), None);
        assert_eq!(pool.get(2), None);
    }

    #[test]
    fn locked_pool_rejects_new_strings() {
        let mut pool = StringPool::new();
        pool.add("kept").unwrap();
        pool.lock();
        assert!(matches!(pool.add("new"), Err(Error::LockedState)));
        assert!(matches!(pool.add("kept"), Err(Error::LockedState)));
        assert_eq!(pool.get(1), Some("kept"));
    }
}
