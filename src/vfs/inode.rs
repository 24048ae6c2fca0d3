//! Inode allocation for the virtual filesystem
//!
//! Maps virtual paths to inode numbers and back. Inodes are deterministic
//! hashes with the high bit set (so they never collide with the fixed
//! low-numbered inodes), held in bounded LRU caches: an evicted mapping
//! regenerates the same inode on the next lookup, so the kernel's view
//! stays stable while memory use is capped.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

pub const ROOT_INODE: u64 = 1;
pub const QUERIES_INODE: u64 = 2;

const CACHE_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct InodeMap {
    /// Forward mapping: virtual path -> inode
    forward: Mutex<LruCache<String, u64>>,
    /// Reverse mapping: inode -> virtual path
    reverse: Mutex<LruCache<u64, String>>,
}

impl Default for InodeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeMap {
    pub fn new() -> Self {
        Self {
            forward: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
            reverse: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    /// Get the inode for a virtual path, assigning one if necessary.
    pub fn get_or_assign(&self, vpath: &str) -> u64 {
        match vpath {
            "/" => return ROOT_INODE,
            "/queries" => return QUERIES_INODE,
            _ => {}
        }

        {
            let mut forward = self.forward.lock().unwrap();
            if let Some(inode) = forward.get(vpath) {
                return *inode;
            }
        }

        let inode = hash_to_inode(vpath);
        let mut forward = self.forward.lock().unwrap();
        let mut reverse = self.reverse.lock().unwrap();
        forward.put(vpath.to_string(), inode);
        reverse.put(inode, vpath.to_string());

        tracing::debug!("[vfs] mapped '{}' -> inode {}", vpath, inode);
        inode
    }

    /// Reverse lookup. Fixed inodes always resolve; hashed ones resolve
    /// while they remain in the cache.
    pub fn resolve(&self, inode: u64) -> Option<String> {
        match inode {
            ROOT_INODE => return Some("/".to_string()),
            QUERIES_INODE => return Some("/queries".to_string()),
            _ => {}
        }

        let mut reverse = self.reverse.lock().unwrap();
        reverse.get(&inode).cloned()
    }
}

/// Deterministic hash with the high bit set, clear of the fixed inodes.
fn hash_to_inode(s: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish() | 0x8000_0000_0000_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_inodes_are_stable() {
        let map = InodeMap::new();
        assert_eq!(map.get_or_assign("/"), ROOT_INODE);
        assert_eq!(map.get_or_assign("/queries"), QUERIES_INODE);
        assert_eq!(map.resolve(ROOT_INODE).as_deref(), Some("/"));
        assert_eq!(map.resolve(QUERIES_INODE).as_deref(), Some("/queries"));
    }

    #[test]
    fn assignment_is_deterministic_and_reversible() {
        let map = InodeMap::new();
        let a = map.get_or_assign("/jazz");
        let b = map.get_or_assign("/jazz");
        assert_eq!(a, b);
        assert!(a & 0x8000_0000_0000_0000 != 0);
        assert_eq!(map.resolve(a).as_deref(), Some("/jazz"));
        assert_ne!(map.get_or_assign("/rock"), a);
    }
}
