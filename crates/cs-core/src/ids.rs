//! Dense integer handles used throughout the engine instead of pointers.
//!
//! Chunks, files, trees and repos all live in owning `Vec`s; everything else
//! refers to them by one of these newtypes so that cross-references never
//! need a back-pointer.

use std::fmt;

macro_rules! dense_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub const MAX: $name = $name(u32::MAX);

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                $name(v)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                $name(v as u32)
            }
        }
    };
}

dense_id!(ChunkId);
dense_id!(FileId);
dense_id!(TreeId);
dense_id!(RepoId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_is_sentinel() {
        assert_eq!(FileId::MAX, FileId(u32::MAX));
    }

    #[test]
    fn round_trips_through_index() {
        let id = ChunkId::from(7usize);
        assert_eq!(id.index(), 7);
    }
}
