//! Immutable ordered sets
//!
//! Persistent sorted sets backed by weight-balanced binary search trees.
//! Every operation returns a new set and leaves its inputs untouched;
//! unchanged subtrees are shared between versions, so "copies" are cheap.
//!
//! # Overview
//!
//! - O(log n) `add`, `remove`, `contains`, `split`
//! - O(m log(n/m + 1)) `union`, `intersection`, `difference` for sizes m <= n
//! - O(1) `size` and `clone`
//! - Naturally sorted iteration
//!
//! Because sets are never mutated in place, any number of readers may hold
//! and traverse the same snapshot concurrently without synchronization.
//!
//! # Example
//!
//! ```
//! use ordset::Set;
//!
//! let low = Set::of([1, 2, 3]);
//! let high = Set::of([3, 4]);
//!
//! assert_eq!(low.union(&high).to_array(), vec![1, 2, 3, 4]);
//! assert_eq!(low.intersection(&high).to_array(), vec![3]);
//!
//! // `low` is still what it was.
//! assert!(low.add(9).contains(&9));
//! assert_eq!(low.size(), 3);
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod set;

pub use set::{DecodeError, EmptyCollection, Iter, Set};
