//! Immutable ordered sets
//!
//! Weight-balanced binary search trees with structural sharing.
//! This provides O(log n) insert, delete, and membership operations,
//! and O(m log(n/m + 1)) union, intersection, and difference for
//! sets of sizes m <= n.
//!
//! Sets are persistent: every operation returns a new set, and every
//! previously obtained set remains valid and unchanged. Subtrees that an
//! operation does not touch are shared between the old and new versions
//! rather than copied.
//!
//! # Example
//!
//! ```ignore
//! use ordset::Set;
//!
//! let s1 = Set::from_array(&[1, 2, 3, 4, 5]);
//! let s2 = Set::from_array(&[3, 4, 5, 6, 7]);
//!
//! let union = s1.union(&s2);
//! let intersection = s1.intersection(&s2);
//! ```

use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::Add;
use std::rc::Rc;

use serde::de::{DeserializeOwned, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================
// Core Type
// ============================================================

/// An immutable sorted set.
///
/// This implementation uses a weight-balanced binary search tree, which
/// provides:
/// - O(log n) lookup, insert, delete, and split
/// - O(m log(n/m + 1)) union, intersection, difference (m <= n)
/// - O(1) size queries and clones
/// - Naturally sorted iteration
///
/// Three invariants hold for every reachable node:
/// - Order: everything in the left subtree is strictly less than the
///   node's element, everything in the right subtree strictly greater.
/// - Size: each node caches the exact element count of its subtree.
/// - Balance: neither child's size exceeds a fixed multiple of the
///   other's, so the height of a tree of n elements is O(log n).
pub struct Set<T> {
    root: Link<T>,
}

// Cloning shares the root; it is O(1) and needs no bounds on T.
impl<T> Clone for Set<T> {
    fn clone(&self) -> Self {
        Set {
            root: self.root.clone(),
        }
    }
}

type Link<T> = Option<Rc<Node<T>>>;

struct Node<T> {
    size: usize,
    elem: T,
    left: Link<T>,
    right: Link<T>,
}

/// Maximum allowed ratio between sibling subtree sizes.
const DELTA: usize = 3;
/// Ratio of inner to outer grandchild size that selects a double rotation.
const RATIO: usize = 2;

// ============================================================
// Errors
// ============================================================

/// Error returned by [`Set::find_min`], [`Set::find_max`], and
/// [`Set::remove_min`] when the set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("empty collection")]
pub struct EmptyCollection;

/// Error returned by [`Set::from_json`] when the input is not a JSON
/// array of decodable elements.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The JSON value was not an array.
    #[error("expected a JSON array of elements, found {found}")]
    ExpectedArray {
        /// JSON type of the value that was found instead.
        found: &'static str,
    },

    /// An array element failed to decode.
    #[error("invalid element at index {index}")]
    Element {
        /// Index of the offending array element.
        index: usize,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================
// Construction
// ============================================================

impl<T> Set<T> {
    /// Create an empty set.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s: Set<i64> = Set::new();
    /// assert!(s.is_empty());
    /// ```
    pub fn new() -> Self {
        Set { root: None }
    }

    /// Create a set with a single element.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::singleton(42);
    /// assert!(s.contains(&42));
    /// ```
    pub fn singleton(elem: T) -> Self {
        Set {
            root: bin(None, elem, None),
        }
    }
}

impl<T: Clone + Ord> Set<T> {
    /// Create a set from a slice of elements.
    ///
    /// Duplicates are collapsed.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[3, 1, 4, 1, 5]);
    /// assert_eq!(s.to_array(), vec![1, 3, 4, 5]);
    /// ```
    pub fn from_array(elems: &[T]) -> Self {
        elems.iter().fold(Set::new(), |acc, elem| acc.add(elem.clone()))
    }

    /// Create a set from a fixed-size array of elements.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::of([5, 3, 8, 1]);
    /// assert_eq!(s.size(), 4);
    /// ```
    pub fn of<const N: usize>(elems: [T; N]) -> Self {
        elems.into_iter().collect()
    }

    /// Deprecated spelling of [`Set::from_array`].
    #[deprecated(since = "0.2.0", note = "renamed to `from_array`")]
    pub fn from_list(elems: &[T]) -> Self {
        Set::from_array(elems)
    }
}

impl<T> Default for Set<T> {
    fn default() -> Self {
        Set::new()
    }
}

// ============================================================
// Query
// ============================================================

impl<T> Set<T> {
    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get the number of elements in the set.
    ///
    /// Time: O(1)
    pub fn size(&self) -> usize {
        size_link(&self.root)
    }

    /// Look up the minimum element.
    ///
    /// Returns `None` for empty sets.
    pub fn lookup_min(&self) -> Option<&T> {
        self.root.as_deref().map(find_min_node)
    }

    /// Look up the maximum element.
    ///
    /// Returns `None` for empty sets.
    pub fn lookup_max(&self) -> Option<&T> {
        self.root.as_deref().map(find_max_node)
    }

    /// Find the minimum element, failing on an empty set.
    pub fn find_min(&self) -> Result<&T, EmptyCollection> {
        self.lookup_min().ok_or(EmptyCollection)
    }

    /// Find the maximum element, failing on an empty set.
    pub fn find_max(&self) -> Result<&T, EmptyCollection> {
        self.lookup_max().ok_or(EmptyCollection)
    }
}

impl<T: Ord> Set<T> {
    /// Check if an element is in the set.
    ///
    /// Time: O(log n)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[1, 2, 3]);
    /// assert!(s.contains(&2));
    /// assert!(!s.contains(&5));
    /// ```
    pub fn contains(&self, elem: &T) -> bool {
        let mut link = &self.root;
        while let Some(node) = link.as_deref() {
            match elem.cmp(&node.elem) {
                Ordering::Less => link = &node.left,
                Ordering::Greater => link = &node.right,
                Ordering::Equal => return true,
            }
        }
        false
    }

    /// Check if this set is a subset of another.
    ///
    /// Short-circuits on the first missing element and builds no
    /// intermediate trees.
    pub fn is_subset_of(&self, other: &Set<T>) -> bool {
        self.size() <= other.size() && self.iter().all(|elem| other.contains(elem))
    }

    /// Check if this set is a proper subset of another.
    pub fn is_proper_subset_of(&self, other: &Set<T>) -> bool {
        self.size() < other.size() && self.is_subset_of(other)
    }

    /// Check if two sets have no elements in common.
    ///
    /// Scans the smaller set against the larger one, short-circuiting on
    /// the first shared element.
    pub fn disjoint(&self, other: &Set<T>) -> bool {
        let (small, large) = if self.size() <= other.size() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|elem| !large.contains(elem))
    }
}

fn find_min_node<T>(node: &Node<T>) -> &T {
    match node.left.as_deref() {
        None => &node.elem,
        Some(left) => find_min_node(left),
    }
}

fn find_max_node<T>(node: &Node<T>) -> &T {
    match node.right.as_deref() {
        None => &node.elem,
        Some(right) => find_max_node(right),
    }
}

// ============================================================
// Insertion / Deletion
// ============================================================

impl<T: Clone + Ord> Set<T> {
    /// Insert an element into the set.
    ///
    /// If the element is already present, the result shares its root with
    /// the original set and no nodes are allocated.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::new().add(1).add(2).add(3);
    /// assert_eq!(s.size(), 3);
    /// ```
    pub fn add(&self, elem: T) -> Set<T> {
        Set {
            root: insert_link(&self.root, elem),
        }
    }

    /// Delete an element from the set.
    ///
    /// If the element is not present, the result shares its root with the
    /// original set.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[1, 2, 3]);
    /// let s2 = s.remove(&2);
    /// assert_eq!(s2.size(), 2);
    /// assert!(!s2.contains(&2));
    /// ```
    pub fn remove(&self, elem: &T) -> Set<T> {
        Set {
            root: remove_link(&self.root, elem),
        }
    }

    /// Delete the minimum element, failing on an empty set.
    pub fn remove_min(&self) -> Result<Set<T>, EmptyCollection> {
        match self.root.as_deref() {
            None => Err(EmptyCollection),
            Some(node) => Ok(Set {
                root: remove_min_node(node),
            }),
        }
    }
}

fn insert_link<T: Clone + Ord>(link: &Link<T>, elem: T) -> Link<T> {
    let node = match link.as_deref() {
        None => return bin(None, elem, None),
        Some(node) => node,
    };
    match elem.cmp(&node.elem) {
        Ordering::Equal => link.clone(),
        Ordering::Less => {
            let left = insert_link(&node.left, elem);
            if same_tree(&left, &node.left) {
                link.clone()
            } else {
                balance(left, node.elem.clone(), node.right.clone())
            }
        }
        Ordering::Greater => {
            let right = insert_link(&node.right, elem);
            if same_tree(&right, &node.right) {
                link.clone()
            } else {
                balance(node.left.clone(), node.elem.clone(), right)
            }
        }
    }
}

fn remove_link<T: Clone + Ord>(link: &Link<T>, elem: &T) -> Link<T> {
    let node = match link.as_deref() {
        None => return None,
        Some(node) => node,
    };
    match elem.cmp(&node.elem) {
        Ordering::Less => {
            let left = remove_link(&node.left, elem);
            if same_tree(&left, &node.left) {
                link.clone()
            } else {
                balance(left, node.elem.clone(), node.right.clone())
            }
        }
        Ordering::Greater => {
            let right = remove_link(&node.right, elem);
            if same_tree(&right, &node.right) {
                link.clone()
            } else {
                balance(node.left.clone(), node.elem.clone(), right)
            }
        }
        Ordering::Equal => match (node.left.as_deref(), node.right.as_deref()) {
            (None, _) => node.right.clone(),
            (_, None) => node.left.clone(),
            (Some(_), Some(right)) => {
                // Replace the element with its in-order successor.
                let successor = find_min_node(right).clone();
                balance(node.left.clone(), successor, remove_min_node(right))
            }
        },
    }
}

fn remove_min_node<T: Clone>(node: &Node<T>) -> Link<T> {
    match node.left.as_deref() {
        None => node.right.clone(),
        Some(left) => balance(remove_min_node(left), node.elem.clone(), node.right.clone()),
    }
}

fn remove_max_node<T: Clone>(node: &Node<T>) -> Link<T> {
    match node.right.as_deref() {
        None => node.left.clone(),
        Some(right) => balance(node.left.clone(), node.elem.clone(), remove_max_node(right)),
    }
}

// Trees are shared, so pointer identity means structural identity.
fn same_tree<T>(a: &Link<T>, b: &Link<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

// ============================================================
// Split / Set Operations
// ============================================================

impl<T: Clone + Ord> Set<T> {
    /// Split the set around a pivot.
    ///
    /// Returns the elements less than the pivot, whether the pivot itself
    /// was present, and the elements greater than the pivot.
    ///
    /// Time: O(log n)
    pub fn split(&self, pivot: &T) -> (Set<T>, bool, Set<T>) {
        let (less, present, greater) = split_link(&self.root, pivot);
        (Set { root: less }, present, Set { root: greater })
    }

    /// Union of two sets.
    ///
    /// Time: O(m log(n/m + 1)) for sizes m <= n
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s1 = Set::from_array(&[1, 2, 3]);
    /// let s2 = Set::from_array(&[3, 4, 5]);
    /// assert_eq!(s1.union(&s2).size(), 5);
    /// ```
    pub fn union(&self, other: &Set<T>) -> Set<T> {
        Set {
            root: union_link(&self.root, &other.root),
        }
    }

    /// Intersection of two sets.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s1 = Set::from_array(&[1, 2, 3]);
    /// let s2 = Set::from_array(&[2, 3, 4]);
    /// assert_eq!(s1.intersection(&s2).to_array(), vec![2, 3]);
    /// ```
    pub fn intersection(&self, other: &Set<T>) -> Set<T> {
        Set {
            root: intersection_link(&self.root, &other.root),
        }
    }

    /// Difference of two sets.
    ///
    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s1 = Set::from_array(&[1, 2, 3, 4]);
    /// let s2 = Set::from_array(&[2, 3]);
    /// assert_eq!(s1.difference(&s2).to_array(), vec![1, 4]);
    /// ```
    pub fn difference(&self, other: &Set<T>) -> Set<T> {
        Set {
            root: difference_link(&self.root, &other.root),
        }
    }

    /// Symmetric difference of two sets.
    ///
    /// Returns the elements in either set but not both.
    pub fn symmetric_difference(&self, other: &Set<T>) -> Set<T> {
        self.difference(other).union(&other.difference(self))
    }

    /// Deprecated spelling of [`Set::intersection`].
    #[deprecated(since = "0.2.0", note = "renamed to `intersection`")]
    pub fn inter(&self, other: &Set<T>) -> Set<T> {
        self.intersection(other)
    }

    /// Deprecated spelling of [`Set::difference`].
    #[deprecated(since = "0.2.0", note = "renamed to `difference`")]
    pub fn diff(&self, other: &Set<T>) -> Set<T> {
        self.difference(other)
    }

    /// Partition the set by a predicate.
    ///
    /// Returns the elements satisfying the predicate and those that
    /// do not, as two sets.
    pub fn partition<F>(&self, mut pred: F) -> (Set<T>, Set<T>)
    where
        F: FnMut(&T) -> bool,
    {
        let mut yes = Set::new();
        let mut no = Set::new();
        self.each(|elem| {
            if pred(elem) {
                yes = yes.add(elem.clone());
            } else {
                no = no.add(elem.clone());
            }
        });
        (yes, no)
    }
}

fn split_link<T: Clone + Ord>(link: &Link<T>, pivot: &T) -> (Link<T>, bool, Link<T>) {
    let node = match link.as_deref() {
        None => return (None, false, None),
        Some(node) => node,
    };
    match pivot.cmp(&node.elem) {
        Ordering::Less => {
            let (less, present, greater) = split_link(&node.left, pivot);
            let greater = join(greater, node.elem.clone(), node.right.clone());
            (less, present, greater)
        }
        Ordering::Greater => {
            let (less, present, greater) = split_link(&node.right, pivot);
            let less = join(node.left.clone(), node.elem.clone(), less);
            (less, present, greater)
        }
        Ordering::Equal => (node.left.clone(), true, node.right.clone()),
    }
}

fn union_link<T: Clone + Ord>(a: &Link<T>, b: &Link<T>) -> Link<T> {
    let node = match a.as_deref() {
        None => return b.clone(),
        Some(node) => node,
    };
    if b.is_none() {
        return a.clone();
    }
    let (less, _, greater) = split_link(b, &node.elem);
    join(
        union_link(&node.left, &less),
        node.elem.clone(),
        union_link(&node.right, &greater),
    )
}

fn intersection_link<T: Clone + Ord>(a: &Link<T>, b: &Link<T>) -> Link<T> {
    let node = match a.as_deref() {
        None => return None,
        Some(node) => node,
    };
    if b.is_none() {
        return None;
    }
    let (less, present, greater) = split_link(b, &node.elem);
    let left = intersection_link(&node.left, &less);
    let right = intersection_link(&node.right, &greater);
    if present {
        join(left, node.elem.clone(), right)
    } else {
        merge(left, right)
    }
}

fn difference_link<T: Clone + Ord>(a: &Link<T>, b: &Link<T>) -> Link<T> {
    let node = match a.as_deref() {
        None => return None,
        Some(node) => node,
    };
    if b.is_none() {
        return a.clone();
    }
    let (less, present, greater) = split_link(b, &node.elem);
    let left = difference_link(&node.left, &less);
    let right = difference_link(&node.right, &greater);
    if present {
        merge(left, right)
    } else {
        join(left, node.elem.clone(), right)
    }
}

// ============================================================
// Balance Maintenance
// ============================================================

#[inline]
fn size_link<T>(link: &Link<T>) -> usize {
    match link.as_deref() {
        None => 0,
        Some(node) => node.size,
    }
}

/// Build a node from children that already satisfy the balance invariant.
fn bin<T>(left: Link<T>, elem: T, right: Link<T>) -> Link<T> {
    let size = 1 + size_link(&left) + size_link(&right);
    Some(Rc::new(Node {
        size,
        elem,
        left,
        right,
    }))
}

/// Build a node from children whose sizes may have drifted apart by one
/// insertion or removal, restoring the balance invariant with at most a
/// single or double rotation.
///
/// Rebuilding is non-destructive: the inputs are only read and may still
/// be referenced elsewhere.
fn balance<T: Clone>(left: Link<T>, elem: T, right: Link<T>) -> Link<T> {
    let ln = size_link(&left);
    let rn = size_link(&right);
    if ln + rn <= 1 {
        return bin(left, elem, right);
    }
    if rn > DELTA * ln {
        // rn >= 2, so the right tree is nonempty
        match right {
            Some(r) => rotate_left(left, elem, &r),
            None => bin(left, elem, None),
        }
    } else if ln > DELTA * rn {
        match left {
            Some(l) => rotate_right(&l, elem, right),
            None => bin(None, elem, right),
        }
    } else {
        bin(left, elem, right)
    }
}

fn rotate_left<T: Clone>(left: Link<T>, elem: T, r: &Node<T>) -> Link<T> {
    if size_link(&r.left) < RATIO * size_link(&r.right) {
        single_left(left, elem, r)
    } else {
        double_left(left, elem, r)
    }
}

fn rotate_right<T: Clone>(l: &Node<T>, elem: T, right: Link<T>) -> Link<T> {
    if size_link(&l.right) < RATIO * size_link(&l.left) {
        single_right(l, elem, right)
    } else {
        double_right(l, elem, right)
    }
}

fn single_left<T: Clone>(left: Link<T>, elem: T, r: &Node<T>) -> Link<T> {
    bin(bin(left, elem, r.left.clone()), r.elem.clone(), r.right.clone())
}

fn single_right<T: Clone>(l: &Node<T>, elem: T, right: Link<T>) -> Link<T> {
    bin(l.left.clone(), l.elem.clone(), bin(l.right.clone(), elem, right))
}

fn double_left<T: Clone>(left: Link<T>, elem: T, r: &Node<T>) -> Link<T> {
    match r.left.as_deref() {
        Some(rl) => bin(
            bin(left, elem, rl.left.clone()),
            rl.elem.clone(),
            bin(rl.right.clone(), r.elem.clone(), r.right.clone()),
        ),
        None => single_left(left, elem, r),
    }
}

fn double_right<T: Clone>(l: &Node<T>, elem: T, right: Link<T>) -> Link<T> {
    match l.right.as_deref() {
        Some(lr) => bin(
            bin(l.left.clone(), l.elem.clone(), lr.left.clone()),
            lr.elem.clone(),
            bin(lr.right.clone(), elem, right),
        ),
        None => single_right(l, elem, right),
    }
}

// ============================================================
// Join Primitives
// ============================================================

/// Join two trees around a middle element.
///
/// Everything in `left` must be less than `elem`, and everything in
/// `right` greater. Descends the heavier tree and rebalances on the way
/// back up; cost is proportional to the height difference, not the sizes.
fn join<T: Clone>(left: Link<T>, elem: T, right: Link<T>) -> Link<T> {
    let ln = size_link(&left);
    let rn = size_link(&right);
    if DELTA * ln < rn {
        // rn > 0, so the right tree is nonempty
        match right {
            Some(r) => balance(join(left, elem, r.left.clone()), r.elem.clone(), r.right.clone()),
            None => bin(left, elem, None),
        }
    } else if DELTA * rn < ln {
        match left {
            Some(l) => balance(l.left.clone(), l.elem.clone(), join(l.right.clone(), elem, right)),
            None => bin(None, elem, right),
        }
    } else {
        bin(left, elem, right)
    }
}

/// Join two trees without a middle element.
///
/// Once the trees are within the balance bound of each other, the
/// boundary element of the heavier tree is hoisted up to become the root.
fn merge<T: Clone>(left: Link<T>, right: Link<T>) -> Link<T> {
    let (l, r) = match (left, right) {
        (None, right) => return right,
        (left, None) => return left,
        (Some(l), Some(r)) => (l, r),
    };
    if DELTA * l.size < r.size {
        balance(merge(Some(l), r.left.clone()), r.elem.clone(), r.right.clone())
    } else if DELTA * r.size < l.size {
        balance(l.left.clone(), l.elem.clone(), merge(l.right.clone(), Some(r)))
    } else if l.size > r.size {
        let elem = find_max_node(&l).clone();
        balance(remove_max_node(&l), elem, Some(r))
    } else {
        let elem = find_min_node(&r).clone();
        balance(Some(l), elem, remove_min_node(&r))
    }
}

// ============================================================
// Map / Filter / Fold
// ============================================================

impl<T> Set<T> {
    /// Visit every element in ascending order.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        each_node(&self.root, &mut f);
    }

    /// Visit every element in ascending order along with its index.
    pub fn eachi<F>(&self, mut f: F)
    where
        F: FnMut(usize, &T),
    {
        let mut index = 0;
        each_node(&self.root, &mut |elem| {
            f(index, elem);
            index += 1;
        });
    }

    /// Fold over elements in ascending order.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[1, 2, 3, 4, 5]);
    /// let sum = s.fold(0, |acc, x| acc + x);
    /// assert_eq!(sum, 15);
    /// ```
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        fold_node(&self.root, init, &mut f)
    }

    /// Fold over elements in descending order.
    pub fn fold_right<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        fold_right_node(&self.root, init, &mut f)
    }

    /// Check if every element satisfies a predicate.
    pub fn all<F>(&self, pred: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().all(pred)
    }

    /// Check if any element satisfies a predicate.
    pub fn any<F>(&self, pred: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().any(pred)
    }
}

impl<T: Clone + Ord> Set<T> {
    /// Map a function over all elements.
    ///
    /// The result is rebuilt element by element, because the function may
    /// reorder elements or map several of them to the same value.
    ///
    /// Time: O(n log n)
    pub fn map<U, F>(&self, mut f: F) -> Set<U>
    where
        U: Clone + Ord,
        F: FnMut(&T) -> U,
    {
        self.fold(Set::new(), |acc, elem| acc.add(f(elem)))
    }

    /// Keep the elements that satisfy a predicate.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[1, 2, 3, 4, 5]);
    /// let evens = s.filter(|x| x % 2 == 0);
    /// assert_eq!(evens.to_array(), vec![2, 4]);
    /// ```
    pub fn filter<F>(&self, mut pred: F) -> Set<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.fold(Set::new(), |acc, elem| {
            if pred(elem) {
                acc.add(elem.clone())
            } else {
                acc
            }
        })
    }
}

fn each_node<T, F>(link: &Link<T>, f: &mut F)
where
    F: FnMut(&T),
{
    if let Some(node) = link.as_deref() {
        each_node(&node.left, f);
        f(&node.elem);
        each_node(&node.right, f);
    }
}

fn fold_node<T, B, F>(link: &Link<T>, acc: B, f: &mut F) -> B
where
    F: FnMut(B, &T) -> B,
{
    match link.as_deref() {
        None => acc,
        Some(node) => {
            let acc = fold_node(&node.left, acc, f);
            let acc = f(acc, &node.elem);
            fold_node(&node.right, acc, f)
        }
    }
}

fn fold_right_node<T, B, F>(link: &Link<T>, acc: B, f: &mut F) -> B
where
    F: FnMut(B, &T) -> B,
{
    match link.as_deref() {
        None => acc,
        Some(node) => {
            let acc = fold_right_node(&node.right, acc, f);
            let acc = f(acc, &node.elem);
            fold_right_node(&node.left, acc, f)
        }
    }
}

// ============================================================
// Conversion
// ============================================================

impl<T: Clone> Set<T> {
    /// Convert to a sorted vector of elements.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let s = Set::from_array(&[3, 1, 4, 1, 5]);
    /// assert_eq!(s.to_array(), vec![1, 3, 4, 5]);
    /// ```
    pub fn to_array(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.size());
        self.each(|elem| items.push(elem.clone()));
        items
    }
}

// ============================================================
// JSON
// ============================================================

impl<T> Set<T> {
    /// Encode the set as a JSON array of its elements in ascending order.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>
    where
        T: Serialize,
    {
        let mut items = Vec::with_capacity(self.size());
        for elem in self.iter() {
            items.push(serde_json::to_value(elem)?);
        }
        Ok(serde_json::Value::Array(items))
    }

    /// Decode a set from a JSON array.
    ///
    /// Fails with [`DecodeError`] if the value is not an array or if any
    /// element fails to decode; the error names the offending index.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let json = serde_json::json!([3, 1, 2]);
    /// let s: Set<i64> = Set::from_json(&json)?;
    /// assert_eq!(s.to_array(), vec![1, 2, 3]);
    /// ```
    pub fn from_json(value: &serde_json::Value) -> Result<Set<T>, DecodeError>
    where
        T: DeserializeOwned + Clone + Ord,
    {
        let items = match value {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(DecodeError::ExpectedArray {
                    found: json_type_name(other),
                })
            }
        };
        let mut set = Set::new();
        for (index, item) in items.iter().enumerate() {
            let elem = T::deserialize(item).map_err(|source| DecodeError::Element { index, source })?;
            set = set.add(elem);
        }
        Ok(set)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================
// Iterator
// ============================================================

impl<T> Set<T> {
    /// Create an iterator over the elements in ascending order.
    ///
    /// The iterator is lazy and can be restarted any number of times;
    /// because the set is immutable, re-iterating never observes a
    /// different sequence.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }
}

/// Lazy in-order iterator over a [`Set`].
///
/// Holds the path from the root to the current element, so creation is
/// O(log n) and each step is O(1) amortized.
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn new(set: &'a Set<T>) -> Self {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: set.size(),
        };
        iter.descend_left(&set.root);
        iter
    }

    fn descend_left(&mut self, mut link: &'a Link<T>) {
        while let Some(node) = link.as_deref() {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.stack.pop()?;
        self.remaining -= 1;
        self.descend_left(&node.right);
        Some(&node.elem)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a Set<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: Clone> IntoIterator for Set<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.to_array().into_iter()
    }
}

// ============================================================
// Trait Implementations
// ============================================================

impl<T: PartialEq> PartialEq for Set<T> {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for Set<T> {}

/// Sets are ordered by size first, then lexicographically by their
/// ascending element sequences.
impl<T: Ord> Ord for Set<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.size()
            .cmp(&other.size())
            .then_with(|| self.iter().cmp(other.iter()))
    }
}

impl<T: Ord> PartialOrd for Set<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Hash> Hash for Set<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size().hash(state);
        for elem in self.iter() {
            elem.hash(state);
        }
    }
}

impl<T: Debug> Debug for Set<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Clone + Ord> FromIterator<T> for Set<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().fold(Set::new(), |acc, elem| acc.add(elem))
    }
}

impl<T: Clone + Ord> Extend<T> for Set<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for elem in iter {
            *self = self.add(elem);
        }
    }
}

/// `+` is union.
impl<T: Clone + Ord> Add for &Set<T> {
    type Output = Set<T>;

    fn add(self, other: &Set<T>) -> Set<T> {
        self.union(other)
    }
}

impl<T: Serialize> Serialize for Set<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.size()))?;
        for elem in self.iter() {
            seq.serialize_element(elem)?;
        }
        seq.end()
    }
}

impl<'de, T> Deserialize<'de> for Set<T>
where
    T: Deserialize<'de> + Clone + Ord,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ElemVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for ElemVisitor<T>
        where
            T: Deserialize<'de> + Clone + Ord,
        {
            type Value = Set<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a sequence of set elements")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Set<T>, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut set = Set::new();
                while let Some(elem) = seq.next_element::<T>()? {
                    set = set.add(elem);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(ElemVisitor(PhantomData))
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Walks a tree checking the order, size, and balance invariants,
    // returning the subtree size.
    fn check_node<T: Ord>(link: &Link<T>) -> usize {
        match link.as_deref() {
            None => 0,
            Some(node) => {
                if let Some(left) = node.left.as_deref() {
                    assert!(find_max_node(left) < &node.elem);
                }
                if let Some(right) = node.right.as_deref() {
                    assert!(&node.elem < find_min_node(right));
                }
                let ln = check_node(&node.left);
                let rn = check_node(&node.right);
                assert_eq!(node.size, 1 + ln + rn);
                if ln + rn > 1 {
                    assert!(
                        ln <= DELTA * rn && rn <= DELTA * ln,
                        "unbalanced node: left {} right {}",
                        ln,
                        rn
                    );
                }
                node.size
            }
        }
    }

    fn check<T: Ord>(set: &Set<T>) {
        assert_eq!(check_node(&set.root), set.size());
    }

    fn height<T>(link: &Link<T>) -> usize {
        match link.as_deref() {
            None => 0,
            Some(node) => 1 + height(&node.left).max(height(&node.right)),
        }
    }

    #[test]
    fn test_empty() {
        let s: Set<i64> = Set::new();
        assert!(s.is_empty());
        assert_eq!(s.size(), 0);
        check(&s);
    }

    #[test]
    fn test_singleton() {
        let s = Set::singleton(42);
        assert!(!s.is_empty());
        assert_eq!(s.size(), 1);
        assert!(s.contains(&42));
        assert!(!s.contains(&0));
        check(&s);
    }

    #[test]
    fn test_add() {
        let s = Set::new().add(3).add(1).add(2);
        assert_eq!(s.to_array(), vec![1, 2, 3]);
        check(&s);
    }

    #[test]
    fn test_add_duplicate() {
        let s = Set::new().add(1).add(1).add(1);
        assert_eq!(s.size(), 1);
    }

    #[test]
    fn test_add_existing_shares_root() {
        let s = Set::from_array(&[1, 2, 3]);
        let same = s.add(2);
        assert!(same_tree(&s.root, &same.root));
    }

    #[test]
    fn test_remove() {
        let s = Set::of([5, 3, 8, 1]);
        assert_eq!(s.remove(&3).to_array(), vec![1, 5, 8]);
        check(&s.remove(&3));
    }

    #[test]
    fn test_remove_all() {
        let mut s = Set::from_array(&[1, 2, 3, 4, 5]);
        for v in 1..=5 {
            s = s.remove(&v);
            check(&s);
        }
        assert!(s.is_empty());
    }

    #[test]
    fn test_remove_absent_shares_root() {
        let s = Set::from_array(&[1, 2, 3]);
        let same = s.remove(&99);
        assert!(same_tree(&s.root, &same.root));
    }

    #[test]
    fn test_remove_min() {
        let s = Set::from_array(&[3, 1, 2]);
        let s2 = s.remove_min().unwrap();
        assert_eq!(s2.to_array(), vec![2, 3]);
    }

    #[test]
    fn test_remove_min_empty() {
        let s: Set<i64> = Set::new();
        assert_eq!(s.remove_min().unwrap_err(), EmptyCollection);
    }

    #[test]
    fn test_min_max() {
        let s = Set::from_array(&[5, 2, 8, 1, 9, 3]);
        assert_eq!(s.lookup_min(), Some(&1));
        assert_eq!(s.lookup_max(), Some(&9));
        assert_eq!(s.find_min(), Ok(&1));
        assert_eq!(s.find_max(), Ok(&9));
    }

    #[test]
    fn test_min_max_empty() {
        let s: Set<i64> = Set::of([]);
        assert_eq!(s.lookup_min(), None);
        assert_eq!(s.lookup_max(), None);
        assert_eq!(s.find_min(), Err(EmptyCollection));
        assert_eq!(Set::of([1]).find_min(), Ok(&1));
    }

    #[test]
    fn test_from_array_dedup() {
        let s = Set::from_array(&[3, 1, 4, 1, 5, 9, 2, 6]);
        assert_eq!(s.size(), 7);
        assert_eq!(s.to_array(), vec![1, 2, 3, 4, 5, 6, 9]);
    }

    #[test]
    fn test_union() {
        let s1 = Set::of([1, 2, 3]);
        let s2 = Set::of([2, 3, 4]);
        assert_eq!(s1.union(&s2).to_array(), vec![1, 2, 3, 4]);
        check(&s1.union(&s2));
    }

    #[test]
    fn test_union_operator() {
        let s1 = Set::of([1, 2]);
        let s2 = Set::of([2, 3]);
        assert_eq!((&s1 + &s2).to_array(), vec![1, 2, 3]);
    }

    #[test]
    fn test_intersection() {
        let s1 = Set::of([1, 2, 3]);
        let s2 = Set::of([2, 3, 4]);
        assert_eq!(s1.intersection(&s2).to_array(), vec![2, 3]);
    }

    #[test]
    fn test_difference() {
        let s1 = Set::of([1, 2, 3]);
        let s2 = Set::of([2]);
        assert_eq!(s1.difference(&s2).to_array(), vec![1, 3]);
    }

    #[test]
    fn test_symmetric_difference() {
        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_array(&[2, 3, 4]);
        assert_eq!(s1.symmetric_difference(&s2).to_array(), vec![1, 4]);
    }

    #[test]
    #[allow(deprecated)]
    fn test_deprecated_aliases() {
        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_list(&[2, 3, 4]);
        assert_eq!(s1.inter(&s2), s1.intersection(&s2));
        assert_eq!(s1.diff(&s2), s1.difference(&s2));
    }

    #[test]
    fn test_split() {
        let s = Set::from_array(&[1, 2, 3, 4, 5]);
        let (less, present, greater) = s.split(&3);
        assert_eq!(less.to_array(), vec![1, 2]);
        assert!(present);
        assert_eq!(greater.to_array(), vec![4, 5]);
        check(&less);
        check(&greater);

        let (less, present, greater) = s.split(&10);
        assert_eq!(less.size(), 5);
        assert!(!present);
        assert!(greater.is_empty());
    }

    #[test]
    fn test_subset() {
        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_array(&[1, 2, 3, 4, 5]);
        assert!(s1.is_subset_of(&s2));
        assert!(!s2.is_subset_of(&s1));
        assert!(s1.is_subset_of(&s1));
        assert!(s1.is_proper_subset_of(&s2));
        assert!(!s1.is_proper_subset_of(&s1));
    }

    #[test]
    fn test_disjoint() {
        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_array(&[4, 5, 6]);
        let s3 = Set::from_array(&[3, 4, 5]);
        assert!(s1.disjoint(&s2));
        assert!(!s1.disjoint(&s3));
    }

    #[test]
    fn test_each_eachi() {
        let s = Set::from_array(&[2, 1, 3]);
        let mut seen = Vec::new();
        s.each(|x| seen.push(*x));
        assert_eq!(seen, vec![1, 2, 3]);

        let mut indexed = Vec::new();
        s.eachi(|i, x| indexed.push((i, *x)));
        assert_eq!(indexed, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_fold() {
        let s = Set::from_array(&[1, 2, 3, 4, 5]);
        assert_eq!(s.fold(0, |acc, x| acc + x), 15);
        assert_eq!(s.fold(Vec::new(), |mut acc, x| {
            acc.push(*x);
            acc
        }), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_fold_right() {
        let s = Set::from_array(&[1, 2, 3]);
        let collected = s.fold_right(Vec::new(), |mut acc, x| {
            acc.push(*x);
            acc
        });
        assert_eq!(collected, vec![3, 2, 1]);
    }

    #[test]
    fn test_map() {
        let s = Set::from_array(&[1, 2, 3]);
        assert_eq!(s.map(|x| x * 2).to_array(), vec![2, 4, 6]);
        // Collapsing map: several elements may land on one value.
        assert_eq!(s.map(|_| 0).to_array(), vec![0]);
    }

    #[test]
    fn test_filter() {
        let s = Set::from_array(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(s.filter(|x| x % 2 == 0).to_array(), vec![2, 4, 6]);
    }

    #[test]
    fn test_partition() {
        let s = Set::from_array(&[1, 2, 3, 4, 5, 6]);
        let (evens, odds) = s.partition(|x| x % 2 == 0);
        assert_eq!(evens.to_array(), vec![2, 4, 6]);
        assert_eq!(odds.to_array(), vec![1, 3, 5]);
    }

    #[test]
    fn test_all_any() {
        let s = Set::from_array(&[2, 4, 6]);
        assert!(s.all(|x| x % 2 == 0));
        assert!(s.any(|x| *x > 5));
        assert!(!s.any(|x| *x > 6));
        assert!(Set::<i64>::new().all(|_| false));
        assert!(!Set::<i64>::new().any(|_| true));
    }

    #[test]
    fn test_iter() {
        let s = Set::from_array(&[3, 1, 2]);
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(s.iter().len(), 3);

        // Restartable: a second pass sees the same sequence.
        let first: Vec<_> = s.iter().collect();
        let second: Vec<_> = s.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_into_iterator() {
        let s = Set::from_array(&[2, 1]);
        let borrowed: Vec<&i32> = (&s).into_iter().collect();
        assert_eq!(borrowed, vec![&1, &2]);
        let owned: Vec<i32> = s.into_iter().collect();
        assert_eq!(owned, vec![1, 2]);
    }

    #[test]
    fn test_persistence() {
        let s = Set::from_array(&[1, 2, 3]);
        let before = s.to_array();
        let _ = s.add(4);
        let _ = s.remove(&2);
        let _ = s.union(&Set::from_array(&[9]));
        let _ = s.split(&2);
        assert_eq!(s.to_array(), before);
    }

    #[test]
    fn test_equality() {
        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_array(&[3, 2, 1]);
        let s3 = Set::from_array(&[1, 2, 3, 4]);
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_ordering_by_size_then_elements() {
        // A smaller set sorts before a larger one regardless of elements.
        assert!(Set::of([9]) < Set::of([1, 2]));
        // Equal sizes compare lexicographically.
        assert!(Set::of([1, 3]) < Set::of([2, 3]));
        assert!(Set::of([1, 2]) < Set::of([1, 3]));
        assert_eq!(Set::of([1, 2]).cmp(&Set::of([2, 1])), Ordering::Equal);
    }

    #[test]
    fn test_hash_agrees_with_eq() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of<T: Hash>(value: &T) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }

        let s1 = Set::from_array(&[1, 2, 3]);
        let s2 = Set::from_array(&[3, 1, 2]);
        assert_eq!(hash_of(&s1), hash_of(&s2));
    }

    #[test]
    fn test_debug() {
        let s = Set::from_array(&[2, 1]);
        assert_eq!(format!("{:?}", s), "{1, 2}");
    }

    #[test]
    fn test_from_iterator_extend() {
        let mut s: Set<i64> = (1..=5).collect();
        assert_eq!(s.size(), 5);
        s.extend(vec![5, 6, 7]);
        assert_eq!(s.to_array(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_json_round_trip() {
        let s = Set::of([3, 1, 2]);
        let json = s.to_json().unwrap();
        assert_eq!(json, serde_json::json!([1, 2, 3]));
        let back: Set<i32> = Set::from_json(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        let err = Set::<i32>::from_json(&serde_json::json!({"a": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::ExpectedArray { found: "object" }));
    }

    #[test]
    fn test_from_json_reports_offending_index() {
        let err = Set::<i32>::from_json(&serde_json::json!([1, "two", 3])).unwrap_err();
        match err {
            DecodeError::Element { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let s = Set::of(["b".to_string(), "a".to_string()]);
        let encoded = serde_json::to_string(&s).unwrap();
        assert_eq!(encoded, r#"["a","b"]"#);
        let decoded: Set<String> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(EmptyCollection.to_string(), "empty collection");
        let err = Set::<i32>::from_json(&serde_json::json!(null)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected a JSON array of elements, found null"
        );
    }

    #[test]
    fn test_many_insertions_stay_balanced() {
        let mut s = Set::new();
        for i in 0..1024 {
            s = s.add(i);
        }
        check(&s);
        assert_eq!(s.size(), 1024);
        // Height stays within a small constant factor of log2(n).
        assert!(height(&s.root) <= 33, "height {}", height(&s.root));

        let mut descending = Set::new();
        for i in (0..1024).rev() {
            descending = descending.add(i);
        }
        check(&descending);
        assert!(height(&descending.root) <= 33);
    }

    proptest! {
        #[test]
        fn invariants_hold_after_random_ops(
            ops in proptest::collection::vec((any::<bool>(), 0i32..64), 0..200)
        ) {
            let mut set = Set::new();
            for (is_add, value) in ops {
                set = if is_add { set.add(value) } else { set.remove(&value) };
                check(&set);
            }
        }

        #[test]
        fn invariants_hold_after_set_algebra(
            a in proptest::collection::vec(0i32..64, 0..64),
            b in proptest::collection::vec(0i32..64, 0..64),
        ) {
            let a = Set::from_array(&a);
            let b = Set::from_array(&b);
            check(&a.union(&b));
            check(&a.intersection(&b));
            check(&a.difference(&b));
            let (less, _, greater) = a.split(&32);
            check(&less);
            check(&greater);
        }

        #[test]
        fn height_is_logarithmic(values in proptest::collection::vec(any::<i32>(), 0..512)) {
            let set = Set::from_array(&values);
            let n = set.size();
            let bound = 3 * (usize::BITS - n.leading_zeros()) as usize + 3;
            prop_assert!(height(&set.root) <= bound);
        }
    }
}
