use std::borrow::{Borrow, ToOwned};
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

/// A simple allowlist based on a HashSet
pub struct Allowlist<T: Eq + Hash> {
    values: HashSet<T>,
}

impl<T: Eq + Hash + Clone> Clone for Allowlist<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
        }
    }
}

impl<T: Eq + Hash + Debug> Debug for Allowlist<T> {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.values.fmt(f)
    }
}

impl<T: Eq + Hash> Extend<T> for Allowlist<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.values.extend(iter)
    }
}

impl<T: Eq + Hash> Allowlist<T> {
    #[inline]
    pub fn new() -> Self {
        Self {
            values: HashSet::new(),
        }
    }

    #[inline]
    pub fn allows<Q: ?Sized>(&self, val: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.values.contains(val)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

impl<T: Eq + Hash + Ord + Clone> Allowlist<T> {
    /// Keep only the allowed values, collapsing duplicates into an ordered set
    pub fn retain_allowed<'a, Q, I>(&self, vals: I) -> BTreeSet<T>
    where
        Q: ?Sized + Hash + Eq + ToOwned<Owned = T> + 'a,
        T: Borrow<Q>,
        I: IntoIterator<Item = &'a Q>,
    {
        vals.into_iter()
            .filter(|it| self.allows(*it))
            .map(|it| <Q as ToOwned>::to_owned(it))
            .collect()
    }
}

impl<T: Eq + Hash> Default for Allowlist<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, Q, I> From<I> for Allowlist<T>
where
    T: Hash + Eq,
    Q: ToOwned<Owned = T> + ?Sized + 'a,
    I: IntoIterator<Item = &'a Q>,
{
    fn from(it: I) -> Self {
        let mut values = HashSet::new();
        for e in it {
            values.insert(<Q as ToOwned>::to_owned(e));
        }
        Self { values }
    }
}
