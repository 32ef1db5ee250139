//! The set of URLs the crawler has committed to fetching

use std::collections::HashSet;

/// Grow-only set of visited URLs
///
/// A URL becomes visited the moment the crawler commits to fetching it,
/// whatever the fetch outcome. Membership is never revoked during a run.
/// Insertion order is remembered so the crawled-URL list can be rebuilt in
/// the order pages were visited.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    members: HashSet<String>,
    order: Vec<String>,
}

impl VisitedSet {
    /// Creates an empty visited set
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL has been visited
    pub fn contains(&self, url: &str) -> bool {
        self.members.contains(url)
    }

    /// Marks a URL as visited
    ///
    /// Returns true if the URL was not already present.
    pub fn add(&mut self, url: &str) -> bool {
        if self.members.contains(url) {
            return false;
        }
        self.members.insert(url.to_string());
        self.order.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over visited URLs in visitation order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for VisitedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for url in iter {
            set.add(url.as_ref());
        }
        set
    }
}

impl PartialEq for VisitedSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for VisitedSet {}
