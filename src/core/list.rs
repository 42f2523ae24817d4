//! Scored list over a single sorted set, with a paging cursor
//!
//! The cursor snapshots the number of matching members when it is built and
//! then walks by fixed-size pages. It advances by the requested page size, not
//! by what a page actually returned, so members removed or added while paging
//! can shift entries across page boundaries: some may be skipped or repeated.

use crate::core::store::{Page, ScoreBound, ScoreRange, Store};
use crate::error::{CollectionError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// A member and its integer score
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListEntry {
    pub member: String,
    pub score: i64,
}

impl ListEntry {
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        ListEntry {
            member: member.into(),
            score,
        }
    }
}

/// Ordered set of members with integer scores
pub struct ScoredList {
    store: Arc<dyn Store>,
    key: String,
}

impl ScoredList {
    pub fn new(store: Arc<dyn Store>, key: impl Into<String>) -> Self {
        ScoredList {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Insert `member` or overwrite its score
    pub fn set(&self, member: &str, score: i64) -> Result<()> {
        self.store.zadd(&self.key, member, score as f64)?;
        Ok(())
    }

    /// Remove members; absent ones are ignored
    pub fn del<I, S>(&self, members: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members: Vec<String> = members.into_iter().map(|m| m.as_ref().to_string()).collect();
        if members.is_empty() {
            return Ok(());
        }
        self.store.zrem(&self.key, &members)?;
        Ok(())
    }

    pub fn contains(&self, member: &str) -> Result<bool> {
        Ok(self.store.zrank(&self.key, member)?.is_some())
    }

    /// The members that exist, checked in one pipelined round trip
    ///
    /// Duplicates in the input are reported once.
    pub fn batch_contains<I, S>(&self, members: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let members: Vec<String> = members
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .filter(|m| seen.insert(m.clone()))
            .collect();
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ranks = self.store.zrank_batch(&self.key, &members)?;
        Ok(members
            .into_iter()
            .zip(ranks)
            .filter_map(|(m, rank)| rank.map(|_| m))
            .collect())
    }

    /// Build a cursor over scores in `[min, max]`
    ///
    /// A bound of 0 means unbounded on that side. `reverse = false` pages in
    /// ascending score order, `true` in descending order. `count` is the page
    /// size and must be positive; a zero page size is not rejected by
    /// [`ListIterator::next_page`] (it never advances the cursor), while
    /// [`ListIterator::pages`] yields nothing for it.
    pub fn range_with_score(
        &self,
        min: u64,
        max: u64,
        offset: u64,
        count: u64,
        reverse: bool,
    ) -> Result<ListIterator> {
        let range = ScoreRange::new(bound(min), bound(max));
        let all_count = self.store.zcount(&self.key, range)?;
        Ok(ListIterator {
            store: self.store.clone(),
            key: self.key.clone(),
            range,
            offset,
            count,
            all_count,
            reverse,
        })
    }
}

fn bound(value: u64) -> ScoreBound {
    if value == 0 {
        ScoreBound::Unbounded
    } else {
        ScoreBound::Inclusive(value as f64)
    }
}

/// Paging cursor returned by [`ScoredList::range_with_score`]
///
/// Not meant to be shared; each consumer should build its own.
pub struct ListIterator {
    store: Arc<dyn Store>,
    key: String,
    range: ScoreRange,
    offset: u64,
    count: u64,
    all_count: u64,
    reverse: bool,
}

impl ListIterator {
    /// Matching members at construction time; never refreshed
    pub fn count(&self) -> u64 {
        self.all_count
    }

    /// Current offset into the range
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fetch the next page
    ///
    /// # Errors
    ///
    /// `IteratorExhausted` once the offset reaches the snapshot count.
    pub fn next_page(&mut self) -> Result<Vec<ListEntry>> {
        if self.offset >= self.all_count {
            return Err(CollectionError::IteratorExhausted);
        }
        let members = self.store.zrange_by_score(
            &self.key,
            self.range,
            Page::new(self.offset, self.count),
            self.reverse,
        )?;
        self.offset = self.offset.saturating_add(self.count);
        Ok(members
            .into_iter()
            .map(|m| ListEntry::new(m.member, m.score as i64))
            .collect())
    }

    /// Iterate pages until the cursor is exhausted
    ///
    /// Yields nothing for a zero page size, which could never advance.
    pub fn pages(&mut self) -> Pages<'_> {
        Pages { iter: self }
    }
}

/// Iterator over the remaining pages of a [`ListIterator`]
pub struct Pages<'a> {
    iter: &'a mut ListIterator,
}

impl Iterator for Pages<'_> {
    type Item = Result<Vec<ListEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.count == 0 {
            return None;
        }
        match self.iter.next_page() {
            Err(CollectionError::IteratorExhausted) => None,
            other => Some(other),
        }
    }
}
