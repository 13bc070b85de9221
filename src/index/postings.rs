//! Posting lists and the set algebra over them
//!
//! A [`PostingList`] is a strictly ascending, duplicate-free sequence of
//! [`MatchId`]s. Every constructor enforces that, and [`intersect`] and
//! [`union`] preserve it, so query code can compose them freely.
//!
//! Both operations are a single forward two-pointer scan and always return a
//! freshly allocated list; the inputs are only borrowed.

use crate::index::error::{IndexError, IndexResult};
use crate::index::MatchId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Strictly ascending, duplicate-free list of match ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostingList(Vec<MatchId>);

impl PostingList {
    pub const EMPTY: PostingList = PostingList(Vec::new());

    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sort and deduplicate raw appended values
    pub fn from_unsorted(mut ids: Vec<MatchId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// Wrap ids that are already strictly ascending
    pub fn from_sorted(ids: Vec<MatchId>) -> IndexResult<Self> {
        if let Some(pos) = ids.windows(2).position(|w| w[0] >= w[1]) {
            return Err(IndexError::NotAscending {
                index: pos + 1,
                prev: ids[pos],
                next: ids[pos + 1],
            });
        }
        Ok(Self(ids))
    }

    /// Rebuild a list from its gap encoding
    pub fn from_gaps(gaps: &[u32]) -> IndexResult<Self> {
        let mut ids = Vec::with_capacity(gaps.len());
        let mut prev: Option<MatchId> = None;

        for (i, &gap) in gaps.iter().enumerate() {
            let id = match prev {
                None => gap,
                Some(_) if gap == 0 => {
                    return Err(IndexError::Corruption(format!(
                        "zero gap at position {} in posting list",
                        i
                    )))
                }
                Some(p) => p.checked_add(gap).ok_or_else(|| {
                    IndexError::Corruption(format!("match id overflow at position {}", i))
                })?,
            };
            ids.push(id);
            prev = Some(id);
        }

        Ok(Self(ids))
    }

    /// Gap encoding: first id as-is, then differences to the previous id
    pub fn to_gaps(&self) -> Vec<u32> {
        let mut prev = 0;
        self.0
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let gap = if i == 0 { id } else { id - prev };
                prev = id;
                gap
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: MatchId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = MatchId> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[MatchId] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<MatchId> {
        self.0
    }

    /// True if every id in `self` also appears in `other`
    pub fn is_subset_of(&self, other: &PostingList) -> bool {
        intersect(self, other).len() == self.len()
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a MatchId;
    type IntoIter = std::slice::Iter<'a, MatchId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ids present in both `a` and `b`
pub fn intersect(a: &PostingList, b: &PostingList) -> PostingList {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }

    PostingList(out)
}

/// Ids present in `a` or `b`; shared ids appear once
pub fn union(a: &PostingList, b: &PostingList) -> PostingList {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }

    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);

    PostingList(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[MatchId]) -> PostingList {
        PostingList::from_sorted(ids.to_vec()).unwrap()
    }

    #[test]
    fn test_from_unsorted_sorts_and_dedups() {
        let pl = PostingList::from_unsorted(vec![5, 1, 3, 1, 5, 2]);
        assert_eq!(pl.as_slice(), &[1, 2, 3, 5]);
    }

    #[test]
    fn test_from_sorted_rejects_duplicates() {
        let err = PostingList::from_sorted(vec![1, 2, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::NotAscending {
                index: 2,
                prev: 2,
                next: 2
            }
        ));
        assert!(PostingList::from_sorted(vec![3, 1]).is_err());
        assert!(PostingList::from_sorted(vec![]).is_ok());
    }

    #[test]
    fn test_intersect_catch_up() {
        // the second list has to skip a run of smaller values repeatedly
        let a = list(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(intersect(&a, &list(&[2, 3, 4])).as_slice(), &[2, 3, 4]);
        assert_eq!(intersect(&a, &list(&[2, 4, 5])).as_slice(), &[2, 4, 5]);

        let sparse = list(&[1, 2, 63, 88, 110]);
        assert_eq!(intersect(&sparse, &list(&[2, 4, 5])).as_slice(), &[2]);
        assert_eq!(
            intersect(&sparse, &list(&[0, 63, 64, 87, 110, 200])).as_slice(),
            &[63, 110]
        );
    }

    #[test]
    fn test_intersect_empty() {
        let a = list(&[1, 2, 3]);
        assert!(intersect(&a, &PostingList::new()).is_empty());
        assert!(intersect(&PostingList::new(), &a).is_empty());
        assert!(intersect(&list(&[1, 3]), &list(&[2, 4])).is_empty());
    }

    #[test]
    fn test_union() {
        let a = list(&[1, 3, 5, 7]);
        let b = list(&[2, 3, 4, 7, 9]);
        assert_eq!(union(&a, &b).as_slice(), &[1, 2, 3, 4, 5, 7, 9]);
        assert_eq!(union(&a, &PostingList::new()), a);
        assert_eq!(union(&PostingList::new(), &b), b);
    }

    #[test]
    fn test_inputs_untouched() {
        let a = list(&[1, 2, 3]);
        let b = list(&[2, 3, 4]);
        let _ = intersect(&a, &b);
        let _ = union(&a, &b);
        assert_eq!(a.as_slice(), &[1, 2, 3]);
        assert_eq!(b.as_slice(), &[2, 3, 4]);
    }

    #[test]
    fn test_gaps() {
        let pl = list(&[3, 4, 10, 11, 500]);
        let gaps = pl.to_gaps();
        assert_eq!(gaps, vec![3, 1, 6, 1, 489]);
        assert_eq!(PostingList::from_gaps(&gaps).unwrap(), pl);
        assert!(PostingList::from_gaps(&[4, 0]).is_err());
        assert!(PostingList::from_gaps(&[u32::MAX, 1]).is_err());
    }

    #[test]
    fn test_subset_and_contains() {
        let universe = list(&[1, 2, 3, 4, 5]);
        assert!(list(&[2, 4]).is_subset_of(&universe));
        assert!(!list(&[2, 6]).is_subset_of(&universe));
        assert!(universe.contains(5));
        assert!(!universe.contains(6));
    }
}
