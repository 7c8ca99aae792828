//! Fuzzy sequence alignment with uniqueness tie breaking.
//!
//! The matcher treats the run of tokens immediately before a labelled region
//! (scanned backward, the prefix fingerprint) and the run immediately after
//! it (the suffix fingerprint) independently. A fingerprint only counts when
//! its longest match in the searched window is strictly longer than every
//! other candidate's: ties are rejected as ambiguous. That is what lets
//! repeated boilerplate (menus, footers) score zero while genuinely
//! distinguishing context still anchors.
//!
//! Everything here is generic over `PartialEq` items: the extractor pipeline
//! aligns token arrays, and partial annotations reuse the same primitives
//! over raw characters.

use crate::page::PageRegion;

/// Length of the shared leading run of two sequences.
pub fn common_prefix_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// The longest shared leading run across all sequences. Empty input yields
/// an empty prefix.
pub fn common_prefix<T: PartialEq + Clone>(sequences: &[&[T]]) -> Vec<T> {
    match sequences.split_first() {
        Some((first, rest)) => {
            let mut len = first.len();
            for seq in rest {
                len = common_prefix_length(&first[..len], seq);
            }
            first[..len].to_vec()
        }
        None => Vec::new(),
    }
}

/// Tracks the best scoring candidate and whether that score was ever tied.
struct UniqueBest {
    best: Option<(usize, usize)>,
    ambiguous: bool,
}

impl UniqueBest {
    fn new() -> Self {
        Self {
            best: None,
            ambiguous: false,
        }
    }

    fn push(&mut self, index: usize, length: usize) {
        match self.best {
            Some((_, best_len)) if length > best_len => {
                self.best = Some((index, length));
                self.ambiguous = false;
            }
            Some((_, best_len)) if length == best_len => self.ambiguous = true,
            None => self.best = Some((index, length)),
            _ => {}
        }
    }

    fn into_unique(self) -> Option<(usize, usize)> {
        if self.ambiguous {
            None
        } else {
            self.best
        }
    }
}

/// Find the longest match of `subsequence` within `to_search`, requiring the
/// winning length to be strictly greater than every other candidate's.
///
/// Candidate start positions are restricted to `range_start..range_end`
/// (`None` meaning the end of `to_search`), the match itself may run past
/// `range_end`. Returns `(start index, match length)`, or `None` when there
/// is no match at all or the best length is shared by two candidates.
pub fn longest_unique_subsequence<T: PartialEq>(
    to_search: &[T],
    subsequence: &[T],
    range_start: usize,
    range_end: Option<usize>,
) -> Option<(usize, usize)> {
    let first = subsequence.first()?;
    let range_end = range_end.unwrap_or(to_search.len()).min(to_search.len());
    let mut best = UniqueBest::new();
    for i in range_start..range_end {
        if to_search[i] == *first {
            best.push(i, common_prefix_length(&to_search[i..], subsequence));
        }
    }
    best.into_unique()
}

/// Like [`longest_unique_subsequence`] but without the uniqueness
/// requirement: among equally long matches the earliest positioned one wins.
/// The extraction walk itself never settles for a tied match; this variant
/// is exposed for callers aligning sequences where ties are expected and
/// taking the first occurrence is acceptable.
pub fn first_longest_subsequence<T: PartialEq>(
    to_search: &[T],
    subsequence: &[T],
    range_start: usize,
    range_end: Option<usize>,
) -> Option<(usize, usize)> {
    let first = subsequence.first()?;
    let range_end = range_end.unwrap_or(to_search.len()).min(to_search.len());
    let mut best: Option<(usize, usize)> = None;
    for i in range_start..range_end {
        if to_search[i] != *first {
            continue;
        }
        let length = common_prefix_length(&to_search[i..], subsequence);
        if best.map(|(_, l)| length > l).unwrap_or(true) {
            best = Some((i, length));
        }
    }
    best
}

/// Longest unique match of the template run ending at `anchor`, scanned
/// backward from each candidate position.
fn longest_unique_backward<T: PartialEq>(
    extracted: &[T],
    template: &[T],
    anchor: usize,
    range_start: usize,
    range_end: usize,
) -> Option<(usize, usize)> {
    let target = &template[anchor];
    let mut best = UniqueBest::new();
    for i in range_start..range_end {
        if extracted[i] != *target {
            continue;
        }
        let length = extracted[..=i]
            .iter()
            .rev()
            .zip(template[..=anchor].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        best.push(i, length);
    }
    best.into_unique()
}

/// A successfully located counterpart of a labelled template region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarRegion {
    /// Matched prefix length plus matched suffix length.
    pub score: usize,
    /// Token index where the region starts in the searched array.
    pub start_index: usize,
    /// Token index where it ends, `None` for an open ended region.
    pub end_index: Option<usize>,
}

/// Given a labelled region in a template, locate its structurally analogous
/// counterpart in `extracted` within the window `range_start..range_end`.
///
/// The prefix fingerprint is the template run ending at the region's opening
/// token, matched backward; the suffix fingerprint is the run starting at
/// the closing token, matched forward. Both fingerprints must win uniquely,
/// an ambiguous side contributes nothing. An open ended region needs only
/// the prefix; a single token region accepts either fingerprint, preferring
/// agreement of both on the same position.
pub fn similar_region<T: PartialEq>(
    extracted: &[T],
    template: &[T],
    region: &PageRegion,
    range_start: usize,
    range_end: Option<usize>,
) -> Option<SimilarRegion> {
    let range_end = range_end.unwrap_or(extracted.len()).min(extracted.len());
    if range_start >= range_end || region.start_index >= template.len() {
        return None;
    }

    let prefix = longest_unique_backward(
        extracted,
        template,
        region.start_index,
        range_start,
        range_end,
    );

    let end_index = match region.end_index {
        Some(end) if end < template.len() => end,
        Some(_) => return None,
        None => {
            // open ended: the prefix alone decides
            return prefix.map(|(start, score)| SimilarRegion {
                score,
                start_index: start,
                end_index: None,
            });
        }
    };

    if end_index == region.start_index {
        let suffix = longest_unique_subsequence(
            extracted,
            &template[end_index..],
            range_start,
            Some(range_end),
        );
        return match (prefix, suffix) {
            (Some((pi, ps)), Some((si, ss))) if pi == si => Some(SimilarRegion {
                score: ps + ss,
                start_index: pi,
                end_index: Some(pi),
            }),
            (Some((pi, ps)), Some((si, ss))) => {
                let (index, score) = if ss > ps { (si, ss) } else { (pi, ps) };
                Some(SimilarRegion {
                    score,
                    start_index: index,
                    end_index: Some(index),
                })
            }
            (Some((pi, ps)), None) => Some(SimilarRegion {
                score: ps,
                start_index: pi,
                end_index: Some(pi),
            }),
            (None, Some((si, ss))) => Some(SimilarRegion {
                score: ss,
                start_index: si,
                end_index: Some(si),
            }),
            (None, None) => None,
        };
    }

    // paired region: both fingerprints must anchor, the close at or after
    // the matched open
    let (pi, ps) = prefix?;
    let (si, ss) = longest_unique_subsequence(extracted, &template[end_index..], pi, Some(range_end))?;
    Some(SimilarRegion {
        score: ps + ss,
        start_index: pi,
        end_index: Some(si),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_across_sequences() {
        let a = [1, 2, 3, 4];
        let b = [1, 2, 3, 9];
        let c = [1, 2, 7];
        assert_eq!(common_prefix(&[&a[..], &b[..], &c[..]]), vec![1, 2]);
        assert_eq!(common_prefix::<u32>(&[]), Vec::<u32>::new());
    }

    #[test]
    fn unique_longest_match() {
        let data = [5, 1, 2, 3, 5, 1, 9];
        let needle = [1, 2, 3];
        assert_eq!(
            longest_unique_subsequence(&data, &needle, 0, None),
            Some((1, 3))
        );
    }

    #[test]
    fn ties_are_ambiguous() {
        let data = [1, 2, 0, 1, 2, 0];
        let needle = [1, 2];
        assert_eq!(longest_unique_subsequence(&data, &needle, 0, None), None);
        // the weaker primitive resolves the tie towards the first position
        assert_eq!(
            first_longest_subsequence(&data, &needle, 0, None),
            Some((0, 2))
        );
    }

    #[test]
    fn range_restricts_candidates_not_match_length() {
        let data = [9, 1, 2, 3, 4];
        let needle = [1, 2, 3, 4];
        // candidate must start before index 2, match may run past it
        assert_eq!(
            longest_unique_subsequence(&data, &needle, 0, Some(2)),
            Some((1, 4))
        );
        assert_eq!(longest_unique_subsequence(&data, &needle, 2, Some(4)), None);
    }

    #[test]
    fn similar_paired_region() {
        //                     0  1  2  3  4  5  6
        let template = [10, 20, 30, 40, 31, 21, 11];
        let extracted = [10, 20, 30, 99, 31, 21, 11];
        let region = PageRegion::bounded(2, 4);
        let m = similar_region(&extracted, &template, &region, 0, None).unwrap();
        assert_eq!(m.start_index, 2);
        assert_eq!(m.end_index, Some(4));
        // prefix [30, 20, 10] + suffix [31, 21, 11]
        assert_eq!(m.score, 6);
    }

    #[test]
    fn similar_region_rejects_duplicate_context() {
        // the same context occurs twice, nothing is uniquely best
        let template = [7, 1, 2, 8];
        let extracted = [7, 1, 2, 0, 7, 1, 2, 0];
        let region = PageRegion::bounded(1, 2);
        assert_eq!(similar_region(&extracted, &template, &region, 0, None), None);
    }

    #[test]
    fn open_ended_region_needs_only_prefix() {
        let template = [1, 2, 3, 4];
        let extracted = [7, 1, 2, 3, 8];
        let region = PageRegion::open_ended(2);
        let m = similar_region(&extracted, &template, &region, 0, None).unwrap();
        assert_eq!(m.start_index, 3);
        assert_eq!(m.end_index, None);
        assert_eq!(m.score, 3);
    }

    #[test]
    fn single_token_region_prefers_agreement() {
        let template = [1, 5, 2];
        let extracted = [1, 5, 2];
        let region = PageRegion::bounded(1, 1);
        let m = similar_region(&extracted, &template, &region, 0, None).unwrap();
        assert_eq!(m.start_index, 1);
        assert_eq!(m.end_index, Some(1));
        // both fingerprints agree, scores add up
        assert_eq!(m.score, 4);
    }

    #[test]
    fn single_token_region_takes_the_stronger_side() {
        // prefix is ambiguous (two identical [1, 5] runs), suffix is unique
        let template = [1, 5, 2];
        let extracted = [1, 5, 9, 1, 5, 2];
        let region = PageRegion::bounded(1, 1);
        let m = similar_region(&extracted, &template, &region, 0, None).unwrap();
        assert_eq!(m.start_index, 4);
        assert_eq!(m.score, 2);
    }
}
