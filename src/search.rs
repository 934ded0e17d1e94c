//! Backward search over a PRG with branching at variant sites.
//!
//! A [`SearchState`] is a suffix-array interval together with the [`VariantSitePath`] the match has taken.
//! Extending a state by one base to the left narrows the interval.
//! Rows of the interval preceded by a marker are at a site boundary, and they spawn new states that jump over the marker:
//!
//! * When the match starts right after a site, it may continue to the left through the end of any allele.
//!   Each allele gets its own state with the allele added to the path.
//! * When the match starts at the first position of an allele, it continues to the left of the site.
//!   The allele is added to the path, unless the match entered the site from the right.
//!
//! A jumped state may itself be preceded by a marker (empty alleles, adjacent sites), so each extension step runs a worklist until no new states appear.
//! Each jump moves strictly to the left in the text, which guarantees termination.
//!
//! When the pattern has been matched, [`resolve_search_states`] labels matches that start inside an allele the path does not yet mention.

use crate::{Base, PrgInfo, MarkerBoundary};

use std::collections::VecDeque;
use std::fmt::Display;
use std::ops::Range;


//-----------------------------------------------------------------------------

/// A half-open interval `[start, end)` of suffix array rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SaInterval {
    pub start: usize,
    pub end: usize,
}

impl SaInterval {
    /// Creates a new interval.
    ///
    /// An interval with `end < start` is normalized to an empty interval.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        SaInterval { start, end: end.max(start) }
    }

    /// Returns the number of rows in the interval.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the interval contains no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the rows in the interval.
    #[inline]
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl Display for SaInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.start, self.end)
    }
}

/// A variant site and the allele taken there.
///
/// Site identifiers are the site markers; allele identifiers start from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantLocus {
    pub site: usize,
    pub allele: usize,
}

impl VariantLocus {
    #[inline]
    pub fn new(site: usize, allele: usize) -> Self {
        VariantLocus { site, allele }
    }
}

impl Display for VariantLocus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.site, self.allele)
    }
}

/// Variant sites and alleles traversed by a match, in left-to-right text order.
pub type VariantSitePath = Vec<VariantLocus>;

/// A partial or complete match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SearchState {
    pub sa_interval: SaInterval,
    pub variant_site_path: VariantSitePath,
}

/// Alternative ways the same pattern matches the PRG.
pub type SearchStates = Vec<SearchState>;

impl SearchState {
    /// Creates a new search state.
    pub fn new(sa_interval: SaInterval, variant_site_path: VariantSitePath) -> Self {
        SearchState { sa_interval, variant_site_path }
    }

    /// Returns `true` if the leftmost traversed site is `site`.
    #[inline]
    pub fn starts_in_site(&self, site: usize) -> bool {
        self.variant_site_path.first().map(|locus| locus.site) == Some(site)
    }

    // Returns a state for the interval with the locus prepended to the path, unless the path already starts in that site.
    fn jumped(&self, sa_interval: SaInterval, locus: VariantLocus) -> Self {
        let mut variant_site_path = Vec::with_capacity(self.variant_site_path.len() + 1);
        if !self.starts_in_site(locus.site) {
            variant_site_path.push(locus);
        }
        variant_site_path.extend_from_slice(&self.variant_site_path);
        SearchState { sa_interval, variant_site_path }
    }
}

//-----------------------------------------------------------------------------

/// Returns the search states for the last base of a pattern.
///
/// The result is empty if the base does not occur in the PRG.
pub fn initial_search_states(prg_info: &PrgInfo, base: Base) -> SearchStates {
    let sa_interval = prg_info.base_interval(base);
    if sa_interval.is_empty() {
        Vec::new()
    } else {
        vec![SearchState::new(sa_interval, Vec::new())]
    }
}

/// Extends each search state to the left with the given base.
///
/// If `crosses_marker` is `false`, matches never jump over variant-site markers.
/// States whose interval becomes empty are dropped.
pub fn extend_search_states(search_states: &[SearchState], base: Base, prg_info: &PrgInfo, crosses_marker: bool) -> SearchStates {
    let mut worklist: VecDeque<SearchState> = search_states.iter().cloned().collect();
    let mut result = Vec::with_capacity(search_states.len());

    while let Some(state) = worklist.pop_front() {
        if crosses_marker {
            for row in prg_info.marker_rows(state.sa_interval) {
                jump_over_marker(&state, row, prg_info, &mut worklist);
            }
        }
        let sa_interval = prg_info.narrow(state.sa_interval, base);
        if !sa_interval.is_empty() {
            result.push(SearchState::new(sa_interval, state.variant_site_path));
        }
    }

    result
}

fn jump_over_marker(state: &SearchState, row: usize, prg_info: &PrgInfo, worklist: &mut VecDeque<SearchState>) {
    match prg_info.marker_boundary(row) {
        Some(MarkerBoundary::SiteEnd { site }) => {
            if let Some(variant_site) = prg_info.site(site) {
                for allele in 1..=variant_site.alleles() {
                    if let Some(end_row) = variant_site.allele_end_row(allele) {
                        let sa_interval = SaInterval::new(end_row, end_row + 1);
                        worklist.push_back(state.jumped(sa_interval, VariantLocus::new(site, allele)));
                    }
                }
            }
        },
        Some(MarkerBoundary::AlleleStart { site, allele }) => {
            if let Some(variant_site) = prg_info.site(site) {
                let opening_row = variant_site.opening_row();
                let sa_interval = SaInterval::new(opening_row, opening_row + 1);
                worklist.push_back(state.jumped(sa_interval, VariantLocus::new(site, allele)));
            }
        },
        None => {},
    }
}

/// Labels complete matches that start inside an allele.
///
/// The interval of each state is split into maximal runs of rows that start in the same allele or outside all sites.
/// A run starting in allele `a` of site `s` gets `(s, a)` as the first locus of its path, unless the path already starts in site `s`.
pub fn resolve_search_states(search_states: SearchStates, prg_info: &PrgInfo) -> SearchStates {
    if prg_info.site_count() == 0 {
        return search_states;
    }

    let mut result = Vec::with_capacity(search_states.len());
    for state in search_states {
        let locus_at = |row: usize| prg_info.locus_at(prg_info.text_position(row));
        let mut run_start = state.sa_interval.start;
        let mut run_locus = locus_at(run_start);
        for row in state.sa_interval.start + 1..state.sa_interval.end {
            let locus = locus_at(row);
            if locus != run_locus {
                result.push(resolved(&state, SaInterval::new(run_start, row), run_locus));
                run_start = row;
                run_locus = locus;
            }
        }
        result.push(resolved(&state, SaInterval::new(run_start, state.sa_interval.end), run_locus));
    }

    result
}

fn resolved(state: &SearchState, sa_interval: SaInterval, locus: Option<VariantLocus>) -> SearchState {
    match locus {
        Some(locus) => state.jumped(sa_interval, locus),
        None => SearchState::new(sa_interval, state.variant_site_path.clone()),
    }
}

/// Finds all matches of the pattern in the PRG using backward search.
///
/// This is the uncached equivalent of what [`crate::index_kmers`] stores for each kmer.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{PrgInfo, VariantLocus, encode_pattern, search_pattern};
///
/// let prg = PrgInfo::from_prg("AC5G6T5AA").unwrap();
/// let pattern = encode_pattern("CTA").unwrap();
/// let states = search_pattern(&pattern, &prg, true);
/// assert_eq!(states.len(), 1);
/// assert_eq!(states[0].sa_interval.len(), 1);
/// assert_eq!(states[0].variant_site_path, vec![VariantLocus::new(5, 2)]);
/// ```
pub fn search_pattern(pattern: &[Base], prg_info: &PrgInfo, crosses_marker: bool) -> SearchStates {
    let (last, prefix) = match pattern.split_last() {
        Some(split) => split,
        None => return Vec::new(),
    };
    let mut search_states = initial_search_states(prg_info, *last);
    for base in prefix.iter().rev() {
        if search_states.is_empty() {
            break;
        }
        search_states = extend_search_states(&search_states, *base, prg_info, crosses_marker);
    }
    resolve_search_states(search_states, prg_info)
}

//-----------------------------------------------------------------------------
