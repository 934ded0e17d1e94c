//! Precomputed search results for all kmers of a given length.
//!
//! [`index_kmers`] runs backward search for every kmer and stores the resulting [`SearchStates`] in a [`KmerIndex`].
//! Kmers without matches are stored with no search states, so the index always contains `4^k` kmers.
//! Search states for shared kmer suffixes are computed once per chunk of kmers using a [`KmerIndexCache`].
//!
//! The index is persisted in the text format described in [`crate::formats`].
//! [`get_kmer_index`] loads an existing cache file if it is valid and otherwise rebuilds the index and writes the cache.

use crate::{formats, utils, Base, KmerIndexError, Kmers, Pattern, PrgInfo, SearchStates};
use crate::kmers::{self, MAX_KMER_SIZE};
use crate::search;

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, BufRead, ErrorKind};
use std::ops::Range;
use std::path::Path;
use std::str;

use rayon::prelude::*;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Kmer index construction parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexParams {
    /// Length of the indexed kmers.
    pub kmer_size: usize,
    /// Number of worker threads used for building the index.
    pub threads: usize,
    /// Allow matches to jump over variant-site markers.
    pub crosses_marker: bool,
}

impl IndexParams {
    /// Default for `kmer_size`.
    pub const DEFAULT_KMER_SIZE: usize = 5;
    /// Default for `threads`.
    pub const DEFAULT_THREADS: usize = 1;

    // Number of chunks per worker thread.
    const CHUNKS_PER_THREAD: usize = 4;

    /// Returns an error if the parameters are unusable.
    pub fn validate(&self) -> Result<(), KmerIndexError> {
        validate_kmer_size(self.kmer_size)?;
        if self.threads == 0 {
            return Err(KmerIndexError::InvalidParameters(String::from("Thread count must be positive")));
        }
        Ok(())
    }
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            kmer_size: Self::DEFAULT_KMER_SIZE,
            threads: Self::DEFAULT_THREADS,
            crosses_marker: true,
        }
    }
}

fn validate_kmer_size(kmer_size: usize) -> Result<(), KmerIndexError> {
    if kmer_size == 0 || kmer_size > MAX_KMER_SIZE {
        return Err(KmerIndexError::InvalidParameters(format!(
            "Kmer size must be between 1 and {} (got {})", MAX_KMER_SIZE, kmer_size
        )));
    }
    Ok(())
}

//-----------------------------------------------------------------------------

/// Search states for every kmer of a fixed length.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{IndexParams, Kmers, PrgInfo, encode_pattern, index_kmers};
///
/// let prg = PrgInfo::from_prg("AAAA").unwrap();
/// let params = IndexParams { kmer_size: 2, ..IndexParams::default() };
/// let kmers = Kmers::all(2).unwrap();
/// let index = index_kmers(&kmers, &prg, &params).unwrap();
/// assert_eq!(index.len(), 16);
///
/// let states = index.get(&encode_pattern("AA").unwrap()).unwrap();
/// assert_eq!(states.len(), 1);
/// assert_eq!(states[0].sa_interval.len(), 3);
/// assert!(states[0].variant_site_path.is_empty());
/// assert!(index.get(&encode_pattern("AC").unwrap()).unwrap().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KmerIndex {
    kmer_size: usize,
    entries: HashMap<Pattern, SearchStates>,
}

impl KmerIndex {
    /// Creates an empty index for kmers of the given length.
    pub fn new(kmer_size: usize) -> Self {
        KmerIndex { kmer_size, entries: HashMap::new() }
    }

    /// Inserts the search states for the kmer and returns the old states, if any.
    pub fn insert(&mut self, kmer: Pattern, search_states: SearchStates) -> Option<SearchStates> {
        self.entries.insert(kmer, search_states)
    }

    /// Returns the search states for the kmer, or [`None`] if the kmer is not in the index.
    #[inline]
    pub fn get(&self, kmer: &[Base]) -> Option<&SearchStates> {
        self.entries.get(kmer)
    }

    /// Returns the number of kmers in the index.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index contains no kmers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the kmer length.
    #[inline]
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Returns an iterator over the kmers and their search states in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Pattern, &SearchStates)> {
        let mut entries: Vec<(&Pattern, &SearchStates)> = self.entries.iter().collect();
        entries.sort_unstable_by_key(|(kmer, _)| kmers::kmer_number(kmer));
        entries.into_iter()
    }

    /// Returns statistics on the index.
    pub fn statistics(&self) -> KmerIndexStats {
        let mut stats = KmerIndexStats { kmers: self.len(), ..KmerIndexStats::default() };
        for search_states in self.entries.values() {
            if !search_states.is_empty() {
                stats.kmers_with_matches += 1;
            }
            stats.search_states += search_states.len();
            for state in search_states.iter() {
                stats.occurrences += state.sa_interval.len();
                stats.max_path_length = stats.max_path_length.max(state.variant_site_path.len());
            }
        }
        stats
    }

    /// Checks that the search states fit the given PRG.
    ///
    /// Every interval must end within the suffix array, and every locus must name an existing allele of an existing site.
    /// Returns a [`KmerIndexError::MalformedCacheLine`] error naming the first offending kmer otherwise.
    pub fn check_prg(&self, prg_info: &PrgInfo) -> Result<(), KmerIndexError> {
        for (kmer, search_states) in self.iter() {
            for state in search_states.iter() {
                if state.sa_interval.end > prg_info.sa_size() {
                    return Err(KmerIndexError::malformed(format!(
                        "Interval {} of kmer {} exceeds suffix array size {}",
                        state.sa_interval, crate::decode_pattern(kmer), prg_info.sa_size()
                    )));
                }
                for locus in state.variant_site_path.iter() {
                    let valid = prg_info.site(locus.site).map_or(false, |site| locus.allele >= 1 && locus.allele <= site.alleles());
                    if !valid {
                        return Err(KmerIndexError::malformed(format!(
                            "Kmer {} has locus ({},{}) not in the PRG", crate::decode_pattern(kmer), locus.site, locus.allele
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Statistics on a [`KmerIndex`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KmerIndexStats {
    /// Number of kmers.
    pub kmers: usize,
    /// Number of kmers with at least one match.
    pub kmers_with_matches: usize,
    /// Total number of search states.
    pub search_states: usize,
    /// Total number of suffix array rows in the search states.
    pub occurrences: usize,
    /// Largest number of variant sites traversed by a match.
    pub max_path_length: usize,
}

impl Display for KmerIndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f, "{} kmers, {} with matches, {} search states, {} occurrences, max path length {}",
            self.kmers, self.kmers_with_matches, self.search_states, self.occurrences, self.max_path_length
        )
    }
}

//-----------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct CacheNode {
    // First base of the suffix, or `None` for the root.
    base: Option<Base>,
    parent: usize,
    children: [Option<usize>; Base::SIGMA],
    search_states: SearchStates,
}

impl CacheNode {
    fn new(base: Option<Base>, parent: usize, search_states: SearchStates) -> Self {
        CacheNode { base, parent, children: [None; Base::SIGMA], search_states }
    }
}

/// Memoized search states for kmer suffixes.
///
/// The cache is a trie stored in an arena.
/// Each node corresponds to a suffix, and its child for base `b` corresponds to the suffix extended with `b` on the left.
/// Node [`Self::ROOT`] is the empty suffix without search states.
///
/// Full kmers are not stored.
/// The states in the cache have not been resolved with [`search::resolve_search_states`].
#[derive(Clone, Debug)]
pub struct KmerIndexCache {
    nodes: Vec<CacheNode>,
}

impl KmerIndexCache {
    /// Identifier of the root node.
    pub const ROOT: usize = 0;

    /// Creates a cache containing only the root.
    pub fn new() -> Self {
        KmerIndexCache { nodes: vec![CacheNode::new(None, Self::ROOT, Vec::new())] }
    }

    /// Returns the number of nodes, including the root.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the cache contains only the root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Returns the child of the node for the given base, if it exists.
    #[inline]
    pub fn child(&self, node: usize, base: Base) -> Option<usize> {
        self.nodes.get(node)?.children[base.rank()]
    }

    /// Returns the unresolved search states of the suffix corresponding to the node.
    pub fn search_states(&self, node: usize) -> Option<&SearchStates> {
        self.nodes.get(node).map(|node| &node.search_states)
    }

    /// Returns the suffix corresponding to the node.
    pub fn suffix(&self, node: usize) -> Pattern {
        let mut result = Vec::new();
        let mut curr = node;
        while let Some(base) = self.nodes.get(curr).and_then(|node| node.base) {
            result.push(base);
            curr = self.nodes[curr].parent;
        }
        result
    }

    // Returns the search states for the suffix of the node extended with the base.
    fn extended_states(&self, node: usize, base: Base, prg_info: &PrgInfo, crosses_marker: bool) -> SearchStates {
        if node == Self::ROOT {
            search::initial_search_states(prg_info, base)
        } else {
            search::extend_search_states(&self.nodes[node].search_states, base, prg_info, crosses_marker)
        }
    }

    /// Returns the child of the node for the given base, creating it if necessary.
    pub fn extend(&mut self, node: usize, base: Base, prg_info: &PrgInfo, crosses_marker: bool) -> usize {
        if let Some(child) = self.child(node, base) {
            return child;
        }
        let search_states = self.extended_states(node, base, prg_info, crosses_marker);
        let child = self.nodes.len();
        self.nodes.push(CacheNode::new(Some(base), node, search_states));
        self.nodes[node].children[base.rank()] = Some(child);
        child
    }

    /// Returns the node for the given suffix, creating the missing nodes.
    pub fn search_suffix(&mut self, suffix: &[Base], prg_info: &PrgInfo, crosses_marker: bool) -> usize {
        let mut node = Self::ROOT;
        for &base in suffix.iter().rev() {
            node = self.extend(node, base, prg_info, crosses_marker);
        }
        node
    }

    /// Returns the resolved search states for the kmer.
    ///
    /// Search states for all proper suffixes are stored in the cache.
    pub fn search_kmer(&mut self, kmer: &[Base], prg_info: &PrgInfo, crosses_marker: bool) -> SearchStates {
        let (first, suffix) = match kmer.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };
        let node = self.search_suffix(suffix, prg_info, crosses_marker);
        let search_states = self.extended_states(node, *first, prg_info, crosses_marker);
        search::resolve_search_states(search_states, prg_info)
    }
}

impl Default for KmerIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for KmerIndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for node in 1..self.nodes.len() {
            let states = &self.nodes[node].search_states;
            writeln!(
                f, "{}: {}{}{}",
                crate::decode_pattern(&self.suffix(node)),
                formats::dump_sa_intervals(states), formats::FIELD_SEPARATOR, formats::dump_variant_site_paths(states)
            )?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

// Splits `0..len` into contiguous chunks.
fn chunk_ranges(len: usize, threads: usize) -> Vec<Range<usize>> {
    let chunks = threads * IndexParams::CHUNKS_PER_THREAD;
    let chunk_len = len.div_ceil(chunks).max(1);
    (0..len).step_by(chunk_len).map(|start| start..(start + chunk_len).min(len)).collect()
}

fn index_chunk(kmers: &Kmers, range: Range<usize>, prg_info: &PrgInfo, crosses_marker: bool) -> Result<Vec<(Pattern, SearchStates)>, KmerIndexError> {
    let mut cache = KmerIndexCache::new();
    let mut result = Vec::with_capacity(range.len());
    for index in range.clone() {
        let kmer = kmers.get(index)?;
        let search_states = cache.search_kmer(&kmer, prg_info, crosses_marker);
        result.push((kmer, search_states));
    }
    log::debug!("Indexed kmers {}..{} using {} cached suffixes", range.start, range.end, cache.len() - 1);
    Ok(result)
}

/// Builds the kmer index for the given kmers.
///
/// The kmers are split into contiguous chunks that are processed in parallel using `params.threads` threads.
/// Each kmer is stored in the index, even if it has no matches.
/// Returns an error if the parameters are invalid, the kmers have the wrong length, or the thread pool cannot be created.
pub fn index_kmers(kmers: &Kmers, prg_info: &PrgInfo, params: &IndexParams) -> Result<KmerIndex, KmerIndexError> {
    params.validate()?;
    if kmers.kmer_size() != params.kmer_size {
        return Err(KmerIndexError::InvalidParameters(format!(
            "Kmer length {} does not match kmer size {}", kmers.kmer_size(), params.kmer_size
        )));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.threads)
        .build()
        .map_err(|err| KmerIndexError::InvalidParameters(format!("Failed to create a thread pool: {}", err)))?;
    let ranges = chunk_ranges(kmers.len(), params.threads);
    log::debug!("Indexing {} kmers in {} chunks using {} threads", kmers.len(), ranges.len(), params.threads);
    let chunks: Vec<Vec<(Pattern, SearchStates)>> = pool.install(|| {
        ranges.par_iter()
            .map(|range| index_chunk(kmers, range.clone(), prg_info, params.crosses_marker))
            .collect::<Result<Vec<_>, KmerIndexError>>()
    })?;

    let mut index = KmerIndex::new(params.kmer_size);
    for (kmer, search_states) in chunks.into_iter().flatten() {
        index.insert(kmer, search_states);
    }
    Ok(index)
}

//-----------------------------------------------------------------------------

/// Where [`get_kmer_index_with_outcome`] got the index from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The index was loaded from a valid cache file.
    Loaded,
    /// The index was built and written to the cache file.
    Generated,
}

/// Returns the kmer index, using the cache file if possible.
///
/// See [`get_kmer_index_with_outcome`].
pub fn get_kmer_index<P: AsRef<Path>>(filename: P, params: &IndexParams, prg_info: &PrgInfo) -> Result<KmerIndex, KmerIndexError> {
    get_kmer_index_with_outcome(filename, params, prg_info).map(|(index, _)| index)
}

/// Returns the kmer index and tells whether it was loaded or generated.
///
/// If the cache file exists, can be loaded as an index for kmers of length `params.kmer_size`, and passes [`KmerIndex::check_prg`], the loaded index is returned.
/// Otherwise the index is built and the cache file is overwritten.
/// The cache does not record `params.crosses_marker` or the PRG it was built for, so a cache built for another PRG with compatible numbers is still accepted.
///
/// Returns an error if the parameters are invalid, the index cannot be built, or the cache file cannot be written.
pub fn get_kmer_index_with_outcome<P: AsRef<Path>>(filename: P, params: &IndexParams, prg_info: &PrgInfo) -> Result<(KmerIndex, CacheOutcome), KmerIndexError> {
    params.validate()?;
    let filename = filename.as_ref();

    if utils::file_exists(filename) {
        match load_kmer_index(filename, params.kmer_size).and_then(|index| index.check_prg(prg_info).map(|_| index)) {
            Ok(index) => {
                log::info!("Loaded the kmer index from {}", filename.display());
                return Ok((index, CacheOutcome::Loaded));
            },
            Err(err) => {
                log::warn!("Rebuilding the kmer index: {}", err);
            },
        }
    } else {
        log::info!("Kmer index cache {} does not exist", filename.display());
    }

    let index = generate_kmer_index(filename, params, prg_info)?;
    Ok((index, CacheOutcome::Generated))
}

/// Builds the index for all kmers of length `params.kmer_size` and writes it to the cache file.
///
/// Returns an error if the index cannot be built or written.
pub fn generate_kmer_index<P: AsRef<Path>>(filename: P, params: &IndexParams, prg_info: &PrgInfo) -> Result<KmerIndex, KmerIndexError> {
    params.validate()?;
    let filename = filename.as_ref();

    log::info!("Building the kmer index for k = {} using {} threads", params.kmer_size, params.threads);
    let kmers = Kmers::all(params.kmer_size)?;
    let index = index_kmers(&kmers, prg_info, params)?;
    log::info!("Built the kmer index: {}", index.statistics());

    formats::dump_kmer_index(&index, filename)?;
    if let Some(size) = utils::file_size(filename) {
        log::info!("Wrote the kmer index to {} ({})", filename.display(), size);
    }
    Ok(index)
}

fn read_error(filename: &Path, err: io::Error) -> KmerIndexError {
    match err.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => KmerIndexError::malformed(err.to_string()),
        _ => KmerIndexError::CacheUnavailable { path: filename.to_path_buf(), reason: err.to_string() },
    }
}

/// Loads the kmer index for kmers of length `kmer_size` from the cache file.
///
/// The file may be gzip-compressed.
/// Each line must end with a line terminator.
/// The index is rejected if a line is malformed, a kmer has the wrong length or occurs twice, or the file does not contain all `4^kmer_size` kmers.
pub fn load_kmer_index<P: AsRef<Path>>(filename: P, kmer_size: usize) -> Result<KmerIndex, KmerIndexError> {
    validate_kmer_size(kmer_size)?;
    let filename = filename.as_ref();
    let expected = kmers::kmer_count(kmer_size).ok_or_else(|| {
        KmerIndexError::InvalidParameters(format!("Too many kmers of length {}", kmer_size))
    })?;

    let mut reader = utils::open_file(filename).map_err(|reason| {
        KmerIndexError::CacheUnavailable { path: filename.to_path_buf(), reason }
    })?;
    let mut index = KmerIndex::new(kmer_size);
    let mut buf: Vec<u8> = Vec::new();
    let mut line_num = 0;
    loop {
        buf.clear();
        let len = reader.read_until(b'\n', &mut buf).map_err(|err| read_error(filename, err).at_line(line_num + 1))?;
        if len == 0 {
            break;
        }
        line_num += 1;
        let line = buf.strip_suffix(b"\n").ok_or_else(|| {
            KmerIndexError::malformed("missing line terminator").at_line(line_num)
        })?;
        let line = str::from_utf8(line).map_err(|err| {
            KmerIndexError::malformed(format!("invalid UTF-8: {}", err)).at_line(line_num)
        })?;

        let (kmer, search_states) = formats::parse_kmer_index_entry(line).map_err(|err| err.at_line(line_num))?;
        if kmer.len() != kmer_size {
            return Err(KmerIndexError::malformed(format!("expected a kmer of length {}, found {}", kmer_size, kmer.len())).at_line(line_num));
        }
        if index.insert(kmer, search_states).is_some() {
            return Err(KmerIndexError::malformed("duplicate kmer").at_line(line_num));
        }
    }

    if index.len() != expected {
        return Err(KmerIndexError::malformed(format!("expected {} kmers, found {}", expected, index.len())));
    }
    Ok(index)
}

//-----------------------------------------------------------------------------
