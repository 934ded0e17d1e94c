//! A population reference graph (PRG) with a full-text index.
//!
//! ### PRG text
//!
//! A PRG is written as a string of bases `ACGT` and decimal variant-site markers.
//! An odd marker `s >= 5` opens and closes variant site `s`.
//! The even marker `s + 1` separates the alleles of the site.
//! For example, `AC5G6TT6A5GG` has one site with alleles `G`, `TT`, and `A`.
//! Alleles are numbered from 1 and may be empty.
//! Consecutive digits form a single marker, so adjacent markers must be separated by whitespace, as in `5A6 6C5`.
//! Sites cannot be nested, and each site marker must occur exactly twice.
//!
//! ### Full-text index
//!
//! The encoded text (bases 1 to 4, markers from 5 up, terminated with 0) is indexed with a suffix array and its Burrows-Wheeler transform.
//! Backward search uses one bitvector with rank support for each base.
//! BWT rows preceded by a marker are marked in a separate bitvector with rank and select support.
//! Those rows are where backward search may have to jump over a site boundary; see [`MarkerBoundary`].

use crate::{utils, Base, KmerIndexError, SaInterval, VariantLocus};

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Push, Rank, Select, Vector};
use simple_sds::raw_vector::{AccessRaw, RawVector};

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;


//-----------------------------------------------------------------------------

/// Smallest variant-site marker value.
pub const FIRST_MARKER: u64 = 5;

/// Text terminator.
pub const ENDMARKER: u64 = 0;

/// Returns `true` if the symbol is a variant-site or allele marker.
#[inline]
pub fn is_marker(symbol: u64) -> bool {
    symbol >= FIRST_MARKER
}

/// Returns `true` if the symbol opens or closes a variant site.
#[inline]
pub fn is_site_marker(symbol: u64) -> bool {
    is_marker(symbol) && symbol % 2 == 1
}

/// Returns `true` if the symbol separates the alleles of a variant site.
#[inline]
pub fn is_allele_marker(symbol: u64) -> bool {
    is_marker(symbol) && symbol % 2 == 0
}

//-----------------------------------------------------------------------------

/// A variant site in the PRG text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantSite {
    /// Site identifier, which is also the site marker.
    pub id: usize,
    /// Text position of the opening marker.
    pub opening: usize,
    /// Text position of the closing marker.
    pub closing: usize,
    // Text position of the first symbol of each allele.
    // For an empty allele, this is the marker that ends it.
    allele_starts: Vec<usize>,
    // Text position of the marker ending each allele.
    allele_ends: Vec<usize>,
    // Suffix array row of the opening marker.
    opening_row: usize,
    // Suffix array rows of the markers in `allele_ends`.
    allele_end_rows: Vec<usize>,
}

impl VariantSite {
    /// Returns the number of alleles.
    #[inline]
    pub fn alleles(&self) -> usize {
        self.allele_starts.len()
    }

    /// Returns the text range of allele `allele` (1-based).
    ///
    /// Returns [`None`] if there is no such allele.
    pub fn allele_range(&self, allele: usize) -> Option<std::ops::Range<usize>> {
        let index = allele.checked_sub(1)?;
        Some(*self.allele_starts.get(index)?..self.allele_ends[index])
    }

    /// Returns the allele starting at the given text position.
    pub fn allele_starting_at(&self, text_pos: usize) -> Option<usize> {
        self.allele_starts.iter().position(|&start| start == text_pos).map(|index| index + 1)
    }

    /// Returns the suffix array row of the opening marker.
    #[inline]
    pub fn opening_row(&self) -> usize {
        self.opening_row
    }

    /// Returns the suffix array row of the marker ending allele `allele` (1-based).
    pub fn allele_end_row(&self, allele: usize) -> Option<usize> {
        self.allele_end_rows.get(allele.checked_sub(1)?).copied()
    }
}

/// What lies behind a BWT row preceded by a marker.
///
/// Backward search extends a match to the left.
/// When the symbol before a suffix is a marker, the match is at a variant-site boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerBoundary {
    /// The suffix starts right after the closing marker of the site.
    /// Extending to the left enters the site through the end of any allele.
    SiteEnd { site: usize },
    /// The suffix starts at the first position of the allele.
    /// Extending to the left exits the site through its opening marker.
    AlleleStart { site: usize, allele: usize },
}

//-----------------------------------------------------------------------------

/// A population reference graph with a full-text index.
///
/// The structure is read-only after construction and can be shared between threads.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{Base, PrgInfo, MarkerBoundary};
///
/// let prg = PrgInfo::from_prg("AC5G6T5A").unwrap();
/// assert_eq!(prg.sa_size(), 9);
/// assert_eq!(prg.site_count(), 1);
///
/// // Two occurrences of `A`.
/// let interval = prg.base_interval(Base::A);
/// assert_eq!(interval.len(), 2);
///
/// // `T` occurs only as allele 2 of site 5, preceded by the allele marker.
/// let interval = prg.base_interval(Base::T);
/// let rows: Vec<usize> = prg.marker_rows(interval).collect();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(prg.marker_boundary(rows[0]), Some(MarkerBoundary::AlleleStart { site: 5, allele: 2 }));
/// ```
#[derive(Clone, Debug)]
pub struct PrgInfo {
    // Encoded text with the endmarker.
    text: IntVector,
    // Suffix array of the text.
    sa: IntVector,
    // Burrows-Wheeler transform of the text.
    bwt: IntVector,
    // For each base, the BWT rows containing it.
    occurrences: Vec<BitVector>,
    // Number of text symbols smaller than each base.
    c_table: [usize; Base::SIGMA],
    // BWT rows containing a marker.
    markers: BitVector,
    // Variant sites by identifier.
    sites: BTreeMap<usize, VariantSite>,
    // Site identifier for each text position within an allele, or 0.
    site_mask: IntVector,
    // Allele identifier for each text position within an allele, or 0.
    allele_mask: IntVector,
}

impl PrgInfo {
    /// Builds the index for a PRG given as a string.
    ///
    /// Whitespace is ignored.
    /// Returns an error if the string is empty or not a valid PRG.
    pub fn from_prg(prg: &str) -> Result<Self, KmerIndexError> {
        let mut text = parse_prg(prg)?;
        if text.is_empty() {
            return Err(KmerIndexError::InvalidPrg(String::from("Empty PRG")));
        }
        let (mut sites, site_mask, allele_mask) = find_sites(&text)?;
        text.push(ENDMARKER);

        let sa = suffix_array(&text);
        let bwt: Vec<u64> = sa.iter().map(|&pos| {
            if pos == 0 { text[text.len() - 1] } else { text[pos - 1] }
        }).collect();

        // Rows of marker suffixes, used as jump targets.
        let mut marker_rows: HashMap<usize, usize> = HashMap::new();
        for (row, &pos) in sa.iter().enumerate() {
            if is_marker(text[pos]) {
                marker_rows.insert(pos, row);
            }
        }
        for site in sites.values_mut() {
            site.opening_row = marker_rows[&site.opening];
            site.allele_end_rows = site.allele_ends.iter().map(|pos| marker_rows[pos]).collect();
        }

        let mut occurrences = Vec::with_capacity(Base::SIGMA);
        let mut c_table = [0; Base::SIGMA];
        let mut smaller = 1; // The endmarker.
        for base in Base::ALL {
            let symbol = base.encoded() as u64;
            let rows = bwt.iter().enumerate().filter(|&(_, &value)| value == symbol).map(|(row, _)| row);
            let bv = rank_bit_vector(bwt.len(), rows, false);
            c_table[base.rank()] = smaller;
            smaller += bv.count_ones();
            occurrences.push(bv);
        }
        let marker_rows = bwt.iter().enumerate().filter(|&(_, &value)| is_marker(value)).map(|(row, _)| row);
        let markers = rank_bit_vector(bwt.len(), marker_rows, true);

        Ok(PrgInfo {
            text: pack(&text)?,
            sa: pack(&sa.iter().map(|&pos| pos as u64).collect::<Vec<u64>>())?,
            bwt: pack(&bwt)?,
            occurrences, c_table, markers, sites,
            site_mask: pack(&site_mask)?,
            allele_mask: pack(&allele_mask)?,
        })
    }

    /// Loads a PRG string from a file and builds the index.
    ///
    /// The file may be gzip-compressed.
    pub fn load_from<P: AsRef<Path>>(filename: P) -> Result<Self, KmerIndexError> {
        let mut reader = utils::open_file(&filename).map_err(|err| {
            KmerIndexError::InvalidPrg(format!("Cannot open {}: {}", filename.as_ref().display(), err))
        })?;
        let mut prg = String::new();
        reader.read_to_string(&mut prg).map_err(|err| {
            KmerIndexError::InvalidPrg(format!("Cannot read {}: {}", filename.as_ref().display(), err))
        })?;
        Self::from_prg(&prg)
    }

    /// Returns the length of the encoded text, including the endmarker.
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns `true` if the text contains only the endmarker.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Returns the size of the suffix array.
    #[inline]
    pub fn sa_size(&self) -> usize {
        self.sa.len()
    }

    /// Returns the encoded symbol at the given text position.
    #[inline]
    pub fn symbol(&self, text_pos: usize) -> u64 {
        self.text.get(text_pos)
    }

    /// Returns the text position of the suffix at the given row.
    #[inline]
    pub fn text_position(&self, row: usize) -> usize {
        self.sa.get(row) as usize
    }

    /// Returns the symbol preceding the suffix at the given row.
    #[inline]
    pub fn preceding_symbol(&self, row: usize) -> u64 {
        self.bwt.get(row)
    }

    /// Returns the number of variant sites.
    #[inline]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Returns the variant site with the given identifier.
    #[inline]
    pub fn site(&self, id: usize) -> Option<&VariantSite> {
        self.sites.get(&id)
    }

    /// Returns an iterator over the variant sites in text order.
    pub fn sites(&self) -> impl Iterator<Item = &VariantSite> {
        let mut sites: Vec<&VariantSite> = self.sites.values().collect();
        sites.sort_unstable_by_key(|site| site.opening);
        sites.into_iter()
    }

    /// Returns the interval of suffixes starting with the given base.
    pub fn base_interval(&self, base: Base) -> SaInterval {
        let start = self.c_table[base.rank()];
        SaInterval::new(start, start + self.occurrences[base.rank()].count_ones())
    }

    /// Returns the interval of suffixes obtained by prepending the base to the suffixes in the interval.
    ///
    /// The result is empty if no suffix in the interval is preceded by the base.
    pub fn narrow(&self, interval: SaInterval, base: Base) -> SaInterval {
        let occs = &self.occurrences[base.rank()];
        let offset = self.c_table[base.rank()];
        SaInterval::new(offset + occs.rank(interval.start), offset + occs.rank(interval.end))
    }

    /// Returns the rows in the interval preceded by a marker.
    pub fn marker_rows(&self, interval: SaInterval) -> impl Iterator<Item = usize> + '_ {
        let first = self.markers.rank(interval.start);
        let last = self.markers.rank(interval.end);
        (first..last).filter_map(move |rank| self.markers.select(rank))
    }

    /// Classifies a row preceded by a marker.
    ///
    /// Returns [`None`] if the preceding symbol is not a marker.
    pub fn marker_boundary(&self, row: usize) -> Option<MarkerBoundary> {
        let marker = self.preceding_symbol(row);
        if !is_marker(marker) {
            return None;
        }
        let site_id = (if is_site_marker(marker) { marker } else { marker - 1 }) as usize;
        let site = self.site(site_id)?;
        let text_pos = self.text_position(row);
        if is_site_marker(marker) && text_pos == site.closing + 1 {
            return Some(MarkerBoundary::SiteEnd { site: site_id });
        }
        let allele = site.allele_starting_at(text_pos)?;
        Some(MarkerBoundary::AlleleStart { site: site_id, allele })
    }

    /// Returns the variant site and allele containing the text position.
    ///
    /// Returns [`None`] for positions outside alleles and for marker positions.
    pub fn locus_at(&self, text_pos: usize) -> Option<VariantLocus> {
        let site = self.site_mask.get(text_pos) as usize;
        if site == 0 {
            return None;
        }
        Some(VariantLocus::new(site, self.allele_mask.get(text_pos) as usize))
    }
}

//-----------------------------------------------------------------------------

/// Parses a PRG string into encoded symbols without the endmarker.
pub fn parse_prg(prg: &str) -> Result<Vec<u64>, KmerIndexError> {
    let mut result = Vec::with_capacity(prg.len());
    let mut marker: Option<u64> = None;
    for (offset, c) in prg.char_indices() {
        if let Some(digit) = c.to_digit(10) {
            let value = marker.unwrap_or(0).checked_mul(10).and_then(|x| x.checked_add(digit as u64));
            marker = Some(value.ok_or(KmerIndexError::InvalidPrg(format!("Marker too large at offset {}", offset)))?);
            continue;
        }
        if let Some(value) = marker.take() {
            push_marker(&mut result, value)?;
        }
        if c.is_whitespace() {
            continue;
        }
        let base = crate::encode_dna_base(c).map_err(|_| {
            KmerIndexError::InvalidPrg(format!("Invalid character {:?} at offset {}", c, offset))
        })?;
        result.push(base.encoded() as u64);
    }
    if let Some(value) = marker {
        push_marker(&mut result, value)?;
    }
    Ok(result)
}

fn push_marker(text: &mut Vec<u64>, value: u64) -> Result<(), KmerIndexError> {
    if !is_marker(value) {
        return Err(KmerIndexError::InvalidPrg(format!("Invalid marker {} (must be at least {})", value, FIRST_MARKER)));
    }
    text.push(value);
    Ok(())
}

// Returns the variant sites, the site mask, and the allele mask.
fn find_sites(text: &[u64]) -> Result<(BTreeMap<usize, VariantSite>, Vec<u64>, Vec<u64>), KmerIndexError> {
    let mut sites: BTreeMap<usize, VariantSite> = BTreeMap::new();
    let mut site_mask = vec![0; text.len() + 1];
    let mut allele_mask = vec![0; text.len() + 1];
    let mut current: Option<VariantSite> = None;

    for (pos, &symbol) in text.iter().enumerate() {
        if is_site_marker(symbol) {
            let id = symbol as usize;
            match current.take() {
                None => {
                    if sites.contains_key(&id) {
                        return Err(KmerIndexError::InvalidPrg(format!("Site marker {} occurs more than twice", id)));
                    }
                    current = Some(VariantSite {
                        id,
                        opening: pos,
                        closing: pos,
                        allele_starts: vec![pos + 1],
                        allele_ends: Vec::new(),
                        opening_row: 0,
                        allele_end_rows: Vec::new(),
                    });
                },
                Some(mut site) if site.id == id => {
                    site.closing = pos;
                    site.allele_ends.push(pos);
                    sites.insert(id, site);
                },
                Some(site) => {
                    return Err(KmerIndexError::InvalidPrg(format!("Site {} opened inside site {}", id, site.id)));
                },
            }
        } else if is_allele_marker(symbol) {
            let site = current.as_mut().filter(|site| site.id as u64 == symbol - 1).ok_or(
                KmerIndexError::InvalidPrg(format!("Allele marker {} outside site {}", symbol, symbol - 1))
            )?;
            site.allele_ends.push(pos);
            site.allele_starts.push(pos + 1);
        } else if let Some(site) = current.as_ref() {
            site_mask[pos] = site.id as u64;
            allele_mask[pos] = site.allele_starts.len() as u64;
        }
    }

    if let Some(site) = current {
        return Err(KmerIndexError::InvalidPrg(format!("Site {} is not closed", site.id)));
    }
    Ok((sites, site_mask, allele_mask))
}

// Sorts the suffixes of a text terminated with a unique smallest symbol.
fn suffix_array(text: &[u64]) -> Vec<usize> {
    let mut sa: Vec<usize> = (0..text.len()).collect();
    sa.sort_unstable_by(|&a, &b| text[a..].cmp(&text[b..]));
    sa
}

fn rank_bit_vector<I: Iterator<Item = usize>>(len: usize, ones: I, select: bool) -> BitVector {
    let mut raw = RawVector::with_len(len, false);
    for row in ones {
        raw.set_bit(row, true);
    }
    let mut result = BitVector::from(raw);
    result.enable_rank();
    if select {
        result.enable_select();
    }
    result
}

fn pack(values: &[u64]) -> Result<IntVector, KmerIndexError> {
    let max = values.iter().copied().max().unwrap_or(0);
    let width = (64 - max.leading_zeros()).max(1) as usize;
    let mut result = IntVector::with_capacity(values.len(), width).map_err(KmerIndexError::InvalidPrg)?;
    for &value in values {
        result.push(value);
    }
    Ok(result)
}

//-----------------------------------------------------------------------------
