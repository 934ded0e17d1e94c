//! Text format of the kmer index cache.
//!
//! The cache stores one line per kmer:
//!
//! ```text
//! kmer|intervals|paths
//! ```
//!
//! * `kmer` is the kmer with each base written as its encoding `1` to `4`.
//! * `intervals` lists the suffix-array intervals of the search states as `(start,end)`, separated by [`INTERVAL_SEPARATOR`].
//! * `paths` lists the variant-site paths of the same search states in the same order, separated by [`PATH_SEPARATOR`].
//!   Each path is a list of `(site,allele)` loci separated by [`LOCUS_SEPARATOR`].
//!   An empty path is an empty string.
//!
//! A kmer without matches has an empty `intervals` field and an empty `paths` field.
//! Otherwise the number of paths must equal the number of intervals.
//! For example, a kmer `CTA` matching once through allele 2 of site 5, and once outside sites, becomes
//!
//! ```text
//! 241|(4,5) (7,9)|(5,2);
//! ```
//!
//! Writing: [`dump_kmer`], [`dump_sa_intervals`], [`dump_variant_site_paths`], [`dump_kmer_index_entry`], [`write_kmer_index`], and [`dump_kmer_index`].
//!
//! Reading: [`parse_encoded_kmer`], [`parse_sa_intervals`], [`parse_variant_site_path`], and [`parse_kmer_index_entry`].
//! Parsing never accepts a partially valid line.
//! See [`crate::load_kmer_index`] for loading a whole file.

use crate::{utils, Base, KmerIndex, KmerIndexError, Pattern};
use crate::{SaInterval, SearchState, SearchStates, VariantLocus, VariantSitePath};
use crate::prg;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;


//-----------------------------------------------------------------------------

/// Separates the kmer, interval, and path fields.
pub const FIELD_SEPARATOR: char = '|';

/// Separates the intervals within the interval field.
pub const INTERVAL_SEPARATOR: char = ' ';

/// Separates the paths within the path field.
pub const PATH_SEPARATOR: char = ';';

/// Separates the loci within a path.
pub const LOCUS_SEPARATOR: char = ' ';

//-----------------------------------------------------------------------------

// Writing.

/// Returns the kmer as a string of base encodings.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::encode_pattern;
/// use prg_kmer_index::formats::dump_kmer;
///
/// let kmer = encode_pattern("GATC").unwrap();
/// assert_eq!(dump_kmer(&kmer), "3142");
/// ```
pub fn dump_kmer(kmer: &[Base]) -> String {
    kmer.iter().map(|base| char::from(b'0' + base.encoded())).collect()
}

/// Returns the suffix-array intervals of the search states.
pub fn dump_sa_intervals(search_states: &[SearchState]) -> String {
    let intervals: Vec<String> = search_states.iter().map(|state| state.sa_interval.to_string()).collect();
    intervals.join(&INTERVAL_SEPARATOR.to_string())
}

fn dump_variant_site_path(path: &[VariantLocus]) -> String {
    let loci: Vec<String> = path.iter().map(|locus| locus.to_string()).collect();
    loci.join(&LOCUS_SEPARATOR.to_string())
}

/// Returns the variant-site paths of the search states.
pub fn dump_variant_site_paths(search_states: &[SearchState]) -> String {
    let paths: Vec<String> = search_states.iter().map(|state| dump_variant_site_path(&state.variant_site_path)).collect();
    paths.join(&PATH_SEPARATOR.to_string())
}

/// Returns the cache line for a kmer without the line terminator.
pub fn dump_kmer_index_entry(kmer: &[Base], search_states: &[SearchState]) -> String {
    format!(
        "{}{}{}{}{}",
        dump_kmer(kmer), FIELD_SEPARATOR,
        dump_sa_intervals(search_states), FIELD_SEPARATOR,
        dump_variant_site_paths(search_states)
    )
}

/// Writes the index to the writer, one terminated line per kmer in enumeration order.
pub fn write_kmer_index<W: Write>(index: &KmerIndex, writer: &mut W) -> io::Result<()> {
    for (kmer, search_states) in index.iter() {
        writeln!(writer, "{}", dump_kmer_index_entry(kmer, search_states))?;
    }
    writer.flush()
}

/// Writes the index to the file.
///
/// If the file name ends with `.gz`, the file is gzip-compressed.
/// Any failure is reported as [`KmerIndexError::CacheWrite`].
pub fn dump_kmer_index<P: AsRef<Path>>(index: &KmerIndex, filename: P) -> Result<(), KmerIndexError> {
    let filename = filename.as_ref();
    let write_error = |err: io::Error| KmerIndexError::CacheWrite {
        path: filename.to_path_buf(),
        reason: err.to_string(),
    };

    let file = File::create(filename).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    if utils::has_gzip_extension(filename) {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        write_kmer_index(index, &mut encoder).map_err(write_error)?;
        writer = encoder.finish().map_err(write_error)?;
    } else {
        write_kmer_index(index, &mut writer).map_err(write_error)?;
    }
    let file = writer.into_inner().map_err(|err| write_error(err.into_error()))?;
    file.sync_all().map_err(write_error)
}

//-----------------------------------------------------------------------------

// Parsing.

// Parses `(x,y)` where both values are non-empty strings of ASCII digits.
fn parse_pair(field: &str) -> Result<(usize, usize), KmerIndexError> {
    let inner = field.strip_prefix('(').and_then(|s| s.strip_suffix(')')).ok_or_else(|| {
        KmerIndexError::malformed(format!("expected (x,y), found {:?}", field))
    })?;
    let (first, second) = inner.split_once(',').ok_or_else(|| {
        KmerIndexError::malformed(format!("missing comma in {:?}", field))
    })?;
    Ok((parse_number(first, field)?, parse_number(second, field)?))
}

fn parse_number(value: &str, field: &str) -> Result<usize, KmerIndexError> {
    if value.is_empty() || !value.bytes().all(|c| c.is_ascii_digit()) {
        return Err(KmerIndexError::malformed(format!("invalid number {:?} in {:?}", value, field)));
    }
    value.parse::<usize>().map_err(|err| {
        KmerIndexError::malformed(format!("invalid number {:?} in {:?}: {}", value, field, err))
    })
}

/// Parses a kmer written as base encodings.
///
/// Returns [`KmerIndexError::InvalidBase`] for a character outside `1` to `4`.
pub fn parse_encoded_kmer(field: &str) -> Result<Pattern, KmerIndexError> {
    if field.is_empty() {
        return Err(KmerIndexError::malformed("empty kmer"));
    }
    field.chars().map(|c| {
        c.to_digit(10).and_then(|value| Base::from_encoded(value as u64)).ok_or(KmerIndexError::InvalidBase(c))
    }).collect()
}

/// Parses the interval field.
///
/// An empty field yields no intervals.
/// Empty intervals are malformed.
pub fn parse_sa_intervals(field: &str) -> Result<Vec<SaInterval>, KmerIndexError> {
    let mut result = Vec::new();
    for interval in utils::split(field, INTERVAL_SEPARATOR) {
        let (start, end) = parse_pair(interval)?;
        if start >= end {
            return Err(KmerIndexError::malformed(format!("empty interval {}", interval)));
        }
        result.push(SaInterval::new(start, end));
    }
    Ok(result)
}

/// Parses a single variant-site path.
///
/// An empty string is an empty path.
/// Each locus must refer to a valid site marker and a 1-based allele.
pub fn parse_variant_site_path(field: &str) -> Result<VariantSitePath, KmerIndexError> {
    let mut result = Vec::new();
    for locus in utils::split(field, LOCUS_SEPARATOR) {
        let (site, allele) = parse_pair(locus)?;
        if !prg::is_site_marker(site as u64) {
            return Err(KmerIndexError::malformed(format!("invalid site {} in {}", site, locus)));
        }
        if allele == 0 {
            return Err(KmerIndexError::malformed(format!("invalid allele {} in {}", allele, locus)));
        }
        result.push(VariantLocus::new(site, allele));
    }
    Ok(result)
}

// Parses the path field for the given number of intervals.
fn parse_variant_site_paths(field: &str, intervals: usize) -> Result<Vec<VariantSitePath>, KmerIndexError> {
    if intervals == 0 {
        if !field.is_empty() {
            return Err(KmerIndexError::malformed("paths without intervals"));
        }
        return Ok(Vec::new());
    }
    let paths: Vec<&str> = field.split(PATH_SEPARATOR).collect();
    if paths.len() != intervals {
        return Err(KmerIndexError::malformed(format!("{} intervals but {} paths", intervals, paths.len())));
    }
    paths.into_iter().map(parse_variant_site_path).collect()
}

/// Parses a cache line without the line terminator.
///
/// Returns the kmer and its search states.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{VariantLocus, encode_pattern};
/// use prg_kmer_index::formats::parse_kmer_index_entry;
///
/// let (kmer, states) = parse_kmer_index_entry("241|(4,5) (7,9)|(5,2);").unwrap();
/// assert_eq!(kmer, encode_pattern("CTA").unwrap());
/// assert_eq!(states.len(), 2);
/// assert_eq!(states[0].variant_site_path, vec![VariantLocus::new(5, 2)]);
/// assert!(states[1].variant_site_path.is_empty());
/// ```
pub fn parse_kmer_index_entry(line: &str) -> Result<(Pattern, SearchStates), KmerIndexError> {
    let line = utils::right_trim(line);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(KmerIndexError::malformed(format!("expected 3 fields, found {}", fields.len())));
    }

    let kmer = parse_encoded_kmer(fields[0])?;
    let intervals = parse_sa_intervals(fields[1])?;
    let paths = parse_variant_site_paths(fields[2], intervals.len())?;
    let search_states = intervals.into_iter().zip(paths).map(|(sa_interval, path)| {
        SearchState::new(sa_interval, path)
    }).collect();

    Ok((kmer, search_states))
}

/// Parses a flag telling whether matches may cross variant-site markers.
///
/// Accepts `0` and `1` with surrounding whitespace.
pub fn parse_crosses_marker_flag(flag: &str) -> Result<bool, KmerIndexError> {
    match utils::trim(flag) {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(KmerIndexError::InvalidParameters(format!("Invalid crosses-marker flag {:?} (expected 0 or 1)", other))),
    }
}

//-----------------------------------------------------------------------------
