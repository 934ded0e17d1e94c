use crate::{Base, PrgInfo, SearchStates, VariantLocus, VariantSitePath};
use crate::{IndexParams, KmerIndex};
use crate::prg::{self, ENDMARKER};
use crate::utils;

use simple_sds::serialize;

use std::collections::BTreeSet;
use std::path::PathBuf;

//-----------------------------------------------------------------------------

// PRG utilities.

pub(crate) fn build_prg(prg: &str) -> PrgInfo {
    let result = PrgInfo::from_prg(prg);
    assert!(result.is_ok(), "Failed to build PRG {}: {}", prg, result.unwrap_err());
    result.unwrap()
}

pub(crate) fn load_prg(filename: &'static str) -> PrgInfo {
    let prg_file = utils::get_test_data(filename);
    let result = PrgInfo::load_from(&prg_file);
    if let Err(err) = result {
        panic!("Failed to load PRG from {}: {}", prg_file.display(), err);
    }
    result.unwrap()
}

// PRGs used in search and index tests.
pub(crate) const TEST_PRGS: [&str; 8] = [
    "ACGTACGT",
    "AC5G6T5AA",
    "GA5A6C6TT5CAT7A8AC8G7T",
    "TT5A6G5C7G8T7AC",
    "CA5AC6 6T5GC",
    "5AA6C5G",
    "AC9CAT10GC10G9T11A12C11GCA",
    "A5A6C5 7G8T7C",
];

//-----------------------------------------------------------------------------

// Brute-force matching.

/// A match as a starting text position and the variant sites traversed.
pub(crate) type Match = (usize, VariantSitePath);

// Positions of the bases that may follow `pos` in some path through the PRG,
// with the loci entered on the way.
fn successors(prg_info: &PrgInfo, pos: usize, crosses_marker: bool) -> Vec<(usize, Vec<VariantLocus>)> {
    let mut result = Vec::new();
    continue_from(prg_info, pos + 1, Vec::new(), crosses_marker, &mut result);
    result
}

fn continue_from(prg_info: &PrgInfo, pos: usize, loci: Vec<VariantLocus>, crosses_marker: bool, result: &mut Vec<(usize, Vec<VariantLocus>)>) {
    let symbol = prg_info.symbol(pos);
    if symbol == ENDMARKER {
        return;
    }
    if Base::from_encoded(symbol).is_some() {
        result.push((pos, loci));
        return;
    }
    if !crosses_marker {
        return;
    }
    if prg::is_site_marker(symbol) {
        let site = prg_info.site(symbol as usize).unwrap();
        if pos == site.opening {
            for allele in 1..=site.alleles() {
                let start = site.allele_range(allele).unwrap().start;
                let mut extended = loci.clone();
                extended.push(VariantLocus::new(site.id, allele));
                continue_from(prg_info, start, extended, crosses_marker, result);
            }
        } else {
            continue_from(prg_info, pos + 1, loci, crosses_marker, result);
        }
    } else {
        let site = prg_info.site(symbol as usize - 1).unwrap();
        continue_from(prg_info, site.closing + 1, loci, crosses_marker, result);
    }
}

fn walk(prg_info: &PrgInfo, pattern: &[Base], start: usize, pos: usize, matched: usize, path: VariantSitePath, crosses_marker: bool, result: &mut BTreeSet<Match>) {
    if matched == pattern.len() {
        result.insert((start, path));
        return;
    }
    for (next, loci) in successors(prg_info, pos, crosses_marker) {
        if prg_info.symbol(next) == pattern[matched].encoded() as u64 {
            let mut extended = path.clone();
            extended.extend(loci);
            walk(prg_info, pattern, start, next, matched + 1, extended, crosses_marker, result);
        }
    }
}

/// Finds all matches of the pattern by walking the PRG from every position.
pub(crate) fn naive_matches(prg_info: &PrgInfo, pattern: &[Base], crosses_marker: bool) -> BTreeSet<Match> {
    let mut result = BTreeSet::new();
    if pattern.is_empty() {
        return result;
    }
    for start in 0..prg_info.len() {
        if prg_info.symbol(start) != pattern[0].encoded() as u64 {
            continue;
        }
        let path: VariantSitePath = prg_info.locus_at(start).into_iter().collect();
        walk(prg_info, pattern, start, start, 1, path, crosses_marker, &mut result);
    }
    result
}

/// Expands search states into matches.
///
/// Also returns the total number of rows, which is larger than the number of distinct matches if a match was reported twice.
pub(crate) fn reported_matches(prg_info: &PrgInfo, search_states: &SearchStates) -> (BTreeSet<Match>, usize) {
    let mut result = BTreeSet::new();
    let mut rows = 0;
    for state in search_states.iter() {
        for row in state.sa_interval.rows() {
            result.insert((prg_info.text_position(row), state.variant_site_path.clone()));
            rows += 1;
        }
    }
    (result, rows)
}

//-----------------------------------------------------------------------------

// Kmer index utilities.

pub(crate) fn temp_cache_file() -> PathBuf {
    let filename = serialize::temp_file_name("prg-kmer-index");
    assert!(!utils::file_exists(&filename), "Cache file {} already exists", filename.display());
    filename
}

pub(crate) fn params(kmer_size: usize, threads: usize) -> IndexParams {
    IndexParams { kmer_size, threads, ..IndexParams::default() }
}

pub(crate) fn build_index(prg_info: &PrgInfo, params: &IndexParams) -> KmerIndex {
    let kmers = crate::Kmers::all(params.kmer_size);
    assert!(kmers.is_ok(), "Failed to enumerate kmers: {}", kmers.unwrap_err());
    let index = crate::index_kmers(&kmers.unwrap(), prg_info, params);
    assert!(index.is_ok(), "Failed to build the kmer index: {}", index.unwrap_err());
    index.unwrap()
}

//-----------------------------------------------------------------------------
