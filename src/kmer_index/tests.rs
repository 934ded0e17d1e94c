use super::*;

use crate::{encode_pattern, internal, KmerIter, VariantLocus};

use simple_sds::serialize;

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use rand::Rng;

//-----------------------------------------------------------------------------

fn get_index(filename: &Path, params: &IndexParams, prg_info: &PrgInfo, expected: CacheOutcome) -> KmerIndex {
    let result = get_kmer_index_with_outcome(filename, params, prg_info);
    assert!(result.is_ok(), "Failed to get the kmer index: {}", result.unwrap_err());
    let (index, outcome) = result.unwrap();
    assert_eq!(outcome, expected, "Wrong cache outcome for {}", filename.display());
    index
}

fn load_index(filename: &Path, kmer_size: usize) -> KmerIndex {
    let result = load_kmer_index(filename, kmer_size);
    assert!(result.is_ok(), "Failed to load the kmer index from {}: {}", filename.display(), result.unwrap_err());
    result.unwrap()
}

fn gzip_cache_file() -> PathBuf {
    let mut name: OsString = internal::temp_cache_file().into_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

fn check_matches_search(index: &KmerIndex, prg_info: &PrgInfo, crosses_marker: bool, name: &str) {
    for kmer in KmerIter::new(index.kmer_size()).unwrap() {
        let expected = crate::search_pattern(&kmer, prg_info, crosses_marker);
        assert_eq!(index.get(&kmer), Some(&expected), "Wrong search states for {} in {}", crate::decode_pattern(&kmer), name);
    }
}

//-----------------------------------------------------------------------------

#[test]
fn parameters() {
    assert!(IndexParams::default().validate().is_ok(), "Default parameters are invalid");
    assert!(internal::params(MAX_KMER_SIZE, 8).validate().is_ok(), "Largest kmer size is invalid");
    assert!(internal::params(0, 1).validate().is_err(), "Accepted kmer size 0");
    assert!(internal::params(MAX_KMER_SIZE + 1, 1).validate().is_err(), "Accepted a too large kmer size");
    assert!(internal::params(3, 0).validate().is_err(), "Accepted thread count 0");
}

#[test]
fn all_kmers_present() {
    let prg_info = internal::build_prg("GA5A6C6TT5CAT7A8AC8G7T");
    for kmer_size in 1..=4 {
        let index = internal::build_index(&prg_info, &internal::params(kmer_size, 2));
        assert_eq!(index.len(), 1 << (2 * kmer_size), "Wrong number of kmers for k = {}", kmer_size);
        assert_eq!(index.kmer_size(), kmer_size);
        for kmer in KmerIter::new(kmer_size).unwrap() {
            assert!(index.get(&kmer).is_some(), "Missing kmer {}", crate::decode_pattern(&kmer));
        }
        for (_, search_states) in index.iter() {
            for state in search_states.iter() {
                assert!(!state.sa_interval.is_empty(), "Empty interval for k = {}", kmer_size);
            }
        }
    }
}

#[test]
fn sixteen_kmers() {
    let prg_info = internal::build_prg("ACGTACGT");
    let index = internal::build_index(&prg_info, &internal::params(2, 1));
    assert_eq!(index.len(), 16);
    let found: Vec<String> = index.iter()
        .filter(|(_, states)| !states.is_empty())
        .map(|(kmer, _)| crate::decode_pattern(kmer))
        .collect();
    assert_eq!(found, vec!["TA", "AC", "CG", "GT"], "Wrong kmers with matches");
}

#[test]
fn linear_prg() {
    let prg_info = internal::build_prg("AAAA");
    let index = internal::build_index(&prg_info, &internal::params(2, 1));
    let states = index.get(&encode_pattern("AA").unwrap()).unwrap();
    assert_eq!(states.len(), 1, "Expected a single search state");
    assert_eq!(states[0].sa_interval.len(), 3, "Wrong number of occurrences");
    assert!(states[0].variant_site_path.is_empty(), "Non-empty path in a linear PRG");

    let stats = index.statistics();
    assert_eq!(stats.kmers, 16);
    assert_eq!(stats.kmers_with_matches, 1);
    assert_eq!(stats.occurrences, 3);
    assert_eq!(stats.max_path_length, 0);
}

#[test]
fn same_result_with_threads() {
    for prg in internal::TEST_PRGS {
        let prg_info = internal::build_prg(prg);
        let single = internal::build_index(&prg_info, &internal::params(4, 1));
        let multi = internal::build_index(&prg_info, &internal::params(4, 3));
        assert_eq!(single, multi, "Different index with multiple threads for {}", prg);
    }
}

#[test]
fn index_matches_search() {
    for prg in internal::TEST_PRGS {
        let prg_info = internal::build_prg(prg);
        let index = internal::build_index(&prg_info, &internal::params(3, 2));
        check_matches_search(&index, &prg_info, true, prg);

        let params = IndexParams { crosses_marker: false, ..internal::params(3, 2) };
        let index = internal::build_index(&prg_info, &params);
        check_matches_search(&index, &prg_info, false, prg);
    }
}

#[test]
fn random_long_kmers() {
    let prg_info = internal::load_prg("two_sites.prg");
    let kmer_size = 6;
    let index = internal::build_index(&prg_info, &internal::params(kmer_size, 2));
    let count = kmers::kmer_count(kmer_size).unwrap();
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let kmer = kmers::kmer_at(rng.gen_range(0..count), kmer_size);
        let expected = crate::search_pattern(&kmer, &prg_info, true);
        assert_eq!(index.get(&kmer), Some(&expected), "Wrong search states for {}", crate::decode_pattern(&kmer));
    }

    let states = index.get(&encode_pattern("CATACT").unwrap()).unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].variant_site_path, vec![VariantLocus::new(7, 2)]);

    // Both alleles of site 7 follow `TTCAT` within allele 3 of site 5.
    let states = index.get(&encode_pattern("TTCATA").unwrap()).unwrap();
    let mut paths: Vec<_> = states.iter().map(|state| state.variant_site_path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec![
        vec![VariantLocus::new(5, 3), VariantLocus::new(7, 1)],
        vec![VariantLocus::new(5, 3), VariantLocus::new(7, 2)],
    ]);
}

#[test]
fn mismatched_kmers() {
    let prg_info = internal::build_prg("ACGT");
    let kmers = Kmers::all(3).unwrap();
    let result = index_kmers(&kmers, &prg_info, &internal::params(2, 1));
    assert!(matches!(result, Err(KmerIndexError::InvalidParameters(_))), "Accepted kmers of the wrong length");
}

//-----------------------------------------------------------------------------

#[test]
fn suffix_cache() {
    let prg_info = internal::build_prg("AC5G6T5AA");
    let mut cache = KmerIndexCache::new();
    assert!(cache.is_empty());

    let first = cache.search_kmer(&encode_pattern("TCG").unwrap(), &prg_info, true);
    assert!(first.is_empty(), "Found TCG");
    assert_eq!(cache.len(), 3, "Wrong number of cached suffixes after TCG");
    let second = cache.search_kmer(&encode_pattern("TCG").unwrap(), &prg_info, true);
    assert_eq!(second, first);
    let _ = cache.search_kmer(&encode_pattern("GCG").unwrap(), &prg_info, true);
    assert_eq!(cache.len(), 3, "Shared suffix was not reused");

    let g = cache.child(KmerIndexCache::ROOT, Base::G).unwrap();
    let cg = cache.child(g, Base::C).unwrap();
    assert_eq!(cache.suffix(cg), encode_pattern("CG").unwrap());
    assert_eq!(cache.search_states(cg).map(|states| states.len()), Some(1));
    assert_eq!(cache.child(cg, Base::A), None, "Full kmer stored in the cache");

    let states = cache.search_kmer(&encode_pattern("CTA").unwrap(), &prg_info, true);
    assert_eq!(states, crate::search_pattern(&encode_pattern("CTA").unwrap(), &prg_info, true));
    assert!(cache.search_kmer(&[], &prg_info, true).is_empty(), "Found the empty kmer");

    let dump = cache.to_string();
    assert_eq!(dump.lines().count(), cache.len() - 1, "Wrong number of lines in the cache dump");
    assert!(dump.contains("CG: "), "Missing suffix CG in the cache dump");
}

//-----------------------------------------------------------------------------

#[test]
fn cache_round_trip() {
    let prg_info = internal::build_prg("GA5A6C6TT5CAT7A8AC8G7T");
    let params = internal::params(3, 2);
    let filename = internal::temp_cache_file();

    let generated = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);
    assert!(utils::file_exists(&filename), "Cache file was not written");
    let loaded = get_index(&filename, &params, &prg_info, CacheOutcome::Loaded);
    assert_eq!(loaded, generated, "Loaded index differs from the generated one");
    let again = get_index(&filename, &params, &prg_info, CacheOutcome::Loaded);
    assert_eq!(again, loaded, "Loading is not idempotent");

    let _ = fs::remove_file(&filename);
}

#[test]
fn cache_for_another_prg() {
    let large = internal::build_prg("GA5A6C6TT5CAT7A8AC8G7TACGTACGTACGT");
    let small = internal::build_prg("ACGT");
    let params = internal::params(2, 1);
    let filename = internal::temp_cache_file();

    let large_index = get_index(&filename, &params, &large, CacheOutcome::Generated);
    assert!(large_index.check_prg(&large).is_ok(), "Index does not fit its own PRG");
    let result = large_index.check_prg(&small);
    assert!(matches!(result, Err(KmerIndexError::MalformedCacheLine(_))), "Index fits a smaller PRG");

    let small_index = get_index(&filename, &params, &small, CacheOutcome::Generated);
    assert_eq!(small_index, internal::build_index(&small, &params), "Wrong index after rebuilding");
    let _ = get_index(&filename, &params, &small, CacheOutcome::Loaded);

    let _ = fs::remove_file(&filename);
}

#[test]
fn cache_with_unknown_allele() {
    // Same suffix array size, but site 5 has only two alleles in the second PRG.
    let three_alleles = internal::build_prg("A5C6G6T5");
    let two_alleles = internal::build_prg("A5C6GTT5");
    assert_eq!(three_alleles.sa_size(), two_alleles.sa_size());
    let params = internal::params(2, 1);
    let filename = internal::temp_cache_file();

    let generated = get_index(&filename, &params, &three_alleles, CacheOutcome::Generated);
    let at = generated.get(&encode_pattern("AT").unwrap()).unwrap();
    assert_eq!(at[0].variant_site_path, vec![VariantLocus::new(5, 3)]);
    assert!(generated.check_prg(&two_alleles).is_err(), "Accepted allele 3 of a two-allele site");
    let index = get_index(&filename, &params, &two_alleles, CacheOutcome::Generated);
    assert_eq!(index, internal::build_index(&two_alleles, &params), "Wrong index after rebuilding");

    let _ = fs::remove_file(&filename);
}

#[test]
fn site_path_survives_cache() {
    let prg_info = internal::build_prg("AC5G6T5AA");
    let params = internal::params(3, 1);
    let filename = internal::temp_cache_file();
    let _ = generate_kmer_index(&filename, &params, &prg_info).unwrap();

    let text = fs::read_to_string(&filename).unwrap();
    let line = text.lines().find(|line| line.starts_with("241|")).unwrap();
    assert!(line.ends_with("|(5,2)"), "Wrong cache line for CTA: {}", line);

    let index = load_index(&filename, 3);
    let states = index.get(&encode_pattern("CTA").unwrap()).unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].variant_site_path, vec![VariantLocus::new(5, 2)]);

    let _ = fs::remove_file(&filename);
}

#[test]
fn gzip_cache() {
    let prg_info = internal::build_prg("TT5A6G5C7G8T7AC");
    let params = internal::params(3, 2);
    let filename = gzip_cache_file();

    let generated = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);
    assert!(utils::is_gzipped(&filename), "Cache file {} is not compressed", filename.display());
    let loaded = get_index(&filename, &params, &prg_info, CacheOutcome::Loaded);
    assert_eq!(loaded, generated, "Loaded index differs from the generated one");

    let _ = fs::remove_file(&filename);
}

#[test]
fn corrupted_delimiter() {
    let prg_info = internal::build_prg("CA5AC6 6T5GC");
    let params = internal::params(2, 1);
    let filename = internal::temp_cache_file();
    let generated = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);

    let text = fs::read_to_string(&filename).unwrap();
    let corrupted = text.replacen(formats::FIELD_SEPARATOR, "x", 1);
    fs::write(&filename, corrupted).unwrap();
    assert!(matches!(load_kmer_index(&filename, 2), Err(KmerIndexError::MalformedCacheLine(_))), "Loaded a corrupted cache");

    let rebuilt = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);
    assert_eq!(rebuilt, generated, "Rebuilt index differs from the first build");
    let _ = get_index(&filename, &params, &prg_info, CacheOutcome::Loaded);

    let _ = fs::remove_file(&filename);
}

#[test]
fn truncated_cache() {
    let prg_info = internal::build_prg("CA5AC6 6T5GC");
    let params = internal::params(2, 1);
    let filename = internal::temp_cache_file();
    let generated = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);
    let text = fs::read(&filename).unwrap();

    // Truncation inside a line and at a line boundary.
    let last_line = text[..text.len() - 1].iter().rposition(|&c| c == b'\n').unwrap() + 1;
    for len in [text.len() - 1, last_line, text.len() / 2, 0] {
        fs::write(&filename, &text[..len]).unwrap();
        assert!(load_kmer_index(&filename, 2).is_err(), "Loaded a cache truncated to {} bytes", len);
        let rebuilt = get_index(&filename, &params, &prg_info, CacheOutcome::Generated);
        assert_eq!(rebuilt, generated, "Rebuilt index differs from the first build");
    }

    let _ = fs::remove_file(&filename);
}

#[test]
fn invalid_cache_contents() {
    let filename = internal::temp_cache_file();
    let missing = load_kmer_index(&filename, 1);
    assert!(matches!(missing, Err(KmerIndexError::CacheUnavailable { .. })), "Loaded a missing cache");

    let cases = [
        ("1||\n2||\n3||\n4||\n", true, "complete"),
        ("1||\n2||\n3||\n", false, "missing kmer"),
        ("1||\n2||\n3||\n4||\n4||\n", false, "duplicate kmer"),
        ("1||\n2||\n3||\n44||\n", false, "wrong kmer length"),
        ("1||\n2||\n3||\n4||", false, "missing terminator"),
        ("1|(0,2)|\n2||\n3||\n4||\n", true, "interval"),
        ("1|(0,2)|(5,1)\n2||\n3||\n5||\n", false, "invalid base"),
    ];
    for (contents, valid, name) in cases {
        fs::write(&filename, contents).unwrap();
        let result = load_kmer_index(&filename, 1);
        assert_eq!(result.is_ok(), valid, "Wrong result for a cache with {}: {:?}", name, result);
    }

    // Kmer size does not match the cache.
    fs::write(&filename, "1||\n2||\n3||\n4||\n").unwrap();
    assert!(load_kmer_index(&filename, 2).is_err(), "Loaded a cache with the wrong kmer size");
    assert!(load_kmer_index(&filename, 0).is_err(), "Loaded a cache with kmer size 0");

    let _ = fs::remove_file(&filename);
}

#[test]
fn invalid_parameters_touch_nothing() {
    let prg_info = internal::build_prg("ACGT");
    let filename = internal::temp_cache_file();
    for params in [internal::params(0, 1), internal::params(3, 0), internal::params(MAX_KMER_SIZE + 1, 1)] {
        let result = get_kmer_index(&filename, &params, &prg_info);
        assert!(matches!(result, Err(KmerIndexError::InvalidParameters(_))), "Accepted parameters {:?}", params);
        assert!(!utils::file_exists(&filename), "Cache file created with parameters {:?}", params);
    }
}

#[test]
fn unwritable_cache() {
    let prg_info = internal::build_prg("ACGT");
    let mut filename = PathBuf::from(serialize::temp_file_name("prg-kmer-index-dir"));
    filename.push("cache.txt");
    let result = get_kmer_index(&filename, &internal::params(2, 1), &prg_info);
    assert!(matches!(result, Err(KmerIndexError::CacheWrite { .. })), "Wrote a cache into a missing directory");
}

//-----------------------------------------------------------------------------
