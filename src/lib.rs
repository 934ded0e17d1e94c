//! # PRG kmer index: precomputed variant-aware search results for all kmers.
//!
//! A population reference graph (PRG) is a linear sequence interleaved with variant sites.
//! Each site offers several alternative allele sequences.
//! The PRG is indexed with a suffix array and the Burrows-Wheeler transform (see [`PrgInfo`]).
//! Backward search over the index reports each match as a suffix-array interval together with the variant-site path it took (see [`search_pattern`]).
//!
//! Reads are typically matched starting from a short kmer at one end.
//! This crate precomputes the search results for every kmer of a fixed length and stores them in a [`KmerIndex`].
//! Search states for shared kmer suffixes are computed only once, and the work is split between multiple threads.
//!
//! ### Cache file
//!
//! Building the index for longer kmers takes time, so the index is stored in a line-oriented text file.
//! See [`formats`] for the file format.
//! [`get_kmer_index`] loads the index from the file if it is valid and rebuilds it otherwise.
//! The file may be gzip-compressed.
//!
//! ### Example
//!
//! ```
//! use prg_kmer_index::{IndexParams, PrgInfo, VariantLocus, encode_pattern, get_kmer_index};
//! use simple_sds::serialize;
//! use std::fs;
//!
//! let prg = PrgInfo::from_prg("AC5G6T5AA").unwrap();
//! let params = IndexParams { kmer_size: 3, ..IndexParams::default() };
//! let cache = serialize::temp_file_name("lib-example");
//!
//! // The first call builds the index and writes the cache; later calls load it.
//! let index = get_kmer_index(&cache, &params, &prg).unwrap();
//! assert_eq!(index.len(), 64);
//! let states = index.get(&encode_pattern("CTA").unwrap()).unwrap();
//! assert_eq!(states[0].variant_site_path, vec![VariantLocus::new(5, 2)]);
//! assert_eq!(get_kmer_index(&cache, &params, &prg).unwrap(), index);
//!
//! fs::remove_file(&cache).unwrap();
//! ```

pub mod base;
pub mod error;
pub mod formats;
pub mod kmer_index;
pub mod kmers;
pub mod prg;
pub mod search;
pub mod utils;

#[cfg(test)]
mod internal;

pub use base::{Base, Pattern, Patterns, encode_dna_base, encode_pattern, decode_pattern};
pub use error::KmerIndexError;
pub use kmer_index::{IndexParams, KmerIndex, KmerIndexCache, KmerIndexStats, CacheOutcome};
pub use kmer_index::{index_kmers, get_kmer_index, get_kmer_index_with_outcome, generate_kmer_index, load_kmer_index};
pub use kmers::{KmerIter, Kmers, MAX_KMER_SIZE, deserialize_next_kmer};
pub use prg::{PrgInfo, VariantSite, MarkerBoundary};
pub use search::{SaInterval, SearchState, SearchStates, VariantLocus, VariantSitePath, search_pattern};
