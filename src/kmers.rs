//! Enumeration and compact storage of kmers.
//!
//! All kmers of a given length are enumerated in a fixed order where the first base varies fastest.
//! Kmer number `i` has base `(i / 4^j) % 4` at position `j`.
//! Consecutive kmers therefore share long suffixes, which is what backward search extends first.
//!
//! Kmer lists can be stored in a [`Kmers`] structure using 3 bits per base.

use crate::{Base, KmerIndexError, Pattern};

use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, Push, Vector};

use std::iter::FusedIterator;
use std::ops::Range;

//-----------------------------------------------------------------------------

/// Largest supported kmer length.
pub const MAX_KMER_SIZE: usize = 16;

/// Returns the number of kmers of the given length, or [`None`] on overflow.
pub fn kmer_count(kmer_size: usize) -> Option<usize> {
    Base::SIGMA.checked_pow(u32::try_from(kmer_size).ok()?)
}

fn too_many_kmers(kmer_size: usize) -> KmerIndexError {
    KmerIndexError::InvalidParameters(format!("Too many kmers of length {}", kmer_size))
}

/// Returns kmer number `index` of length `kmer_size` in enumeration order.
pub fn kmer_at(index: usize, kmer_size: usize) -> Pattern {
    let mut result = Vec::with_capacity(kmer_size);
    let mut value = index;
    for _ in 0..kmer_size {
        // Rank is always in 0..4.
        result.push(Base::ALL[value % Base::SIGMA]);
        value /= Base::SIGMA;
    }
    result
}

/// Returns the position of the kmer in enumeration order.
///
/// This is the inverse of [`kmer_at`] for kmers of at most [`MAX_KMER_SIZE`] bases.
pub fn kmer_number(kmer: &[Base]) -> usize {
    kmer.iter().rev().fold(0, |acc, base| acc * Base::SIGMA + base.rank())
}

/// A lazy iterator over all kmers of a given length.
///
/// The iterator can be restarted by cloning it before use.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{Base, KmerIter};
///
/// let kmers: Vec<_> = KmerIter::new(2).unwrap().collect();
/// assert_eq!(kmers.len(), 16);
/// assert_eq!(kmers[0], vec![Base::A, Base::A]);
/// assert_eq!(kmers[1], vec![Base::C, Base::A]);
/// assert_eq!(kmers[15], vec![Base::T, Base::T]);
/// ```
#[derive(Clone, Debug)]
pub struct KmerIter {
    kmer_size: usize,
    range: Range<usize>,
}

impl KmerIter {
    /// Creates an iterator over all kmers of length `kmer_size`.
    ///
    /// Returns an error if the number of kmers does not fit in `usize`.
    pub fn new(kmer_size: usize) -> Result<Self, KmerIndexError> {
        let count = kmer_count(kmer_size).ok_or_else(|| too_many_kmers(kmer_size))?;
        Ok(KmerIter { kmer_size, range: 0..count })
    }

    /// Returns the kmer length.
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }
}

impl Iterator for KmerIter {
    type Item = Pattern;

    fn next(&mut self) -> Option<Self::Item> {
        self.range.next().map(|index| kmer_at(index, self.kmer_size))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.range.nth(n).map(|index| kmer_at(index, self.kmer_size))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl ExactSizeIterator for KmerIter {}

impl FusedIterator for KmerIter {}

//-----------------------------------------------------------------------------

/// A list of kmers of equal length, stored using 3 bits per base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kmers {
    kmer_size: usize,
    data: IntVector,
}

impl Kmers {
    /// Width of a packed base in bits.
    pub const WIDTH: usize = 3;

    /// Packs all kmers of length `kmer_size` in enumeration order.
    pub fn all(kmer_size: usize) -> Result<Self, KmerIndexError> {
        let iter = KmerIter::new(kmer_size)?;
        let capacity = iter.len().checked_mul(kmer_size).ok_or_else(|| too_many_kmers(kmer_size))?;
        let mut data = IntVector::with_capacity(capacity, Self::WIDTH).map_err(KmerIndexError::InvalidParameters)?;
        for kmer in iter {
            for base in kmer {
                data.push(base.encoded() as u64);
            }
        }
        Ok(Kmers { kmer_size, data })
    }

    /// Packs the given kmers, which must all have length `kmer_size`.
    pub fn from_patterns<'a, I>(kmer_size: usize, patterns: I) -> Result<Self, KmerIndexError>
        where I: IntoIterator<Item = &'a Pattern>
    {
        let mut data = IntVector::new(Self::WIDTH).map_err(KmerIndexError::InvalidParameters)?;
        for pattern in patterns {
            if pattern.len() != kmer_size {
                return Err(KmerIndexError::InvalidParameters(
                    format!("Kmer of length {} in a list of {}-mers", pattern.len(), kmer_size)
                ));
            }
            for base in pattern {
                data.push(base.encoded() as u64);
            }
        }
        Ok(Kmers { kmer_size, data })
    }

    /// Returns the kmer length.
    #[inline]
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Returns the number of kmers.
    #[inline]
    pub fn len(&self) -> usize {
        if self.kmer_size == 0 { 0 } else { self.data.len() / self.kmer_size }
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns kmer number `index`.
    pub fn get(&self, index: usize) -> Result<Pattern, KmerIndexError> {
        deserialize_next_kmer(index * self.kmer_size, &self.data, self.kmer_size)
    }

    /// Returns an iterator over the kmers in the list.
    pub fn iter(&self) -> impl Iterator<Item = Result<Pattern, KmerIndexError>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }
}

/// Decodes the kmer of length `kmer_size` starting at offset `kmer_start_index` of a packed vector.
///
/// Returns an error if the kmer extends past the end or contains a value outside 1 to 4.
pub fn deserialize_next_kmer(kmer_start_index: usize, all_kmers: &IntVector, kmer_size: usize) -> Result<Pattern, KmerIndexError> {
    if kmer_start_index + kmer_size > all_kmers.len() {
        return Err(KmerIndexError::InvalidParameters(format!(
            "Kmer at offset {} extends past the end of the kmer list ({})", kmer_start_index, all_kmers.len()
        )));
    }
    let mut result = Vec::with_capacity(kmer_size);
    for offset in kmer_start_index..kmer_start_index + kmer_size {
        let value = all_kmers.get(offset);
        let base = Base::from_encoded(value).ok_or_else(|| {
            KmerIndexError::InvalidBase(char::from_digit(value as u32, 10).unwrap_or('?'))
        })?;
        result.push(base);
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_pattern;

    use std::collections::HashSet;

    #[test]
    fn enumeration_is_complete() {
        for kmer_size in 1..=5 {
            let iter = KmerIter::new(kmer_size).unwrap();
            let expected = kmer_count(kmer_size).unwrap();
            assert_eq!(iter.len(), expected, "Wrong iterator length for k = {}", kmer_size);
            let kmers: HashSet<Pattern> = iter.clone().collect();
            assert_eq!(kmers.len(), expected, "Duplicate or missing kmers for k = {}", kmer_size);
            assert!(kmers.iter().all(|kmer| kmer.len() == kmer_size), "Wrong kmer length for k = {}", kmer_size);
        }
    }

    #[test]
    fn enumeration_order() {
        let kmers: Vec<Pattern> = KmerIter::new(3).unwrap().collect();
        assert_eq!(kmers[0], encode_pattern("AAA").unwrap());
        assert_eq!(kmers[1], encode_pattern("CAA").unwrap());
        assert_eq!(kmers[4], encode_pattern("ACA").unwrap());
        assert_eq!(kmers[16], encode_pattern("AAC").unwrap());
        assert_eq!(kmers[63], encode_pattern("TTT").unwrap());

        // Restarting yields the same sequence.
        let iter = KmerIter::new(3).unwrap();
        let again: Vec<Pattern> = iter.clone().collect();
        assert_eq!(again, kmers);
        let mut iter = iter;
        assert_eq!(iter.nth(16), Some(kmers[16].clone()));
        assert_eq!(iter.len(), 64 - 17);

        for (index, kmer) in kmers.iter().enumerate() {
            assert_eq!(kmer_number(kmer), index, "Wrong number for kmer {}", index);
            assert_eq!(&kmer_at(index, 3), kmer, "Wrong kmer at {}", index);
        }
    }

    #[test]
    fn overflowing_counts() {
        assert_eq!(kmer_count(0), Some(1));
        assert_eq!(kmer_count(MAX_KMER_SIZE), Some(1 << (2 * MAX_KMER_SIZE)));
        assert_eq!(kmer_count(64), None);
        assert!(KmerIter::new(64).is_err(), "Created an iterator over 4^64 kmers");
    }

    #[test]
    fn packed_kmers() {
        let kmers = Kmers::all(3);
        assert!(kmers.is_ok(), "Failed to pack kmers: {}", kmers.unwrap_err());
        let kmers = kmers.unwrap();
        assert_eq!(kmers.len(), 64);
        assert_eq!(kmers.kmer_size(), 3);
        for (index, expected) in KmerIter::new(3).unwrap().enumerate() {
            assert_eq!(kmers.get(index), Ok(expected), "Wrong packed kmer {}", index);
        }

        let patterns = vec![encode_pattern("GATT").unwrap(), encode_pattern("ACAT").unwrap()];
        let packed = Kmers::from_patterns(4, &patterns).unwrap();
        let unpacked: Result<Vec<Pattern>, KmerIndexError> = packed.iter().collect();
        assert_eq!(unpacked, Ok(patterns.clone()));

        let mixed = vec![encode_pattern("GAT").unwrap(), encode_pattern("ACAT").unwrap()];
        assert!(Kmers::from_patterns(3, &mixed).is_err(), "Accepted kmers of mixed lengths");
    }

    #[test]
    fn deserialize_invalid_kmers() {
        let mut data = IntVector::new(Kmers::WIDTH).unwrap();
        for value in [1, 2, 3, 4, 0, 7] {
            data.push(value);
        }
        assert_eq!(deserialize_next_kmer(0, &data, 4), Ok(encode_pattern("ACGT").unwrap()));
        assert_eq!(deserialize_next_kmer(2, &data, 3), Err(KmerIndexError::InvalidBase('0')));
        assert!(deserialize_next_kmer(4, &data, 4).is_err(), "Read past the end of the vector");
    }
}

//-----------------------------------------------------------------------------
