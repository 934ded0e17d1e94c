//! Nucleotide bases and patterns.
//!
//! A [`Base`] has two forms: the character form (`A`, `C`, `G`, `T`) and the numeric encoding (1 to 4) used in the PRG text and in the kmer index cache.
//! Value 0 is reserved for the text terminator and values from 5 up are variant-site markers.

use crate::KmerIndexError;

use std::fmt::Display;

//-----------------------------------------------------------------------------

/// A nucleotide base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Base {
    A = 1,
    C = 2,
    G = 3,
    T = 4,
}

/// An ordered sequence of bases: a kmer or a read fragment.
pub type Pattern = Vec<Base>;

/// A list of patterns.
pub type Patterns = Vec<Pattern>;

const INVALID: u8 = 0;

const fn generate_encoding() -> [u8; 256] {
    let mut result = [INVALID; 256];
    result[b'a' as usize] = 1; result[b'A' as usize] = 1;
    result[b'c' as usize] = 2; result[b'C' as usize] = 2;
    result[b'g' as usize] = 3; result[b'G' as usize] = 3;
    result[b't' as usize] = 4; result[b'T' as usize] = 4;
    result
}

const ENCODE: [u8; 256] = generate_encoding();

impl Base {
    /// All bases in encoding order.
    pub const ALL: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    /// Size of the alphabet.
    pub const SIGMA: usize = 4;

    /// Returns the numeric encoding (1 to 4).
    #[inline]
    pub fn encoded(self) -> u8 {
        self as u8
    }

    /// Returns a dense rank (0 to 3) for table lookups.
    #[inline]
    pub fn rank(self) -> usize {
        self as usize - 1
    }

    /// Returns the base with the given dense rank (0 to 3).
    #[inline]
    pub fn from_rank(rank: usize) -> Option<Base> {
        Base::ALL.get(rank).copied()
    }

    /// Returns the base with the given numeric encoding.
    ///
    /// Returns [`None`] for values outside 1 to 4.
    #[inline]
    pub fn from_encoded(value: u64) -> Option<Base> {
        match value {
            1 => Some(Base::A),
            2 => Some(Base::C),
            3 => Some(Base::G),
            4 => Some(Base::T),
            _ => None,
        }
    }

    /// Returns the upper-case character form.
    #[inline]
    pub fn to_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
        }
    }
}

impl Display for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

//-----------------------------------------------------------------------------

/// Encodes a DNA base given as a character.
///
/// Both upper and lower case are accepted.
/// Any other character is an [`KmerIndexError::InvalidBase`] error.
///
/// # Examples
///
/// ```
/// use prg_kmer_index::{Base, encode_dna_base};
///
/// assert_eq!(encode_dna_base('G'), Ok(Base::G));
/// assert_eq!(encode_dna_base('g').map(Base::encoded), Ok(3));
/// assert!(encode_dna_base('N').is_err());
/// ```
pub fn encode_dna_base(base: char) -> Result<Base, KmerIndexError> {
    if !base.is_ascii() {
        return Err(KmerIndexError::InvalidBase(base));
    }
    Base::from_encoded(ENCODE[base as usize] as u64).ok_or(KmerIndexError::InvalidBase(base))
}

/// Encodes a DNA sequence as a [`Pattern`].
pub fn encode_pattern(sequence: &str) -> Result<Pattern, KmerIndexError> {
    sequence.chars().map(encode_dna_base).collect()
}

/// Decodes a [`Pattern`] into upper-case characters.
pub fn decode_pattern(pattern: &[Base]) -> String {
    pattern.iter().map(|base| base.to_char()).collect()
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
