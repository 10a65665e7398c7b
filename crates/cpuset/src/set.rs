//! Ordered CPU set with list and mask renderings

use crate::error::CpuSetError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const BITS_IN_WORD: u32 = 32;

/// Largest CPU id accepted by [`CpuSet::parse`], matching the kernel's
/// `NR_CPUS` ceiling of 8192.
pub const MAX_CPU_ID: u32 = 8191;

/// Inverted masks never cover fewer than this many CPUs.
const MIN_INVERTED_MASK_BITS: u32 = 64;

/// An ordered, de-duplicated set of logical CPU ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CpuSet {
    cpus: BTreeSet<u32>,
}

impl CpuSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a CPU list such as `0-3,8,10-11`.
    ///
    /// Elements may appear in any order and may overlap; the result is the
    /// union. Surrounding whitespace is ignored and an empty (or blank) input
    /// yields the empty set.
    ///
    /// # Errors
    ///
    /// Returns [`CpuSetError::InvalidToken`] for elements that are not a
    /// non-negative integer or `a-b` range, [`CpuSetError::ReversedRange`]
    /// when `a > b`, and [`CpuSetError::CpuOutOfRange`] for ids above
    /// [`MAX_CPU_ID`].
    pub fn parse(input: &str) -> Result<Self, CpuSetError> {
        let mut cpus = BTreeSet::new();
        if input.trim().is_empty() {
            return Ok(Self { cpus });
        }

        for token in input.split(',') {
            let token = token.trim();
            let invalid = || CpuSetError::InvalidToken {
                token: token.to_string(),
                input: input.to_string(),
            };

            match token.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                    let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                    if start > end {
                        return Err(CpuSetError::ReversedRange { start, end });
                    }
                    check_cpu(end)?;
                    cpus.extend(start..=end);
                }
                None => {
                    let cpu: u32 = token.parse().map_err(|_| invalid())?;
                    check_cpu(cpu)?;
                    cpus.insert(cpu);
                }
            }
        }

        Ok(Self { cpus })
    }

    /// Number of CPUs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    /// True when the set holds no CPU.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// True when `cpu` is a member.
    #[must_use]
    pub fn contains(&self, cpu: u32) -> bool {
        self.cpus.contains(&cpu)
    }

    /// Adds a CPU to the set.
    pub fn insert(&mut self, cpu: u32) {
        self.cpus.insert(cpu);
    }

    /// Iterates CPUs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.cpus.iter().copied()
    }

    /// Highest CPU id, if any.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        self.cpus.last().copied()
    }

    /// CPUs present in either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            cpus: self.cpus.union(&other.cpus).copied().collect(),
        }
    }

    /// CPUs present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            cpus: self.cpus.intersection(&other.cpus).copied().collect(),
        }
    }

    /// CPUs of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            cpus: self.cpus.difference(&other.cpus).copied().collect(),
        }
    }

    /// True when the two sets share no CPU.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.cpus.is_disjoint(&other.cpus)
    }

    /// Renders the canonical CPU list: ascending, maximal runs collapsed.
    #[must_use]
    pub fn to_cpu_list(&self) -> String {
        self.to_string()
    }

    /// Bitmask as lowercase hex, one 8-digit group per 32-bit word, most
    /// significant word first and no separators.
    #[must_use]
    pub fn to_hex_mask(&self) -> String {
        self.words(self.word_count())
            .iter()
            .rev()
            .map(|word| format!("{word:08x}"))
            .collect()
    }

    /// Same words as [`Self::to_hex_mask`], comma separated.
    #[must_use]
    pub fn to_mask_list(&self) -> String {
        join_words(self.words(self.word_count()).iter().rev().copied())
    }

    /// Complement of the set over a 32-bit aligned universe of at least
    /// 64 CPUs, rendered as a comma separated word list.
    ///
    /// This is the mask of every CPU *outside* the set, as consumed by
    /// `IRQBALANCE_BANNED_CPUS` and `default_smp_affinity`.
    #[must_use]
    pub fn to_inverted_mask_list(&self) -> String {
        let universe_words = self
            .word_count()
            .max((MIN_INVERTED_MASK_BITS / BITS_IN_WORD) as usize);
        join_words(self.words(universe_words).iter().rev().map(|word| !word))
    }

    fn word_count(&self) -> usize {
        self.max()
            .map_or(1, |max| (max / BITS_IN_WORD) as usize + 1)
    }

    fn words(&self, count: usize) -> Vec<u32> {
        let mut words = vec![0u32; count];
        for cpu in &self.cpus {
            let index = (cpu / BITS_IN_WORD) as usize;
            if let Some(word) = words.get_mut(index) {
                *word |= 1 << (cpu % BITS_IN_WORD);
            }
        }
        words
    }
}

fn check_cpu(cpu: u32) -> Result<(), CpuSetError> {
    if cpu > MAX_CPU_ID {
        return Err(CpuSetError::CpuOutOfRange { cpu, max: MAX_CPU_ID });
    }
    Ok(())
}

fn join_words(words: impl Iterator<Item = u32>) -> String {
    words
        .map(|word| format!("{word:08x}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for cpu in &self.cpus {
            match runs.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(*cpu) => *end = *cpu,
                _ => runs.push((*cpu, *cpu)),
            }
        }

        let rendered: Vec<String> = runs
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{start}-{end}")
                }
            })
            .collect();
        f.write_str(&rendered.join(","))
    }
}

impl FromStr for CpuSet {
    type Err = CpuSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<u32> for CpuSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            cpus: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_singletons_and_ranges() {
        let set = CpuSet::parse("0-2,7,9-10").unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1, 2, 7, 9, 10]);
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_order() {
        let set = CpuSet::parse(" 9 , 1-2 ,0").unwrap();
        assert_eq!(set.to_string(), "0-2,9");
    }

    #[test]
    fn test_parse_empty() {
        assert!(CpuSet::parse("").unwrap().is_empty());
        assert!(CpuSet::parse("   ").unwrap().is_empty());
        assert_eq!(CpuSet::new().to_string(), "");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            CpuSet::parse("1,a"),
            Err(CpuSetError::InvalidToken { .. })
        ));
        assert!(matches!(
            CpuSet::parse("1,,2"),
            Err(CpuSetError::InvalidToken { .. })
        ));
        assert!(matches!(
            CpuSet::parse("-1"),
            Err(CpuSetError::InvalidToken { .. })
        ));
        assert_eq!(
            CpuSet::parse("5-3"),
            Err(CpuSetError::ReversedRange { start: 5, end: 3 })
        );
    }

    #[test]
    fn test_parse_rejects_cpu_ids_past_the_limit() {
        assert_eq!(
            CpuSet::parse("1000000000"),
            Err(CpuSetError::CpuOutOfRange { cpu: 1_000_000_000, max: MAX_CPU_ID })
        );
        assert_eq!(
            CpuSet::parse("0-4294967295"),
            Err(CpuSetError::CpuOutOfRange { cpu: u32::MAX, max: MAX_CPU_ID })
        );
        assert_eq!(CpuSet::parse("8191").unwrap().max(), Some(MAX_CPU_ID));
        assert_eq!(CpuSet::parse("0-8191").unwrap().len(), 8192);
    }

    #[test]
    fn test_unparse_collapses_runs() {
        let set: CpuSet = [5, 1, 2, 3, 7, 8].into_iter().collect();
        assert_eq!(set.to_cpu_list(), "1-3,5,7-8");
    }

    #[test]
    fn test_hex_mask() {
        assert_eq!(CpuSet::parse("0").unwrap().to_hex_mask(), "00000001");
        assert_eq!(CpuSet::parse("2-3").unwrap().to_hex_mask(), "0000000c");
        assert_eq!(
            CpuSet::parse("3,4,53-55,61-63").unwrap().to_hex_mask(),
            "e0e0000000000018"
        );
        assert_eq!(CpuSet::new().to_hex_mask(), "00000000");
    }

    #[test]
    fn test_mask_list() {
        assert_eq!(
            CpuSet::parse("3,4,53-55,61-63").unwrap().to_mask_list(),
            "e0e00000,00000018"
        );
        assert_eq!(
            CpuSet::parse("0-127").unwrap().to_mask_list(),
            "ffffffff,ffffffff,ffffffff,ffffffff"
        );
    }

    #[test]
    fn test_inverted_mask_list() {
        assert_eq!(
            CpuSet::parse("0").unwrap().to_inverted_mask_list(),
            "ffffffff,fffffffe"
        );
        assert_eq!(
            CpuSet::parse("2-3").unwrap().to_inverted_mask_list(),
            "ffffffff,fffffff3"
        );
        assert_eq!(
            CpuSet::parse("3,4,53-55,61-63").unwrap().to_inverted_mask_list(),
            "1f1fffff,ffffffe7"
        );
        assert_eq!(
            CpuSet::parse("0-127").unwrap().to_inverted_mask_list(),
            "00000000,00000000,00000000,00000000"
        );
    }

    #[test]
    fn test_set_operations() {
        let a = CpuSet::parse("0-5").unwrap();
        let b = CpuSet::parse("4-7").unwrap();
        assert_eq!(a.union(&b).to_string(), "0-7");
        assert_eq!(a.intersection(&b).to_string(), "4-5");
        assert_eq!(a.difference(&b).to_string(), "0-3");
        assert!(!a.is_disjoint(&b));
        assert!(a.is_disjoint(&CpuSet::parse("6-7").unwrap()));
    }
}
