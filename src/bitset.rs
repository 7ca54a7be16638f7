//! Growable bit set over location indices.
//!
//! Used for points-to sets, the copy-edge graph, and the solver worklist.
//! Iteration is in ascending index order, which keeps solver output and
//! encodings deterministic.

/// A bit set backed by a vector of u64 words.
///
/// The set grows on demand when inserting beyond the current capacity.
#[derive(Debug, Clone)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of set bits.
    count: usize,
    /// Every word below this one is zero.
    min_word: usize,
}

impl Default for BitSet {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            count: 0,
            min_word: usize::MAX,
        }
    }
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty bit set able to hold `capacity` bits without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
            count: 0,
            min_word: usize::MAX,
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (w, b) = Self::word_and_bit(index);
        w < self.words.len() && (self.words[w] >> b) & 1 == 1
    }

    /// Sets the bit. Returns true if it was not previously set.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let (w, b) = Self::word_and_bit(index);
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        let mask = 1u64 << b;
        let was_clear = self.words[w] & mask == 0;
        if was_clear {
            self.words[w] |= mask;
            self.count += 1;
            self.min_word = self.min_word.min(w);
        }
        was_clear
    }

    /// Removes and returns the smallest element.
    ///
    /// The scan starts at the `min_word` hint, so draining a set as a
    /// worklist does not rescan the cleared prefix.
    pub fn pop_first(&mut self) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        for w in self.min_word..self.words.len() {
            let word = self.words[w];
            if word != 0 {
                let b = word.trailing_zeros() as usize;
                self.words[w] &= !(1u64 << b);
                self.count -= 1;
                self.min_word = w;
                return Some(w * Self::BITS_PER_WORD + b);
            }
        }
        unreachable!("count is {} but no bit is set from word {}", self.count, self.min_word)
    }

    /// `self |= other`. Returns true if any bit was added.
    pub fn union_with(&mut self, other: &BitSet) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (i, (dst, &src)) in self.words.iter_mut().zip(&other.words).enumerate() {
            let added = src & !*dst;
            if added != 0 {
                *dst |= added;
                self.count += added.count_ones() as usize;
                if !changed {
                    self.min_word = self.min_word.min(i);
                }
                changed = true;
            }
        }
        changed
    }

    /// True if the two sets share an element.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// True if every element of `self` is in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.words.iter().enumerate().all(|(i, &w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & !o == 0
        })
    }

    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl Extend<usize> for BitSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.insert(index);
        }
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        set.extend(iter);
        set
    }
}

/// Ascending iterator over set bits.
pub struct BitSetIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let b = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + b);
            }
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
