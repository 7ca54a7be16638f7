//! Hash-consing table with chained buckets.
//!
//! Values live in a plain `Vec`, indexed by handle. Interned values are also
//! linked into bucket chains through a per-entry `next` index; index 0 ends a
//! chain (entry 0 is never interned, it is the reserved "no value" slot).
//!
//! [`Table::put`] appends the candidate first and then searches its bucket.
//! On a hit the candidate is popped again, so a table never holds two equal
//! interned values. The bucket array doubles when the entry count reaches
//! the bucket count.

use std::ops::Index;

use crate::utils::MyHash;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    next: u32,
    interned: bool,
}

#[derive(Debug, Clone)]
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<u32>,
    bitmask: u64,
}

impl<T> Table<T> {
    pub const MAX_BITS: usize = 31;

    /// Create an empty table with `2^bits` buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= Self::MAX_BITS, "Table bits should be in the range 0..=31");
        let size = 1usize << bits;
        Self {
            data: Vec::with_capacity(size),
            buckets: vec![0; size],
            bitmask: (size - 1) as u64,
        }
    }

    /// Create a table with exactly `buckets` buckets.
    ///
    /// Returns `None` unless `buckets` is a power of two of at most `2^MAX_BITS`.
    pub fn with_buckets(buckets: usize) -> Option<Self> {
        if !buckets.is_power_of_two() || buckets.trailing_zeros() as usize > Self::MAX_BITS {
            return None;
        }
        Some(Self::new(buckets.trailing_zeros() as usize))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn value(&self, index: usize) -> &T {
        &self.data[index].value
    }

    /// Append a value without interning it.
    pub fn push(&mut self, value: T) -> usize {
        let index = self.data.len();
        assert!(index < u32::MAX as usize, "Table is full");
        self.data.push(Entry {
            value,
            next: 0,
            interned: false,
        });
        index
    }

    /// Iterate over `(index, value)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.data.iter().enumerate().map(|(i, e)| (i, &e.value))
    }
}

impl<T: MyHash> Table<T> {
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    fn link(&mut self, index: usize) {
        let b = self.bucket_index(&self.data[index].value);
        self.data[index].next = self.buckets[b];
        self.data[index].interned = true;
        self.buckets[b] = index as u32;
    }

    fn grow(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![0; size];
        self.bitmask = (size - 1) as u64;
        for i in 0..self.data.len() {
            if self.data[i].interned {
                self.link(i);
            }
        }
    }

    /// Intern a value and return its handle. Equal values share one handle.
    pub fn put(&mut self, value: T) -> usize
    where
        T: Eq,
    {
        let fresh = self.push(value);
        assert_ne!(fresh, 0, "Entry 0 is reserved");
        let b = self.bucket_index(&self.data[fresh].value);

        let mut cur = self.buckets[b];
        while cur != 0 {
            let i = cur as usize;
            if self.data[i].value == self.data[fresh].value {
                // Already present: drop the candidate.
                self.data.pop();
                return i;
            }
            cur = self.data[i].next;
        }

        self.link(fresh);
        if self.data.len() >= self.buckets.len() {
            self.grow();
        }
        fresh
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
