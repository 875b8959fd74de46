//! A fixed-capacity ring of the most recent items.
//!
//! `CircularBuffer` is what a sampled statistic keeps its history in. Storage
//! is allocated lazily up to `capacity` and never shrinks. Once full, every
//! insertion overwrites the oldest item and hands it back to the caller.
//!
//! There is no internal locking. Owners that share a buffer across threads
//! must serialize access themselves.

use std::iter::Chain;
use std::slice;

#[cfg(feature = "serde_support")]
use crate::error::Error;

/// A ring buffer retaining the last `capacity` inserted items.
///
/// # Examples
/// ```
/// use statkeeper::circular_buffer::CircularBuffer;
///
/// let mut buffer = CircularBuffer::new(3);
/// for i in 0..5 {
///     buffer.insert(i);
/// }
/// assert_eq!(buffer.to_vec(), vec![2, 3, 4]);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde_support",
    serde(try_from = "RawBuffer<T>", bound(deserialize = "T: serde::Deserialize<'de>"))
)]
pub struct CircularBuffer<T> {
    capacity: usize,
    // Slots in physical order. Grows by push until it holds `capacity` items,
    // after which slots are only ever replaced.
    slots: Vec<T>,
    // Physical index of the next write. Once the buffer has wrapped this is
    // also the index of the oldest item.
    cursor: usize,
}

// Unchecked wire form. Every deserialized buffer passes through `TryFrom`.
#[cfg(feature = "serde_support")]
#[derive(serde::Deserialize)]
struct RawBuffer<T> {
    capacity: usize,
    slots: Vec<T>,
    cursor: usize,
}

#[cfg(feature = "serde_support")]
impl<T> std::convert::TryFrom<RawBuffer<T>> for CircularBuffer<T> {
    type Error = Error;

    fn try_from(raw: RawBuffer<T>) -> Result<CircularBuffer<T>, Error> {
        let len = raw.slots.len();
        let consistent = if raw.capacity == 0 {
            len == 0 && raw.cursor == 0
        } else if len < raw.capacity {
            raw.cursor == len
        } else {
            len == raw.capacity && raw.cursor < raw.capacity
        };
        if !consistent {
            return Err(Error::CorruptBuffer {
                capacity: raw.capacity,
                len,
                cursor: raw.cursor,
            });
        }
        Ok(CircularBuffer {
            capacity: raw.capacity,
            slots: raw.slots,
            cursor: raw.cursor,
        })
    }
}

impl<T> CircularBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// A capacity of zero is legal; such a buffer drops everything it is
    /// given.
    pub fn new(capacity: usize) -> CircularBuffer<T> {
        CircularBuffer {
            capacity,
            slots: Vec::new(),
            cursor: 0,
        }
    }

    /// Store `item`, returning the item it displaced.
    ///
    /// `None` means the slot had never been written, that is the buffer was
    /// not yet full. A zero-capacity buffer always returns `None`.
    ///
    /// # Examples
    /// ```
    /// use statkeeper::circular_buffer::CircularBuffer;
    ///
    /// let mut buffer = CircularBuffer::new(2);
    /// assert_eq!(buffer.insert('a'), None);
    /// assert_eq!(buffer.insert('b'), None);
    /// assert_eq!(buffer.insert('c'), Some('a'));
    /// ```
    pub fn insert(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return None;
        }

        let evicted = if self.slots.len() < self.capacity {
            self.slots.push(item);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[self.cursor], item))
        };
        self.cursor = (self.cursor + 1) % self.capacity;
        evicted
    }

    /// Iterate the retained items from oldest to newest.
    pub fn iter(&self) -> Iter<T> {
        // Until the buffer fills the cursor always equals slots.len(), so the
        // split is (everything, nothing) and index 0 is the oldest item.
        let split = if self.slots.len() < self.capacity {
            self.slots.len()
        } else {
            self.cursor
        };
        let (newest, oldest) = self.slots.split_at(split);
        Iter {
            rx: oldest.iter().chain(newest.iter()),
        }
    }

    /// The retained items, oldest first.
    ///
    /// The result holds exactly `min(inserted, capacity)` items.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Number of items currently retained.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True until the first insertion into a non-zero capacity buffer.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The fixed capacity given at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Iterator over a `CircularBuffer` in insertion order.
#[derive(Debug)]
pub struct Iter<'a, T>
where
    T: 'a,
{
    rx: Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rx.size_hint()
    }
}

impl<'a, T> IntoIterator for &'a CircularBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    #[test]
    fn empty_buffer() {
        let buffer = CircularBuffer::<u32>::new(2);
        assert!(buffer.is_empty());
        assert!(buffer.to_vec().is_empty());
    }

    #[test]
    fn single_element() {
        let mut buffer = CircularBuffer::new(2);
        assert_eq!(buffer.insert("foo"), None);
        assert_eq!(buffer.to_vec(), vec!["foo"]);
    }

    #[test]
    fn full_buffer() {
        let mut buffer = CircularBuffer::new(2);
        assert_eq!(buffer.insert("foo"), None);
        assert_eq!(buffer.insert("bar"), None);
        assert_eq!(buffer.to_vec(), vec!["foo", "bar"]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn overspill() {
        let mut buffer = CircularBuffer::new(2);
        assert_eq!(buffer.insert("foo".to_string()), None);
        assert_eq!(buffer.insert("bar".to_string()), None);
        assert_eq!(buffer.insert("baz".to_string()), Some("foo".to_string()));
        assert_eq!(buffer.to_vec(), vec!["bar".to_string(), "baz".to_string()]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn zero_capacity() {
        let mut buffer = CircularBuffer::new(0);
        for i in 0..10 {
            assert_eq!(buffer.insert(i), None);
        }
        assert!(buffer.is_empty());
        assert!(buffer.to_vec().is_empty());
    }

    #[test]
    fn iter_matches_to_vec_after_wrap() {
        let mut buffer = CircularBuffer::new(4);
        for i in 0..10 {
            buffer.insert(i);
        }
        let borrowed: Vec<i32> = buffer.iter().cloned().collect();
        assert_eq!(borrowed, vec![6, 7, 8, 9]);
        assert_eq!(buffer.iter().size_hint(), (4, Some(4)));
    }

    // prop: to_vec is the last min(n, k) inserted items, oldest first
    #[test]
    fn retains_tail() {
        fn inner(capacity: u8, items: Vec<u16>) -> TestResult {
            let capacity = (capacity % 32) as usize;
            let mut buffer = CircularBuffer::new(capacity);
            for item in &items {
                buffer.insert(*item);
            }

            let kept = items.len().min(capacity);
            let expected = items[items.len() - kept..].to_vec();
            TestResult::from_bool(buffer.len() == kept && buffer.to_vec() == expected)
        }
        QuickCheck::new().quickcheck(inner as fn(u8, Vec<u16>) -> TestResult);
    }

    // prop: eviction is strict FIFO, the (i + k)th insert returns the ith item
    #[test]
    fn evicts_in_fifo_order() {
        fn inner(capacity: u8, items: Vec<u16>) -> TestResult {
            let capacity = (capacity % 32) as usize;
            if capacity == 0 {
                return TestResult::discard();
            }
            let mut buffer = CircularBuffer::new(capacity);
            for (i, item) in items.iter().enumerate() {
                let evicted = buffer.insert(*item);
                let expected = if i >= capacity {
                    Some(items[i - capacity])
                } else {
                    None
                };
                if evicted != expected {
                    return TestResult::failed();
                }
            }
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(u8, Vec<u16>) -> TestResult);
    }

    #[cfg(feature = "serde_support")]
    #[test]
    fn deserialize_round_trip_keeps_order() {
        let mut buffer = CircularBuffer::new(3);
        for i in 0..5u32 {
            buffer.insert(i);
        }
        let json = serde_json::to_string(&buffer).unwrap();
        let mut back: CircularBuffer<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(buffer, back);
        assert_eq!(back.insert(5), Some(2));
        assert_eq!(back.to_vec(), vec![3, 4, 5]);
    }

    #[cfg(feature = "serde_support")]
    #[test]
    fn deserialize_rejects_inconsistent_state() {
        let bad = [
            r#"{"capacity":2,"slots":[1,2],"cursor":7}"#,
            r#"{"capacity":2,"slots":[1,2,3],"cursor":0}"#,
            r#"{"capacity":3,"slots":[1],"cursor":2}"#,
            r#"{"capacity":0,"slots":[1],"cursor":0}"#,
        ];
        for json in &bad {
            assert!(serde_json::from_str::<CircularBuffer<u32>>(json).is_err(), "{}", json);
        }
        let partial: CircularBuffer<u32> =
            serde_json::from_str(r#"{"capacity":3,"slots":[1],"cursor":1}"#).unwrap();
        assert_eq!(partial.to_vec(), vec![1]);
    }
}
