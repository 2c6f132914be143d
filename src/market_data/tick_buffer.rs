use std::collections::{HashMap, VecDeque};

// ---------------------------------------------------------------------------
// TickBuffer -- bounded price history per symbol
// ---------------------------------------------------------------------------

/// Bounded ring of recent prices per symbol.
///
/// Every ring holds at most `capacity` samples in arrival order. When a push
/// would exceed the capacity, the oldest sample is dropped. Duplicates are
/// kept; timestamps are not consulted.
///
/// The buffer is owned by a single engine and mutated only on the ingestion
/// path, so it carries no interior locking.
#[derive(Debug)]
pub struct TickBuffer {
    rings: HashMap<String, VecDeque<f64>>,
    capacity: usize,
}

impl TickBuffer {
    /// Create a buffer that retains at most `capacity` prices per symbol.
    ///
    /// A zero capacity is raised to one so that the latest price is always
    /// observable.
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `price` to the ring for `symbol`, evicting the oldest sample on
    /// overflow.
    pub fn push(&mut self, symbol: &str, price: f64) {
        let capacity = self.capacity;
        let ring = self
            .rings
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        ring.push_back(price);
        while ring.len() > capacity {
            ring.pop_front();
        }
    }

    /// Return the most recent `n` prices for `symbol` (oldest-first order), or
    /// `None` when fewer than `n` have been observed.
    pub fn window(&self, symbol: &str, n: usize) -> Option<Vec<f64>> {
        let ring = self.rings.get(symbol)?;
        if n == 0 || ring.len() < n {
            return None;
        }
        Some(ring.iter().skip(ring.len() - n).copied().collect())
    }

    /// Number of prices currently retained for `symbol`.
    pub fn len(&self, symbol: &str) -> usize {
        self.rings.get(symbol).map_or(0, VecDeque::len)
    }

    /// Most recent price for `symbol`, if any.
    pub fn last(&self, symbol: &str) -> Option<f64> {
        self.rings.get(symbol).and_then(|ring| ring.back().copied())
    }

    /// Symbols that have received at least one price.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.rings.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
