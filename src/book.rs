//! Price-sorted order-book replica, built incrementally from `new`/`change`/`delete` deltas.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::Error;

/// Orders prices from best to worst for one side of the book.
///
/// Sealed to `Descending`/`Ascending` — the book only ever has two sides, so a generic struct
/// parameterized by one of two zero-sized marker types stands in for a comparator argument
/// without needing a boxed closure or trait object.
pub trait PriceOrdering: Send + Sync + 'static {
    /// Orders two prices from best to worst.
    fn cmp(a: f64, b: f64) -> Ordering;
}

/// Descending price order: best = highest. Used for bids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Descending;

impl PriceOrdering for Descending {
    fn cmp(a: f64, b: f64) -> Ordering {
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }
}

/// Ascending price order: best = lowest. Used for asks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascending;

impl PriceOrdering for Ascending {
    fn cmp(a: f64, b: f64) -> Ordering {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

/// One `[action, price, quantity]` book delta.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange(pub String, pub f64, pub f64);

/// One side of the order book: a price-sorted ladder of resting quantity.
///
/// `O` fixes the side's ordering (`Descending` for bids, `Ascending` for asks) at compile time.
#[derive(Debug)]
pub struct BookSide<O: PriceOrdering> {
    levels: BTreeMap<OrderedPrice<O>, f64>,
}

impl<O: PriceOrdering> Default for BookSide<O> {
    fn default() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }
}

/// A `f64` wrapper ordering by `O`, so a `BTreeMap` walks best-to-worst in iteration order.
#[derive(Debug, Clone, Copy)]
struct OrderedPrice<O: PriceOrdering>(f64, std::marker::PhantomData<O>);

impl<O: PriceOrdering> OrderedPrice<O> {
    fn new(price: f64) -> Self {
        Self(price, std::marker::PhantomData)
    }
}

impl<O: PriceOrdering> PartialEq for OrderedPrice<O> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<O: PriceOrdering> Eq for OrderedPrice<O> {}
impl<O: PriceOrdering> PartialOrd for OrderedPrice<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<O: PriceOrdering> Ord for OrderedPrice<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        O::cmp(self.0, other.0)
    }
}

impl<O: PriceOrdering> BookSide<O> {
    /// Applies a batch of `new`/`change`/`delete` deltas in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChangeType`] for an unrecognized action, or
    /// [`Error::BookPriceViolation`] when `new` names a resting price or `change`/`delete` names an
    /// absent one.
    pub fn apply_changes(&mut self, changes: &[PriceChange]) -> Result<(), Error> {
        for PriceChange(action, price, quantity) in changes {
            let key = OrderedPrice::new(*price);

            match action.as_str() {
                "new" => {
                    if self.levels.contains_key(&key) {
                        return Err(Error::BookPriceViolation(*price));
                    }
                    self.levels.insert(key, *quantity);
                }
                "change" => {
                    if !self.levels.contains_key(&key) {
                        return Err(Error::BookPriceViolation(*price));
                    }
                    self.levels.insert(key, *quantity);
                }
                "delete" => {
                    if self.levels.remove(&key).is_none() {
                        return Err(Error::BookPriceViolation(*price));
                    }
                }
                other => return Err(Error::InvalidChangeType(other.to_owned())),
            }
        }

        Ok(())
    }

    /// The price at which a hypothetical marketable order of size `quantity` would stop being
    /// filled, walking from the best price outward. `None` if the book never reaches `quantity`.
    #[must_use]
    pub fn price_depth(&self, quantity: f64) -> Option<f64> {
        self.price_depth_excluding(quantity, f64::NAN, 0.0)
    }

    /// Same as [`BookSide::price_depth`], but subtracts `own_qty` from the running sum once the
    /// walk passes `own_price` — answering "what price would this depth be at without my own
    /// resting order?".
    #[must_use]
    pub fn price_depth_excluding(&self, quantity: f64, own_price: f64, own_qty: f64) -> Option<f64> {
        let mut cumulative = 0.0;

        for (level_price, level_qty) in &self.levels {
            cumulative += level_qty;

            if level_price.0 == own_price {
                cumulative -= own_qty;
            }

            if cumulative > quantity {
                return Some(level_price.0);
            }
        }

        None
    }

    /// Number of resting price levels. Exposed for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// `true` if no price levels are resting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Resting quantity at `price`, if any. Exposed for tests and diagnostics.
    #[must_use]
    pub fn quantity_at(&self, price: f64) -> Option<f64> {
        self.levels.get(&OrderedPrice::new(price)).copied()
    }
}

/// The bid side: best = highest price.
pub type Bids = BookSide<Descending>;
/// The ask side: best = lowest price.
pub type Asks = BookSide<Ascending>;

/// Wire shape of one incremental book update.
#[derive(Debug, Clone, Deserialize)]
pub struct BookUpdate {
    /// This update's sequence number.
    pub change_id: i64,
    /// The sequence number this update was built on top of. Absent for the initial snapshot.
    pub prev_change_id: Option<i64>,
    /// Bid-side deltas.
    #[serde(default)]
    pub bids: Vec<PriceChange>,
    /// Ask-side deltas.
    #[serde(default)]
    pub asks: Vec<PriceChange>,
}

/// The composite order book: both sides plus the sequence-gap guard.
#[derive(Debug, Default)]
pub struct Book {
    /// Bid side.
    pub bids: Bids,
    /// Ask side.
    pub asks: Asks,
    /// Sequence number of the last successfully applied update. `0` before the first snapshot.
    pub prev_change_id: i64,
}

impl Book {
    /// Validates `update.prev_change_id` against the locally stored sequence, then applies both
    /// sides' deltas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceGap`] without mutating the book if `prev_change_id` is present and
    /// does not match. Otherwise propagates whatever [`BookSide::apply_changes`] returns; in that
    /// case the sequence number has already advanced even though a side may be left partially
    /// applied, since each side is applied independently rather than as a single transaction.
    pub fn update(&mut self, update: &BookUpdate) -> Result<(), Error> {
        if let Some(prev) = update.prev_change_id {
            if prev != self.prev_change_id {
                return Err(Error::SequenceGap {
                    expected: self.prev_change_id,
                    got: prev,
                });
            }
        }

        self.prev_change_id = update.change_id;
        self.bids.apply_changes(&update.bids)?;
        self.asks.apply_changes(&update.asks)?;

        Ok(())
    }
}
