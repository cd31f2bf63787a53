//! Posting classification.

use lotbook_core::{BookingMethod, Inventory, Posting};

/// How a posting interacts with its account's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostingKind {
    /// Adds units: a new lot, or more of an existing one.
    Augmentation,
    /// Routed to the resolver: removes units from lots held at cost, or on a
    /// NONE account, carries a cost spec to book as written.
    Reduction,
    /// Units are elided and must be interpolated.
    Unspecified,
    /// Zero units with a cost spec.
    Degenerate,
}

/// Classify a posting against the current inventory of its account.
///
/// An absent cost spec behaves like an empty one: a posting that opposes a
/// lot held at cost is a reduction even if it names no cost at all.
///
/// NONE accounts never match lots. Their postings with a cost spec go to the
/// resolver, which adds them as written; the rest are plain augmentations.
///
/// ```
/// use lotbook_booking::{classify, PostingKind};
/// use lotbook_core::{Amount, BookingMethod, CostSpec, Inventory, Posting};
/// use rust_decimal_macros::dec;
///
/// let sell = Posting::new("Assets:Broker", Amount::new(dec!(-3), "HOOL"));
/// let kind = classify(&sell, &Inventory::new(), BookingMethod::None);
/// assert_eq!(kind, PostingKind::Augmentation);
///
/// let sell = sell.with_cost(CostSpec::empty());
/// let kind = classify(&sell, &Inventory::new(), BookingMethod::None);
/// assert_eq!(kind, PostingKind::Reduction);
/// ```
#[must_use]
pub fn classify(posting: &Posting, inventory: &Inventory, method: BookingMethod) -> PostingKind {
    let Some(units) = &posting.units else {
        return PostingKind::Unspecified;
    };

    if units.is_zero() && posting.cost.is_some() {
        return PostingKind::Degenerate;
    }

    if method == BookingMethod::None {
        return if posting.cost.is_some() {
            PostingKind::Reduction
        } else {
            PostingKind::Augmentation
        };
    }

    if inventory.is_reduced_by(units) {
        PostingKind::Reduction
    } else {
        PostingKind::Augmentation
    }
}
