//! Time-safe seller and category history.
//!
//! Every observed order schedules events (purchase, review, delivery) at the time they
//! become known. A later order only sees events strictly before its own purchase time.

use crate::core::join::is_low_review;
use crate::domain::model::ModelingRow;
use crate::features::category_key;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Outcome counters for one seller, one category, or the whole marketplace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub purchases: u64,
    pub reviews: u64,
    pub low_reviews: u64,
    pub deliveries: u64,
    pub late_deliveries: u64,
}

impl OutcomeCounts {
    fn apply(&mut self, kind: EventKind) {
        match kind {
            EventKind::Purchase => self.purchases += 1,
            EventKind::Review { low } => {
                self.reviews += 1;
                self.low_reviews += u64::from(low);
            }
            EventKind::Delivery { late } => {
                self.deliveries += 1;
                self.late_deliveries += u64::from(late);
            }
        }
    }

    pub fn low_review_rate(&self) -> Option<f64> {
        (self.reviews > 0).then(|| self.low_reviews as f64 / self.reviews as f64)
    }

    pub fn late_rate(&self) -> Option<f64> {
        (self.deliveries > 0).then(|| self.late_deliveries as f64 / self.deliveries as f64)
    }
}

/// History inputs of one order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryFeatures {
    pub seller_prior_orders: f64,
    pub seller_low_review_rate: f64,
    pub seller_late_rate: f64,
    pub category_low_review_rate: f64,
}

impl HistoryFeatures {
    /// No history at all: zero prior orders, unknown rates.
    pub fn unknown() -> Self {
        Self {
            seller_prior_orders: 0.0,
            seller_low_review_rate: f64::NAN,
            seller_late_rate: f64::NAN,
            category_low_review_rate: f64::NAN,
        }
    }
}

/// Shrinks an entity rate toward the global rate with `smoothing` pseudo-observations.
fn smoothed(hits: u64, total: u64, prior: Option<f64>, smoothing: f64) -> f64 {
    match prior {
        Some(prior) => (hits as f64 + smoothing * prior) / (total as f64 + smoothing),
        None if total > 0 => hits as f64 / total as f64,
        None => f64::NAN,
    }
}

/// Accumulated history at a point in time. Stored in the model artifact for serving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub smoothing: f64,
    pub as_of: Option<NaiveDateTime>,
    pub global: OutcomeCounts,
    pub sellers: HashMap<String, OutcomeCounts>,
    pub categories: HashMap<String, OutcomeCounts>,
}

impl HistorySnapshot {
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            ..Default::default()
        }
    }

    pub fn features_for(&self, seller_id: Option<&str>, category: Option<&str>) -> HistoryFeatures {
        let empty = OutcomeCounts::default();
        let seller = seller_id
            .and_then(|id| self.sellers.get(id))
            .unwrap_or(&empty);
        let category = category
            .and_then(|c| self.categories.get(c))
            .unwrap_or(&empty);

        let global_low = self.global.low_review_rate();
        let global_late = self.global.late_rate();

        HistoryFeatures {
            seller_prior_orders: seller.purchases as f64,
            seller_low_review_rate: smoothed(seller.low_reviews, seller.reviews, global_low, self.smoothing),
            seller_late_rate: smoothed(
                seller.late_deliveries,
                seller.deliveries,
                global_late,
                self.smoothing,
            ),
            category_low_review_rate: smoothed(
                category.low_reviews,
                category.reviews,
                global_low,
                self.smoothing,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Purchase,
    Review { low: bool },
    Delivery { late: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PendingEvent {
    time: NaiveDateTime,
    seq: u64,
    kind: EventKind,
    seller: Option<String>,
    category: Option<String>,
}

/// Replays orders chronologically while keeping future outcomes hidden.
#[derive(Debug)]
pub struct HistoryTracker {
    state: HistorySnapshot,
    pending: BinaryHeap<Reverse<PendingEvent>>,
    seq: u64,
}

impl HistoryTracker {
    pub fn new(smoothing: f64) -> Self {
        Self {
            state: HistorySnapshot::new(smoothing),
            pending: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Applies every pending event that happened strictly before `time`.
    pub fn advance_to(&mut self, time: NaiveDateTime) {
        while let Some(Reverse(event)) = self.pending.peek() {
            if event.time >= time {
                break;
            }
            if let Some(Reverse(event)) = self.pending.pop() {
                self.apply(event);
            }
        }
    }

    fn apply(&mut self, event: PendingEvent) {
        self.state.global.apply(event.kind);
        if let Some(seller) = event.seller {
            self.state.sellers.entry(seller).or_default().apply(event.kind);
        }
        if let Some(category) = event.category {
            self.state
                .categories
                .entry(category)
                .or_default()
                .apply(event.kind);
        }
        self.state.as_of = Some(match self.state.as_of {
            Some(current) => current.max(event.time),
            None => event.time,
        });
    }

    fn schedule(&mut self, time: NaiveDateTime, kind: EventKind, row: &ModelingRow) {
        let seller = (!row.seller_id.is_empty()).then(|| row.seller_id.clone());
        self.seq += 1;
        self.pending.push(Reverse(PendingEvent {
            time,
            seq: self.seq,
            kind,
            seller,
            category: category_key(row),
        }));
    }

    /// Registers an order; its outcomes become visible once they happen.
    pub fn observe(&mut self, row: &ModelingRow) {
        if let Some(purchase) = row.order_purchase_timestamp {
            self.schedule(purchase, EventKind::Purchase, row);
        }
        if let Some(created) = row.review_creation_date {
            self.schedule(
                created,
                EventKind::Review {
                    low: is_low_review(row.review_score),
                },
                row,
            );
        }
        if let (Some(delivered), Some(estimated)) = (
            row.order_delivered_customer_date,
            row.order_estimated_delivery_date,
        ) {
            self.schedule(
                delivered,
                EventKind::Delivery {
                    late: delivered.date() > estimated.date(),
                },
                row,
            );
        }
    }

    pub fn features(&self, seller_id: Option<&str>, category: Option<&str>) -> HistoryFeatures {
        self.state.features_for(seller_id, category)
    }

    /// Applies all remaining events and returns the final state.
    pub fn finish(mut self) -> HistorySnapshot {
        while let Some(Reverse(event)) = self.pending.pop() {
            self.apply(event);
        }
        self.state
    }
}
