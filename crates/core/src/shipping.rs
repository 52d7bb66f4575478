//! Shipment tracking state machine.
//!
//! ```text
//! pending -> preparing -> shipped -> in_transit -> delivered
//!                            \____________\____________\____-> returned
//! ```
//!
//! Forward moves may skip steps. Re-applying the current status is a no-op.
//! `returned` is terminal. `shipped_at` and `delivered_at` are written once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, OrderStatus, ShippingStatus};

impl ShippingStatus {
    /// Position along the forward delivery sequence. `None` for `returned`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Preparing => Some(1),
            Self::Shipped => Some(2),
            Self::InTransit => Some(3),
            Self::Delivered => Some(4),
            Self::Returned => None,
        }
    }

    /// Whether the package has left the warehouse.
    #[must_use]
    pub const fn has_shipped(self) -> bool {
        matches!(self, Self::Shipped | Self::InTransit | Self::Delivered)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(_), None) => self.has_shipped(),
            (None, _) => false,
        }
    }
}

/// Admin-supplied tracking changes. `None` leaves a field untouched; an empty
/// string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipping_status: Option<ShippingStatus>,
    pub notes: Option<String>,
}

impl TrackingUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tracking_number.is_none()
            && self.carrier.is_none()
            && self.shipping_status.is_none()
            && self.notes.is_none()
    }
}

/// Tracking state stored on an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub status: ShippingStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub notes: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Tracking {
    /// Apply an admin update in place.
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation` if the update changes nothing.
    /// - `DomainError::InvalidState` for a backward move, a move out of
    ///   `returned`, or a status change on a cancelled order.
    pub fn apply(
        &mut self,
        update: &TrackingUpdate,
        order_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if update.is_empty() {
            return Err(DomainError::Validation(
                "tracking update has no fields".to_owned(),
            ));
        }

        if let Some(next) = update.shipping_status {
            self.transition(next, order_status, now)?;
        }

        if let Some(number) = &update.tracking_number {
            self.tracking_number = non_blank(number);
        }
        if let Some(carrier) = &update.carrier {
            self.carrier = non_blank(carrier);
        }
        if let Some(notes) = &update.notes {
            self.notes = non_blank(notes);
        }

        Ok(())
    }

    fn transition(
        &mut self,
        next: ShippingStatus,
        order_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if next == self.status {
            return Ok(());
        }
        if order_status == OrderStatus::Cancelled {
            return Err(DomainError::InvalidState(
                "cannot change shipment status of a cancelled order".to_owned(),
            ));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidState(format!(
                "cannot move shipment from {} to {next}",
                self.status
            )));
        }

        if next.has_shipped() && self.shipped_at.is_none() {
            self.shipped_at = Some(now);
        }
        if next == ShippingStatus::Delivered && self.delivered_at.is_none() {
            self.delivered_at = Some(now);
        }
        self.status = next;
        Ok(())
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn to(status: ShippingStatus) -> TrackingUpdate {
        TrackingUpdate {
            shipping_status: Some(status),
            ..TrackingUpdate::default()
        }
    }

    #[test]
    fn test_forward_transitions_allowed() {
        use ShippingStatus::*;
        assert!(Pending.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Shipped));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        use ShippingStatus::*;
        assert!(!Delivered.can_transition_to(InTransit));
        assert!(!Shipped.can_transition_to(Preparing));
        assert!(!Returned.can_transition_to(Shipped));
    }

    #[test]
    fn test_returned_only_after_shipping() {
        use ShippingStatus::*;
        assert!(Shipped.can_transition_to(Returned));
        assert!(InTransit.can_transition_to(Returned));
        assert!(Delivered.can_transition_to(Returned));
        assert!(!Pending.can_transition_to(Returned));
        assert!(!Preparing.can_transition_to(Returned));
    }

    #[test]
    fn test_shipped_at_set_only_once() {
        let first = Utc::now();
        let later = first + Duration::hours(2);
        let mut tracking = Tracking::default();

        tracking
            .apply(&to(ShippingStatus::Shipped), OrderStatus::Completed, first)
            .unwrap();
        tracking
            .apply(&to(ShippingStatus::Shipped), OrderStatus::Completed, later)
            .unwrap();
        tracking
            .apply(&to(ShippingStatus::InTransit), OrderStatus::Completed, later)
            .unwrap();

        assert_eq!(tracking.shipped_at, Some(first));
        assert_eq!(tracking.status, ShippingStatus::InTransit);
    }

    #[test]
    fn test_delivered_at_set_once_and_backfills_shipped_at() {
        let now = Utc::now();
        let mut tracking = Tracking::default();

        tracking
            .apply(&to(ShippingStatus::Delivered), OrderStatus::Completed, now)
            .unwrap();
        assert_eq!(tracking.delivered_at, Some(now));
        assert_eq!(tracking.shipped_at, Some(now));

        let later = now + Duration::days(3);
        tracking
            .apply(&to(ShippingStatus::Returned), OrderStatus::Completed, later)
            .unwrap();
        assert_eq!(tracking.delivered_at, Some(now));
        assert_eq!(tracking.status, ShippingStatus::Returned);
    }

    #[test]
    fn test_failed_transition_leaves_fields_untouched() {
        let mut tracking = Tracking {
            status: ShippingStatus::Delivered,
            ..Tracking::default()
        };
        let update = TrackingUpdate {
            shipping_status: Some(ShippingStatus::Preparing),
            carrier: Some("UPS".to_owned()),
            ..TrackingUpdate::default()
        };

        let result = tracking.apply(&update, OrderStatus::Completed, Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
        assert_eq!(tracking.carrier, None);
    }

    #[test]
    fn test_details_attach_at_any_state_and_blank_clears() {
        let mut tracking = Tracking {
            status: ShippingStatus::Returned,
            carrier: Some("DHL".to_owned()),
            ..Tracking::default()
        };
        let update = TrackingUpdate {
            tracking_number: Some(" 1Z999 ".to_owned()),
            carrier: Some(String::new()),
            notes: Some("left at door".to_owned()),
            shipping_status: None,
        };

        tracking
            .apply(&update, OrderStatus::Cancelled, Utc::now())
            .unwrap();
        assert_eq!(tracking.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(tracking.carrier, None);
        assert_eq!(tracking.notes.as_deref(), Some("left at door"));
    }

    #[test]
    fn test_cancelled_order_cannot_ship() {
        let mut tracking = Tracking::default();
        let result = tracking.apply(
            &to(ShippingStatus::Shipped),
            OrderStatus::Cancelled,
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut tracking = Tracking::default();
        let result = tracking.apply(&TrackingUpdate::default(), OrderStatus::Pending, Utc::now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
