//! Checkout and receipt minting
//!
//! Totals are always re-derived from the catalog; the cart only supplies
//! identity and quantity. The instant is captured once per receipt and used
//! for both the receipt number and the ISO timestamp.
//!
//! Receipt numbers have one-second granularity, so two checkouts in the same
//! second collide unless `collision_suffix` is enabled.

use crate::domain::{CartEntry, Catalog, Receipt};
use crate::error::PricingError;
use crate::services::pricing::PricingResolver;
use chrono::{DateTime, FixedOffset, Local};
use tracing::info;
use uuid::Uuid;

const RECEIPT_NUMBER_FORMAT: &str = "%Y%m%d%H%M%S";
const RECEIPT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Source of the checkout instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the store's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Mints receipts for priced carts
pub struct ReceiptGenerator {
    prefix: String,
    collision_suffix: bool,
    clock: Box<dyn Clock>,
}

impl ReceiptGenerator {
    pub fn new(prefix: &str, collision_suffix: bool) -> Self {
        Self::with_clock(prefix, collision_suffix, Box::new(SystemClock))
    }

    pub fn with_clock(prefix: &str, collision_suffix: bool, clock: Box<dyn Clock>) -> Self {
        Self { prefix: prefix.to_string(), collision_suffix, clock }
    }

    /// Re-price the cart and issue a receipt. An empty cart still gets one.
    pub fn checkout(&self, catalog: &Catalog, cart: &[CartEntry]) -> Result<Receipt, PricingError> {
        let order = PricingResolver::new(catalog).price_cart(cart)?;
        let now = self.clock.now();

        let mut receipt_number = format!("{}{}", self.prefix, now.format(RECEIPT_NUMBER_FORMAT));
        if self.collision_suffix {
            let uuid = Uuid::now_v7().simple().to_string();
            receipt_number.push('-');
            receipt_number.push_str(&uuid[uuid.len() - 12..]);
        }

        let receipt = Receipt {
            receipt_number,
            total_count: order.total_count,
            total_price: order.total_price,
            timestamp: now.format(RECEIPT_TIMESTAMP_FORMAT).to_string(),
            items: order.items,
        };

        info!(
            receipt_number = %receipt.receipt_number,
            total_count = %receipt.total_count,
            total_price = %receipt.total_price,
            lines = %receipt.items.len(),
            "receipt_issued"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CatalogEntry;
    use chrono::TimeZone;

    struct FixedClock(DateTime<FixedOffset>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<FixedOffset> {
            self.0
        }
    }

    fn fixed_clock() -> Box<dyn Clock> {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        Box::new(FixedClock(kst.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()))
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry::new("croissant", 3200, "오리지널크라상"),
            CatalogEntry::new("muffin", 4500, "초코청크머핀"),
        ])
        .unwrap()
    }

    #[test]
    fn test_receipt_totals_and_number() {
        let generator = ReceiptGenerator::with_clock("DDBB", false, fixed_clock());
        let cart = vec![CartEntry::new("croissant", 2), CartEntry::new("muffin", 1)];

        let receipt = generator.checkout(&catalog(), &cart).unwrap();

        assert_eq!(receipt.receipt_number, "DDBB20250314092653");
        assert_eq!(receipt.timestamp, "2025-03-14T09:26:53.000000");
        assert_eq!(receipt.total_count, 3);
        assert_eq!(receipt.total_price, 10900);
        assert_eq!(receipt.items.len(), 2);
    }

    #[test]
    fn test_empty_cart_still_issues_receipt() {
        let generator = ReceiptGenerator::with_clock("DDBB", false, fixed_clock());

        let receipt = generator.checkout(&catalog(), &[]).unwrap();

        assert_eq!(receipt.receipt_number, "DDBB20250314092653");
        assert_eq!(receipt.total_count, 0);
        assert_eq!(receipt.total_price, 0);
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn test_same_second_same_number() {
        let generator = ReceiptGenerator::with_clock("DDBB", false, fixed_clock());
        let cart = vec![CartEntry::new("muffin", 1)];

        let first = generator.checkout(&catalog(), &cart).unwrap();
        let second = generator.checkout(&catalog(), &cart).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_collision_suffix() {
        let generator = ReceiptGenerator::with_clock("DDBB", true, fixed_clock());
        let cart = vec![CartEntry::new("muffin", 1)];

        let first = generator.checkout(&catalog(), &cart).unwrap();
        let second = generator.checkout(&catalog(), &cart).unwrap();

        assert!(first.receipt_number.starts_with("DDBB20250314092653-"));
        assert_eq!(first.receipt_number.len(), "DDBB20250314092653-".len() + 12);
        assert_ne!(first.receipt_number, second.receipt_number);
        assert_eq!(first.total_price, second.total_price);
    }

    #[test]
    fn test_unknown_cart_item_is_free() {
        let generator = ReceiptGenerator::with_clock("DDBB", false, fixed_clock());
        let cart = vec![CartEntry::new("unknown_item", 1)];

        let receipt = generator.checkout(&catalog(), &cart).unwrap();

        assert_eq!(receipt.total_count, 1);
        assert_eq!(receipt.total_price, 0);
    }

    #[test]
    fn test_overflowing_cart_issues_no_receipt() {
        let generator = ReceiptGenerator::with_clock("DDBB", false, fixed_clock());
        let catalog = Catalog::new(vec![CatalogEntry::new("cake", u64::MAX / 2, "cake")]).unwrap();

        let result = generator.checkout(&catalog, &[CartEntry::new("cake", 3)]);

        assert_eq!(result, Err(PricingError::Overflow("cake".to_string())));
    }
}
