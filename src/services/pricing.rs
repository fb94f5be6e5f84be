//! Joins aggregated detections or cart entries against the catalog
//!
//! Unknown classes price at 0: they still count toward `total_count` but add
//! nothing to `total_price`. Totals are exact; an order whose total would not
//! fit in a u64 is rejected instead of wrapping.

use crate::domain::{CartEntry, Catalog, LineItem, PricedOrder};
use crate::error::PricingError;
use crate::services::aggregator::Aggregation;

/// Stateless resolver over a shared, read-only catalog
#[derive(Debug, Clone, Copy)]
pub struct PricingResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> PricingResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Price a detection result; lines carry the aggregated confidence
    pub fn price_aggregation(&self, aggregation: &Aggregation) -> Result<PricedOrder, PricingError> {
        let lines = aggregation.items().iter().map(|item| {
            self.line(&item.class_key, item.count, Some(item.avg_confidence))
        });
        Self::collect(lines)
    }

    /// Price a client-declared cart. Entries are priced one by one, so a
    /// class listed twice yields two lines.
    pub fn price_cart(&self, cart: &[CartEntry]) -> Result<PricedOrder, PricingError> {
        let lines = cart.iter().map(|entry| self.line(&entry.class_key, entry.count, None));
        Self::collect(lines)
    }

    fn line(&self, class_key: &str, count: u32, avg_confidence: Option<f64>) -> LineItem {
        LineItem {
            class_key: class_key.to_string(),
            display_name: self.catalog.display_name(class_key).to_string(),
            count,
            unit_price: self.catalog.unit_price(class_key),
            avg_confidence,
        }
    }

    fn collect(lines: impl Iterator<Item = LineItem>) -> Result<PricedOrder, PricingError> {
        let mut order = PricedOrder::default();
        for line in lines {
            let overflow = || PricingError::Overflow(line.class_key.clone());
            order.total_count =
                order.total_count.checked_add(u64::from(line.count)).ok_or_else(overflow)?;
            order.total_price = line
                .subtotal()
                .and_then(|subtotal| order.total_price.checked_add(subtotal))
                .ok_or_else(overflow)?;
            order.items.push(line);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CatalogEntry;

    fn two_item_catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry::new("croissant", 3200, "오리지널크라상"),
            CatalogEntry::new("muffin", 4500, "초코청크머핀"),
        ])
        .unwrap()
    }

    #[test]
    fn test_cart_totals() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);
        let cart = vec![CartEntry::new("croissant", 2), CartEntry::new("muffin", 1)];

        let order = resolver.price_cart(&cart).unwrap();

        assert_eq!(order.total_count, 3);
        assert_eq!(order.total_price, 3200 * 2 + 4500);
        assert_eq!(order.total_price, 10900);
        assert_eq!(order.items[0].display_name, "오리지널크라상");
        assert_eq!(order.items[0].avg_confidence, None);
    }

    #[test]
    fn test_unknown_class_counts_but_is_free() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);
        let cart = vec![CartEntry::new("unknown_item", 1), CartEntry::new("muffin", 2)];

        let order = resolver.price_cart(&cart).unwrap();

        assert_eq!(order.total_count, 3);
        assert_eq!(order.total_price, 9000);
        assert_eq!(order.items[0].unit_price, 0);
        assert_eq!(order.items[0].display_name, "unknown_item");
    }

    #[test]
    fn test_aggregation_pricing() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);
        let mut aggregation = Aggregation::new();
        aggregation.record("muffin".to_string(), 0.75);
        aggregation.record("croissant".to_string(), 0.9);
        aggregation.record("muffin".to_string(), 0.5);

        let order = resolver.price_aggregation(&aggregation).unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].class_key, "muffin");
        assert_eq!(order.items[0].count, 2);
        assert_eq!(order.items[0].avg_confidence, Some(0.625));
        assert_eq!(order.total_count, 3);
        assert_eq!(order.total_price, 4500 * 2 + 3200);
    }

    #[test]
    fn test_empty_inputs() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);

        let order = resolver.price_cart(&[]).unwrap();
        assert!(order.is_empty());
        assert_eq!((order.total_count, order.total_price), (0, 0));

        let order = resolver.price_aggregation(&Aggregation::new()).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn test_pricing_is_deterministic() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);
        let cart = vec![CartEntry::new("muffin", 4), CartEntry::new("croissant", 1)];

        assert_eq!(resolver.price_cart(&cart).unwrap(), resolver.price_cart(&cart).unwrap());
    }

    #[test]
    fn test_duplicate_cart_entries_stay_separate() {
        let catalog = two_item_catalog();
        let resolver = PricingResolver::new(&catalog);
        let cart = vec![CartEntry::new("croissant", 1), CartEntry::new("croissant", 2)];

        let order = resolver.price_cart(&cart).unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_count, 3);
        assert_eq!(order.total_price, 9600);
    }

    #[test]
    fn test_overflowing_total_is_rejected() {
        let catalog =
            Catalog::new(vec![CatalogEntry::new("gold_bar", u64::MAX / 4, "gold")]).unwrap();
        let resolver = PricingResolver::new(&catalog);

        let result = resolver.price_cart(&[CartEntry::new("gold_bar", 5)]);
        assert_eq!(result, Err(PricingError::Overflow("gold_bar".to_string())));

        let result = resolver
            .price_cart(&[CartEntry::new("gold_bar", 3), CartEntry::new("gold_bar", 3)]);
        assert_eq!(result, Err(PricingError::Overflow("gold_bar".to_string())));
    }
}
