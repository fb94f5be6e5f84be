//! JSON request/response schemas of the HTTP API
//!
//! Field names match what the POS front end already consumes.

use crate::domain::{CartEntry, LineItem, PricedOrder, Receipt};
use crate::services::engine::{DetectionOutcome, ScanStatus};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub const MSG_RECOGNIZED: &str = "인식 완료!";
pub const MSG_NOTHING_RECOGNIZED: &str = "빵이 인식되지 않았습니다. 더 가까이 촬영해주세요.";
pub const MSG_CHECKOUT_COMPLETE: &str = "결제가 완료되었습니다!";
pub const MSG_PRICED: &str = "가격 계산 완료";

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub items: Vec<CartEntry>,
}

#[derive(Debug, Serialize)]
pub struct ItemResult {
    pub bread_name: String,
    pub korean_name: String,
    pub count: u32,
    pub unit_price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl From<LineItem> for ItemResult {
    fn from(line: LineItem) -> Self {
        Self {
            bread_name: line.class_key,
            korean_name: line.display_name,
            count: line.count,
            unit_price: line.unit_price,
            confidence: line.avg_confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub items: Vec<ItemResult>,
    pub total_count: u64,
    pub total_price: u64,
    pub image_base64: Option<String>,
    pub message: String,
}

impl From<DetectionOutcome> for DetectionResponse {
    fn from(outcome: DetectionOutcome) -> Self {
        let recognized = outcome.status == ScanStatus::Recognized;
        Self {
            success: recognized,
            items: outcome.order.items.into_iter().map(Into::into).collect(),
            total_count: outcome.order.total_count,
            total_price: outcome.order.total_price,
            image_base64: outcome.annotated_image,
            message: if recognized { MSG_RECOGNIZED } else { MSG_NOTHING_RECOGNIZED }.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub success: bool,
    pub items: Vec<ItemResult>,
    pub total_count: u64,
    pub total_price: u64,
    pub message: String,
}

impl From<PricedOrder> for PriceResponse {
    fn from(order: PricedOrder) -> Self {
        Self {
            success: true,
            items: order.items.into_iter().map(Into::into).collect(),
            total_count: order.total_count,
            total_price: order.total_price,
            message: MSG_PRICED.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub total_price: u64,
    pub total_count: u64,
    pub receipt_number: String,
    pub timestamp: String,
    pub items: Vec<ItemResult>,
    pub message: String,
}

impl From<Receipt> for CheckoutResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            success: true,
            total_price: receipt.total_price,
            total_count: receipt.total_count,
            receipt_number: receipt.receipt_number,
            timestamp: receipt.timestamp,
            items: receipt.items.into_iter().map(Into::into).collect(),
            message: MSG_CHECKOUT_COMPLETE.to_string(),
        }
    }
}

/// Serialized as a JSON object in catalog order
#[derive(Debug, Serialize)]
pub struct PriceListResponse {
    #[serde(serialize_with = "ordered_map")]
    pub prices: Vec<(String, u64)>,
}

fn ordered_map<S: Serializer>(pairs: &[(String, u64)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (name, price) in pairs {
        map.serialize_entry(name, price)?;
    }
    map.end()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub build: &'static str,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricedOrder;

    fn muffin_line(confidence: Option<f64>) -> LineItem {
        LineItem {
            class_key: "muffin".to_string(),
            display_name: "초코청크머핀".to_string(),
            count: 2,
            unit_price: 4500,
            avg_confidence: confidence,
        }
    }

    #[test]
    fn test_detection_response_shape() {
        let outcome = DetectionOutcome {
            status: ScanStatus::Recognized,
            order: PricedOrder {
                items: vec![muffin_line(Some(0.75))],
                total_count: 2,
                total_price: 9000,
            },
            annotated_image: Some("data:image/jpeg;base64,AAAA".to_string()),
        };

        let json = serde_json::to_value(DetectionResponse::from(outcome)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["items"][0]["bread_name"], "muffin");
        assert_eq!(json["items"][0]["korean_name"], "초코청크머핀");
        assert_eq!(json["items"][0]["confidence"], 0.75);
        assert_eq!(json["total_price"], 9000);
        assert_eq!(json["message"], MSG_RECOGNIZED);
    }

    #[test]
    fn test_nothing_recognized_response() {
        let outcome = DetectionOutcome {
            status: ScanStatus::NothingRecognized,
            order: PricedOrder::default(),
            annotated_image: None,
        };

        let json = serde_json::to_value(DetectionResponse::from(outcome)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["items"].as_array().unwrap().len(), 0);
        assert_eq!(json["total_count"], 0);
        assert!(json["image_base64"].is_null());
        assert_eq!(json["message"], MSG_NOTHING_RECOGNIZED);
    }

    #[test]
    fn test_cart_lines_omit_confidence() {
        let json = serde_json::to_value(ItemResult::from(muffin_line(None))).unwrap();
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_cart_request_ignores_client_prices() {
        let request: CartRequest = serde_json::from_str(
            r#"{"items":[{"bread_name":"croissant","count":2,"unit_price":1}]}"#,
        )
        .unwrap();
        assert_eq!(request.items, vec![CartEntry::new("croissant", 2)]);
    }

    #[test]
    fn test_price_list_keeps_catalog_order() {
        let response = PriceListResponse {
            prices: vec![("초코청크머핀".to_string(), 4500), ("오리지널크라상".to_string(), 3200)],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"prices":{"초코청크머핀":4500,"오리지널크라상":3200}}"#);
    }
}
