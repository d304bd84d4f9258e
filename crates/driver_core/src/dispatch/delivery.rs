//! Delivery metadata adapter.
//!
//! The store hands delivery details over either as a structured object or as a
//! JSON string holding that object. [`parse_delivery_info`] normalizes both
//! shapes at the boundary; anything else is `Invalid` and the request is kept
//! without its delivery extras.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payer {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_phone: Option<String>,
    #[serde(default)]
    pub receiver_name: Option<String>,
    #[serde(default)]
    pub receiver_phone: Option<String>,
    #[serde(default)]
    pub origin_instructions: Option<String>,
    #[serde(default)]
    pub dest_instructions: Option<String>,
    #[serde(default)]
    pub payer: Option<Payer>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryParse {
    Parsed(DeliveryInfo),
    Invalid,
}

/// Parse-or-passthrough for the delivery payload.
pub fn parse_delivery_info(raw: &Value) -> DeliveryParse {
    let parsed = match raw {
        Value::Object(_) => serde_json::from_value::<DeliveryInfo>(raw.clone()),
        Value::String(text) => serde_json::from_str::<DeliveryInfo>(text),
        _ => return DeliveryParse::Invalid,
    };
    match parsed {
        Ok(info) => DeliveryParse::Parsed(info),
        Err(_) => DeliveryParse::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_and_serialized_shapes_agree() {
        let object = json!({
            "senderName": "Juan",
            "receiverPhone": "+58 414 987 6543",
            "destInstructions": "Front desk",
            "payer": "receiver"
        });
        let serialized = Value::String(object.to_string());

        let DeliveryParse::Parsed(from_object) = parse_delivery_info(&object) else {
            panic!("object should parse");
        };
        let DeliveryParse::Parsed(from_string) = parse_delivery_info(&serialized) else {
            panic!("string should parse");
        };
        assert_eq!(from_object, from_string);
        assert_eq!(from_object.payer, Some(Payer::Receiver));
        assert_eq!(from_object.dest_instructions.as_deref(), Some("Front desk"));
    }

    #[test]
    fn garbage_is_invalid_not_fatal() {
        assert_eq!(
            parse_delivery_info(&Value::String("{oops".to_string())),
            DeliveryParse::Invalid
        );
        assert_eq!(parse_delivery_info(&json!(42)), DeliveryParse::Invalid);
        assert_eq!(
            parse_delivery_info(&json!({ "payer": "nobody" })),
            DeliveryParse::Invalid
        );
    }
}
