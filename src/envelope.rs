//! Addressed message wrapper sent over the socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Destination of an outbound envelope.
///
/// Serializes as `null` for [`Address::Broadcast`] and as a plain string for
/// a direct recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Address {
    /// No specific recipient; delivered to everything interested.
    #[default]
    Broadcast,
    Direct(String),
}

impl From<Option<String>> for Address {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => Address::Direct(id),
            None => Address::Broadcast,
        }
    }
}

impl From<Address> for Option<String> {
    fn from(address: Address) -> Self {
        match address {
            Address::Broadcast => None,
            Address::Direct(id) => Some(id),
        }
    }
}

/// Pairs an [`Address`] with an arbitrary JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    address: Address,
    data: Value,
}

impl Envelope {
    pub fn new(address: Address, data: Value) -> Self {
        Self { address, data }
    }

    pub fn broadcast(data: Value) -> Self {
        Self::new(Address::Broadcast, data)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Flattens the envelope into the `{address, data}` record put on the wire.
    pub fn to_value(&self) -> Value {
        let address = match &self.address {
            Address::Broadcast => Value::Null,
            Address::Direct(id) => Value::String(id.clone()),
        };
        serde_json::json!({
            "address": address,
            "data": self.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcast_serializes_address_as_null() {
        let envelope = Envelope::broadcast(json!({"event": "job", "id": "42"}));
        assert_eq!(
            envelope.to_value(),
            json!({"address": null, "data": {"event": "job", "id": "42"}})
        );
    }

    #[test]
    fn direct_address_serializes_as_string() {
        let envelope = Envelope::new(Address::Direct("client-7".into()), json!([1, 2, 3]));
        assert_eq!(envelope.to_value(), json!({"address": "client-7", "data": [1, 2, 3]}));
    }

    #[test]
    fn serde_and_to_value_agree() {
        let envelope = Envelope::new(Address::Broadcast, json!({"nested": {"ok": true}}));
        assert_eq!(serde_json::to_value(&envelope).unwrap(), envelope.to_value());
    }

    #[test]
    fn null_payload_is_kept() {
        let envelope = Envelope::broadcast(Value::Null);
        assert_eq!(envelope.to_value(), json!({"address": null, "data": null}));
    }

    #[test]
    fn address_parses_from_wire() {
        let parsed: Envelope = serde_json::from_value(json!({"address": null, "data": 1})).unwrap();
        assert_eq!(parsed.address(), &Address::Broadcast);
        assert_eq!(parsed.data(), &json!(1));
    }
}
