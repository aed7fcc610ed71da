// JSON-RPC 2.0 envelope and the custody method payloads
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::account::{Account, Address};
use crate::encoding::{self, hex_bytes};
use crate::signer::Signature;

#[derive(Serialize, Deserialize, Debug)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    pub fn invalid_params(reason: impl fmt::Display) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", reason),
            data: None,
        }
    }

    pub fn internal(reason: impl fmt::Display) -> Self {
        Self {
            code: -32603,
            message: format!("Internal error: {}", reason),
            data: None,
        }
    }
}

/// Backend-defined account config.
///
/// Accepted on the wire either as an embedded JSON object or as hex-encoded
/// JSON bytes; always sent as an object when it parses as one. Holds a
/// passphrase, so `Debug` shows only the size.
#[derive(Clone, PartialEq, Default)]
pub struct ConfigBlob(pub Vec<u8>);

impl ConfigBlob {
    pub fn from_json(value: &Value) -> Self {
        Self(value.to_string().into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ConfigBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigBlob({} bytes)", self.0.len())
    }
}

impl Serialize for ConfigBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match serde_json::from_slice::<Value>(&self.0) {
            Ok(value @ Value::Object(_)) => value.serialize(serializer),
            _ => serializer.serialize_str(&encoding::encode_hex(&self.0)),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => encoding::decode_hex(&s).map(ConfigBlob).map_err(serde::de::Error::custom),
            value @ Value::Object(_) => Ok(ConfigBlob::from_json(&value)),
            _ => Err(serde::de::Error::custom(
                "newAccountConfig must be a JSON object or hex-encoded bytes",
            )),
        }
    }
}

// Method params. None derive Debug: several carry passphrases.

#[derive(Serialize, Deserialize, Default)]
pub struct OpenParams {
    #[serde(default)]
    pub passphrase: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AddressParams {
    pub address: Address,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignParams {
    pub address: Address,
    #[serde(with = "hex_bytes")]
    pub to_sign: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAndSignParams {
    pub address: Address,
    #[serde(with = "hex_bytes")]
    pub to_sign: Vec<u8>,
    pub passphrase: String,
}

#[derive(Serialize, Deserialize)]
pub struct TimedUnlockParams {
    pub address: Address,
    pub password: String,
    /// Nanoseconds
    pub duration: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccountParams {
    pub new_account_config: ConfigBlob,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRawKeyParams {
    pub raw_key: String,
    pub new_account_config: ConfigBlob,
}

// Results

#[derive(Serialize, Deserialize, Debug)]
pub struct StatusResult {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccountsResult {
    pub accounts: Vec<Account>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContainsResult {
    pub is_contained: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SignatureResult {
    pub sig: Signature,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccountResult {
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_blob_accepts_object_and_hex() {
        let from_object: NewAccountParams =
            serde_json::from_value(json!({"newAccountConfig": {"passphrase": "pw"}})).unwrap();
        let parsed: Value = serde_json::from_slice(from_object.new_account_config.as_bytes()).unwrap();
        assert_eq!(parsed, json!({"passphrase": "pw"}));

        let hex = encoding::encode_hex(br#"{"passphrase":"pw"}"#);
        let from_hex: NewAccountParams = serde_json::from_value(json!({ "newAccountConfig": hex })).unwrap();
        assert_eq!(from_hex.new_account_config.as_bytes(), br#"{"passphrase":"pw"}"#);

        assert!(serde_json::from_value::<NewAccountParams>(json!({"newAccountConfig": 5})).is_err());
    }

    #[test]
    fn test_config_blob_debug_hides_contents() {
        let blob = ConfigBlob(br#"{"passphrase":"hunter2"}"#.to_vec());
        assert!(!format!("{:?}", blob).contains("hunter2"));
    }

    #[test]
    fn test_field_names() {
        let params: SignParams = serde_json::from_value(json!({
            "address": "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            "toSign": "0x6d7367",
        }))
        .unwrap();
        assert_eq!(params.to_sign, b"msg");

        let result = serde_json::to_value(ContainsResult { is_contained: true }).unwrap();
        assert_eq!(result, json!({"isContained": true}));
    }

    #[test]
    fn test_request_without_params() {
        let req: RpcRequest = serde_json::from_value(json!({"jsonrpc": "2.0", "method": "status", "id": 1})).unwrap();
        assert_eq!(req.params, Value::Null);
    }
}
