use super::types::*;
use crate::error::{CustodyError, ErrorKind};
use crate::rpc::RpcState;
use axum::{debug_handler, extract::State, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

/// Main dispatcher: routes incoming JSON-RPC requests to the correct handler.
#[debug_handler]
pub async fn handle_rpc_request(State(state): State<RpcState>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    debug!("RPC Request: method={}, id={}", req.method, req.id);

    let result = match req.method.as_str() {
        "status" => handle_status(&state).await,
        "open" => handle_open(&state, req.params).await,
        "close" => handle_close(&state).await,
        "accounts" => handle_accounts(&state),
        "contains" => handle_contains(&state, req.params),
        "sign" => handle_sign(&state, req.params).await,
        "unlockAndSign" => handle_unlock_and_sign(&state, req.params).await,
        "timedUnlock" => handle_timed_unlock(&state, req.params).await,
        "lock" => handle_lock(&state, req.params).await,
        "newAccount" => handle_new_account(&state, req.params).await,
        "importRawKey" => handle_import_raw_key(&state, req.params).await,
        _ => Err(RpcError::method_not_found(&req.method)),
    };

    match result {
        Ok(val) => Json(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(val),
            error: None,
            id: req.id,
        }),
        Err(err) => {
            debug!("RPC {} failed: {}", req.method, err.message);
            Json(RpcResponse {
                jsonrpc: "2.0".to_string(),
                result: None,
                error: Some(err),
                id: req.id,
            })
        }
    }
}

//
// === Helpers ===
//

/// Fixed JSON-RPC code per failure kind
pub fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => -32001,
        ErrorKind::InvalidCredential => -32002,
        ErrorKind::AccountLocked => -32003,
        ErrorKind::InvalidConfig => -32004,
        ErrorKind::InvalidKey => -32005,
        ErrorKind::BackendUnavailable => -32006,
        ErrorKind::BackendError => -32007,
    }
}

impl From<CustodyError> for RpcError {
    fn from(err: CustodyError) -> Self {
        RpcError {
            code: error_code(err.kind),
            message: err.to_string(),
            data: Some(json!({
                "kind": err.kind,
                "operation": err.operation,
                "address": err.address,
            })),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}

fn empty() -> Result<Value, RpcError> {
    Ok(json!({}))
}

//
// === Individual Handlers ===
//

async fn handle_status(state: &RpcState) -> Result<Value, RpcError> {
    to_json(&StatusResult {
        status: state.service.status().await,
    })
}

/// Params are optional; `{}` and a missing params field both work.
async fn handle_open(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: Option<OpenParams> = parse_params(params)?;
    let params = params.unwrap_or_default();
    state.service.open(&params.passphrase).await?;
    empty()
}

async fn handle_close(state: &RpcState) -> Result<Value, RpcError> {
    state.service.close().await;
    empty()
}

fn handle_accounts(state: &RpcState) -> Result<Value, RpcError> {
    to_json(&AccountsResult {
        accounts: state.service.accounts(),
    })
}

fn handle_contains(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: AddressParams = parse_params(params)?;
    to_json(&ContainsResult {
        is_contained: state.service.contains(&params.address),
    })
}

async fn handle_sign(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: SignParams = parse_params(params)?;
    let sig = state.service.sign(&params.address, &params.to_sign).await?;
    to_json(&SignatureResult { sig })
}

async fn handle_unlock_and_sign(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: UnlockAndSignParams = parse_params(params)?;
    let sig = state
        .service
        .unlock_and_sign(&params.address, &params.to_sign, &params.passphrase)
        .await?;
    to_json(&SignatureResult { sig })
}

async fn handle_timed_unlock(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: TimedUnlockParams = parse_params(params)?;
    state
        .service
        .timed_unlock(&params.address, &params.password, params.duration)
        .await?;
    empty()
}

/// Never fails; an address that does not decode is ignored like an unknown one.
async fn handle_lock(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    match serde_json::from_value::<AddressParams>(params) {
        Ok(params) => state.service.lock(&params.address).await,
        Err(e) => debug!("Lock with undecodable params ignored: {}", e),
    }
    empty()
}

async fn handle_new_account(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: NewAccountParams = parse_params(params)?;
    let account = state.service.new_account(params.new_account_config.as_bytes()).await?;
    to_json(&AccountResult { account })
}

async fn handle_import_raw_key(state: &RpcState, params: Value) -> Result<Value, RpcError> {
    let params: ImportRawKeyParams = parse_params(params)?;
    let account = state
        .service
        .import_raw_key(&params.raw_key, params.new_account_config.as_bytes())
        .await?;
    to_json(&AccountResult { account })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::auth::KdfSettings;
    use crate::keystore::MemoryKeystore;
    use crate::service::CustodyService;
    use std::sync::Arc;

    const RAW_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

    fn state() -> RpcState {
        let backend = Arc::new(MemoryKeystore::new(KdfSettings::Pbkdf2 { iterations: 16 }));
        RpcState {
            service: Arc::new(CustodyService::new(backend)),
        }
    }

    async fn call(state: &RpcState, method: &str, params: Value) -> RpcResponse {
        let req = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 7,
        };
        let Json(resp) = handle_rpc_request(State(state.clone()), Json(req)).await;
        assert_eq!(resp.id, 7);
        resp
    }

    async fn ok(state: &RpcState, method: &str, params: Value) -> Value {
        let resp = call(state, method, params).await;
        assert!(resp.error.is_none(), "{} failed: {:?}", method, resp.error);
        resp.result.unwrap()
    }

    async fn err(state: &RpcState, method: &str, params: Value) -> RpcError {
        call(state, method, params).await.error.unwrap()
    }

    #[tokio::test]
    async fn test_import_then_sign_flow() {
        let state = state();
        ok(&state, "open", Value::Null).await;

        let result = ok(
            &state,
            "importRawKey",
            json!({"rawKey": RAW_KEY, "newAccountConfig": {"passphrase": "pw"}}),
        )
        .await;
        assert_eq!(result["account"]["address"], ADDRESS);
        assert_eq!(result["account"]["url"], format!("memory://{}", ADDRESS));

        let locked = err(&state, "sign", json!({"address": ADDRESS, "toSign": "0x6d7367"})).await;
        assert_eq!(locked.code, -32003);
        assert_eq!(locked.data.as_ref().unwrap()["kind"], "AccountLocked");
        assert_eq!(locked.data.as_ref().unwrap()["operation"], "sign");
        assert_eq!(locked.data.as_ref().unwrap()["address"], ADDRESS);

        ok(
            &state,
            "timedUnlock",
            json!({"address": ADDRESS, "password": "pw", "duration": 1_000_000_000i64}),
        )
        .await;
        let signed = ok(&state, "sign", json!({"address": ADDRESS, "toSign": "0x6d7367"})).await;
        let sig = signed["sig"].as_str().unwrap();
        assert_eq!(sig.len(), 2 + 130);
        assert!(sig.ends_with("00") || sig.ends_with("01"));

        ok(&state, "lock", json!({"address": ADDRESS})).await;
        let locked = err(&state, "sign", json!({"address": ADDRESS, "toSign": "0x6d7367"})).await;
        assert_eq!(locked.code, -32003);
    }

    #[tokio::test]
    async fn test_accounts_and_contains() {
        let state = state();
        let hex_config = crate::encoding::encode_hex(br#"{"passphrase":"pw"}"#);
        let created = ok(&state, "newAccount", json!({ "newAccountConfig": hex_config })).await;
        let address = created["account"]["address"].as_str().unwrap().to_string();

        let listed = ok(&state, "accounts", json!({})).await;
        assert_eq!(listed["accounts"].as_array().unwrap().len(), 1);
        assert_eq!(listed["accounts"][0]["address"], address.as_str());

        let contained = ok(&state, "contains", json!({ "address": address })).await;
        assert_eq!(contained, json!({"isContained": true}));
        let contained = ok(&state, "contains", json!({ "address": ADDRESS })).await;
        assert_eq!(contained, json!({"isContained": false}));
    }

    #[tokio::test]
    async fn test_unlock_and_sign() {
        let state = state();
        ok(
            &state,
            "importRawKey",
            json!({"rawKey": RAW_KEY, "newAccountConfig": {"passphrase": "pw"}}),
        )
        .await;

        let bad = err(
            &state,
            "unlockAndSign",
            json!({"address": ADDRESS, "toSign": "0x00", "passphrase": "nope"}),
        )
        .await;
        assert_eq!(bad.code, -32002);
        assert!(!bad.message.contains("nope"));

        let signed = ok(
            &state,
            "unlockAndSign",
            json!({"address": ADDRESS, "toSign": "0x00", "passphrase": "pw"}),
        )
        .await;
        assert!(signed["sig"].is_string());
        let locked = err(&state, "sign", json!({"address": ADDRESS, "toSign": "0x00"})).await;
        assert_eq!(locked.code, -32003);
    }

    #[tokio::test]
    async fn test_error_codes() {
        let state = state();

        let unknown = err(&state, "sign", json!({"address": ADDRESS, "toSign": "0x00"})).await;
        assert_eq!(unknown.code, -32001);

        let bad_key = err(
            &state,
            "importRawKey",
            json!({"rawKey": "0xzz", "newAccountConfig": {"passphrase": "pw"}}),
        )
        .await;
        assert_eq!(bad_key.code, -32005);

        let bad_config = err(&state, "newAccount", json!({"newAccountConfig": {"pass": "pw"}})).await;
        assert_eq!(bad_config.code, -32004);

        let bad_params = err(&state, "timedUnlock", json!({"address": ADDRESS})).await;
        assert_eq!(bad_params.code, -32602);

        let bad_address = err(&state, "contains", json!({"address": "0x1234"})).await;
        assert_eq!(bad_address.code, -32602);

        let missing = err(&state, "getBalance", Value::Null).await;
        assert_eq!(missing.code, -32601);
    }

    #[tokio::test]
    async fn test_status_open_close() {
        let state = state();
        let status = ok(&state, "status", Value::Null).await;
        assert!(status["status"].as_str().unwrap().starts_with("OK"));

        assert_eq!(ok(&state, "close", Value::Null).await, json!({}));
        assert_eq!(ok(&state, "open", json!({"passphrase": ""})).await, json!({}));
        assert_eq!(ok(&state, "open", json!({})).await, json!({}));
        assert_eq!(ok(&state, "close", json!({})).await, json!({}));
        assert_eq!(ok(&state, "lock", json!({"address": ADDRESS})).await, json!({}));
    }

    #[tokio::test]
    async fn test_lock_ignores_malformed_input() {
        let state = state();
        ok(
            &state,
            "importRawKey",
            json!({"rawKey": RAW_KEY, "newAccountConfig": {"passphrase": "pw"}}),
        )
        .await;
        ok(
            &state,
            "timedUnlock",
            json!({"address": ADDRESS, "password": "pw", "duration": 60_000_000_000i64}),
        )
        .await;

        assert_eq!(ok(&state, "lock", json!({"address": "0x1234"})).await, json!({}));
        assert_eq!(ok(&state, "lock", json!({"address": 7})).await, json!({}));
        assert_eq!(ok(&state, "lock", Value::Null).await, json!({}));

        // The unlocked account was not touched.
        let signed = ok(&state, "sign", json!({"address": ADDRESS, "toSign": "0x00"})).await;
        assert!(signed["sig"].is_string());
    }
}
