// RPC client for the custody JSON-RPC surface
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::account::{Account, Address};
use crate::error::ErrorKind;
use crate::rpc::types::*;
use crate::signer::Signature;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("RPC request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message} (code {code})")]
    Rpc {
        code: i32,
        message: String,
        kind: Option<ErrorKind>,
    },
    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        let kind = err
            .data
            .as_ref()
            .and_then(|data| data.get("kind"))
            .and_then(|kind| serde_json::from_value(kind.clone()).ok());
        ClientError::Rpc {
            code: err.code,
            message: err.message,
            kind,
        }
    }
}

pub struct RpcClient {
    url: String,
    client: Client,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Send one request and decode its `result`
    pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R, ClientError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let params = serde_json::to_value(params).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(error.into());
        }
        let result = response
            .result
            .ok_or_else(|| ClientError::InvalidResponse(format!("{} returned neither result nor error", method)))?;
        serde_json::from_value(result).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    pub async fn status(&self) -> Result<String, ClientError> {
        let res: StatusResult = self.call("status", Value::Null).await?;
        Ok(res.status)
    }

    pub async fn open(&self, passphrase: &str) -> Result<(), ClientError> {
        let params = OpenParams {
            passphrase: passphrase.to_string(),
        };
        let _: Value = self.call("open", params).await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        let _: Value = self.call("close", json!({})).await?;
        Ok(())
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, ClientError> {
        let res: AccountsResult = self.call("accounts", json!({})).await?;
        Ok(res.accounts)
    }

    pub async fn contains(&self, address: &Address) -> Result<bool, ClientError> {
        let res: ContainsResult = self.call("contains", AddressParams { address: *address }).await?;
        Ok(res.is_contained)
    }

    pub async fn sign(&self, address: &Address, to_sign: &[u8]) -> Result<Signature, ClientError> {
        let params = SignParams {
            address: *address,
            to_sign: to_sign.to_vec(),
        };
        let res: SignatureResult = self.call("sign", params).await?;
        Ok(res.sig)
    }

    pub async fn unlock_and_sign(
        &self,
        address: &Address,
        to_sign: &[u8],
        passphrase: &str,
    ) -> Result<Signature, ClientError> {
        let params = UnlockAndSignParams {
            address: *address,
            to_sign: to_sign.to_vec(),
            passphrase: passphrase.to_string(),
        };
        let res: SignatureResult = self.call("unlockAndSign", params).await?;
        Ok(res.sig)
    }

    /// `duration` in nanoseconds
    pub async fn timed_unlock(&self, address: &Address, password: &str, duration: i64) -> Result<(), ClientError> {
        let params = TimedUnlockParams {
            address: *address,
            password: password.to_string(),
            duration,
        };
        let _: Value = self.call("timedUnlock", params).await?;
        Ok(())
    }

    pub async fn lock(&self, address: &Address) -> Result<(), ClientError> {
        let _: Value = self.call("lock", AddressParams { address: *address }).await?;
        Ok(())
    }

    pub async fn new_account(&self, config: &Value) -> Result<Account, ClientError> {
        let params = NewAccountParams {
            new_account_config: ConfigBlob::from_json(config),
        };
        let res: AccountResult = self.call("newAccount", params).await?;
        Ok(res.account)
    }

    pub async fn import_raw_key(&self, raw_key: &str, config: &Value) -> Result<Account, ClientError> {
        let params = ImportRawKeyParams {
            raw_key: raw_key.to_string(),
            new_account_config: ConfigBlob::from_json(config),
        };
        let res: AccountResult = self.call("importRawKey", params).await?;
        Ok(res.account)
    }
}
