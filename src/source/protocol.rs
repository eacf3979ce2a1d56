// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/source/protocol.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the JSON-RPC messages of the getblocktemplate protocol:
// template requests (plain and long-poll), block submission and block
// proposals, and decoding of the provider's reply envelope.
//
// Tree Location:
// - src/source/protocol.rs (getblocktemplate JSON-RPC messages)
// - Depends on: serde, serde_json

use crate::source::error::SourceError;
use log::{debug, error};
use serde::Deserialize;
use serde_json::{json, Value};

const LOG_TARGET: &str = "graxil::source::protocol";

/// Capabilities advertised with every template request.
pub const CAPABILITIES: [&str; 4] = ["longpoll", "coinbasetxn", "coinbasevalue", "workid"];
/// Softfork rules the miner understands.
pub const RULES: [&str; 1] = ["segwit"];
/// Sent as `X-Mining-Extensions`.
pub const MINING_EXTENSIONS: &str = "hostlist midstate rollntime";

/// JSON-RPC reply envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Constructs and decodes getblocktemplate protocol messages
pub struct GbtProtocol;

impl GbtProtocol {
    /// Template request, optionally the blocking long-poll variant.
    pub fn create_template_request(long_poll_id: Option<&str>) -> Value {
        let mut param = json!({
            "capabilities": CAPABILITIES,
            "rules": RULES,
        });
        if let Some(id) = long_poll_id {
            param["longpollid"] = json!(id);
        }
        Self::envelope("getblocktemplate", json!([param]))
    }

    /// `submitblock` with the hex block and the template's workid, if any.
    pub fn create_submit_request(block_hex: &str, work_id: Option<&str>) -> Value {
        let params = match work_id {
            Some(work_id) => json!([block_hex, { "workid": work_id }]),
            None => json!([block_hex]),
        };
        Self::envelope("submitblock", params)
    }

    /// Proposal: ask the provider to validate a block without committing it.
    pub fn create_proposal_request(block_hex: &str, work_id: Option<&str>) -> Value {
        let mut param = json!({
            "mode": "proposal",
            "data": block_hex,
        });
        if let Some(work_id) = work_id {
            param["workid"] = json!(work_id);
        }
        Self::envelope("getblocktemplate", json!([param]))
    }

    fn envelope(method: &str, params: Value) -> Value {
        json!({
            "method": method,
            "id": "json",
            "params": params,
        })
    }

    /// Serialize a request body
    pub fn to_body(request: &Value) -> Vec<u8> {
        debug!(target: LOG_TARGET, "Serialized request: {}", request["method"]);
        request.to_string().into_bytes()
    }

    /// Decode a reply body, surfacing a JSON-RPC error object as [`SourceError::Rpc`].
    pub fn parse_response(body: &[u8]) -> Result<Value, SourceError> {
        let response: RpcResponse = serde_json::from_slice(body)?;
        if let Some(err) = response.error {
            error!(target: LOG_TARGET, "Server error {}: {}", err.code, err.message);
            return Err(SourceError::Rpc(err.message));
        }
        Ok(response.result)
    }

    /// Interpret a `submitblock`/proposal result: null means accepted,
    /// anything else is the rejection reason.
    pub fn rejection_reason(result: &Value) -> Option<String> {
        match result {
            Value::Null => None,
            Value::String(reason) => Some(reason.clone()),
            Value::Bool(true) => None,
            other => Some(other.to_string()),
        }
    }
}


// Changelog:
// - v2.0.0 (2025-07-05): Replaced Stratum login/submit with getblocktemplate.
//   - Template, long-poll, submitblock and proposal requests.
//   - Reply decoding with JSON-RPC error objects mapped to SourceError::Rpc.
// - v1.0.2 (2025-06-23): Fixed algo field format for pool compatibility.
// - v1.0.1 (2025-06-19): Updated for SHA-256 share submission compatibility.
