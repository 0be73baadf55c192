//! Local JSON-RPC endpoint for exercising the submitters over real HTTP.

use alloy::primitives::keccak256;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// What the endpoint answers for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    RpcError(i64, &'static str),
    Status(u16, &'static str),
    /// Never answer.
    Stall,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub params: Value,
    /// Lower-cased header names.
    pub headers: Vec<(String, String)>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

pub struct MockRpc {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockRpc {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, handler.clone(), log.clone()));
            }
        });

        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn calls(&self, method: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

/// One request per connection; the reply closes it.
async fn serve(stream: TcpStream, handler: Handler, log: Arc<Mutex<Vec<Recorded>>>) {
    let mut reader = BufReader::new(stream);
    let mut headers = Vec::new();
    let mut content_length = 0usize;

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.is_err() {
        return;
    }
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).await.is_err() {
        return;
    }
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let id = request["id"].clone();

    log.lock().push(Recorded {
        method: method.clone(),
        params: params.clone(),
        headers,
    });

    let (status, body) = match handler(method.as_str(), &params) {
        Reply::Result(result) => (
            200,
            json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string(),
        ),
        Reply::RpcError(code, message) => (
            200,
            json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
                .to_string(),
        ),
        Reply::Status(status, text) => (status, text.to_string()),
        Reply::Stall => {
            std::future::pending::<()>().await;
            return;
        }
    };

    let response = format!(
        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Node state behind the methods the signer and submitters call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chain {
    pub head: u64,
    /// Confirmed nonce of every account.
    pub nonce: u64,
    /// Block and status of the one transaction this node knows about.
    pub mined: Option<(u64, bool)>,
}

impl Chain {
    pub fn answer(&self, method: &str, params: &Value) -> Reply {
        match method {
            "eth_chainId" => Reply::Result(quantity(1)),
            "eth_blockNumber" => Reply::Result(quantity(self.head)),
            "eth_getTransactionCount" => Reply::Result(quantity(self.nonce)),
            "eth_estimateGas" => Reply::Result(quantity(100_000)),
            "eth_gasPrice" => Reply::Result(quantity(1_000_000_000)),
            "eth_getTransactionReceipt" => match self.mined {
                Some((block, success)) => Reply::Result(receipt(&params[0], block, success)),
                None => Reply::Result(Value::Null),
            },
            _ => Reply::RpcError(-32601, "method not found"),
        }
    }
}

pub fn quantity(value: u64) -> Value {
    json!(format!("0x{value:x}"))
}

/// Hash a node would report for the raw transaction in `params[0]`.
pub fn raw_tx_hash(params: &Value) -> Value {
    let raw = params[0].as_str().unwrap_or_default().trim_start_matches("0x");
    let bytes = hex::decode(raw).unwrap_or_default();
    json!(format!("0x{}", hex::encode(keccak256(bytes))))
}

/// Minimal legacy receipt for `tx_hash` mined at `block`.
pub fn receipt(tx_hash: &Value, block: u64, success: bool) -> Value {
    json!({
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "11".repeat(32)),
        "blockNumber": format!("0x{block:x}"),
        "from": format!("0x{}", "22".repeat(20)),
        "to": format!("0x{}", "33".repeat(20)),
        "contractAddress": null,
        "gasUsed": "0x5208",
        "cumulativeGasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": if success { "0x1" } else { "0x0" },
        "type": "0x0",
    })
}
