use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

#[derive(Serialize)]
struct JsonRpcResponse<'a> {
	jsonrpc: &'a str,
	id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	result: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<JsonRpcErrorBody>,
}

#[derive(Serialize)]
struct JsonRpcErrorBody {
	code: i32,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct JsonRpcNotification<'a> {
	jsonrpc: &'a str,
	method: &'a str,
	params: serde_json::Value,
}

/// Newline-delimited JSON-RPC writer. One message per line; each line is
/// written and flushed under a lock so responses and notifications never
/// interleave.
pub struct NdjsonTransport {
	out: Mutex<Box<dyn Write + Send>>,
}

impl Default for NdjsonTransport {
	fn default() -> Self {
		Self::stdout()
	}
}

impl NdjsonTransport {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}

	pub fn new(writer: impl Write + Send + 'static) -> Self {
		Self {
			out: Mutex::new(Box::new(writer)),
		}
	}

	pub fn write_response(&self, id: u64, result: serde_json::Value) {
		self.write_line(&JsonRpcResponse {
			jsonrpc: "2.0",
			id,
			result: Some(result),
			error: None,
		});
	}

	pub fn write_error(
		&self,
		id: u64,
		code: i32,
		message: impl Into<String>,
		data: Option<serde_json::Value>,
	) {
		self.write_line(&JsonRpcResponse {
			jsonrpc: "2.0",
			id,
			result: None,
			error: Some(JsonRpcErrorBody {
				code,
				message: message.into(),
				data,
			}),
		});
	}

	pub fn write_notification(&self, method: &str, params: serde_json::Value) {
		self.write_line(&JsonRpcNotification {
			jsonrpc: "2.0",
			method,
			params,
		});
	}

	fn write_line(&self, value: &impl Serialize) {
		let mut line = match serde_json::to_vec(value) {
			Ok(line) => line,
			Err(e) => {
				tracing::error!("Failed to serialize: {}", e);
				return;
			}
		};
		line.push(b'\n');

		let Ok(mut out) = self.out.lock() else {
			tracing::error!("Transport writer poisoned");
			return;
		};
		if let Err(e) = out.write_all(&line).and_then(|_| out.flush()) {
			tracing::error!("Failed to write message: {}", e);
		}
	}
}

#[cfg(test)]
pub(crate) mod testing {
	use std::io::{self, Write};
	use std::sync::{Arc, Mutex};

	/// Cloneable in-memory sink for inspecting what the transport wrote.
	#[derive(Clone, Default)]
	pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

	impl SharedBuffer {
		pub fn lines(&self) -> Vec<serde_json::Value> {
			let bytes = self.0.lock().unwrap().clone();
			String::from_utf8(bytes)
				.unwrap()
				.lines()
				.map(|l| serde_json::from_str(l).unwrap())
				.collect()
		}
	}

	impl Write for SharedBuffer {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::testing::SharedBuffer;
	use super::*;
	use serde_json::json;

	#[test]
	fn writes_one_message_per_line() {
		let buf = SharedBuffer::default();
		let transport = NdjsonTransport::new(buf.clone());
		transport.write_response(1, json!({"years": ["2024"]}));
		transport.write_error(2, -32000, "boom", Some(json!({"contentCode": "X"})));
		transport.write_notification("auth/sessionChanged", json!({"signedIn": false}));

		let lines = buf.lines();
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0], json!({"jsonrpc": "2.0", "id": 1, "result": {"years": ["2024"]}}));
		assert_eq!(lines[1]["error"]["code"], -32000);
		assert_eq!(lines[1]["error"]["data"]["contentCode"], "X");
		assert!(lines[1].get("result").is_none());
		assert!(lines[2].get("id").is_none());
		assert_eq!(lines[2]["method"], "auth/sessionChanged");
	}
}
