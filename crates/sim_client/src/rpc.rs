//! msgpack-rpc transport
//!
//! Frames:
//! - request  `[0, msgid, method, params]`
//! - response `[1, msgid, error, result]`
//!
//! Structs travel map-encoded (field names on the wire), so requests are
//! encoded with `rmp_serde::to_vec_named`.

use std::io::{Cursor, ErrorKind};

use rmpv::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, SimError};

const REQUEST: u8 = 0;
const RESPONSE: u64 = 1;
const READ_CHUNK: usize = 64 * 1024;

/// Params of a call without arguments (msgpack-rpc wants `[]`, never nil)
pub const NO_PARAMS: [(); 0] = [];

/// One open msgpack-rpc connection
pub struct RpcConnection {
    stream: TcpStream,
    /// Bytes received but not yet consumed by a complete frame
    buffer: Vec<u8>,
}

impl RpcConnection {
    pub async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
        })
    }

    /// Issue one call and wait for its result
    pub async fn call<P, T>(&mut self, id: u32, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let frame = rmp_serde::to_vec_named(&(REQUEST, id, method, params))
            .map_err(|e| SimError::encode(method, e))?;
        self.stream.write_all(&frame).await?;

        let response = self.read_value(method).await?;
        let result = parse_response(method, id, response)?;
        rmpv::ext::from_value(result).map_err(|e| SimError::decode(method, e))
    }

    /// Read until one complete msgpack value is buffered
    async fn read_value(&mut self, method: &str) -> Result<Value> {
        loop {
            if !self.buffer.is_empty() {
                let mut cursor = Cursor::new(self.buffer.as_slice());
                match rmpv::decode::read_value(&mut cursor) {
                    Ok(value) => {
                        let consumed = cursor.position() as usize;
                        self.buffer.drain(..consumed);
                        return Ok(value);
                    }
                    Err(e) if is_incomplete(&e) => {}
                    Err(e) => return Err(SimError::Protocol(e.to_string())),
                }
            }

            let mut chunk = vec![0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SimError::ConnectionClosed {
                    method: method.to_string(),
                });
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io) => {
            io.kind() == ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

/// Validate a response frame and extract its result value
fn parse_response(method: &str, id: u32, value: Value) -> Result<Value> {
    let Value::Array(items) = value else {
        return Err(SimError::Protocol(format!(
            "'{method}' response is not an array"
        )));
    };
    let [kind, msgid, error, result]: [Value; 4] = items.try_into().map_err(|items: Vec<Value>| {
        SimError::Protocol(format!(
            "'{method}' response has {} elements, expected 4",
            items.len()
        ))
    })?;

    if kind.as_u64() != Some(RESPONSE) {
        return Err(SimError::Protocol(format!(
            "'{method}' reply has message type {kind}, expected {RESPONSE}"
        )));
    }
    if msgid.as_u64() != Some(u64::from(id)) {
        return Err(SimError::Protocol(format!(
            "'{method}' reply id {msgid} does not match request id {id}"
        )));
    }
    if !error.is_nil() {
        let message = match error.as_str() {
            Some(s) => s.to_string(),
            None => error.to_string(),
        };
        return Err(SimError::rpc(method, message));
    }
    Ok(result)
}
