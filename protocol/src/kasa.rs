use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const KASA_PORT: u16 = 9999;

const INITIAL_KEY: u8 = 171;
const LEN_SZ: usize = 4;
pub const MAX_FRAME_SIZE: usize = 65536;

/// XOR autokey cipher: every plain byte becomes the key for the next one.
pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&b| {
            key ^= b;
            key
        })
        .collect()
}

pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&c| {
            let b = key ^ c;
            key = c;
            b
        })
        .collect()
}

/// Length-prefixed encrypted frame as sent over TCP.
pub fn encode_frame(plain: &[u8]) -> Result<Vec<u8>> {
    if plain.len() > MAX_FRAME_SIZE {
        bail!("message too large: {}", plain.len());
    }
    let mut frame = Vec::with_capacity(LEN_SZ + plain.len());
    frame.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    frame.extend(encrypt(plain));
    Ok(frame)
}

/// Payload length announced by a frame header.
pub fn frame_len(header: [u8; LEN_SZ]) -> Result<usize> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        bail!("frame too large: {}", len);
    }
    Ok(len)
}

pub fn decode_frame(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() < LEN_SZ {
        bail!("too short frame, len: {}", buf.len());
    }
    let len = frame_len([buf[0], buf[1], buf[2], buf[3]])?;
    if buf.len() - LEN_SZ != len {
        bail!("wrong frame size: header {} body {}", len, buf.len() - LEN_SZ);
    }
    Ok(decrypt(&buf[LEN_SZ..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetRelayState(bool),
    GetSysinfo,
    GetRealtime,
}

impl Command {
    pub fn to_json(self) -> Value {
        match self {
            Command::SetRelayState(on) => {
                let state = u8::from(on);
                json!({"system": {"set_relay_state": {"state": state}}})
            }
            Command::GetSysinfo => json!({"system": {"get_sysinfo": {}}}),
            Command::GetRealtime => json!({"emeter": {"get_realtime": {}}}),
        }
    }

    fn path(self) -> (&'static str, &'static str) {
        match self {
            Command::SetRelayState(_) => ("system", "set_relay_state"),
            Command::GetSysinfo => ("system", "get_sysinfo"),
            Command::GetRealtime => ("emeter", "get_realtime"),
        }
    }

    /// Picks this command's section out of a response and checks `err_code`.
    pub fn response_section(self, response: &Value) -> Result<Value> {
        let (module, method) = self.path();
        let Some(section) = response.get(module).and_then(|m| m.get(method)) else {
            bail!("response without {}.{}: {}", module, method, response);
        };
        match section.get("err_code").and_then(Value::as_i64) {
            Some(0) | None => Ok(section.clone()),
            Some(code) => {
                let msg = section.get("err_msg").and_then(Value::as_str).unwrap_or("");
                bail!("{}.{} failed: {} {}", module, method, code, msg)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub relay_state: u8,
    #[serde(default)]
    pub on_time: u64,
}

impl SysInfo {
    pub fn is_on(&self) -> bool {
        self.relay_state != 0
    }
}

/// Energy meter reading. Hardware v1 reports W/kWh, v2 mW/Wh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Realtime {
    pub power_mw: Option<f64>,
    pub total_wh: Option<f64>,
    pub power: Option<f64>,
    pub total: Option<f64>,
}

impl Realtime {
    pub fn watts(&self) -> f64 {
        self.power_mw
            .map(|mw| mw / 1000.0)
            .or(self.power)
            .unwrap_or_default()
    }

    pub fn watt_hours(&self) -> f64 {
        self.total_wh
            .or(self.total.map(|kwh| kwh * 1000.0))
            .unwrap_or_default()
    }
}
