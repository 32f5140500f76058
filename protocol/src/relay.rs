use crate::kasa::{decode_frame, encode_frame, frame_len, Command, Realtime, SysInfo, KASA_PORT};
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A Kasa smart plug reachable over TCP.
#[derive(Debug, Clone)]
pub struct KasaPlug {
    host: String,
    port: u16,
    timeout: Duration,
}

impl KasaPlug {
    pub fn new(host: &str) -> Self {
        Self::with_port(host, KASA_PORT)
    }

    pub fn with_port(host: &str, port: u16) -> Self {
        KasaPlug {
            host: host.to_owned(),
            port,
            timeout: IO_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn request(&self, cmd: Command) -> Result<Value> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .with_context(|| format!("cannot resolve {}", self.addr()))?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .with_context(|| format!("connect {}", self.addr()))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let out_bytes = encode_frame(&serde_json::to_vec(&cmd.to_json())?)?;
        stream.write_all(&out_bytes)?;

        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let len = frame_len(header)?;
        let mut frame = header.to_vec();
        frame.resize(4 + len, 0);
        stream.read_exact(&mut frame[4..])?;

        let response: Value = serde_json::from_slice(&decode_frame(&frame)?)?;
        tracing::trace!(plug = %self.addr(), ?cmd, %response, "plug response");
        cmd.response_section(&response)
    }

    pub fn set_relay(&self, on: bool) -> Result<()> {
        self.request(Command::SetRelayState(on))?;
        Ok(())
    }

    pub fn sysinfo(&self) -> Result<SysInfo> {
        Ok(serde_json::from_value(self.request(Command::GetSysinfo)?)?)
    }

    pub fn realtime(&self) -> Result<Realtime> {
        Ok(serde_json::from_value(self.request(Command::GetRealtime)?)?)
    }
}

pub fn set_relay(host: &str, on: bool) -> Result<()> {
    KasaPlug::new(host).set_relay(on)
}
