//! Configuration records and their durable storage.
//!
//! Two records are persisted into a small fixed-size durable region, keyed
//! by byte offset:
//! - [`Configuration`] at offset 0
//! - [`NetworkCredentials`] immediately after it
//!
//! Each record starts with a version tag. A tag mismatch means the stored
//! bytes are never trusted: the record is reset to compiled defaults and
//! rewritten. Storage backends implement [`DurableRegion`]:
//! - Linux simulator: a file mirrored into memory
//! - ESP32: a single NVS blob

use crate::model::truncate_utf8;
use thiserror::Error;
use tracing::{info, warn};

/// Current schema version of the configuration record.
pub const CONFIGURATION_VERSION: u8 = 4;

/// Current schema version of the credentials record.
pub const CREDENTIALS_VERSION: u8 = 1;

pub const DEFAULT_PRINT_INTERVAL_MS: u32 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10_000;
pub const DEFAULT_POST_INTERVAL_MS: u32 = 120_000;

// Field widths in the persisted layout, terminator included.
const ENDPOINT_FIELD: usize = 64;
const TOKEN_FIELD: usize = 650;
const SENSOR_TYPE_FIELD: usize = 36;
const SSID_FIELD: usize = 32;
const PASSWORD_FIELD: usize = 20;

pub const MAX_ENDPOINT_LEN: usize = ENDPOINT_FIELD - 1;
pub const MAX_TOKEN_LEN: usize = TOKEN_FIELD - 1;
pub const MAX_SENSOR_TYPE_LEN: usize = SENSOR_TYPE_FIELD - 1;
pub const MAX_SSID_LEN: usize = SSID_FIELD - 1;
pub const MAX_PASSWORD_LEN: usize = PASSWORD_FIELD - 1;

/// Encoded size of a [`Configuration`] record.
pub const CONFIGURATION_RECORD_LEN: usize = 1 + ENDPOINT_FIELD + TOKEN_FIELD + SENSOR_TYPE_FIELD + 3 * 4;

/// Encoded size of a [`NetworkCredentials`] record.
pub const CREDENTIALS_RECORD_LEN: usize = 1 + SSID_FIELD + PASSWORD_FIELD + 1;

/// Byte offset of the credentials record.
pub const CREDENTIALS_OFFSET: usize = CONFIGURATION_RECORD_LEN;

/// Total size of the durable region, with a few spare bytes.
pub const REGION_LEN: usize = CONFIGURATION_RECORD_LEN + CREDENTIALS_RECORD_LEN + 10;

/// Errors raised by a durable region.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Access outside the region.
    #[error("Access out of bounds: offset {offset}, length {len}, region {region}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region: usize,
    },

    /// Failed to read the backing medium.
    #[error("Read error: {0}")]
    ReadError(String),

    /// Failed to write or commit the backing medium.
    #[error("Write error: {0}")]
    WriteError(String),
}

/// Fixed-size, byte-addressed durable storage.
///
/// Writes are buffered until [`commit`](DurableRegion::commit).
pub trait DurableRegion {
    /// Fill `buf` with bytes starting at `offset`.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Stage `bytes` at `offset`.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError>;

    /// Flush staged writes to the medium.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// In-memory region. Erased state is `0xFF`, like fresh flash.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    bytes: Vec<u8>,
    commits: usize,
}

impl MemoryRegion {
    pub fn new() -> Self {
        Self::with_len(REGION_LEN)
    }

    pub fn with_len(len: usize) -> Self {
        Self {
            bytes: vec![0xFF; len],
            commits: 0,
        }
    }

    /// Wrap existing contents, padding or cutting them to [`REGION_LEN`].
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.resize(REGION_LEN, 0xFF);
        Self { bytes, commits: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of commits performed so far.
    pub fn commits(&self) -> usize {
        self.commits
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), StorageError> {
        if offset.checked_add(len).map_or(true, |end| end > self.bytes.len()) {
            return Err(StorageError::OutOfBounds {
                offset,
                len,
                region: self.bytes.len(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableRegion for MemoryRegion {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check(offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        self.check(offset, bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.commits += 1;
        Ok(())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Operational settings of the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub version: u8,
    /// Telemetry endpoint; empty disables posting.
    pub endpoint: String,
    /// Bearer token; empty omits the `Authorization` header.
    pub token: String,
    /// Sensor backend selector (`DS18B20`, `DHT22`, `BINARY`).
    pub sensor_type: String,
    pub print_interval_ms: u32,
    pub poll_interval_ms: u32,
    pub post_interval_ms: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: CONFIGURATION_VERSION,
            endpoint: String::new(),
            token: String::new(),
            sensor_type: String::new(),
            print_interval_ms: DEFAULT_PRINT_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            post_interval_ms: DEFAULT_POST_INTERVAL_MS,
        }
    }
}

impl Configuration {
    pub fn has_endpoint(&self) -> bool {
        !self.endpoint.is_empty()
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    fn encode(&self) -> [u8; CONFIGURATION_RECORD_LEN] {
        let mut out = [0u8; CONFIGURATION_RECORD_LEN];
        let mut w = FieldWriter::new(&mut out);
        w.put_u8(self.version);
        w.put_str(&self.endpoint, ENDPOINT_FIELD);
        w.put_str(&self.token, TOKEN_FIELD);
        w.put_str(&self.sensor_type, SENSOR_TYPE_FIELD);
        w.put_u32(self.print_interval_ms);
        w.put_u32(self.poll_interval_ms);
        w.put_u32(self.post_interval_ms);
        out
    }

    fn decode(bytes: &[u8; CONFIGURATION_RECORD_LEN]) -> Option<Self> {
        let mut r = FieldReader::new(bytes);
        let version = r.u8();
        if version != CONFIGURATION_VERSION {
            return None;
        }
        Some(Self {
            version,
            endpoint: r.str(ENDPOINT_FIELD)?,
            token: r.str(TOKEN_FIELD)?,
            sensor_type: r.str(SENSOR_TYPE_FIELD)?,
            print_interval_ms: r.u32(),
            poll_interval_ms: r.u32(),
            post_interval_ms: r.u32(),
        })
    }
}

/// Upstream network credentials, used by the station transport only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    pub version: u8,
    pub network_name: String,
    pub network_password: String,
    /// Keep the local access point up past the boot window.
    pub keep_access_point_on: bool,
}

impl Default for NetworkCredentials {
    fn default() -> Self {
        Self {
            version: CREDENTIALS_VERSION,
            network_name: String::new(),
            network_password: String::new(),
            keep_access_point_on: false,
        }
    }
}

impl NetworkCredentials {
    pub fn new(network_name: &str, network_password: &str, keep_access_point_on: bool) -> Self {
        Self {
            version: CREDENTIALS_VERSION,
            network_name: truncate_utf8(network_name, MAX_SSID_LEN).to_string(),
            network_password: truncate_utf8(network_password, MAX_PASSWORD_LEN).to_string(),
            keep_access_point_on,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.network_name.is_empty()
    }

    fn encode(&self) -> [u8; CREDENTIALS_RECORD_LEN] {
        let mut out = [0u8; CREDENTIALS_RECORD_LEN];
        let mut w = FieldWriter::new(&mut out);
        w.put_u8(self.version);
        w.put_str(&self.network_name, SSID_FIELD);
        w.put_str(&self.network_password, PASSWORD_FIELD);
        w.put_u8(u8::from(self.keep_access_point_on));
        out
    }

    fn decode(bytes: &[u8; CREDENTIALS_RECORD_LEN]) -> Option<Self> {
        let mut r = FieldReader::new(bytes);
        let version = r.u8();
        if version != CREDENTIALS_VERSION {
            return None;
        }
        Some(Self {
            version,
            network_name: r.str(SSID_FIELD)?,
            network_password: r.str(PASSWORD_FIELD)?,
            keep_access_point_on: r.u8() == 1,
        })
    }
}

// ============================================================================
// Partial updates
// ============================================================================

/// Fields submitted through the sensor/device settings form.
///
/// Only present, non-empty (and for intervals, non-zero) fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationUpdate {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub sensor_type: Option<String>,
    pub print_interval_ms: Option<u32>,
    pub poll_interval_ms: Option<u32>,
    pub post_interval_ms: Option<u32>,
}

impl ConfigurationUpdate {
    /// Apply the update. Returns `true` if at least one field was accepted.
    pub fn apply_to(&self, config: &mut Configuration) -> bool {
        let mut updated = false;

        for (value, target) in [
            (self.print_interval_ms, &mut config.print_interval_ms),
            (self.poll_interval_ms, &mut config.poll_interval_ms),
            (self.post_interval_ms, &mut config.post_interval_ms),
        ] {
            if let Some(ms) = value.filter(|ms| *ms != 0) {
                *target = ms;
                updated = true;
            }
        }

        for (value, target, max) in [
            (&self.endpoint, &mut config.endpoint, MAX_ENDPOINT_LEN),
            (&self.token, &mut config.token, MAX_TOKEN_LEN),
            (&self.sensor_type, &mut config.sensor_type, MAX_SENSOR_TYPE_LEN),
        ] {
            if let Some(text) = value.as_deref().filter(|t| !t.is_empty()) {
                *target = truncate_utf8(text, max).to_string();
                updated = true;
            }
        }

        updated
    }
}

// ============================================================================
// Store
// ============================================================================

/// Loads and saves both records over a [`DurableRegion`].
pub struct ConfigStore<R: DurableRegion> {
    region: R,
}

impl<R: DurableRegion> ConfigStore<R> {
    pub fn new(region: R) -> Self {
        Self { region }
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn into_region(self) -> R {
        self.region
    }

    /// Load the configuration, resetting both records on a version mismatch.
    ///
    /// Never fails: unreadable or corrupt storage yields compiled defaults.
    pub fn load_configuration(&mut self) -> Configuration {
        let mut bytes = [0u8; CONFIGURATION_RECORD_LEN];
        let decoded = match self.region.read(0, &mut bytes) {
            Ok(()) => Configuration::decode(&bytes),
            Err(e) => {
                warn!("Failed to read configuration: {}", e);
                None
            }
        };

        match decoded {
            Some(config) => config,
            None => {
                info!("Setting standard configuration");
                let config = Configuration::default();
                let credentials = NetworkCredentials::default();
                if let Err(e) = self.write_both(&config, &credentials) {
                    warn!("Failed to rewrite default configuration: {}", e);
                }
                config
            }
        }
    }

    /// Load the credentials, resetting them on a version mismatch.
    pub fn load_credentials(&mut self) -> NetworkCredentials {
        let mut bytes = [0u8; CREDENTIALS_RECORD_LEN];
        let decoded = match self.region.read(CREDENTIALS_OFFSET, &mut bytes) {
            Ok(()) => NetworkCredentials::decode(&bytes),
            Err(e) => {
                warn!("Failed to read network credentials: {}", e);
                None
            }
        };

        match decoded {
            Some(credentials) => credentials,
            None => {
                info!("Setting standard network credentials");
                let credentials = NetworkCredentials::default();
                if let Err(e) = self.save_credentials(&credentials) {
                    warn!("Failed to rewrite default network credentials: {}", e);
                }
                credentials
            }
        }
    }

    /// Persist the configuration and commit.
    pub fn save_configuration(&mut self, config: &Configuration) -> Result<(), StorageError> {
        self.region.write(0, &config.encode())?;
        self.region.commit()
    }

    /// Persist the credentials and commit.
    pub fn save_credentials(&mut self, credentials: &NetworkCredentials) -> Result<(), StorageError> {
        self.region.write(CREDENTIALS_OFFSET, &credentials.encode())?;
        self.region.commit()
    }

    fn write_both(
        &mut self,
        config: &Configuration,
        credentials: &NetworkCredentials,
    ) -> Result<(), StorageError> {
        self.region.write(0, &config.encode())?;
        self.region.write(CREDENTIALS_OFFSET, &credentials.encode())?;
        self.region.commit()
    }
}

// ============================================================================
// Layout helpers
// ============================================================================

struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf[self.pos] = value;
        self.pos += 1;
    }

    fn put_u32(&mut self, value: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    /// NUL-terminated string in a fixed-width field.
    fn put_str(&mut self, value: &str, width: usize) {
        let text = truncate_utf8(value, width - 1).as_bytes();
        let field = &mut self.buf[self.pos..self.pos + width];
        field.fill(0);
        field[..text.len()].copy_from_slice(text);
        self.pos += width;
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let value = self.buf[self.pos];
        self.pos += 1;
        value
    }

    fn u32(&mut self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(raw)
    }

    /// `None` when the field has no terminator or is not UTF-8.
    fn str(&mut self, width: usize) -> Option<String> {
        let field = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        let end = field.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&field[..end]).ok().map(String::from)
    }
}
