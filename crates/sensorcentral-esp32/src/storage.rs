//! NVS (Non-Volatile Storage) backed durable region.
//!
//! The whole region is kept as one blob. Reads and writes go to an in-memory
//! copy; `commit` stores the copy back to flash.

use crate::describe;
use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::info;
use sensorcentral_core::config::REGION_LEN;
use sensorcentral_core::{DurableRegion, StorageError};

const NAMESPACE: &str = "sensorcentral";
const REGION_KEY: &str = "region";

pub struct NvsRegion {
    nvs: EspNvs<NvsDefault>,
    bytes: Vec<u8>,
}

impl NvsRegion {
    /// Load the stored blob. A missing or short blob reads as erased flash.
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        let mut bytes = vec![0xFF; REGION_LEN];
        let mut buffer = vec![0_u8; REGION_LEN];
        match nvs.get_raw(REGION_KEY, &mut buffer)? {
            Some(stored) => {
                let len = stored.len().min(REGION_LEN);
                bytes[..len].copy_from_slice(&stored[..len]);
            }
            None => info!("No stored settings in NVS, starting from erased region"),
        }
        Ok(Self { nvs, bytes })
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

impl DurableRegion for NvsRegion {
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
        self.nvs
            .set_raw(REGION_KEY, &self.bytes)
            .map(|_| ())
            .map_err(|e| StorageError::WriteError(describe(e)))
    }
}
