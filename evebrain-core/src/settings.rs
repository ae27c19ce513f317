//! Persistent settings
//!
//! The settings record is stored at a fixed offset as
//! `[MAGIC_1, MAGIC_2, SETTINGS_VERSION, postcard(Settings)]`. A record with
//! the wrong magic or version, one that fails to decode, or one whose
//! values are out of range is treated as absent: factory defaults are
//! loaded and written back immediately.

use evebrain_hal::{NetworkConfig, NvStorage};
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// First magic byte of a settings record
pub const MAGIC_1: u8 = 0xEB;
/// Second magic byte of a settings record
pub const MAGIC_2: u8 = 0x42;
/// Current record layout version
pub const SETTINGS_VERSION: u8 = 3;
/// Byte offset of the record in non-volatile storage
pub const SETTINGS_OFFSET: usize = 0;
/// Bytes reserved for the record including the header
pub const SETTINGS_REGION_SIZE: usize = 512;

const HEADER_LEN: usize = 3;

/// Slack calibration must stay below this
pub const MAX_SLACK_CALIBRATION: u16 = 100;
/// Move/turn calibration exclusive lower bound
pub const MIN_CALIBRATION: f32 = 0.5;
/// Move/turn calibration exclusive upper bound
pub const MAX_CALIBRATION: f32 = 1.5;

pub const DEFAULT_SLACK_CALIBRATION: u16 = 14;
pub const DEFAULT_WHEEL_DIAMETER_MM: f32 = 48.0;
pub const DEFAULT_WHEEL_DISTANCE_MM: f32 = 126.0;

pub const SSID_LEN: usize = 32;
pub const PASS_LEN: usize = 64;
pub const HOST_LEN: usize = 64;

/// Persisted robot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub schema_version: u8,
    pub slack_calibration: u16,
    pub move_calibration: f32,
    pub turn_calibration: f32,
    pub wheel_diameter_mm: f32,
    pub wheel_distance_mm: f32,

    pub sta_ssid: String<SSID_LEN>,
    pub sta_pass: String<PASS_LEN>,
    pub sta_dhcp: bool,
    pub sta_fixed_ip: [u8; 4],
    pub sta_fixed_gateway: [u8; 4],
    pub sta_fixed_netmask: [u8; 4],
    pub sta_fixed_dns1: [u8; 4],
    pub sta_fixed_dns2: [u8; 4],
    pub ap_ssid: String<SSID_LEN>,
    pub ap_pass: String<PASS_LEN>,
    pub discovery: bool,

    /// Non-zero enables periodic status posting
    pub post_mode: u8,
    pub post_temp_humidity: bool,
    pub post_distance: bool,
    pub host_server: String<HOST_LEN>,
    pub server_request_time_s: u16,
}

impl Settings {
    /// Factory defaults
    pub fn defaults(ap_name: &str) -> Self {
        let mut ap_ssid = String::new();
        for c in ap_name.chars() {
            if ap_ssid.push(c).is_err() {
                break;
            }
        }
        Self {
            schema_version: SETTINGS_VERSION,
            slack_calibration: DEFAULT_SLACK_CALIBRATION,
            move_calibration: 1.0,
            turn_calibration: 1.0,
            wheel_diameter_mm: DEFAULT_WHEEL_DIAMETER_MM,
            wheel_distance_mm: DEFAULT_WHEEL_DISTANCE_MM,
            sta_ssid: String::new(),
            sta_pass: String::new(),
            sta_dhcp: true,
            sta_fixed_ip: [0; 4],
            sta_fixed_gateway: [0; 4],
            sta_fixed_netmask: [255, 255, 255, 0],
            sta_fixed_dns1: [0; 4],
            sta_fixed_dns2: [0; 4],
            ap_ssid,
            ap_pass: String::new(),
            discovery: true,
            post_mode: 0,
            post_temp_humidity: false,
            post_distance: false,
            host_server: String::new(),
            server_request_time_s: 0,
        }
    }

    /// Range checks applied to stored records
    pub fn is_valid(&self) -> bool {
        self.schema_version == SETTINGS_VERSION
            && self.slack_calibration < MAX_SLACK_CALIBRATION
            && calibration_in_range(self.move_calibration)
            && calibration_in_range(self.turn_calibration)
            && self.wheel_diameter_mm > 0.0
            && self.wheel_distance_mm > 0.0
    }

    /// View of the network fields for the network collaborator
    pub fn network_config(&self) -> NetworkConfig<'_> {
        NetworkConfig {
            sta_ssid: &self.sta_ssid,
            sta_pass: &self.sta_pass,
            sta_dhcp: self.sta_dhcp,
            sta_fixed_ip: self.sta_fixed_ip,
            sta_fixed_gateway: self.sta_fixed_gateway,
            sta_fixed_netmask: self.sta_fixed_netmask,
            sta_fixed_dns1: self.sta_fixed_dns1,
            sta_fixed_dns2: self.sta_fixed_dns2,
            ap_ssid: &self.ap_ssid,
            ap_pass: &self.ap_pass,
            discovery: self.discovery,
        }
    }
}

/// Whether a move/turn calibration factor is acceptable
pub fn calibration_in_range(value: f32) -> bool {
    value > MIN_CALIBRATION && value < MAX_CALIBRATION
}

/// Settings persistence over a byte-addressable store
pub struct SettingsStore<S: NvStorage> {
    storage: S,
}

impl<S: NvStorage> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load settings, falling back to (and persisting) defaults
    ///
    /// `reset_requested` forces defaults even when the stored record is
    /// valid.
    pub fn load(&mut self, reset_requested: bool, default_ap_name: &str) -> Settings {
        if reset_requested {
            log_info!("Settings reset requested at boot");
        } else {
            match self.read_record() {
                Ok(Some(settings)) => {
                    log_info!(
                        "Loaded settings: slack {}, move cal {}, turn cal {}",
                        settings.slack_calibration,
                        settings.move_calibration,
                        settings.turn_calibration
                    );
                    return settings;
                }
                Ok(None) => {
                    log_warn!("No valid settings record, restoring defaults");
                }
                Err(e) => {
                    log_warn!("Failed to read settings: {:?}", e);
                }
            }
        }

        let settings = Settings::defaults(default_ap_name);
        if let Err(e) = self.save(&settings) {
            log_error!("Failed to persist default settings: {:?}", e);
        }
        settings
    }

    /// Write the record and commit it
    pub fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let mut buffer = [0u8; SETTINGS_REGION_SIZE];
        buffer[0] = MAGIC_1;
        buffer[1] = MAGIC_2;
        buffer[2] = settings.schema_version;
        let used = postcard::to_slice(settings, &mut buffer[HEADER_LEN..])
            .map_err(|_| SettingsError::Encode)?
            .len();

        self.storage
            .write(SETTINGS_OFFSET, &buffer[..HEADER_LEN + used])?;
        self.storage.commit()?;
        log_debug!("Saved settings ({} bytes)", HEADER_LEN + used);
        Ok(())
    }

    /// Read and validate the stored record
    ///
    /// `Ok(None)` means the record is missing, stale or out of range.
    fn read_record(&mut self) -> Result<Option<Settings>, SettingsError> {
        let len = SETTINGS_REGION_SIZE.min(self.storage.capacity().saturating_sub(SETTINGS_OFFSET));
        let mut buffer = [0u8; SETTINGS_REGION_SIZE];
        self.storage.read(SETTINGS_OFFSET, &mut buffer[..len])?;

        if len < HEADER_LEN
            || buffer[0] != MAGIC_1
            || buffer[1] != MAGIC_2
            || buffer[2] != SETTINGS_VERSION
        {
            return Ok(None);
        }

        let settings: Settings = match postcard::from_bytes(&buffer[HEADER_LEN..len]) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };

        if !settings.is_valid() {
            return Ok(None);
        }
        Ok(Some(settings))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
