//! Network collaborators
//!
//! Access-point/station setup and socket plumbing live in the board
//! crate. The core applies configuration, reports status and relays
//! scan results and remote commands through these traits.

use heapless::String;

/// Current wifi operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiMode {
    Off,
    Station,
    AccessPoint,
    AccessPointStation,
}

impl WifiMode {
    /// Name reported to clients
    pub fn as_str(self) -> &'static str {
        match self {
            WifiMode::Off => "OFF",
            WifiMode::Station => "STA",
            WifiMode::AccessPoint => "AP",
            WifiMode::AccessPointStation => "APSTA",
        }
    }
}

/// Network settings view handed to the board when they change
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig<'a> {
    pub sta_ssid: &'a str,
    pub sta_pass: &'a str,
    pub sta_dhcp: bool,
    pub sta_fixed_ip: [u8; 4],
    pub sta_fixed_gateway: [u8; 4],
    pub sta_fixed_netmask: [u8; 4],
    pub sta_fixed_dns1: [u8; 4],
    pub sta_fixed_dns2: [u8; 4],
    pub ap_ssid: &'a str,
    pub ap_pass: &'a str,
    pub discovery: bool,
}

/// One access point seen by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String<32>,
    pub rssi: i8,
    pub encrypted: bool,
}

/// Wifi status and configuration
pub trait NetworkLink {
    /// Reconfigure station/access point from settings
    fn apply(&mut self, config: &NetworkConfig<'_>);

    /// Default access point name for this unit
    fn default_ap_name(&self) -> String<32>;

    /// Current operating mode
    fn mode(&self) -> WifiMode;

    /// Station signal strength in dBm
    fn station_rssi(&self) -> i8;

    /// Station IP address (0.0.0.0 when not connected)
    fn station_ip(&self) -> [u8; 4];

    /// Begin an asynchronous access point scan
    fn start_scan(&mut self);

    /// Take scan results if a scan has finished since the last call
    fn take_scan_results(&mut self) -> Option<heapless::Vec<ScanEntry, 16>>;

    /// Returns true once after every connection state change
    fn take_network_changed(&mut self) -> bool;

    /// Free heap in bytes, reported to clients for diagnostics
    fn free_heap(&self) -> u32;
}

/// Remote HTTP server used for periodic status posting
pub trait ServerLink {
    /// POST a JSON document to `url`
    fn post(&mut self, url: &str, body: &str);

    /// GET the newest queued command for this robot, if any
    fn fetch_command(&mut self, url: &str) -> Option<String<256>>;
}
