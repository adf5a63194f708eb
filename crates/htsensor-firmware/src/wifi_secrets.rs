//! Wi-Fi credentials baked in at build time
//!
//! `build.rs` forwards `WIFI_SSID` and `WIFI_PASSWORD` from `.env` (or the
//! shell) into the compile environment. Missing values become empty strings,
//! which fail association at runtime rather than the build.

use htsensor_core::config::{HOSTNAME, NetworkConfig};

pub const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};

pub const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

pub const NETWORK: NetworkConfig<'static> = NetworkConfig {
    hostname: HOSTNAME,
    ssid: WIFI_SSID,
    password: WIFI_PASSWORD,
};
