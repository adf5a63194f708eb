//! Bakes the Wi-Fi credentials from `.env` into the firmware image.

const BAKED_KEYS: [&str; 2] = ["WIFI_SSID", "WIFI_PASSWORD"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in BAKED_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // A missing .env is fine; the variables may come from the shell instead
    if let Ok(entries) = dotenvy::dotenv_iter() {
        for (key, value) in entries.flatten() {
            if BAKED_KEYS.contains(&key.as_str()) {
                println!("cargo:rustc-env={key}={value}");
            }
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
