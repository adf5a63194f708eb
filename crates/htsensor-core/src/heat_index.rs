//! Heat index ("feels like" temperature)
//!
//! NOAA formulation: the simple Steadman approximation is used while it stays
//! below 80 °F, otherwise the Rothfusz regression with its low- and
//! high-humidity adjustments.

use libm::{fabsf, sqrtf};

fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 1.8 + 32.0
}

fn fahrenheit_to_celsius(f: f32) -> f32 {
    (f - 32.0) * 0.555_555_6
}

/// Compute the heat index for `temperature` and relative `humidity` (%).
///
/// `is_fahrenheit` selects the unit of both the input temperature and the
/// result. NaN inputs produce NaN.
pub fn compute_heat_index(temperature: f32, humidity: f32, is_fahrenheit: bool) -> f32 {
    let t = if is_fahrenheit {
        temperature
    } else {
        celsius_to_fahrenheit(temperature)
    };
    let rh = humidity;

    let mut hi = 0.5 * (t + 61.0 + ((t - 68.0) * 1.2) + (rh * 0.094));

    if hi > 79.0 {
        let t2 = t * t;
        let rh2 = rh * rh;
        hi = -42.379 + 2.049_015_2 * t + 10.143_331 * rh
            - 0.224_755_41 * t * rh
            - 0.006_837_83 * t2
            - 0.054_817_17 * rh2
            + 0.001_228_74 * t2 * rh
            + 0.000_852_82 * t * rh2
            - 0.000_001_99 * t2 * rh2;

        if rh < 13.0 && (80.0..=112.0).contains(&t) {
            hi -= ((13.0 - rh) * 0.25) * sqrtf((17.0 - fabsf(t - 95.0)) * 0.058_82);
        } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
            hi += ((rh - 85.0) * 0.1) * ((87.0 - t) * 0.2);
        }
    }

    if is_fahrenheit {
        hi
    } else {
        fahrenheit_to_celsius(hi)
    }
}
