//! Unit conversions applied while normalizing raw sensor payloads.
//!
//! These are pure functions; the constants mirror what the deployed
//! sensors and meters report against.

/// Line voltage the power meter is wired for.
const LINE_VOLTAGE: f64 = 220.0;

/// sqrt(3) as fixed in the meter's own three-phase math.
const SQRT_3: f64 = 1.732;

/// Calibration divisor for the meeting-room CO2 sensors, which read high
/// by a constant factor.
const CO2_CALIBRATION_FACTOR: f64 = 3.5;

/// Estimate real power (kW) on one phase from its line current (A),
/// assuming a fixed 220 V three-phase supply.
pub fn current_to_kilowatts(amps: f64) -> f64 {
    (amps / SQRT_3) * LINE_VOLTAGE / 1000.0
}

/// Correct a raw meeting-room CO2 reading (ppm) for sensor miscalibration.
pub fn calibrate_co2(ppm: f64) -> f64 {
    ppm / CO2_CALIBRATION_FACTOR
}

/// Air-conditioner status reported over the switch topic. The unit sends
/// either "On" or "ON" when running; anything else counts as off. The
/// match is case-sensitive, so "on" is off.
pub fn status_is_on(raw: &str) -> bool {
    matches!(raw, "On" | "ON")
}

/// Control commands only ever use the all-caps form.
pub fn control_is_on(raw: &str) -> bool {
    raw == "ON"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_to_kilowatts() {
        let kw = current_to_kilowatts(10.0);
        assert!((kw - 1.270_207_852_193_995).abs() < 1e-9);
        assert_eq!(current_to_kilowatts(0.0), 0.0);
    }

    #[test]
    fn test_calibrate_co2() {
        assert!((calibrate_co2(700.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_is_on() {
        assert!(status_is_on("On"));
        assert!(status_is_on("ON"));
        assert!(!status_is_on("on"));
        assert!(!status_is_on("off"));
        assert!(!status_is_on(""));
    }

    #[test]
    fn test_control_is_on() {
        assert!(control_is_on("ON"));
        assert!(!control_is_on("On"));
        assert!(!control_is_on("on"));
    }
}
