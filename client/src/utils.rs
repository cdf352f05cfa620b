use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Euclidean distance between two points
pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

// Round a coordinate to two decimals before it goes on the wire
pub fn round_wire(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_distance() {
        assert_approx_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0, 0.0001);
        assert_approx_eq!(distance(1.0, 1.0, 1.0, 1.0), 0.0, 0.0001);
    }

    #[test]
    fn test_round_wire() {
        assert_approx_eq!(round_wire(1.23456), 1.23, 0.0001);
        assert_approx_eq!(round_wire(-7.005), -7.0, 0.011);
    }

    #[test]
    fn test_now_millis_monotonic_enough() {
        let a = now_millis();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_millis();
        assert!(b > a);
    }
}
