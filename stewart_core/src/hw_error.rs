//! Maps `Box<dyn Error>` from trait boundaries to typed `PlatformError`.
//!
//! The traits in `stewart_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `stewart_hardware::HwError` downcasting.

use crate::error::PlatformError;

/// Map an actuator I/O error to a typed `PlatformError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PlatformError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<stewart_hardware::error::HwError>() {
            return match hw {
                stewart_hardware::error::HwError::Timeout => PlatformError::Timeout,
                other => PlatformError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        PlatformError::Timeout
    } else {
        PlatformError::Hardware(s)
    }
}

/// Map a persistent-store error. Everything becomes `PlatformError::Store`;
/// the caller decides whether the store is optional.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> PlatformError {
    PlatformError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain(&'static str);

    impl std::fmt::Display for Plain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Plain {}

    #[test]
    fn timeout_text_maps_to_timeout() {
        assert!(matches!(
            map_hw_error(&Plain("ADC Timeout on channel 3")),
            PlatformError::Timeout
        ));
    }

    #[test]
    fn other_text_maps_to_hardware() {
        match map_hw_error(&Plain("wiper open circuit")) {
            PlatformError::Hardware(s) => assert_eq!(s, "wiper open circuit"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_error_is_downcast() {
        use stewart_hardware::error::HwError;
        assert!(matches!(map_hw_error(&HwError::Timeout), PlatformError::Timeout));
        assert!(matches!(
            map_hw_error(&HwError::Feedback("stuck".into())),
            PlatformError::HardwareFault(_)
        ));
    }
}
