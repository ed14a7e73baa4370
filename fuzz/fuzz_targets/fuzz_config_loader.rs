#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = stewart_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must always map onto a buildable platform config.
            let _ = stewart_core::PlatformCfg::try_from(&cfg)
                .expect("validated config converts");
        }
    }
});
