//! Command implementations on top of the simulated backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use serde_json::json;
use stewart_config::Config;
use stewart_core::hw_error::map_store_error;
use stewart_core::{persist, runner};
use stewart_core::{
    CalibrationRecord, NUM_ACTUATORS, Platform, PlatformCfg, PlatformError, RunParams,
    StaleReason, StartupSource,
};
use stewart_hardware::{FileStore, SimHandle, SimParams, SimulatedActuator};
use stewart_hardware::store::DEFAULT_CAPACITY;
use stewart_traits::PersistentStore;

/// Test hook: `STEWART_SIM_STUCK=<index>[:<value>]` freezes one feedback line.
const SIM_STUCK_ENV: &str = "STEWART_SIM_STUCK";

/// Everything a command needs, resolved from config and flags.
pub struct Ctx {
    pub cfg: Config,
    pub store_path: PathBuf,
    pub bounds_csv: Option<PathBuf>,
    pub json: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl Ctx {
    fn params(&self, max_run_ms: Option<u64>) -> RunParams {
        let shutdown = Arc::clone(&self.shutdown);
        RunParams::new(
            self.cfg.filter.tick_rate_hz,
            max_run_ms.unwrap_or(self.cfg.runner.max_run_ms),
        )
        .with_abort_check(Box::new(move || shutdown.load(Ordering::Relaxed)))
    }

    fn open_store(&self) -> eyre::Result<FileStore> {
        FileStore::open(&self.store_path, DEFAULT_CAPACITY)
            .map_err(eyre::Report::new)
            .wrap_err_with(|| format!("open calibration store {:?}", self.store_path))
    }
}

fn parse_stuck(raw: &str) -> eyre::Result<(usize, u16)> {
    let (idx, value) = match raw.split_once(':') {
        Some((i, v)) => (i, Some(v)),
        None => (raw, None),
    };
    let idx: usize = idx
        .trim()
        .parse()
        .wrap_err_with(|| format!("{SIM_STUCK_ENV}: bad index {idx:?}"))?;
    if idx >= NUM_ACTUATORS {
        eyre::bail!("{SIM_STUCK_ENV}: index {idx} out of range");
    }
    let value = match value {
        Some(v) => v
            .trim()
            .parse()
            .wrap_err_with(|| format!("{SIM_STUCK_ENV}: bad value {v:?}"))?,
        None => 512,
    };
    Ok((idx, value))
}

/// Build a platform on six simulated actuators described by `[simulation]`.
pub fn build_sim_platform(
    cfg: &Config,
) -> eyre::Result<(Platform<SimulatedActuator>, [SimHandle; NUM_ACTUATORS])> {
    let sim = &cfg.simulation;
    let io: [SimulatedActuator; NUM_ACTUATORS] = std::array::from_fn(|i| {
        let inset = sim.spread * i as f32;
        let lower_stop = sim.lower_stop + inset;
        let upper_stop = sim.upper_stop - inset;
        SimulatedActuator::new(SimParams {
            lower_stop,
            upper_stop,
            start: (lower_stop + upper_stop) / 2.0,
            units_per_tick: sim.units_per_tick,
            noise: sim.noise,
            seed: i as u32 + 1,
        })
    });
    let handles = std::array::from_fn(|i| io[i].handle());

    if let Ok(raw) = std::env::var(SIM_STUCK_ENV) {
        let (idx, value) = parse_stuck(&raw)?;
        tracing::warn!(actuator = idx, value, "simulated feedback sensor stuck");
        handles[idx].stick_sensor(Some(value));
    }

    let platform_cfg = PlatformCfg::try_from(cfg)?;
    let platform = Platform::builder()
        .with_actuators(io)
        .with_config(platform_cfg)
        .try_build()?;
    Ok((platform, handles))
}

fn print_bounds(bounds: &[[u16; 2]; NUM_ACTUATORS]) {
    for (i, [min, max]) in bounds.iter().enumerate() {
        println!("  actuator {i}: min={min} max={max}");
    }
}

fn restore_from_csv(
    platform: &mut Platform<SimulatedActuator>,
    path: &Path,
    params: &RunParams,
) -> eyre::Result<u64> {
    let bounds = stewart_config::load_bounds_csv(path)?;
    platform.setup()?;
    platform
        .calibrate_with(&bounds)
        .map_err(|e| eyre::Report::new(PlatformError::from(e)))
        .wrap_err_with(|| format!("restore bounds from {path:?}"))?;
    // Prime the filters before anything moves.
    let report = runner::run_until_calibrated(platform, params)?;
    Ok(report.ticks)
}

pub fn calibrate(
    ctx: &Ctx,
    force: bool,
    export: Option<&Path>,
    max_run_ms: Option<u64>,
) -> eyre::Result<()> {
    let (mut platform, _handles) = build_sim_platform(&ctx.cfg)?;
    let mut store = ctx.open_store()?;
    let params = ctx.params(max_run_ms);

    let (source, record) = if let Some(path) = &ctx.bounds_csv {
        restore_from_csv(&mut platform, path, &params)?;
        let record = persist::save_config(&mut store, &platform)?;
        ("csv".to_string(), record)
    } else if force {
        platform.setup()?;
        platform.calibrate();
        runner::run_until_calibrated(&mut platform, &params)?;
        let record = persist::save_config(&mut store, &platform)?;
        ("calibrated (forced)".to_string(), record)
    } else {
        let report = runner::startup(&mut platform, &mut store, &params)?;
        let source = match report.source {
            StartupSource::Restored { cycle_count } => {
                format!("restored (cycle {cycle_count})")
            }
            StartupSource::Calibrated { reason } => format!("calibrated ({reason})"),
        };
        (source, report.record)
    };

    if let Some(path) = export {
        stewart_config::write_bounds_csv(path, &record.bounds)?;
    }

    if ctx.json {
        let v = json!({
            "command": "calibrate",
            "source": source,
            "cycle_count": record.cycle_count,
            "bounds": record.bounds,
        });
        println!("{v}");
    } else {
        println!("bounds {source}, cycle count {}", record.cycle_count);
        print_bounds(&record.bounds);
        if let Some(path) = export {
            println!("exported to {}", path.display());
        }
    }
    Ok(())
}

pub fn move_to(ctx: &Ctx, lengths: &[f64], max_run_ms: Option<u64>) -> eyre::Result<()> {
    let lengths: [f64; NUM_ACTUATORS] = lengths.try_into().map_err(|_| {
        eyre::eyre!(
            "--lengths needs exactly {NUM_ACTUATORS} values, got {}",
            lengths.len()
        )
    })?;
    let (mut platform, _handles) = build_sim_platform(&ctx.cfg)?;
    let params = ctx.params(max_run_ms);

    if let Some(path) = &ctx.bounds_csv {
        restore_from_csv(&mut platform, path, &params)?;
    } else {
        let mut store = ctx.open_store()?;
        runner::startup(&mut platform, &mut store, &params)?;
    }

    let targets = platform
        .set_platform_lengths(&lengths)
        .map_err(|e| eyre::Report::new(PlatformError::from(e)))?;
    let report = runner::run_until_settled(&mut platform, &params)
        .wrap_err("moving to platform lengths")?;

    let positions: [u16; NUM_ACTUATORS] = std::array::from_fn(|i| platform.position(i).unwrap_or(0));
    if ctx.json {
        let v = json!({
            "command": "move",
            "targets": targets,
            "positions": positions,
            "ticks": report.ticks,
            "elapsed_ms": report.elapsed_ms,
        });
        println!("{v}");
    } else {
        println!("move complete in {} ticks ({} ms)", report.ticks, report.elapsed_ms);
        for (i, (t, p)) in targets.iter().zip(positions).enumerate() {
            println!("  actuator {i}: target={t} position={p}");
        }
    }
    Ok(())
}

fn describe_record(
    record: &CalibrationRecord,
    validity: Result<(), StaleReason>,
) -> serde_json::Value {
    let reason = validity.err().map(|r| r.to_string());
    json!({
        "command": "store-show",
        "format_version": record.format_version,
        "cycle_count": record.cycle_count,
        "bounds": record.bounds,
        "checksum": format!("{:#010x}", record.stored_checksum),
        "valid": reason.is_none(),
        "reason": reason,
    })
}

pub fn store_show(ctx: &Ctx) -> eyre::Result<()> {
    let mut store = ctx.open_store()?;
    let record = persist::read_record(&mut store)?;
    let persist_cfg = stewart_core::PersistCfg::from(&ctx.cfg.persistence);
    let validity = record.validate(&persist_cfg);

    if ctx.json {
        println!("{}", describe_record(&record, validity));
        return Ok(());
    }
    println!("store {}", store.path().display());
    println!(
        "format version {}, cycle count {}, checksum {:#010x}",
        record.format_version, record.cycle_count, record.stored_checksum
    );
    print_bounds(&record.bounds);
    match validity {
        Ok(()) => println!("record valid"),
        Err(reason) => println!("record invalid: {reason}"),
    }
    Ok(())
}

pub fn store_clear(ctx: &Ctx) -> eyre::Result<()> {
    let mut store = ctx.open_store()?;
    store.erase();
    store
        .commit()
        .map_err(|e| eyre::Report::new(map_store_error(&*e)))
        .wrap_err("committing erased store")?;
    tracing::info!(path = %ctx.store_path.display(), "calibration store erased");
    if ctx.json {
        println!("{}", json!({ "command": "store-clear", "ok": true }));
    } else {
        println!("store cleared");
    }
    Ok(())
}

pub fn self_check(ctx: &Ctx) -> eyre::Result<()> {
    let (mut platform, _handles) = build_sim_platform(&ctx.cfg)?;
    platform.setup()?;
    platform.tick().wrap_err("reading feedback")?;
    let readings: [u16; NUM_ACTUATORS] =
        std::array::from_fn(|i| platform.raw_position(i).unwrap_or(0));
    if ctx.json {
        println!("{}", json!({ "command": "self-check", "ok": true, "readings": readings }));
    } else {
        println!("OK");
        for (i, r) in readings.iter().enumerate() {
            println!("  actuator {i}: feedback={r}");
        }
    }
    Ok(())
}
