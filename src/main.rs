use std::{fs, io, process};

use log::{error, info};
use memsim::{
    config::Config,
    sim::Simulator,
    trace::{Synthetic, Trace},
    Result, SimError,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = pico_args::Arguments::from_env();
    let n_warm: u64 = args.opt_value_from_str("-w")?.unwrap_or(0);
    let heartbeat_int: u64 = args.opt_value_from_str("-h")?.unwrap_or(0);

    let config = if let Some(config_str) = args.opt_value_from_str::<_, String>("--config")? {
        Config::from_json(&config_str)?
    } else if let Some(config_path) = args.opt_value_from_str::<_, String>("-p")? {
        Config::from_json(&fs::read_to_string(config_path)?)?
    } else {
        Config::default()
    };
    let mut sim = Simulator::from_config(&config)?;

    let stats_path: Option<String> = args.opt_value_from_str("--json")?;
    let records_per_block: usize = args
        .opt_value_from_str("--buffer-size")?
        .unwrap_or(1024 * 16);
    let blocks_per_queue: usize = args.opt_value_from_str("--queue-size")?.unwrap_or(32);

    let trace = if let Some(count) = args.opt_value_from_str::<_, u64>("--synthetic")? {
        let mut synthetic = Synthetic {
            count,
            span: args.opt_value_from_str("--span")?.unwrap_or(1 << 20),
            seed: args.opt_value_from_str("--seed")?.unwrap_or(0),
            pids: Vec::new(),
        };
        if let Some(vm) = sim.vm() {
            synthetic = synthetic.over(vm);
        }
        Trace::synthetic(synthetic, records_per_block, blocks_per_queue)
    } else {
        let trace_path: String = args.value_from_str("-t")?;
        Trace::read(trace_path.into(), records_per_block, blocks_per_queue)?
    };

    let unused = args.finish();
    if !unused.is_empty() {
        return Err(SimError::Configuration(format!(
            "unexpected arguments: {unused:?}"
        )));
    }

    let mut warmup = n_warm > 0;
    let mut seen: u64 = 0;
    let mut next_heartbeat = heartbeat_int;
    for block in trace {
        let block = block?;
        let mut rest = block.as_slice();
        if warmup {
            let take = usize::try_from(n_warm - seen)
                .unwrap_or(usize::MAX)
                .min(rest.len());
            sim.operate(&rest[..take])?;
            rest = &rest[take..];
            seen += take as u64;
            if seen >= n_warm {
                sim.clear_stats();
                warmup = false;
                info!("finished warmup");
            }
        }
        sim.operate(rest)?;
        seen += rest.len() as u64;

        if heartbeat_int != 0 && seen > next_heartbeat {
            info!("records: {seen}");
            while next_heartbeat < seen {
                next_heartbeat += heartbeat_int;
            }
        }
    }
    info!("simulated {} records", sim.records());

    let report = sim.report();
    match stats_path {
        Some(path) => serde_json::to_writer_pretty(fs::File::create(path)?, &report)?,
        None => serde_json::to_writer_pretty(io::stdout().lock(), &report)?,
    }
    Ok(())
}
