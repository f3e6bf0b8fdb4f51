use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use log::error;
use signal_hook::flag;

use rping::cli::Args;
use rping::report;
use rping::{resolve, IcmpSocket, PingError, ProbeEngine};

fn run(args: &Args) -> Result<(), PingError> {
    let config = args.config();
    config.validate()?;

    let target = resolve(&args.host)?;
    let socket = IcmpSocket::open(&config.socket_options())?;

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        flag::register(signal, Arc::clone(&stop)).map_err(PingError::Signal)?;
    }

    if !args.json {
        println!("{}", report::banner(&target, config.payload_size));
    }

    let mut engine =
        ProbeEngine::new(socket, target.clone(), config.engine_settings()).with_stop_flag(stop);
    let session = engine.run(|result| {
        if !args.json {
            println!("{}", report::probe_line(&target, result));
        }
    });
    // Closes the socket before any output below.
    drop(engine);

    if args.json {
        match serde_json::to_string_pretty(&session) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("failed to serialize report: {e}"),
        }
    } else {
        println!("{}", report::summary_block(&target, &session.summary));
    }

    session.into_result().map(|_| ())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rping: {e}");
            ExitCode::FAILURE
        }
    }
}
