use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;

use loopscope::audio::{list_sources, Producer, PulseProducer, Sink, WavSink};
use loopscope::cli::Args;
use loopscope::config::Config;
use loopscope::{CaptureController, Spectrum, SpectrumStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loopscope=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    if args.list_sources {
        for (name, state) in list_sources()? {
            println!("{}\t{}", name, state);
        }
        return Ok(());
    }

    // Load or create config
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);

    let capture = &config.capture;
    let producer: Box<dyn Producer> = match &capture.source {
        Some(source) => {
            info!("Using explicit source: {}", source);
            Box::new(PulseProducer::with_source(
                Some(source.clone()),
                capture.channels,
                capture.sample_rate,
                capture.burst_frames,
            ))
        }
        None => Box::new(PulseProducer::monitor(
            capture.device.clone(),
            capture.channels,
            capture.sample_rate,
            capture.burst_frames,
        )),
    };
    let sink = config
        .sink
        .wav_path
        .as_ref()
        .map(|path| Box::new(WavSink::new(path)) as Box<dyn Sink>);

    let mut controller = CaptureController::new(
        producer,
        sink,
        config.analysis.window(),
        config.analysis.window_function,
    )
    .context("Failed to set up spectrum analysis")?;

    controller.start().context("Failed to start capture")?;

    let store = controller.store();
    let mut refresh = tokio::time::interval(Duration::from_millis(config.output.refresh_ms.max(1)));
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut snapshot = Spectrum::new(controller.window_len(), controller.sample_rate());
    let mut last_generation = 0;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                // A session that died on its own reports through the next lifecycle call
                if controller.state() == loopscope::ControlState::Stopped {
                    tokio::task::block_in_place(|| controller.stop()).context("Capture failed")?;
                    break;
                }
                if store.generation() != last_generation {
                    last_generation = store.generation();
                    print_peaks(&store, &mut snapshot, config.output.top_bins)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Duration elapsed");
                break;
            }
        }
    }

    // Joining the capture thread blocks for up to one burst
    tokio::task::block_in_place(|| controller.stop()).context("Capture ended with an error")?;
    let stats = controller.last_stats();
    println!(
        "Captured {} frames in {} bursts, analysed {} windows",
        stats.frames, stats.bursts, stats.windows
    );
    Ok(())
}

fn print_peaks(store: &SpectrumStore, snapshot: &mut Spectrum, top: usize) -> Result<()> {
    store.read_snapshot(snapshot)?;

    let mut bins: Vec<usize> = (0..snapshot.len()).collect();
    bins.sort_by(|&a, &b| snapshot.decibel[b].total_cmp(&snapshot.decibel[a]));

    let line: Vec<String> = bins
        .iter()
        .take(top)
        .map(|&i| format!("{:>9.1} Hz {:>7.1} dB", snapshot.frequency[i], snapshot.decibel[i]))
        .collect();
    println!("{}", line.join(" |"));
    Ok(())
}
