//! `dendrologger monitor` — live readout of every channel, no persistence.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use dendro_core::{Acquisition, ChannelReader, Cycle, Station};

use super::{ReaderSource, apply_sampling_overrides, load_settings, open_reader, parse_seconds};

const RULE: &str = "------------------------------------------------------";
const STOP_POLL: Duration = Duration::from_millis(50);

/// Run the monitor command.
pub fn run(
    config_path: &Path,
    source: ReaderSource,
    samples: Option<u32>,
    delay: Option<f64>,
    refresh: Option<f64>,
) {
    let mut settings = load_settings(config_path);
    apply_sampling_overrides(&mut settings, samples, delay);
    if let Some(secs) = refresh {
        settings.refresh_interval = parse_seconds("--refresh", secs);
    }

    let reader = open_reader(&settings, source);
    let mut station = Station::new(reader, settings.channels.clone(), Acquisition::from(&settings));

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    // Read failures are shown in the status block; log lines would be
    // wiped by the next refresh anyway.
    log::set_max_level(log::LevelFilter::Error);

    let result = run_loop(&mut station, &running, settings.refresh_interval);

    println!();
    match result {
        Ok(()) => println!("Monitoring stopped."),
        Err(e) => {
            eprintln!("Terminal error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_loop<R: ChannelReader>(
    station: &mut Station<R>,
    running: &AtomicBool,
    refresh: Duration,
) -> io::Result<()> {
    let mut stdout = io::stdout();
    let source = station.reader().describe();

    while running.load(Ordering::SeqCst) {
        let cycle = station.acquire();
        if !running.load(Ordering::SeqCst) {
            break;
        }

        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        for line in render(&cycle, &source) {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;

        let deadline = Instant::now() + refresh;
        while running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(STOP_POLL));
        }
    }
    Ok(())
}

/// Fixed-format status block for one cycle.
pub fn render(cycle: &Cycle, source: &str) -> Vec<String> {
    let mut lines = vec![
        RULE.to_string(),
        "Live Dendrometer Monitor - Press Ctrl+C to stop".to_string(),
        RULE.to_string(),
        "Showing averaged micrometer displacement and voltage for each channel.".to_string(),
        format!("Updated {}  ·  {source}", cycle.timestamp_string()),
        String::new(),
    ];
    lines.extend(cycle.status_lines());

    let failures: Vec<String> = cycle
        .readings
        .iter()
        .filter_map(|r| {
            r.failures.last().map(|last| {
                format!(
                    "  Ch{}: {} failed read(s), last: {last}",
                    r.hardware_channel(),
                    r.failures.len()
                )
            })
        })
        .collect();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Read errors this cycle:".to_string());
        lines.extend(failures);
    }
    lines
}
