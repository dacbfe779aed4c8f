//! `dendrologger channels` — show what a config file resolves to.

use std::path::Path;

use dendro_core::Settings;

use super::load_settings;

pub fn run(config_path: &Path, json: bool) {
    let settings = load_settings(config_path);

    if json {
        match serde_json::to_string_pretty(&settings) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error encoding settings: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("Config: {}", config_path.display());
    println!();
    for line in describe(&settings) {
        println!("{line}");
    }
}

fn describe(settings: &Settings) -> Vec<String> {
    let mut lines = vec![format!(
        "  {:<4} {:<16} {:>12} {:>10}",
        "Ch", "Tree", "Scale (µm)", "µm/mV"
    )];
    for ch in &settings.channels {
        let per_mv = f64::from(ch.micron_scale) / (settings.reference_voltage * 1000.0);
        lines.push(format!(
            "  {:<4} {:<16} {:>12} {:>10.3}",
            ch.hardware_channel(),
            ch.tree_id,
            ch.micron_scale,
            per_mv
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "  Samples:    {} per channel, {} ms apart",
        settings.samples,
        settings.sample_delay.as_millis()
    ));
    lines.push(format!("  Reference:  {:.2} V", settings.reference_voltage));
    lines.push(format!("  Clamp:      {}", settings.clamp));
    lines.push(format!("  Data dir:   {}", settings.data_dir.display()));
    lines.push(format!("  CSV stem:   {}", settings.folder));
    lines.push(format!(
        "  ADC:        {:#04x} on {}",
        settings.adc_address,
        settings.i2c_bus.display()
    ));
    lines
}
