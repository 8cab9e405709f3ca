//! Build script for kerfline-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates machine.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate machine.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=machine.toml");

    let config_path = Path::new("machine.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: machine.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds machine.toml at compile time.               ║\n\
            ║  Please create one in the kerfline-firmware directory.           ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read machine.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in machine.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    validate_required_sections(&config);
    validate_axes(&config);
    validate_policies(&config);

    println!("cargo:warning=machine.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Panic with a boxed list of errors if there are any
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Validate that required sections exist
fn validate_required_sections(config: &toml::Value) {
    let mut errors = Vec::new();

    for section in ["cut_axis", "feed_axis"] {
        if !matches!(config.get(section), Some(toml::Value::Table(_))) {
            errors.push(format!("Missing [{}] section", section));
        }
    }

    report("Missing required sections in machine.toml", &errors);
}

/// A distance in inches as mils, if it is a whole number of mils
fn to_mils(value: &toml::Value) -> Option<i64> {
    let inches = match value {
        toml::Value::Integer(i) => *i as f64,
        toml::Value::Float(f) => *f,
        _ => return None,
    };
    let mils = (inches * 1000.0).round();
    if (inches * 1000.0 - mils).abs() > 1e-6 {
        return None;
    }
    Some(mils as i64)
}

/// Check one distance key: whole mils, optionally non-negative, whole steps
fn check_distance(
    errors: &mut Vec<String>,
    section: &str,
    key: &str,
    value: &toml::Value,
    steps_per_inch: Option<i64>,
    non_negative: bool,
) {
    match to_mils(value) {
        Some(mils) if non_negative && mils < 0 => {
            errors.push(format!("[{}] {} must not be negative", section, key));
        }
        Some(mils) => {
            if let Some(spi) = steps_per_inch {
                if mils * spi % 1000 != 0 {
                    errors.push(format!(
                        "[{}] {} is not a whole number of steps",
                        section, key
                    ));
                }
            }
        }
        None => errors.push(format!("[{}] {} must be inches to 0.001", section, key)),
    }
}

/// Validate axis calibration, distances and speeds
fn validate_axes(config: &toml::Value) {
    let mut errors = Vec::new();

    for name in ["cut_axis", "feed_axis"] {
        let axis = match config.get(name).and_then(|a| a.as_table()) {
            Some(t) => t,
            None => continue,
        };

        let steps_per_inch = match axis.get("steps_per_inch") {
            Some(toml::Value::Integer(spi)) if *spi > 0 && *spi <= 100_000 => Some(*spi),
            Some(_) => {
                errors.push(format!("[{}] steps_per_inch must be 1-100000", name));
                None
            }
            None => None,
        };

        if let Some(value) = axis.get("travel") {
            check_distance(&mut errors, name, "travel", value, steps_per_inch, true);
        }

        for key in ["normal_speed", "return_speed", "homing_speed"] {
            if let Some(value) = axis.get(key) {
                match value {
                    toml::Value::Integer(hz) if *hz > 0 && *hz <= 100_000 => {}
                    _ => errors.push(format!("[{}] {} must be 1-100000 steps/s", name, key)),
                }
            }
        }
    }

    // Stock feed distances are feed carriage moves
    if let Some(stock_feed) = config.get("stock_feed").and_then(|s| s.as_table()) {
        let feed_spi = config
            .get("feed_axis")
            .and_then(|a| a.get("steps_per_inch"))
            .and_then(|v| v.as_integer())
            .filter(|spi| *spi > 0);
        for (key, non_negative) in [
            ("homing_backoff", true),
            ("first_grip", false),
            ("second_grip", false),
            ("first_cut_shortfall", true),
        ] {
            if let Some(value) = stock_feed.get(key) {
                check_distance(&mut errors, "stock_feed", key, value, feed_spi, non_negative);
            }
        }
        if let Some(value) = stock_feed.get("grip_settle_ms") {
            if !matches!(value, toml::Value::Integer(ms) if *ms >= 0) {
                errors.push("[stock_feed] grip_settle_ms must be a whole number".to_string());
            }
        }
    }

    if let Some(actuators) = config.get("actuators").and_then(|a| a.as_table()) {
        for key in ["rotary_home_deg", "rotary_active_deg"] {
            if let Some(toml::Value::Integer(deg)) = actuators.get(key) {
                if *deg < 0 || *deg > 180 {
                    errors.push(format!("[actuators] {} must be 0-180", key));
                }
            }
        }
    }

    report("Invalid axis configuration", &errors);
}

/// Validate policy strings
fn validate_policies(config: &toml::Value) {
    let mut errors = Vec::new();

    if let Some(toml::Value::String(mode)) = config.get("recovery").and_then(|r| r.get("interlock"))
    {
        if !["instant", "decelerate"].contains(&mode.as_str()) {
            errors.push("[recovery] interlock must be 'instant' or 'decelerate'".to_string());
        }
    }

    let branches = config
        .get("return")
        .and_then(|r| r.as_table())
        .cloned()
        .unwrap_or_default();
    for (name, branch) in &branches {
        if !["present", "absent"].contains(&name.as_str()) {
            errors.push(format!("[return.{}] is not a return branch", name));
            continue;
        }
        if let Some(toml::Value::String(policy)) = branch.get("home_check") {
            if !["nudge", "warn", "slow"].contains(&policy.as_str()) {
                errors.push(format!(
                    "[return.{}] home_check must be 'nudge', 'warn', or 'slow'",
                    name
                ));
            }
        }
    }

    report("Invalid recovery configuration", &errors);
}
