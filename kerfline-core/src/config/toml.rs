//! Simple TOML parser for machine configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! Kerfline configuration. It does NOT support the full TOML spec and
//! needs no allocator.
//!
//! Supported features:
//! - Key = value pairs (string, integer, decimal, boolean)
//! - [section] headers
//! - [section.subsection] headers
//! - Comments (# ...)
//!
//! Distances are written in decimal inches (`travel = 9.0`) and parsed
//! straight to mils without going through floating point.
//!
//! NOT supported:
//! - Arrays and inline tables
//! - Multi-line strings
//! - Dotted keys outside section headers

use crate::motion::{AxisProfiles, MILS_PER_INCH};
use crate::safety::{HomeCheckPolicy, InterlockMode};

use super::types::{
    ActuatorConfig, AxisConfig, MachineConfig, RecoveryConfig, ReturnPathConfig,
    StockFeedConfig, TimingConfig,
};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection { line: usize },
    /// Value could not be parsed for its key
    InvalidValue { line: usize },
    /// Line is neither a header, a comment nor `key = value`
    InvalidLine { line: usize },
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    CutAxis,
    FeedAxis,
    StockFeed,
    Actuators,
    Timing,
    Recovery,
    ReturnPresent,
    ReturnAbsent,
}

/// Parse TOML configuration into MachineConfig
///
/// Keys that are not present keep their default value. Unknown keys are
/// ignored so newer config files still load on older firmware.
pub fn parse_config(input: &str) -> Result<MachineConfig, ParseError> {
    let mut config = MachineConfig::new();
    let mut section = Section::Root;

    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw).trim();

        // Skip empty lines and comments
        if line.is_empty() {
            continue;
        }

        // Check for section header
        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])
                .ok_or(ParseError::InvalidSection { line: line_no })?;
            continue;
        }

        let (key, value) =
            parse_key_value(line).ok_or(ParseError::InvalidLine { line: line_no })?;

        apply_value(section, key, value, &mut config)
            .map_err(|_| ParseError::InvalidValue { line: line_no })?;
    }

    Ok(config)
}

/// Parse section header like "cut_axis" or "return.present"
fn parse_section_header(header: &str) -> Option<Section> {
    match header.trim() {
        "cut_axis" => Some(Section::CutAxis),
        "feed_axis" => Some(Section::FeedAxis),
        "stock_feed" => Some(Section::StockFeed),
        "actuators" => Some(Section::Actuators),
        "timing" => Some(Section::Timing),
        "recovery" => Some(Section::Recovery),
        "return.present" => Some(Section::ReturnPresent),
        "return.absent" => Some(Section::ReturnAbsent),
        _ => None,
    }
}

/// Remove a trailing comment that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Parse a key = value line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Marker for a value that failed to parse
struct BadValue;

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

/// Parse an integer value (underscores allowed as digit separators)
fn parse_int<T: TryFrom<i64>>(value: &str) -> Result<T, BadValue> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if digits.is_empty() {
        return Err(BadValue);
    }

    let mut acc: i64 = 0;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(10).ok_or(BadValue)? as i64;
        acc = acc
            .checked_mul(10)
            .and_then(|a| a.checked_add(d))
            .ok_or(BadValue)?;
    }
    let signed = if negative { -acc } else { acc };
    T::try_from(signed).map_err(|_| BadValue)
}

/// Parse a decimal inch value into mils
///
/// Accepts up to three fractional digits: `9`, `9.0`, `-0.02`, `1.25`.
fn parse_mils(value: &str) -> Result<i32, BadValue> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(BadValue);
    }
    if frac.len() > 3 {
        return Err(BadValue);
    }

    let whole: i64 = if whole.is_empty() { 0 } else { parse_int(whole)? };
    if whole < 0 {
        return Err(BadValue);
    }

    let mut frac_mils: i64 = 0;
    let mut scale: i64 = 100;
    for c in frac.chars() {
        let d = c.to_digit(10).ok_or(BadValue)? as i64;
        frac_mils += d * scale;
        scale /= 10;
    }

    let mils = whole
        .checked_mul(MILS_PER_INCH as i64)
        .and_then(|w| w.checked_add(frac_mils))
        .ok_or(BadValue)?;
    let mils = if negative { -mils } else { mils };
    i32::try_from(mils).map_err(|_| BadValue)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, BadValue> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(BadValue),
    }
}

fn parse_home_check(value: &str) -> Result<HomeCheckPolicy, BadValue> {
    match parse_string(value) {
        "nudge" => Ok(HomeCheckPolicy::NudgeThenFault),
        "warn" => Ok(HomeCheckPolicy::WarnAndProceed),
        "slow" => Ok(HomeCheckPolicy::SlowRecovery),
        _ => Err(BadValue),
    }
}

fn parse_interlock(value: &str) -> Result<InterlockMode, BadValue> {
    match parse_string(value) {
        "instant" => Ok(InterlockMode::InstantStop),
        "decelerate" => Ok(InterlockMode::Decelerate),
        _ => Err(BadValue),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut MachineConfig,
) -> Result<(), BadValue> {
    match section {
        // No root-level keys are defined
        Section::Root => Ok(()),
        Section::CutAxis => apply_axis(&mut config.cut_axis, key, value),
        Section::FeedAxis => apply_axis(&mut config.feed_axis, key, value),
        Section::StockFeed => apply_stock_feed(&mut config.stock_feed, key, value),
        Section::Actuators => apply_actuators(&mut config.actuators, key, value),
        Section::Timing => apply_timing(&mut config.timing, key, value),
        Section::Recovery => apply_recovery(&mut config.recovery, key, value),
        Section::ReturnPresent => apply_return(&mut config.return_present, key, value),
        Section::ReturnAbsent => apply_return(&mut config.return_absent, key, value),
    }
}

fn apply_axis(axis: &mut AxisConfig, key: &str, value: &str) -> Result<(), BadValue> {
    let p: &mut AxisProfiles = &mut axis.profiles;
    match key {
        "steps_per_inch" => axis.calibration.steps_per_inch = parse_int(value)?,
        "travel" => axis.travel_mils = parse_mils(value)?,
        "normal_speed" => p.normal.speed_hz = parse_int(value)?,
        "normal_accel" => p.normal.accel = parse_int(value)?,
        "return_speed" => p.returning.speed_hz = parse_int(value)?,
        "return_accel" => p.returning.accel = parse_int(value)?,
        "homing_speed" => p.homing.speed_hz = parse_int(value)?,
        "homing_accel" => p.homing.accel = parse_int(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_stock_feed(f: &mut StockFeedConfig, key: &str, value: &str) -> Result<(), BadValue> {
    match key {
        "homing_backoff" => f.homing_backoff_mils = parse_mils(value)?,
        "grip_settle_ms" => f.grip_settle_ms = parse_int(value)?,
        "first_grip" => f.first_cut_grips_mils[0] = parse_mils(value)?,
        "second_grip" => f.first_cut_grips_mils[1] = parse_mils(value)?,
        "first_cut_shortfall" => f.first_cut_shortfall_mils = parse_mils(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_actuators(a: &mut ActuatorConfig, key: &str, value: &str) -> Result<(), BadValue> {
    match key {
        "rotary_home_deg" => a.rotary_home_deg = parse_int(value)?,
        "rotary_active_deg" => a.rotary_active_deg = parse_int(value)?,
        "rotary_hold_ms" => a.rotary_hold_ms = parse_int(value)?,
        "rotation_clamp_hold_ms" => a.rotation_clamp_hold_ms = parse_int(value)?,
        "early_clamp" => a.early_clamp_mils = parse_mils(value)?,
        "early_rotary" => a.early_rotary_mils = parse_mils(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_timing(t: &mut TimingConfig, key: &str, value: &str) -> Result<(), BadValue> {
    match key {
        "signal_pulse_ms" => t.signal_pulse_ms = parse_int(value)?,
        "suction_settle_ms" => t.suction_settle_ms = parse_int(value)?,
        "error_blink_ms" => t.error_blink_ms = parse_int(value)?,
        "homing_blink_ms" => t.homing_blink_ms = parse_int(value)?,
        "suction_blink_ms" => t.suction_blink_ms = parse_int(value)?,
        "cut_homing_timeout_ms" => t.cut_homing_timeout_ms = parse_int(value)?,
        "cut_homing_attempts" => t.cut_homing_attempts = parse_int(value)?,
        "suction_homing_timeout_ms" => t.suction_homing_timeout_ms = parse_int(value)?,
        "home_check_delay_ms" => t.home_check_delay_ms = parse_int(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_recovery(r: &mut RecoveryConfig, key: &str, value: &str) -> Result<(), BadValue> {
    match key {
        "settle_ms" => r.settle_ms = parse_int(value)?,
        "attempts" => r.attempts = parse_int(value)?,
        "slow_recovery_timeout_ms" => r.slow_recovery_timeout_ms = parse_int(value)?,
        "slow_recovery_poll_ms" => r.slow_recovery_poll_ms = parse_int(value)?,
        "slow_recovery_accel" => r.slow_recovery_accel = parse_int(value)?,
        "nudge" => r.nudge_mils = parse_mils(value)?,
        "max_nudge" => r.max_nudge_mils = parse_mils(value)?,
        "decel_distance" => r.decel_distance_mils = parse_mils(value)?,
        "decel_accel" => r.decel_accel = parse_int(value)?,
        "verify_delay_ms" => r.verify_delay_ms = parse_int(value)?,
        "return_target" => r.return_target_mils = parse_mils(value)?,
        "interlock" => r.interlock = parse_interlock(value)?,
        // Shorthand for `interlock = "instant"`
        "instant_stop" => {
            if parse_bool(value)? {
                r.interlock = InterlockMode::InstantStop;
            }
        }
        _ => {}
    }
    Ok(())
}

fn apply_return(p: &mut ReturnPathConfig, key: &str, value: &str) -> Result<(), BadValue> {
    match key {
        "settle_ms" => p.settle_ms = parse_int(value)?,
        "regrip" => p.regrip_mils = parse_mils(value)?,
        "home_check" => p.home_check = parse_home_check(value)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Kerfline machine configuration

[cut_axis]
steps_per_inch = 500
travel = 9.0          # full stroke
normal_speed = 700
normal_accel = 10_000
return_speed = 20000

[feed_axis]
steps_per_inch = 1000
travel = 3.4

[stock_feed]
homing_backoff = 0.2
second_grip = -1.5

[actuators]
rotary_home_deg = 24
rotary_active_deg = 90
early_clamp = 1.25
early_rotary = 0.3

[recovery]
nudge = 0.1
max_nudge = 0.4
return_target = -0.02
interlock = "instant"

[return.present]
home_check = "nudge"

[return.absent]
settle_ms = 200
regrip = 2
home_check = "slow"
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.cut_axis.calibration.steps_per_inch, 500);
        assert_eq!(config.cut_axis.travel_mils, 9000);
        assert_eq!(config.cut_axis.profiles.normal.accel, 10_000);
        assert_eq!(config.feed_axis.travel_mils, 3400);
        assert_eq!(config.stock_feed.homing_backoff_mils, 200);
        assert_eq!(config.stock_feed.first_cut_grips_mils, [-1000, -1500]);
        assert_eq!(config.stock_feed.first_cut_shortfall_mils, 2750);
        assert_eq!(config.actuators.early_clamp_mils, 1250);
        assert_eq!(config.actuators.early_rotary_mils, 300);
        assert_eq!(config.recovery.return_target_mils, -20);
        assert_eq!(config.recovery.interlock, InterlockMode::InstantStop);
        assert_eq!(
            config.return_present.home_check,
            HomeCheckPolicy::NudgeThenFault
        );
        assert_eq!(config.return_absent.settle_ms, 200);
        assert_eq!(config.return_absent.regrip_mils, 2000);
        assert_eq!(config.return_absent.home_check, HomeCheckPolicy::SlowRecovery);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = parse_config("[timing]\nsignal_pulse_ms = 1000\n").unwrap();
        assert_eq!(config.timing.signal_pulse_ms, 1000);
        assert_eq!(config.timing.suction_settle_ms, 500);
        assert_eq!(config.cut_axis, AxisConfig::cut());
    }

    #[test]
    fn test_parse_mils() {
        assert!(matches!(parse_mils("9"), Ok(9000)));
        assert!(matches!(parse_mils("9.0"), Ok(9000)));
        assert!(matches!(parse_mils("1.25"), Ok(1250)));
        assert!(matches!(parse_mils("-0.02"), Ok(-20)));
        assert!(matches!(parse_mils(".5"), Ok(500)));
        assert!(parse_mils("0.0001").is_err());
        assert!(parse_mils("abc").is_err());
        assert!(parse_mils("").is_err());
        assert!(parse_mils("-").is_err());
    }

    #[test]
    fn test_parse_int() {
        assert!(matches!(parse_int::<u32>("20_000"), Ok(20_000)));
        assert!(matches!(parse_int::<i32>("-5"), Ok(-5)));
        assert!(parse_int::<u8>("300").is_err());
        assert!(parse_int::<u32>("-1").is_err());
        assert!(parse_int::<u32>("1.5").is_err());
    }

    #[test]
    fn test_strip_comment_respects_strings() {
        assert_eq!(strip_comment("a = 1 # note"), "a = 1 ");
        assert_eq!(strip_comment("a = \"x#y\""), "a = \"x#y\"");
    }

    #[test]
    fn test_unknown_section_reports_line() {
        let err = parse_config("\n[heater]\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidSection { line: 2 });
    }

    #[test]
    fn test_bad_value_reports_line() {
        let err = parse_config("[recovery]\ninterlock = \"sometimes\"\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidValue { line: 2 });
    }

    #[test]
    fn test_garbage_line_rejected() {
        let err = parse_config("[timing]\njust words\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidLine { line: 2 });
    }
}
