//! Build script for horolog-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml and turns it into constants (board_config.rs)

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Timers only present on tinyAVR parts
const MEGATINY_TIMERS: [&str; 5] = ["tca0", "tcb0", "tcb1", "tcd0", "rtc"];

const DEFAULT_IRQ_LATENCY_US: u16 = 64;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardFile {
    timebase: Option<TimebaseSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimebaseSection {
    #[serde(default = "default_enabled")]
    enabled: bool,
    timer: Option<String>,
    cpu_hz: Option<u32>,
    irq_latency_us: Option<u16>,
}

fn default_enabled() -> bool {
    true
}

/// Validated board settings
struct Board {
    enabled: bool,
    cpu_hz: u32,
    irq_latency_us: u16,
}

fn main() {
    setup_linker();
    let board = validate_config();
    write_board_config(&board);
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

/// Validate board.toml at compile time
fn validate_config() -> Board {
    println!("cargo:rerun-if-changed=board.toml");

    let config_path = Path::new("board.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: board.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a board.toml configuration file.          ║\n\
            ║  Please create one in the horolog-firmware directory.            ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read board.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: BoardFile = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid board.toml                                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let board = match validate_timebase(config.timebase) {
        Ok(board) => board,
        Err(errors) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid timebase configuration                           ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                errors
                    .iter()
                    .map(|e| format!("║  • {:<62} ║", e))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
        }
    };

    if board.enabled {
        println!(
            "cargo:warning=board.toml validated: SysTick timebase at {} Hz",
            board.cpu_hz
        );
    } else {
        println!("cargo:warning=board.toml validated: timekeeping disabled");
    }
    board
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

/// Check the [timebase] section, collecting every problem
fn validate_timebase(section: Option<TimebaseSection>) -> Result<Board, Vec<String>> {
    let Some(section) = section else {
        return Err(vec!["Missing [timebase] section".to_string()]);
    };

    let mut errors = Vec::new();

    if section.enabled {
        match section.timer.as_deref() {
            None => errors.push(
                "Timekeeping is enabled but no 'timer' is selected".to_string(),
            ),
            Some("systick") => {}
            Some(timer) if MEGATINY_TIMERS.contains(&timer) => errors.push(format!(
                "timer '{}' exists on tinyAVR only; use 'systick'",
                timer
            )),
            Some(timer) => errors.push(format!("Unknown timer '{}'", timer)),
        }
    }

    let cpu_hz = match section.cpu_hz {
        Some(hz) => {
            if hz == 0 || hz % 1_000_000 != 0 {
                errors.push(format!("cpu_hz {} is not a whole number of MHz", hz));
            } else if hz / 1000 - 1 > 0x00FF_FFFF {
                errors.push(format!("cpu_hz {} overflows the 24-bit SysTick", hz));
            }
            hz
        }
        None => {
            errors.push("Missing 'cpu_hz'".to_string());
            0
        }
    };

    let irq_latency_us = section.irq_latency_us.unwrap_or(DEFAULT_IRQ_LATENCY_US);
    if irq_latency_us == 0 {
        errors.push("irq_latency_us must be at least 1".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Board {
        enabled: section.enabled,
        cpu_hz,
        irq_latency_us,
    })
}

/// Emit the validated settings as Rust constants
fn write_board_config(board: &Board) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut f = File::create(out_dir.join("board_config.rs")).unwrap();
    writeln!(f, "// Generated from board.toml by build.rs").unwrap();
    writeln!(f, "pub const TIMEKEEPING_ENABLED: bool = {};", board.enabled).unwrap();
    writeln!(f, "pub const CPU_HZ: u32 = {};", board.cpu_hz).unwrap();
    writeln!(f, "pub const IRQ_LATENCY_US: u16 = {};", board.irq_latency_us).unwrap();
    writeln!(
        f,
        "pub const CONFIG: horolog_core::TimebaseConfig = \
         horolog_core::TimebaseConfig::new(horolog_core::MillisTimer::SysTick, CPU_HZ)\
         .with_irq_latency_us(IRQ_LATENCY_US);"
    )
    .unwrap();
}
