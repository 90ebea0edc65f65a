//! Headless Commodore 64 runner.
//!
//! Runs a fixed number of frames and reports how much of each frame the
//! raster cache had to redraw. Optionally saves a screenshot or records
//! every frame.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use machine_c64::config::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE};
use machine_c64::{C64, MachineConfig, capture};
use mos_vic_ii::PALETTE;
use raster_cache::{FrameStatus, FullFrameSink};

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    config_path: Option<PathBuf>,
    prg_path: Option<PathBuf>,
    kernal_path: Option<PathBuf>,
    basic_path: Option<PathBuf>,
    chargen_path: Option<PathBuf>,
    frames: u32,
    screenshot_path: Option<PathBuf>,
    record_dir: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        prg_path: None,
        kernal_path: None,
        basic_path: None,
        chargen_path: None,
        frames: 200,
        screenshot_path: None,
        record_dir: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                cli.config_path = args.get(i).map(PathBuf::from);
            }
            "--prg" => {
                i += 1;
                cli.prg_path = args.get(i).map(PathBuf::from);
            }
            "--kernal" => {
                i += 1;
                cli.kernal_path = args.get(i).map(PathBuf::from);
            }
            "--basic" => {
                i += 1;
                cli.basic_path = args.get(i).map(PathBuf::from);
            }
            "--chargen" => {
                i += 1;
                cli.chargen_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(200);
                }
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--record" => {
                i += 1;
                cli.record_dir = args.get(i).map(PathBuf::from);
            }
            "--help" | "-h" => {
                eprintln!("Usage: c64-headless [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --config <file>      Machine configuration (TOML)");
                eprintln!("  --prg <file>         Load a PRG file into memory");
                eprintln!("  --kernal <file>      Kernal ROM ({KERNAL_SIZE} bytes)");
                eprintln!("  --basic <file>       BASIC ROM ({BASIC_SIZE} bytes)");
                eprintln!("  --chargen <file>     Character ROM ({CHARGEN_SIZE} bytes)");
                eprintln!("  --frames <n>         Number of frames to run [default: 200]");
                eprintln!("  --screenshot <file>  Save a PNG of the last frame");
                eprintln!("  --record <dir>       Save every frame as a PNG");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

// ---------------------------------------------------------------------------
// Machine setup
// ---------------------------------------------------------------------------

fn read_optional(path: Option<&Path>, name: &str) -> Result<Option<Vec<u8>>> {
    path.map(|p| {
        std::fs::read(p).with_context(|| format!("cannot read {name} ROM at {}", p.display()))
    })
    .transpose()
}

fn make_c64(cli: &CliArgs) -> Result<C64> {
    let mut config = match &cli.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            MachineConfig::from_toml_str(&text)
                .with_context(|| format!("in {}", path.display()))?
        }
        None => MachineConfig::default(),
    };
    config.roms.kernal = read_optional(cli.kernal_path.as_deref(), "Kernal")?;
    config.roms.basic = read_optional(cli.basic_path.as_deref(), "BASIC")?;
    config.roms.chargen = read_optional(cli.chargen_path.as_deref(), "character")?;

    let mut c64 = C64::new(config);

    if let Some(path) = &cli.prg_path {
        let data = std::fs::read(path)
            .with_context(|| format!("cannot read PRG file {}", path.display()))?;
        let addr = c64
            .load_prg(&data)
            .with_context(|| format!("cannot load {}", path.display()))?;
        eprintln!("Loaded PRG at ${addr:04X}: {}", path.display());
        if !c64.bus().memory.has_kernal() {
            // Nothing would start it otherwise.
            c64.cpu_mut().regs.pc = addr;
        }
    }

    Ok(c64)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run(cli: &CliArgs) -> Result<()> {
    let mut c64 = make_c64(cli)?;

    if let Some(dir) = &cli.record_dir {
        return capture::record(&mut c64, dir, cli.frames)
            .with_context(|| format!("cannot record to {}", dir.display()));
    }

    let mut sink = FullFrameSink::new(PALETTE);
    let mut cycles = 0u64;
    let mut dirty_lines = 0usize;
    let mut dropped = 0u32;
    let mut clean = 0u32;
    for _ in 0..cli.frames {
        let report = c64.run_frame(&mut sink);
        cycles += report.cycles;
        dirty_lines += report.dirty_lines;
        if report.dirty_lines == 0 {
            clean += 1;
        }
        if report.status == Some(FrameStatus::Dropped) {
            dropped += 1;
        }
    }

    let height = c64.bus().vic.height();
    let frames = cli.frames.max(1);
    println!("frames:      {}", cli.frames);
    println!("cycles:      {cycles}");
    println!("dirty lines: {dirty_lines} ({} per frame of {height})", dirty_lines / frames as usize);
    println!("clean:       {clean} frames");
    println!("dropped:     {dropped} frames");

    if let Some(path) = &cli.screenshot_path {
        capture::save_screenshot(&sink, path)
            .with_context(|| format!("cannot save {}", path.display()))?;
        eprintln!("Screenshot saved to {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = parse_args();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
