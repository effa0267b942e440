// Copyright 2025 Adam Greig
// Licensed under Apache-2.0 and MIT licenses.

use std::{fs, path::Path, time::{Instant, Duration}};
use clap::{Command, Arg, ArgAction, ArgMatches, crate_description, crate_version, value_parser};
use clap_num::{maybe_hex, si_number};
use anyhow::bail;
use indicatif::{ProgressBar, ProgressStyle};

use virtexload::{Device, Timing, Clock, ProgrammingPort, RegisterBank, ScanState, Error};
use virtexload::sim::{SimBoard, SimClock};
use virtexload::wan::{wan_connection_status, InterfaceAddresses};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("virtexload")
        .version(crate_version!())
        .about(crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .infer_subcommands(true)
        .arg(Arg::new("quiet")
             .help("Suppress informative output and raise log level to errors only")
             .long("quiet")
             .short('q')
             .action(ArgAction::SetTrue)
             .global(true))
        .arg(Arg::new("verbose")
             .help("Increase log level, specify once for info, twice for debug, three times for trace")
             .long("verbose")
             .short('v')
             .action(ArgAction::Count)
             .conflicts_with("quiet")
             .global(true))
        .arg(Arg::new("simulate")
             .help("Use a simulated board instead of memory-mapped hardware")
             .long("simulate")
             .short('s')
             .action(ArgAction::SetTrue)
             .global(true))
        .arg(Arg::new("prog-addr")
             .help("Physical address of the programming register")
             .long("prog-addr")
             .action(ArgAction::Set)
             .value_parser(maybe_hex::<u64>)
             .global(true))
        .arg(Arg::new("reg-addr")
             .help("Physical address of the design register bank")
             .long("reg-addr")
             .action(ArgAction::Set)
             .value_parser(maybe_hex::<u64>)
             .global(true))
        .arg(Arg::new("status-addr")
             .help("Physical address of the input port carrying INIT and DONE")
             .long("status-addr")
             .action(ArgAction::Set)
             .value_parser(maybe_hex::<u64>)
             .global(true))
        .arg(Arg::new("init-bit")
             .help("Bit of the input port connected to INIT")
             .long("init-bit")
             .action(ArgAction::Set)
             .default_value("27")
             .value_parser(value_parser!(u8).range(0..32))
             .global(true))
        .arg(Arg::new("done-bit")
             .help("Bit of the input port connected to DONE")
             .long("done-bit")
             .action(ArgAction::Set)
             .default_value("28")
             .value_parser(value_parser!(u8).range(0..32))
             .global(true))
        .arg(Arg::new("reg-count")
             .help("Number of 16-bit registers in the design register bank")
             .long("reg-count")
             .action(ArgAction::Set)
             .default_value("8")
             .value_parser(value_parser!(usize))
             .global(true))
        .arg(Arg::new("init-timeout")
             .help("Time to wait for INIT after asserting PROGRAM, in milliseconds")
             .long("init-timeout")
             .action(ArgAction::Set)
             .default_value("500")
             .value_parser(value_parser!(u64))
             .global(true))
        .arg(Arg::new("settle")
             .help("Settle time between PROGRAM and CS changes, in nanoseconds")
             .long("settle")
             .action(ArgAction::Set)
             .default_value("300")
             .value_parser(value_parser!(u64))
             .global(true))
        .subcommand(Command::new("program")
            .about("Configure the FPGA with a bitstream")
            .arg(Arg::new("file")
                 .help("Bitstream file to load")
                 .required(true))
            .arg(Arg::new("chunk-size")
                 .help("Bytes handed to the device per write (k and M suffixes allowed)")
                 .long("chunk-size")
                 .short('c')
                 .action(ArgAction::Set)
                 .default_value("4k")
                 .value_parser(si_number::<usize>)))
        .subcommand(Command::new("status")
            .about("Read the INIT and DONE signals"))
        .subcommand(Command::new("read-reg")
            .about("Read a design register")
            .arg(Arg::new("index")
                 .help("Register index")
                 .required(true)
                 .value_parser(maybe_hex::<usize>)))
        .subcommand(Command::new("write-reg")
            .about("Write a design register")
            .arg(Arg::new("index")
                 .help("Register index")
                 .required(true)
                 .value_parser(maybe_hex::<usize>))
            .arg(Arg::new("value")
                 .help("Value to write")
                 .required(true)
                 .value_parser(maybe_hex::<u16>)))
        .subcommand(Command::new("wan-status")
            .about("Report the WAN connection status of a network interface")
            .arg(Arg::new("interface")
                 .help("Interface name, e.g. eth0")
                 .required(true)))
        .get_matches();

    let t0 = Instant::now();
    let quiet = matches.get_flag("quiet");
    let verbose = matches.get_count("verbose");
    let env = if quiet {
        env_logger::Env::default().default_filter_or("error")
    } else if verbose == 0 {
        env_logger::Env::default().default_filter_or("warn")
    } else if verbose == 1 {
        env_logger::Env::default().default_filter_or("info")
    } else if verbose == 2 {
        env_logger::Env::default().default_filter_or("debug")
    } else {
        env_logger::Env::default().default_filter_or("trace")
    };
    env_logger::Builder::from_env(env).format_timestamp(None).init();

    // The WAN status does not involve the FPGA at all.
    if let Some(("wan-status", sub)) = matches.subcommand() {
        let ifname = sub.get_one::<String>("interface").unwrap();
        let status = wan_connection_status(&InterfaceAddresses, ifname);
        println!("{ifname}: {status}");
        return Ok(());
    }

    let timing = Timing::default()
        .with_settle(Duration::from_nanos(*matches.get_one::<u64>("settle").unwrap()))
        .with_init_timeout(Duration::from_millis(*matches.get_one::<u64>("init-timeout").unwrap()));
    let reg_count = *matches.get_one::<usize>("reg-count").unwrap();
    if reg_count == 0 {
        bail!("The register bank must have at least one register.");
    }

    if matches.get_flag("simulate") {
        log::info!("Using simulated board");
        let device = Device::new(SimBoard::new(reg_count), SimClock::new(), timing);
        run(&matches, &device, quiet)?;
    } else {
        open_and_run(&matches, reg_count, timing, quiet)?;
    }

    let t1 = t0.elapsed();
    if !quiet {
        println!("Finished in {}.{:02}s", t1.as_secs(), t1.subsec_millis()/10);
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn open_and_run(matches: &ArgMatches, reg_count: usize, timing: Timing, quiet: bool)
    -> anyhow::Result<()>
{
    use virtexload::StdClock;
    use virtexload::mmio::{MmioBoard, MmioConfig};

    let addr = |name: &str| -> anyhow::Result<u64> {
        match matches.get_one::<u64>(name) {
            Some(&addr) => Ok(addr),
            None => bail!("--{name} is required unless --simulate is given."),
        }
    };
    let config = MmioConfig::new(addr("prog-addr")?, addr("reg-addr")?, addr("status-addr")?)
        .with_status_bits(*matches.get_one::<u8>("init-bit").unwrap(),
                          *matches.get_one::<u8>("done-bit").unwrap())
        .with_register_count(reg_count);
    let device = Device::new(MmioBoard::open(&config)?, StdClock::new(), timing);
    run(matches, &device, quiet)
}

#[cfg(not(target_os = "linux"))]
fn open_and_run(_matches: &ArgMatches, _reg_count: usize, _timing: Timing, _quiet: bool)
    -> anyhow::Result<()>
{
    bail!("Memory-mapped hardware is only supported on Linux, use --simulate.");
}

fn run<H, C>(matches: &ArgMatches, device: &Device<H, C>, quiet: bool) -> anyhow::Result<()>
where
    H: ProgrammingPort + RegisterBank,
    C: Clock,
{
    match matches.subcommand() {
        Some(("program", sub)) => {
            let file = sub.get_one::<String>("file").unwrap();
            let chunk_size = *sub.get_one::<usize>("chunk-size").unwrap();
            if chunk_size == 0 {
                bail!("Chunk size must be at least one byte.");
            }
            program(device, Path::new(file), chunk_size, quiet)?;
        },
        Some(("status", _)) => {
            let status = device.status();
            println!("INIT: {}", status.contains(virtexload::Status::INIT));
            println!("DONE: {}", status.contains(virtexload::Status::DONE));
        },
        Some(("read-reg", sub)) => {
            let index = *sub.get_one::<usize>("index").unwrap();
            let value = device.read_register(index)?;
            println!("0x{value:04X}");
        },
        Some(("write-reg", sub)) => {
            let index = *sub.get_one::<usize>("index").unwrap();
            let value = *sub.get_one::<u16>("value").unwrap();
            device.write_register(index, value)?;
            if !quiet { println!("Wrote 0x{value:04X} to register {index}.") };
        },
        _ => panic!("Unhandled command."),
    }
    Ok(())
}

fn program<H, C>(device: &Device<H, C>, path: &Path, chunk_size: usize, quiet: bool)
    -> anyhow::Result<()>
where
    H: ProgrammingPort,
    C: Clock,
{
    let data = fs::read(path).map_err(Error::from)?;
    log::info!("Loaded {} bytes from {}", data.len(), path.display());

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(data.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut session = device.open()?;
    for chunk in data.chunks(chunk_size) {
        let n = session.write(chunk)?;
        pb.inc(n as u64);
        if session.scan_state() == ScanState::Exhausted {
            pb.abandon();
            return Err(Error::SyncNotFound { scanned: session.scanned() }.into());
        }
    }
    if session.scan_state() != ScanState::Synced {
        pb.abandon();
        return Err(Error::SyncNotFound { scanned: session.scanned() }.into());
    }
    pb.finish_and_clear();

    let completion = session.close()?;
    if !quiet { println!("{completion}") };
    Ok(())
}
