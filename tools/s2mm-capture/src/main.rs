use dma_linux::{PinnerDevice, StderrLogger, UioDevice};
use dma_pinning::{CacheMaintenance, DmaBuffer, Pinned};
use log::{LevelFilter, info};
use sg_list::{AddBufferError, AxiDma, SgList, TransferConfig};
use std::env;
use std::error::Error;
use std::fmt::Write as _;
use std::ops::Range;
use std::process::ExitCode;

const DESCRIPTOR_MEMORY: usize = 5000;
const DATA_MEMORY: usize = 20000;
const DEFAULT_BUFFERS: usize = 10;
const DEFAULT_BUFFER_SIZE: usize = 1600;

const USAGE: &str = "usage: s2mm-capture <uio-device> [buffers] [buffer-size]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    device: String,
    buffers: usize,
    buffer_size: usize,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let device = args.next().ok_or_else(|| USAGE.to_string())?;
    let mut number = |name: &str, default: usize| match args.next() {
        None => Ok(default),
        Some(v) => v
            .parse::<usize>()
            .map_err(|e| format!("invalid {name} {v:?}: {e}\n{USAGE}")),
    };
    let buffers = number("buffer count", DEFAULT_BUFFERS)?;
    let buffer_size = number("buffer size", DEFAULT_BUFFER_SIZE)?;
    if args.next().is_some() {
        return Err(USAGE.to_string());
    }
    Ok(Args {
        device,
        buffers,
        buffer_size,
    })
}

fn main() -> ExitCode {
    // args: <uio-device> [buffers] [buffer-size]
    let level = env::var("S2MM_LOG")
        .ok()
        .and_then(|v| StderrLogger::level_from_name(&v))
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = StderrLogger::new(level).init() {
        eprintln!("cannot install logger: {e}");
    }

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(usage) => {
            eprintln!("{usage}");
            return ExitCode::FAILURE;
        }
    };

    match capture(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("s2mm-capture: {e}");
            ExitCode::FAILURE
        }
    }
}

fn capture(args: &Args) -> Result<(), Box<dyn Error>> {
    let uio = UioDevice::open(&args.device)?;
    let registers = uio.map_registers()?;
    let pinner = PinnerDevice::open()?;

    // Declared before the pinnings so they are unpinned before being freed.
    let mut descriptor_memory = DmaBuffer::zeroed(DESCRIPTOR_MEMORY)?;
    let data_memory = DmaBuffer::zeroed(DATA_MEMORY)?;

    let descriptors = Pinned::new(&pinner, descriptor_memory.as_bytes())?;
    let data = Pinned::new(&pinner, data_memory.as_bytes())?;

    let mut list = SgList::new(data.region(), descriptors.region(), &mut descriptor_memory)?;
    for _ in 0..args.buffers {
        match list.add_logical_buffer(args.buffer_size) {
            Ok(()) => {}
            Err(AddBufferError::DescriptorArenaExhausted) => {
                println!("Ran out of memory for SG descriptors");
                break;
            }
            Err(AddBufferError::DataArenaExhausted) => {
                println!("Ran out of memory for data");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    list.materialize(&descriptors)?;

    let mut dma = AxiDma::new(registers, uio, TransferConfig::default());
    info!("waiting for {} buffer(s)", list.buffer_count());
    dma.start_transfer(&list, true, false)?;

    data.flush_for_cpu()?;

    let mut good = 0;
    for buffer in list.completed_with(&descriptors)? {
        if buffer.is_success() {
            good += 1;
        } else {
            info!("buffer at {} failed: {:?}", buffer.offset, buffer.faults);
        }
        println!(
            "Received {} buffer of length {}:",
            if buffer.is_success() { "good" } else { "bad" },
            buffer.len
        );
        print!("{}", hex_dump(&data_memory, buffer.range()));
    }
    println!("Got {good} good packets out of {}", args.buffers);

    drop(list);
    data.release()?;
    descriptors.release()?;
    Ok(())
}

/// One line per whole 64-byte row of `range`, words printed from the
/// highest address down.
fn hex_dump(memory: &DmaBuffer, range: Range<usize>) -> String {
    let mut out = String::new();
    for row in (range.start..range.end).step_by(64) {
        if row + 64 > range.end {
            break;
        }
        for word in (0..16).rev() {
            let value = memory.read_u32_le(row + 4 * word).unwrap_or(0);
            let _ = write!(out, "{value:08x} ");
        }
        out.push('\n');
    }
    out
}
