//! `profile`: measure read performance against an existing JLS file.

use std::time::Instant;

use jls::{JlsError, Reader, Result, SignalType, SummaryEntry};

pub fn run(args: &[String]) -> Result<()> {
    let mut filename: Option<&str> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filename" => {
                filename = Some(
                    iter.next()
                        .ok_or(JlsError::ParameterInvalid("--filename requires a value"))?
                        .as_str(),
                );
            }
            other if !other.starts_with('-') && filename.is_none() => filename = Some(other),
            _ => return Err(JlsError::ParameterInvalid("unrecognized profile argument")),
        }
    }
    let Some(filename) = filename else {
        println!("Must specify filename");
        return Err(JlsError::ParameterInvalid("missing filename"));
    };

    let mut reader = Reader::open(filename)?;
    let signals: Vec<(u16, SignalType)> = reader
        .signals()
        .iter()
        .map(|s| (s.signal_id, s.signal_type))
        .collect();
    for (idx, (signal_id, signal_type)) in signals.iter().enumerate() {
        match signal_type {
            SignalType::Fsr => {
                println!("\nProfile FSR signal {idx}: {signal_id}");
                profile_fsr_signal(&mut reader, *signal_id)?;
            }
            SignalType::Vsr => {
                println!("\nProfile VSR signal {idx}: {signal_id}");
                println!("Not yet implemented, skip");
            }
        }
    }
    Ok(())
}

fn profile_fsr_signal(reader: &mut Reader, signal_id: u16) -> Result<()> {
    let length = reader.fsr_length(signal_id)?;
    println!("Length = {length} samples ({:.0e})", length as f64);
    if length < 2 {
        return Ok(());
    }

    // point seeks spread across the whole capture
    let step_count = 100i64;
    let step_sz = ((length - 1) / step_count).max(1);
    let mut data = [0.0f32; 1];
    let t_start = Instant::now();
    let mut sample = 0;
    while sample < length {
        reader.fsr_f32(signal_id, sample, &mut data)?;
        sample += step_sz;
    }
    println!(
        "Sample seek time: {:.6} seconds",
        t_start.elapsed().as_secs_f64() / step_count as f64
    );

    // range statistics with coarsening increments
    let samples = 1111usize;
    let mut entries = vec![SummaryEntry::default(); samples];
    let mut increment = 19683i64;
    while increment < length {
        let count = (length / increment - samples as i64).clamp(1, 100);
        let offset_sz = ((length - increment - 1) / count).max(1);
        let mut iter_count = 0u32;
        let t_start = Instant::now();
        let mut sample = 0i64;
        while sample < length - increment {
            let max_len = ((length - sample) / increment) as usize;
            let data_length = max_len.min(samples);
            match reader.fsr_f32_statistics(signal_id, sample, increment, &mut entries[..data_length])
            {
                Ok(()) | Err(JlsError::Empty) => {}
                Err(e) => return Err(e),
            }
            iter_count += 1;
            sample += offset_sz;
        }
        println!(
            "Read time (incr={increment}, length={samples}) => {:.6} seconds",
            t_start.elapsed().as_secs_f64() / iter_count.max(1) as f64
        );
        increment *= 3;
    }
    Ok(())
}
