//! `generate`: write a test JLS file with a triangle waveform.

use std::time::Instant;

use jls::{JlsError, Result, SignalDef, SourceDef, Writer};

use super::{parse_u32, parse_u64};

/// Triangle waveforms are much faster to compute than sinusoids and still
/// have enough variation for test purposes.
pub fn gen_triangle(period: u32, data: &mut [f32]) {
    let v_max = ((period + 1) / 2) as i64;
    let offset = v_max as f32 / 2.0;
    let gain = 2.0 / v_max as f32;
    let mut v = v_max / 2;
    let mut incr = 1i64;
    for slot in data.iter_mut() {
        *slot = gain * (v as f32 - offset);
        if v <= 0 {
            incr = 1;
        } else if v >= v_max {
            incr = -1;
        }
        v += incr;
    }
}

pub fn run(args: &[String]) -> Result<()> {
    let mut filename: Option<&str> = None;
    let mut length: i64 = 1_000_000;
    let mut signal = SignalDef {
        signal_id: 1,
        source_id: 1,
        sample_rate: 1_000_000,
        name: "performance_1",
        si_units: "A",
        ..Default::default()
    };

    fn value<'a>(
        iter: &mut std::slice::Iter<'a, String>,
        what: &'static str,
    ) -> Result<&'a str> {
        iter.next()
            .map(String::as_str)
            .ok_or(JlsError::ParameterInvalid(what))
    }

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filename" => {
                filename = Some(value(&mut iter, "--filename requires a value")?);
            }
            "--sample_rate" => {
                signal.sample_rate = parse_u32(
                    value(&mut iter, "--sample_rate requires a value")?,
                    "sample_rate",
                )?;
            }
            "--length" => {
                length =
                    parse_u64(value(&mut iter, "--length requires a value")?, "length")? as i64;
            }
            "--samples_per_data" => {
                signal.samples_per_data = parse_u32(
                    value(&mut iter, "--samples_per_data requires a value")?,
                    "samples_per_data",
                )?;
            }
            "--sample_decimate_factor" => {
                signal.sample_decimate_factor = parse_u32(
                    value(&mut iter, "--sample_decimate_factor requires a value")?,
                    "sample_decimate_factor",
                )?;
            }
            "--entries_per_summary" => {
                signal.entries_per_summary = parse_u32(
                    value(&mut iter, "--entries_per_summary requires a value")?,
                    "entries_per_summary",
                )?;
            }
            "--summary_decimate_factor" => {
                signal.summary_decimate_factor = parse_u32(
                    value(&mut iter, "--summary_decimate_factor requires a value")?,
                    "summary_decimate_factor",
                )?;
            }
            other if !other.starts_with('-') && filename.is_none() => filename = Some(other),
            _ => return Err(JlsError::ParameterInvalid("unrecognized generate argument")),
        }
    }
    let Some(filename) = filename else {
        println!("Must specify filename");
        return Err(JlsError::ParameterInvalid("missing filename"));
    };

    let t_start = Instant::now();
    generate_jls(filename, &signal, length)?;
    let duration = t_start.elapsed().as_secs_f64();
    println!("Throughput: {:.3e} samples per second", length as f64 / duration);
    Ok(())
}

fn generate_jls(filename: &str, signal: &SignalDef, mut duration: i64) -> Result<()> {
    let mut data = vec![0.0f32; 1_000_000];
    gen_triangle(1000, &mut data);

    let mut writer = Writer::open(filename)?;
    writer.source_def(&SourceDef {
        source_id: 1,
        name: "performance",
        vendor: "jls",
        model: "",
        version: "",
        serial_number: "",
    })?;
    writer.signal_def(signal)?;

    let mut sample_id = 0i64;
    while duration > 0 {
        let n = (data.len() as i64).min(duration) as usize;
        writer.fsr_f32(signal.signal_id, sample_id, &data[..n])?;
        sample_id += n as i64;
        duration -= n as i64;
    }
    writer.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_shape() {
        let mut data = vec![0.0f32; 2000];
        gen_triangle(1000, &mut data);
        // starts at mid-scale, peaks at +1, descends to -1
        assert_eq!(data[0], 0.0);
        assert_eq!(data[250], 1.0);
        assert_eq!(data[1250], -1.0);
        let max = data.iter().cloned().fold(f32::MIN, f32::max);
        let min = data.iter().cloned().fold(f32::MAX, f32::min);
        assert_eq!(max, 1.0);
        assert_eq!(min, -1.0);
    }
}
