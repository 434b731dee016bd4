use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::Context;
use tracker::{AccelComponent, AxisConfig, FrameDecoder, TelemetryFrame};

fn component_name(component: AccelComponent) -> &'static str {
    match component {
        AccelComponent::X => "x",
        AccelComponent::Y => "y",
        AccelComponent::Z => "z",
    }
}

pub fn header(axes: &[AxisConfig]) -> String {
    let mut columns = vec!["time[s]".to_string()];
    columns.extend(axes.iter().map(|a| format!("{}[counts]", a.id)));
    for (prefix, unit) in [("", "m"), ("d", "m/s"), ("dd", "m/s^2")] {
        columns.extend(
            axes.iter()
                .map(|a| format!("{}{}[{}]", prefix, component_name(a.accel_component), unit)),
        );
    }
    columns.extend(
        ["ddx_imu[m/s^2]", "ddy_imu[m/s^2]", "ddz_imu[m/s^2]", "temp[C]"].map(String::from),
    );
    columns.join(",")
}

pub fn row(time: f64, frame: &TelemetryFrame) -> String {
    let axes = frame.axes();
    let mut fields = vec![format!("{:.4}", time)];
    fields.extend(axes.iter().map(|a| a.count.to_string()));
    fields.extend(axes.iter().map(|a| a.position.to_string()));
    fields.extend(axes.iter().map(|a| a.velocity.to_string()));
    fields.extend(axes.iter().map(|a| a.acceleration.to_string()));
    fields.extend(frame.imu_accel().iter().map(|v| v.to_string()));
    fields.push(frame.temperature().to_string());
    fields.join(",")
}

/// Decode a recorded telemetry stream into CSV, one row per frame
pub fn export(
    frames_path: &str,
    csv_path: &str,
    axes: &[AxisConfig],
    telemetry_hz: u32,
) -> anyhow::Result<usize> {
    let bytes = fs::read(frames_path).with_context(|| format!("reading {}", frames_path))?;
    let mut decoder = FrameDecoder::new(axes.len());
    let frames = decoder.push(&bytes);
    if decoder.discarded() > 0 {
        log::warn!("{} bytes skipped while decoding {}", decoder.discarded(), frames_path);
    }

    let file = File::create(csv_path).with_context(|| format!("creating {}", csv_path))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{}", header(axes))?;
    for (i, frame) in frames.iter().enumerate() {
        writeln!(out, "{}", row(i as f64 / telemetry_hz as f64, frame))?;
    }
    out.flush()?;
    Ok(frames.len())
}
