//! Kind-string-to-constructor registry (§9): every processor kind nameable in a
//! `[processor.<name>]` TOML table, wired to the engine from [`processors`], [`calibration`],
//! [`coalesce`], or [`acqiris`] that implements it.

use crate::calibration::commonmode::{CalcKind, CommonMode};
use crate::calibration::covariance::CovarianceMap;
use crate::calibration::darkcal::{BadPixelBounds, DarkCal, UpdateKind};
use crate::calibration::gain::GainCal;
use crate::calibration::hotpixel::HotPixelMask;
use crate::coalesce::PixelHitFinder;
use crate::acqiris::delayline::DelaylinePosition;
use crate::acqiris::waveform::{ConstantFractionDiscriminator, TdcHitCount};
use crate::config::ProcessorConfig;
use crate::error::{CassError, CassResult};
use crate::manager::Ctor;
use crate::processor::{AccumulatingProcessor, BaseProcessor, ProcNode};
use crate::processors::accumulate::{Accumulate, AccumulateMode, CallCounter};
use crate::processors::algebra::{Algebra, Op, Operand};
use crate::processors::control::{ClearResult, Constant, IdOnList, Quit, ValueChanged};
use crate::processors::filter::IirFilter;
use crate::processors::histogram::{Histogram1d, Histogram2d};
use crate::processors::projection::{ProjectAxis, Projection};
use crate::processors::slice::{Integral, Reduction, Slice1d};
use crate::processors::source::RawPixelDetectorFrame;
use crate::processors::stats::StatsProbe;
use crate::result::{Axis, ResultContainer};
use std::collections::HashMap;
use std::sync::Arc;

fn bad_config(processor: &str, reason: impl Into<String>) -> CassError {
    CassError::BadConfig { processor: processor.into(), reason: reason.into() }
}

/// Parses a `Shape` key into a freshly built zeroed [`ResultContainer`] template:
/// `value`, `array:<n>`, or `hist1d:<bins>:<low>:<up>:<title>`.
fn parse_shape(cfg: &ProcessorConfig, name: &str) -> CassResult<ResultContainer> {
    let spec = cfg.get_str("Shape", "value");
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        ["value"] => Ok(ResultContainer::value(name)),
        ["array", n] => {
            let n: usize = n.parse().map_err(|_| bad_config(name, format!("bad array size '{n}'")))?;
            Ok(ResultContainer::array_1d(name, n))
        }
        ["hist1d", bins, low, up, title] => {
            let bins: usize = bins.parse().map_err(|_| bad_config(name, "bad hist1d bin count"))?;
            let low: f64 = low.parse().map_err(|_| bad_config(name, "bad hist1d low"))?;
            let up: f64 = up.parse().map_err(|_| bad_config(name, "bad hist1d up"))?;
            Ok(ResultContainer::histogram_1d(name, Axis::new(bins, low, up, *title)))
        }
        other => Err(bad_config(name, format!("unrecognized Shape '{}'", other.join(":")))),
    }
}

fn axis_from_config(cfg: &ProcessorConfig, prefix: &str, default_title: &str) -> Axis {
    Axis::new(
        cfg.get_usize(&format!("{prefix}Bins"), 100),
        cfg.get_f64(&format!("{prefix}Low"), 0.0),
        cfg.get_f64(&format!("{prefix}Up"), 1.0),
        cfg.get_str(&format!("{prefix}Title"), default_title),
    )
}

/// Registers every builtin kind under its TOML `kind = "..."` name.
pub fn builtin_registry() -> HashMap<String, Ctor> {
    let mut r: HashMap<String, Ctor> = HashMap::new();

    r.insert(
        "Algebra".into(),
        Arc::new(|name, cfg, workers| {
            let op = Op::parse(&cfg.get_str("Operator", "+"))?;
            let operand_b = match cfg.values.get("OperandB") {
                None => None,
                Some(v) => {
                    let s = v.as_str().unwrap_or_default();
                    Some(if let Some(c) = s.strip_prefix("const:") {
                        let c: f32 = c.parse().map_err(|_| bad_config(name, "bad OperandB constant"))?;
                        Operand::Constant(c)
                    } else {
                        Operand::Processor(s.to_string())
                    })
                }
            };
            let shape = parse_shape(cfg, name)?;
            let algebra = Algebra {
                input_a: cfg.get_str("InputA", ""),
                op,
                operand_b,
                swap: cfg.get_bool("Swap", false),
                shape_hint: shape,
            };
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                algebra,
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Projection".into(),
        Arc::new(|name, cfg, workers| {
            let axis = match cfg.get_str("Axis", "x").as_str() {
                "x" | "X" => ProjectAxis::X,
                "y" | "Y" => ProjectAxis::Y,
                other => return Err(bad_config(name, format!("unknown projection axis '{other}'"))),
            };
            let proj = Projection {
                input: cfg.get_str("Input", ""),
                axis,
                lo: cfg.get_f64("Low", 0.0),
                up: cfg.get_f64("Up", 0.0),
                weighted: cfg.get_bool("Weighted", false),
                exclusion_value: cfg.get_f64("ExclusionValue", 0.0) as f32,
                other_axis: axis_from_config(cfg, "Other", "projection"),
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, proj))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Slice1d".into(),
        Arc::new(|name, cfg, workers| {
            let slice = Slice1d { input: cfg.get_str("Input", ""), lo: cfg.get_f64("Low", 0.0), up: cfg.get_f64("Up", 0.0) };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, slice))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Integral".into(),
        Arc::new(|name, cfg, workers| {
            let reduction = match cfg.get_str("Reduction", "sum").as_str() {
                "sum" => Reduction::Sum,
                "mean" => Reduction::Mean,
                "max" => Reduction::Max,
                "min" => Reduction::Min,
                other => return Err(bad_config(name, format!("unknown reduction '{other}'"))),
            };
            let integral = Integral { input: cfg.get_str("Input", ""), reduction };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, integral))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Histogram1d".into(),
        Arc::new(|name, cfg, _workers| {
            let hist = Histogram1d {
                input: cfg.get_str("Input", ""),
                weight: cfg.values.get("Weight").and_then(|v| v.as_str()).map(str::to_string),
                axis: axis_from_config(cfg, "", "hist1d"),
            };
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), hist))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Histogram2d".into(),
        Arc::new(|name, cfg, _workers| {
            let hist = Histogram2d {
                x_input: cfg.get_str("XInput", ""),
                y_input: cfg.get_str("YInput", ""),
                weight: cfg.values.get("Weight").and_then(|v| v.as_str()).map(str::to_string),
                xaxis: axis_from_config(cfg, "X", "x"),
                yaxis: axis_from_config(cfg, "Y", "y"),
            };
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), hist))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Accumulate".into(),
        Arc::new(|name, cfg, _workers| {
            let mode_spec = cfg.get_str("Mode", "mean");
            let parts: Vec<&str> = mode_spec.split(':').collect();
            let mode = match parts.as_slice() {
                ["mean"] => AccumulateMode::Mean,
                ["ema", alpha] => {
                    let alpha: f32 = alpha.parse().map_err(|_| bad_config(name, "bad ema alpha"))?;
                    AccumulateMode::ExponentialMovingAverage(alpha)
                }
                ["sum"] => AccumulateMode::Sum,
                ["bucket", n] => {
                    let bucket: u64 = n.parse().map_err(|_| bad_config(name, "bad bucket size"))?;
                    AccumulateMode::TimeBucketed { bucket }
                }
                other => return Err(bad_config(name, format!("unknown accumulate mode '{}'", other.join(":")))),
            };
            let shape = parse_shape(cfg, name)?;
            let acc = Accumulate::new(cfg.get_str("Input", ""), mode, shape);
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), acc))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "CallCounter".into(),
        Arc::new(|name, cfg, workers| {
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                CallCounter::new(),
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "StatsProbe".into(),
        Arc::new(|name, cfg, workers| {
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                StatsProbe::new(cfg.get_str("Input", "")),
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "IirFilter".into(),
        Arc::new(|name, cfg, workers| {
            let shape = parse_shape(cfg, name)?;
            let filt = IirFilter::new(cfg.get_str("Input", ""), cfg.get_f64("Alpha", 0.1) as f32, shape);
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, filt))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Constant".into(),
        Arc::new(|name, cfg, workers| {
            let mut value = parse_shape(cfg, name)?;
            value.set_value(cfg.get_f64("Value", 0.0) as f32);
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                Constant { value },
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "ValueChanged".into(),
        Arc::new(|name, cfg, _workers| {
            let vc = ValueChanged::new(cfg.get_str("Input", ""), cfg.get_f64("Difference", 0.0) as f32);
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), vc))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "ClearResult".into(),
        Arc::new(|name, cfg, workers| {
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                ClearResult { target: cfg.get_str("Target", "") },
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Quit".into(),
        Arc::new(|name, cfg, workers| {
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, Quit::new()))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "IdOnList".into(),
        Arc::new(|name, cfg, workers| {
            let ids = cfg
                .get_str("Ids", "")
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().parse::<u64>().map_err(|_| bad_config(name, format!("bad id '{s}'"))))
                .collect::<CassResult<Vec<_>>>()?;
            Ok(Arc::new(BaseProcessor::new(
                name,
                cfg.dependencies.clone(),
                cfg.condition.clone(),
                workers,
                IdOnList::new(ids),
            )) as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "DarkCal".into(),
        Arc::new(|name, cfg, workers| {
            let update_spec = cfg.get_str("UpdateKind", "cumulative");
            let parts: Vec<&str> = update_spec.split(':').collect();
            let update_kind = match parts.as_slice() {
                ["cumulative"] => UpdateKind::Cumulative,
                ["moving", alpha] => {
                    let alpha: f64 = alpha.parse().map_err(|_| bad_config(name, "bad moving alpha"))?;
                    UpdateKind::Moving { alpha }
                }
                other => return Err(bad_config(name, format!("unknown update kind '{}'", other.join(":")))),
            };
            let bounds = BadPixelBounds {
                noise_lower: cfg.get_f64("NoiseLower", 1.0) as f32,
                noise_upper: cfg.get_f64("NoiseUpper", 3.0) as f32,
                offset_lower: cfg.get_f64("OffsetLower", -1e20) as f32,
                offset_upper: cfg.get_f64("OffsetUpper", 1e20) as f32,
                min_fraction_trained: cfg.get_f64("MinFractionTrained", 0.9) as f32,
            };
            let cal = DarkCal::new(
                cfg.get_str("Input", ""),
                cfg.get_usize("ImageSize", 0),
                update_kind,
                cfg.get_usize("MinTrainImages", 0) as u64,
                bounds,
            );
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, cal))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "GainCal".into(),
        Arc::new(|name, cfg, _workers| {
            let cal = GainCal::new(
                cfg.get_str("Input", ""),
                cfg.get_usize("ImageSize", 0),
                cfg.get_f64("AduLow", 0.0) as f32,
                cfg.get_f64("AduHigh", 0.0) as f32,
                cfg.get_usize("MinPhotonCount", 0) as u64,
                cfg.get_f64("DefaultGain", 1.0) as f32,
                cfg.get_usize("FramesPerRecalc", 0) as u64,
            );
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), cal))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "HotPixelMask".into(),
        Arc::new(|name, cfg, _workers| {
            let mask = HotPixelMask::new(
                cfg.get_str("Input", ""),
                cfg.get_usize("ImageSize", 0),
                cfg.get_f64("AduLow", 0.0) as f32,
                cfg.get_f64("AduHigh", 0.0) as f32,
                cfg.get_usize("MaxConsecutive", 10) as u32,
                cfg.get_f64("MaxAdu", f64::MAX) as f32,
            );
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), mask))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "CommonMode".into(),
        Arc::new(|name, cfg, workers| {
            let kind = match cfg.get_str("Kind", "median").as_str() {
                "mean" => CalcKind::Mean,
                "median" => CalcKind::Median,
                other => return Err(bad_config(name, format!("unknown common-mode kind '{other}'"))),
            };
            let shape = parse_shape(cfg, name)?;
            let cm = CommonMode {
                input: cfg.get_str("Input", ""),
                width: cfg.get_usize("Width", 1),
                kind,
                snr: cfg.get_f64("Snr", 4.0) as f32,
                shape_hint: shape,
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, cm))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "CovarianceMap".into(),
        Arc::new(|name, cfg, _workers| {
            let axis = axis_from_config(cfg, "", "covariance");
            let cov = CovarianceMap::new(cfg.get_str("WaveInput", ""), cfg.get_str("IntensityInput", ""), axis);
            Ok(Arc::new(AccumulatingProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), cov))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "RawPixelDetectorFrame".into(),
        Arc::new(|name, cfg, workers| {
            let source = RawPixelDetectorFrame {
                detector_index: cfg.get_usize("DetectorIndex", 0),
                columns: cfg.get_usize("Columns", 0),
                rows: cfg.get_usize("Rows", 0),
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, source))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "PixelHitFinder".into(),
        Arc::new(|name, cfg, workers| {
            let finder = PixelHitFinder {
                input: cfg.get_str("Input", ""),
                columns: cfg.get_usize("Columns", 0),
                rows: cfg.get_usize("Rows", 0),
                pedestal: cfg.get_f64("Pedestal", 0.0) as f32,
                mip_threshold: cfg.get_f64("MipThreshold", f64::MAX) as f32,
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, finder))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "Cfd".into(),
        Arc::new(|name, cfg, workers| {
            let cfd = ConstantFractionDiscriminator {
                channel_index: cfg.get_usize("ChannelIndex", 0),
                threshold: cfg.get_f64("Threshold", 0.0),
                fraction: cfg.get_f64("Fraction", 0.5),
                delay_samples: cfg.get_usize("DelaySamples", 1),
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, cfd))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "TdcHitCount".into(),
        Arc::new(|name, cfg, workers| {
            let counter = TdcHitCount { channel_index: cfg.get_usize("ChannelIndex", 0) };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, counter))
                as Arc<dyn ProcNode>)
        }),
    );

    r.insert(
        "DelaylinePosition".into(),
        Arc::new(|name, cfg, workers| {
            let pos = DelaylinePosition {
                u1_channel: cfg.get_usize("U1Channel", 0),
                u2_channel: cfg.get_usize("U2Channel", 1),
                v1_channel: cfg.get_usize("V1Channel", 2),
                v2_channel: cfg.get_usize("V2Channel", 3),
                scale: cfg.get_f64("Scale", 1.0) as f32,
            };
            Ok(Arc::new(BaseProcessor::new(name, cfg.dependencies.clone(), cfg.condition.clone(), workers, pos))
                as Arc<dyn ProcNode>)
        }),
    );

    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::manager::ProcessorManager;
    use crate::processor::DependencyResolver;

    #[test]
    fn builds_an_algebra_graph_from_toml() {
        let toml = r#"
            [general]
            workers = 2
            activate = ["sum"]

            [processor.a]
            kind = "Constant"
            Value = 2.0

            [processor.b]
            kind = "Constant"
            Value = 3.0

            [processor.sum]
            kind = "Algebra"
            dependencies = ["a", "b"]
            InputA = "a"
            Operator = "+"
            OperandB = "b"
        "#;
        let settings = Settings::parse(toml).unwrap();
        let mgr = ProcessorManager::build(settings, 2, builtin_registry()).unwrap();
        let mut evt = crate::event::CassEvent::new();
        evt.id = 1;
        mgr.process_event(&evt).unwrap();
        assert_eq!(mgr.result_of("sum", 1).unwrap().read().get_value(), 5.0);
    }
}
