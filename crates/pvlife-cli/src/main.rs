//! pvlife command-line interface.
//!
//! Reads JSON job files, runs one analysis and writes the result as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pvlife_analysis::{
    BatchConfig, FitConfig, FitJob, FitResult, IvMeasurement, IvResult, Param,
    PhotoconductanceConfig, PhotoconductanceResult, QeJob, QeResult, SimulationJob, fit_batch,
    fit_lifetime, process_iv, process_photoconductance, process_quantum_efficiency,
    process_suns_voc, simulate_lifetime,
};
use pvlife_core::{PhotoconductanceRecord, SunsVocRecord};
use pvlife_core::units::{format_density, format_j0, format_si};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "pvlife")]
#[command(about = "Carrier lifetime and solar cell analysis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print a human-readable summary to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a recombination model to a lifetime curve
    Fit {
        /// Job file with `curve` and an optional `config`
        job: PathBuf,
    },

    /// Evaluate a recombination model at given parameters
    Simulate {
        /// Job file with the wafer, model and parameter values
        job: PathBuf,
    },

    /// Derive the lifetime curve from a raw photoconductance record
    Photoconductance {
        /// Measurement record file
        record: PathBuf,

        /// Keep the flash rise and noise tail
        #[arg(long)]
        no_trim: bool,

        /// Fit the standard model to the derived curve
        #[arg(long)]
        fit: bool,
    },

    /// Derive the lifetime curve from a raw Suns-Voc record
    SunsVoc {
        /// Measurement record file
        record: PathBuf,

        /// Fit the standard model to the derived curve
        #[arg(long)]
        fit: bool,
    },

    /// Internal quantum efficiency and loss breakdown
    Qe {
        /// Job file with wavelength, EQE, reflectance and an optional
        /// `config` and solar `spectrum`
        job: PathBuf,
    },

    /// Current-voltage performance and parasitic resistances
    Iv {
        /// File with area and the full, half and dark sweeps
        measurement: PathBuf,
    },

    /// Fit many lifetime curves in parallel
    Batch {
        /// Job files; ids default to the file stem
        #[arg(required = true)]
        jobs: Vec<PathBuf>,

        /// Minimum jobs before fits run in parallel
        #[arg(long, default_value_t = 4)]
        min_parallel: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = match &cli.command {
        Commands::Fit { job } => run_fit(job, cli.verbose)?,
        Commands::Simulate { job } => run_simulate(job, cli.verbose)?,
        Commands::Photoconductance {
            record,
            no_trim,
            fit,
        } => run_photoconductance(record, !no_trim, *fit, cli.verbose)?,
        Commands::SunsVoc { record, fit } => run_suns_voc(record, *fit, cli.verbose)?,
        Commands::Qe { job } => run_qe(job, cli.verbose)?,
        Commands::Iv { measurement } => run_iv(measurement, cli.verbose)?,
        Commands::Batch { jobs, min_parallel } => run_batch(jobs, *min_parallel, cli.verbose)?,
    };

    write_output(&output, cli.output.as_deref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialise result")
}

fn write_output(value: &Value, path: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs::write(path, text + "\n")
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn run_fit(path: &Path, verbose: bool) -> Result<Value> {
    let job: FitJob = read_json(path)?;
    let result = fit_lifetime(&job.curve, &job.config)
        .with_context(|| format!("Fit failed for {}", path.display()))?;
    if verbose {
        print_fit_summary(&result);
    }
    to_value(&result)
}

fn run_simulate(path: &Path, verbose: bool) -> Result<Value> {
    let job: SimulationJob = read_json(path)?;
    let result = simulate_lifetime(&job)
        .with_context(|| format!("Simulation failed for {}", path.display()))?;
    if verbose {
        print_fit_summary(&result);
    }
    to_value(&result)
}

fn run_photoconductance(path: &Path, trim: bool, fit: bool, verbose: bool) -> Result<Value> {
    let record: PhotoconductanceRecord = read_json(path)?;
    let config = PhotoconductanceConfig::default().with_trim(trim);
    let derived = process_photoconductance(&record, &config)
        .with_context(|| format!("Photoconductance analysis failed for {}", path.display()))?;
    if verbose {
        print_photoconductance_summary(&derived);
    }
    with_optional_fit(derived, fit, path, verbose)
}

fn run_suns_voc(path: &Path, fit: bool, verbose: bool) -> Result<Value> {
    let record: SunsVocRecord = read_json(path)?;
    let derived = process_suns_voc(&record, &PhotoconductanceConfig::default())
        .with_context(|| format!("Suns-Voc analysis failed for {}", path.display()))?;
    if verbose {
        print_photoconductance_summary(&derived);
    }
    with_optional_fit(derived, fit, path, verbose)
}

fn with_optional_fit(
    derived: PhotoconductanceResult,
    fit: bool,
    path: &Path,
    verbose: bool,
) -> Result<Value> {
    if !fit {
        return to_value(&derived);
    }
    let result = fit_lifetime(&derived.to_lifetime_curve(), &FitConfig::default())
        .with_context(|| format!("Fit failed for the curve derived from {}", path.display()))?;
    if verbose {
        print_fit_summary(&result);
    }
    Ok(json!({
        "photoconductance": to_value(&derived)?,
        "fit": to_value(&result)?,
    }))
}

fn run_qe(path: &Path, verbose: bool) -> Result<Value> {
    let job: QeJob = read_json(path)?;
    let result = process_quantum_efficiency(&job.measurement, &job.config, job.spectrum.as_ref())
        .with_context(|| format!("Quantum efficiency analysis failed for {}", path.display()))?;
    if verbose {
        print_qe_summary(&result);
    }
    to_value(&result)
}

fn run_iv(path: &Path, verbose: bool) -> Result<Value> {
    let measurement: IvMeasurement = read_json(path)?;
    let result = process_iv(&measurement)
        .with_context(|| format!("IV analysis failed for {}", path.display()))?;
    if verbose {
        print_iv_summary(&result);
    }
    to_value(&result)
}

fn run_batch(paths: &[PathBuf], min_parallel: usize, verbose: bool) -> Result<Value> {
    let jobs = paths
        .iter()
        .map(|path| -> Result<FitJob> {
            let mut job: FitJob = read_json(path)?;
            if job.id.is_empty() {
                job.id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
            }
            Ok(job)
        })
        .collect::<Result<Vec<_>>>()?;

    let report = fit_batch(&jobs, &BatchConfig::default().with_min_parallel(min_parallel));

    if verbose {
        eprintln!(
            "Batch: {} jobs, {} succeeded, {} failed{}",
            report.len(),
            report.succeeded(),
            report.failed(),
            if report.parallel { " (parallel)" } else { "" }
        );
        for (id, kind, err) in report.failures() {
            eprintln!("  {}: {:?} error: {}", id, kind, err);
        }
    }

    let items = report
        .outcomes
        .iter()
        .map(|outcome| -> Result<Value> {
            Ok(match &outcome.result {
                Ok(result) => json!({
                    "id": outcome.id,
                    "ok": true,
                    "result": to_value(result)?,
                }),
                Err(err) => json!({
                    "id": outcome.id,
                    "ok": false,
                    "kind": err.kind(),
                    "error": err.to_string(),
                }),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(items))
}

fn print_fit_summary(result: &FitResult) {
    eprintln!("Model parameters:");
    for p in &result.parameters {
        let value = match p.param {
            Param::J0 | Param::J02 => format_j0(p.value),
            _ => format_si(p.value, "s"),
        };
        eprintln!("  {:<6} = {}", p.param.name(), value);
    }
    if let Some(r2) = result.r_squared {
        eprintln!("  R^2    = {:.6}", r2);
    }

    let m = &result.metrics;
    eprintln!("At dn = {}:", format_density(m.nd));
    eprintln!("  t_eff  = {}", format_si(m.t_eff, "s"));
    if let Some(t_blk) = m.t_blk {
        eprintln!("  t_blk  = {}", format_si(t_blk, "s"));
    }
    if let Some(k) = m.k_val {
        eprintln!("  k      = {:.4}", k);
    }
    eprintln!("  iVoc   = {}", format_si(m.implied_voc, "V"));

    if let Some(d) = &result.diagnostics {
        eprintln!(
            "Solver: {} samples, {} iterations, {:?}",
            d.samples, d.iterations, d.termination
        );
    }
}

fn print_photoconductance_summary(result: &PhotoconductanceResult) {
    eprintln!("Photoconductance:");
    eprintln!("  samples = {}", result.nd.len());
    eprintln!("  N_M     = {}", format_density(result.doping.majority()));
    eprintln!("  iVoc    = {} (1 sun)", format_si(result.implied_voc, "V"));
    if let Some(rho) = result.calc_wafer_resistivity {
        eprintln!("  rho     = {:.4} ohm cm (dark)", rho);
    }
}

fn print_qe_summary(result: &QeResult) {
    let peak = result.iqe.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    eprintln!("Quantum efficiency:");
    eprintln!("  samples  = {}", result.wavelength.len());
    eprintln!("  peak IQE = {:.4}", peak);
    if let Some(loss) = &result.loss {
        let n = loss.total.len() as f64;
        eprintln!("  mean loss = {:.4}", loss.total.iter().sum::<f64>() / n);
    }
}

fn print_iv_summary(result: &IvResult) {
    let p = &result.performance;
    eprintln!("Current-voltage:");
    eprintln!("  Isc  = {}", format_si(p.isc, "A"));
    eprintln!("  Voc  = {}", format_si(p.voc, "V"));
    eprintln!("  FF   = {:.4}", p.ff);
    eprintln!("  eta  = {:.4}", p.eta);
    eprintln!("  Rs   = {}", format_si(result.rs, "ohm"));
    eprintln!("  Rp   = {}", format_si(result.rp, "ohm"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn job_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SIMULATION: &str = r#"{
        "temperature": 298.15,
        "wafer_thickness": 0.03,
        "doping": {"n_d": 1e15, "n_a": 0.0},
        "parameters": {"J_0": 1e-14, "t_m0": 1e-4, "t_M0": 1e-4}
    }"#;

    #[test]
    fn test_simulate_then_fit() {
        let sim = job_file(SIMULATION);
        let simulated = run_simulate(sim.path(), false).unwrap();
        assert_eq!(simulated["curves"]["dn"].as_array().unwrap().len(), 100);
        assert!(simulated["R2"].is_null());

        let fit = json!({
            "curve": {
                "nd": simulated["curves"]["dn"],
                "tau": simulated["curves"]["tau_eff"],
                "temperature": 298.15,
                "wafer_thickness": 0.03,
                "doping": {"n_d": 1e15, "n_a": 0.0}
            }
        });
        let job = job_file(&fit.to_string());
        let result = run_fit(job.path(), false).unwrap();
        assert!(result["R2"].as_f64().unwrap() > 0.999);
        assert_eq!(result["parameters"][0]["param"], "J_0");
    }

    #[test]
    fn test_batch_reports_each_file() {
        let broken = job_file(
            r#"{"curve": {"nd": [1e15], "tau": [], "temperature": 298.15,
                "wafer_thickness": 0.03, "doping": {"n_d": 1e15, "n_a": 0.0}}}"#,
        );
        let items = run_batch(&[broken.path().to_path_buf()], 4, false).unwrap();
        let item = &items[0];
        assert_eq!(item["ok"], false);
        assert_eq!(item["kind"], "input");
        let stem = broken.path().file_stem().unwrap().to_string_lossy().into_owned();
        assert_eq!(item["id"], stem.as_str());
    }

    #[test]
    fn test_qe_job() {
        let job = job_file(
            r#"{"wavelength": [250.0, 300.0, 350.0, 400.0], "eqe": [0.5, 0.8, 0.9, 0.9],
                "reflectance": [0.3, 0.2, 0.1, 0.1], "config": {"contact_shading": 0.04}}"#,
        );
        let result = run_qe(job.path(), false).unwrap();
        assert_eq!(result["wavelength"].as_array().unwrap().len(), 3);
        let iqe = result["iqe"][0].as_f64().unwrap();
        assert!((iqe - 0.8 * 1.2).abs() < 1e-12);
        assert_eq!(result["loss"]["shading"][0], 0.04);
        assert!(result.get("spectrum").is_none());
    }

    #[test]
    fn test_suns_voc_rejects_dark_record() {
        let record = job_file(
            r#"{"time": [0.0, 1e-6, 2e-6], "voltage": [0.0, 0.0, 0.0], "illumination": [0.0, 0.0, 0.0],
                "temperature": 298.15, "wafer_thickness": 0.018, "wafer_optical_const": 0.7,
                "wafer_doping_type": "n-type", "wafer_resistivity": 1.0, "illumination_mode": "trans"}"#,
        );
        let err = run_suns_voc(record.path(), false, false).unwrap_err();
        assert!(err.to_string().contains("Suns-Voc analysis failed"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = run_iv(Path::new("/nonexistent/iv.json"), false).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_output_file() {
        let out = NamedTempFile::new().unwrap();
        write_output(&json!({"a": 1}), Some(out.path())).unwrap();
        let back: Value = serde_json::from_str(&fs::read_to_string(out.path()).unwrap()).unwrap();
        assert_eq!(back["a"], 1);
    }
}
