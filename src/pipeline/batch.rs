// src/pipeline/batch.rs
//
// Directory-level processing used by the binary.

use super::diagnostics::TrialDiagnostics;
use super::trial::Trial;
use crate::source::load_json_trial;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// All `*.json` trial files under `dir`, skipping diagnostics written by
/// earlier runs.
pub fn find_trial_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        anyhow::bail!("input directory {} does not exist", dir.display());
    }

    let mut trials: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .filter(|p| !p.to_string_lossy().ends_with(".diagnostics.json"))
        .collect();
    trials.sort();

    info!("Found {} trial files in {}", trials.len(), dir.display());
    Ok(trials)
}

pub fn process_trial(path: &Path, config: &Config) -> Result<TrialDiagnostics> {
    let source = load_json_trial(path).with_context(|| format!("loading {}", path.display()))?;
    let mut trial = Trial::new(source, config.clone()).with_context(|| format!("analysing {}", path.display()))?;
    Ok(trial.diagnostics()?)
}

/// Writes `<trial>.diagnostics.json` into `out_dir` and returns its path.
pub fn write_diagnostics(diag: &TrialDiagnostics, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let path = out_dir.join(format!("{}.diagnostics.json", file_stem_for(&diag.trial)));
    fs::write(&path, diag.to_json()?).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Single path component derived from a trial name.
fn file_stem_for(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    if stem.chars().all(|c| c == '.') {
        "trial".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_trial_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("walk01.json"), "{}").unwrap();
        fs::create_dir(dir.path().join("session2")).unwrap();
        fs::write(dir.path().join("session2/walk02.JSON"), "{}").unwrap();
        fs::write(dir.path().join("walk01.diagnostics.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = find_trial_files(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"walk01.json".to_string()));
        assert!(names.contains(&"walk02.JSON".to_string()));
    }

    #[test]
    fn test_missing_input_dir() {
        assert!(find_trial_files("/nonexistent/gait/trials").is_err());
    }

    #[test]
    fn test_broken_trial_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"name\": 1}").unwrap();
        assert!(process_trial(&path, &Config::default()).is_err());
    }

    #[test]
    fn test_diagnostics_stay_in_output_dir() {
        assert_eq!(file_stem_for("walk01"), "walk01");
        assert_eq!(file_stem_for("../../etc/walk"), ".._.._etc_walk");
        assert_eq!(file_stem_for(".."), "trial");
        assert_eq!(file_stem_for(""), "trial");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut diag = crate::pipeline::TrialDiagnostics {
            trial: "../escaped".to_string(),
            frame_rate: 100.0,
            frame_count: 0,
            thresholds: Vec::new(),
            events: Vec::new(),
            side_errors: Vec::new(),
            cycle_errors: Vec::new(),
            rejected_cycles: Vec::new(),
            contacts: Vec::new(),
            reconcile: Default::default(),
            plate_context: Default::default(),
            summary: Default::default(),
        };
        let written = write_diagnostics(&diag, &out).unwrap();
        assert_eq!(written.parent(), Some(out.as_path()));
        assert!(written.exists());

        diag.trial = "a/b".to_string();
        let written = write_diagnostics(&diag, &out).unwrap();
        assert_eq!(written, out.join("a_b.diagnostics.json"));
    }
}
