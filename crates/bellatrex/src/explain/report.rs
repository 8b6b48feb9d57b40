//! Text reports: rule files and inline rule printing.
//!
//! Reports are side output. Every I/O failure is logged as a warning and
//! never reaches the caller.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::Sample;
use crate::ensemble::Ensemble;
use crate::logger::SearchLogger;
use crate::repr::PathStep;

/// Most rules printed per tree; deeper paths are truncated.
pub const MAX_RULES_PRINT: usize = 10;

/// Weight written for trees that were not selected.
pub const UNSELECTED_WEIGHT: f64 = -1.0;

/// Format a prediction: `"0.1234"` for one value, `"[0.1234, 0.5678]"` for more.
pub fn format_prediction(values: &[f64]) -> String {
    match values {
        [single] => format!("{single:.4}"),
        _ => {
            let parts: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

/// Companion path for unselected trees: `rules.txt` becomes `rules-extra.txt`.
pub fn extra_path(out_file: &Path) -> PathBuf {
    let stem = out_file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    out_file.with_file_name(format!("{stem}-extra.txt"))
}

/// The sample's decision path through tree `idx`, one rule per line.
///
/// ```text
/// tree 3, weight 0.5000
///   x0 = 0.1200 <= 0.5000
///   x1 = 1.0000 > 0.5000
///   leaf prediction: 0.4000
/// ```
pub fn render_rules(
    ensemble: &dyn Ensemble,
    sample: &Sample,
    idx: usize,
    weight: f64,
) -> Result<String, crate::ensemble::EnsembleError> {
    let tree = ensemble.tree(idx)?;
    let prediction = ensemble.predict_tree(idx, sample)?;
    let (path, _) = tree.decision_path(sample.values());

    let block = RuleBlock { sample, idx, weight, path: &path, prediction: &prediction };
    Ok(block.to_string())
}

/// One tree's rules as printed to the rules files.
struct RuleBlock<'a> {
    sample: &'a Sample,
    idx: usize,
    weight: f64,
    path: &'a [PathStep],
    prediction: &'a [f64],
}

impl fmt::Display for RuleBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree {}, weight {:.4}", self.idx, self.weight)?;
        for step in self.path.iter().take(MAX_RULES_PRINT) {
            let op = if step.went_left { "<=" } else { ">" };
            let value = self.sample.values().get(step.feature).copied().unwrap_or(f64::NAN);
            writeln!(
                f,
                "  {} = {:.4} {} {:.4}",
                self.sample.column_name(step.feature),
                value,
                op,
                step.threshold
            )?;
        }
        if self.path.len() > MAX_RULES_PRINT {
            writeln!(f, "  ... {} more rules", self.path.len() - MAX_RULES_PRINT)?;
        }
        writeln!(f, "  leaf prediction: {}", format_prediction(self.prediction))
    }
}

/// One-line rule summary: `x0 <= 0.5000 AND x1 > 0.5000 -> 0.4000 (weight 0.50)`.
pub fn render_rules_inline(
    ensemble: &dyn Ensemble,
    sample: &Sample,
    idx: usize,
    weight: f64,
) -> Result<String, crate::ensemble::EnsembleError> {
    let tree = ensemble.tree(idx)?;
    let prediction = ensemble.predict_tree(idx, sample)?;
    let (path, _) = tree.decision_path(sample.values());
    let rules: Vec<String> = path
        .iter()
        .take(MAX_RULES_PRINT)
        .map(|step| {
            let op = if step.went_left { "<=" } else { ">" };
            format!("{} {} {:.4}", sample.column_name(step.feature), op, step.threshold)
        })
        .collect();
    let rules = if rules.is_empty() { "(root)".to_string() } else { rules.join(" AND ") };
    Ok(format!("tree {idx}: {rules} -> {} (weight {weight:.2})", format_prediction(&prediction)))
}

fn write_rules(
    path: &Path,
    ensemble: &dyn Ensemble,
    sample: &Sample,
    trees: impl IntoIterator<Item = (usize, f64)>,
    footer: Option<&str>,
) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (idx, weight) in trees {
        let block = render_rules(ensemble, sample, idx, weight)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(block.as_bytes())?;
    }
    if let Some(footer) = footer {
        writer.write_all(footer.as_bytes())?;
    }
    writer.flush()
}

/// Write the selected trees' rules to `out_file` and every other tree to
/// its `-extra.txt` companion. Both files are overwritten.
///
/// Failures are warned through `logger` and otherwise ignored.
pub fn write_rule_files(
    out_file: &Path,
    ensemble: &dyn Ensemble,
    sample: &Sample,
    final_trees_idx: &[usize],
    weights: &[f64],
    prediction: &[f64],
    logger: &SearchLogger,
) {
    let footer = format!("Bellatrex prediction: {}", format_prediction(prediction));
    let selected = final_trees_idx.iter().copied().zip(weights.iter().copied());
    if let Err(err) = write_rules(out_file, ensemble, sample, selected, Some(&footer)) {
        logger.warn(format!("could not write rules to {}: {err}", out_file.display()));
    }

    let extra = extra_path(out_file);
    let unselected = (0..ensemble.n_estimators())
        .filter(|idx| !final_trees_idx.contains(idx))
        .map(|idx| (idx, UNSELECTED_WEIGHT));
    if let Err(err) = write_rules(&extra, ensemble, sample, unselected, None) {
        logger.warn(format!("could not write rules to {}: {err}", extra.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{ForestModel, OutputSemantics};
    use crate::logger::Verbosity;
    use crate::repr::{Forest, Tree};

    fn stumps() -> ForestModel {
        let forest = Forest::from_trees(vec![
            Tree::stump(0, 0.5, vec![1.0], vec![2.0]),
            Tree::stump(1, 0.5, vec![3.0], vec![4.0]),
            Tree::constant(vec![5.0]),
        ])
        .unwrap();
        ForestModel::fitted(forest, OutputSemantics::Regression).unwrap()
    }

    #[test]
    fn prediction_strings() {
        assert_eq!(format_prediction(&[0.12345]), "0.1235");
        assert_eq!(format_prediction(&[0.1, 0.25]), "[0.1000, 0.2500]");
        assert_eq!(format_prediction(&[]), "[]");
    }

    #[test]
    fn extra_path_keeps_directory() {
        assert_eq!(extra_path(Path::new("out/rules.txt")), PathBuf::from("out/rules-extra.txt"));
        assert_eq!(extra_path(Path::new("rules")), PathBuf::from("rules-extra.txt"));
    }

    #[test]
    fn renders_decision_path() {
        let model = stumps();
        let sample = Sample::from_values(vec![0.2, 0.9]);
        let text = render_rules(&model, &sample, 1, 0.5).unwrap();
        assert_eq!(text, "tree 1, weight 0.5000\n  x1 = 0.9000 > 0.5000\n  leaf prediction: 4.0000\n");

        let inline = render_rules_inline(&model, &sample, 0, 0.25).unwrap();
        assert_eq!(inline, "tree 0: x0 <= 0.5000 -> 1.0000 (weight 0.25)");
        let root = render_rules_inline(&model, &sample, 2, 1.0).unwrap();
        assert!(root.starts_with("tree 2: (root) -> 5.0000"));
    }

    #[test]
    fn long_paths_are_truncated() {
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let tree = crate::testing::random_tree(&mut rng, 4, 12, 1);
        let model = ForestModel::fitted(Forest::from_trees(vec![tree]).unwrap(), OutputSemantics::Regression).unwrap();
        let sample = Sample::from_values(vec![0.5; 4]);

        let text = render_rules(&model, &sample, 0, 1.0).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + MAX_RULES_PRINT + 2);
        assert_eq!(lines[0], "tree 0, weight 1.0000");
        assert_eq!(lines[MAX_RULES_PRINT + 1], "  ... 2 more rules");
        assert!(lines[MAX_RULES_PRINT + 2].starts_with("  leaf prediction: "));
    }

    #[test]
    fn writes_selected_and_extra_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rules.txt");
        let model = stumps();
        let sample = Sample::from_values(vec![0.2, 0.9]);
        let logger = SearchLogger::new(Verbosity::Silent);

        write_rule_files(&out, &model, &sample, &[0], &[1.0], &[1.0], &logger);

        let main = std::fs::read_to_string(&out).unwrap();
        assert!(main.starts_with("tree 0, weight 1.0000"));
        assert!(main.ends_with("Bellatrex prediction: 1.0000"));

        let extra = std::fs::read_to_string(dir.path().join("rules-extra.txt")).unwrap();
        assert!(extra.contains("tree 1, weight -1.0000"));
        assert!(extra.contains("tree 2, weight -1.0000"));
        assert!(!extra.contains("tree 0,"));
    }

    #[test]
    fn unwritable_path_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("rules.txt");
        let model = stumps();
        let sample = Sample::from_values(vec![0.2, 0.9]);
        write_rule_files(&out, &model, &sample, &[0], &[1.0], &[1.0], &SearchLogger::new(Verbosity::Warning));
        assert!(!out.exists());
    }
}
