//! Persisted run artifacts: the auditable per-image decode record and the
//! final submission table.

use crate::core::errors::{FusionError, FusionResult};
use crate::core::tensor::Tensor2D;
use crate::fusion::{FinalizedDetections, DETECTION_COLUMNS};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the full (pre-threshold) decoded tables keyed by image id as a
/// human-inspectable JSON record.
pub fn write_audit_record(
    path: impl AsRef<Path>,
    detections: &BTreeMap<String, FinalizedDetections>,
) -> FusionResult<()> {
    let record: BTreeMap<&str, Vec<Vec<f32>>> = detections
        .iter()
        .map(|(image_id, finalized)| {
            let rows: Vec<Vec<f32>> = finalized
                .full
                .outer_iter()
                .map(|row| row.to_vec())
                .collect();
            (image_id.as_str(), rows)
        })
        .collect();

    let file = File::create(path.as_ref()).map_err(FusionError::CacheIo)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &record)
        .map_err(|e| FusionError::CacheEncoding(Box::new(e)))?;
    Ok(())
}

/// Encodes kept detections as one summary string: the first 7 columns of
/// each row, space-joined across rows.
pub fn encode_detections(kept: &Tensor2D) -> String {
    kept.outer_iter()
        .flat_map(|row| {
            row.iter()
                .take(DETECTION_COLUMNS)
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes the final filtered submission table: one row per image with its
/// string-encoded detection summary.
pub fn write_submission_table(
    path: impl AsRef<Path>,
    detections: &BTreeMap<String, FinalizedDetections>,
) -> FusionResult<()> {
    let file = File::create(path.as_ref()).map_err(FusionError::CacheIo)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "ImageId,PredictionString").map_err(FusionError::CacheIo)?;
    for (image_id, finalized) in detections {
        writeln!(writer, "{image_id},{}", encode_detections(&finalized.kept))
            .map_err(FusionError::CacheIo)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn finalized(rows: usize, fill: f32) -> FinalizedDetections {
        FinalizedDetections {
            full: Array2::from_elem((rows + 1, DETECTION_COLUMNS), fill),
            kept: Array2::from_elem((rows, DETECTION_COLUMNS), fill),
        }
    }

    #[test]
    fn test_encode_detections_flattens_rows() {
        let kept = Array2::from_shape_fn((2, DETECTION_COLUMNS), |(r, c)| (r * 10 + c) as f32);
        let encoded = encode_detections(&kept);
        assert_eq!(encoded, "0 1 2 3 4 5 6 10 11 12 13 14 15 16");
    }

    #[test]
    fn test_encode_detections_empty_table() {
        let kept = Array2::zeros((0, DETECTION_COLUMNS));
        assert_eq!(encode_detections(&kept), "");
    }

    #[test]
    fn test_submission_table_has_one_row_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.csv");

        let mut detections = BTreeMap::new();
        detections.insert("img_a".to_string(), finalized(1, 0.5));
        detections.insert("img_b".to_string(), finalized(2, 1.0));
        write_submission_table(&path, &detections).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ImageId,PredictionString");
        assert!(lines[1].starts_with("img_a,0.5 0.5"));
        assert!(lines[2].starts_with("img_b,1 1"));
    }

    #[test]
    fn test_audit_record_round_trips_full_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decoded.json");

        let mut detections = BTreeMap::new();
        detections.insert("img".to_string(), finalized(1, 2.0));
        write_audit_record(&path, &detections).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, Vec<Vec<f32>>> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["img"].len(), 2); // full table, pre-threshold
        assert_eq!(parsed["img"][0].len(), DETECTION_COLUMNS);
        assert_eq!(parsed["img"][1][3], 2.0);
    }
}
