//! Consolidation of predictions across duplicate photographs.
//!
//! Some test images are duplicate shots of the same physical scene. Given a
//! static partition of image ids into duplicate groups, each member's fused
//! bundle is replaced by the group's unweighted mean. This runs after fold
//! accumulation and before caching.

use crate::channels::MaskRule;
use crate::core::errors::{FusionError, FusionResult};
use crate::fusion::folds::FusedOutputs;

/// Replaces every duplicate-group member's bundle with the group mean.
///
/// The mean includes the mask: group members are distinct photographs with
/// distinct geometry, so no single mask is authoritative. Idempotent by
/// construction, since the mean of identical values is the value itself.
#[derive(Debug)]
pub struct DuplicateConsolidator {
    groups: Vec<Vec<String>>,
}

impl DuplicateConsolidator {
    /// Creates a consolidator from the duplicate groups.
    ///
    /// Groups with fewer than two members carry no information and are
    /// dropped. Group membership is static input (one content fingerprint
    /// per group), never derived here.
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        let groups: Vec<Vec<String>> = groups.into_iter().filter(|g| g.len() > 1).collect();
        Self { groups }
    }

    /// Number of retained (multi-member) groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Averages each group's bundles in place. Non-grouped images are
    /// untouched. A group member missing from `outputs` is invalid input.
    pub fn consolidate(&self, outputs: &mut FusedOutputs) -> FusionResult<()> {
        for group in &self.groups {
            let first = outputs.get(&group[0]).ok_or_else(|| {
                FusionError::invalid_input(format!(
                    "duplicate group member {:?} has no fused output",
                    group[0]
                ))
            })?;

            let weight = 1.0 / group.len() as f32;
            let mut mean = first.zeros_like();
            for id in group {
                let member = outputs.get(id).ok_or_else(|| {
                    FusionError::invalid_input(format!(
                        "duplicate group member {id:?} has no fused output"
                    ))
                })?;
                mean.add_weighted(member, weight, MaskRule::Average)?;
            }

            tracing::debug!(
                group_size = group.len(),
                first = %group[0],
                "consolidated duplicate group"
            );
            for id in group {
                outputs.insert(id.clone(), mean.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::filled_trig_set;
    use approx::assert_abs_diff_eq;

    fn outputs_with(values: &[(&str, f32)]) -> FusedOutputs {
        values
            .iter()
            .map(|(id, v)| {
                let mut set = filled_trig_set(*v, 2, 2);
                set.mask.fill(*v);
                (id.to_string(), set)
            })
            .collect()
    }

    #[test]
    fn test_group_members_get_unweighted_mean() {
        let mut outputs = outputs_with(&[("a", 1.0), ("b", 3.0), ("c", 10.0)]);
        let consolidator =
            DuplicateConsolidator::new(vec![vec!["a".to_string(), "b".to_string()]]);
        consolidator.consolidate(&mut outputs).unwrap();

        assert_abs_diff_eq!(outputs["a"].heatmap[[0, 0, 0]], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(outputs["b"].heatmap[[0, 0, 0]], 2.0, epsilon = 1e-6);
        // Mask is averaged too.
        assert_abs_diff_eq!(outputs["a"].mask[[0, 0, 0]], 2.0, epsilon = 1e-6);
        // Non-grouped image untouched.
        assert_abs_diff_eq!(outputs["c"].heatmap[[0, 0, 0]], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let mut outputs = outputs_with(&[("a", 1.0), ("b", 5.0)]);
        let consolidator =
            DuplicateConsolidator::new(vec![vec!["a".to_string(), "b".to_string()]]);
        consolidator.consolidate(&mut outputs).unwrap();
        let after_first = outputs["a"].heatmap.clone();
        consolidator.consolidate(&mut outputs).unwrap();
        assert_eq!(outputs["a"].heatmap, after_first);
        assert_eq!(outputs["b"].heatmap, after_first);
    }

    #[test]
    fn test_singleton_groups_are_dropped() {
        let consolidator = DuplicateConsolidator::new(vec![
            vec!["solo".to_string()],
            vec!["a".to_string(), "b".to_string()],
        ]);
        assert_eq!(consolidator.group_count(), 1);
    }

    #[test]
    fn test_missing_member_is_invalid_input() {
        let mut outputs = outputs_with(&[("a", 1.0)]);
        let consolidator =
            DuplicateConsolidator::new(vec![vec!["a".to_string(), "ghost".to_string()]]);
        assert!(matches!(
            consolidator.consolidate(&mut outputs),
            Err(FusionError::InvalidInput { .. })
        ));
    }
}
