//! Preset parameter values offered next to each typed-in field.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const FLIP_ANGLES: [&str; 5] = ["pi/4", "pi/2", "pi*3/4", "pi", "b"];
pub const PHASES: [&str; 5] = ["x", "y", "-x", "-y", "f"];
pub const CS_ANGLES: [&str; 3] = ["pi/2", "pi", "q"];
pub const JC_ANGLES: [&str; 4] = ["pi/8", "pi/4", "pi/2", "pi"];
/// Evolution times matching `JC_ANGLES`, in units of the coupling constant.
pub const JC_ANGLE_LABELS: [&str; 4] = ["1/(8J)", "1/(4J)", "1/(2J)", "1/(J)"];

pub const DEFAULT_FLIP_ANGLE: &str = "pi/2";
pub const DEFAULT_PHASE: &str = "x";
pub const DEFAULT_CS_ANGLE: &str = "q";
pub const DEFAULT_JC_ANGLE: &str = "pi/2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presets {
    pub flip_angles: Vec<String>,
    pub phases: Vec<String>,
    pub cs_angles: Vec<String>,
    pub jc_pairs: Vec<(String, String)>,
    pub jc_angles: Vec<String>,
    pub jc_angle_labels: Vec<String>,
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn last_char(label: &str) -> String {
    label.chars().last().map(String::from).unwrap_or_default()
}

/// Ordered label pairs `(a, b)` with `b` later than `a` in `labels`.
pub fn coupling_pairs(labels: &[String]) -> Vec<(String, String)> {
    labels
        .iter()
        .cloned()
        .tuple_combinations::<(String, String)>()
        .collect()
}

impl Presets {
    pub fn for_labels(labels: &[String]) -> Self {
        let mut cs_angles = to_strings(&CS_ANGLES);
        cs_angles.extend(labels.iter().map(|l| format!("o{l}*t")));

        let jc_pairs = coupling_pairs(labels);
        let mut jc_angles = to_strings(&JC_ANGLES);
        jc_angles.extend(
            jc_pairs
                .iter()
                .map(|(a, b)| format!("pi*J{}{}*t", last_char(a), last_char(b))),
        );

        Self {
            flip_angles: to_strings(&FLIP_ANGLES),
            phases: to_strings(&PHASES),
            cs_angles,
            jc_pairs,
            jc_angles,
            jc_angle_labels: to_strings(&JC_ANGLE_LABELS),
        }
    }

    /// Pair targets as they appear on the J-coupling buttons, e.g. `IS`.
    pub fn jc_pair_labels(&self) -> Vec<String> {
        self.jc_pairs.iter().map(|(a, b)| format!("{a}{b}")).collect()
    }

    pub fn has_j_coupling(&self) -> bool {
        !self.jc_pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_presets_for_two_spins() {
        let presets = Presets::for_labels(&labels(&["I", "S"]));
        assert_eq!(presets.cs_angles, vec!["pi/2", "pi", "q", "oI*t", "oS*t"]);
        assert_eq!(presets.jc_pairs, vec![("I".to_string(), "S".to_string())]);
        assert_eq!(presets.jc_pair_labels(), vec!["IS"]);
        assert_eq!(
            presets.jc_angles,
            vec!["pi/8", "pi/4", "pi/2", "pi", "pi*JIS*t"]
        );
        assert_eq!(presets.phases[..4], ["x", "y", "-x", "-y"]);
    }

    #[test]
    fn test_coupling_pairs_follow_label_order() {
        let pairs = coupling_pairs(&labels(&["H1", "C2", "N3"]));
        let pairs: Vec<String> = pairs.iter().map(|(a, b)| format!("{a}{b}")).collect();
        assert_eq!(pairs, vec!["H1C2", "H1N3", "C2N3"]);
        let presets = Presets::for_labels(&labels(&["H1", "C2", "N3"]));
        assert!(presets.jc_angles.contains(&"pi*J12*t".to_string()));
        assert!(presets.jc_angles.contains(&"pi*J23*t".to_string()));
    }

    #[test]
    fn test_single_spin_has_no_j_coupling() {
        let presets = Presets::for_labels(&labels(&["I"]));
        assert!(!presets.has_j_coupling());
        assert_eq!(presets.jc_angles.len(), JC_ANGLES.len());
    }
}
