//! Argument encoding: [`ParameterModel`] → ordered command-argument sequence.
//!
//! The engine parses exactly the command line a user would type for the
//! `pdfextend` CLI, so the encoder emits `--flag=value` tokens in a fixed
//! order and copies every value verbatim. The sequence is recomputed on every
//! render and every submission; it has no identity of its own.
//!
//! ```text
//! pdfextend in.pdf out.pdf [--left=N] [--right=N] [--top=N] [--bottom=N]
//!     --spacing=N --line-width=N --unit=U [--grid=G] [--extra-page] [--mirror]
//!     --color=C
//! ```

use crate::model::{Grid, ParameterModel};
use std::fmt;

/// First token: the program the engine emulates.
pub const PROGRAM_TOKEN: &str = "pdfextend";
/// Second token: placeholder for the source document.
pub const INPUT_PLACEHOLDER: &str = "in.pdf";
/// Third token: placeholder for the result document.
pub const OUTPUT_PLACEHOLDER: &str = "out.pdf";

/// An encoded command-argument sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    /// The space-joined command string sent to the engine.
    pub fn to_command_string(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_string())
    }
}

/// Encode `model` into its command-argument sequence.
///
/// Margins are emitted only when their string is non-empty: `"0"` produces
/// `--left=0`, while `""` produces nothing. Callers validate first; the
/// encoder itself never fails.
pub fn encode(model: &ParameterModel) -> Command {
    let mut args: Vec<String> = vec![
        PROGRAM_TOKEN.to_string(),
        INPUT_PLACEHOLDER.to_string(),
        OUTPUT_PLACEHOLDER.to_string(),
    ];

    let margins = [
        ("left", &model.left_margin),
        ("right", &model.right_margin),
        ("top", &model.top_margin),
        ("bottom", &model.bottom_margin),
    ];
    for (side, value) in margins {
        if !value.is_empty() {
            args.push(format!("--{side}={value}"));
        }
    }

    args.push(format!("--spacing={}", model.spacing));
    args.push(format!("--line-width={}", model.line_width));
    args.push(format!("--unit={}", model.unit));

    if model.grid != Grid::None {
        args.push(format!("--grid={}", model.grid));
    }
    if model.extra_page {
        args.push("--extra-page".to_string());
    }
    if model.mirror {
        args.push("--mirror".to_string());
    }

    args.push(format!("--color={}", model.color));

    Command { args }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;

    fn scenario_a() -> ParameterModel {
        ParameterModel {
            left_margin: "10".into(),
            right_margin: "".into(),
            top_margin: "0".into(),
            bottom_margin: "".into(),
            spacing: "5".into(),
            line_width: "0.3".into(),
            grid: Grid::Squares,
            unit: Unit::Mm,
            mirror: false,
            extra_page: true,
            color: "#f0f0f0".into(),
            file: None,
        }
    }

    #[test]
    fn scenario_a_sequence() {
        let cmd = encode(&scenario_a());
        assert_eq!(
            cmd.args(),
            [
                "pdfextend",
                "in.pdf",
                "out.pdf",
                "--left=10",
                "--top=0",
                "--spacing=5",
                "--line-width=0.3",
                "--unit=mm",
                "--grid=squares",
                "--extra-page",
                "--color=#f0f0f0",
            ]
        );
    }

    #[test]
    fn scenario_b_no_grid_flag() {
        let mut m = scenario_a();
        m.grid = Grid::None;
        let cmd = encode(&m);
        assert!(!cmd.args().iter().any(|a| a.starts_with("--grid")));
    }

    #[test]
    fn encoding_is_deterministic() {
        let m = scenario_a();
        assert_eq!(encode(&m), encode(&m));
    }

    #[test]
    fn zero_margin_emitted_empty_margin_omitted() {
        let sides = ["left", "right", "top", "bottom"];
        for (i, side) in sides.iter().enumerate() {
            let mut m = ParameterModel::default();
            let slot = match i {
                0 => &mut m.left_margin,
                1 => &mut m.right_margin,
                2 => &mut m.top_margin,
                _ => &mut m.bottom_margin,
            };
            *slot = "0".into();
            let with_zero = encode(&m);
            assert!(with_zero.args().contains(&format!("--{side}=0")));

            let without = encode(&ParameterModel::default());
            assert!(!without
                .args()
                .iter()
                .any(|a| a.starts_with(&format!("--{side}="))));
        }
    }

    #[test]
    fn presence_flags_follow_booleans() {
        let mut m = ParameterModel::default();
        let cmd = encode(&m);
        assert!(!cmd.args().contains(&"--mirror".to_string()));
        assert!(!cmd.args().contains(&"--extra-page".to_string()));

        m.mirror = true;
        let cmd = encode(&m);
        assert!(cmd.args().contains(&"--mirror".to_string()));
        assert!(!cmd.args().contains(&"--extra-page".to_string()));
    }

    #[test]
    fn extra_page_precedes_mirror_and_color_is_last() {
        let mut m = ParameterModel::default();
        m.mirror = true;
        m.extra_page = true;
        let args = encode(&m).into_args();
        let pos = |t: &str| args.iter().position(|a| a == t).unwrap();
        assert!(pos("--extra-page") < pos("--mirror"));
        assert_eq!(args.last().unwrap(), "--color=#f0f0f0");
    }

    #[test]
    fn values_are_not_canonicalised() {
        let mut m = ParameterModel::default();
        m.spacing = "05.50".into();
        m.unit = Unit::Pt;
        let s = encode(&m).to_command_string();
        assert_eq!(
            s,
            "pdfextend in.pdf out.pdf --spacing=05.50 --line-width=0.3 --unit=pt --color=#f0f0f0"
        );
    }
}
