//! The parameter model: one margin-extension request as the user edits it.
//!
//! Numeric fields are kept as the raw strings the user typed. The engine
//! receives them verbatim (see [`crate::command`]), so the model never
//! canonicalises `"5.0"` into `"5"` or `"010"` into `"10"`. An empty margin
//! string means "omit this side" and is distinct from an explicit `"0"`.
//!
//! Validation is data-driven: [`validate::NUMBER_RULES`] lists the bounds of
//! every numeric field and [`ParameterModel::validate`] walks that table plus
//! the color and file rules, producing a [`Validation`] report.

pub mod validate;

use crate::error::ExtendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub use validate::{NumberRule, Validation, NUMBER_RULES};

// ── Enumerations ─────────────────────────────────────────────────────────

/// Grid drawn into the added margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grid {
    /// No grid; the margins stay blank. (default)
    #[default]
    None,
    Squares,
    Lines,
    Dots,
}

impl Grid {
    pub const ALL: [Grid; 4] = [Grid::None, Grid::Squares, Grid::Lines, Grid::Dots];

    pub fn as_str(self) -> &'static str {
        match self {
            Grid::None => "none",
            Grid::Squares => "squares",
            Grid::Lines => "lines",
            Grid::Dots => "dots",
        }
    }

    /// Label for the line-width field: dots are sized, lines are stroked.
    pub fn line_width_label(self) -> &'static str {
        match self {
            Grid::Dots => "Dot width",
            _ => "Line width",
        }
    }
}

/// Unit of every numeric field (`pt` = 1/72 in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Mm,
    Cm,
    In,
    Pt,
}

impl Unit {
    pub const ALL: [Unit; 4] = [Unit::Mm, Unit::Cm, Unit::In, Unit::Pt];

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Mm => "mm",
            Unit::Cm => "cm",
            Unit::In => "in",
            Unit::Pt => "pt",
        }
    }
}

macro_rules! str_enum_impls {
    ($ty:ty, $field:expr) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ExtendError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| ExtendError::UnknownValue {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

str_enum_impls!(Grid, Field::Grid);
str_enum_impls!(Unit, Field::Unit);

// ── Fields ───────────────────────────────────────────────────────────────

/// Every user-editable field of [`ParameterModel`].
///
/// The serialised names match the keys of the persisted preference record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    LeftMargin,
    RightMargin,
    TopMargin,
    BottomMargin,
    Spacing,
    LineWidth,
    Grid,
    Unit,
    Mirror,
    ExtraPage,
    Color,
    File,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::LeftMargin,
        Field::RightMargin,
        Field::TopMargin,
        Field::BottomMargin,
        Field::Spacing,
        Field::LineWidth,
        Field::Grid,
        Field::Unit,
        Field::Mirror,
        Field::ExtraPage,
        Field::Color,
        Field::File,
    ];

    /// Key of this field in the persisted record.
    pub fn name(self) -> &'static str {
        match self {
            Field::LeftMargin => "leftMargin",
            Field::RightMargin => "rightMargin",
            Field::TopMargin => "topMargin",
            Field::BottomMargin => "bottomMargin",
            Field::Spacing => "spacing",
            Field::LineWidth => "lineWidth",
            Field::Grid => "grid",
            Field::Unit => "unit",
            Field::Mirror => "mirror",
            Field::ExtraPage => "extraPage",
            Field::Color => "color",
            Field::File => "file",
        }
    }

    /// Human-readable label for form layers.
    pub fn label(self) -> &'static str {
        match self {
            Field::LeftMargin => "Left",
            Field::RightMargin => "Right",
            Field::TopMargin => "Top",
            Field::BottomMargin => "Bottom",
            Field::Spacing => "Spacing",
            Field::LineWidth => "Line width",
            Field::Grid => "Grid",
            Field::Unit => "Unit",
            Field::Mirror => "Mirror margins on even pages",
            Field::ExtraPage => "Add extra page",
            Field::Color => "Color",
            Field::File => "PDF file",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Source file ──────────────────────────────────────────────────────────

/// An opaque handle to the document the user picked.
///
/// The bytes sit behind an `Arc`, so handing the file to the background
/// worker shares the buffer instead of copying it.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    data: Arc<[u8]>,
}

impl SourceFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, keeping only its final path component as name.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

// ── The model ────────────────────────────────────────────────────────────

/// One margin-extension request.
///
/// Serialises to the persisted preference record; `file` is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterModel {
    /// Extend to the left by this amount. Empty: flag omitted.
    pub left_margin: String,
    pub right_margin: String,
    pub top_margin: String,
    pub bottom_margin: String,

    /// Distance between grid lines. Default: `"5"`.
    pub spacing: String,

    /// Stroke width of lines, or diameter of dots. Default: `"0.3"`.
    pub line_width: String,

    pub grid: Grid,
    pub unit: Unit,

    /// Swap left and right margins on even pages.
    pub mirror: bool,

    /// Append a page covered entirely by the grid.
    pub extra_page: bool,

    /// Grid color as `#rgb`, `#rrggbb` or `#rrggbbaa`. Default: `"#f0f0f0"`.
    pub color: String,

    #[serde(skip)]
    pub file: Option<SourceFile>,
}

impl Default for ParameterModel {
    fn default() -> Self {
        Self {
            left_margin: String::new(),
            right_margin: String::new(),
            top_margin: String::new(),
            bottom_margin: String::new(),
            spacing: "5".to_string(),
            line_width: "0.3".to_string(),
            grid: Grid::default(),
            unit: Unit::default(),
            mirror: false,
            extra_page: false,
            color: "#f0f0f0".to_string(),
            file: None,
        }
    }
}

impl ParameterModel {
    /// The string form of `field`, as a form layer would display it.
    ///
    /// `File` yields the file name, or an empty string when none is chosen.
    pub fn get(&self, field: Field) -> String {
        match field {
            Field::Grid => self.grid.to_string(),
            Field::Unit => self.unit.to_string(),
            Field::Mirror => self.mirror.to_string(),
            Field::ExtraPage => self.extra_page.to_string(),
            Field::File => self
                .file
                .as_ref()
                .map(|f| f.name().to_string())
                .unwrap_or_default(),
            text => self.text_field(text).cloned().unwrap_or_default(),
        }
    }

    /// Set `field` from its string form.
    ///
    /// Text fields accept anything (validation reports bad values later);
    /// enumerations and booleans must parse. `File` cannot be set from a
    /// string, use [`ParameterModel::set_file`].
    pub fn set(&mut self, field: Field, value: &str) -> Result<(), ExtendError> {
        let unknown = || ExtendError::UnknownValue {
            field,
            value: value.to_string(),
        };
        match field {
            Field::Grid => self.grid = value.parse()?,
            Field::Unit => self.unit = value.parse()?,
            Field::Mirror => self.mirror = parse_bool(value).ok_or_else(unknown)?,
            Field::ExtraPage => self.extra_page = parse_bool(value).ok_or_else(unknown)?,
            Field::File => return Err(unknown()),
            text => {
                if let Some(slot) = self.text_field_mut(text) {
                    *slot = value.to_string();
                }
            }
        }
        Ok(())
    }

    pub fn set_file(&mut self, file: Option<SourceFile>) {
        self.file = file;
    }

    /// Validate every field. See [`validate`] for the rules.
    pub fn validate(&self) -> Validation {
        validate::validate_model(self)
    }

    /// Display label of `field` under the current grid style.
    pub fn label(&self, field: Field) -> &'static str {
        match field {
            Field::LineWidth => self.grid.line_width_label(),
            other => other.label(),
        }
    }

    /// `true` when nothing blocks submission.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The raw string of a numeric or color field.
    pub(crate) fn text_field(&self, field: Field) -> Option<&String> {
        match field {
            Field::LeftMargin => Some(&self.left_margin),
            Field::RightMargin => Some(&self.right_margin),
            Field::TopMargin => Some(&self.top_margin),
            Field::BottomMargin => Some(&self.bottom_margin),
            Field::Spacing => Some(&self.spacing),
            Field::LineWidth => Some(&self.line_width),
            Field::Color => Some(&self.color),
            _ => None,
        }
    }

    fn text_field_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::LeftMargin => Some(&mut self.left_margin),
            Field::RightMargin => Some(&mut self.right_margin),
            Field::TopMargin => Some(&mut self.top_margin),
            Field::BottomMargin => Some(&mut self.bottom_margin),
            Field::Spacing => Some(&mut self.spacing),
            Field::LineWidth => Some(&mut self.line_width),
            Field::Color => Some(&mut self.color),
            _ => None,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let m = ParameterModel::default();
        assert_eq!(m.left_margin, "");
        assert_eq!(m.spacing, "5");
        assert_eq!(m.line_width, "0.3");
        assert_eq!(m.grid, Grid::None);
        assert_eq!(m.unit, Unit::Mm);
        assert!(!m.mirror && !m.extra_page);
        assert_eq!(m.color, "#f0f0f0");
        assert!(m.file.is_none());
    }

    #[test]
    fn get_set_round_trip_every_field() {
        let mut m = ParameterModel::default();
        m.set(Field::TopMargin, "12.5").unwrap();
        m.set(Field::Grid, "Dots").unwrap();
        m.set(Field::Unit, "in").unwrap();
        m.set(Field::Mirror, "true").unwrap();
        m.set(Field::Color, "#abc").unwrap();

        assert_eq!(m.get(Field::TopMargin), "12.5");
        assert_eq!(m.get(Field::Grid), "dots");
        assert_eq!(m.get(Field::Unit), "in");
        assert_eq!(m.get(Field::Mirror), "true");
        assert_eq!(m.get(Field::ExtraPage), "false");
        assert_eq!(m.get(Field::Color), "#abc");
        assert_eq!(m.get(Field::File), "");
    }

    #[test]
    fn set_rejects_unknown_enum_value() {
        let mut m = ParameterModel::default();
        let err = m.set(Field::Grid, "hexagons").unwrap_err();
        assert!(matches!(err, ExtendError::UnknownValue { field: Field::Grid, .. }));
        assert_eq!(m.grid, Grid::None);
    }

    #[test]
    fn set_text_field_keeps_raw_string() {
        let mut m = ParameterModel::default();
        m.set(Field::Spacing, "05.0").unwrap();
        assert_eq!(m.spacing, "05.0");
    }

    #[test]
    fn file_cannot_be_set_from_string() {
        let mut m = ParameterModel::default();
        assert!(m.set(Field::File, "a.pdf").is_err());
        m.set_file(Some(SourceFile::from_bytes("a.pdf", vec![1, 2, 3])));
        assert_eq!(m.get(Field::File), "a.pdf");
    }

    #[test]
    fn source_file_clone_shares_buffer() {
        let f = SourceFile::from_bytes("doc.pdf", vec![0u8; 1024]);
        let g = f.clone();
        assert!(Arc::ptr_eq(f.data(), g.data()));
    }

    #[test]
    fn serialised_record_skips_file_and_uses_camel_case() {
        let mut m = ParameterModel::default();
        m.extra_page = true;
        m.file = Some(SourceFile::from_bytes("x.pdf", vec![]));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["extraPage"], true);
        assert_eq!(json["lineWidth"], "0.3");
        assert_eq!(json["grid"], "none");
        assert!(json.get("file").is_none());
    }

    #[test]
    fn dots_relabel_line_width() {
        assert_eq!(Grid::Dots.line_width_label(), "Dot width");
        assert_eq!(Grid::Squares.line_width_label(), "Line width");

        let mut m = ParameterModel::default();
        assert_eq!(m.label(Field::LineWidth), "Line width");
        m.set(Field::Grid, "dots").unwrap();
        assert_eq!(m.label(Field::LineWidth), "Dot width");
        assert_eq!(m.label(Field::Spacing), "Spacing");
    }
}
