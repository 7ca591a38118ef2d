//! Receipt template model
//!
//! A template is an ordered list of sections. Each section holds elements
//! whose content is a closed union: data binding, literal text, divider,
//! table row, or an item table expanded from an order array. Styles carry
//! alignment and weight only; a thermal head has no sub-character geometry.

use receipt_printer::char_cells;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TemplateError;
use super::value::{is_empty_value, lookup};
use crate::printing::TargetKind;

/// Allowed rounding slack when summing width fractions
const FRACTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Characters per line; 0 means "use the configured paper width"
    #[serde(default)]
    pub paper_width_columns: usize,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub kind: SectionKind,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Insert a subheading whenever the item category changes
    #[serde(default)]
    pub show_category_subheadings: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Header,
    OrderInfo,
    ItemList,
    CustomerInfo,
    Totals,
    Footer,
    Decorative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub content: ElementContent,
    #[serde(default)]
    pub style: Style,
    /// Drop this element when its binding is absent or empty
    #[serde(default)]
    pub show_if_field_not_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ElementContent {
    /// Field looked up by dotted path, optionally prefixed by a label
    Binding {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default)]
        format: FieldFormat,
    },
    Literal {
        text: String,
    },
    /// Full-width rule
    Divider {
        #[serde(rename = "char")]
        ch: char,
    },
    /// One table row with fixed cells
    Row {
        cells: Vec<Cell>,
    },
    /// One table row per entry of the `source` array
    Items {
        #[serde(default = "default_items_source")]
        source: String,
        columns: Vec<ItemColumn>,
        /// Print `options` and `note` under each row
        #[serde(default = "default_true")]
        show_modifiers: bool,
    },
}

fn default_items_source() -> String {
    "items".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub content: CellContent,
    #[serde(default)]
    pub align: Align,
    pub width_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CellContent {
    Binding {
        path: String,
        #[serde(default)]
        format: FieldFormat,
    },
    Literal {
        text: String,
    },
}

/// Column of an item table, bound to a field of each item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemColumn {
    pub field: String,
    #[serde(default)]
    pub align: Align,
    pub width_fraction: f64,
    #[serde(default)]
    pub format: FieldFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Style {
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub weight: Weight,
}

impl Style {
    pub fn bold() -> Self {
        Self {
            align: Align::Left,
            weight: Weight::Bold,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    #[default]
    Normal,
    Bold,
}

/// How a bound value becomes text
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    #[default]
    Text,
    /// Symbol prefix, two decimals
    Currency,
    /// Integer when whole, two decimals otherwise
    Quantity,
    /// Unix millis or RFC 3339, rendered in the configured timezone
    Datetime,
}

/// Section visibility predicate
///
/// Pure function of the order data and the job's target kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "when", rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Always,
    /// `order_type` is one of the listed values
    OrderTypes { types: Vec<String> },
    TargetKinds { kinds: Vec<TargetKind> },
    FieldPresent { path: String },
    FieldNotEmpty { path: String },
    All { conditions: Vec<Visibility> },
    Any { conditions: Vec<Visibility> },
    Not { condition: Box<Visibility> },
}

impl Visibility {
    pub fn evaluate(&self, order: &Value, target: TargetKind) -> bool {
        match self {
            Visibility::Always => true,
            Visibility::OrderTypes { types } => lookup(order, "order_type")
                .and_then(Value::as_str)
                .is_some_and(|t| types.iter().any(|want| want.eq_ignore_ascii_case(t))),
            Visibility::TargetKinds { kinds } => kinds.contains(&target),
            Visibility::FieldPresent { path } => lookup(order, path).is_some(),
            Visibility::FieldNotEmpty { path } => {
                lookup(order, path).is_some_and(|v| !is_empty_value(v))
            }
            Visibility::All { conditions } => conditions.iter().all(|c| c.evaluate(order, target)),
            Visibility::Any { conditions } => conditions.iter().any(|c| c.evaluate(order, target)),
            Visibility::Not { condition } => !condition.evaluate(order, target),
        }
    }
}

impl Template {
    /// Reject templates that cannot produce a complete receipt
    pub fn validate(&self) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::Invalid {
            template_id: self.id.clone(),
            reason,
        };

        if self.sections.is_empty() {
            return Err(invalid("template has no sections".into()));
        }

        for (index, section) in self.sections.iter().enumerate() {
            if section.elements.is_empty() {
                return Err(invalid(format!(
                    "section {} ({:?}) has no elements",
                    index, section.kind
                )));
            }
            for element in &section.elements {
                validate_element(element).map_err(|reason| {
                    invalid(format!("element '{}': {}", element.id, reason))
                })?;
            }
        }
        Ok(())
    }
}

fn validate_element(element: &Element) -> Result<(), String> {
    match &element.content {
        ElementContent::Binding { path, .. } => validate_path(path),
        ElementContent::Literal { .. } => Ok(()),
        ElementContent::Divider { ch } => {
            if char_cells(*ch) == 0 {
                return Err(format!("divider char {:?} is not printable", ch));
            }
            Ok(())
        }
        ElementContent::Row { cells } => {
            if cells.is_empty() {
                return Err("row has no cells".into());
            }
            for cell in cells {
                if let CellContent::Binding { path, .. } = &cell.content {
                    validate_path(path)?;
                }
            }
            validate_fractions(cells.iter().map(|c| c.width_fraction))
        }
        ElementContent::Items { source, columns, .. } => {
            validate_path(source)?;
            if columns.is_empty() {
                return Err("item table has no columns".into());
            }
            for column in columns {
                validate_path(&column.field)?;
            }
            validate_fractions(columns.iter().map(|c| c.width_fraction))
        }
    }
}

fn validate_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() || path.split('.').any(str::is_empty) {
        return Err(format!("invalid binding path '{}'", path));
    }
    Ok(())
}

fn validate_fractions(fractions: impl Iterator<Item = f64>) -> Result<(), String> {
    let mut sum = 0.0;
    for fraction in fractions {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(format!("invalid width fraction {}", fraction));
        }
        sum += fraction;
    }
    if sum > 1.0 + FRACTION_EPSILON {
        return Err(format!("width fractions sum to {:.3} (> 1.0)", sum));
    }
    Ok(())
}
