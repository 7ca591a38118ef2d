//! Layout resolver
//!
//! Projects a [`Template`] onto one order's data. The output is position
//! free: only the elements that should appear, with bindings replaced by
//! text. Width fitting is the thermal formatter's job.
//!
//! A binding that points nowhere is not fatal. It renders as an empty
//! string and is reported with a `warn` (and in [`Resolution::missing_bindings`]).

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::model::{
    Align, Cell, CellContent, Element, ElementContent, ItemColumn, Section, Style, Template,
    Weight,
};
use super::value::{ValueFormatter, is_empty_value, lookup};
use super::TemplateError;
use crate::printing::TargetKind;

/// Item field driving category subheadings
const CATEGORY_FIELD: &str = "category_name";
/// Indent for modifier lines under an item row
const MODIFIER_INDENT: &str = "   ";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum ResolvedNode {
    Text { text: String, style: Style },
    TableRow { cells: Vec<ResolvedCell>, weight: Weight },
    Rule { ch: char },
    /// Boundary between two visible sections
    SectionBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCell {
    pub text: String,
    pub align: Align,
    pub width_fraction: f64,
}

/// Resolved nodes plus the binding paths that had no data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub nodes: Vec<ResolvedNode>,
    pub missing_bindings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LayoutResolver {
    values: ValueFormatter,
}

/// State of one resolve pass
struct Pass<'a> {
    template_id: &'a str,
    order: &'a Value,
    missing: Vec<String>,
}

impl Pass<'_> {
    fn report_missing(&mut self, element: &Element, path: &str) {
        warn!(
            template_id = %self.template_id,
            element_id = %element.id,
            path = %path,
            "Data binding missing, rendering empty"
        );
        self.missing.push(path.to_string());
    }
}

impl LayoutResolver {
    pub fn new(values: ValueFormatter) -> Self {
        Self { values }
    }

    pub fn resolve(
        &self,
        template: &Template,
        order: &Value,
        target: TargetKind,
    ) -> Result<Vec<ResolvedNode>, TemplateError> {
        self.resolve_with_warnings(template, order, target)
            .map(|resolution| resolution.nodes)
    }

    /// Validate, then resolve section by section
    pub fn resolve_with_warnings(
        &self,
        template: &Template,
        order: &Value,
        target: TargetKind,
    ) -> Result<Resolution, TemplateError> {
        template.validate()?;

        let mut pass = Pass {
            template_id: &template.id,
            order,
            missing: Vec::new(),
        };
        let mut nodes = Vec::new();

        for section in &template.sections {
            if !section.visibility.evaluate(order, target) {
                debug!(template_id = %template.id, kind = ?section.kind, "Section hidden");
                continue;
            }

            let mut section_nodes = Vec::new();
            for element in &section.elements {
                self.resolve_element(&mut pass, section, element, &mut section_nodes);
            }
            if section_nodes.is_empty() {
                continue;
            }
            if !nodes.is_empty() {
                nodes.push(ResolvedNode::SectionBreak);
            }
            nodes.append(&mut section_nodes);
        }

        Ok(Resolution {
            nodes,
            missing_bindings: pass.missing,
        })
    }

    fn resolve_element(
        &self,
        pass: &mut Pass<'_>,
        section: &Section,
        element: &Element,
        out: &mut Vec<ResolvedNode>,
    ) {
        match &element.content {
            ElementContent::Literal { text } => out.push(ResolvedNode::Text {
                text: text.clone(),
                style: element.style,
            }),
            ElementContent::Divider { ch } => out.push(ResolvedNode::Rule { ch: *ch }),
            ElementContent::Binding {
                path,
                label,
                format,
            } => {
                let value = match lookup(pass.order, path) {
                    Some(v) if element.show_if_field_not_empty && is_empty_value(v) => return,
                    Some(v) => self.values.format(v, *format),
                    None if element.show_if_field_not_empty => {
                        debug!(element_id = %element.id, path = %path, "Optional binding absent");
                        return;
                    }
                    None => {
                        pass.report_missing(element, path);
                        String::new()
                    }
                };
                let text = match label {
                    Some(label) => format!("{}{}", label, value),
                    None => value,
                };
                out.push(ResolvedNode::Text {
                    text,
                    style: element.style,
                });
            }
            ElementContent::Row { cells } => {
                if let Some(row) = self.resolve_row(pass, element, cells) {
                    out.push(row);
                }
            }
            ElementContent::Items {
                source,
                columns,
                show_modifiers,
            } => {
                let items = match lookup(pass.order, source) {
                    Some(Value::Array(items)) => items,
                    Some(_) | None if element.show_if_field_not_empty => return,
                    _ => {
                        pass.report_missing(element, source);
                        return;
                    }
                };
                if items.is_empty() && element.show_if_field_not_empty {
                    return;
                }
                self.resolve_items(
                    pass,
                    section,
                    element,
                    source,
                    items,
                    columns,
                    *show_modifiers,
                    out,
                );
            }
        }
    }

    fn resolve_row(
        &self,
        pass: &mut Pass<'_>,
        element: &Element,
        cells: &[Cell],
    ) -> Option<ResolvedNode> {
        let mut bound_any = false;
        let mut bound_empty = true;
        let mut resolved = Vec::with_capacity(cells.len());

        for cell in cells {
            let text = match &cell.content {
                CellContent::Literal { text } => text.clone(),
                CellContent::Binding { path, format } => {
                    bound_any = true;
                    match lookup(pass.order, path) {
                        Some(v) => {
                            bound_empty &= is_empty_value(v);
                            self.values.format(v, *format)
                        }
                        None => {
                            if !element.show_if_field_not_empty {
                                pass.report_missing(element, path);
                            }
                            String::new()
                        }
                    }
                }
            };
            resolved.push(ResolvedCell {
                text,
                align: cell.align,
                width_fraction: cell.width_fraction,
            });
        }

        if element.show_if_field_not_empty && bound_any && bound_empty {
            return None;
        }
        Some(ResolvedNode::TableRow {
            cells: resolved,
            weight: element.style.weight,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_items(
        &self,
        pass: &mut Pass<'_>,
        section: &Section,
        element: &Element,
        source: &str,
        items: &[Value],
        columns: &[ItemColumn],
        show_modifiers: bool,
        out: &mut Vec<ResolvedNode>,
    ) {
        if columns.iter().any(|c| c.header.is_some()) {
            out.push(ResolvedNode::TableRow {
                cells: columns
                    .iter()
                    .map(|c| ResolvedCell {
                        text: c.header.clone().unwrap_or_default(),
                        align: c.align,
                        width_fraction: c.width_fraction,
                    })
                    .collect(),
                weight: Weight::Bold,
            });
        }

        let mut current_category: Option<String> = None;
        for (index, item) in items.iter().enumerate() {
            if section.show_category_subheadings {
                let category = lookup(item, CATEGORY_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if current_category.as_deref() != Some(category.as_str()) {
                    if !category.is_empty() {
                        out.push(ResolvedNode::Text {
                            text: category.clone(),
                            style: Style::bold(),
                        });
                    }
                    current_category = Some(category);
                }
            }

            let cells = columns
                .iter()
                .map(|column| {
                    let text = match lookup(item, &column.field) {
                        Some(v) => self.values.format(v, column.format),
                        None => {
                            pass.report_missing(
                                element,
                                &format!("{}.{}.{}", source, index, column.field),
                            );
                            String::new()
                        }
                    };
                    ResolvedCell {
                        text,
                        align: column.align,
                        width_fraction: column.width_fraction,
                    }
                })
                .collect();
            out.push(ResolvedNode::TableRow {
                cells,
                weight: element.style.weight,
            });

            if show_modifiers {
                push_modifiers(item, out);
            }
        }
    }
}

/// `options` and `note` lines under an item
fn push_modifiers(item: &Value, out: &mut Vec<ResolvedNode>) {
    if let Some(Value::Array(options)) = lookup(item, "options") {
        for option in options {
            let text = match option {
                Value::String(s) => s.clone(),
                other => lookup(other, "name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };
            if text.trim().is_empty() {
                continue;
            }
            out.push(ResolvedNode::Text {
                text: format!("{}- {}", MODIFIER_INDENT, text),
                style: Style::default(),
            });
        }
    }

    if let Some(note) = lookup(item, "note").and_then(Value::as_str)
        && !note.trim().is_empty()
    {
        out.push(ResolvedNode::Text {
            text: format!("{}* {}", MODIFIER_INDENT, note),
            style: Style::default(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::model::{FieldFormat, SectionKind, Visibility};
    use serde_json::json;

    fn resolver() -> LayoutResolver {
        LayoutResolver::new(ValueFormatter::new("£", chrono_tz::Europe::London))
    }

    fn element(id: &str, content: ElementContent) -> Element {
        Element {
            id: id.into(),
            content,
            style: Style::default(),
            show_if_field_not_empty: false,
        }
    }

    fn binding(path: &str) -> ElementContent {
        ElementContent::Binding {
            path: path.into(),
            label: None,
            format: FieldFormat::Text,
        }
    }

    fn section(kind: SectionKind, elements: Vec<Element>) -> Section {
        Section {
            kind,
            elements,
            visibility: Visibility::Always,
            show_category_subheadings: false,
        }
    }

    fn template(sections: Vec<Section>) -> Template {
        Template {
            id: "receipt".into(),
            name: "Receipt".into(),
            paper_width_columns: 32,
            sections,
        }
    }

    fn texts(nodes: &[ResolvedNode]) -> Vec<&str> {
        nodes
            .iter()
            .filter_map(|n| match n {
                ResolvedNode::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_optional_field_suppresses_only_that_element() {
        let mut address = element("addr", binding("deliveryAddress"));
        address.show_if_field_not_empty = true;
        let t = template(vec![section(
            SectionKind::CustomerInfo,
            vec![
                element("name", binding("customer.name")),
                address,
                element("phone", binding("customer.phone")),
            ],
        )]);
        let order = json!({
            "deliveryAddress": "",
            "customer": { "name": "Ann", "phone": "0123" }
        });

        let nodes = resolver().resolve(&t, &order, TargetKind::Receipt).unwrap();
        assert_eq!(texts(&nodes), vec!["Ann", "0123"]);
    }

    #[test]
    fn test_unknown_binding_renders_empty_and_is_reported() {
        let t = template(vec![section(
            SectionKind::OrderInfo,
            vec![element(
                "table",
                ElementContent::Binding {
                    path: "table.name".into(),
                    label: Some("Table: ".into()),
                    format: FieldFormat::Text,
                },
            )],
        )]);

        let resolution = resolver()
            .resolve_with_warnings(&t, &json!({}), TargetKind::Receipt)
            .unwrap();
        assert_eq!(texts(&resolution.nodes), vec!["Table: "]);
        assert_eq!(resolution.missing_bindings, vec!["table.name".to_string()]);
    }

    #[test]
    fn test_hidden_sections_and_breaks() {
        let mut kitchen = section(
            SectionKind::Decorative,
            vec![element("k", ElementContent::Literal { text: "KITCHEN".into() })],
        );
        kitchen.visibility = Visibility::TargetKinds {
            kinds: vec![TargetKind::KitchenTicket],
        };
        let t = template(vec![
            section(
                SectionKind::Header,
                vec![element("h", ElementContent::Literal { text: "SHOP".into() })],
            ),
            kitchen,
            section(
                SectionKind::Footer,
                vec![element("f", ElementContent::Divider { ch: '=' })],
            ),
        ]);

        let nodes = resolver().resolve(&t, &json!({}), TargetKind::Receipt).unwrap();
        assert_eq!(
            nodes,
            vec![
                ResolvedNode::Text {
                    text: "SHOP".into(),
                    style: Style::default()
                },
                ResolvedNode::SectionBreak,
                ResolvedNode::Rule { ch: '=' },
            ]
        );
    }

    #[test]
    fn test_items_grouped_by_category() {
        let columns = vec![
            ItemColumn {
                field: "name".into(),
                align: Align::Left,
                width_fraction: 0.6,
                format: FieldFormat::Text,
                header: None,
            },
            ItemColumn {
                field: "quantity".into(),
                align: Align::Right,
                width_fraction: 0.1,
                format: FieldFormat::Quantity,
                header: None,
            },
            ItemColumn {
                field: "price".into(),
                align: Align::Right,
                width_fraction: 0.3,
                format: FieldFormat::Currency,
                header: None,
            },
        ];
        let mut items_section = section(
            SectionKind::ItemList,
            vec![element(
                "items",
                ElementContent::Items {
                    source: "items".into(),
                    columns,
                    show_modifiers: true,
                },
            )],
        );
        items_section.show_category_subheadings = true;
        let t = template(vec![items_section]);

        let order = json!({
            "items": [
                { "name": "Tea", "quantity": 2, "price": 3, "category_name": "Drinks" },
                { "name": "Coffee", "quantity": 1, "price": 2.5, "category_name": "Drinks",
                  "options": ["Oat milk"] },
                { "name": "Cake", "quantity": 1, "price": 4.25, "category_name": "Food",
                  "note": "No nuts" }
            ]
        });

        let nodes = resolver().resolve(&t, &order, TargetKind::Receipt).unwrap();
        assert_eq!(
            texts(&nodes),
            vec!["Drinks", "   - Oat milk", "Food", "   * No nuts"]
        );
        let rows: Vec<Vec<String>> = nodes
            .iter()
            .filter_map(|n| match n {
                ResolvedNode::TableRow { cells, .. } => {
                    Some(cells.iter().map(|c| c.text.clone()).collect())
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                vec!["Tea", "2", "£3.00"],
                vec!["Coffee", "1", "£2.50"],
                vec!["Cake", "1", "£4.25"],
            ]
        );
        // subheading precedes the first item of its group
        assert!(matches!(
            &nodes[0],
            ResolvedNode::Text { style, .. } if style.weight == Weight::Bold
        ));
    }

    #[test]
    fn test_invalid_template_fails_before_output() {
        let t = template(vec![section(SectionKind::Header, vec![])]);
        let err = resolver()
            .resolve(&t, &json!({}), TargetKind::Receipt)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Invalid { .. }));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let t = template(vec![section(
            SectionKind::Totals,
            vec![element(
                "total",
                ElementContent::Row {
                    cells: vec![
                        Cell {
                            content: CellContent::Literal { text: "TOTAL".into() },
                            align: Align::Left,
                            width_fraction: 0.5,
                        },
                        Cell {
                            content: CellContent::Binding {
                                path: "total".into(),
                                format: FieldFormat::Currency,
                            },
                            align: Align::Right,
                            width_fraction: 0.5,
                        },
                    ],
                },
            )],
        )]);
        let order = json!({ "total": 12.5 });

        let first = resolver().resolve(&t, &order, TargetKind::Receipt).unwrap();
        let second = resolver().resolve(&t, &order, TargetKind::Receipt).unwrap();
        assert_eq!(first, second);
        match &first[0] {
            ResolvedNode::TableRow { cells, .. } => assert_eq!(cells[1].text, "£12.50"),
            other => panic!("unexpected node: {:?}", other),
        }
    }
}
