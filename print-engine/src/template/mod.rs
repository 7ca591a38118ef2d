//! Receipt templates and the layout resolver

pub mod catalog;
pub mod model;
pub mod resolver;
pub mod value;

use thiserror::Error;

pub use catalog::TemplateCatalog;
pub use model::{
    Align, Cell, CellContent, Element, ElementContent, FieldFormat, ItemColumn, Section,
    SectionKind, Style, Template, Visibility, Weight,
};
pub use resolver::{LayoutResolver, Resolution, ResolvedCell, ResolvedNode};
pub use value::ValueFormatter;

/// Template defects; never retried
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{template_id}' invalid: {reason}")]
    Invalid { template_id: String, reason: String },

    #[error("Template source {source_name} unreadable: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Template IO error: {0}")]
    Io(#[from] std::io::Error),
}
