//! Print service - the engine's public surface
//!
//! Submission renders synchronously (template errors fail the call and
//! nothing is queued) and returns as soon as the job is durably enqueued.
//! Whether it ever reaches paper is reported through the job, never through
//! the submission.

use std::collections::HashMap;

use serde_json::Value;

use super::command::{PrintCommand, preview_lines};
use super::device::{Device, DeviceRegistry};
use super::job::{JobStatus, NewPrintJob, PrintJob, TargetKind};
use super::storage::PrintQueueStore;
use crate::core::{EngineResult, PrintEngineError};
use crate::template::value::lookup;
use crate::template::{LayoutResolver, Template, TemplateCatalog};
use crate::thermal::{RenderSettings, ThermalFormatter};

/// Output of one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub template_id: String,
    pub columns: usize,
    pub commands: Vec<PrintCommand>,
    /// Bindings that found no data and printed empty
    pub missing_bindings: Vec<String>,
}

pub struct PrintService {
    store: PrintQueueStore,
    catalog: TemplateCatalog,
    registry: DeviceRegistry,
    settings: RenderSettings,
    resolver: LayoutResolver,
    formatter: ThermalFormatter,
    routes: HashMap<TargetKind, String>,
}

impl PrintService {
    pub fn new(
        store: PrintQueueStore,
        catalog: TemplateCatalog,
        registry: DeviceRegistry,
        settings: RenderSettings,
    ) -> Self {
        Self {
            resolver: LayoutResolver::new(settings.value_formatter()),
            formatter: settings.formatter(),
            store,
            catalog,
            registry,
            settings,
            routes: HashMap::new(),
        }
    }

    /// Send jobs of `target` to the named device's queue
    pub fn with_route(mut self, target: TargetKind, device: impl Into<String>) -> Self {
        self.routes.insert(target, device.into());
        self
    }

    pub fn store(&self) -> &PrintQueueStore {
        &self.store
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    // ========== Rendering ==========

    /// Resolve and format a catalog template
    pub fn render(
        &self,
        template_id: &str,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<RenderedDocument> {
        let template = self
            .catalog
            .get(template_id)
            .ok_or_else(|| PrintEngineError::TemplateNotFound(template_id.to_string()))?;
        self.render_template(&template, order_data, target)
    }

    /// Resolve and format a template snapshot held by the caller
    pub fn render_template(
        &self,
        template: &Template,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<RenderedDocument> {
        let resolution = self
            .resolver
            .resolve_with_warnings(template, order_data, target)?;
        let columns = self.settings.columns_for(template);
        let commands = self.formatter.format(&resolution.nodes, columns);

        Ok(RenderedDocument {
            template_id: template.id.clone(),
            columns,
            commands,
            missing_bindings: resolution.missing_bindings,
        })
    }

    /// Plain-text preview for the operator; nothing is queued
    pub fn preview(
        &self,
        template_id: &str,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<Vec<String>> {
        let document = self.render(template_id, order_data, target)?;
        Ok(preview_lines(&document.commands, document.columns))
    }

    // ========== Submission ==========

    /// Render `order_data` with a catalog template and enqueue the result
    ///
    /// The render reflects exactly the data passed in.
    pub fn submit_print_job(
        &self,
        template_id: &str,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<String> {
        let device = self.route(target)?;
        let document = self.render(template_id, order_data, target)?;
        self.enqueue(document, device, order_data, target)
    }

    /// Same as [`submit_print_job`](Self::submit_print_job) for a template
    /// not stored in the catalog
    pub fn submit_with_template(
        &self,
        template: &Template,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<String> {
        let device = self.route(target)?;
        let document = self.render_template(template, order_data, target)?;
        self.enqueue(document, device, order_data, target)
    }

    fn route(&self, target: TargetKind) -> EngineResult<String> {
        self.routes
            .get(&target)
            .cloned()
            .ok_or_else(|| PrintEngineError::DeviceNotFound(target.to_string()))
    }

    fn enqueue(
        &self,
        document: RenderedDocument,
        device: String,
        order_data: &Value,
        target: TargetKind,
    ) -> EngineResult<String> {
        let order_id = match lookup(order_data, "order_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let job = self.store.enqueue(NewPrintJob {
            order_id,
            template_id: document.template_id,
            target_kind: target,
            device,
            payload: document.commands,
        })?;

        tracing::info!(
            job_id = %job.id,
            order_id = %job.order_id,
            device = %job.device,
            target = %target,
            "Print job submitted"
        );
        Ok(job.id)
    }

    // ========== Operator ==========

    pub fn list_jobs(&self, status: Option<JobStatus>) -> EngineResult<Vec<PrintJob>> {
        Ok(self.store.list_jobs(status)?)
    }

    pub fn get_job(&self, id: &str) -> EngineResult<PrintJob> {
        self.store
            .get_job(id)?
            .ok_or_else(|| PrintEngineError::JobNotFound(id.to_string()))
    }

    /// Put a `FAILED` job back in the queue with a fresh attempt budget
    pub fn retry_job(&self, id: &str) -> EngineResult<PrintJob> {
        let job = self.store.retry(id)?;
        tracing::info!(job_id = %id, "Print job retried by operator");
        Ok(job)
    }

    /// Cancel a job that has not started printing
    pub fn cancel_job(&self, id: &str) -> EngineResult<PrintJob> {
        let job = self.store.cancel(id)?;
        tracing::info!(job_id = %id, "Print job cancelled");
        Ok(job)
    }

    pub fn list_devices(&self) -> Vec<Device> {
        self.registry.list()
    }
}
