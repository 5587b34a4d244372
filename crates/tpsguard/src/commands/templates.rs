//! Template command handlers. Everything except `import` stays local.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use tpsguard_core::{
    FileTemplateStore, NotifyFlags, Template, TemplateLibrary, TemplateStore, TemplateSummary,
};

use crate::cli::{GlobalOpts, OutputFormat, TemplatesArgs, TemplatesCommand};
use crate::config::{self, Notifier, Runtime};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Device Group")]
    device_group: String,
    #[tabled(rename = "Services")]
    services: usize,
    #[tabled(rename = "Protection Values")]
    protection_values: usize,
}

impl From<&TemplateSummary> for TemplateRow {
    fn from(t: &TemplateSummary) -> Self {
        Self {
            name: t.name.clone(),
            profile: t.profile_name.clone(),
            device_group: t.device_group.clone(),
            services: t.services_count,
            protection_values: t.protection_values_count,
        }
    }
}

/// Result document of a template write.
#[derive(Debug, Serialize)]
struct TemplateChange {
    status: &'static str,
    name: String,
    services_count: usize,
    protection_values_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_ip: Option<String>,
}

impl TemplateChange {
    fn new(status: &'static str, template: &Template) -> Self {
        Self {
            status,
            name: template.name.clone(),
            services_count: template.services_count(),
            protection_values_count: template.protection_values_count(),
            source_ip: None,
        }
    }
}

pub async fn handle(args: TemplatesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;

    match args.command {
        TemplatesCommand::List => {
            let store = FileTemplateStore::new(cfg.template_dir());
            let templates = store.list()?;
            if templates.is_empty() && global.output == OutputFormat::Table {
                eprintln!("No templates in {}", store.dir().display());
                return Ok(());
            }
            let out = output::render_list(global.output, &templates, |t| TemplateRow::from(t))?;
            output::print_output(&out);
            Ok(())
        }

        TemplatesCommand::Show { name } => {
            let template = FileTemplateStore::new(cfg.template_dir()).get(&name)?;
            let document = template.to_document();
            let out = output::render_single(global.output, &document, |d| {
                serde_json::to_string_pretty(d).unwrap_or_default()
            })?;
            output::print_output(&out);
            Ok(())
        }

        TemplatesCommand::Add { name, file } => {
            let template = read_template_file(&name, &file)?;
            let notifier = Notifier::from_config(&cfg)?;
            let result = local_library(&cfg.template_dir(), &notifier, cfg.notify.into()).save(&template);
            notifier.flush().await;

            let status = if result? { "updated" } else { "created" };
            report(global, &TemplateChange::new(status, &template))
        }

        TemplatesCommand::Import { ip, name } => {
            let runtime = Runtime::from_config(&cfg)?;
            let result = {
                let library = runtime.library();
                library.import_from_zone(&runtime.client(), &ip, &name).await
            };
            runtime.notifier.flush().await;

            let template = result?;
            let mut change = TemplateChange::new("imported", &template);
            change.source_ip = Some(ip);
            report(global, &change)
        }

        TemplatesCommand::Delete { name } => {
            let notifier = Notifier::from_config(&cfg)?;
            let result = local_library(&cfg.template_dir(), &notifier, cfg.notify.into()).delete(&name);
            notifier.flush().await;
            result?;

            let color = output::should_color(global.color);
            let out = output::render_single(
                global.output,
                &serde_json::json!({"status": "deleted", "name": name}),
                |_| format!("{} Template '{name}' deleted", output::status_mark(true, color)),
            )?;
            output::print_output(&out);
            Ok(())
        }
    }
}

fn local_library(dir: &Path, notifier: &Notifier, notify: NotifyFlags) -> TemplateLibrary {
    TemplateLibrary::new(Arc::new(FileTemplateStore::new(dir)), notifier.sink(), notify)
}

/// Load `{zone_payload, monitor_payload}` from `file`; the CLI name wins over
/// any `name` inside the file.
fn read_template_file(name: &str, file: &Path) -> Result<Template, CliError> {
    let raw = std::fs::read_to_string(file)?;
    let invalid = |reason: String| CliError::Template {
        message: format!("{}: {reason}", file.display()),
    };
    let mut document: serde_json::Map<String, Value> =
        serde_json::from_str(&raw).map_err(|e| invalid(format!("invalid JSON: {e}")))?;

    let mut payload = |key: &str| match document.remove(key) {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(invalid(format!("missing {key} object"))),
    };
    Ok(Template {
        name: name.to_owned(),
        zone_payload: payload("zone_payload")?,
        monitor_payload: payload("monitor_payload")?,
    })
}

fn report(global: &GlobalOpts, change: &TemplateChange) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_single(global.output, change, |c| {
        let headline = match &c.source_ip {
            Some(ip) => format!("Template '{}' imported from zone {ip}", c.name),
            None => format!("Template '{}' {}", c.name, c.status),
        };
        format!(
            "{} {headline}\n{}",
            output::status_mark(true, color),
            output::detail_block(&[
                ("Services", c.services_count.to_string()),
                ("Protection Values", c.protection_values_count.to_string()),
            ]),
        )
    })?;
    output::print_output(&out);
    Ok(())
}
