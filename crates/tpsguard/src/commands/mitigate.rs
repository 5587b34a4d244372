//! `mitigate` and `remove`: the on-demand reconciler operations.

use tpsguard_core::MitigationOutcome;

use crate::cli::{GlobalOpts, MitigateArgs, OutputFormat, RemoveArgs};
use crate::config::{self, Runtime};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: MitigateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;

    let outcome = {
        let reconciler = runtime.reconciler();
        reconciler.ensure_mitigation(&args.ip, args.template.as_deref()).await
    };
    runtime.notifier.flush().await;

    let color = output::should_color(global.color);
    let rendered = output::render_single(global.output, &outcome, |o| match o {
        MitigationOutcome::Success { zone_id, message } => format!(
            "{} {message}\n{}",
            output::status_mark(true, color),
            output::detail_block(&[("Zone ID", zone_id.clone())]),
        ),
        MitigationOutcome::Failure { message } => {
            format!("{} {message}", output::status_mark(false, color))
        }
    })?;

    match outcome {
        MitigationOutcome::Success { .. } => {
            output::print_output(&rendered);
            Ok(())
        }
        // JSON consumers still get the error document on stdout
        MitigationOutcome::Failure { message } => {
            if global.output != OutputFormat::Table {
                output::print_output(&rendered);
            }
            Err(CliError::MitigationFailed { message })
        }
    }
}

pub async fn remove(args: RemoveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;

    let result = {
        let reconciler = runtime.reconciler();
        reconciler.remove_zone(&args.ip).await
    };
    runtime.notifier.flush().await;
    let removal = result?;

    let color = output::should_color(global.color);
    let rendered = output::render_single(global.output, &removal, |r| {
        format!(
            "{} {}\n{}",
            output::status_mark(true, color),
            r.message,
            output::detail_block(&[("Zone ID", r.zone_id.clone()), ("Status", r.status.to_string())]),
        )
    })?;
    output::print_output(&rendered);
    Ok(())
}

