use std::str::FromStr;

use vetcare_core::{view::View, CoreError, InvoiceFilter, VaccinationService};
use vetcare_domain::{format_money, InvoiceStatus, CURRENT_SCHEMA_VERSION};

use super::{output, CliContext, CommandEntry, CommandResult};
use crate::errors::CliError;

pub(super) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("help", "Show available commands", "help [command]", cmd_help),
        CommandEntry::new("version", "Show version information", "version", cmd_version),
        CommandEntry::new(
            "sweep-overdue",
            "Mark late pending vaccinations as overdue",
            "sweep-overdue",
            cmd_sweep_overdue,
        ),
        CommandEntry::new(
            "reminders",
            "List vaccinations due for a reminder",
            "reminders",
            cmd_reminders,
        ),
        CommandEntry::new(
            "invoices",
            "List invoices, optionally by status",
            "invoices [pending|partial|paid|voided]",
            cmd_invoices,
        ),
        CommandEntry::new(
            "invoice",
            "Show one invoice with its line items",
            "invoice <number>",
            cmd_invoice,
        ),
        CommandEntry::new("stats", "Show billing totals", "stats", cmd_stats),
        CommandEntry::new(
            "backup",
            "Back up the clinic records",
            "backup [note]",
            cmd_backup,
        ),
        CommandEntry::new("backups", "List clinic backups", "backups", cmd_backups),
        CommandEntry::new("config", "Show the active configuration", "config", cmd_config),
    ]
}

fn cmd_help(context: &mut CliContext, args: &[String]) -> CommandResult {
    if let Some(name) = args.first() {
        let name = name.to_lowercase();
        return match context.command(&name) {
            Some(entry) => {
                output::section(entry.name);
                output::info(entry.description);
                output::info(format!("Usage: vetcare_cli {}", entry.usage));
                Ok(())
            }
            None => {
                if let Some(best) = context.suggest(&name) {
                    output::info(format!("Suggestion: `{}`?", best));
                }
                Err(CliError::UnknownCommand(name))
            }
        };
    }

    output::section("VetCare maintenance commands");
    for entry in context.commands() {
        output::info(format!("  {:<14} {}", entry.name, entry.description));
    }
    output::info(format!(
        "\nClinic home: {} (override with {})",
        context.home().display(),
        super::HOME_ENV
    ));
    Ok(())
}

fn cmd_version(_context: &mut CliContext, _args: &[String]) -> CommandResult {
    output::section(format!("VetCare {}", env!("CARGO_PKG_VERSION")));
    output::info(format!("  Records schema: v{}", CURRENT_SCHEMA_VERSION));
    Ok(())
}

fn cmd_sweep_overdue(context: &mut CliContext, _args: &[String]) -> CommandResult {
    let swept = context.app()?.sweep_overdue()?;
    if swept == 0 {
        output::info("No pending vaccinations are late.");
    } else {
        output::success(format!("{} vaccination(s) marked as overdue.", swept));
    }
    Ok(())
}

fn cmd_reminders(context: &mut CliContext, _args: &[String]) -> CommandResult {
    let app = context.app()?;
    let window = i64::from(app.config().reminder_window_days);
    let views = app.vaccination_views(|records, today| {
        VaccinationService::reminders_due(records, today, window)
    })?;

    output::section(format!("Reminders due (next {} days)", window));
    if views.is_empty() {
        output::info("Nothing to remind.");
        return Ok(());
    }
    for view in &views {
        output::info(format!(
            "  {}  {:<16} {:<20} dose {}  in {} day(s)",
            output::field(view, "scheduled_date_text"),
            output::field(view, "pet_name"),
            output::field(view, "vaccine_name"),
            output::field(view, "dose_number"),
            output::field(view, "days_until_due"),
        ));
    }
    Ok(())
}

fn cmd_invoices(context: &mut CliContext, args: &[String]) -> CommandResult {
    let status = args
        .first()
        .map(|raw| InvoiceStatus::from_str(raw))
        .transpose()
        .map_err(|err| CliError::InvalidArguments(err.to_string()))?;
    let filter = InvoiceFilter {
        status,
        ..InvoiceFilter::default()
    };
    let views = context.app()?.invoice_views(&filter)?;

    output::section("Invoices");
    if views.is_empty() {
        output::info("No invoices found.");
        return Ok(());
    }
    for view in &views {
        print_invoice_row(view);
    }
    Ok(())
}

fn print_invoice_row(view: &View) {
    output::info(format!(
        "  {:<14} {:<16} {:<24} {:>12}  balance {}",
        output::field(view, "number"),
        output::status_cell(view),
        output::field(view, "owner_name"),
        output::field(view, "total_text"),
        output::field(view, "balance_due_text"),
    ));
}

fn cmd_invoice(context: &mut CliContext, args: &[String]) -> CommandResult {
    let number = args
        .first()
        .ok_or_else(|| CliError::InvalidArguments("usage: invoice <number>".into()))?;
    let view = context.app()?.invoice_view(number)?;

    output::section(format!("Invoice {}", output::field(&view, "number")));
    output::info(format!("  Status  : {}", output::status_cell(&view)));
    output::info(format!("  Issued  : {}", output::field(&view, "issued_at_text")));
    output::info(format!("  Owner   : {}", output::field(&view, "owner_name")));
    output::info(format!("  Pet     : {}", output::field(&view, "pet_name")));
    if let Some(serde_json::Value::Array(items)) = view.get("items") {
        output::info("  Items   :");
        for item in items.iter().filter_map(|item| item.as_object()) {
            output::info(format!(
                "    {:>3} x {:<32} {:>12} {:>12}",
                output::field(item, "quantity"),
                output::field(item, "description"),
                output::field(item, "unit_price_text"),
                output::field(item, "subtotal_text"),
            ));
        }
    }
    output::info(format!("  Total   : {}", output::field(&view, "total_text")));
    output::info(format!("  Balance : {}", output::field(&view, "balance_due_text")));
    Ok(())
}

fn cmd_stats(context: &mut CliContext, _args: &[String]) -> CommandResult {
    let app = context.app()?;
    let symbol = app.config().currency_symbol.clone();
    let stats = app.billing_stats()?;

    output::section("Billing");
    output::info(format!(
        "  Pending balance : {}",
        format_money(&symbol, stats.pending_balance)
    ));
    output::info(format!(
        "  Collected       : {}",
        format_money(&symbol, stats.paid_total)
    ));
    output::info(format!("  Pending         : {}", stats.pending_count));
    output::info(format!("  Partially paid  : {}", stats.partially_paid_count));
    output::info(format!("  Paid            : {}", stats.paid_count));
    output::info(format!("  Voided          : {}", stats.voided_count));
    Ok(())
}

fn cmd_backup(context: &mut CliContext, args: &[String]) -> CommandResult {
    let note = (!args.is_empty()).then(|| args.join(" "));
    let backup = context.app()?.backup(note.as_deref())?;
    output::success(format!("Backup created: {}", backup.id));
    Ok(())
}

fn cmd_backups(context: &mut CliContext, _args: &[String]) -> CommandResult {
    let backups = context.app()?.list_backups()?;
    output::section("Backups");
    if backups.is_empty() {
        output::info("No backups yet.");
        return Ok(());
    }
    for backup in &backups {
        output::info(format!("  {:<48} {}", backup.id, backup.created_at));
    }
    Ok(())
}

fn cmd_config(context: &mut CliContext, _args: &[String]) -> CommandResult {
    let app = context.app()?;
    let json = serde_json::to_string_pretty(app.config())
        .map_err(CoreError::from)?;
    output::section(format!(
        "Configuration ({})",
        app.config_manager().config_path().display()
    ));
    output::info(json);
    Ok(())
}
