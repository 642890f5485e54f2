//! Human-readable rendering shared across commands.

use colored::Colorize;
use radar_core::{CanonicalResult, ConsultationResult, FineItem, HistoryPage};

pub fn banner_success(title: &str) {
    println!();
    println!("{}", "╔════════════════════════════════════════╗".green());
    println!("{}", format!("║{:^40}║", title).green().bold());
    println!("{}", "╚════════════════════════════════════════╝".green());
    println!();
}

pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("   {} {}", format!("{label}:").dimmed(), value);
}

fn fines(title: &str, items: &[FineItem]) {
    if items.is_empty() {
        field(title, "none".green());
        return;
    }
    field(title, items.len());
    for fine in items {
        println!(
            "     {} {} {} ({} pts, {}) {}",
            "•".dimmed(),
            fine.date,
            fine.description,
            fine.points,
            fine.status,
            format!("R$ {}", fine.value).yellow()
        );
    }
}

pub fn print_result(result: &ConsultationResult) {
    banner_success("LOOKUP COMPLETE");

    match &result.normalized_payload {
        CanonicalResult::Vehicle(v) => {
            field("Plate", &v.plate);
            field("RENAVAM", &v.renavam);
            field("Model", &v.model);
            field("Year", v.year);
            field("Owner", &v.owner);
            fines("Fines", &v.fines);
        }
        CanonicalResult::Cnh(c) => {
            field("Holder", &c.holder_name);
            field("License", &c.license_number);
            field("Category", &c.category);
            field("Status", &c.status);
            field("Expires", &c.expiration_date);
            field("Points", c.points);
            fines("Infractions", &c.infractions);
        }
        CanonicalResult::Driver(d) => {
            field("Name", &d.name);
            field("CPF", &d.cpf);
            field("License", &d.license_number);
            field("Category", &d.category);
            field("Status", &d.status);
            field("Points", d.points);
            fines("Infractions", &d.infractions);
        }
        CanonicalResult::Fines(f) => {
            field("Plate", &f.plate);
            field("RENAVAM", &f.renavam);
            field("Total", format!("R$ {}", f.total_value).yellow());
            fines("Fines", &f.fines);
        }
    }

    println!();
    field("Request", result.request_id);
    field("Provider", result.provider_source);
    if result.synthetic {
        println!(
            "   {}",
            "WARNING: synthetic demo data, not a real record".yellow().bold()
        );
    }
}

pub fn print_history(page: &HistoryPage) {
    if page.entries.is_empty() {
        println!("{}", "No search history.".dimmed());
        return;
    }

    for entry in &page.entries {
        let outcome = if entry.result_snapshot.success {
            "ok".green()
        } else {
            "failed".red()
        };
        println!(
            "{}  {:<13} {:<14} {:<8} {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.search_type.as_str(),
            entry.search_query,
            entry.provider_source,
            outcome
        );
    }
    println!(
        "{}",
        format!(
            "page {} · {} of {} entries{}",
            page.page,
            page.entries.len(),
            page.total,
            if page.has_more { " · more available" } else { "" }
        )
        .dimmed()
    );
}
