//! Plain-text rendering of records and decisions.

use ubl_core::{BanRecord, Decision, RecordSet};
use uuid::Uuid;

const LABEL_WIDTH: usize = 14;

/// Print one record as a small vertical card.
pub fn print_record_card(record: &BanRecord) {
    println!("=== {} ===", record.identity);
    print_field("ign", &record.ign);
    print_field("reason", &record.reason);
    print_field("banned", &record.banned_at);
    print_field("length", &record.ban_duration);
    let expires = record
        .expires_at
        .map_or_else(|| "forever".to_string(), |d| d.to_string());
    print_field("expires", &expires);
    print_field("case", &record.case_reference);
    println!();
}

/// Print every record, ordered by identity.
pub fn print_record_set(records: &RecordSet) {
    for record in records.sorted() {
        print_record_card(record);
    }
    println!("{} record(s)", records.len());
}

pub fn print_decision(identity: &Uuid, decision: &Decision) {
    match decision {
        Decision::Allow => println!("{identity}  allow"),
        Decision::DenyNotReady(message) => println!("{identity}  deny (not ready)\n{}", indent(message)),
        Decision::Deny(message) => println!("{identity}  deny\n{}", indent(message)),
    }
}

fn print_field(label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    println!("  {label:<LABEL_WIDTH$} {value}");
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}")).collect::<Vec<_>>().join("\n")
}
