//! Node path/level integrity command

use anyhow::Result;
use vellum_core::tree::IntegrityReport;
use vellum_core::{check_integrity, Database, ObjectType};

/// Check one object type, repairing inside a single scope when `fix` is set.
pub fn run(db: &mut Database, object_type: ObjectType, fix: bool, json: bool) -> Result<IntegrityReport> {
    let report = if fix {
        let scope = db.scope()?;
        let report = check_integrity(&scope, &[object_type], true)?;
        scope.complete()?;
        report
    } else {
        check_integrity(db.connection(), &[object_type], false)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(object_type, &report, fix);
    }
    Ok(report)
}

fn print_report(object_type: ObjectType, report: &IntegrityReport, fix: bool) {
    println!("Integrity check: {:?}", object_type);
    if report.issues.is_empty() {
        println!("  No issues found");
        return;
    }
    for (id, issue) in &report.issues {
        let status = if issue.fixed { "fixed" } else { "unfixed" };
        println!("  Node {}: {:?} ({})", id, issue.issue_type, status);
    }
    println!();
    println!("  Detected: {}", report.detected());
    if fix {
        println!("  Fixed:    {}", report.fixed());
    }
}
