//! Inspect command - decode and classify an archive without a cluster

use console::style;
use opkit_core::{BaseKind, Classification, UnstructuredOrigin, classify, extract_documents};
use serde_json::json;
use std::path::Path;

use super::read_archive;
use crate::error::Result;

pub fn run(archive_path: &Path, json: bool) -> Result<()> {
    let archive = read_archive(archive_path)?;
    let documents = extract_documents(&archive)?;
    let classification = classify(&documents)?;

    if json {
        let value = to_json(documents.len(), &classification);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let groups = &classification.groups;
    println!(
        "{} {} ({} file(s), {} object(s))",
        style("Archive").cyan().bold(),
        archive_path.display(),
        documents.len(),
        groups.len()
    );
    if let Some(namespace) = groups.archive_namespace() {
        println!("  {}: {}", style("Namespace").dim(), style(namespace).yellow());
    }
    println!();

    for kind in BaseKind::INSTALL_ORDER {
        let objects = groups.typed(kind);
        if objects.is_empty() {
            continue;
        }
        println!("{}:", style(kind).bold());
        for object in objects {
            println!("  {} {}", style("•").green(), object.name());
        }
    }

    if !groups.unstructured().is_empty() {
        println!("{}:", style("Other objects").bold());
        for object in groups.unstructured() {
            println!(
                "  {} {} {} {}",
                style("•").green(),
                object.descriptor(),
                object.name(),
                style(format!("[{}]", origin_label(object.origin()))).dim()
            );
        }
    }

    if !classification.skipped.is_empty() {
        println!();
        println!("{}:", style("Skipped").yellow().bold());
        for skipped in &classification.skipped {
            println!(
                "  {} {} {}",
                style("⚠").yellow(),
                skipped.kind.as_deref().unwrap_or("<empty>"),
                style(skipped.source.as_deref().unwrap_or("")).dim()
            );
        }
    }

    Ok(())
}

fn origin_label(origin: UnstructuredOrigin) -> &'static str {
    match origin {
        UnstructuredOrigin::CustomResource => "custom resource",
        UnstructuredOrigin::Converted => "converted",
    }
}

fn to_json(files: usize, classification: &Classification) -> serde_json::Value {
    let groups = &classification.groups;

    let typed: Vec<_> = BaseKind::INSTALL_ORDER
        .into_iter()
        .flat_map(|kind| groups.typed(kind))
        .map(|object| {
            json!({
                "kind": object.base_kind().as_str(),
                "apiVersion": object.descriptor().api_version,
                "name": object.name(),
            })
        })
        .collect();

    let unstructured: Vec<_> = groups
        .unstructured()
        .iter()
        .map(|object| {
            json!({
                "kind": object.kind(),
                "apiVersion": object.api_version(),
                "name": object.name(),
                "origin": object.origin(),
            })
        })
        .collect();

    json!({
        "files": files,
        "namespace": groups.archive_namespace(),
        "typed": typed,
        "unstructured": unstructured,
        "skipped": classification.skipped,
    })
}
