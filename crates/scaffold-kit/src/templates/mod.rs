//! Template bundles: manifest, loading, rendering and materialization
//!
//! This module provides:
//! - The `template.yaml` manifest types
//! - Loading bundles from the binary, a local folder or a remote zip
//! - Placeholder rendering
//! - Writing a manifest to disk (full-replace)
//! - Version compatibility checking

pub mod fetcher;
pub mod manifest;
pub mod materialize;
pub mod render;
pub mod version;

use crate::product::ProductConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub use fetcher::{EmbeddedFiles, LoadedTemplate, TemplateFetcher, TemplateSource};
pub use manifest::{EntryContent, EntryKind, ManifestEntry, TemplateManifest};
pub use materialize::{materialize, MaterializeError, MaterializeReport};
pub use render::RenderContext;
pub use version::check_compatibility;

/// Zip a template folder into the bundle format remote sources serve
///
/// Only `template.yaml` and the files it references are packed, under a
/// `<template_name>/` prefix. Files in the folder that the manifest never
/// mentions are returned so the caller can warn about them.
pub fn build_bundle_zip(template_dir: &Path, template_name: &str) -> Result<(Vec<u8>, Vec<String>)> {
    let manifest_path = template_dir.join("template.yaml");
    let manifest_content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest = TemplateManifest::from_yaml(&manifest_content)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

    let mut referenced: HashSet<String> = HashSet::new();
    referenced.insert("template.yaml".to_string());

    let mut zip_buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        // Always include template.yaml first
        zip.start_file(format!("{}/template.yaml", template_name), options)?;
        zip.write_all(manifest_content.as_bytes())?;

        for source in manifest.entries.iter().filter_map(|e| e.source_file()) {
            if !referenced.insert(source.to_string()) {
                continue;
            }
            let full_path = template_dir.join(source);
            let content = std::fs::read(&full_path).with_context(|| {
                format!(
                    "Failed to read {} (referenced by {})",
                    full_path.display(),
                    manifest_path.display()
                )
            })?;
            zip.start_file(format!("{}/{}", template_name, source), options)?;
            zip.write_all(&content)?;
        }

        zip.finish()?;
    }

    let mut unreferenced = Vec::new();
    for entry in WalkDir::new(template_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(template_dir)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !referenced.contains(&relative) {
            unreferenced.push(relative);
        }
    }

    Ok((zip_buffer, unreferenced))
}

/// Build `<template_name>.zip` next to (or at `out`) the template folder
pub async fn build_bundle<C: ProductConfig>(
    config: &C,
    template_dir: &Path,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    if !template_dir.is_dir() {
        anyhow::bail!("Template directory not found: {}", template_dir.display());
    }

    println!(
        "{}",
        format!("Building {} template bundle...", config.display_name())
            .cyan()
            .bold()
    );
    println!();

    let template_name = config.template_name();
    let (zip_bytes, unreferenced) = build_bundle_zip(template_dir, template_name)?;

    for file in &unreferenced {
        eprintln!(
            "{} '{}' is not referenced by template.yaml and was skipped",
            "Warning:".yellow(),
            file
        );
    }

    let zip_path = out.unwrap_or_else(|| {
        template_dir
            .parent()
            .unwrap_or(template_dir)
            .join(format!("{}.zip", template_name))
    });
    tokio::fs::write(&zip_path, &zip_bytes)
        .await
        .with_context(|| format!("Failed to write {}", zip_path.display()))?;

    println!(
        "  {} {} ({} bytes)",
        "->".blue(),
        zip_path.display(),
        zip_bytes.len()
    );
    println!();
    println!("{} template bundle '{}'", "Built".green().bold(), template_name);

    Ok(zip_path)
}
