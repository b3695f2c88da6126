//! Template loading from the embedded bundle, a local folder, or a remote zip
//!
//! A bundle is a folder with `template.yaml` at its root plus the payload files
//! it references. Remote bundles are zips of that folder, prefixed with the
//! template name (see [`super::build_bundle_zip`]).

use super::manifest::{EntryContent, EntryKind, ManifestEntry, TemplateManifest};
use crate::product::ProductConfig;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tokio::fs;
use url::Url;
use zip::ZipArchive;

/// Files compiled into the binary: `(bundle path, content)`
pub type EmbeddedFiles = &'static [(&'static str, &'static [u8])];

/// Where template files come from
#[derive(Debug, Clone)]
pub enum TemplateSource {
    Embedded(EmbeddedFiles),
    Local(PathBuf),
    Remote(Url),
}

impl TemplateSource {
    /// Resolve the source: explicit folder, then explicit URL, then the
    /// product's URL environment variable, then the embedded bundle
    pub fn from_config<C: ProductConfig>(
        config: &C,
        template_dir: Option<PathBuf>,
        template_url: Option<String>,
    ) -> Result<Self> {
        if let Some(path) = template_dir {
            return Ok(Self::Local(path));
        }

        let url_str = template_url.or_else(|| {
            std::env::var(config.template_url_env())
                .ok()
                .filter(|s| !s.trim().is_empty())
        });

        match url_str {
            Some(url_str) => {
                let url = Url::parse(&url_str)
                    .with_context(|| format!("Invalid template URL: {}", url_str))?;
                Ok(Self::Remote(url))
            }
            None => Ok(Self::Embedded(config.embedded_templates())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TemplateSource::Embedded(_) => "built-in templates".to_string(),
            TemplateSource::Local(path) => format!("local templates from {}", path.display()),
            TemplateSource::Remote(url) => format!("remote templates from {}", url),
        }
    }
}

/// A manifest together with its resolved entries
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub manifest: TemplateManifest,
    pub entries: Vec<ManifestEntry>,
}

/// Template fetcher - retrieves bundle files from any [`TemplateSource`]
pub struct TemplateFetcher {
    source: TemplateSource,
    template_name: String,
    client: reqwest::Client,
    /// Extracted remote zip, filled on first access
    remote_cache: Option<HashMap<String, Vec<u8>>>,
}

impl TemplateFetcher {
    /// Create a new fetcher with a custom user agent
    pub fn new(source: TemplateSource, template_name: &str, user_agent: &str) -> Self {
        Self {
            source,
            template_name: template_name.to_string(),
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            remote_cache: None,
        }
    }

    /// Get the template source
    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// Build a URL by appending a path segment, preserving query parameters
    fn build_url(base: &Url, path_segment: &str) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("URL cannot have path segments: {}", base))?
            .pop_if_empty()
            .push(path_segment);
        Ok(url)
    }

    /// Extract a bundle zip, stripping the `<template_name>/` prefix
    fn extract_zip(zip_bytes: &[u8], template_name: &str) -> Result<HashMap<String, Vec<u8>>> {
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).with_context(|| {
            format!("Failed to read zip archive for template '{}'", template_name)
        })?;

        let prefix = format!("{}/", template_name);
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let full_path = file.name().to_string();
            let relative_path = full_path
                .strip_prefix(&prefix)
                .unwrap_or(&full_path)
                .to_string();

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            files.insert(relative_path, contents);
        }

        if !files.contains_key("template.yaml") {
            anyhow::bail!("Template '{}' zip missing template.yaml", template_name);
        }

        Ok(files)
    }

    async fn remote_files(&mut self, base_url: &Url) -> Result<&HashMap<String, Vec<u8>>> {
        if self.remote_cache.is_none() {
            let zip_url = Self::build_url(base_url, &format!("{}.zip", self.template_name))?;
            let response = self
                .client
                .get(zip_url.clone())
                .send()
                .await
                .with_context(|| format!("Failed to fetch template bundle from {}", zip_url))?;

            if !response.status().is_success() {
                anyhow::bail!(
                    "Failed to fetch template '{}' from {}: HTTP {}",
                    self.template_name,
                    zip_url,
                    response.status()
                );
            }

            let bytes = response.bytes().await?;
            self.remote_cache = Some(Self::extract_zip(&bytes, &self.template_name)?);
        }

        self.remote_cache
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Template '{}' not cached", self.template_name))
    }

    /// Fetch a bundle file as bytes
    pub async fn fetch_file_bytes(&mut self, file_path: &str) -> Result<Vec<u8>> {
        match self.source.clone() {
            TemplateSource::Embedded(files) => files
                .iter()
                .find(|(path, _)| *path == file_path)
                .map(|(_, content)| content.to_vec())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "File '{}' not found in template '{}'",
                        file_path,
                        self.template_name
                    )
                }),
            TemplateSource::Local(dir) => {
                let full_path = dir.join(file_path);
                fs::read(&full_path)
                    .await
                    .with_context(|| format!("Failed to read {}", full_path.display()))
            }
            TemplateSource::Remote(base_url) => {
                let found = self.remote_files(&base_url).await?.get(file_path).cloned();
                found.ok_or_else(|| {
                    anyhow::anyhow!(
                        "File '{}' not found in template '{}'",
                        file_path,
                        self.template_name
                    )
                })
            }
        }
    }

    pub async fn fetch_manifest(&mut self) -> Result<TemplateManifest> {
        let bytes = self.fetch_file_bytes("template.yaml").await?;
        let content = String::from_utf8(bytes).context("template.yaml is not valid UTF-8")?;
        TemplateManifest::from_yaml(&content)
            .with_context(|| format!("Failed to parse template '{}' manifest", self.template_name))
    }

    /// Load the manifest and the content of every entry
    pub async fn load(&mut self) -> Result<LoadedTemplate> {
        let manifest = self.fetch_manifest().await?;
        let mut entries = Vec::with_capacity(manifest.entries.len());

        for decl in &manifest.entries {
            let entry = match decl.kind {
                EntryKind::Directory => ManifestEntry::directory(&decl.path),
                EntryKind::File => {
                    let bytes = match (&decl.literal, decl.source_file()) {
                        (Some(text), _) => text.clone().into_bytes(),
                        (None, Some(source)) => self.fetch_file_bytes(source).await?,
                        (None, None) => Vec::new(),
                    };
                    let content = if decl.render {
                        EntryContent::Template(String::from_utf8(bytes).with_context(|| {
                            format!("Rendered entry '{}' is not valid UTF-8", decl.path)
                        })?)
                    } else {
                        EntryContent::Literal(bytes)
                    };
                    let mut entry = ManifestEntry::file(&decl.path, content);
                    entry.executable = decl.executable;
                    entry
                }
            };
            entries.push(entry);
        }

        Ok(LoadedTemplate { manifest, entries })
    }
}
