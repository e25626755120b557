//! Batch packaging: many results → one ZIP with deterministic names.

use crate::error::DocMatrixError;
use crate::formats::ooxml::PackageWriter;
use crate::output::ConversionResult;
use std::collections::HashSet;
use tracing::debug;

/// Lower-case a title and join its words with `_`.
pub fn title_slug(title: &str) -> String {
    let slug = title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "documents".to_string()
    } else {
        slug
    }
}

/// `<title_snake>_batch.zip`
pub fn batch_archive_name(title: &str) -> String {
    format!("{}_batch.zip", title_slug(title))
}

/// `<title_snake>_merged.<ext>`
pub fn merged_filename(title: &str, ext: &str) -> String {
    format!("{}_merged.{ext}", title_slug(title))
}

/// Hands out file names, suffixing repeats with `_2`, `_3`, ... before
/// the extension.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name, ""),
        };
        let mut n = 2;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Every file a result produces, with its suggested name.
pub fn result_entries(result: &ConversionResult) -> Vec<(&str, &[u8])> {
    match result {
        ConversionResult::Text(t) => vec![(t.filename.as_str(), t.text.as_bytes())],
        ConversionResult::Document(doc) => vec![(doc.filename.as_str(), doc.bytes.as_slice())],
        ConversionResult::Images(set) => set
            .images
            .iter()
            .map(|i| (i.filename.as_str(), i.bytes.as_slice()))
            .collect(),
    }
}

/// Zip results in input order; colliding names get `_2`, `_3`, ...
pub fn package_batch<'a>(
    results: impl IntoIterator<Item = &'a ConversionResult>,
) -> Result<Vec<u8>, DocMatrixError> {
    let fail = |e: String| DocMatrixError::Internal(format!("Failed to build batch archive: {e}"));
    let mut names = UniqueNames::new();
    let mut zip = PackageWriter::new();
    let mut count = 0usize;
    for result in results {
        for (name, bytes) in result_entries(result) {
            let name = names.claim(name);
            zip.add_bytes(&name, bytes).map_err(fail)?;
            count += 1;
        }
    }
    let bytes = zip.finish().map_err(fail)?;
    debug!("Packaged {} files into {} bytes", count, bytes.len());
    Ok(bytes)
}
