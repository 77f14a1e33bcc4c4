//! Prompt file rendering
//!
//! A prompt without `{{` is used verbatim. Otherwise `{{cwd}}` and
//! `{{dirTree}}` (also written `{{ .cwd }}` / `{{ .dirTree }}`) are replaced
//! with the working directory and a `tree`-style listing of it.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Read `path` and render its placeholders against the current directory
pub fn render_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt {}", path.display()))?;
    if !text.contains("{{") {
        return Ok(text);
    }

    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    render(&text, &cwd)
}

/// Render placeholders with `root` as the working directory
pub fn render(template: &str, root: &Path) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut tree: Option<String> = None;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let token = after[..end].trim();
        match token.trim_start_matches('.') {
            "cwd" => out.push_str(&root.display().to_string()),
            "dirTree" => {
                if tree.is_none() {
                    tree = Some(directory_listing(root)?);
                }
                out.push_str(tree.as_deref().unwrap_or_default());
            }
            _ => {
                tracing::warn!(placeholder = token, "Unknown prompt placeholder left as is");
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// `root` on the first line followed by its tree
pub fn directory_listing(root: &Path) -> Result<String> {
    let rules = ignore_rules(root);
    let mut out = format!("{}\n", root.display());
    write_tree(&mut out, root, root, &rules, &mut Vec::new())?;
    Ok(out)
}

fn write_tree(
    out: &mut String,
    root: &Path,
    current: &Path,
    rules: &Gitignore,
    last_markers: &mut Vec<bool>,
) -> Result<()> {
    let mut entries = std::fs::read_dir(current)
        .with_context(|| format!("cannot read {}", current.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| {
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            (entry.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .filter(|(name, is_dir)| {
            if *is_dir && name == ".git" {
                return false;
            }
            let relative = current.join(name);
            let relative = relative.strip_prefix(root).unwrap_or(&relative);
            !rules
                .matched_path_or_any_parents(relative, *is_dir)
                .is_ignore()
        })
        .collect::<Vec<_>>();
    entries.sort();

    let count = entries.len();
    for (index, (name, is_dir)) in entries.into_iter().enumerate() {
        let is_last = index + 1 == count;
        for &parent_last in last_markers.iter() {
            out.push_str(if parent_last { "    " } else { "│   " });
        }
        let _ = writeln!(out, "{}{name}", if is_last { "└── " } else { "├── " });

        if is_dir {
            last_markers.push(is_last);
            write_tree(out, root, &current.join(&name), rules, last_markers)?;
            last_markers.pop();
        }
    }
    Ok(())
}

/// Rules from the root `.gitignore`; a missing file ignores nothing
pub fn ignore_rules(root: &Path) -> Gitignore {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return Gitignore::empty();
    }

    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(&path) {
        tracing::debug!(error = %err, "Skipping unreadable ignore patterns");
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build ignore rules");
        Gitignore::empty()
    })
}
