//! `check` and `inspect` commands

use crate::error::{CliError, CliResult};
use formflow_rules::{compile_form, CompileError, Form};
use serde_json::Value;
use std::path::Path;

/// Decode a YAML (or JSON) step document
pub fn load_document(path: &Path) -> CliResult<Value> {
    let text = std::fs::read_to_string(path)?;
    let document: Value = serde_yaml::from_str(&text)?;
    Ok(document)
}

/// Form name for a document: its file stem
pub fn form_name(path: &Path) -> CliResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::InvalidInput(format!("No file name in {}", path.display())))
}

/// Load and compile one document
pub fn compile_file(path: &Path) -> CliResult<(Form, Vec<CompileError>)> {
    let name = form_name(path)?;
    let document = load_document(path)?;
    Ok(compile_form(&name, &document))
}

/// Compile every file, printing its diagnostics. Fails if any file has any.
pub fn check(files: &[std::path::PathBuf]) -> CliResult<()> {
    let mut failed = 0;

    for path in files {
        let (form, diagnostics) = compile_file(path)?;
        if diagnostics.is_empty() {
            println!("ok    {} ({} steps)", path.display(), form.steps.len());
            continue;
        }

        failed += 1;
        println!("error {}", path.display());
        for diagnostic in &diagnostics {
            println!("      {}", diagnostic);
        }
        tracing::debug!(file = %path.display(), errors = diagnostics.len(), "Document rejected");
    }

    if failed > 0 {
        return Err(CliError::Diagnostics(failed));
    }
    Ok(())
}

/// Print the compiled form as pretty JSON
pub fn inspect(path: &Path) -> CliResult<()> {
    let (form, diagnostics) = compile_file(path)?;
    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            eprintln!("{}", diagnostic);
        }
        return Err(CliError::Diagnostics(1));
    }

    println!("{}", serde_json::to_string_pretty(&form)?);
    Ok(())
}
