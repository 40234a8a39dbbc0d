//! File access inside the exchange directory
//!
//! Every filename is reduced to its last path component and resolved against
//! the configured exchange directory, so scripts cannot reach other parts of
//! the filesystem. Failures are logged and yield an empty string.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use structr_log::{debug, error, warn};

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "read",
        apply: read,
        usage: "Usage: ${read(filename)}. Example: ${read(\"text.xml\")}",
        usage_script: None,
        description: "Reads and returns the contents of the given file from the exchange directory",
    },
    Builtin {
        name: "write",
        apply: write,
        usage: "Usage: ${write(filename, value)}. Example: ${write(\"text.txt\", this.name)}",
        usage_script: None,
        description: "Writes to the given file in the exchange directory",
    },
    Builtin {
        name: "append",
        apply: append,
        usage: "Usage: ${append(filename, value)}. Example: ${append(\"test.txt\", this.name)}",
        usage_script: None,
        description: "Appends to the given file in the exchange directory",
    },
];

/// Path of `filename` inside the exchange directory
///
/// Directory components are dropped and the exchange directory is created
/// on first use. `None` when no exchange directory is configured or nothing
/// usable remains of the name.
pub(crate) fn sandbox_path(eval: &Evaluator, filename: &str) -> Option<PathBuf> {
    let exchange = eval.services().config().exchange_dir()?;
    if let Err(err) = fs::create_dir_all(&exchange) {
        warn!(path = %exchange.display(), error = %err, "Unable to create exchange directory");
    }
    let Some(name) = Path::new(filename).file_name() else {
        debug!(filename, "No file name left after stripping directories");
        return None;
    };
    Some(exchange.join(name))
}

fn read(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(path) = sandbox_path(eval, &args[0].to_string()) else {
        return Ok(FunctionOutput::empty());
    };

    let limit = eval.config().read_limit;
    match fs::metadata(&path) {
        Ok(meta) if meta.len() <= limit => {}
        Ok(meta) => {
            warn!(path = %path.display(), size = meta.len(), limit, "File too large to read");
            return Ok(FunctionOutput::empty());
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "File not readable");
            return Ok(FunctionOutput::empty());
        }
    }

    match fs::read(&path) {
        Ok(bytes) => Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()).into()),
        Err(err) => {
            error!(path = %path.display(), error = %err, "Unable to read file");
            Ok(FunctionOutput::empty())
        }
    }
}

/// Concatenated text of the arguments after the filename, nulls skipped
fn contents(args: &[Value]) -> String {
    args.iter()
        .skip(1)
        .filter(|arg| !arg.is_null())
        .map(Value::to_string)
        .collect()
}

fn write_to(path: &Path, contents: &str, append: bool) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .append(append)
        .create(append)
        .create_new(!append)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()
}

fn write(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(path) = sandbox_path(eval, &args[0].to_string()) else {
        return Ok(FunctionOutput::empty());
    };
    if path.exists() {
        error!(
            path = %path.display(),
            "Trying to overwrite an existing file, please use append() for that purpose."
        );
        return Ok(FunctionOutput::empty());
    }

    if let Err(err) = write_to(&path, &contents(args), false) {
        error!(path = %path.display(), error = %err, "Unable to write file");
    }
    Ok(FunctionOutput::empty())
}

fn append(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(path) = sandbox_path(eval, &args[0].to_string()) else {
        return Ok(FunctionOutput::empty());
    };

    if let Err(err) = write_to(&path, &contents(args), true) {
        error!(path = %path.display(), error = %err, "Unable to append to file");
    }
    Ok(FunctionOutput::empty())
}
