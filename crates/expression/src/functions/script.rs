//! Scripting state, logging and external calls

use indexmap::IndexMap;

use structr_log::{debug, error, info, warn};

use super::{Builtin, FunctionOutput, has_length, has_min_length, int_arg, text_arg};
use crate::context::{ActionContext, COUNTER_LEVELS, ErrorToken};
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "error",
        apply: error_fn,
        usage: "Usage: ${error(...)}. Example: ${error(\"base\", \"must_equal\", int(5))}",
        usage_script: None,
        description: "Signals an error to the caller",
    },
    Builtin {
        name: "config",
        apply: config,
        usage: "Usage: ${config(keyFromStructrConf)}. Example: ${config(\"base.path\")}",
        usage_script: Some(
            "Usage: ${{Structr.config(keyFromStructrConf)}}. Example: ${{Structr.config(\"base.path\")}}",
        ),
        description: "Returns the structr.conf value with the given key",
    },
    Builtin {
        name: "get_counter",
        apply: get_counter,
        usage: "Usage: ${get_counter(level)}. Example: ${get_counter(1)}",
        usage_script: None,
        description: "Returns the value of the counter with the given index",
    },
    Builtin {
        name: "inc_counter",
        apply: inc_counter,
        usage: "Usage: ${inc_counter(level, [resetLowerLevels])}. Example: ${inc_counter(1, true)}",
        usage_script: None,
        description: "Increases the value of the counter with the given index",
    },
    Builtin {
        name: "reset_counter",
        apply: reset_counter,
        usage: "Usage: ${reset_counter(level)}. Example: ${reset_counter(1)}",
        usage_script: None,
        description: "Resets the value of the counter with the given index",
    },
    Builtin {
        name: "retrieve",
        apply: retrieve,
        usage: "Usage: ${retrieve(key)}. Example: ${retrieve('tmpUser')}",
        usage_script: Some("Usage: ${{Structr.retrieve(key)}}. Example: ${{Structr.retrieve('tmpUser')}}"),
        description: "Returns the value associated with the given key from the temporary store",
    },
    Builtin {
        name: "store",
        apply: store,
        usage: "Usage: ${store(key, value)}. Example: ${store('tmpUser', this.owner)}",
        usage_script: Some(
            "Usage: ${{Structr.store(key, value)}}. Example: ${{Structr.store('tmpUser', Structr.get('this').owner)}}",
        ),
        description: "Stores the given value with the given key in the temporary store",
    },
    Builtin {
        name: "print",
        apply: print,
        usage: "Usage: ${print(objects...)}. Example: ${print(this.name, \"test\")}",
        usage_script: Some(
            "Usage: ${{Structr.print(objects...)}}. Example: ${{Structr.print(Structr.get('this').name, \"test\")}}",
        ),
        description: "Prints the given string to the output buffer",
    },
    Builtin {
        name: "log",
        apply: log,
        usage: "Usage: ${log(string)}. Example ${log('Hello World!')}",
        usage_script: Some("Usage: ${{Structr.log(string)}}. Example ${{Structr.log('Hello World!')}}"),
        description: "Logs the given string to the logfile",
    },
    Builtin {
        name: "call",
        apply: call,
        usage: "Usage: ${call(key [, payloads...]}. Example ${call('myEvent')}",
        usage_script: Some("Usage: ${{Structr.call(key [, payloads...]}}. Example ${{Structr.call('myEvent')}}"),
        description: "Calls the given exported / dynamic method on the given entity",
    },
    Builtin {
        name: "exec",
        apply: exec,
        usage: "Usage: ${exec(fileName [, parameters...]}. Example ${exec('/usr/local/bin/my_script.sh')}",
        usage_script: Some(
            "Usage: ${{Structr.exec(fileName [, parameters...]}}. Example ${{Structr.exec('/usr/local/bin/my_script.sh')}}",
        ),
        description: "Executes the script configured under the given key",
    },
    Builtin {
        name: "exec_binary",
        apply: exec_binary,
        usage: "Usage: ${exec_binary(output, fileName [, parameters...]}",
        usage_script: Some("Usage: ${{Structr.exec_binary(output, fileName [, parameters...]}}"),
        description: "Executes the script configured under the given key and streams its output",
    },
    Builtin {
        name: "cypher",
        apply: cypher,
        usage: "Usage: ${cypher('MATCH (n) RETURN n')}",
        usage_script: Some("Usage: ${{Structr.cypher(query)}}. Example ${{Structr.cypher('MATCH (n) RETURN n')}}"),
        description: "Returns the result of the given Cypher query",
    },
    Builtin {
        name: "disable_notifications",
        apply: disable_notifications,
        usage: "Usage: ${disable_notifications()}",
        usage_script: Some("Usage: ${Structr.disableNotifications()}"),
        description: "Disables the Websocket notifications in the Structr Ui for the current transaction",
    },
    Builtin {
        name: "enable_notifications",
        apply: enable_notifications,
        usage: "Usage: ${enable_notifications()}",
        usage_script: Some("Usage: ${Structr.enableNotifications()}"),
        description: "Enables the Websocket notifications in the Structr Ui for the current transaction",
    },
];

fn error_fn(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, entity: Option<&EntityRef>) -> Output {
    let type_name = entity.map_or("Base", |entity| entity.type_name.as_str());

    let detail = if has_length(args, 2) {
        None
    } else if has_length(args, 3) {
        Some(args[2].clone())
    } else {
        return Ok(Value::Null.into());
    };

    ctx.add_error(ErrorToken {
        status: 422,
        type_name: type_name.to_string(),
        property: args[0].to_string(),
        token: args[1].to_string(),
        detail,
    });
    Ok(Value::Null.into())
}

fn config(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let default = text_arg(args, 1);
    let value = eval
        .services()
        .config()
        .get_or(&args[0].to_string(), &default);
    Ok(Value::text(value).into())
}

fn counter_level(value: &Value) -> Option<i64> {
    let level = int_arg(value);
    if level.is_none() {
        debug!(level = %value, "Counter level is not an integer");
    }
    level
}

fn get_counter(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let count = if has_length(args, 1) {
        counter_level(&args[0]).map_or(0, |level| ctx.counter(level))
    } else {
        0
    };
    Ok(Value::Integer(count).into())
}

fn inc_counter(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_min_length(args, 1) {
        if let Some(level) = counter_level(&args[0]) {
            ctx.increment_counter(level);

            if args.len() == 2 && args[1].to_string() == "true" {
                for lower in (level + 1)..COUNTER_LEVELS as i64 {
                    ctx.reset_counter(lower);
                }
            }
        }
    }
    Ok(FunctionOutput::empty())
}

fn reset_counter(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_length(args, 1) {
        if let Some(level) = counter_level(&args[0]) {
            ctx.reset_counter(level);
        }
    }
    Ok(FunctionOutput::empty())
}

fn retrieve(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    match args {
        [Value::Text(key)] => Ok(ctx.retrieve(key).cloned().unwrap_or_default().into()),
        _ => Ok(FunctionOutput::Usage),
    }
}

fn store(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let Some(Value::Text(key)) = args.first() else {
        return Ok(FunctionOutput::Usage);
    };
    match args.get(1) {
        Some(value) if !value.is_null() => ctx.store_value(key.clone(), value.clone()),
        _ => {}
    }
    Ok(FunctionOutput::empty())
}

fn print(args: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    for arg in args {
        ctx.print(&arg.render());
    }
    Ok(FunctionOutput::empty())
}

fn log(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let message: String = args.iter().map(Value::to_string).collect();
    info!(target: "structr::script", "{message}");
    Ok(FunctionOutput::empty())
}

fn call(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(caller) = eval.services().caller() else {
        warn!(key = %args[0], "No action caller configured, nothing called");
        return Ok(FunctionOutput::empty());
    };
    Ok(caller.call(&args[0].to_string(), &args[1..])?.into())
}

/// Command line configured under `key`, followed by the non-null parameters
fn command_line(eval: &Evaluator, key: &str, params: &[Value]) -> Option<String> {
    let script = eval
        .services()
        .config()
        .get(key)
        .filter(|script| !script.trim().is_empty());

    let Some(mut line) = script else {
        warn!(key, "No script found for key in structr.conf, nothing executed.");
        return None;
    };
    for param in params.iter().filter(|param| !param.is_null()) {
        line.push(' ');
        line.push_str(&param.to_string());
    }
    Some(line)
}

fn exec(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(line) = command_line(eval, &args[0].to_string(), &args[1..]) else {
        return Ok(FunctionOutput::empty());
    };
    let Some(runner) = eval.services().processes() else {
        warn!("No process runner configured, nothing executed.");
        return Ok(FunctionOutput::empty());
    };

    match runner.run(&line) {
        Ok(output) => Ok(Value::text(output.stdout_text()).into()),
        Err(e) => {
            error!(command = %line, error = %e, "Script execution failed");
            Ok(FunctionOutput::empty())
        }
    }
}

/// Like `exec`, but stdout goes to the binary output buffer and the result is stderr
fn exec_binary(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }
    let Some(line) = command_line(eval, &args[1].to_string(), &args[2..]) else {
        return Ok(FunctionOutput::empty());
    };
    let Some(runner) = eval.services().processes() else {
        warn!("No process runner configured, nothing executed.");
        return Ok(FunctionOutput::empty());
    };

    match runner.run(&line) {
        Ok(output) => {
            ctx.binary_output_mut().extend_from_slice(&output.stdout);
            Ok(Value::text(output.stderr_text()).into())
        }
        Err(e) => {
            error!(command = %line, error = %e, "Script execution failed");
            Ok(FunctionOutput::empty())
        }
    }
}

fn cypher(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(graph) = eval.services().graph() else {
        warn!("No graph query service configured, query not executed.");
        return Ok(FunctionOutput::empty());
    };

    let params = match args.get(1) {
        Some(Value::Map(params)) => params.clone(),
        _ => IndexMap::new(),
    };
    let rows = graph.execute(&args[0].to_string(), &params)?;
    Ok(Value::List(rows).into())
}

fn disable_notifications(_: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    ctx.security_mut().set_do_transaction_notifications(false);
    Ok(FunctionOutput::empty())
}

fn enable_notifications(_: &[Value], _: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    ctx.security_mut().set_do_transaction_notifications(true);
    Ok(FunctionOutput::empty())
}
