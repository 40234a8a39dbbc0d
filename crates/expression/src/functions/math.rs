//! Arithmetic functions
//!
//! Every operand is parsed as a double from its text form. A parse failure
//! does not abort the evaluation: the parser message becomes the result, or a
//! 400 error is raised when the engine runs with strict arithmetic.

use structr_log::warn;

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value, parse_double};
use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "add",
        apply: add,
        usage: "Usage: ${add(values...)}. Example: ${add(1, 2, 3, this.children.size)}",
        usage_script: None,
        description: "Returns the sum of the given arguments",
    },
    Builtin {
        name: "double_sum",
        apply: double_sum,
        usage: "Usage: ${double_sum(list)}. Example: ${double_sum(extract(this.children, \"amount\"))}",
        usage_script: None,
        description: "Returns the sum of the given arguments as a floating-point number",
    },
    Builtin {
        name: "int_sum",
        apply: int_sum,
        usage: "Usage: ${int_sum(list)}. Example: ${int_sum(extract(this.children, \"number\"))}",
        usage_script: None,
        description: "Returns the sum of the given arguments as an integer",
    },
    Builtin {
        name: "subt",
        apply: subt,
        usage: "Usage: ${subt(value1, value2)}. Example: ${subt(5, 2)}",
        usage_script: None,
        description: "Subtracts the second argument from the first argument",
    },
    Builtin {
        name: "mult",
        apply: mult,
        usage: "Usage: ${mult(value1, value2)}. Example: ${mult(5, 2)}",
        usage_script: None,
        description: "Multiplies the first argument by the second argument",
    },
    Builtin {
        name: "quot",
        apply: quot,
        usage: "Usage: ${quot(value1, value2)}. Example: ${quot(5, 2)}",
        usage_script: None,
        description: "Divides the first argument by the second argument",
    },
    Builtin {
        name: "mod",
        apply: modulo,
        usage: "Usage: ${mod(value1, value2)}. Example: ${mod(17, 5)}",
        usage_script: None,
        description: "Returns the remainder of the division",
    },
    Builtin {
        name: "floor",
        apply: floor,
        usage: "Usage: ${floor(value)}. Example: ${floor(32.4)}",
        usage_script: None,
        description: "Returns the largest integer that is less than or equal to the argument",
    },
    Builtin {
        name: "ceil",
        apply: ceil,
        usage: "Usage: ${ceil(value)}. Example: ${ceil(32.4)}",
        usage_script: None,
        description: "Returns the smallest integer that is greater than or equal to the argument",
    },
    Builtin {
        name: "round",
        apply: round,
        usage: "Usage: ${round(value1 [, decimalPlaces])}. Example: ${round(2.345678, 2)}",
        usage_script: None,
        description: "Rounds the given argument to the given number of decimal places",
    },
    Builtin {
        name: "max",
        apply: max,
        usage: "Usage: ${max(value1, value2)}. Example: ${max(this.children, 10)}",
        usage_script: None,
        description: "Returns the larger value of the given arguments",
    },
    Builtin {
        name: "min",
        apply: min,
        usage: "Usage: ${min(value1, value2)}. Example: ${min(this.children, 5)}",
        usage_script: None,
        description: "Returns the smaller value of the given arguments",
    },
];

fn number(value: f64) -> Output {
    Ok(Value::Number(value).into())
}

fn operand(value: &Value) -> Result<f64, String> {
    parse_double(&value.to_string())
}

/// Result for an operand that did not parse
fn parse_failure(eval: &Evaluator, function: &str, message: String) -> Output {
    if eval.config().strict_arithmetic {
        return Err(ExpressionError::framework(400, message));
    }
    warn!(function, error = %message, "Arithmetic operand is not a number");
    Ok(Value::text(message).into())
}

fn add(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut result = 0.0;
    for arg in args.iter().filter(|arg| !arg.is_null()) {
        match operand(arg) {
            Ok(n) => result += n,
            Err(message) => return parse_failure(eval, "add", message),
        }
    }
    number(result)
}

fn double_sum(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut result = 0.0;
    if has_length(args, 1) {
        if let Value::List(items) = &args[0] {
            result = items.iter().filter_map(Value::as_f64).sum();
        }
    }
    number(result)
}

fn int_sum(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut result: i32 = 0;
    if has_length(args, 1) {
        if let Value::List(items) = &args[0] {
            result = items
                .iter()
                .filter_map(Value::as_f64)
                .fold(0i32, |sum, n| sum.wrapping_add(n as i32));
        }
    }
    Ok(Value::Integer(i64::from(result)).into())
}

fn subt(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let mut operands = args.iter().map(operand);
    let mut result = match operands.next() {
        Some(Ok(first)) => first,
        Some(Err(message)) => return parse_failure(eval, "subt", message),
        None => return Ok(FunctionOutput::empty()),
    };
    for next in operands {
        match next {
            Ok(n) => result -= n,
            Err(message) => return parse_failure(eval, "subt", message),
        }
    }
    number(result)
}

fn mult(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut result = 1.0;
    for arg in args {
        if arg.is_null() {
            return Ok(Value::Null.into());
        }
        match operand(arg) {
            Ok(n) => result *= n,
            Err(message) => return parse_failure(eval, "mult", message),
        }
    }
    number(result)
}

fn quot(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_length(args, 2) {
        return match (operand(&args[0]), operand(&args[1])) {
            (Ok(dividend), Ok(divisor)) => number(dividend / divisor),
            (Err(message), _) | (_, Err(message)) => parse_failure(eval, "quot", message),
        };
    }

    match args.first() {
        Some(first) if !first.is_null() => match operand(first) {
            Ok(n) => number(n),
            Err(message) => parse_failure(eval, "quot", message),
        },
        _ => Ok(FunctionOutput::empty()),
    }
}

fn modulo(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::Usage);
    }

    match (operand(&args[0]), operand(&args[1])) {
        (Ok(dividend), Ok(divisor)) => {
            let divisor = divisor as i32;
            if divisor == 0 {
                return parse_failure(eval, "mod", "/ by zero".to_string());
            }
            let remainder = (dividend as i32).wrapping_rem(divisor);
            Ok(Value::Integer(i64::from(remainder)).into())
        }
        (Err(message), _) | (_, Err(message)) => parse_failure(eval, "mod", message),
    }
}

fn floor(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    integral(args, eval, "floor", f64::floor)
}

fn ceil(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    integral(args, eval, "ceil", f64::ceil)
}

fn integral(args: &[Value], eval: &Evaluator, function: &str, op: fn(f64) -> f64) -> Output {
    if !has_length(args, 1) {
        return Ok(FunctionOutput::Usage);
    }
    match operand(&args[0]) {
        Ok(n) => Ok(Value::Integer(i64::from(op(n) as i32)).into()),
        Err(message) => parse_failure(eval, function, message),
    }
}

fn round(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }
    if args[0].to_string().trim().is_empty() {
        return Ok(FunctionOutput::empty());
    }

    match (operand(&args[0]), operand(&args[1])) {
        (Ok(value), Ok(places)) => {
            let scale = 10f64.powf(places);
            // half-up on the scaled value
            let scaled = (value * scale + 0.5).floor() as i64;
            number(scaled as f64 / scale)
        }
        (Err(message), _) | (_, Err(message)) => parse_failure(eval, "round", message),
    }
}

fn max(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    extremum(args, "max", f64::max)
}

fn min(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    extremum(args, "min", f64::min)
}

fn extremum(args: &[Value], function: &str, op: fn(f64, f64) -> f64) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }
    match (operand(&args[0]), operand(&args[1])) {
        (Ok(left), Ok(right)) => number(op(left, right)),
        _ => {
            warn!(
                function,
                left = %args[0],
                right = %args[1],
                "Could not determine {function}() of arguments"
            );
            Ok(Value::text(format!(
                "ERROR! Usage: ${{{function}(val1, val2)}}. Example: ${{{function}(5,10)}}"
            ))
            .into())
        }
    }
}
