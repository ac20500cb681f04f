// ── Template interpreter ──────────────────────────────────────────────────────
//
// Tree-walking evaluation of a parsed template against an `Environment`.
// Arithmetic follows Lua 5.3: integer and float subtypes, `/` and `^` always
// produce floats, numeric strings coerce in arithmetic, and only `nil` and
// `false` are falsy.

use std::collections::HashMap;

use super::{
    parser::{BinOp, Expr, Stmt, UnOp},
    Environment, Record, Value,
};

type Eval<T> = Result<T, String>;

pub(crate) struct Interpreter<'a> {
    globals: &'a Environment,
    locals: HashMap<String, Value>,
    /// The record stored by the latest `set`/`cond` call.
    pub(crate) result: Option<Record>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(globals: &'a Environment) -> Self {
        Self { globals, locals: HashMap::new(), result: None }
    }

    pub(crate) fn run(&mut self, program: &[Stmt]) -> Eval<()> {
        for stmt in program {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Eval<()> {
        match stmt {
            Stmt::Assign { name, value } => {
                let v = self.eval(value)?;
                self.locals.insert(name.clone(), v);
            }
            Stmt::Call(call) => {
                self.eval(call)?;
            }
            Stmt::If { branches, otherwise } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.run(body);
                    }
                }
                self.run(otherwise)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Value {
        self.locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        Ok(match expr {
            Expr::Nil => Value::Nil,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Int(v) => Value::Int(*v),
            Expr::Float(v) => Value::Float(*v),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Var(name) => self.lookup(name),
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                unary(*op, v)?
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    self.eval(rhs)?
                } else {
                    l
                }
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    l
                } else {
                    self.eval(rhs)?
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, l, r)?
            }
            Expr::Call { name, args, line } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a)?);
                }
                self.call(name, values)
                    .map_err(|e| format!("line {line}: {e}"))?
            }
        })
    }

    // ── Library ──────────────────────────────────────────────────────────────

    fn call(&mut self, name: &str, args: Vec<Value>) -> Eval<Value> {
        let bare = name
            .strip_prefix("string.")
            .or_else(|| name.strip_prefix("math."))
            .unwrap_or(name);
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Nil);

        match bare {
            "set" => {
                let result = match arg(0) {
                    Value::Nil => return Err("cannot be nil".into()),
                    Value::Str(s) => Value::Str(s),
                    v @ (Value::Int(_) | Value::Float(_)) => Value::Str(v.to_lua_string()),
                    _ => return Err("Expected string or number".into()),
                };
                let record = Record { result, skip: false };
                self.result = Some(record.clone());
                Ok(Value::Record(Box::new(record)))
            }
            "cond" => {
                let (cond, on_true, on_false) = (arg(0), arg(1), arg(2));
                if matches!(cond, Value::Nil) {
                    return Err("cond cannot be nil".into());
                }
                if matches!(on_true, Value::Nil) {
                    return Err("trueVal cannot be nil".into());
                }
                let mut record = Record {
                    result: Value::Str(String::new()),
                    skip: matches!(on_false, Value::Nil),
                };
                if cond.truthy() {
                    record = unwrap_branch(on_true);
                } else if !record.skip {
                    record = unwrap_branch(on_false);
                }
                self.result = Some(record.clone());
                Ok(Value::Record(Box::new(record)))
            }
            "fmtN" => fmt_n(arg(0), arg(1), arg(2)),
            "tostring" => Ok(Value::Str(arg(0).to_lua_string())),
            "tonumber" => Ok(match arg(0) {
                v @ (Value::Int(_) | Value::Float(_)) => v,
                Value::Str(s) => parse_number(&s).unwrap_or(Value::Nil),
                _ => Value::Nil,
            }),
            "upper" => Ok(Value::Str(string_arg(&arg(0), "upper")?.to_uppercase())),
            "lower" => Ok(Value::Str(string_arg(&arg(0), "lower")?.to_lowercase())),
            "len" => Ok(Value::Int(string_arg(&arg(0), "len")?.chars().count() as i64)),
            "trim" => Ok(Value::Str(string_arg(&arg(0), "trim")?.trim().to_owned())),
            "sub" => {
                let s = string_arg(&arg(0), "sub")?;
                let i = int_arg(&arg(1), "sub", 1)?;
                let j = match arg(2) {
                    Value::Nil => -1,
                    v => int_arg(&v, "sub", 1)?,
                };
                Ok(Value::Str(substring(&s, i, j)))
            }
            "floor" | "ceil" | "abs" => {
                let v = number_arg(&arg(0), bare)?;
                let f = match bare {
                    "floor" => v.floor(),
                    "ceil" => v.ceil(),
                    _ => v.abs(),
                };
                Ok(match arg(0) {
                    Value::Int(i) if bare == "abs" => Value::Int(i.wrapping_abs()),
                    _ => float_to_int_if_exact(f),
                })
            }
            "min" | "max" => {
                let mut best: Option<Value> = None;
                for v in &args {
                    let n = number_arg(v, bare)?;
                    let replace = match &best {
                        None => true,
                        Some(b) => {
                            let cur = b.as_f64().unwrap_or(0.0);
                            if bare == "min" {
                                n < cur
                            } else {
                                n > cur
                            }
                        }
                    };
                    if replace {
                        best = Some(coerce_number(v).unwrap_or(Value::Nil));
                    }
                }
                best.ok_or_else(|| format!("bad argument #1 to '{bare}' (number expected, got no value)"))
            }
            _ => Err(format!("attempt to call a nil value (global '{name}')")),
        }
    }
}

/// A branch value of `cond`: records pass through, anything else becomes
/// the result text.
fn unwrap_branch(v: Value) -> Record {
    match v {
        Value::Record(r) => *r,
        other => Record { result: other, skip: false },
    }
}

fn string_arg(v: &Value, func: &str) -> Eval<String> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(_) | Value::Float(_) => Ok(v.to_lua_string()),
        other => Err(format!(
            "bad argument #1 to '{func}' (string expected, got {})",
            other.type_name()
        )),
    }
}

fn number_arg(v: &Value, func: &str) -> Eval<f64> {
    coerce_number(v)
        .and_then(|n| n.as_f64())
        .ok_or_else(|| format!("bad argument to '{func}' (number expected, got {})", v.type_name()))
}

fn int_arg(v: &Value, func: &str, position: usize) -> Eval<i64> {
    match coerce_number(v) {
        Some(Value::Int(i)) => Ok(i),
        Some(Value::Float(f)) if f.fract() == 0.0 => Ok(f as i64),
        _ => Err(format!(
            "bad argument #{} to '{func}' (number has no integer representation)",
            position + 1
        )),
    }
}

/// Lua `string.sub` with 1-based, inclusive, negative-from-end indices, on
/// characters.
fn substring(s: &str, i: i64, j: i64) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let norm = |k: i64| if k < 0 { (len + k + 1).max(0) } else { k };
    let start = norm(i).max(1);
    let end = norm(j).min(len);
    if start > end {
        return String::new();
    }
    chars[(start - 1) as usize..end as usize].iter().collect()
}

/// Precision cap for `fmtN`, as C's `%.*f` is used in practice.
const MAX_DECIMALS: f64 = 20.0;

fn fmt_n(num: Value, max_decimals: Value, fixed: Value) -> Eval<Value> {
    let num = match num {
        Value::Nil => return Err("num cannot be nil".into()),
        Value::Int(_) | Value::Float(_) => num.as_f64().unwrap_or(0.0),
        _ => return Err("Invalid type for num. Expected a number".into()),
    };
    let decimals = match max_decimals {
        Value::Nil => return Err("maxDecimals cannot be nil".into()),
        Value::Int(_) | Value::Float(_) => max_decimals.as_f64().unwrap_or(0.0).clamp(0.0, MAX_DECIMALS),
        _ => return Err("Invalid type for maxDecimals. Expected a number".into()),
    };
    let fixed = match fixed {
        Value::Nil => return Err("fixedDecimals cannot be nil".into()),
        Value::Bool(b) => b,
        _ => return Err("Invalid type for fixedDecimals. Expected a boolean".into()),
    };

    let multiplier = 10f64.powf(decimals);
    let rounded = (num * multiplier + 0.5).floor() / multiplier;
    let text = if fixed {
        format!("{:.*}", decimals.max(0.0) as usize, rounded)
    } else if rounded.fract() == 0.0 && rounded.abs() < 9.2e18 {
        format!("{}", rounded.trunc() as i64)
    } else {
        Value::Float(rounded).to_lua_string()
    };
    Ok(Value::Str(text))
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// Parse Lua numeric syntax, as used by `tonumber` and string coercion.
pub(crate) fn parse_number(s: &str) -> Option<Value> {
    let t = s.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(Value::Int);
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Value::Int(i));
    }
    // Rust accepts "inf"/"nan" spellings that Lua does not.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse::<f64>().ok().map(Value::Float)
}

fn coerce_number(v: &Value) -> Option<Value> {
    match v {
        Value::Int(_) | Value::Float(_) => Some(v.clone()),
        Value::Str(s) => parse_number(s),
        _ => None,
    }
}

fn float_to_int_if_exact(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.2e18 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

fn arith_error(v: &Value) -> String {
    format!("attempt to perform arithmetic on a {} value", v.type_name())
}

fn unary(op: UnOp, v: Value) -> Eval<Value> {
    match op {
        UnOp::Not => Ok(Value::Bool(!v.truthy())),
        UnOp::Neg => match coerce_number(&v) {
            Some(Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
            Some(Value::Float(f)) => Ok(Value::Float(-f)),
            _ => Err(arith_error(&v)),
        },
        UnOp::Len => match &v {
            Value::Str(s) => Ok(Value::Int(s.len() as i64)),
            other => Err(format!("attempt to get length of a {} value", other.type_name())),
        },
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Eval<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(l.lua_eq(&r))),
        BinOp::Ne => Ok(Value::Bool(!l.lua_eq(&r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &l, &r),
        BinOp::Concat => {
            let piece = |v: &Value| match v {
                Value::Str(s) => Ok(s.clone()),
                Value::Int(_) | Value::Float(_) => Ok(v.to_lua_string()),
                other => Err(format!("attempt to concatenate a {} value", other.type_name())),
            };
            Ok(Value::Str(piece(&l)? + &piece(&r)?))
        }
        _ => arithmetic(op, &l, &r),
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Eval<Value> {
    let ord = match (l, r) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                return Err(format!(
                    "attempt to compare {} with {}",
                    l.type_name(),
                    r.type_name()
                ))
            }
        },
    };
    let Some(ord) = ord else {
        return Ok(Value::Bool(false));
    };
    use std::cmp::Ordering::*;
    Ok(Value::Bool(match op {
        BinOp::Lt => ord == Less,
        BinOp::Le => ord != Greater,
        BinOp::Gt => ord == Greater,
        _ => ord != Less,
    }))
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> Eval<Value> {
    let a = coerce_number(l).ok_or_else(|| arith_error(l))?;
    let b = coerce_number(r).ok_or_else(|| arith_error(r))?;

    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        match op {
            BinOp::Add => return Ok(Value::Int(x.wrapping_add(y))),
            BinOp::Sub => return Ok(Value::Int(x.wrapping_sub(y))),
            BinOp::Mul => return Ok(Value::Int(x.wrapping_mul(y))),
            BinOp::IDiv if y == 0 => return Err("attempt to perform 'n//0'".into()),
            BinOp::Mod if y == 0 => return Err("attempt to perform 'n%%0'".into()),
            BinOp::IDiv => {
                let q = x.wrapping_div(y);
                let floor = x.wrapping_rem(y) != 0 && (x < 0) != (y < 0);
                return Ok(Value::Int(if floor { q - 1 } else { q }));
            }
            BinOp::Mod => {
                let m = x.wrapping_rem(y);
                return Ok(Value::Int(if m != 0 && (m ^ y) < 0 { m + y } else { m }));
            }
            _ => {}
        }
    }

    let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
    Ok(Value::Float(match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::IDiv => (x / y).floor(),
        BinOp::Mod => {
            let m = x % y;
            if m != 0.0 && (m < 0.0) != (y < 0.0) {
                m + y
            } else {
                m
            }
        }
        _ => x.powf(y),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_floor_division_and_modulo() {
        let i = |v| Value::Int(v);
        assert_eq!(arithmetic(BinOp::IDiv, &i(7), &i(2)).unwrap(), i(3));
        assert_eq!(arithmetic(BinOp::IDiv, &i(-7), &i(2)).unwrap(), i(-4));
        assert_eq!(arithmetic(BinOp::IDiv, &i(7), &i(-2)).unwrap(), i(-4));
        assert_eq!(arithmetic(BinOp::Mod, &i(-7), &i(3)).unwrap(), i(2));
        assert_eq!(arithmetic(BinOp::Mod, &i(7), &i(-3)).unwrap(), i(-2));
        assert!(arithmetic(BinOp::Mod, &i(1), &i(0)).is_err());
    }

    #[test]
    fn division_and_power_are_float() {
        assert_eq!(arithmetic(BinOp::Div, &Value::Int(6), &Value::Int(3)).unwrap(), Value::Float(2.0));
        assert_eq!(arithmetic(BinOp::Pow, &Value::Int(2), &Value::Int(3)).unwrap(), Value::Float(8.0));
    }

    #[test]
    fn numeric_strings_coerce() {
        let v = arithmetic(BinOp::Add, &Value::Str("10".into()), &Value::Int(1)).unwrap();
        assert_eq!(v, Value::Int(11));
        assert!(arithmetic(BinOp::Add, &Value::Str("x".into()), &Value::Int(1)).is_err());
    }

    #[test]
    fn substrings() {
        assert_eq!(substring("hello", 2, 4), "ell");
        assert_eq!(substring("hello", -3, -1), "llo");
        assert_eq!(substring("hello", 4, 2), "");
        assert_eq!(substring("hello", 0, 100), "hello");
    }

    #[test]
    fn fmt_n_rounding() {
        let f = |n: f64, d: i64, fixed: bool| match fmt_n(Value::Float(n), Value::Int(d), Value::Bool(fixed)).unwrap() {
            Value::Str(s) => s,
            other => panic!("{other:?}"),
        };
        assert_eq!(f(3.14159, 2, false), "3.14");
        assert_eq!(f(2.5, 0, false), "3");
        assert_eq!(f(2.0, 2, true), "2.00");
        assert_eq!(f(1.005, 1, false), "1");
        assert!(fmt_n(Value::Str("x".into()), Value::Int(1), Value::Bool(true)).is_err());
        assert!(fmt_n(Value::Int(1), Value::Int(1), Value::Nil).is_err());
    }

    #[test]
    fn fmt_n_precision_is_bounded() {
        let text = |d: Value| match fmt_n(Value::Int(1), d, Value::Bool(true)).unwrap() {
            Value::Str(s) => s,
            other => panic!("{other:?}"),
        };
        assert_eq!(text(Value::Float(1e18)), format!("1.{}", "0".repeat(20)));
        assert_eq!(text(Value::Int(-3)), "1");
    }
}
