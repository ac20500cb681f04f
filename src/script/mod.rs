// ── Scripted replacement ──────────────────────────────────────────────────────
//
// With "use variables" on, an entry's replacement text is a small program
// instead of a literal.  The engine only sees the `ExpressionEvaluator`
// trait: template + variables in, `(text, skip)` out.  `TemplateEvaluator`
// is the built-in implementation, a Lua-flavoured expression language:
//
//   set(CNT .. ". " .. MATCH)
//   cond(LINE > 10, "late", "early")
//   if COL == 2 then set(fmtN(MATCH * 1.19, 2, true)) end
//
// A template produces its result by calling `set` or `cond`; the last such
// call wins.  `cond` without a false branch and a false condition means
// "skip": leave the match as it is.

use std::{collections::BTreeMap, fmt, rc::Rc};

use tracing::trace;

use crate::error::ScriptError;

mod interp;
mod lexer;
mod parser;

// ── Values ────────────────────────────────────────────────────────────────────

/// The `{ result, skip }` record `set` and `cond` produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub result: Value,
    pub skip: bool,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Record(Box<Record>),
}

impl Value {
    /// Only `nil` and `false` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Record(_) => "table",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with Lua semantics: numbers compare by value across
    /// subtypes, records never compare equal.
    pub fn lua_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (a @ (Value::Int(_) | Value::Float(_)), b @ (Value::Int(_) | Value::Float(_))) => {
                a.as_f64() == b.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }

    /// What `tostring` returns.
    pub fn to_lua_string(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Record(_) => "table".into(),
        }
    }

    /// Classify match text: numeric text becomes a number, anything else
    /// stays a string.
    ///
    /// Accepted numbers are digits with at most one `.` or `,` separator; a
    /// comma is read as a decimal point.  A lone separator is text.
    pub fn from_match_text(text: &str) -> Value {
        match normalize_number(text) {
            Some(normalized) => match normalized.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Value::Int(f as i64),
                Ok(f) => Value::Float(f),
                Err(_) => Value::Str(text.to_owned()),
            },
            None => Value::Str(text.to_owned()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lua_string())
    }
}

fn normalize_number(text: &str) -> Option<String> {
    if text.is_empty() || text == "." || text == "," {
        return None;
    }
    let mut separators = 0;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '0'..='9' => out.push(c),
            '.' | ',' => {
                separators += 1;
                if separators > 1 {
                    return None;
                }
                out.push('.');
            }
            _ => return None,
        }
    }
    Some(out)
}

/// `%.14g`, plus a trailing `.0` for integral values, as Lua prints floats.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.into();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.into();
    }

    let sci = format!("{f:.13e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..14).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs());
    }
    let decimals = (13 - exponent).max(0) as usize;
    let fixed = format!("{f:.decimals$}");
    let trimmed = trim_fraction(&fixed);
    if trimmed.contains('.') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}.0")
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

/// Read-only variables visible to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, Value::Int(value));
    }

    /// Store match text, as a number when it reads as one.
    pub fn set_text(&mut self, name: impl Into<String>, text: &str) {
        self.set(name, Value::from_match_text(text));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Evaluator contract ────────────────────────────────────────────────────────

/// What a template decided for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub text: String,
    /// Leave the match untouched.
    pub skip: bool,
}

/// Computes replacement text from a template and match variables.
pub trait ExpressionEvaluator {
    fn evaluate(&mut self, template: &str, env: &Environment) -> Result<Evaluation, ScriptError>;
}

// ── TemplateEvaluator ─────────────────────────────────────────────────────────

/// The built-in evaluator.  The most recent template is kept parsed, since a
/// replace-all evaluates the same one for every match.
#[derive(Default)]
pub struct TemplateEvaluator {
    cached: Option<(String, Rc<Vec<parser::Stmt>>)>,
}

impl TemplateEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn program(&mut self, template: &str) -> Result<Rc<Vec<parser::Stmt>>, ScriptError> {
        if let Some((src, program)) = &self.cached {
            if src == template {
                return Ok(Rc::clone(program));
            }
        }
        let program = lexer::tokenize(template)
            .and_then(parser::parse)
            .map_err(|message| ScriptError::Syntax { template: template.to_owned(), message })?;
        let program = Rc::new(program);
        self.cached = Some((template.to_owned(), Rc::clone(&program)));
        Ok(program)
    }
}

impl ExpressionEvaluator for TemplateEvaluator {
    fn evaluate(&mut self, template: &str, env: &Environment) -> Result<Evaluation, ScriptError> {
        let program = self.program(template)?;
        let runtime = |message: String| ScriptError::Runtime { template: template.to_owned(), message };

        let mut interp = interp::Interpreter::new(env);
        interp.run(&program).map_err(runtime)?;

        let Some(record) = interp.result else {
            return Err(ScriptError::NoResult { template: template.to_owned() });
        };
        let text = match record.result {
            Value::Str(s) => s,
            v @ (Value::Int(_) | Value::Float(_)) => v.to_lua_string(),
            _ if record.skip => String::new(),
            other => {
                return Err(runtime(format!(
                    "result must be a string or number, got {}",
                    other.type_name()
                )))
            }
        };
        trace!(template, skip = record.skip, "template evaluated");
        Ok(Evaluation { text, skip: record.skip })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.set_int("CNT", 3);
        env.set_int("LCNT", 1);
        env.set_int("LINE", 7);
        env.set_int("LPOS", 5);
        env.set_int("APOS", 42);
        env.set_int("COL", 0);
        env.set_text("MATCH", "12,5");
        env.set_text("CAP1", "abc");
        env
    }

    fn run(template: &str) -> Result<Evaluation, ScriptError> {
        TemplateEvaluator::new().evaluate(template, &env())
    }

    fn text(template: &str) -> String {
        let eval = run(template).unwrap();
        assert!(!eval.skip, "unexpected skip for {template}");
        eval.text
    }

    #[test]
    fn set_strings_and_numbers() {
        assert_eq!(text("set('x')"), "x");
        assert_eq!(text("set(CNT)"), "3");
        assert_eq!(text("set(CNT + 0.5)"), "3.5");
        assert_eq!(text("set(CNT / 3)"), "1.0");
        assert_eq!(text("set(LINE .. ':' .. LPOS)"), "7:5");
    }

    #[test]
    fn match_text_is_numeric_when_it_can_be() {
        assert_eq!(text("set(MATCH * 2)"), "25.0");
        assert_eq!(text("set(CAP1:upper())"), "ABC");
        assert_eq!(Value::from_match_text("12"), Value::Int(12));
        assert_eq!(Value::from_match_text("1,5"), Value::Float(1.5));
        assert_eq!(Value::from_match_text(","), Value::Str(",".into()));
        assert_eq!(Value::from_match_text("1.2.3"), Value::Str("1.2.3".into()));
        assert_eq!(Value::from_match_text("-5"), Value::Str("-5".into()));
        assert_eq!(Value::from_match_text(""), Value::Str(String::new()));
    }

    #[test]
    fn cond_without_false_branch_skips() {
        let eval = run("cond(false, 'X')").unwrap();
        assert!(eval.skip);
        assert_eq!(eval.text, "");
        assert_eq!(text("cond(true, 'X')"), "X");
        assert_eq!(text("cond(LINE > 10, 'late', 'early')"), "early");
    }

    #[test]
    fn cond_unwraps_nested_records() {
        assert_eq!(text("cond(true, cond(false, 'a', 'b'), 'c')"), "b");
        assert!(run("cond(false, 'a', cond(false, 'b'))").unwrap().skip);
        assert_eq!(text("cond(CNT == 3, set('three'))"), "three");
    }

    #[test]
    fn last_result_call_wins() {
        assert_eq!(text("set('a'); set('b')"), "b");
        assert_eq!(text("x = fmtN(3.14159, 2, false)\nif x == '3.14' then set('pi') else set(x) end"), "pi");
    }

    #[test]
    fn fmt_n_variants() {
        assert_eq!(text("set(fmtN(2.5, 0, false))"), "3");
        assert_eq!(text("set(fmtN(2, 2, true))"), "2.00");
        assert_eq!(text("set(fmtN(1/3, 3, false))"), "0.333");
    }

    #[test]
    fn missing_result_is_reported() {
        assert!(matches!(run("x = 1"), Err(ScriptError::NoResult { .. })));
        assert!(matches!(run(""), Err(ScriptError::NoResult { .. })));
    }

    #[test]
    fn syntax_and_runtime_errors_are_distinguished() {
        assert!(matches!(run("set("), Err(ScriptError::Syntax { .. })));
        assert!(matches!(run("set(nil)"), Err(ScriptError::Runtime { .. })));
        assert!(matches!(run("cond(nil, 'a')"), Err(ScriptError::Runtime { .. })));
        assert!(matches!(run("cond(true, nil)"), Err(ScriptError::Runtime { .. })));
        assert!(matches!(run("nope()"), Err(ScriptError::Runtime { .. })));
        assert!(matches!(run("set({})"), Err(ScriptError::Syntax { .. })));
        assert!(matches!(run("cond(true, true)"), Err(ScriptError::Runtime { .. })));
    }

    #[test]
    fn library_functions() {
        assert_eq!(text("set(string.lower('AbC'))"), "abc");
        assert_eq!(text("set(sub('hello', 2, 3))"), "el");
        assert_eq!(text("set(trim('  x '))"), "x");
        assert_eq!(text("set(len('héllo'))"), "5");
        assert_eq!(text("set(tonumber('0x10') + 1)"), "17");
        assert_eq!(text("set(tostring(nil))"), "nil");
        assert_eq!(text("set(math.floor(2.7))"), "2");
        assert_eq!(text("set(max(1, 5, 3))"), "5");
        assert_eq!(text("set(7 // 2 .. ' ' .. 7 % 3 .. ' ' .. 2^10)"), "3 1 1024.0");
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(-2.5e-7), "-2.5e-07");
        assert_eq!(format_float(123456.789), "123456.789");
    }

    #[test]
    fn template_cache_is_keyed_on_text() {
        let mut ev = TemplateEvaluator::new();
        let e = env();
        assert_eq!(ev.evaluate("set(CNT)", &e).unwrap().text, "3");
        assert_eq!(ev.evaluate("set(CNT)", &e).unwrap().text, "3");
        assert_eq!(ev.evaluate("set(LINE)", &e).unwrap().text, "7");
    }
}
