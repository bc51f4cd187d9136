//! Text builtins: length, slicing, search, conversion, and `%`-style
//! formatting.
//!
//! Positions and lengths count Unicode scalar values, not bytes; scripts
//! index text the way they see it.

use filly_vm::vm::{Value, Vm};

use crate::args::{arg_i64, arg_text, arg_value};

pub fn register(vm: &mut Vm) {
    vm.register_builtin("StrLen", |_vm, args| {
        Ok(Value::I64(arg_text(args, 0).chars().count() as i64))
    });

    // SubStr(s, start, len): start counts from 0; out-of-range reads clamp
    // to the empty string.
    vm.register_builtin("SubStr", |_vm, args| {
        let s = arg_text(args, 0);
        let start = arg_i64(args, 1).max(0) as usize;
        let len = arg_i64(args, 2).max(0) as usize;
        let sub: String = s.chars().skip(start).take(len).collect();
        Ok(Value::Str(sub))
    });

    // StrFind(s, needle): first match position in characters, or -1.
    vm.register_builtin("StrFind", |_vm, args| {
        let s = arg_text(args, 0);
        let needle = arg_text(args, 1);
        let found = match s.find(&needle) {
            Some(byte_pos) => s[..byte_pos].chars().count() as i64,
            None => -1,
        };
        Ok(Value::I64(found))
    });

    // Str(v): stringify by the standard rules.
    vm.register_builtin("Str", |_vm, args| Ok(Value::Str(arg_text(args, 0))));

    // Val(s): numeric reading of a text; a decimal point yields a float.
    vm.register_builtin("Val", |_vm, args| {
        let s = arg_text(args, 0);
        let t = s.trim();
        if t.contains(['.', 'e', 'E']) {
            if let Ok(f) = t.parse::<f64>() {
                return Ok(Value::F64(f));
            }
        }
        Ok(Value::I64(arg_value(args, 0).coerce_i64().unwrap_or(0)))
    });

    // Format(fmt, ...): %d, %s, %f/%g and %% - the platform's small
    // printf. Unknown verbs pass through unchanged.
    vm.register_builtin("Format", |_vm, args| {
        let fmt = arg_text(args, 0);
        Ok(Value::Str(format_values(&fmt, args.get(1..).unwrap_or(&[]))))
    });
}

fn format_values(fmt: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut next = 0usize;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('d') => {
                let v = args.get(next).cloned().unwrap_or(Value::I64(0));
                next += 1;
                out.push_str(&v.coerce_i64().unwrap_or(0).to_string());
            }
            Some('s') => {
                let v = args.get(next).cloned().unwrap_or(Value::Str(String::new()));
                next += 1;
                out.push_str(&v.to_text());
            }
            Some('f') => {
                let v = args.get(next).cloned().unwrap_or(Value::F64(0.0));
                next += 1;
                out.push_str(&format!("{:.6}", v.coerce_f64().unwrap_or(0.0)));
            }
            Some('g') => {
                let v = args.get(next).cloned().unwrap_or(Value::F64(0.0));
                next += 1;
                out.push_str(&v.to_text());
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_verbs() {
        let args = vec![Value::I64(3), Value::Str("ok".into()), Value::F64(1.5)];
        assert_eq!(format_values("n=%d %s %g", &args), "n=3 ok 1.5");
        assert_eq!(format_values("100%%", &[]), "100%");
        assert_eq!(format_values("%q", &[]), "%q");
    }

    #[test]
    fn test_format_missing_arguments_default() {
        assert_eq!(format_values("%d/%s", &[]), "0/");
    }

    #[test]
    fn test_format_float_precision() {
        assert_eq!(format_values("%f", &[Value::F64(0.5)]), "0.500000");
    }
}
