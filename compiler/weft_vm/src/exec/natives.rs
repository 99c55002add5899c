//! Native helpers behind `Op::Invoke`.

use weft_bytecode::{Native, Slot};
use weft_ir::{EngineFault, NumberKind, Value};

use super::Frame;
use crate::ParseState;

/// Run `native` at the current position. `None` means no match; the
/// position is only moved on success.
pub(super) fn invoke(
    native: Native,
    args: &[Slot],
    frame: &Frame<'_>,
    state: &mut ParseState<'_>,
) -> Result<Option<Value>, EngineFault> {
    match native {
        Native::MatchRegex(index) => {
            let regex = frame.program.regex_const(index)?;
            let Some(found) = regex.find(state.rest()).filter(|m| m.start() == 0) else {
                return Ok(None);
            };
            state.advance_bytes(found.end());
            Ok(Some(Value::str(found.as_str())))
        }
        Native::ParseNumber(kind) => Ok(scan_number(state.rest(), kind).map(|(len, value)| {
            state.advance_bytes(len);
            value
        })),
        Native::TakeChars => {
            let count = match arg(frame, state, args, 0)? {
                Value::Int(n) => usize::try_from(n).unwrap_or(usize::MAX),
                other => return Err(frame.kind_fault("int", other.type_name())),
            };
            let rest = state.rest();
            let Some(len) = char_prefix_len(rest, count) else {
                return Ok(None);
            };
            state.advance_bytes(len);
            Ok(Some(Value::str(&rest[..len])))
        }
        Native::FoldCase => match arg(frame, state, args, 0)? {
            Value::Str(text) => Ok(Some(Value::Str(text.to_lowercase()))),
            other => Err(frame.kind_fault("str", other.type_name())),
        },
        Native::UserObject => Ok(Some(state.user().clone())),
    }
}

fn arg(
    frame: &Frame<'_>,
    state: &ParseState<'_>,
    args: &[Slot],
    index: usize,
) -> Result<Value, EngineFault> {
    match args.get(index) {
        Some(Slot::Int(slot)) => Ok(Value::Int(frame.int(state, *slot)?)),
        Some(Slot::Obj(slot)) => Ok(frame.obj(state, *slot)?.clone()),
        None => Err(frame.kind_fault("argument", "nothing")),
    }
}

/// Byte length of the first `count` characters, if there are that many.
fn char_prefix_len(text: &str, count: usize) -> Option<usize> {
    let mut chars = text.chars();
    let mut len = 0;
    for _ in 0..count {
        len += chars.next()?.len_utf8();
    }
    Some(len)
}

/// Scan a number literal at the start of `text`.
///
/// `[+-]? digits ('.' digits)? ([eE] [+-]? digits)?`, where the fraction
/// and exponent are only considered for `Float` and `Any`, and each is
/// taken only when digits follow. `Integer` fails on overflow; `Any` falls
/// back to a float instead.
pub(super) fn scan_number(text: &str, kind: NumberKind) -> Option<(usize, Value)> {
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let whole = digits(&bytes[end..]);
    if whole == 0 {
        return None;
    }
    end += whole;

    let mut fractional = false;
    if kind != NumberKind::Integer {
        if bytes.get(end) == Some(&b'.') {
            let frac = digits(bytes.get(end + 1..).unwrap_or_default());
            if frac > 0 {
                end += 1 + frac;
                fractional = true;
            }
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            let n = digits(bytes.get(exp..).unwrap_or_default());
            if n > 0 {
                end = exp + n;
                fractional = true;
            }
        }
    }

    // All scanned bytes are ASCII.
    let literal = text.get(..end)?;
    let value = match kind {
        NumberKind::Integer => Value::Int(literal.parse().ok()?),
        NumberKind::Float => Value::Float(literal.parse().ok()?),
        NumberKind::Any if fractional => Value::Float(literal.parse().ok()?),
        NumberKind::Any => literal
            .parse()
            .map(Value::Int)
            .or_else(|_| literal.parse().map(Value::Float))
            .ok()?,
    };
    Some((end, value))
}

fn digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
