// Validation and parsing of robot message fields.
//
// Each robot message is interpreted according to the dialogue phase it
// arrives in. The functions here enforce the length limit for that phase
// before anything else, then parse the content. All failures are
// `ProtocolError`s, which the server answers with `301 SYNTAX ERROR`.
//
// Integer parsing mirrors stream extraction: the key id and the confirmation
// accept a token that merely *starts* with an optionally signed integer
// (`"3abc"` reads as 3). Coordinates are stricter: every coordinate token must
// be a whole integer.

use crate::error::ProtocolError;
use crate::message::{
    CONFIRMATION_MAX_LEN, COORDINATES_MAX_LEN, SECRET_MAX_LEN, USERNAME_MAX_LEN,
};
use crate::types::Position;

/// Reject `payload` if it is longer than `max` bytes.
pub fn check_len(field: &'static str, payload: &[u8], max: usize) -> Result<(), ProtocolError> {
    if payload.len() > max {
        return Err(ProtocolError::FieldTooLong {
            field,
            max,
            got: payload.len(),
        });
    }
    Ok(())
}

pub fn check_username(payload: &[u8]) -> Result<(), ProtocolError> {
    check_len("username", payload, USERNAME_MAX_LEN)
}

pub fn check_secret(payload: &[u8]) -> Result<(), ProtocolError> {
    check_len("secret", payload, SECRET_MAX_LEN)
}

/// Parse the leading optionally-signed integer of `token`. Returns `None` if
/// the token does not start with one. Values beyond `i64` saturate, so an
/// oversized number stays a number.
pub fn leading_integer(token: &str) -> Option<i64> {
    let bytes = token.as_bytes();
    let negative = bytes.first() == Some(&b'-');
    let sign_len = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign_len..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let parsed = token[..sign_len + digits].parse().unwrap_or(if negative {
        i64::MIN
    } else {
        i64::MAX
    });
    Some(parsed)
}

/// Parse a key id: the first whitespace-separated token that starts with an
/// integer. Range checking is the key table's job.
pub fn parse_key_id(payload: &[u8]) -> Result<i64, ProtocolError> {
    let text = String::from_utf8_lossy(payload);
    text.split_whitespace()
        .find_map(leading_integer)
        .ok_or(ProtocolError::Malformed {
            field: "key id",
            reason: "no integer",
        })
}

/// Validate a login confirmation and return its integer value, or `None` if
/// it is well-formed but not a number (which can never match a hash).
pub fn parse_confirmation(payload: &[u8]) -> Result<Option<i64>, ProtocolError> {
    check_len("confirmation", payload, CONFIRMATION_MAX_LEN)?;
    let text = String::from_utf8_lossy(payload);
    if text.chars().any(char::is_whitespace) {
        return Err(ProtocolError::Malformed {
            field: "confirmation",
            reason: "contains whitespace",
        });
    }
    Ok(leading_integer(&text))
}

/// Parse a coordinate report: `x y` or `OK x y`, single spaces, signed
/// integers, no decimal points.
pub fn parse_coordinates(payload: &[u8]) -> Result<Position, ProtocolError> {
    const FIELD: &str = "coordinates";
    check_len(FIELD, payload, COORDINATES_MAX_LEN)?;
    let malformed = |reason| ProtocolError::Malformed {
        field: FIELD,
        reason,
    };
    if payload.contains(&b'.') {
        return Err(malformed("decimal point"));
    }
    let text = std::str::from_utf8(payload).map_err(|_| malformed("not utf-8"))?;
    let tokens: Vec<&str> = text.split(' ').collect();
    let (x, y) = match tokens.as_slice() {
        [x, y] | ["OK", x, y] => (*x, *y),
        _ => return Err(malformed("expected `x y` or `OK x y`")),
    };
    let x: i32 = x.parse().map_err(|_| malformed("x is not an integer"))?;
    let y: i32 = y.parse().map_err(|_| malformed("y is not an integer"))?;
    Ok(Position::new(x, y))
}
