//! Decoding of relayed form bodies into records.
//!
//! A body is `key1=value1&key2=value2...` as sent by a browser for an
//! `application/x-www-form-urlencoded` form. Every `&`-separated segment must
//! carry a `=`; the key is everything before the first one. The body is
//! unescaped first, with `+` meaning a space and `%XX` an escaped byte, and
//! only then split.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};

use crate::error::Error;
use crate::models::Record;

/// Source of receipt timestamps for decoded records.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the listener's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// Decodes a form body and stamps it with `clock`'s current time.
///
/// The whole body is unescaped before splitting, so an escaped `&` or `=`
/// acts as a separator. Repeated keys keep the last value. Fails with
/// [`Error::MalformedPayload`] if the unescaped body is not UTF-8 or any
/// segment has no `=` (including an empty body).
pub fn decode(bytes: &[u8], clock: &dyn Clock) -> Result<Record, Error> {
    let body = unquote_plus(bytes)?;
    let mut fields = BTreeMap::new();

    for segment in body.split('&') {
        let Some((key, value)) = segment.split_once('=') else {
            return Err(Error::MalformedPayload(format!(
                "segment {:?} has no '=' separator",
                segment
            )));
        };
        fields.insert(key.to_string(), value.to_string());
    }

    Ok(Record::new(fields, clock.now()))
}

fn unquote_plus(raw: &[u8]) -> Result<String, Error> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();

    String::from_utf8(urlencoding::decode_binary(&spaced).into_owned())
        .map_err(|e| Error::MalformedPayload(format!("body is not valid UTF-8: {e}")))
}
