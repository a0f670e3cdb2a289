//! Command-line argument syntax for OSC values
//!
//! Each argument is `tag:value` with an OSC type tag, or a bare value whose
//! type is inferred:
//!
//! | Input          | Value            |
//! |----------------|------------------|
//! | `i:42`, `42`   | Int              |
//! | `f:0.5`, `0.5` | Float            |
//! | `s:text`, `text` | String         |
//! | `b:00ff10`     | Blob (hex)       |
//! | `h:-7`         | Long             |
//! | `d:2.5`        | Double           |
//! | `t:now`, `t:<u64>` | Time tag     |
//! | `T`, `F`, `true`, `false` | Bool  |
//! | `N`            | Nil              |

use anyhow::{anyhow, bail, Context, Result};
use oscmux::{OscValue, TimeTag};

pub fn parse_values(inputs: &[String]) -> Result<Vec<OscValue>> {
    inputs
        .iter()
        .map(|input| parse_value(input).with_context(|| format!("Invalid argument {:?}", input)))
        .collect()
}

pub fn parse_value(input: &str) -> Result<OscValue> {
    match input {
        "T" | "true" => return Ok(OscValue::Bool(true)),
        "F" | "false" => return Ok(OscValue::Bool(false)),
        "N" => return Ok(OscValue::Nil),
        _ => {}
    }

    if let Some((tag, body)) = split_tag(input) {
        return Ok(match tag {
            'i' => OscValue::Int(body.parse()?),
            'f' => OscValue::Float(body.parse()?),
            's' => OscValue::String(body.to_string()),
            'b' => OscValue::Blob(parse_hex(body)?),
            'h' => OscValue::Long(body.parse()?),
            'd' => OscValue::Double(body.parse()?),
            't' if body == "now" => OscValue::Time(TimeTag::now()),
            't' => OscValue::Time(TimeTag::from(body.parse::<u64>()?)),
            other => bail!("unknown type tag '{}'", other),
        });
    }

    Ok(if let Ok(i) = input.parse::<i32>() {
        OscValue::Int(i)
    } else if let Ok(f) = input.parse::<f32>() {
        OscValue::Float(f)
    } else {
        OscValue::String(input.to_string())
    })
}

/// `x:rest` where `x` is a single character
fn split_tag(input: &str) -> Option<(char, &str)> {
    let mut chars = input.chars();
    let tag = chars.next()?;
    let body = chars.as_str().strip_prefix(':')?;
    Some((tag, body))
}

fn parse_hex(body: &str) -> Result<Vec<u8>> {
    if body.len() % 2 != 0 {
        bail!("hex blob needs an even number of digits");
    }
    (0..body.len())
        .step_by(2)
        .map(|i| {
            body.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| anyhow!("bad hex digits at offset {}", i))
        })
        .collect()
}
