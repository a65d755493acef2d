//! Recipe interpreter.

use futures::future::BoxFuture;

use super::{GetRecipe, HttpRecipe, Op, Recipe, ResponseParser};
use crate::codec::RawValue;
use crate::device::{HealthState, Status};
use crate::env::RequestEnv;
use crate::error::{Error, Result};
use crate::oid::Oid;

/// Where a recipe is evaluated: the request plus, inside a list property,
/// the current row index.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub env: &'a RequestEnv,
    pub index: Option<&'a str>,
}

impl<'a> EvalContext<'a> {
    pub fn new(env: &'a RequestEnv) -> Self {
        Self { env, index: None }
    }

    pub fn at(self, index: &'a str) -> Self {
        Self {
            index: Some(index),
            ..self
        }
    }

    fn expand(&self, template: &str) -> String {
        match self.index {
            Some(index) => template.replace("${index}", index),
            None => template.to_owned(),
        }
    }
}

/// Whether an error means "no value here" rather than a failure.
pub(crate) fn is_absent(err: &Error) -> bool {
    err.is_not_found() || err.is_not_implemented()
}

/// Evaluate `recipe` to a scalar.
pub fn eval<'a>(recipe: &'a Recipe, ctx: EvalContext<'a>) -> BoxFuture<'a, Result<RawValue>> {
    Box::pin(async move {
        ctx.env.check_cancelled()?;
        match recipe {
            Recipe::Get(get) => eval_get(get, ctx).await,
            Recipe::Http(http) => eval_http(http, ctx).await,
            Recipe::Constant(value) => Ok(value.clone()),
            Recipe::Bulk(_) => Err(Error::not_implemented(
                "list property used where a single value is expected",
            )),
            Recipe::Lookup(lookup) => {
                let key = eval(&lookup.source, ctx).await?.as_string();
                let value = ctx.env.mappings.get(&lookup.mapping, key.trim())?;
                apply_ops(RawValue::Text(value), &lookup.ops)
            }
            Recipe::RegexExtract(extract) => {
                let text = eval(&extract.source, ctx).await?.as_string();
                let captured = extract
                    .regex
                    .regex()
                    .captures(&text)
                    .and_then(|c| c.get(extract.group))
                    .map(|m| m.as_str().to_owned())
                    .ok_or_else(|| {
                        Error::not_found(format!("{:?} does not match '{text}'", extract.regex))
                    })?;
                apply_ops(RawValue::Text(captured), &extract.ops)
            }
            Recipe::Chain(alternatives) => {
                let mut last = None;
                for alt in alternatives {
                    match eval(alt, ctx).await {
                        Ok(v) => return Ok(v),
                        Err(e) if is_absent(&e) => last = Some(e),
                        Err(e) => return Err(e),
                    }
                }
                Err(last.unwrap_or_else(|| Error::not_found("empty chain")))
            }
        }
    })
}

async fn eval_get(get: &GetRecipe, ctx: EvalContext<'_>) -> Result<RawValue> {
    let snmp = ctx.env.connection.snmp()?;
    let templated = get.oid.contains("${index}");
    let oid = Oid::parse(&ctx.expand(&get.oid))?;

    let value = match ctx.index {
        // Column read: walk the column once and pick this row.
        Some(index) if !templated && !ctx.env.snmp_gets_instead_of_walk => {
            let row = oid.add_index(index)?;
            let column = ctx.env.run(snmp.walk(&oid)).await?;
            column
                .into_iter()
                .find(|vb| vb.oid == row)
                .map(|vb| vb.value)
                .filter(|v| v.is_successful())
                .ok_or_else(|| Error::not_found(format!("no value for {row}")))?
        }
        Some(index) if !templated => {
            let row = oid.add_index(index)?;
            ctx.env.run(snmp.get_one(&row)).await?
        }
        _ => ctx.env.run(snmp.get_one(&oid)).await?,
    };

    let raw = RawValue::Snmp(value);
    let raw = if get.use_raw_result {
        RawValue::Text(raw.as_raw_string())
    } else {
        raw
    };
    apply_ops(raw, &get.ops)
}

async fn eval_http(recipe: &HttpRecipe, ctx: EvalContext<'_>) -> Result<RawValue> {
    let mut http = ctx.env.connection.http()?.clone();
    if let Some(content_type) = &recipe.content_type {
        http = http.with_content_type(content_type.clone());
    }
    let path = ctx.expand(&recipe.path);
    let response = ctx.env.run(http.get(&path)).await?;
    let parsed = parse_response(&recipe.parser, &response.body)?;
    apply_ops(parsed, &recipe.ops)
}

pub(crate) fn parse_response(parser: &ResponseParser, body: &str) -> Result<RawValue> {
    match parser {
        ResponseParser::Body => Ok(RawValue::Text(body.to_owned())),
        ResponseParser::JsonPointer(pointer) => {
            let doc: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| Error::decode(format!("response is not JSON: {e}")))?;
            match doc.pointer(pointer) {
                None | Some(serde_json::Value::Null) => {
                    Err(Error::not_found(format!("JSON pointer '{pointer}'")))
                }
                Some(serde_json::Value::String(s)) => Ok(RawValue::Text(s.clone())),
                Some(serde_json::Value::Number(n)) => Ok(if let Some(u) = n.as_u64() {
                    RawValue::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or_default())
                }),
                Some(other) => Ok(RawValue::Text(other.to_string())),
            }
        }
        ResponseParser::Regex { pattern, group } => pattern
            .regex()
            .captures(body)
            .and_then(|c| c.get(*group))
            .map(|m| RawValue::Text(m.as_str().to_owned()))
            .ok_or_else(|| Error::not_found(format!("{pattern:?} in response body"))),
    }
}

/// Apply post-processing ops in order.
pub fn apply_ops(mut value: RawValue, ops: &[Op]) -> Result<RawValue> {
    for op in ops {
        value = match op {
            Op::Trim => RawValue::Text(value.as_string().trim().to_owned()),
            Op::RegexReplace { regex, replace } => RawValue::Text(
                regex
                    .regex()
                    .replace_all(&value.as_string(), replace.as_str())
                    .into_owned(),
            ),
            Op::Multiply(factor) => scale(&value, |v| v * factor)?,
            Op::Divide(divisor) => scale(&value, |v| v / divisor)?,
            Op::Map(table) => {
                let key = value.as_string();
                let mapped = table
                    .get(key.trim())
                    .ok_or_else(|| Error::not_found(format!("'{key}' in inline map")))?;
                RawValue::Text(mapped.clone())
            }
            Op::ToStatus => {
                let status = match value.as_int() {
                    Ok(code) => Status::from_code(code)
                        .ok_or_else(|| Error::decode(format!("invalid status code {code}")))?,
                    Err(_) => value.as_string().parse::<Status>()?,
                };
                RawValue::Int(status.to_code())
            }
            Op::ToHealthState => {
                let state = match value.as_int() {
                    Ok(code) => HealthState::from_code(code).ok_or_else(|| {
                        Error::decode(format!("invalid health state code {code}"))
                    })?,
                    Err(_) => value.as_string().parse::<HealthState>()?,
                };
                RawValue::Int(state.to_code())
            }
        };
    }
    Ok(value)
}

/// Scale numerically; integral results stay integers.
fn scale(value: &RawValue, f: impl Fn(f64) -> f64) -> Result<RawValue> {
    let scaled = f(value.as_float()?);
    if scaled.fract() == 0.0 && scaled.abs() < 9.0e15 {
        if scaled >= 0.0 {
            return Ok(RawValue::UInt(scaled as u64));
        }
        return Ok(RawValue::Int(scaled as i64));
    }
    Ok(RawValue::Float(scaled))
}
