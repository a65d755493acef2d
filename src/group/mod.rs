//! List properties: one record per index of a table.
//!
//! A group read walks the index column, then evaluates every field recipe
//! for every index. Indices run concurrently; the fields of one index are
//! read in order, group-filter fields first so that a rejected record costs
//! no further requests.

mod filter;

pub use filter::{CompiledFilters, PropertyFilter};

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::device::{FromRecord, Record};
use crate::env::RequestEnv;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::recipe::{BulkRecipe, EvalContext, GetRecipe, Recipe, eval};

/// Indices read at the same time.
const INDEX_CONCURRENCY: usize = 16;

/// Index suffixes of every row below `base`, in walk order.
pub async fn read_indices(env: &RequestEnv, base: &Oid) -> Result<Vec<String>> {
    let snmp = env.connection.snmp()?;
    let column = env.run(snmp.walk(base)).await?;
    let mut seen = std::collections::HashSet::new();
    Ok(column
        .into_iter()
        .filter_map(|vb| {
            vb.oid.strip_prefix(base).filter(|s| !s.is_empty()).map(|suffix| {
                suffix
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            })
        })
        .filter(|index| seen.insert(index.clone()))
        .collect())
}

/// Read every row of `bulk` as `(index, record)` pairs.
#[tracing::instrument(level = "debug", target = "async_devmon::group", skip_all, fields(group.index = %bulk.index))]
pub async fn read_group(
    bulk: &BulkRecipe,
    env: &RequestEnv,
    filters: &CompiledFilters,
) -> Result<Vec<(String, Record)>> {
    let indices = read_indices(env, &bulk.index).await?;
    let (first, rest): (Vec<_>, Vec<_>) = bulk
        .fields
        .iter()
        .filter(|(path, _)| filters.wants(path))
        .partition(|(path, _)| filters.is_group_path(path));

    let rows: Vec<Option<(String, Record)>> = stream::iter(indices)
        .map(|index| {
            let (first, rest) = (&first, &rest);
            async move {
                let ctx = EvalContext::new(env).at(&index);
                let mut record = Record::new();
                read_fields(first, ctx, &mut record).await?;
                if !filters.keep_record(&record) {
                    return Ok(None);
                }
                read_fields(rest, ctx, &mut record).await?;
                filters.finish(&mut record);
                Ok::<_, Box<Error>>(Some((index.clone(), record)))
            }
        })
        .buffered(INDEX_CONCURRENCY)
        .try_collect()
        .await?;

    let rows: Vec<_> = rows.into_iter().flatten().collect();
    tracing::debug!(target: "async_devmon::group", { rows = rows.len() }, "group read");
    Ok(rows)
}

async fn read_fields(
    fields: &[(&String, &Recipe)],
    ctx: EvalContext<'_>,
    record: &mut Record,
) -> Result<()> {
    for (path, recipe) in fields {
        match eval(recipe, ctx).await {
            Ok(value) => record.insert(path.as_str(), value),
            Err(e) if crate::recipe::is_absent(&e) => {
                tracing::trace!(target: "async_devmon::group", { field = %path, index = ctx.index, error = %e }, "field absent");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// [`read_group`] converted to typed records.
pub async fn read_typed<T: FromRecord>(
    bulk: &BulkRecipe,
    env: &RequestEnv,
    filters: &CompiledFilters,
) -> Result<Vec<T>> {
    // Boxed to keep the layout depth of callers' futures bounded.
    let rows = Box::pin(read_group(bulk, env, filters)).await?;
    Ok(rows
        .iter()
        .map(|(_, r)| T::from_record(r))
        .collect())
}

/// Build a column table from `(field path, column OID)` pairs.
pub fn columns(index: &str, fields: &[(&str, &str)]) -> Result<BulkRecipe> {
    let index = Oid::parse(index)?;
    let fields = fields
        .iter()
        .map(|(path, oid)| {
            Oid::parse(oid)?;
            Ok((
                (*path).to_owned(),
                Recipe::Get(GetRecipe {
                    oid: (*oid).to_owned(),
                    use_raw_result: false,
                    ops: Vec::new(),
                }),
            ))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(BulkRecipe {
        index,
        inherit: false,
        fields,
    })
}

/// Overlay the fields of `extra` onto the rows of `base` sharing the same
/// value of `key`. Rows without a partner are left alone.
pub fn merge_by_key(base: &mut [(String, Record)], extra: &[(String, Record)], key: &str) {
    for (_, overlay) in extra {
        let Some(wanted) = overlay.string(key) else {
            continue;
        };
        if let Some((_, target)) = base
            .iter_mut()
            .find(|(_, r)| r.string(key).as_deref() == Some(wanted.as_str()))
        {
            for (path, value) in overlay.iter() {
                target.insert(path, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_builds_get_fields() {
        let bulk = columns(
            ".1.3.6.1.2.1.2.2.1.1",
            &[("ifDescr", ".1.3.6.1.2.1.2.2.1.2"), ("ifSpeed", ".1.3.6.1.2.1.2.2.1.5")],
        )
        .unwrap();
        assert_eq!(bulk.fields.len(), 2);
        assert!(columns(".1.3", &[("x", "not-an-oid")]).is_err());
    }

    #[test]
    fn merge_matches_rows_by_field() {
        let row = |descr: &str, speed: u64| {
            let mut r = Record::new();
            r.insert("ifDescr", descr);
            r.insert("ifSpeed", speed);
            (String::new(), r)
        };
        let mut base = vec![row("eth0", 10), row("eth1", 20)];
        let mut overlay = Record::new();
        overlay.insert("ifDescr", "eth1");
        overlay.insert("radio.level_in", -40i64);
        merge_by_key(&mut base, &[(String::new(), overlay)], "ifDescr");
        assert!(base[1].1.contains("radio.level_in"));
        assert!(!base[0].1.contains("radio.level_in"));
        assert_eq!(base[1].1.uint("ifSpeed"), Some(20));
    }

    fn offline_env() -> RequestEnv {
        use std::sync::Arc;

        use crate::assets::EmbeddedAssets;
        use crate::mapping::MappingRegistry;
        use crate::network::Connection;

        RequestEnv::new(
            Connection::from_parts("192.0.2.1".parse().unwrap(), None, None),
            Arc::new(MappingRegistry::new(Arc::new(EmbeddedAssets))),
            tokio_util::sync::CancellationToken::new(),
        )
    }

    /// `regex_extract` over a constant, scaled by `factor`.
    fn scaled_constant(text: &str, regex: &str, factor: f64) -> Recipe {
        Recipe::RegexExtract(crate::recipe::RegexExtractRecipe {
            source: Box::new(Recipe::Constant(crate::codec::RawValue::Text(text.into()))),
            regex: crate::recipe::Pattern::new(regex).unwrap(),
            group: 1,
            ops: vec![crate::recipe::Op::Multiply(factor)],
        })
    }

    #[tokio::test]
    async fn unparsable_field_fails_the_row() {
        let env = offline_env();
        let speed_path = "ifSpeed".to_owned();
        let speed = scaled_constant("n/a", "(.*)", 1000.0);
        let mut record = Record::new();
        let err = read_fields(&[(&speed_path, &speed)], EvalContext::new(&env), &mut record)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }

    #[tokio::test]
    async fn unmatched_field_is_left_out() {
        let env = offline_env();
        let speed_path = "ifSpeed".to_owned();
        let speed = scaled_constant("n/a", r"(\d+)", 1000.0);
        let mtu_path = "ifMtu".to_owned();
        let mtu = scaled_constant("1500", r"(\d+)", 1.0);
        let mut record = Record::new();
        read_fields(
            &[(&speed_path, &speed), (&mtu_path, &mtu)],
            EvalContext::new(&env),
            &mut record,
        )
        .await
        .unwrap();
        assert!(!record.contains("ifSpeed"));
        assert_eq!(record.uint("ifMtu"), Some(1500));
    }
}
