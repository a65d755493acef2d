//! Device identification: depth-first search of the class tree.
//!
//! Starting below `generic`, children are tried in identifier order with the
//! `try_to_match_last` ones after the rest. The search descends into the
//! first child whose condition holds; when none of that child's own
//! children match, the child itself is the answer.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, instrument};

use crate::class::{ClassRegistry, DeviceClass};
use crate::env::RequestEnv;
use crate::error::{Error, Result};

/// Most specific class whose conditions hold on the live connection.
///
/// `NotFound` means the device answered but no class below `generic`
/// matched. When nothing answered at all the error is a network error.
#[instrument(skip_all, err, fields(device.ip = %env.connection.ip()))]
pub async fn identify(registry: &ClassRegistry, env: &RequestEnv) -> Result<Arc<DeviceClass>> {
    let generic = registry.generic();
    match search(registry, &generic, env).await {
        Ok(class) => {
            debug!(target: "async_devmon::identify", { device.class = %class.id }, "identified");
            Ok(class)
        }
        Err(e) if e.is_not_found() && !env.connection.has_success() => Err(Error::Connection {
            target: env.connection.ip().to_string().into(),
            reason: "device did not answer any identification probe".into(),
        }
        .boxed()),
        Err(e) => Err(e),
    }
}

/// [`identify`], falling back to `generic` when no class matched.
pub async fn identify_or_generic(
    registry: &ClassRegistry,
    env: &RequestEnv,
) -> Result<Arc<DeviceClass>> {
    match identify(registry, env).await {
        Err(e) if e.is_not_found() => Ok(registry.generic()),
        other => other,
    }
}

/// Whether a previously identified class still matches: every condition
/// from the class up to (not including) `generic` must hold.
pub async fn revalidate(registry: &ClassRegistry, class: &str, env: &RequestEnv) -> Result<bool> {
    for node in registry.chain(class)? {
        if node.is_generic() {
            continue;
        }
        if !node.condition.evaluate(env).await? {
            debug!(target: "async_devmon::identify", { device.class = %node.id }, "cached class no longer matches");
            return Ok(false);
        }
    }
    Ok(true)
}

fn search<'a>(
    registry: &'a ClassRegistry,
    node: &'a DeviceClass,
    env: &'a RequestEnv,
) -> BoxFuture<'a, Result<Arc<DeviceClass>>> {
    Box::pin(async move {
        let (last, normal): (Vec<_>, Vec<_>) = registry
            .children(node)
            .into_iter()
            .partition(|c| c.try_to_match_last);
        for child in normal.into_iter().chain(last) {
            if !child.condition.evaluate(env).await? {
                continue;
            }
            return match search(registry, &child, env).await {
                Ok(found) => Ok(found),
                Err(e) if e.is_not_found() => Ok(child),
                Err(e) => Err(e),
            };
        }
        Err(Error::not_found(format!("no child of '{}' matched", node.id)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Condition;

    fn registry() -> ClassRegistry {
        ClassRegistry::from_files([
            ("generic.yaml", "name: generic\ncomponents: [identify]\n"),
            ("b.yaml", "name: b\ntry_to_match_last: true\ncomponents: [identify]\n"),
            ("a.yaml", "name: a\ncomponents: [identify]\n"),
            ("a/x.yaml", "name: a/x\ncomponents: [identify]\n"),
        ])
        .unwrap()
    }

    #[test]
    fn try_last_children_sort_after_the_rest() {
        let registry = registry();
        let (last, normal): (Vec<_>, Vec<_>) = registry
            .children(&registry.generic())
            .into_iter()
            .partition(|c| c.try_to_match_last);
        assert_eq!(normal[0].id, "a");
        assert_eq!(last[0].id, "b");
        assert!(matches!(registry.get("a/x").unwrap().condition, Condition::Always));
    }
}
