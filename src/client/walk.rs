//! Subtree walks.
//!
//! Both walks stop at the end of the subtree or at `endOfMibView` and abort
//! with [`Error::WalkAborted`] when the agent returns an OID that is not
//! strictly greater than the previous one.

use tracing::instrument;

use super::Client;
use crate::error::{Error, Result, WalkAbortReason};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Ordering check over the varbinds of one walk.
struct WalkState {
    base: Oid,
    last: Oid,
    results: Vec<VarBind>,
    limit: Option<usize>,
}

enum Step {
    Continue,
    Done,
}

impl WalkState {
    fn new(base: Oid, limit: Option<usize>) -> Self {
        Self {
            last: base.clone(),
            base,
            results: Vec::new(),
            limit,
        }
    }

    fn accept<T: Transport>(&mut self, client: &Client<T>, vb: VarBind) -> Result<Step> {
        if matches!(vb.value, Value::EndOfMibView) || !vb.oid.starts_with(&self.base) {
            return Ok(Step::Done);
        }
        if vb.oid <= self.last {
            tracing::debug!(target: "async_devmon::client", { previous = %self.last, current = %vb.oid }, "non-increasing OID in walk");
            return Err(Error::WalkAborted {
                target: client.peer_addr(),
                reason: WalkAbortReason::NonIncreasing,
            }
            .boxed());
        }
        self.last = vb.oid.clone();
        self.results.push(vb);
        if self.limit.is_some_and(|max| self.results.len() >= max) {
            return Ok(Step::Done);
        }
        Ok(Step::Continue)
    }
}

impl<T: Transport> Client<T> {
    /// Walk `base` with GETNEXT.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %base))]
    pub async fn walk_getnext(&self, base: &Oid) -> Result<Vec<VarBind>> {
        let mut state = WalkState::new(base.clone(), self.inner.config.max_walk_results);
        loop {
            let vb = self.get_next(&state.last).await?;
            if let Step::Done = state.accept(self, vb)? {
                return Ok(state.results);
            }
        }
    }

    /// Walk `base` with GETBULK.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %base))]
    pub async fn bulk_walk(&self, base: &Oid) -> Result<Vec<VarBind>> {
        let max_rep = self.inner.config.max_repetitions.clamp(1, i32::MAX as u32) as i32;
        let mut state = WalkState::new(base.clone(), self.inner.config.max_walk_results);
        loop {
            let batch = self
                .get_bulk(std::slice::from_ref(&state.last), 0, max_rep)
                .await?;
            if batch.is_empty() {
                return Ok(state.results);
            }
            for vb in batch {
                if let Step::Done = state.accept(self, vb)? {
                    return Ok(state.results);
                }
            }
        }
    }

    /// GETNEXT walk on v1; GETBULK otherwise, falling back to GETNEXT when
    /// the bulk walk fails.
    pub async fn walk(&self, base: &Oid) -> Result<Vec<VarBind>> {
        if self.inner.config.version == Version::V1 {
            return self.walk_getnext(base).await;
        }
        match self.bulk_walk(base).await {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::debug!(target: "async_devmon::client", { snmp.oid = %base, error = %e }, "bulk walk failed, retrying with GETNEXT");
                self.walk_getnext(base).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::{ClientConfig, Retry};
    use crate::message::CommunityMessage;
    use crate::oid;
    use crate::pdu::PduType;
    use crate::transport::MockTransport;

    /// Agent over a sorted table answering GETNEXT and GETBULK.
    fn table_agent(table: BTreeMap<Oid, Value>) -> MockTransport {
        let table = Arc::new(table);
        MockTransport::new(move |request: &CommunityMessage| {
            let next = |oid: &Oid| {
                table
                    .range::<Oid, _>((std::ops::Bound::Excluded(oid), std::ops::Bound::Unbounded))
                    .next()
                    .map(|(o, v)| VarBind::new(o.clone(), v.clone()))
                    .unwrap_or_else(|| VarBind::new(oid.clone(), Value::EndOfMibView))
            };
            let pdu = &request.pdu;
            let varbinds = match pdu.pdu_type {
                PduType::GetNextRequest => pdu.varbinds.iter().map(|vb| next(&vb.oid)).collect(),
                PduType::GetBulkRequest => {
                    let mut out = Vec::new();
                    let mut cursor = pdu.varbinds[0].oid.clone();
                    for _ in 0..pdu.error_index {
                        let vb = next(&cursor);
                        let end = vb.value == Value::EndOfMibView;
                        cursor = vb.oid.clone();
                        out.push(vb);
                        if end {
                            break;
                        }
                    }
                    out
                }
                _ => return None,
            };
            Some(pdu.response(varbinds))
        })
    }

    fn client(mock: MockTransport, version: Version) -> Client<MockTransport> {
        Client::new(
            mock,
            ClientConfig {
                version,
                timeout: Duration::from_millis(20),
                retry: Retry::none(),
                max_repetitions: 2,
                ..ClientConfig::default()
            },
        )
    }

    fn interfaces() -> BTreeMap<Oid, Value> {
        let mut table = BTreeMap::new();
        table.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router"));
        for i in 1..=3 {
            table.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, i), Value::from(format!("eth{i}")));
        }
        table.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 3, 1), Value::Integer(6));
        table
    }

    #[tokio::test]
    async fn getnext_walk_stops_at_subtree_end() {
        let client = client(table_agent(interfaces()), Version::V1);
        let rows = client.walk(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)).await.unwrap();
        let names: Vec<_> = rows.iter().map(|vb| vb.value.to_string()).collect();
        assert_eq!(names, ["eth1", "eth2", "eth3"]);
    }

    #[tokio::test]
    async fn bulk_walk_spans_several_requests() {
        let mock = table_agent(interfaces());
        let client = client(mock.clone(), Version::V2c);
        let rows = client.walk(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(mock
            .requests()
            .iter()
            .all(|r| r.pdu.pdu_type == PduType::GetBulkRequest));
    }

    #[tokio::test]
    async fn walk_ends_at_end_of_mib_view() {
        let client = client(table_agent(interfaces()), Version::V2c);
        let rows = client.walk(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 3)).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn non_increasing_oid_aborts_walk() {
        let mock = MockTransport::new(|request: &CommunityMessage| {
            let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("loop"));
            Some(request.pdu.response(vec![vb]))
        });
        let client = client(mock, Version::V1);
        let err = client
            .walk_getnext(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            *err,
            Error::WalkAborted {
                reason: WalkAbortReason::NonIncreasing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bulk_failure_falls_back_to_getnext() {
        let table = Arc::new(interfaces());
        let mock = MockTransport::new(move |request: &CommunityMessage| {
            if request.pdu.pdu_type == PduType::GetBulkRequest {
                let mut pdu = request.pdu.response(request.pdu.varbinds.clone());
                pdu.error_status = 5;
                return Some(pdu);
            }
            let next = table
                .range::<Oid, _>((
                    std::ops::Bound::Excluded(&request.pdu.varbinds[0].oid),
                    std::ops::Bound::Unbounded,
                ))
                .next()
                .map(|(o, v)| VarBind::new(o.clone(), v.clone()))?;
            Some(request.pdu.response(vec![next]))
        });
        let client = client(mock, Version::V2c);
        let rows = client.walk(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)).await.unwrap();
        assert_eq!(rows.len(), 3);
    }
}
