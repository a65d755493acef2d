//! OID/value pairs as carried in PDUs.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// A request binding with a NULL value.
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, Value::Null)
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        Ok(Self { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;
    let mut out = Vec::new();
    while !seq.is_empty() {
        out.push(VarBind::decode(&mut seq)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn list_keeps_order() {
        let vbs = vec![
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router")),
            VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)),
        ];
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &vbs);
        let decoded = decode_varbind_list(&mut Decoder::new(buf.finish())).unwrap();
        assert_eq!(decoded, vbs);
        assert_eq!(decoded[0].to_string(), ".1.3.6.1.2.1.1.1.0 = router");
    }
}
