//! Large-object storage
//!
//! Payloads that must not be inlined on an entity (exception stack traces,
//! extended handler configuration, history job payloads) live in their own
//! `ByteArray` rows and are referenced through a `ByteArrayRef`.

use crate::context::CommandContext;
use crate::errors::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteArray {
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl ByteArray {
    pub fn new(id: impl Into<String>, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            revision: 0,
            name: name.into(),
            bytes,
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// Reference from an owning entity to a `ByteArray` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteArrayRef {
    id: String,
    name: String,
}

impl ByteArrayRef {
    /// Store `bytes` in a new `ByteArray` and return a reference to it
    pub fn create(ctx: &mut CommandContext, name: &str, bytes: Vec<u8>) -> Result<Self> {
        let id = ctx.new_id();
        ctx.insert(ByteArray::new(id.clone(), name, bytes))?;
        Ok(Self {
            id,
            name: name.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self, ctx: &mut CommandContext) -> Result<Option<Vec<u8>>> {
        Ok(ctx
            .find_by_id::<ByteArray>(&self.id)?
            .map(|b| b.bytes.clone()))
    }

    pub fn as_string(&self, ctx: &mut CommandContext) -> Result<Option<String>> {
        Ok(self
            .bytes(ctx)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    /// Copy the referenced bytes into a new `ByteArray`
    ///
    /// Returns `None` when the referenced row no longer exists.
    pub fn copy(&self, ctx: &mut CommandContext) -> Result<Option<ByteArrayRef>> {
        match self.bytes(ctx)? {
            Some(bytes) => Ok(Some(ByteArrayRef::create(ctx, &self.name, bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete the referenced `ByteArray`; a missing row is not an error
    pub fn delete(&self, ctx: &mut CommandContext) -> Result<()> {
        if !ctx.delete::<ByteArray>(&self.id)? {
            tracing::debug!(byte_array_id = %self.id, "referenced byte array already gone");
        }
        Ok(())
    }
}
