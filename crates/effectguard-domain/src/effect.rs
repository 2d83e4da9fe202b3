//! Effective tags and the per-namespace table that holds them.

use crate::model::CallableId;
use std::fmt;

/// The tag used for verification of one callable in one namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Effective {
    Tag(String),
    /// Carries no effect; compatible with everything.
    Neutral,
    /// Inference failed. Checks against it are denied.
    Undefined,
}

impl Effective {
    pub fn tag(value: impl Into<String>) -> Self {
        Effective::Tag(value.into())
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Effective::Tag(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Effective::Undefined)
    }
}

impl fmt::Display for Effective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effective::Tag(v) => f.write_str(v),
            Effective::Neutral => f.write_str("<neutral>"),
            Effective::Undefined => f.write_str("<undefined>"),
        }
    }
}

/// Where a callable's effective tag came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Explicit,
    Inferred,
    Opaque,
    Ambiguous,
}

/// Write-once slots, filled while propagation settles each component.
#[derive(Debug)]
pub struct EffectTableBuilder {
    namespace: String,
    slots: Vec<Option<(Effective, Origin)>>,
}

impl EffectTableBuilder {
    pub fn new(namespace: impl Into<String>, len: usize) -> Self {
        Self {
            namespace: namespace.into(),
            slots: vec![None; len],
        }
    }

    /// Fill a slot. Returns `false` and leaves the slot untouched if it was already set.
    pub fn set(&mut self, id: CallableId, value: Effective, origin: Origin) -> bool {
        let slot = &mut self.slots[id.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some((value, origin));
        true
    }

    pub fn get(&self, id: CallableId) -> Option<&Effective> {
        self.slots[id.index()].as_ref().map(|(v, _)| v)
    }

    /// Unfilled slots become neutral inferred tags.
    pub fn finish(self) -> EffectTable {
        let (values, origins) = self
            .slots
            .into_iter()
            .map(|s| s.unwrap_or((Effective::Neutral, Origin::Inferred)))
            .unzip();
        EffectTable {
            namespace: self.namespace,
            values,
            origins,
        }
    }
}

/// Final effective tag of every callable for one namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectTable {
    namespace: String,
    values: Vec<Effective>,
    origins: Vec<Origin>,
}

impl EffectTable {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, id: CallableId) -> &Effective {
        &self.values[id.index()]
    }

    pub fn origin(&self, id: CallableId) -> Origin {
        self.origins[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CallableId, &Effective, Origin)> + '_ {
        self.values
            .iter()
            .zip(self.origins.iter())
            .enumerate()
            .map(|(i, (v, o))| (CallableId(i as u32), v, *o))
    }

    pub fn count(&self, origin: Origin) -> u32 {
        self.origins.iter().filter(|o| **o == origin).count() as u32
    }
}
