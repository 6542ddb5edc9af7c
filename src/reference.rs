use crate::types::{ChromId, HashMap, HashMapExt, Pos};
use anyhow::{anyhow, bail, Result};
use noodles::sam;

/// Chromosome names and lengths, indexed by chromosome id.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    names: Vec<String>,
    lengths: Vec<Pos>,
    ids: HashMap<String, ChromId>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            lengths: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Pos)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, length) in entries {
            table.push(name.into(), length)?;
        }
        Ok(table)
    }

    /// Reference sequences in header order; ids match BAM reference ids.
    pub fn from_header(header: &sam::Header) -> Result<Self> {
        let mut table = Self::new();
        for (name, reference) in header.reference_sequences() {
            let length = Pos::try_from(reference.length().get())
                .map_err(|_| anyhow!("reference '{}' is too long", name))?;
            table.push(name.to_string(), length)?;
        }
        Ok(table)
    }

    fn push(&mut self, name: String, length: Pos) -> Result<()> {
        if self.ids.contains_key(&name) {
            bail!("duplicate reference name '{}'", name);
        }
        let id = ChromId::try_from(self.names.len())
            .map_err(|_| anyhow!("too many reference sequences"))?;
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        self.lengths.push(length);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn length(&self, id: ChromId) -> Pos {
        self.lengths[id as usize]
    }

    pub fn try_length(&self, id: ChromId) -> Option<Pos> {
        self.lengths.get(id as usize).copied()
    }

    pub fn name(&self, id: ChromId) -> &str {
        &self.names[id as usize]
    }

    pub fn id(&self, name: &str) -> Option<ChromId> {
        self.ids.get(name).copied()
    }
}
