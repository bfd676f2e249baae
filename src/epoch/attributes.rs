use std::collections::BTreeMap;
use std::sync::Arc;

/// One per-point attribute column.
///
/// Storage is reference counted so that derived point sets can share columns
/// they do not change. Writers go through `Arc::make_mut`, so a write never
/// reaches storage that another point set still references.
#[derive(Clone, Debug)]
pub enum AttributeColumn {
    Int(Arc<Vec<i64>>),
    Float(Arc<Vec<f64>>),
}

impl AttributeColumn {
    pub fn len(&self) -> usize {
        match self {
            AttributeColumn::Int(values) => values.len(),
            AttributeColumn::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            AttributeColumn::Int(values) => Some(values.as_slice()),
            AttributeColumn::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            AttributeColumn::Float(values) => Some(values.as_slice()),
            AttributeColumn::Int(_) => None,
        }
    }

    /// Value at `index` widened to `f64`.
    pub fn value_f64(&self, index: usize) -> Option<f64> {
        match self {
            AttributeColumn::Int(values) => values.get(index).map(|&v| v as f64),
            AttributeColumn::Float(values) => values.get(index).copied(),
        }
    }

    /// Whether both columns point at the same backing allocation.
    pub fn shares_storage_with(&self, other: &AttributeColumn) -> bool {
        match (self, other) {
            (AttributeColumn::Int(a), AttributeColumn::Int(b)) => Arc::ptr_eq(a, b),
            (AttributeColumn::Float(a), AttributeColumn::Float(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn int_mut(&mut self) -> Option<&mut [i64]> {
        match self {
            AttributeColumn::Int(values) => Some(Arc::make_mut(values).as_mut_slice()),
            AttributeColumn::Float(_) => None,
        }
    }

    pub(crate) fn float_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            AttributeColumn::Float(values) => Some(Arc::make_mut(values).as_mut_slice()),
            AttributeColumn::Int(_) => None,
        }
    }
}

impl From<Vec<i64>> for AttributeColumn {
    fn from(values: Vec<i64>) -> Self {
        AttributeColumn::Int(Arc::new(values))
    }
}

impl From<Vec<f64>> for AttributeColumn {
    fn from(values: Vec<f64>) -> Self {
        AttributeColumn::Float(Arc::new(values))
    }
}

/// Named per-point columns. Lengths are checked by [`super::PointSet::new`].
#[derive(Clone, Debug, Default)]
pub struct AttributeTable {
    columns: BTreeMap<String, AttributeColumn>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: impl Into<AttributeColumn>) -> Self {
        self.insert(name, column);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, column: impl Into<AttributeColumn>) {
        self.columns.insert(name.into(), column.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeColumn> {
        self.columns.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut AttributeColumn> {
        self.columns.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeColumn)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
