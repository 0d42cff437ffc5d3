use crate::error::SchemaMismatch;
use crate::schema::TopicSchema;

/// One packed field: `base0..base{count-1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedGroup {
    base: String,
    count: usize,
}

impl PackedGroup {
    pub fn new(base: impl Into<String>, count: usize) -> Self {
        Self {
            base: base.into(),
            count,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn column_name(&self, i: usize) -> String {
        format!("{}{}", self.base, i)
    }

    pub fn column_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.count).map(|i| self.column_name(i))
    }
}

/// The packed fields of a topic, resolved once and reused per batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedGroups {
    groups: Vec<PackedGroup>,
}

impl PackedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, base: impl Into<String>, count: usize) -> Self {
        self.push(PackedGroup::new(base, count));
        self
    }

    /// Adds a group, replacing one with the same base.
    pub fn push(&mut self, group: PackedGroup) {
        match self.groups.iter_mut().find(|g| g.base == group.base) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    /// Resolves `bases` against a topic schema and the stored column names.
    ///
    /// Each base must be declared as an array. Its count comes from the
    /// schema when known, otherwise from the exact `base<digits>` columns
    /// present, where a longer declared base claims its own columns first.
    pub fn resolve(
        schema: &TopicSchema,
        bases: &[&str],
        columns: &[String],
    ) -> Result<Self, SchemaMismatch> {
        let declared: Vec<String> = schema.array_fields().map(|f| f.name.clone()).collect();
        let mut groups = PackedGroups::new();
        for base in bases {
            let field = schema
                .field(base)
                .ok_or_else(|| SchemaMismatch::MissingPackedField {
                    field: base.to_string(),
                })?;
            if !field.is_array {
                return Err(SchemaMismatch::NotAnArray {
                    field: base.to_string(),
                });
            }
            let count = match field.sample_count {
                Some(count) => count,
                None => count_packed_columns(base, &declared, columns)?.ok_or_else(|| {
                    SchemaMismatch::MissingPackedField {
                        field: base.to_string(),
                    }
                })?,
            };
            groups.push(PackedGroup::new(*base, count));
        }
        Ok(groups)
    }

    pub fn groups(&self) -> &[PackedGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Every stored column covered by these groups, in group order.
    pub fn column_names(&self) -> Vec<String> {
        self.groups.iter().flat_map(|g| g.column_names()).collect()
    }

    /// The sample count shared by every group.
    pub fn common_count(&self) -> Result<Option<usize>, SchemaMismatch> {
        let Some(first) = self.groups.first() else {
            return Ok(None);
        };
        for other in &self.groups[1..] {
            if other.count != first.count {
                return Err(SchemaMismatch::InconsistentCounts {
                    first: first.base.clone(),
                    first_count: first.count,
                    other: other.base.clone(),
                    other_count: other.count,
                });
            }
        }
        Ok(Some(first.count))
    }
}

/// Counts the `base<i>` columns of one packed field.
///
/// `Ok(None)` when no column matches; indices must form `0..N`.
pub(crate) fn count_packed_columns(
    base: &str,
    declared: &[String],
    columns: &[String],
) -> Result<Option<usize>, SchemaMismatch> {
    let mut indices: Vec<usize> = columns
        .iter()
        .filter(|column| {
            !declared.iter().any(|longer| {
                longer.len() > base.len()
                    && longer.starts_with(base)
                    && packed_index(column, longer).is_some()
            })
        })
        .filter_map(|column| packed_index(column, base))
        .collect();
    if indices.is_empty() {
        return Ok(None);
    }
    indices.sort_unstable();
    indices.dedup();
    if indices.iter().enumerate().any(|(i, idx)| i != *idx) {
        return Err(SchemaMismatch::NonContiguousIndices {
            field: base.to_string(),
        });
    }
    Ok(Some(indices.len()))
}

/// Index of `column` within the packed field `base`, if it is `base<digits>`.
fn packed_index(column: &str, base: &str) -> Option<usize> {
    let suffix = column.strip_prefix(base)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() > 1 && suffix.starts_with('0') {
        return None;
    }
    suffix.parse().ok()
}
