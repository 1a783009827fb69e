use crate::MapperError;

/// Append-only record of the failures seen by one document.
///
/// A non-empty log blocks every further save, update, and delete.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<MapperError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = MapperError>) {
        self.entries.extend(errors);
    }

    pub fn push(&mut self, error: MapperError) {
        self.entries.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[MapperError] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MapperError> {
        self.entries.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a MapperError;
    type IntoIter = std::slice::Iter<'a, MapperError>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
