use crate::model_store::ModelName;

/// The furniture type the next placement will use. Last write wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<ModelName>,
}

impl Selection {
    pub fn set(&mut self, name: ModelName) {
        if self.current != Some(name) {
            log::debug!("selected '{name}'");
        }
        self.current = Some(name);
    }

    pub fn get(&self) -> Option<ModelName> {
        self.current
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Exactly one name is active at a time.
    pub fn is_active(&self, name: ModelName) -> bool {
        self.current == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let selection = Selection::default();
        assert_eq!(selection.get(), None);
        assert!(ModelName::ALL.iter().all(|n| !selection.is_active(*n)));
    }

    #[test]
    fn last_write_wins_and_is_exclusive() {
        let mut selection = Selection::default();
        selection.set(ModelName::Chair);
        selection.set(ModelName::Table);
        selection.set(ModelName::Table);

        assert_eq!(selection.get(), Some(ModelName::Table));
        let active: Vec<_> = ModelName::ALL
            .into_iter()
            .filter(|n| selection.is_active(*n))
            .collect();
        assert_eq!(active, vec![ModelName::Table]);

        selection.clear();
        assert_eq!(selection.get(), None);
    }
}
